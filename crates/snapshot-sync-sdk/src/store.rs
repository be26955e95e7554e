//! 待上传存储适配层 - 对本地 SQLite 的只读视图
//!
//! 本模块提供：
//! - 每种记录类型的未上传计数（一次标量查询）
//! - 会话级游标：每种类型每个会话最多打开一次，顺序读取未上传记录
//! - 建表与写入辅助（供采集侧和测试使用）
//!
//! 游标是打开时刻的一次性快照：会话期间新落盘的记录在本会话内不可见，
//! 要等到下一次会话才会被选中。

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use rusqlite::Connection;
use tokio::sync::Mutex;

use crate::error::{Result, SnapshotSyncError};
use crate::record::{PendingRecord, RecordType, RecordValues};

/// 本地待上传记录存储
#[derive(Debug, Clone)]
pub struct PendingStore {
    conn: Arc<Mutex<Connection>>,
}

impl PendingStore {
    /// 打开（或创建）磁盘数据库
    pub async fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| SnapshotSyncError::Database(format!("打开数据库失败: {}", e)))?;
        Self::init(conn).await
    }

    /// 内存数据库，测试用
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SnapshotSyncError::Database(format!("打开内存数据库失败: {}", e)))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| SnapshotSyncError::Database(format!("设置 WAL 模式失败: {}", e)))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|e| SnapshotSyncError::Database(format!("设置同步模式失败: {}", e)))?;

        create_tables(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 某种类型的未上传记录数（一次标量查询）
    ///
    /// 存储不可用时返回 [`SnapshotSyncError::StoreUnavailable`]，调用方
    /// 不会开始会话。
    pub async fn count_pending(&self, record_type: RecordType) -> Result<u64> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE isRecordUploaded = 0",
            record_type.source_name()
        );
        conn.query_row(&sql, [], |row| row.get::<_, u64>(0))
            .map_err(|e| SnapshotSyncError::StoreUnavailable(format!("统计未上传记录失败: {}", e)))
    }

    /// 六种类型的未上传计数
    pub async fn count_all_pending(&self) -> Result<HashMap<RecordType, u64>> {
        let mut counts = HashMap::new();
        for record_type in RecordType::ALL {
            counts.insert(record_type, self.count_pending(record_type).await?);
        }
        Ok(counts)
    }

    /// 写入一条待上传记录，返回分配的 id（采集侧/测试用）
    pub async fn insert_pending(
        &self,
        timestamp: i64,
        is_driving: bool,
        values: &RecordValues,
    ) -> Result<i64> {
        let record_type = values.record_type();
        let fields = record_type.field_names();

        let placeholders: Vec<String> = (2..2 + fields.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} (timestamp, {}, isDriving) VALUES (?1, {}, ?{})",
            record_type.source_name(),
            fields.join(", "),
            placeholders.join(", "),
            2 + fields.len()
        );

        let mut params: Vec<rusqlite::types::Value> = Vec::with_capacity(fields.len() + 2);
        params.push(timestamp.into());
        params.extend(sql_values(values));
        params.push((is_driving as i64).into());

        let conn = self.conn.lock().await;
        conn.execute(&sql, rusqlite::params_from_iter(params))
            .map_err(|e| SnapshotSyncError::Database(format!("写入记录失败: {}", e)))?;
        Ok(conn.last_insert_rowid())
    }

    /// 创建一个会话级读取器；游标在首次读取某类型时惰性打开
    pub fn session_reader(&self) -> SessionReader {
        SessionReader {
            conn: self.conn.clone(),
            cursors: HashMap::new(),
        }
    }
}

/// 会话级读取器，持有每种类型至多一个游标
///
/// 游标在整个会话期间不会重开，即使计数估计已经过期。
#[derive(Debug)]
pub struct SessionReader {
    conn: Arc<Mutex<Connection>>,
    cursors: HashMap<RecordType, VecDeque<PendingRecord>>,
}

impl SessionReader {
    /// 下一条未上传记录；耗尽返回 `None`（不是错误）
    pub async fn next_pending(&mut self, record_type: RecordType) -> Result<Option<PendingRecord>> {
        if !self.cursors.contains_key(&record_type) {
            let rows = self.open_cursor(record_type).await?;
            self.cursors.insert(record_type, rows);
        }
        Ok(self
            .cursors
            .get_mut(&record_type)
            .and_then(|cursor| cursor.pop_front()))
    }

    /// 释放所有游标；会话的每条退出路径都会执行
    pub fn release(&mut self) {
        self.cursors.clear();
    }

    async fn open_cursor(&self, record_type: RecordType) -> Result<VecDeque<PendingRecord>> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT id, timestamp, isDriving, {} FROM {} WHERE isRecordUploaded = 0 ORDER BY id",
            record_type.field_names().join(", "),
            record_type.source_name()
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| SnapshotSyncError::StoreUnavailable(format!("打开游标失败: {}", e)))?;

        let rows = stmt
            .query_map([], |row| row_to_record(record_type, row))
            .map_err(|e| SnapshotSyncError::StoreUnavailable(format!("读取记录失败: {}", e)))?;

        let mut records = VecDeque::new();
        for row in rows {
            records.push_back(row.map_err(|e| {
                SnapshotSyncError::StoreUnavailable(format!("解析记录失败: {}", e))
            })?);
        }
        Ok(records)
    }
}

fn create_tables(conn: &Connection) -> Result<()> {
    for record_type in RecordType::ALL {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                {},
                isDriving INTEGER NOT NULL DEFAULT 0,
                isRecordUploaded INTEGER NOT NULL DEFAULT 0
            )",
            record_type.source_name(),
            column_defs(record_type)
        );
        conn.execute(&sql, [])
            .map_err(|e| SnapshotSyncError::Database(format!("创建记录表失败: {}", e)))?;

        let index = format!(
            "CREATE INDEX IF NOT EXISTS idx_{}_uploaded ON {}(isRecordUploaded)",
            record_type.source_name(),
            record_type.source_name()
        );
        conn.execute(&index, [])
            .map_err(|e| SnapshotSyncError::Database(format!("创建上传标记索引失败: {}", e)))?;
    }
    Ok(())
}

fn column_defs(record_type: RecordType) -> &'static str {
    match record_type {
        RecordType::LinearAcceleration | RecordType::Magnetic => {
            "x REAL NOT NULL, y REAL NOT NULL, z REAL NOT NULL"
        }
        RecordType::Gyroscope => {
            "angularSpeedX REAL NOT NULL, angularSpeedY REAL NOT NULL, angularSpeedZ REAL NOT NULL"
        }
        RecordType::Rotation => {
            "xSin REAL NOT NULL, ySin REAL NOT NULL, zSin REAL NOT NULL, cos REAL NOT NULL, accuracy REAL NOT NULL"
        }
        RecordType::Location => {
            "latitude REAL NOT NULL, longitude REAL NOT NULL, speed REAL NOT NULL"
        }
        RecordType::DetectedActivity => "name INTEGER NOT NULL, confidence INTEGER NOT NULL",
    }
}

fn sql_values(values: &RecordValues) -> Vec<rusqlite::types::Value> {
    match values {
        RecordValues::LinearAcceleration { x, y, z } | RecordValues::Magnetic { x, y, z } => {
            vec![(*x).into(), (*y).into(), (*z).into()]
        }
        RecordValues::Gyroscope {
            angular_speed_x,
            angular_speed_y,
            angular_speed_z,
        } => vec![
            (*angular_speed_x).into(),
            (*angular_speed_y).into(),
            (*angular_speed_z).into(),
        ],
        RecordValues::Rotation {
            x_sin,
            y_sin,
            z_sin,
            cos,
            accuracy,
        } => vec![
            (*x_sin).into(),
            (*y_sin).into(),
            (*z_sin).into(),
            (*cos).into(),
            (*accuracy).into(),
        ],
        RecordValues::Location {
            latitude,
            longitude,
            speed,
        } => vec![(*latitude).into(), (*longitude).into(), (*speed).into()],
        RecordValues::DetectedActivity { name, confidence } => {
            vec![(*name).into(), (*confidence).into()]
        }
    }
}

fn row_to_record(
    record_type: RecordType,
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<PendingRecord> {
    let id: i64 = row.get(0)?;
    let timestamp: i64 = row.get(1)?;
    let is_driving: bool = row.get::<_, i64>(2)? != 0;

    let values = match record_type {
        RecordType::LinearAcceleration => RecordValues::LinearAcceleration {
            x: row.get(3)?,
            y: row.get(4)?,
            z: row.get(5)?,
        },
        RecordType::Gyroscope => RecordValues::Gyroscope {
            angular_speed_x: row.get(3)?,
            angular_speed_y: row.get(4)?,
            angular_speed_z: row.get(5)?,
        },
        RecordType::Rotation => RecordValues::Rotation {
            x_sin: row.get(3)?,
            y_sin: row.get(4)?,
            z_sin: row.get(5)?,
            cos: row.get(6)?,
            accuracy: row.get(7)?,
        },
        RecordType::Magnetic => RecordValues::Magnetic {
            x: row.get(3)?,
            y: row.get(4)?,
            z: row.get(5)?,
        },
        RecordType::Location => RecordValues::Location {
            latitude: row.get(3)?,
            longitude: row.get(4)?,
            speed: row.get(5)?,
        },
        RecordType::DetectedActivity => RecordValues::DetectedActivity {
            name: row.get(3)?,
            confidence: row.get(4)?,
        },
    };

    Ok(PendingRecord {
        id,
        timestamp,
        is_driving,
        values,
    })
}


#[cfg(test)]
mod tests {
    use super::test_helpers::seed_linear_acceleration;
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_count_pending() {
        let store = PendingStore::open_in_memory().await.unwrap();
        assert_eq!(store.count_pending(RecordType::LinearAcceleration).await.unwrap(), 0);

        seed_linear_acceleration(&store, 3).await;
        assert_eq!(store.count_pending(RecordType::LinearAcceleration).await.unwrap(), 3);
        // 其他类型不受影响
        assert_eq!(store.count_pending(RecordType::Gyroscope).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cursor_reads_in_id_order_until_exhausted() {
        let store = PendingStore::open_in_memory().await.unwrap();
        seed_linear_acceleration(&store, 3).await;

        let mut reader = store.session_reader();
        let mut ids = Vec::new();
        while let Some(record) = reader
            .next_pending(RecordType::LinearAcceleration)
            .await
            .unwrap()
        {
            ids.push(record.id);
        }
        assert_eq!(ids, vec![1, 2, 3]);

        // 耗尽后继续读仍是 None，而不是错误
        assert!(reader
            .next_pending(RecordType::LinearAcceleration)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_cursor_is_snapshot_not_reopened() {
        let store = PendingStore::open_in_memory().await.unwrap();
        seed_linear_acceleration(&store, 2).await;

        let mut reader = store.session_reader();
        // 首次读取打开游标
        let first = reader
            .next_pending(RecordType::LinearAcceleration)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.id, 1);

        // 游标打开后新写入的记录在本会话内不可见
        seed_linear_acceleration(&store, 1).await;

        let second = reader
            .next_pending(RecordType::LinearAcceleration)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.id, 2);
        assert!(reader
            .next_pending(RecordType::LinearAcceleration)
            .await
            .unwrap()
            .is_none());

        // 下一个会话能看到新记录
        let mut next_reader = store.session_reader();
        let mut count = 0;
        while next_reader
            .next_pending(RecordType::LinearAcceleration)
            .await
            .unwrap()
            .is_some()
        {
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_insert_round_trips_all_types() {
        let store = PendingStore::open_in_memory().await.unwrap();
        let now = Utc::now().timestamp_millis();

        let samples = vec![
            RecordValues::Gyroscope {
                angular_speed_x: 0.1,
                angular_speed_y: 0.2,
                angular_speed_z: 0.3,
            },
            RecordValues::Rotation {
                x_sin: 0.1,
                y_sin: 0.2,
                z_sin: 0.3,
                cos: 0.9,
                accuracy: 1.0,
            },
            RecordValues::Location {
                latitude: 43.65,
                longitude: -79.38,
                speed: 8.3,
            },
            RecordValues::DetectedActivity {
                name: 2,
                confidence: 87,
            },
        ];

        for values in &samples {
            store.insert_pending(now, true, values).await.unwrap();
        }

        let mut reader = store.session_reader();
        for values in &samples {
            let record = reader
                .next_pending(values.record_type())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(&record.values, values);
            assert!(record.is_driving);
            assert_eq!(record.timestamp, now);
        }
    }
}
