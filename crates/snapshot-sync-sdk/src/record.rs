//! 数据模型 - 记录类型描述符、待上传记录、分块与确认请求
//!
//! 六种传感器/上下文记录类型共用同一套上传流程，类型差异全部收敛到
//! [`RecordType`] 描述符（表名、上传路由、字段表）中。

use serde_json::{json, Value};

/// 六种传感器/上下文记录类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    LinearAcceleration,
    Gyroscope,
    Rotation,
    Magnetic,
    Location,
    DetectedActivity,
}

impl RecordType {
    /// 调度器每一轮遍历的固定顺序
    pub const ALL: [RecordType; 6] = [
        RecordType::LinearAcceleration,
        RecordType::Gyroscope,
        RecordType::Magnetic,
        RecordType::Location,
        RecordType::DetectedActivity,
        RecordType::Rotation,
    ];

    /// 本地存储表名，同时作为线上 `dataType` 标识
    pub fn source_name(&self) -> &'static str {
        match self {
            RecordType::LinearAcceleration => "linearAcceleration",
            RecordType::Gyroscope => "gyroscope",
            RecordType::Rotation => "rotation",
            RecordType::Magnetic => "magnetic",
            RecordType::Location => "location",
            RecordType::DetectedActivity => "detectedActivity",
        }
    }

    /// 提交路由名，与六种记录类型一一对应
    pub fn route(&self) -> &'static str {
        match self {
            RecordType::LinearAcceleration => "androidLinearAccelerations",
            RecordType::Gyroscope => "androidGyroscopes",
            RecordType::Rotation => "androidRotations",
            RecordType::Magnetic => "androidMagnetics",
            RecordType::Location => "androidLocations",
            RecordType::DetectedActivity => "androidActivities",
        }
    }

    /// 类型特有字段的有序列表（同时用作存储列名与线上字段名）
    pub fn field_names(&self) -> &'static [&'static str] {
        match self {
            RecordType::LinearAcceleration => &["x", "y", "z"],
            RecordType::Gyroscope => &["angularSpeedX", "angularSpeedY", "angularSpeedZ"],
            RecordType::Rotation => &["xSin", "ySin", "zSin", "cos", "accuracy"],
            RecordType::Magnetic => &["x", "y", "z"],
            RecordType::Location => &["latitude", "longitude", "speed"],
            RecordType::DetectedActivity => &["name", "confidence"],
        }
    }
}

/// 类型特有的数值字段
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValues {
    LinearAcceleration { x: f64, y: f64, z: f64 },
    Gyroscope { angular_speed_x: f64, angular_speed_y: f64, angular_speed_z: f64 },
    Rotation { x_sin: f64, y_sin: f64, z_sin: f64, cos: f64, accuracy: f64 },
    Magnetic { x: f64, y: f64, z: f64 },
    Location { latitude: f64, longitude: f64, speed: f64 },
    DetectedActivity { name: i64, confidence: i64 },
}

impl RecordValues {
    pub fn record_type(&self) -> RecordType {
        match self {
            RecordValues::LinearAcceleration { .. } => RecordType::LinearAcceleration,
            RecordValues::Gyroscope { .. } => RecordType::Gyroscope,
            RecordValues::Rotation { .. } => RecordType::Rotation,
            RecordValues::Magnetic { .. } => RecordType::Magnetic,
            RecordValues::Location { .. } => RecordType::Location,
            RecordValues::DetectedActivity { .. } => RecordType::DetectedActivity,
        }
    }

    /// 按 [`RecordType::field_names`] 的顺序给出线上字段值
    pub fn field_values(&self) -> Vec<Value> {
        match self {
            RecordValues::LinearAcceleration { x, y, z } => vec![json!(x), json!(y), json!(z)],
            RecordValues::Gyroscope { angular_speed_x, angular_speed_y, angular_speed_z } => {
                vec![json!(angular_speed_x), json!(angular_speed_y), json!(angular_speed_z)]
            }
            RecordValues::Rotation { x_sin, y_sin, z_sin, cos, accuracy } => {
                vec![json!(x_sin), json!(y_sin), json!(z_sin), json!(cos), json!(accuracy)]
            }
            RecordValues::Magnetic { x, y, z } => vec![json!(x), json!(y), json!(z)],
            RecordValues::Location { latitude, longitude, speed } => {
                vec![json!(latitude), json!(longitude), json!(speed)]
            }
            RecordValues::DetectedActivity { name, confidence } => {
                vec![json!(name), json!(confidence)]
            }
        }
    }
}

/// 一条已落盘、尚未确认上传的传感器记录
///
/// 记录本身不可变；上传标记只由外部的确认协作方翻转。
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRecord {
    /// 同类型内唯一
    pub id: i64,
    /// 采集时间（毫秒）
    pub timestamp: i64,
    /// 采集时是否处于驾驶状态
    pub is_driving: bool,
    pub values: RecordValues,
}

impl PendingRecord {
    pub fn record_type(&self) -> RecordType {
        self.values.record_type()
    }
}

/// 同类型记录组成的网络批次，受提交上限约束
#[derive(Debug, Clone)]
pub struct Chunk {
    pub record_type: RecordType,
    pub records: Vec<PendingRecord>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 分块内记录 id 的有序列表
    pub fn ids(&self) -> Vec<i64> {
        self.records.iter().map(|r| r.id).collect()
    }
}

/// 交给外部确认协作方的"标记已上传"请求
///
/// 引擎只负责发出请求，不跟踪确认是否完成；确认失败的记录会在下一次
/// 会话中被重新选中（至少一次语义）。
#[derive(Debug, Clone, PartialEq)]
pub struct AckRequest {
    pub record_type: RecordType,
    pub ids: Vec<i64>,
}

impl AckRequest {
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            record_type: chunk.record_type,
            ids: chunk.ids(),
        }
    }

    /// 确认协作方约定的线格式 `{ "dataType": ..., "data": [ids...] }`
    pub fn to_wire(&self) -> Value {
        json!({
            "dataType": self.record_type.source_name(),
            "data": self.ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_mapping() {
        assert_eq!(RecordType::LinearAcceleration.route(), "androidLinearAccelerations");
        assert_eq!(RecordType::DetectedActivity.route(), "androidActivities");

        // 六条路由互不相同
        let mut routes: Vec<_> = RecordType::ALL.iter().map(|t| t.route()).collect();
        routes.sort();
        routes.dedup();
        assert_eq!(routes.len(), 6);
    }

    #[test]
    fn test_field_names_match_values() {
        let values = RecordValues::Rotation {
            x_sin: 0.1,
            y_sin: 0.2,
            z_sin: 0.3,
            cos: 0.9,
            accuracy: 1.0,
        };
        assert_eq!(
            values.record_type().field_names().len(),
            values.field_values().len()
        );
    }

    #[test]
    fn test_ack_request_wire_format() {
        let chunk = Chunk {
            record_type: RecordType::Location,
            records: vec![PendingRecord {
                id: 7,
                timestamp: 1000,
                is_driving: true,
                values: RecordValues::Location {
                    latitude: 43.6,
                    longitude: -79.3,
                    speed: 12.5,
                },
            }],
        };
        let ack = AckRequest::from_chunk(&chunk);
        let wire = ack.to_wire();
        assert_eq!(wire["dataType"], "location");
        assert_eq!(wire["data"][0], 7);
    }
}
