//! 提交客户端 - 把分块变成一次受网络门禁约束的 HTTP 请求
//!
//! 提交前检查当前网络类型：非 WiFi 直接返回 [`SnapshotSyncError::WifiUnavailable`]，
//! 不发起任何 I/O，也不安排重试。HTTP 成功后向外部确认协作方异步送出一个
//! [`AckRequest`]（fire-and-forget），不等待确认完成即返回。

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use reqwest::Client;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::{Result, SnapshotSyncError};
use crate::network::NetworkMonitor;
use crate::record::{AckRequest, Chunk};

/// 提交客户端配置
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SubmitConfig {
    /// 收集端基础地址，如 `http://192.168.0.10:3000`
    pub base_url: String,
    /// 连接超时（秒）
    pub connect_timeout_secs: u64,
    /// 读取超时（秒）
    pub read_timeout_secs: u64,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            connect_timeout_secs: 15,
            read_timeout_secs: 10,
        }
    }
}

/// 随每条记录上报的设备元数据
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DeviceInfo {
    pub device_type: String,
    pub device_os_version: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            device_type: "Android".to_string(),
            device_os_version: "unknown".to_string(),
        }
    }
}

/// 分块提交接口（调度器依赖的接缝，测试用假实现替换）
#[async_trait]
pub trait ChunkSubmitter: Send + Sync {
    /// 提交一个非空分块；成功即代表确认请求已送出
    async fn submit(&self, user_id: &str, chunk: &Chunk) -> Result<()>;
}

/// 生产实现：一个分块对应一次 HTTP POST
pub struct HttpSubmitClient {
    client: Client,
    config: SubmitConfig,
    device: DeviceInfo,
    network: Arc<NetworkMonitor>,
    ack_tx: mpsc::UnboundedSender<AckRequest>,
}

impl HttpSubmitClient {
    pub fn new(
        config: SubmitConfig,
        device: DeviceInfo,
        network: Arc<NetworkMonitor>,
        ack_tx: mpsc::UnboundedSender<AckRequest>,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .build()
            .map_err(|e| SnapshotSyncError::Config(format!("创建 HTTP 客户端失败: {}", e)))?;

        info!("✅ 提交客户端已创建 (base_url: {})", config.base_url);

        Ok(Self {
            client,
            config,
            device,
            network,
            ack_tx,
        })
    }
}

#[async_trait]
impl ChunkSubmitter for HttpSubmitClient {
    async fn submit(&self, user_id: &str, chunk: &Chunk) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }

        // 网络门禁：非 WiFi 不发起任何请求
        if !self.network.is_wifi().await {
            warn!("WiFi 未连接，跳过提交: type={}", chunk.record_type.source_name());
            return Err(SnapshotSyncError::WifiUnavailable);
        }

        let route = chunk.record_type.route();
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), route);
        let payload = build_payload(user_id, &self.device, chunk);

        debug!("📤 提交分块: route={}, 记录数={}", route, chunk.len());

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json;charset=utf-8")
            .header("X-Requested-With", "XMLHttpRequest")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!("❌ 提交请求失败: route={}, error={}", route, e);
                SnapshotSyncError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            error!("❌ 服务端拒绝提交: route={}, status={}", route, status);
            return Err(SnapshotSyncError::Server(status.as_u16()));
        }

        info!(
            "✅ 分块提交成功: route={}, 记录数={}",
            route,
            chunk.len()
        );

        // 确认请求交给外部协作方异步处理，不等待其完成
        let ack = AckRequest::from_chunk(chunk);
        if self.ack_tx.send(ack).is_err() {
            debug!("确认协作方已关闭，确认请求被丢弃");
        }

        Ok(())
    }
}

/// 组装提交载荷 `{ "entries": [...] }`
///
/// 每个 entry 携带设备元数据、类型标识、时间戳、类型特有字段、驾驶标记
/// 与用户标识。
pub fn build_payload(user_id: &str, device: &DeviceInfo, chunk: &Chunk) -> Value {
    let field_names = chunk.record_type.field_names();
    let entries: Vec<Value> = chunk
        .records
        .iter()
        .map(|record| {
            let mut entry = serde_json::Map::new();
            entry.insert("deviceType".to_string(), json!(device.device_type));
            entry.insert("deviceOsVersion".to_string(), json!(device.device_os_version));
            entry.insert("dataType".to_string(), json!(chunk.record_type.source_name()));
            entry.insert("timestamp".to_string(), json!(record.timestamp));
            for (name, value) in field_names.iter().zip(record.values.field_values()) {
                entry.insert((*name).to_string(), value);
            }
            entry.insert("isDriving".to_string(), json!(record.is_driving));
            entry.insert("userId".to_string(), json!(user_id));
            Value::Object(entry)
        })
        .collect();

    json!({ "entries": entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::test_helpers::monitor_with_class;
    use crate::network::NetworkClass;
    use crate::record::{PendingRecord, RecordType, RecordValues};

    fn location_chunk() -> Chunk {
        Chunk {
            record_type: RecordType::Location,
            records: vec![
                PendingRecord {
                    id: 1,
                    timestamp: 1000,
                    is_driving: true,
                    values: RecordValues::Location {
                        latitude: 43.65,
                        longitude: -79.38,
                        speed: 13.9,
                    },
                },
                PendingRecord {
                    id: 2,
                    timestamp: 1100,
                    is_driving: false,
                    values: RecordValues::Location {
                        latitude: 43.66,
                        longitude: -79.39,
                        speed: 0.0,
                    },
                },
            ],
        }
    }

    #[test]
    fn test_build_payload_shape() {
        let device = DeviceInfo {
            device_type: "Android".to_string(),
            device_os_version: "14".to_string(),
        };
        let payload = build_payload("user-1", &device, &location_chunk());

        let entries = payload["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first["deviceType"], "Android");
        assert_eq!(first["deviceOsVersion"], "14");
        assert_eq!(first["dataType"], "location");
        assert_eq!(first["timestamp"], 1000);
        assert_eq!(first["latitude"], 43.65);
        assert_eq!(first["longitude"], -79.38);
        assert_eq!(first["speed"], 13.9);
        assert_eq!(first["isDriving"], true);
        assert_eq!(first["userId"], "user-1");
    }

    #[tokio::test]
    async fn test_non_wifi_skips_network_entirely() {
        // base_url 指向不存在的地址：只要门禁生效就不会有任何网络请求
        let (ack_tx, mut ack_rx) = mpsc::unbounded_channel();
        let network = monitor_with_class(NetworkClass::Cellular).await;
        let client = HttpSubmitClient::new(
            SubmitConfig {
                base_url: "http://127.0.0.1:1".to_string(),
                ..Default::default()
            },
            DeviceInfo::default(),
            network,
            ack_tx,
        )
        .unwrap();

        let result = client.submit("user-1", &location_chunk()).await;
        assert!(matches!(result, Err(SnapshotSyncError::WifiUnavailable)));
        // 没有成功提交，也就没有确认请求
        assert!(ack_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_empty_chunk_is_noop() {
        let (ack_tx, mut ack_rx) = mpsc::unbounded_channel();
        let network = monitor_with_class(NetworkClass::Offline).await;
        let client = HttpSubmitClient::new(
            SubmitConfig::default(),
            DeviceInfo::default(),
            network,
            ack_tx,
        )
        .unwrap();

        let empty = Chunk {
            record_type: RecordType::Magnetic,
            records: vec![],
        };
        client.submit("user-1", &empty).await.unwrap();
        assert!(ack_rx.try_recv().is_err());
    }
}
