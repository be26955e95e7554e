//! snapshot-sync-sdk - 离线优先的传感器数据批量同步引擎
//!
//! 把本地 SQLite 中积压的六类传感器读数（线性加速度、陀螺仪、旋转、
//! 磁场、位置、活动识别）分批上传到远端收集服务：
//!
//! - [`store::PendingStore`]：本地存储的只读适配层，提供逐类型的未上传
//!   计数与会话级游标
//! - [`chunk::ChunkAccumulator`]：把单条记录聚合成受提交上限约束的分块
//! - [`submit::HttpSubmitClient`]：受 WiFi 门禁约束的提交客户端，成功后
//!   向外部确认协作方送出确认请求
//! - [`scheduler::BatchScheduler`]：会话核心，按固定顺序轮转六种类型，
//!   每轮拉取一个轮长，支持协作式取消
//! - [`coordinator::SyncCoordinator`]：会话互斥、软停止与宿主关闭信号
//!
//! 交付语义是至少一次：提交成功与标记已上传之间没有事务耦合，两步之间
//! 中断会导致下一次会话重新提交同一批记录。

pub mod chunk;
pub mod coordinator;
pub mod error;
pub mod network;
pub mod record;
pub mod scheduler;
pub mod store;
pub mod submit;

pub use coordinator::{SyncConfig, SyncCoordinator};
pub use error::{Result, SnapshotSyncError};
pub use network::{NetworkClass, NetworkMonitor, NetworkStatusListener};
pub use record::{AckRequest, Chunk, PendingRecord, RecordType, RecordValues};
pub use scheduler::{BatchScheduler, SchedulerConfig, SessionStats};
pub use store::PendingStore;
pub use submit::{ChunkSubmitter, DeviceInfo, HttpSubmitClient, SubmitConfig};
