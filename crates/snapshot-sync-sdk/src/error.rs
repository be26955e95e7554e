use std::fmt;

#[derive(Debug)]
pub enum SnapshotSyncError {
    /// 本地存储不可用（计数或读取失败），会话不会开始或提前结束
    StoreUnavailable(String),
    /// 当前网络不是 WiFi，提交被跳过且不产生任何网络请求
    WifiUnavailable,
    /// 网络错误（连接失败/超时）
    Network(String),
    /// 服务端返回非 2xx 状态码
    Server(u16),
    /// 会话观察到软取消信号
    Cancelled,
    Database(String),
    Config(String),
}

impl fmt::Display for SnapshotSyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotSyncError::StoreUnavailable(e) => write!(f, "Store unavailable: {}", e),
            SnapshotSyncError::WifiUnavailable => write!(f, "WiFi unavailable"),
            SnapshotSyncError::Network(e) => write!(f, "Network error: {}", e),
            SnapshotSyncError::Server(code) => write!(f, "Server error: HTTP {}", code),
            SnapshotSyncError::Cancelled => write!(f, "Session cancelled"),
            SnapshotSyncError::Database(e) => write!(f, "Database error: {}", e),
            SnapshotSyncError::Config(e) => write!(f, "Config error: {}", e),
        }
    }
}

impl std::error::Error for SnapshotSyncError {}

pub type Result<T> = std::result::Result<T, SnapshotSyncError>;
