//! 网络状态监控 - 提交前的网络类型门禁
//!
//! 提交客户端只在 WiFi 类连接下发起请求；当前网络类型由平台层通过
//! [`NetworkStatusListener`] 上报，[`NetworkMonitor`] 负责缓存与广播。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use crate::error::Result;

/// 网络连接类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkClass {
    /// WiFi 连接，允许提交
    Wifi,
    /// 蜂窝网络，提交被跳过
    Cellular,
    /// 无连接
    Offline,
}

/// 网络类型变化事件
#[derive(Debug, Clone)]
pub struct NetworkClassEvent {
    pub old_class: NetworkClass,
    pub new_class: NetworkClass,
    pub timestamp: u64,
}

/// 网络状态监听器 trait（由平台层实现，如 Android/iOS）
#[async_trait]
pub trait NetworkStatusListener: Send + Sync + std::fmt::Debug {
    /// 获取当前网络类型
    async fn current_class(&self) -> NetworkClass;

    /// 开始监听网络类型变化
    async fn start_monitoring(&self) -> Result<broadcast::Receiver<NetworkClassEvent>>;

    /// 停止监听
    async fn stop_monitoring(&self);
}

/// 网络监控管理器
#[derive(Debug)]
pub struct NetworkMonitor {
    listener: Arc<dyn NetworkStatusListener>,
    class_sender: broadcast::Sender<NetworkClassEvent>,
    current_class: Arc<tokio::sync::RwLock<NetworkClass>>,
}

impl NetworkMonitor {
    pub fn new(listener: Arc<dyn NetworkStatusListener>) -> Self {
        let (class_sender, _) = broadcast::channel(100);

        Self {
            listener,
            class_sender,
            current_class: Arc::new(tokio::sync::RwLock::new(NetworkClass::Offline)),
        }
    }

    /// 启动网络监控
    pub async fn start(&self) -> Result<()> {
        let initial = self.listener.current_class().await;
        *self.current_class.write().await = initial;

        let mut receiver = self.listener.start_monitoring().await?;
        let class_sender = self.class_sender.clone();
        let current_class = self.current_class.clone();

        // 启动监听任务
        tokio::spawn(async move {
            while let Ok(event) = receiver.recv().await {
                {
                    let mut class = current_class.write().await;
                    *class = event.new_class;
                }
                let _ = class_sender.send(event);
            }
        });

        Ok(())
    }

    /// 获取当前网络类型
    pub async fn current_class(&self) -> NetworkClass {
        *self.current_class.read().await
    }

    /// 手动设置网络类型（用于平台回调或测试）
    pub async fn set_class(&self, new_class: NetworkClass) {
        let old_class = {
            let mut class = self.current_class.write().await;
            let old = *class;
            *class = new_class;
            old
        };

        let event = NetworkClassEvent {
            old_class,
            new_class,
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        };
        let _ = self.class_sender.send(event);
    }

    /// 订阅网络类型变化
    pub fn subscribe(&self) -> broadcast::Receiver<NetworkClassEvent> {
        self.class_sender.subscribe()
    }

    /// 提交门禁：当前是否为 WiFi 类连接
    pub async fn is_wifi(&self) -> bool {
        self.current_class().await == NetworkClass::Wifi
    }
}
