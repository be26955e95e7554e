//! 会话协调器 - 互斥、软取消与宿主关闭信号
//!
//! 同一时刻最多一个会话在运行：重复的启动请求被忽略，停止请求只设置
//! 软取消标志、从不阻塞等待。会话以任何方式结束（正常、取消、出错）
//! 都会复位运行标志与取消标志，并通知宿主可以关闭。
//!
//! 运行标志与取消标志是协调器实例自己的状态，而不是进程级静态量，
//! 因此同一进程内可以并存多个互不干扰的协调器。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};
use tracing::{debug, error, info};

use tokio::sync::mpsc;

use crate::error::Result;
use crate::network::NetworkMonitor;
use crate::record::AckRequest;
use crate::scheduler::{BatchScheduler, SchedulerConfig};
use crate::store::PendingStore;
use crate::submit::{ChunkSubmitter, DeviceInfo, HttpSubmitClient, SubmitConfig};

/// 同步引擎整体配置
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SyncConfig {
    pub scheduler: SchedulerConfig,
    pub submit: SubmitConfig,
    pub device: DeviceInfo,
}

/// 会话协调器
pub struct SyncCoordinator {
    scheduler: Arc<BatchScheduler>,
    is_running: Arc<RwLock<bool>>,
    cancel_flag: Arc<AtomicBool>,
    shutdown_signal: Arc<Notify>,
}

impl SyncCoordinator {
    pub fn new(config: SchedulerConfig, store: PendingStore, submitter: Arc<dyn ChunkSubmitter>) -> Self {
        Self {
            scheduler: Arc::new(BatchScheduler::new(config, store, submitter)),
            is_running: Arc::new(RwLock::new(false)),
            cancel_flag: Arc::new(AtomicBool::new(false)),
            shutdown_signal: Arc::new(Notify::new()),
        }
    }

    /// 用生产 HTTP 提交客户端组装协调器
    ///
    /// 成功提交的分块会以 [`AckRequest`] 的形式送入 `ack_tx`，由外部的
    /// 确认协作方负责把记录标记为已上传。
    pub fn with_http_submitter(
        config: SyncConfig,
        store: PendingStore,
        network: Arc<NetworkMonitor>,
        ack_tx: mpsc::UnboundedSender<AckRequest>,
    ) -> Result<Self> {
        let submitter = Arc::new(HttpSubmitClient::new(
            config.submit,
            config.device,
            network,
            ack_tx,
        )?);
        Ok(Self::new(config.scheduler, store, submitter))
    }

    /// 请求开始一次排空会话（fire-and-forget）
    ///
    /// 已有会话在运行时本次请求是 no-op。运行标志在工作任务排定之前
    /// 就被置位，并发的启动请求只会产生一个会话。
    pub async fn request_start(&self, user_id: &str) {
        {
            let mut running = self.is_running.write().await;
            if *running {
                debug!("会话已在运行，忽略重复的启动请求");
                return;
            }
            // 取消标志必须在运行标志对外可见之前复位；颠倒顺序会吞掉
            // 紧跟在启动之后到达的停止请求
            self.cancel_flag.store(false, Ordering::SeqCst);
            *running = true;
        }

        let scheduler = self.scheduler.clone();
        let is_running = self.is_running.clone();
        let cancel_flag = self.cancel_flag.clone();
        let shutdown_signal = self.shutdown_signal.clone();
        let user_id = user_id.to_string();

        tokio::spawn(async move {
            match scheduler.run_session(&user_id, &cancel_flag).await {
                Ok(stats) => {
                    debug!(
                        "会话收尾: 读取 {} 条, 提交 {} 个分块, cancelled={}",
                        stats.records_read, stats.chunks_submitted, stats.cancelled
                    );
                }
                // 会话错误对控制面静默，只留下日志
                Err(e) => {
                    error!("会话失败: {}", e);
                }
            }

            cancel_flag.store(false, Ordering::SeqCst);
            *is_running.write().await = false;

            // 通知宿主可以关闭
            shutdown_signal.notify_waiters();
        });
    }

    /// 请求软停止（fire-and-forget）
    ///
    /// 有会话在运行时只设置取消标志，由会话协作式地观察；没有会话时
    /// 直接发出关闭信号。
    pub async fn request_stop(&self) {
        let running = *self.is_running.read().await;
        if running {
            info!("🛑 已请求软取消，等待会话协作退出");
            self.cancel_flag.store(true, Ordering::SeqCst);
        } else {
            debug!("没有运行中的会话，直接发出关闭信号");
            self.shutdown_signal.notify_waiters();
        }
    }

    /// 当前是否有会话在运行
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// 宿主用来等待"可以关闭"信号
    pub fn shutdown_signal(&self) -> Arc<Notify> {
        self.shutdown_signal.clone()
    }
}
