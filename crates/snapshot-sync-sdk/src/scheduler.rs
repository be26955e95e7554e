//! 批次调度器 - 一次会话的轮转排空算法
//!
//! 会话开始时对六种类型各做一次未上传计数，然后按固定顺序轮转：
//! 每轮从每种类型最多拉取一个轮长的记录，经分块累积器吐给提交客户端。
//! 轮转（而不是逐类型排空）保证取消请求到来之前，高积压类型不会饿死
//! 其他类型的上传进度。
//!
//! 计数按整轮长推进，不按实际读取数：临近游标耗尽时计数会越过真实余量，
//! 真实读取数单独记录在 [`SessionStats::records_read`] 中，差异由测试显式
//! 标注。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::chunk::ChunkAccumulator;
use crate::error::Result;
use crate::record::{Chunk, RecordType};
use crate::store::{PendingStore, SessionReader};
use crate::submit::ChunkSubmitter;

/// 调度器配置
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SchedulerConfig {
    /// 单次提交的记录上限（分块大小）
    pub submission_limit: usize,
    /// 每轮每种类型最多拉取的记录数，约定为提交上限的 10 倍
    pub round_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            submission_limit: 10,
            round_size: 100,
        }
    }
}

/// 一次会话的统计
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// 按整轮长推进的逐类型计数，末轮可能超过实际读取数
    pub processed: HashMap<RecordType, u64>,
    /// 实际从游标读出的记录总数
    pub records_read: u64,
    /// 成功提交的分块数
    pub chunks_submitted: u64,
    /// 会话是否观察到软取消
    pub cancelled: bool,
}

/// 批次调度器
pub struct BatchScheduler {
    config: SchedulerConfig,
    store: PendingStore,
    submitter: Arc<dyn ChunkSubmitter>,
}

impl BatchScheduler {
    pub fn new(config: SchedulerConfig, store: PendingStore, submitter: Arc<dyn ChunkSubmitter>) -> Self {
        Self {
            config,
            store,
            submitter,
        }
    }

    /// 执行一次完整的排空会话
    ///
    /// 计数失败时会话不会开始。任何读取/分块/提交错误都会提前终止整个
    /// 会话（没有逐类型隔离）；无论正常结束、取消还是出错，游标都会被
    /// 释放。
    pub async fn run_session(&self, user_id: &str, cancel: &AtomicBool) -> Result<SessionStats> {
        let counts = self.store.count_all_pending().await?;
        let total: u64 = counts.values().sum();

        info!("📤 会话开始: user_id={}, 待上传总数={}", user_id, total);

        let mut stats = SessionStats::default();
        let mut reader = self.store.session_reader();

        let result = self
            .drain(&mut reader, user_id, &counts, total, cancel, &mut stats)
            .await;

        // 游标在每条退出路径上都被释放
        reader.release();

        match result {
            Ok(()) => {
                if stats.cancelled {
                    info!(
                        "🛑 会话被取消: 已读取 {} 条, 已提交 {} 个分块",
                        stats.records_read, stats.chunks_submitted
                    );
                } else {
                    info!(
                        "✅ 会话完成: 读取 {} 条, 提交 {} 个分块",
                        stats.records_read, stats.chunks_submitted
                    );
                }
                Ok(stats)
            }
            Err(e) => {
                error!("❌ 会话异常终止: {}", e);
                Err(e)
            }
        }
    }

    async fn drain(
        &self,
        reader: &mut SessionReader,
        user_id: &str,
        counts: &HashMap<RecordType, u64>,
        total: u64,
        cancel: &AtomicBool,
        stats: &mut SessionStats,
    ) -> Result<()> {
        let round_step = self.config.round_size as u64;
        let mut total_processed: u64 = 0;

        while total_processed < total && !cancel.load(Ordering::SeqCst) {
            for record_type in RecordType::ALL {
                let pending = counts.get(&record_type).copied().unwrap_or(0);
                let processed = stats.processed.get(&record_type).copied().unwrap_or(0);
                if processed >= pending {
                    continue;
                }

                let (read, submitted) = self
                    .drain_one_round(reader, user_id, record_type, cancel)
                    .await?;
                stats.records_read += read;
                stats.chunks_submitted += submitted;

                *stats.processed.entry(record_type).or_insert(0) += round_step;
                total_processed += round_step;
            }
        }

        if cancel.load(Ordering::SeqCst) {
            stats.cancelled = true;
        }

        Ok(())
    }

    /// 一种类型的一轮：最多拉取一个轮长，满块即时提交，轮末冲残块
    async fn drain_one_round(
        &self,
        reader: &mut SessionReader,
        user_id: &str,
        record_type: RecordType,
        cancel: &AtomicBool,
    ) -> Result<(u64, u64)> {
        let mut accumulator = ChunkAccumulator::new(record_type, self.config.submission_limit);
        let mut records_read: u64 = 0;
        let mut chunks_submitted: u64 = 0;

        while (records_read as usize) < self.config.round_size && !cancel.load(Ordering::SeqCst) {
            match reader.next_pending(record_type).await? {
                Some(record) => {
                    records_read += 1;
                    if let Some(chunk) = accumulator.push(record) {
                        self.submit_chunk(user_id, &chunk).await?;
                        chunks_submitted += 1;
                    }
                }
                // 游标耗尽不是错误
                None => break,
            }
        }

        if let Some(chunk) = accumulator.flush() {
            self.submit_chunk(user_id, &chunk).await?;
            chunks_submitted += 1;
        }

        debug!(
            "本轮读取 {} 条 {} 记录, 提交 {} 个分块",
            records_read,
            record_type.source_name(),
            chunks_submitted
        );

        Ok((records_read, chunks_submitted))
    }

    /// 提交失败不重试、不回灌：错误上抛提前终止会话，未确认的记录
    /// 在下一次会话中被重新选中（至少一次语义）
    async fn submit_chunk(&self, user_id: &str, chunk: &Chunk) -> Result<()> {
        self.submitter.submit(user_id, chunk).await
    }
}
