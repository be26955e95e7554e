//! 分块累积器 - 把单条记录聚合成网络批次
//!
//! 提交上限独立于调度器的轮长：满块在累积过程中即时吐出，
//! 轮末或会话末的残块由 [`ChunkAccumulator::flush`] 收尾。

use crate::record::{Chunk, PendingRecord, RecordType};

/// 单一记录类型的分块累积器
#[derive(Debug)]
pub struct ChunkAccumulator {
    record_type: RecordType,
    limit: usize,
    buffer: Vec<PendingRecord>,
}

impl ChunkAccumulator {
    pub fn new(record_type: RecordType, limit: usize) -> Self {
        Self {
            record_type,
            limit,
            buffer: Vec::with_capacity(limit),
        }
    }

    /// 追加一条记录；达到提交上限时吐出一个满块
    pub fn push(&mut self, record: PendingRecord) -> Option<Chunk> {
        self.buffer.push(record);
        if self.buffer.len() >= self.limit {
            self.flush()
        } else {
            None
        }
    }

    /// 取出当前残块；空块返回 `None`，静默丢弃
    pub fn flush(&mut self) -> Option<Chunk> {
        if self.buffer.is_empty() {
            return None;
        }
        Some(Chunk {
            record_type: self.record_type,
            records: std::mem::replace(&mut self.buffer, Vec::with_capacity(self.limit)),
        })
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordValues;

    fn record(id: i64) -> PendingRecord {
        PendingRecord {
            id,
            timestamp: 1000 + id,
            is_driving: false,
            values: RecordValues::LinearAcceleration {
                x: 0.0,
                y: 0.0,
                z: 9.8,
            },
        }
    }

    #[test]
    fn test_emits_full_chunks_then_remainder() {
        // 7 条记录、上限 3 → 分块大小 [3, 3, 1]
        let mut acc = ChunkAccumulator::new(RecordType::LinearAcceleration, 3);
        let mut sizes = Vec::new();

        for id in 1..=7 {
            if let Some(chunk) = acc.push(record(id)) {
                sizes.push(chunk.len());
            }
        }
        if let Some(chunk) = acc.flush() {
            sizes.push(chunk.len());
        }

        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[test]
    fn test_flush_empty_is_none() {
        let mut acc = ChunkAccumulator::new(RecordType::Gyroscope, 5);
        assert!(acc.flush().is_none());

        assert!(acc.push(record(1)).is_none());
        assert!(acc.flush().is_some());
        // 二次 flush 没有残留
        assert!(acc.flush().is_none());
    }

    #[test]
    fn test_chunk_preserves_order() {
        let mut acc = ChunkAccumulator::new(RecordType::LinearAcceleration, 3);
        assert!(acc.push(record(5)).is_none());
        assert!(acc.push(record(6)).is_none());
        let chunk = acc.push(record(7)).unwrap();
        assert_eq!(chunk.ids(), vec![5, 6, 7]);
    }
}
