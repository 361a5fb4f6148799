//! 原始帧诊断日志（CAN 嗅探视图的数据源）
//!
//! 固定容量环形缓冲，满了淘汰最旧的帧。所有收到的帧都会先写入这里，
//! 与后续分类/解码是否成功无关。

use parking_lot::Mutex;
use radar_protocol::RadarFrame;
use std::collections::VecDeque;

/// 帧来源总线
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bus {
    /// 雷达总线（目标列表、状态帧）
    Radar,
    /// 整车总线（车速、轮速）
    Vehicle,
}

impl Bus {
    pub const fn name(self) -> &'static str {
        match self {
            Bus::Radar => "radar",
            Bus::Vehicle => "vehicle",
        }
    }
}

/// 日志中的一条记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggedFrame {
    /// 全局递增序号（跨总线）
    pub sequence: u64,
    pub bus: Bus,
    pub frame: RadarFrame,
}

#[derive(Debug)]
struct LogInner {
    frames: VecDeque<LoggedFrame>,
    next_sequence: u64,
}

/// 有界帧日志
#[derive(Debug)]
pub struct FrameLog {
    capacity: usize,
    inner: Mutex<LogInner>,
}

impl FrameLog {
    /// 容量至少为 1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(LogInner {
                frames: VecDeque::with_capacity(capacity),
                next_sequence: 0,
            }),
        }
    }

    /// 追加一帧，返回分配的序号
    pub fn push(&self, bus: Bus, frame: RadarFrame) -> u64 {
        let mut inner = self.inner.lock();
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        if inner.frames.len() == self.capacity {
            inner.frames.pop_front();
        }
        inner.frames.push_back(LoggedFrame {
            sequence,
            bus,
            frame,
        });
        sequence
    }

    /// 全部记录（从旧到新）
    pub fn snapshot(&self) -> Vec<LoggedFrame> {
        self.inner.lock().frames.iter().copied().collect()
    }

    /// 最近 `n` 条（从旧到新）
    pub fn recent(&self, n: usize) -> Vec<LoggedFrame> {
        let inner = self.inner.lock();
        let skip = inner.frames.len().saturating_sub(n);
        inner.frames.iter().skip(skip).copied().collect()
    }

    /// 某条总线上的记录
    pub fn for_bus(&self, bus: Bus) -> Vec<LoggedFrame> {
        self.inner
            .lock()
            .frames
            .iter()
            .filter(|f| f.bus == bus)
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 自创建以来写入过的总帧数
    pub fn total_logged(&self) -> u64 {
        self.inner.lock().next_sequence
    }

    pub fn clear(&self) {
        self.inner.lock().frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(id: u16) -> RadarFrame {
        RadarFrame::new_standard(id, &[id as u8])
    }

    #[test]
    fn test_evicts_oldest_first() {
        let log = FrameLog::new(3);
        for id in 0..5u16 {
            log.push(Bus::Radar, frame(id));
        }
        let ids: Vec<u32> = log.snapshot().iter().map(|f| f.frame.id).collect();
        assert_eq!(ids, vec![2, 3, 4]);
        assert_eq!(log.len(), 3);
        assert_eq!(log.total_logged(), 5);
        assert_eq!(log.snapshot()[0].sequence, 2);
    }

    #[test]
    fn test_recent_and_bus_filter() {
        let log = FrameLog::new(8);
        log.push(Bus::Radar, frame(0x140));
        log.push(Bus::Vehicle, frame(0x164));
        log.push(Bus::Radar, frame(0x160));

        let recent: Vec<u32> = log.recent(2).iter().map(|f| f.frame.id).collect();
        assert_eq!(recent, vec![0x164, 0x160]);
        assert_eq!(log.recent(10).len(), 3);
        assert_eq!(log.for_bus(Bus::Vehicle).len(), 1);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let log = FrameLog::new(0);
        assert_eq!(log.capacity(), 1);
        log.push(Bus::Radar, frame(1));
        log.push(Bus::Radar, frame(2));
        assert_eq!(log.snapshot()[0].frame.id, 2);
        log.clear();
        assert!(log.is_empty());
    }
}
