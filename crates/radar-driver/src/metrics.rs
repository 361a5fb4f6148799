//! 运行指标
//!
//! 原子计数器，任何线程都可以无锁读取。

use std::sync::atomic::{AtomicU64, Ordering};

/// 雷达链路实时指标
///
/// ```rust
/// use radar_driver::RadarMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = RadarMetrics::default();
/// metrics.rx_frames_total.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().rx_frames_total, 1);
/// ```
#[derive(Debug, Default)]
pub struct RadarMetrics {
    /// 两条总线接收的总帧数
    pub rx_frames_total: AtomicU64,
    /// RX 超时次数（无数据时的正常现象）
    pub rx_timeouts: AtomicU64,
    /// 总线错误次数
    pub bus_errors: AtomicU64,

    /// 写入目标表的目标列表帧
    pub object_frames_applied: AtomicU64,
    /// 解码成功的状态帧
    pub status_frames_decoded: AtomicU64,
    /// E2E 校验失败但仍被解码的状态帧
    pub status_e2e_failures: AtomicU64,
    /// 自车运动更新次数
    pub ego_updates: AtomicU64,
    /// 只记录未解析的帧
    pub frames_logged_only: AtomicU64,

    /// 目标列表帧 E2E 校验失败
    pub e2e_failures: AtomicU64,
    /// 长度不符/解码失败的帧
    pub frames_malformed: AtomicU64,
    /// 未映射或超范围的目标列表帧
    pub frames_out_of_range: AtomicU64,
    /// 嗅探模式下跳过的目标列表帧
    pub frames_sniffer_skipped: AtomicU64,
    /// 缺失信号（以默认值替代）的累计数
    pub decode_misses: AtomicU64,

    /// 成功发送的帧
    pub tx_frames_total: AtomicU64,
    /// 队列满被丢弃的帧
    pub tx_queue_drops: AtomicU64,
    /// 发送失败次数
    pub tx_errors: AtomicU64,
    /// E2E 保护失败次数
    pub tx_protect_failures: AtomicU64,
}

impl RadarMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rx_frames_total: self.rx_frames_total.load(Ordering::Relaxed),
            rx_timeouts: self.rx_timeouts.load(Ordering::Relaxed),
            bus_errors: self.bus_errors.load(Ordering::Relaxed),
            object_frames_applied: self.object_frames_applied.load(Ordering::Relaxed),
            status_frames_decoded: self.status_frames_decoded.load(Ordering::Relaxed),
            status_e2e_failures: self.status_e2e_failures.load(Ordering::Relaxed),
            ego_updates: self.ego_updates.load(Ordering::Relaxed),
            frames_logged_only: self.frames_logged_only.load(Ordering::Relaxed),
            e2e_failures: self.e2e_failures.load(Ordering::Relaxed),
            frames_malformed: self.frames_malformed.load(Ordering::Relaxed),
            frames_out_of_range: self.frames_out_of_range.load(Ordering::Relaxed),
            frames_sniffer_skipped: self.frames_sniffer_skipped.load(Ordering::Relaxed),
            decode_misses: self.decode_misses.load(Ordering::Relaxed),
            tx_frames_total: self.tx_frames_total.load(Ordering::Relaxed),
            tx_queue_drops: self.tx_queue_drops.load(Ordering::Relaxed),
            tx_errors: self.tx_errors.load(Ordering::Relaxed),
            tx_protect_failures: self.tx_protect_failures.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub rx_frames_total: u64,
    pub rx_timeouts: u64,
    pub bus_errors: u64,
    pub object_frames_applied: u64,
    pub status_frames_decoded: u64,
    pub status_e2e_failures: u64,
    pub ego_updates: u64,
    pub frames_logged_only: u64,
    pub e2e_failures: u64,
    pub frames_malformed: u64,
    pub frames_out_of_range: u64,
    pub frames_sniffer_skipped: u64,
    pub decode_misses: u64,
    pub tx_frames_total: u64,
    pub tx_queue_drops: u64,
    pub tx_errors: u64,
    pub tx_protect_failures: u64,
}

impl MetricsSnapshot {
    /// 被丢弃的入站帧总数
    pub fn rx_dropped(&self) -> u64 {
        self.e2e_failures
            + self.frames_malformed
            + self.frames_out_of_range
            + self.frames_sniffer_skipped
    }

    /// 目标列表帧 E2E 失败率（百分比）
    pub fn e2e_failure_rate(&self) -> f64 {
        let total = self.object_frames_applied + self.e2e_failures;
        if total == 0 {
            return 0.0;
        }
        (self.e2e_failures as f64 / total as f64) * 100.0
    }
}
