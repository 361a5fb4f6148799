//! 共享状态上下文
//!
//! 所有跨线程状态都通过 `ArcSwap` 整体替换发布：写者基于旧快照构建新值，
//! 再一次性 `store`，读者永远只看到完整的快照。

use crate::config::PipelineConfig;
use crate::frame_log::FrameLog;
use crate::heartbeat::ConnectionMonitor;
use crate::metrics::RadarMetrics;
use arc_swap::ArcSwap;
use radar_protocol::{
    EgoMotion, OutboundFrameKind, OutboundFrameState, RadarSignalStatus, RadarView,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 状态帧快照
///
/// 同步机制：ArcSwap（雷达 RX 线程单写者）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StatusSnapshot {
    pub status: RadarSignalStatus,
    /// 最近一帧是否通过 E2E 校验（仅作参考）
    pub e2e_verified: bool,
    /// 已解码的状态帧数，0 表示尚未收到
    pub frames_decoded: u64,
}

/// 单个出站逻辑帧的计数器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboundCounter {
    /// 第一个 E2E 段的 8 bit 计数器
    pub counter: u8,
    /// 已保护的次数
    pub sequence: u64,
}

/// 出站计数器快照
///
/// 同步机制：ArcSwap + rcu（两个调度线程并发写入不同的帧）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutboundCounters {
    counters: HashMap<OutboundFrameKind, OutboundCounter>,
}

impl OutboundCounters {
    /// 基于当前值构建包含 `states` 最新计数器的新值
    pub fn with_states(&self, states: &[OutboundFrameState]) -> Self {
        let mut counters = self.counters.clone();
        for state in states {
            counters.insert(
                state.kind(),
                OutboundCounter {
                    counter: state.counter(),
                    sequence: state.sequence(),
                },
            );
        }
        Self { counters }
    }

    pub fn get(&self, kind: OutboundFrameKind) -> Option<OutboundCounter> {
        self.counters.get(&kind).copied()
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

/// 雷达链路上下文
///
/// 显式拥有全部运行时状态，由 `RadarDriver` 创建并以 `Arc` 传入各线程。
pub struct RadarContext {
    /// 目标表（雷达 RX 线程单写者）
    pub radar_view: ArcSwap<RadarView>,
    /// 状态帧（雷达 RX 线程单写者）
    pub signal_status: ArcSwap<StatusSnapshot>,
    /// 自车运动（整车 RX 线程单写者）
    pub ego_motion: ArcSwap<EgoMotion>,
    /// 出站计数器（调度线程写入）
    pub outbound: ArcSwap<OutboundCounters>,

    /// 原始帧诊断日志
    pub frame_log: FrameLog,
    /// 运行时嗅探模式
    sniffer_enabled: AtomicBool,

    pub radar_link: ConnectionMonitor,
    pub vehicle_link: ConnectionMonitor,
    pub metrics: RadarMetrics,
}

impl RadarContext {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            radar_view: ArcSwap::from_pointee(RadarView::default()),
            signal_status: ArcSwap::from_pointee(StatusSnapshot::default()),
            ego_motion: ArcSwap::from_pointee(EgoMotion::default()),
            outbound: ArcSwap::from_pointee(OutboundCounters::default()),
            frame_log: FrameLog::new(config.frame_log_capacity),
            sniffer_enabled: AtomicBool::new(config.sniffer_enabled),
            radar_link: ConnectionMonitor::new(config.connection_timeout()),
            vehicle_link: ConnectionMonitor::new(config.connection_timeout()),
            metrics: RadarMetrics::new(),
        }
    }

    pub fn sniffer_enabled(&self) -> bool {
        self.sniffer_enabled.load(Ordering::Acquire)
    }

    pub fn set_sniffer_enabled(&self, enabled: bool) {
        self.sniffer_enabled.store(enabled, Ordering::Release);
    }

    /// 发布出站帧的最新计数器
    pub fn publish_outbound(&self, states: &[OutboundFrameState]) {
        self.outbound
            .rcu(|current| Arc::new(current.with_states(states)));
    }
}

impl Default for RadarContext {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radar_protocol::{INVALID_OBJECT_ID, Profile05};

    #[test]
    fn test_context_initial_state() {
        let ctx = RadarContext::default();
        let view = ctx.radar_view.load();
        assert!(view.objects.iter().all(|o| o.object_id == INVALID_OBJECT_ID));
        assert_eq!(ctx.signal_status.load().frames_decoded, 0);
        assert_eq!(**ctx.ego_motion.load(), EgoMotion::default());
        assert!(ctx.outbound.load().is_empty());
        assert!(!ctx.sniffer_enabled());
        assert!(!ctx.radar_link.check_connection());
    }

    #[test]
    fn test_snapshot_replacement_keeps_old_readers_intact() {
        let ctx = RadarContext::default();
        let before = ctx.ego_motion.load_full();
        ctx.ego_motion.store(Arc::new(before.with_speed(13.9)));
        assert_eq!(before.speed, 0.0);
        assert_eq!(ctx.ego_motion.load().speed, 13.9);
    }

    #[test]
    fn test_publish_outbound_merges() {
        let ctx = RadarContext::default();
        let e2e = Profile05::new();
        let motion = OutboundFrameState::new(OutboundFrameKind::VehicleMotion)
            .protected(&e2e)
            .unwrap();
        let nanos = OutboundFrameState::new(OutboundFrameKind::TimeSyncNanos)
            .protected(&e2e)
            .unwrap()
            .protected(&e2e)
            .unwrap();

        ctx.publish_outbound(&[motion]);
        ctx.publish_outbound(&[nanos]);

        let counters = ctx.outbound.load();
        assert_eq!(counters.len(), 2);
        assert_eq!(counters.get(OutboundFrameKind::VehicleMotion).unwrap().counter, 1);
        let n = counters.get(OutboundFrameKind::TimeSyncNanos).unwrap();
        assert_eq!((n.counter, n.sequence), (2, 2));
        assert!(counters.get(OutboundFrameKind::CarConfig).is_none());
    }
}
