//! 周期发送
//!
//! 两个调度线程（车辆状态组、时间同步组）各自持有一组出站帧状态，
//! 到期时整组重新保护，经有界队列交给唯一的 TX 线程发送。
//!
//! 保护失败时整组都不提交：状态保持上一周期的值，本周期不发送任何帧。
//! 只有成功入队的帧才提交新状态，被丢弃的帧下个周期沿用原计数器。

use crate::metrics::RadarMetrics;
use crate::scheduler::run_periodic;
use crate::state::RadarContext;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use radar_can::TxAdapter;
use radar_protocol::{E2eProtection, OutboundFrameKind, OutboundFrameState, ProtocolError, RadarFrame};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

// ============================================================================
// 时间同步时钟
// ============================================================================

/// 时间同步帧的时间源
///
/// 单调时钟，以第一次读取为零点。
#[derive(Debug, Default)]
pub struct TimeSyncClock {
    epoch: OnceLock<Instant>,
}

impl TimeSyncClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前时间：(秒, 秒内纳秒)
    pub fn now(&self) -> (u32, u32) {
        let epoch = self.epoch.get_or_init(Instant::now);
        Self::split(epoch.elapsed())
    }

    /// 秒数超过 u32 时回绕
    pub fn split(elapsed: Duration) -> (u32, u32) {
        (elapsed.as_secs() as u32, elapsed.subsec_nanos())
    }
}

// ============================================================================
// 出站帧组
// ============================================================================

/// 同一周期发送的一组出站帧
pub struct OutboundGroup {
    name: &'static str,
    states: Vec<OutboundFrameState>,
    e2e: Arc<dyn E2eProtection>,
    clock: Option<Arc<TimeSyncClock>>,
}

impl OutboundGroup {
    /// 车辆状态组（0x200 / 0x210 / 0x220 / 0x230 / 0x240）
    pub fn vehicle(e2e: Arc<dyn E2eProtection>) -> Self {
        Self::from_kinds("vehicle", &OutboundFrameKind::VEHICLE_GROUP, e2e, None)
    }

    /// 时间同步组（0x250 / 0x251）
    pub fn time_sync(e2e: Arc<dyn E2eProtection>, clock: Arc<TimeSyncClock>) -> Self {
        Self::from_kinds(
            "time-sync",
            &OutboundFrameKind::TIME_SYNC_GROUP,
            e2e,
            Some(clock),
        )
    }

    fn from_kinds(
        name: &'static str,
        kinds: &[OutboundFrameKind],
        e2e: Arc<dyn E2eProtection>,
        clock: Option<Arc<TimeSyncClock>>,
    ) -> Self {
        Self {
            name,
            states: kinds.iter().map(|&kind| OutboundFrameState::new(kind)).collect(),
            e2e,
            clock,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 当前（上一次成功保护后的）状态
    pub fn states(&self) -> &[OutboundFrameState] {
        &self.states
    }

    /// 构建本周期的候选状态（不提交）
    ///
    /// 每帧的计数器加一并重新计算 CRC。任一帧失败则返回错误。
    pub fn prepare(&self) -> Result<Vec<OutboundFrameState>, ProtocolError> {
        let time = self.clock.as_ref().map(|clock| clock.now());

        self.states
            .iter()
            .map(|state| {
                let state = match (state.kind(), time) {
                    (OutboundFrameKind::TimeSyncSeconds, Some((secs, _))) => {
                        state.with_time_sync_value(secs)?
                    },
                    (OutboundFrameKind::TimeSyncNanos, Some((_, nanos))) => {
                        state.with_time_sync_value(nanos)?
                    },
                    _ => *state,
                };
                state.protected(self.e2e.as_ref())
            })
            .collect()
    }

    /// 提交第 `index` 帧的新状态（帧已入队）
    pub fn commit(&mut self, index: usize, state: OutboundFrameState) {
        if let Some(slot) = self.states.get_mut(index)
            && slot.kind() == state.kind()
        {
            *slot = state;
        }
    }
}

// ============================================================================
// 线程循环
// ============================================================================

/// 调度线程循环
///
/// 每个周期构建一组帧并尝试入队；队列满时丢弃该帧并计数（该帧状态不提交），
/// 队列断开（TX 线程已退出）时结束。
pub fn scheduler_loop(
    mut group: OutboundGroup,
    period: Duration,
    tick: Duration,
    queue: Sender<RadarFrame>,
    ctx: Arc<RadarContext>,
    is_running: Arc<AtomicBool>,
) {
    debug!(
        "{} scheduler started, period {:?}, {} frames",
        group.name(),
        period,
        group.states().len()
    );

    run_periodic(period, tick, &is_running, || {
        let next = match group.prepare() {
            Ok(next) => next,
            Err(e) => {
                RadarMetrics::incr(&ctx.metrics.tx_protect_failures);
                warn!("{} group protection failed, skipping cycle: {}", group.name(), e);
                return true;
            },
        };

        for (index, state) in next.into_iter().enumerate() {
            match queue.try_send(state.to_frame()) {
                Ok(()) => group.commit(index, state),
                Err(TrySendError::Full(frame)) => {
                    RadarMetrics::incr(&ctx.metrics.tx_queue_drops);
                    trace!("TX queue full, dropped frame 0x{:X}", frame.id);
                },
                Err(TrySendError::Disconnected(_)) => {
                    debug!("{} scheduler: TX queue disconnected", group.name());
                    return false;
                },
            }
        }

        ctx.publish_outbound(group.states());
        true
    });

    trace!("{} scheduler: loop exited", group.name());
}

/// TX 线程循环
///
/// 唯一持有发送端的线程。致命错误只停止 TX 侧（清除 `tx_running`），
/// RX 线程不受影响；非致命错误计数后继续。
pub fn tx_loop(
    mut tx: impl TxAdapter,
    queue: Receiver<RadarFrame>,
    ctx: Arc<RadarContext>,
    tick: Duration,
    is_running: Arc<AtomicBool>,
    tx_running: Arc<AtomicBool>,
) {
    loop {
        // Acquire: If we see false, we must see all cleanup writes from other threads
        if !is_running.load(Ordering::Acquire) || !tx_running.load(Ordering::Acquire) {
            trace!("TX thread: running flag is false, exiting");
            break;
        }

        let frame = match queue.recv_timeout(tick) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                trace!("TX thread: queue disconnected");
                break;
            },
        };

        match tx.send(frame) {
            Ok(()) => {
                RadarMetrics::incr(&ctx.metrics.tx_frames_total);
            },
            Err(e) => {
                let errors = RadarMetrics::incr(&ctx.metrics.tx_errors);
                if e.is_fatal() {
                    error!("TX thread: fatal error sending 0x{:X}: {}, stopping TX", frame.id, e);
                    // Release: All writes before this are visible to threads that see the false value
                    tx_running.store(false, Ordering::Release);
                    break;
                }
                warn!(
                    "TX thread: failed to send frame 0x{:X}: {} ({} errors so far)",
                    frame.id, e, errors
                );
            },
        }
    }

    trace!("TX thread: loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use radar_protocol::Profile05;

    /// 构建并提交整组
    fn run_cycle(group: &mut OutboundGroup) -> Result<Vec<RadarFrame>, ProtocolError> {
        let next = group.prepare()?;
        let frames = next.iter().map(OutboundFrameState::to_frame).collect();
        for (index, state) in next.into_iter().enumerate() {
            group.commit(index, state);
        }
        Ok(frames)
    }

    /// 前 `n` 次保护成功，之后全部失败
    struct FailAfter {
        inner: Profile05,
        remaining: std::sync::atomic::AtomicUsize,
    }

    impl E2eProtection for FailAfter {
        fn verify(&self, payload: &[u8], length: usize, data_id: u16) -> bool {
            self.inner.verify(payload, length, data_id)
        }

        fn protect(
            &self,
            payload: &mut [u8],
            length: usize,
            offset: usize,
            data_id: u16,
            increment_counter: bool,
        ) -> Result<(), ProtocolError> {
            let left = self.remaining.load(Ordering::Relaxed);
            if left == 0 {
                return Err(ProtocolError::InvalidLength {
                    expected: length,
                    actual: 0,
                });
            }
            self.remaining.store(left - 1, Ordering::Relaxed);
            self.inner.protect(payload, length, offset, data_id, increment_counter)
        }
    }

    #[test]
    fn test_clock_split() {
        assert_eq!(
            TimeSyncClock::split(Duration::new(3, 250_000_000)),
            (3, 250_000_000)
        );
        let clock = TimeSyncClock::new();
        let (secs, nanos) = clock.now();
        assert_eq!(secs, 0);
        assert!(nanos < 1_000_000_000);
    }

    #[test]
    fn test_vehicle_group_frames_verify() {
        let e2e = Profile05::new();
        let mut group = OutboundGroup::vehicle(Arc::new(Profile05::new()));
        let frames = run_cycle(&mut group).unwrap();

        let ids: Vec<u32> = frames.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![0x200, 0x210, 0x220, 0x230, 0x240]);

        for (frame, state) in frames.iter().zip(group.states()) {
            assert!(frame.is_fd);
            for section in state.kind().sections() {
                let bytes = &frame.data_slice()[section.start..section.start + section.len];
                assert!(
                    e2e.verify(bytes, section.protected_len(), section.data_id),
                    "section at {} of 0x{:X} failed",
                    section.start,
                    frame.id
                );
            }
            assert_eq!(state.counter(), 1);
        }
    }

    #[test]
    fn test_counters_advance_per_cycle() {
        let mut group = OutboundGroup::vehicle(Arc::new(Profile05::new()));
        for _ in 0..3 {
            run_cycle(&mut group).unwrap();
        }
        let car_config = group
            .states()
            .iter()
            .find(|s| s.kind() == OutboundFrameKind::CarConfig)
            .unwrap();
        assert_eq!(car_config.section_counter(0), Some(3));
        assert_eq!(car_config.section_counter(1), Some(3));
        assert_eq!(car_config.sequence(), 3);
    }

    #[test]
    fn test_failed_protection_commits_nothing() {
        let e2e = FailAfter {
            inner: Profile05::new(),
            // 第一个周期 6 段（0x210 两段）全部成功，第二个周期在中途失败
            remaining: std::sync::atomic::AtomicUsize::new(8),
        };
        let mut group = OutboundGroup::vehicle(Arc::new(e2e));
        run_cycle(&mut group).unwrap();
        let before: Vec<_> = group.states().to_vec();

        assert!(run_cycle(&mut group).is_err());
        assert_eq!(group.states(), before.as_slice());
    }

    #[test]
    fn test_time_sync_values_written_big_endian() {
        let clock = Arc::new(TimeSyncClock::new());
        let mut group = OutboundGroup::time_sync(Arc::new(Profile05::new()), clock);
        let frames = run_cycle(&mut group).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].id, 0x250);
        assert_eq!(frames[1].id, 0x251);

        let secs = u32::from_be_bytes(frames[0].data[4..8].try_into().unwrap());
        let nanos = u32::from_be_bytes(frames[1].data[4..8].try_into().unwrap());
        assert_eq!(secs, 0);
        assert!(nanos < 1_000_000_000);

        let e2e = Profile05::new();
        assert!(e2e.verify(&frames[0].data[..8], 6, 0xC10));
        assert!(e2e.verify(&frames[1].data[..8], 6, 0xC11));
    }

    #[test]
    fn test_dropped_frames_keep_previous_counter() {
        let mut group = OutboundGroup::vehicle(Arc::new(Profile05::new()));

        // 只有第一帧入队
        let next = group.prepare().unwrap();
        group.commit(0, next[0]);
        assert_eq!(group.states()[0].counter(), 1);
        assert_eq!(group.states()[1].counter(), 0);
        assert_eq!(group.states()[1].sequence(), 0);

        // 下个周期被丢弃的帧从原计数器继续
        let next = group.prepare().unwrap();
        assert_eq!(next[0].counter(), 2);
        assert_eq!(next[1].counter(), 1);
        assert_eq!(next[1].section_counter(1), Some(1));
    }

    #[test]
    fn test_scheduler_commits_only_enqueued_frames() {
        let ctx = Arc::new(RadarContext::default());
        let is_running = Arc::new(AtomicBool::new(true));
        let (queue_tx, queue_rx) = crossbeam_channel::bounded(1);

        let handle = std::thread::spawn({
            let ctx = ctx.clone();
            let is_running = is_running.clone();
            move || {
                scheduler_loop(
                    OutboundGroup::vehicle(Arc::new(Profile05::new())),
                    Duration::from_millis(20),
                    Duration::from_millis(2),
                    queue_tx,
                    ctx,
                    is_running,
                )
            }
        });

        std::thread::sleep(Duration::from_millis(70));
        is_running.store(false, Ordering::Release);
        handle.join().unwrap();

        // 队列容量 1：只有第一个周期的 0x200 入队
        let queued: Vec<RadarFrame> = queue_rx.try_iter().collect();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].id, 0x200);
        assert_eq!(queued[0].data[2], 1);

        let counters = ctx.outbound.load();
        assert_eq!(counters.get(OutboundFrameKind::VehicleMotion).unwrap().counter, 1);
        let car_config = counters.get(OutboundFrameKind::CarConfig).unwrap();
        assert_eq!(car_config.counter, 0);
        assert_eq!(car_config.sequence, 0);
        assert!(ctx.metrics.snapshot().tx_queue_drops >= 4);
    }
}
