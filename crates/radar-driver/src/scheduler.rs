//! 周期调度
//!
//! 绝对截止时间调度：每次触发后 `next += period`，不以触发时刻为基准，
//! 因此长时间运行不会累积漂移。线程被延迟时会连续补发错过的周期。

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::trace;

/// 单调时钟上的周期截止时间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicSchedule {
    period: Duration,
    next_deadline: Instant,
}

impl PeriodicSchedule {
    /// 第一次截止时间为 `start`（立即触发）
    pub fn new(period: Duration, start: Instant) -> Self {
        Self {
            period,
            next_deadline: start,
        }
    }

    /// `now` 已到达截止时间则推进一个周期并返回 true
    ///
    /// 落后多个周期时需要重复调用，每次补发一个。
    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next_deadline {
            return false;
        }
        self.next_deadline += self.period;
        true
    }

    /// 距离下一次截止时间的剩余时间（已过期为 0）
    pub fn time_until(&self, now: Instant) -> Duration {
        self.next_deadline.saturating_duration_since(now)
    }

    pub fn next_deadline(&self) -> Instant {
        self.next_deadline
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

/// 周期执行 `on_tick`，直到 `is_running` 变为 false 或 `on_tick` 返回 false
///
/// 睡眠时长取 `min(tick, 剩余时间)`，保证停止信号最多延迟一个 tick 被观察到。
pub fn run_periodic(
    period: Duration,
    tick: Duration,
    is_running: &AtomicBool,
    mut on_tick: impl FnMut() -> bool,
) {
    let mut schedule = PeriodicSchedule::new(period, Instant::now());

    // Acquire: 看到 false 时必须能看到其他线程的清理写入
    while is_running.load(Ordering::Acquire) {
        let now = Instant::now();
        if schedule.poll(now) {
            if !on_tick() {
                trace!("Periodic task requested stop");
                return;
            }
            continue;
        }
        spin_sleep::sleep(schedule.time_until(now).min(tick));
    }
    trace!("Periodic task: is_running flag is false, exiting");
}
