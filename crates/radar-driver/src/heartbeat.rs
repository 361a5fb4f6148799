//! 总线在线监测
//!
//! 每个监测器持有自己的单调时钟锚点，同一进程内的雷达总线与整车总线互不影响。
//! 最近一帧的时刻以“锚点起微秒数 + 1”存放在 `AtomicU64` 中，0 表示尚未收到任何帧。

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 单条总线的在线监测器
#[derive(Debug)]
pub struct ConnectionMonitor {
    anchor: Instant,
    /// 锚点起的微秒数 + 1；0 = 尚未收到帧
    last_feedback: AtomicU64,
    timeout: Duration,
}

impl ConnectionMonitor {
    /// ```
    /// # use radar_driver::ConnectionMonitor;
    /// # use std::time::Duration;
    /// let monitor = ConnectionMonitor::new(Duration::from_secs(1));
    /// assert!(!monitor.check_connection());
    /// monitor.register_feedback();
    /// assert!(monitor.check_connection());
    /// ```
    pub fn new(timeout: Duration) -> Self {
        Self {
            anchor: Instant::now(),
            last_feedback: AtomicU64::new(0),
            timeout,
        }
    }

    fn now_micros(&self) -> u64 {
        self.anchor.elapsed().as_micros() as u64 + 1
    }

    /// 超时窗口内收到过帧即视为在线
    pub fn check_connection(&self) -> bool {
        self.time_since_last_feedback()
            .is_some_and(|elapsed| elapsed < self.timeout)
    }

    /// 每收到一帧调用一次
    pub fn register_feedback(&self) {
        self.last_feedback.store(self.now_micros(), Ordering::Relaxed);
    }

    /// 收到第一帧之前为 `None`
    pub fn time_since_last_feedback(&self) -> Option<Duration> {
        let last_us = self.last_feedback.load(Ordering::Relaxed);
        if last_us == 0 {
            return None;
        }
        Some(Duration::from_micros(
            self.now_micros().saturating_sub(last_us),
        ))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_initially_disconnected() {
        let monitor = ConnectionMonitor::new(Duration::from_secs(1));
        assert!(!monitor.check_connection());
        assert!(monitor.time_since_last_feedback().is_none());
    }

    #[test]
    fn test_timeout_after_delay() {
        let monitor = ConnectionMonitor::new(Duration::from_millis(50));
        monitor.register_feedback();
        assert!(monitor.check_connection());

        thread::sleep(Duration::from_millis(100));
        assert!(!monitor.check_connection());

        monitor.register_feedback();
        assert!(monitor.check_connection());
    }

    #[test]
    fn test_monitors_are_independent() {
        let radar = ConnectionMonitor::new(Duration::from_secs(1));
        let vehicle = ConnectionMonitor::new(Duration::from_secs(1));
        radar.register_feedback();
        assert!(radar.check_connection());
        assert!(!vehicle.check_connection());
    }
}
