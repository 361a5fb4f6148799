//! RX 循环
//!
//! 每条总线一个 RX 线程，阻塞接收（带超时）并交给该总线的分发器处理。
//! 总线错误不会结束循环：计数、记录日志、退避后继续接收。

use crate::dispatcher::RxDispatcher;
use crate::error::DriverError;
use radar_can::RxAdapter;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, trace, warn};

/// RX 线程循环
///
/// # 参数
/// - `rx`: 接收适配器（线程独占）
/// - `dispatcher`: 该总线的分发器
/// - `backoff`: 总线错误后的退避时间
/// - `is_running`: 运行标志，清除后在一个接收超时内退出
pub fn rx_loop(
    mut rx: impl RxAdapter,
    mut dispatcher: RxDispatcher,
    backoff: Duration,
    is_running: Arc<AtomicBool>,
) {
    // 设置线程优先级（可选 feature）
    #[cfg(feature = "realtime")]
    {
        use thread_priority::*;
        use tracing::info;

        match set_current_thread_priority(ThreadPriority::Max) {
            Ok(_) => {
                info!("{} RX thread priority set to MAX (realtime)", dispatcher.bus().name());
            },
            Err(e) => {
                warn!(
                    "Failed to set {} RX thread priority: {}. \
                    On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                    dispatcher.bus().name(),
                    e
                );
            },
        }
    }

    let bus = dispatcher.bus().name();
    let mut consecutive_errors: u64 = 0;

    loop {
        // Acquire: If we see false, we must see all cleanup writes from other threads
        if !is_running.load(Ordering::Acquire) {
            trace!("{} RX thread: is_running flag is false, exiting", bus);
            break;
        }

        match dispatcher.poll_once(&mut rx) {
            Ok(_) => {
                if consecutive_errors > 0 {
                    warn!(
                        "{} RX thread: bus recovered after {} errors",
                        bus, consecutive_errors
                    );
                    consecutive_errors = 0;
                }
            },
            Err(DriverError::Can(e)) => {
                consecutive_errors += 1;
                // 同一段连续错误只在第一次输出 error/warn，之后降级为 trace
                if consecutive_errors == 1 {
                    if e.is_fatal() {
                        error!("{} RX thread: fatal bus error: {}, retrying", bus, e);
                    } else {
                        warn!("{} RX thread: bus error: {}", bus, e);
                    }
                } else {
                    trace!("{} RX thread: bus error #{}: {}", bus, consecutive_errors, e);
                }
                spin_sleep::sleep(backoff);
            },
            Err(e) => {
                warn!("{} RX thread: {}", bus, e);
            },
        }
    }

    trace!("{} RX thread: loop exited", bus);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RadarContext;
    use radar_can::mock::{MockCanAdapter, MockFault};
    use radar_protocol::{RadarFrame, SignalDatabase, SignalValues};
    use std::thread;

    struct EmptyDatabase;

    impl SignalDatabase for EmptyDatabase {
        fn decode(
            &self,
            id: u32,
            _payload: &[u8],
        ) -> Result<SignalValues, radar_protocol::ProtocolError> {
            Err(radar_protocol::ProtocolError::UnknownMessage { id })
        }

        fn encode(
            &self,
            id: u32,
            _values: &SignalValues,
        ) -> Result<Vec<u8>, radar_protocol::ProtocolError> {
            Err(radar_protocol::ProtocolError::UnknownMessage { id })
        }

        fn message_len(&self, _id: u32) -> Option<usize> {
            None
        }
    }

    #[test]
    fn test_loop_survives_bus_errors_and_stops_on_flag() {
        let ctx = Arc::new(RadarContext::default());
        let dispatcher = RxDispatcher::vehicle(ctx.clone(), Arc::new(EmptyDatabase));

        let mock = MockCanAdapter::new();
        mock.inject(MockFault::BusOff);
        mock.inject(MockFault::DeviceLost);
        mock.push_frame(RadarFrame::new_standard(0x123, &[1, 2, 3]));

        let is_running = Arc::new(AtomicBool::new(true));
        let handle = {
            let rx = mock.clone();
            let is_running = is_running.clone();
            thread::spawn(move || rx_loop(rx, dispatcher, Duration::from_millis(1), is_running))
        };

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while ctx.frame_log.is_empty() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        is_running.store(false, Ordering::Release);
        handle.join().unwrap();

        let metrics = ctx.metrics.snapshot();
        assert_eq!(metrics.bus_errors, 2);
        assert_eq!(metrics.rx_frames_total, 1);
        assert_eq!(ctx.frame_log.len(), 1);
    }
}
