//! Mock CAN 适配器（无硬件依赖，用于测试）
//!
//! `MockCanAdapter` 的克隆共享同一份内部状态：测试代码持有一个句柄用于注入接收帧
//! 和检查已发送帧，另一个句柄交给驱动。

use crate::{
    CanAdapter, CanDeviceError, CanDeviceErrorKind, CanError, RadarFrame, RxAdapter,
    SplittableAdapter, TxAdapter,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// 可注入的接收故障
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFault {
    Timeout,
    BusOff,
    BufferOverflow,
    /// 设备消失（致命）
    DeviceLost,
}

impl MockFault {
    fn to_error(self) -> CanError {
        match self {
            MockFault::Timeout => CanError::Timeout,
            MockFault::BusOff => CanError::BusOff,
            MockFault::BufferOverflow => CanError::BufferOverflow,
            MockFault::DeviceLost => CanError::Device(CanDeviceError::new(
                CanDeviceErrorKind::NoDevice,
                "mock device lost",
            )),
        }
    }
}

#[derive(Debug)]
enum RxItem {
    Frame(RadarFrame),
    Fault(MockFault),
}

#[derive(Debug, Default)]
struct MockState {
    rx_queue: VecDeque<RxItem>,
    sent: Vec<RadarFrame>,
}

#[derive(Debug, Clone)]
pub struct MockCanAdapter {
    state: Arc<Mutex<MockState>>,
    fail_send: Arc<AtomicBool>,
    /// 持续的发送故障（优先于 `fail_send`）
    send_fault: Arc<Mutex<Option<MockFault>>>,
    /// 队列为空时 `receive` 的等待时间（模拟读超时）
    idle_delay: Duration,
}

impl Default for MockCanAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCanAdapter {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            fail_send: Arc::new(AtomicBool::new(false)),
            send_fault: Arc::new(Mutex::new(None)),
            idle_delay: Duration::from_millis(1),
        }
    }

    pub fn with_idle_delay(mut self, delay: Duration) -> Self {
        self.idle_delay = delay;
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 追加一个待接收帧
    pub fn push_frame(&self, frame: RadarFrame) {
        self.lock().rx_queue.push_back(RxItem::Frame(frame));
    }

    pub fn push_frames(&self, frames: impl IntoIterator<Item = RadarFrame>) {
        let mut state = self.lock();
        state.rx_queue.extend(frames.into_iter().map(RxItem::Frame));
    }

    /// 追加一个接收故障（按队列顺序触发一次）
    pub fn inject(&self, fault: MockFault) {
        self.lock().rx_queue.push_back(RxItem::Fault(fault));
    }

    /// 尚未被接收的条目数
    pub fn pending_rx(&self) -> usize {
        self.lock().rx_queue.len()
    }

    /// 已发送帧的拷贝
    pub fn sent_frames(&self) -> Vec<RadarFrame> {
        self.lock().sent.clone()
    }

    /// 取出并清空已发送帧
    pub fn take_sent(&self) -> Vec<RadarFrame> {
        std::mem::take(&mut self.lock().sent)
    }

    /// 之后的发送是否失败
    pub fn set_send_failure(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::Release);
    }

    /// 之后的发送都返回 `fault` 对应的错误，`None` 恢复正常
    pub fn set_send_fault(&self, fault: Option<MockFault>) {
        *self
            .send_fault
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = fault;
    }

    fn next_rx(&self) -> Result<RadarFrame, CanError> {
        let item = self.lock().rx_queue.pop_front();
        match item {
            Some(RxItem::Frame(frame)) => Ok(frame),
            Some(RxItem::Fault(fault)) => Err(fault.to_error()),
            None => {
                if !self.idle_delay.is_zero() {
                    std::thread::sleep(self.idle_delay);
                }
                Err(CanError::Timeout)
            },
        }
    }

    fn record_tx(&self, frame: RadarFrame) -> Result<(), CanError> {
        let fault = *self
            .send_fault
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(fault) = fault {
            return Err(fault.to_error());
        }
        if self.fail_send.load(Ordering::Acquire) {
            return Err(CanError::Io(std::io::Error::other("mock send failure")));
        }
        self.lock().sent.push(frame);
        Ok(())
    }
}

impl CanAdapter for MockCanAdapter {
    fn send(&mut self, frame: RadarFrame) -> Result<(), CanError> {
        self.record_tx(frame)
    }

    fn receive(&mut self) -> Result<RadarFrame, CanError> {
        self.next_rx()
    }
}

impl RxAdapter for MockCanAdapter {
    fn receive(&mut self) -> Result<RadarFrame, CanError> {
        self.next_rx()
    }
}

impl TxAdapter for MockCanAdapter {
    fn send(&mut self, frame: RadarFrame) -> Result<(), CanError> {
        self.record_tx(frame)
    }
}

impl SplittableAdapter for MockCanAdapter {
    type RxAdapter = MockCanAdapter;
    type TxAdapter = MockCanAdapter;

    fn split(self) -> Result<(Self::RxAdapter, Self::TxAdapter), CanError> {
        Ok((self.clone(), self))
    }
}
