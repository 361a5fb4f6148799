//! # Radar CAN Adapter Layer
//!
//! CAN 硬件抽象层，提供统一的 CAN / CAN FD 接口抽象。
//!
//! - Linux: [`SocketCanFdAdapter`]（内核 SocketCAN，CAN FD）
//! - 测试: `mock::MockCanAdapter`（需启用 `mock` feature）

use std::time::Duration;
use thiserror::Error;

// 重新导出 radar-protocol 中的 RadarFrame
pub use radar_protocol::RadarFrame;

#[cfg(target_os = "linux")]
pub mod socketcan;

#[cfg(target_os = "linux")]
pub use socketcan::{SocketCanFdAdapter, SocketCanFdRxAdapter, SocketCanFdTxAdapter};

#[cfg(any(test, feature = "mock"))]
pub mod mock;

/// CAN 适配层统一错误类型
#[derive(Error, Debug)]
pub enum CanError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] CanDeviceError),
    #[error("Read timeout")]
    Timeout,
    #[error("Buffer overflow")]
    BufferOverflow,
    #[error("Bus off")]
    BusOff,
    #[error("Device not started")]
    NotStarted,
}

impl CanError {
    /// 是否为致命错误（设备不可恢复，重试无意义）
    pub fn is_fatal(&self) -> bool {
        match self {
            CanError::Device(e) => e.is_fatal(),
            CanError::NotStarted => true,
            _ => false,
        }
    }
}

/// 设备/后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanDeviceErrorKind {
    Unknown,
    NotFound,
    NoDevice,
    AccessDenied,
    Busy,
    UnsupportedConfig,
    InvalidFrame,
    Backend,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct CanDeviceError {
    pub kind: CanDeviceErrorKind,
    pub message: String,
}

impl CanDeviceError {
    pub fn new(kind: CanDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            CanDeviceErrorKind::NoDevice
                | CanDeviceErrorKind::AccessDenied
                | CanDeviceErrorKind::NotFound
        )
    }
}

impl From<String> for CanDeviceError {
    fn from(message: String) -> Self {
        Self::new(CanDeviceErrorKind::Unknown, message)
    }
}

impl From<&str> for CanDeviceError {
    fn from(message: &str) -> Self {
        Self::new(CanDeviceErrorKind::Unknown, message)
    }
}

pub trait CanAdapter {
    fn send(&mut self, frame: RadarFrame) -> Result<(), CanError>;
    fn receive(&mut self) -> Result<RadarFrame, CanError>;
    fn set_receive_timeout(&mut self, _timeout: Duration) {}
    fn receive_timeout(&mut self, timeout: Duration) -> Result<RadarFrame, CanError> {
        self.set_receive_timeout(timeout);
        self.receive()
    }
    fn try_receive(&mut self) -> Result<Option<RadarFrame>, CanError> {
        match self.receive_timeout(Duration::ZERO) {
            Ok(frame) => Ok(Some(frame)),
            Err(CanError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// 只读适配器（RX 线程持有）
///
/// `receive` 最多阻塞到适配器的读超时，超时返回 `CanError::Timeout`。
pub trait RxAdapter {
    fn receive(&mut self) -> Result<RadarFrame, CanError>;
}

/// 只写适配器（TX 线程持有）
pub trait TxAdapter {
    fn send(&mut self, frame: RadarFrame) -> Result<(), CanError>;
}

pub trait SplittableAdapter: CanAdapter {
    type RxAdapter: RxAdapter;
    type TxAdapter: TxAdapter;
    fn split(self) -> Result<(Self::RxAdapter, Self::TxAdapter), CanError>;
}

impl<T: RxAdapter + ?Sized> RxAdapter for Box<T> {
    fn receive(&mut self) -> Result<RadarFrame, CanError> {
        (**self).receive()
    }
}

impl<T: TxAdapter + ?Sized> TxAdapter for Box<T> {
    fn send(&mut self, frame: RadarFrame) -> Result<(), CanError> {
        (**self).send(frame)
    }
}
