//! SocketCAN FD 适配器分离实现
//!
//! RX 与 TX 各自持有一个独立打开的 `CanFdSocket`，可在不同线程中并发使用。
//! RX 依赖 `SO_RCVTIMEO` 实现超时，严禁设置 `O_NONBLOCK`。

use super::{enable_error_frames, open_fd_socket, read_data_frame, write_radar_frame};
use crate::{CanError, RadarFrame, RxAdapter, TxAdapter};
use socketcan::{CanFdSocket, Socket};
use std::time::Duration;
use tracing::trace;

/// 只读适配器（RX 线程持有）
pub struct SocketCanFdRxAdapter {
    socket: CanFdSocket,
    read_timeout: Duration,
}

impl SocketCanFdRxAdapter {
    pub(crate) fn from_socket(socket: CanFdSocket, read_timeout: Duration) -> Self {
        Self {
            socket,
            read_timeout,
        }
    }

    /// 直接在接口上打开一个 RX 适配器
    pub fn open(interface: &str, read_timeout: Duration) -> Result<Self, CanError> {
        let socket = open_fd_socket(interface)?;
        socket.set_read_timeout(read_timeout).map_err(CanError::Io)?;
        enable_error_frames(&socket, interface);
        Ok(Self::from_socket(socket, read_timeout))
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }
}

impl RxAdapter for SocketCanFdRxAdapter {
    fn receive(&mut self) -> Result<RadarFrame, CanError> {
        let frame = read_data_frame(&self.socket, self.read_timeout)?;
        trace!(
            "RX: ID=0x{:X}, len={}, fd={}",
            frame.id, frame.len, frame.is_fd
        );
        Ok(frame)
    }
}

/// 只写适配器（TX 线程持有）
pub struct SocketCanFdTxAdapter {
    socket: CanFdSocket,
}

impl SocketCanFdTxAdapter {
    /// 在接口上打开独立的 TX socket（回环已禁用）
    pub fn new(interface: &str) -> Result<Self, CanError> {
        let socket = open_fd_socket(interface)?;
        trace!("TX socket opened on '{}'", interface);
        Ok(Self { socket })
    }
}

impl TxAdapter for SocketCanFdTxAdapter {
    fn send(&mut self, frame: RadarFrame) -> Result<(), CanError> {
        write_radar_frame(&self.socket, &frame)
    }
}
