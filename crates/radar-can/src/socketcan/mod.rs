//! SocketCAN CAN FD 适配器实现
//!
//! 基于 Linux 内核 SocketCAN 子系统，使用 `CAN_RAW_FD_FRAMES` socket，
//! 同时收发经典 CAN 帧与 CAN FD 帧。
//!
//! ## 限制
//!
//! - **仅限 Linux 平台**
//! - **接口配置**：波特率/数据段波特率由系统工具（`ip link`）完成，例如
//!   `sudo ip link set can0 type can bitrate 500000 dbitrate 2000000 fd on`
//! - **时间戳**：使用软件时间戳（接收时刻的 Unix 微秒）

use crate::{CanAdapter, CanDeviceError, CanDeviceErrorKind, CanError, RadarFrame};
use socketcan::{
    CanAnyFrame, CanDataFrame, CanError as SocketCanError, CanErrorFrame, CanFdFrame, CanFdSocket,
    EmbeddedFrame, ExtendedId, Frame, Id, Socket, StandardId,
};
use std::os::unix::io::AsRawFd;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{error, trace, warn};

mod interface_check;
pub mod split;

use interface_check::ensure_fd_interface;
pub use split::{SocketCanFdRxAdapter, SocketCanFdTxAdapter};

/// 默认读超时，与 `PipelineConfig::receive_timeout_ms` 的默认值一致
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// SocketCAN CAN FD 适配器
///
/// ```no_run
/// use radar_can::{CanAdapter, RadarFrame, SocketCanFdAdapter};
///
/// let mut adapter = SocketCanFdAdapter::new("can0").unwrap();
/// adapter.send(RadarFrame::new_fd(0x200, &[0u8; 47])).unwrap();
/// let frame = adapter.receive().unwrap();
/// ```
#[derive(Debug)]
pub struct SocketCanFdAdapter {
    socket: CanFdSocket,
    /// 接口名称（如 "can0"）
    interface: String,
    read_timeout: Duration,
}

impl SocketCanFdAdapter {
    /// 打开 CAN FD 接口
    ///
    /// 打开前检查接口存在且处于 UP 状态，否则返回带修复提示的 `CanError::Device`。
    pub fn new(interface: impl Into<String>) -> Result<Self, CanError> {
        let interface = interface.into();
        let socket = open_fd_socket(&interface)?;

        socket.set_read_timeout(DEFAULT_READ_TIMEOUT).map_err(CanError::Io)?;
        enable_error_frames(&socket, &interface);

        trace!("SocketCAN FD interface '{}' opened", interface);
        Ok(Self {
            socket,
            interface,
            read_timeout: DEFAULT_READ_TIMEOUT,
        })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// 设置读超时（`SO_RCVTIMEO`）
    pub fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), CanError> {
        // 零超时在 SO_RCVTIMEO 语义下表示永久阻塞，这里改为最小非零值
        let effective = if timeout.is_zero() {
            Duration::from_micros(1)
        } else {
            timeout
        };
        self.socket.set_read_timeout(effective).map_err(CanError::Io)?;
        self.read_timeout = timeout;
        Ok(())
    }
}

// ============================================================================
// 共享的 socket 工具函数（适配器与 split 后的 RX/TX 共用）
// ============================================================================

/// 确认接口 UP 且支持 FD 后打开 FD socket（禁用回环）
pub(crate) fn open_fd_socket(interface: &str) -> Result<CanFdSocket, CanError> {
    ensure_fd_interface(interface)?;
    trace!("CAN interface '{}' is UP and FD capable", interface);

    let socket = CanFdSocket::open(interface).map_err(|e| {
        CanError::Device(CanDeviceError::new(
            CanDeviceErrorKind::Backend,
            format!("Failed to open CAN FD interface '{}': {}", interface, e),
        ))
    })?;

    // 禁用回环：本进程发出的周期帧不应再被自己的 RX 线程收到
    if let Err(e) = set_raw_option(&socket, libc::CAN_RAW_LOOPBACK, 0) {
        warn!(
            "Failed to disable CAN_RAW_LOOPBACK on '{}': {}",
            interface, e
        );
    } else {
        trace!(
            "SocketCAN interface '{}' loopback disabled (CAN_RAW_LOOPBACK=0)",
            interface
        );
    }

    Ok(socket)
}

/// 接收全部错误帧类别，使总线关闭/溢出能够上报
pub(crate) fn enable_error_frames(socket: &CanFdSocket, interface: &str) {
    if let Err(e) = set_raw_option(socket, libc::CAN_RAW_ERR_FILTER, libc::CAN_ERR_MASK as libc::c_int)
    {
        warn!(
            "Failed to enable error frames on '{}': {}, bus-off will not be reported",
            interface, e
        );
    }
}

fn set_raw_option(
    socket: &CanFdSocket,
    option: libc::c_int,
    value: libc::c_int,
) -> Result<(), std::io::Error> {
    let ret = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::SOL_CAN_RAW,
            option,
            &value as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// 读取下一个数据帧
///
/// 远程帧与可忽略的错误帧被跳过；总线关闭与缓冲区溢出上报为错误。
/// 超过 `timeout` 仍未读到数据帧时返回 [`CanError::Timeout`]。
pub(crate) fn read_data_frame(
    socket: &CanFdSocket,
    timeout: Duration,
) -> Result<RadarFrame, CanError> {
    next_data_frame(|| socket.read_frame().map_err(map_io_error), timeout)
}

/// 跳过远程帧和可忽略的错误帧，直到读到数据帧
///
/// 被跳过的帧会让单次读超时重新计时，因此总等待时间由 `timeout` 截止时间兜底，
/// 持续的错误帧流也不会让调用方阻塞超过一个超时周期。
fn next_data_frame<F>(mut read: F, timeout: Duration) -> Result<RadarFrame, CanError>
where
    F: FnMut() -> Result<CanAnyFrame, CanError>,
{
    let deadline = Instant::now() + timeout;
    loop {
        let any = read()?;
        let timestamp_us = wall_clock_micros();

        match any {
            CanAnyFrame::Normal(frame) => {
                return Ok(
                    RadarFrame::new(frame.raw_id(), frame.data(), frame.is_extended(), false)
                        .with_timestamp(timestamp_us),
                );
            },
            CanAnyFrame::Fd(frame) => {
                return Ok(
                    RadarFrame::new(frame.raw_id(), frame.data(), frame.is_extended(), true)
                        .with_timestamp(timestamp_us),
                );
            },
            CanAnyFrame::Remote(frame) => {
                trace!("Ignoring remote frame 0x{:X}", frame.raw_id());
            },
            CanAnyFrame::Error(frame) => classify_error_frame(frame)?,
        }

        if Instant::now() >= deadline {
            trace!("No data frame before read deadline ({:?})", timeout);
            return Err(CanError::Timeout);
        }
    }
}

fn classify_error_frame(frame: CanErrorFrame) -> Result<(), CanError> {
    let socketcan_error = SocketCanError::from(frame);
    match &socketcan_error {
        SocketCanError::BusOff => {
            error!("CAN Bus Off error detected");
            Err(CanError::BusOff)
        },
        SocketCanError::ControllerProblem(problem) => {
            let problem_str = format!("{}", problem);
            if problem_str.contains("overflow") || problem_str.contains("Overflow") {
                error!("CAN Buffer Overflow detected: {}", problem);
                Err(CanError::BufferOverflow)
            } else {
                warn!("CAN Controller Problem: {}, ignoring", problem);
                Ok(())
            }
        },
        _ => {
            warn!("CAN Error Frame received: {}, ignoring", socketcan_error);
            Ok(())
        },
    }
}

/// 发送一帧（FD 帧按 FD 发送，否则按经典帧发送）
pub(crate) fn write_radar_frame(socket: &CanFdSocket, frame: &RadarFrame) -> Result<(), CanError> {
    let id = to_socketcan_id(frame)?;
    let payload = frame.data_slice();

    if frame.is_fd {
        let fd_frame = CanFdFrame::new(id, payload).ok_or_else(|| invalid_frame(frame))?;
        socket.write_frame(&fd_frame).map_err(map_io_error)?;
    } else {
        let data_frame = CanDataFrame::new(id, payload).ok_or_else(|| invalid_frame(frame))?;
        socket.write_frame(&data_frame).map_err(map_io_error)?;
    }

    trace!(
        "Sent CAN frame: ID=0x{:X}, len={}, fd={}",
        frame.id, frame.len, frame.is_fd
    );
    Ok(())
}

fn to_socketcan_id(frame: &RadarFrame) -> Result<Id, CanError> {
    let id = if frame.is_extended {
        ExtendedId::new(frame.id).map(Id::Extended)
    } else {
        u16::try_from(frame.id)
            .ok()
            .and_then(StandardId::new)
            .map(Id::Standard)
    };
    id.ok_or_else(|| invalid_frame(frame))
}

fn invalid_frame(frame: &RadarFrame) -> CanError {
    CanError::Device(CanDeviceError::new(
        CanDeviceErrorKind::InvalidFrame,
        format!(
            "Failed to build frame with ID 0x{:X} (len {}, extended {}, fd {})",
            frame.id, frame.len, frame.is_extended, frame.is_fd
        ),
    ))
}

/// 读超时映射为 `CanError::Timeout`
fn map_io_error(e: std::io::Error) -> CanError {
    match e.kind() {
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => CanError::Timeout,
        _ => CanError::Io(e),
    }
}

fn wall_clock_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

// ============================================================================
// trait 实现
// ============================================================================

use crate::SplittableAdapter;

impl SplittableAdapter for SocketCanFdAdapter {
    type RxAdapter = SocketCanFdRxAdapter;
    type TxAdapter = SocketCanFdTxAdapter;

    /// 分离为独立的 RX 和 TX 适配器
    ///
    /// RX 保留原 socket；TX 在同一接口上打开第二个 socket，
    /// 两者互不共享文件状态标志。
    fn split(self) -> Result<(Self::RxAdapter, Self::TxAdapter), CanError> {
        let tx_adapter = SocketCanFdTxAdapter::new(&self.interface)?;
        let rx_adapter = SocketCanFdRxAdapter::from_socket(self.socket, self.read_timeout);

        trace!(
            "SocketCanFdAdapter split into RX and TX adapters (interface: {})",
            self.interface
        );
        Ok((rx_adapter, tx_adapter))
    }
}

impl CanAdapter for SocketCanFdAdapter {
    fn send(&mut self, frame: RadarFrame) -> Result<(), CanError> {
        write_radar_frame(&self.socket, &frame)
    }

    fn receive(&mut self) -> Result<RadarFrame, CanError> {
        let frame = read_data_frame(&self.socket, self.read_timeout)?;
        trace!(
            "Received CAN frame: ID=0x{:X}, len={}, timestamp_us={}",
            frame.id, frame.len, frame.timestamp_us
        );
        Ok(frame)
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        if let Err(e) = self.set_read_timeout(timeout) {
            warn!("Failed to set receive timeout: {}", e);
        }
    }

    fn receive_timeout(&mut self, timeout: Duration) -> Result<RadarFrame, CanError> {
        let old_timeout = self.read_timeout;
        self.set_read_timeout(timeout)?;
        let result = self.receive();
        let _ = self.set_read_timeout(old_timeout);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use socketcan::CanRemoteFrame;
    use std::process::Command;

    fn can_interface_exists(interface: &str) -> bool {
        Command::new("ip")
            .args(["link", "show", interface])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    macro_rules! require_vcan0 {
        () => {
            if !can_interface_exists("vcan0") {
                eprintln!("Skipping test: vcan0 interface not available");
                return;
            }
        };
    }

    #[test]
    fn test_map_io_error_timeout() {
        let e = std::io::Error::from(std::io::ErrorKind::WouldBlock);
        assert!(matches!(map_io_error(e), CanError::Timeout));
        let e = std::io::Error::from(std::io::ErrorKind::TimedOut);
        assert!(matches!(map_io_error(e), CanError::Timeout));
        let e = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(matches!(map_io_error(e), CanError::Io(_)));
    }

    fn remote_frame(id: u16) -> CanAnyFrame {
        let id = StandardId::new(id).unwrap();
        CanAnyFrame::Remote(<CanRemoteFrame as EmbeddedFrame>::new_remote(id, 0).unwrap())
    }

    #[test]
    fn test_endless_remote_frames_hit_read_deadline() {
        let mut reads = 0u32;
        let start = Instant::now();
        let result = next_data_frame(
            || {
                reads += 1;
                std::thread::sleep(Duration::from_millis(2));
                Ok(remote_frame(0x123))
            },
            Duration::from_millis(20),
        );
        assert!(matches!(result, Err(CanError::Timeout)));
        assert!(reads >= 2);
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_data_frame_after_skipped_remote_frame() {
        let mut queue = vec![
            CanAnyFrame::Fd(
                <CanFdFrame as EmbeddedFrame>::new(StandardId::new(0x140).unwrap(), &[0xAB; 16])
                    .unwrap(),
            ),
            remote_frame(0x7FF),
        ];
        let frame = next_data_frame(
            || queue.pop().ok_or(CanError::Timeout),
            Duration::from_millis(100),
        )
        .unwrap();
        assert_eq!(frame.id, 0x140);
        assert!(frame.is_fd);
        assert_eq!(frame.data_slice(), &[0xAB; 16]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_zero_timeout_returns_after_first_skip() {
        let mut reads = 0u32;
        let result = next_data_frame(
            || {
                reads += 1;
                Ok(remote_frame(0x321))
            },
            Duration::ZERO,
        );
        assert!(matches!(result, Err(CanError::Timeout)));
        assert_eq!(reads, 1);
    }

    #[test]
    fn test_to_socketcan_id_rejects_oversized_standard_id() {
        let mut frame = RadarFrame::new_fd(0x140, &[0u8; 8]);
        frame.id = 0x800;
        assert!(to_socketcan_id(&frame).is_err());
        frame.id = 0x7FF;
        assert!(matches!(to_socketcan_id(&frame), Ok(Id::Standard(_))));
    }

    #[test]
    fn test_new_invalid_interface() {
        let result = SocketCanFdAdapter::new("nonexistent_can99");
        assert!(matches!(result, Err(CanError::Device(_))));
    }

    #[test]
    #[serial]
    fn test_fd_send_on_vcan0() {
        require_vcan0!();
        let mut adapter = match SocketCanFdAdapter::new("vcan0") {
            Ok(adapter) => adapter,
            Err(e) => {
                eprintln!("Skipping test: vcan0 not usable ({})", e);
                return;
            },
        };
        assert_eq!(adapter.interface(), "vcan0");
        assert_eq!(adapter.read_timeout(), DEFAULT_READ_TIMEOUT);
        adapter
            .send(RadarFrame::new_fd(0x200, &[0xAA; 47]))
            .expect("FD send should succeed on vcan0");
        adapter
            .send(RadarFrame::new_standard(0x123, &[1, 2, 3]))
            .expect("classic send should succeed on vcan0");
    }

    #[test]
    #[serial]
    fn test_receive_timeout_on_idle_vcan0() {
        require_vcan0!();
        let Ok(mut adapter) = SocketCanFdAdapter::new("vcan0") else {
            return;
        };
        // 回环已禁用，自己发的帧不会被收到
        let _ = adapter.send(RadarFrame::new_fd(0x210, &[0u8; 12]));
        loop {
            match adapter.receive_timeout(Duration::from_millis(20)) {
                Err(CanError::Timeout) => break,
                // vcan0 上可能有其他进程的流量
                Ok(frame) => assert_ne!(frame.id, 0x210),
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
    }
}
