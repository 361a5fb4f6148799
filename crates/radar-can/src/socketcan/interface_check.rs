//! CAN FD 接口就绪检查
//!
//! 打开 socket 之前，通过 `ioctl(SIOCGIFFLAGS / SIOCGIFMTU)` 只读地查询接口：
//! 雷达目标帧为 64 字节 FD 帧，接口必须处于 UP 状态且 MTU 达到 CAN FD 的 72 字节。
//! 查询不需要特殊权限。

use crate::{CanDeviceError, CanDeviceErrorKind, CanError};
use libc::{AF_INET, IFF_UP, SIOCGIFFLAGS, SIOCGIFMTU, SOCK_DGRAM, ifreq};
use std::ffi::CString;
use std::io;
use tracing::trace;

/// IFNAMSIZ - 1
const MAX_IFACE_NAME_LEN: usize = 15;

/// `struct canfd_frame` 的大小；经典 CAN 接口为 16
const CANFD_MTU: i32 = 72;

/// 接口的只读状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InterfaceState {
    pub up: bool,
    pub mtu: i32,
}

impl InterfaceState {
    /// 查询接口标志与 MTU
    ///
    /// 名称无效或接口不存在返回 `CanError::Device`，socket/ioctl 失败返回 `CanError::Io`。
    pub fn query(interface: &str) -> Result<Self, CanError> {
        let name = validate_name(interface)?;
        if unsafe { libc::if_nametoindex(name.as_ptr()) } == 0 {
            return Err(device_error(
                CanDeviceErrorKind::NoDevice,
                format!(
                    "CAN interface '{}' does not exist ({}). Create it first:\n  sudo ip link add dev {} type can",
                    interface,
                    io::Error::last_os_error(),
                    interface
                ),
            ));
        }

        let socket = QuerySocket::open()?;
        let flags = socket.read_int(interface, SIOCGIFFLAGS)?;
        let mtu = socket.read_int(interface, SIOCGIFMTU)?;

        let state = Self {
            // ifru_flags 是 c_short，只取低 16 位
            up: (flags as libc::c_short as i32 & IFF_UP) != 0,
            mtu,
        };
        trace!("Interface '{}': up={}, mtu={}", interface, state.up, state.mtu);
        Ok(state)
    }

    pub fn fd_capable(&self) -> bool {
        self.mtu >= CANFD_MTU
    }

    /// UP 且支持 CAN FD 才能承载雷达链路
    pub fn ensure_ready(&self, interface: &str) -> Result<(), CanError> {
        if !self.up {
            return Err(device_error(
                CanDeviceErrorKind::NotFound,
                format!(
                    "CAN interface '{}' exists but is not UP. Start it first:\n  sudo ip link set up {}",
                    interface, interface
                ),
            ));
        }
        if !self.fd_capable() {
            return Err(device_error(
                CanDeviceErrorKind::UnsupportedConfig,
                format!(
                    "CAN interface '{}' has MTU {} and cannot carry FD frames. Enable FD first:\n  sudo ip link set {} mtu {}",
                    interface, self.mtu, interface, CANFD_MTU
                ),
            ));
        }
        Ok(())
    }
}

/// 查询接口并确认可用于雷达链路
pub(crate) fn ensure_fd_interface(interface: &str) -> Result<(), CanError> {
    InterfaceState::query(interface)?.ensure_ready(interface)
}

fn validate_name(interface: &str) -> Result<CString, CanError> {
    if interface.len() > MAX_IFACE_NAME_LEN {
        return Err(device_error(
            CanDeviceErrorKind::UnsupportedConfig,
            format!(
                "Interface name '{}' exceeds {} bytes",
                interface, MAX_IFACE_NAME_LEN
            ),
        ));
    }
    CString::new(interface).map_err(|e| {
        device_error(
            CanDeviceErrorKind::UnsupportedConfig,
            format!("Interface name contains NUL: {}", e),
        )
    })
}

/// 仅用于 ioctl 查询的 UDP socket，析构时关闭
struct QuerySocket(libc::c_int);

impl QuerySocket {
    fn open() -> Result<Self, CanError> {
        let fd = unsafe { libc::socket(AF_INET, SOCK_DGRAM, 0) };
        if fd < 0 {
            return Err(CanError::Io(io::Error::last_os_error()));
        }
        Ok(Self(fd))
    }

    /// 发出一个以接口名为参数的 ioctl，读回 `ifr_ifru` 开头的整数
    fn read_int(&self, interface: &str, request: libc::c_ulong) -> Result<i32, CanError> {
        // 名称长度已由 validate_name 保证小于 IFNAMSIZ，结尾保持为 0
        let mut ifr: ifreq = unsafe { std::mem::zeroed() };
        for (dst, src) in ifr.ifr_name.iter_mut().zip(interface.as_bytes()) {
            *dst = *src as libc::c_char;
        }

        let ret = unsafe { libc::ioctl(self.0, request as _, &mut ifr as *mut ifreq) };
        if ret < 0 {
            return Err(CanError::Io(io::Error::last_os_error()));
        }
        Ok(unsafe { *(std::ptr::addr_of!(ifr.ifr_ifru) as *const libc::c_int) })
    }
}

impl Drop for QuerySocket {
    fn drop(&mut self) {
        unsafe { libc::close(self.0) };
    }
}

fn device_error(kind: CanDeviceErrorKind, message: String) -> CanError {
    CanError::Device(CanDeviceError::new(kind, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_message(result: Result<(), CanError>) -> (CanDeviceErrorKind, String) {
        match result {
            Err(CanError::Device(e)) => (e.kind, e.message),
            other => panic!("Expected Device error, got: {:?}", other),
        }
    }

    #[test]
    fn test_missing_interface_suggests_creation() {
        let (kind, msg) = device_message(ensure_fd_interface("rdrcan999"));
        assert_eq!(kind, CanDeviceErrorKind::NoDevice);
        assert!(msg.contains("does not exist"), "got: {}", msg);
        assert!(msg.contains("ip link add"), "got: {}", msg);
    }

    #[test]
    fn test_rejects_bad_names() {
        let (_, msg) = device_message(ensure_fd_interface("can0\0"));
        assert!(msg.contains("NUL"), "got: {}", msg);

        let (kind, msg) = device_message(ensure_fd_interface(&"a".repeat(20)));
        assert_eq!(kind, CanDeviceErrorKind::UnsupportedConfig);
        assert!(msg.contains("exceeds"), "got: {}", msg);
    }

    #[test]
    fn test_down_interface_is_not_ready() {
        let state = InterfaceState { up: false, mtu: CANFD_MTU };
        let (kind, msg) = device_message(state.ensure_ready("can0"));
        assert_eq!(kind, CanDeviceErrorKind::NotFound);
        assert!(msg.contains("ip link set up can0"), "got: {}", msg);
    }

    #[test]
    fn test_classic_mtu_cannot_carry_object_frames() {
        let state = InterfaceState { up: true, mtu: 16 };
        assert!(!state.fd_capable());
        let (kind, msg) = device_message(state.ensure_ready("can1"));
        assert_eq!(kind, CanDeviceErrorKind::UnsupportedConfig);
        assert!(msg.contains("mtu 72"), "got: {}", msg);

        let fd = InterfaceState { up: true, mtu: CANFD_MTU };
        assert!(fd.ensure_ready("can1").is_ok());
    }
}
