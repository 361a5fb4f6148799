//! E2E 保护能力
//!
//! 入站帧用 `verify` 校验，出站帧用 `protect` 就地写入计数器和 CRC。
//! 上层只依赖 [`E2eProtection`]；[`Profile05`] 是 AUTOSAR E2E Profile 05 的实现。
//!
//! ## Profile 05 布局（相对 `offset`）
//!
//! ```text
//! [offset]     CRC 低字节
//! [offset + 1] CRC 高字节
//! [offset + 2] 8 bit 计数器
//! [offset + 3] ... 数据
//! ```
//!
//! CRC 为 CRC-16/CCITT-FALSE，覆盖 `offset` 之前的字节、CRC 之后的 `length`
//! 个字节，最后依次追加 Data ID 的低字节和高字节。

use crate::ProtocolError;

/// E2E 保护能力接口
pub trait E2eProtection: Send + Sync {
    /// 校验入站负载（CRC 位于偏移 0）
    ///
    /// `length` 为 CRC 之后参与计算的字节数。只比较 CRC，计数器回绕不视为失败。
    fn verify(&self, payload: &[u8], length: usize, data_id: u16) -> bool;

    /// 保护出站负载：按需递增计数器，再计算并写入 CRC
    fn protect(
        &self,
        payload: &mut [u8],
        length: usize,
        offset: usize,
        data_id: u16,
        increment_counter: bool,
    ) -> Result<(), ProtocolError>;
}

/// AUTOSAR E2E Profile 05
#[derive(Debug, Clone, Copy, Default)]
pub struct Profile05;

/// CRC + 计数器头部长度
pub const P05_HEADER_LEN: usize = 3;

impl Profile05 {
    pub fn new() -> Self {
        Self
    }

    /// 计算保护 CRC
    ///
    /// 调用方保证 `offset + 2 + length <= payload.len()`。
    pub fn compute_crc(payload: &[u8], length: usize, offset: usize, data_id: u16) -> u16 {
        let mut crc = crc16_ccitt_false_update(0xFFFF, &payload[..offset]);
        crc = crc16_ccitt_false_update(crc, &payload[offset + 2..offset + 2 + length]);
        crc16_ccitt_false_update(crc, &data_id.to_le_bytes())
    }

    /// 读取计数器
    pub fn counter(payload: &[u8], offset: usize) -> Option<u8> {
        payload.get(offset + 2).copied()
    }
}

impl E2eProtection for Profile05 {
    fn verify(&self, payload: &[u8], length: usize, data_id: u16) -> bool {
        // 计数器必须在保护范围内
        if length == 0 || length + 2 > payload.len() {
            return false;
        }
        let expected = u16::from_le_bytes([payload[0], payload[1]]);
        Self::compute_crc(payload, length, 0, data_id) == expected
    }

    fn protect(
        &self,
        payload: &mut [u8],
        length: usize,
        offset: usize,
        data_id: u16,
        increment_counter: bool,
    ) -> Result<(), ProtocolError> {
        let required = offset + 2 + length.max(1);
        if length == 0 || required > payload.len() {
            return Err(ProtocolError::InvalidLength {
                expected: required,
                actual: payload.len(),
            });
        }

        if increment_counter {
            payload[offset + 2] = payload[offset + 2].wrapping_add(1);
        }

        let crc = Self::compute_crc(payload, length, offset, data_id);
        payload[offset..offset + 2].copy_from_slice(&crc.to_le_bytes());
        Ok(())
    }
}

/// CRC-16/CCITT-FALSE 增量计算（poly 0x1021，无反射，无异或输出）
pub fn crc16_ccitt_false_update(mut crc: u16, bytes: &[u8]) -> u16 {
    for &b in bytes {
        crc ^= (b as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc16_check_value() {
        assert_eq!(crc16_ccitt_false_update(0xFFFF, b"123456789"), 0x29B1);
    }

    #[test]
    fn test_protect_then_verify() {
        let e2e = Profile05::new();
        let mut payload = [0x00, 0x00, 0x00, 0xF8, 0x08];
        e2e.protect(&mut payload, 3, 0, 0xA47, true).unwrap();
        assert_eq!(payload[2], 1);
        assert!(e2e.verify(&payload, 3, 0xA47));
        // Data ID 不同则校验失败
        assert!(!e2e.verify(&payload, 3, 0xA48));
    }

    #[test]
    fn test_verify_detects_corruption() {
        let e2e = Profile05::new();
        let mut payload = [0u8; 16];
        payload[5] = 0x42;
        e2e.protect(&mut payload, 14, 0, 0x8CF, true).unwrap();
        assert!(e2e.verify(&payload, 14, 0x8CF));
        payload[5] ^= 0x01;
        assert!(!e2e.verify(&payload, 14, 0x8CF));
    }

    #[test]
    fn test_counter_wraps_and_still_verifies() {
        let e2e = Profile05::new();
        let mut payload = [0u8; 8];
        payload[2] = 0xFF;
        e2e.protect(&mut payload, 6, 0, 0xC10, true).unwrap();
        assert_eq!(Profile05::counter(&payload, 0), Some(0));
        assert!(e2e.verify(&payload, 6, 0xC10));
    }

    #[test]
    fn test_protect_with_offset() {
        let e2e = Profile05::new();
        let mut payload = [0xAA, 0xBB, 0, 0, 0, 0x10, 0x20];
        e2e.protect(&mut payload, 3, 2, 0x123, false).unwrap();
        assert_eq!(payload[4], 0);
        let crc = Profile05::compute_crc(&payload, 3, 2, 0x123);
        assert_eq!(&payload[2..4], &crc.to_le_bytes());
        // offset 之前的字节参与计算
        let mut other = payload;
        other[0] = 0xAB;
        assert_ne!(Profile05::compute_crc(&other, 3, 2, 0x123), crc);
    }

    #[test]
    fn test_invalid_lengths() {
        let e2e = Profile05::new();
        let mut short = [0u8; 3];
        assert!(e2e.protect(&mut short, 4, 0, 1, true).is_err());
        assert!(e2e.protect(&mut short, 0, 0, 1, true).is_err());
        assert!(!e2e.verify(&short, 0, 1));
        assert!(!e2e.verify(&short, 2, 1));
    }
}
