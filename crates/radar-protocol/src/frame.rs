//! CAN / CAN FD 帧抽象
//!
//! `RadarFrame` 是协议层和硬件层之间的中间抽象。雷达总线使用 CAN FD，
//! 因此数据区固定为 64 字节，未使用部分为 0。

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// CAN FD 最大数据长度
pub const CANFD_MAX_LEN: usize = 64;

/// 经典 CAN 最大数据长度
pub const CAN_MAX_LEN: usize = 8;

/// CAN FD 数据长度码
///
/// 枚举值是 4 bit DLC，与实际字节数不同，字节数见 [`FdDataLengthCode::num_bytes`]。
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum FdDataLengthCode {
    Bytes0 = 0,
    Bytes1 = 1,
    Bytes2 = 2,
    Bytes3 = 3,
    Bytes4 = 4,
    Bytes5 = 5,
    Bytes6 = 6,
    Bytes7 = 7,
    Bytes8 = 8,
    Bytes12 = 9,
    Bytes16 = 10,
    Bytes20 = 11,
    Bytes24 = 12,
    Bytes32 = 13,
    Bytes48 = 14,
    Bytes64 = 15,
}

impl FdDataLengthCode {
    /// 返回能容纳 `length` 字节的最小 DLC，超过 64 字节返回 `None`
    pub fn for_length(length: usize) -> Option<Self> {
        Some(match length {
            0 => Self::Bytes0,
            1 => Self::Bytes1,
            2 => Self::Bytes2,
            3 => Self::Bytes3,
            4 => Self::Bytes4,
            5 => Self::Bytes5,
            6 => Self::Bytes6,
            7 => Self::Bytes7,
            8 => Self::Bytes8,
            9..=12 => Self::Bytes12,
            13..=16 => Self::Bytes16,
            17..=20 => Self::Bytes20,
            21..=24 => Self::Bytes24,
            25..=32 => Self::Bytes32,
            33..=48 => Self::Bytes48,
            49..=64 => Self::Bytes64,
            _ => return None,
        })
    }

    /// 该 DLC 对应的字节数
    pub fn num_bytes(self) -> usize {
        match self {
            Self::Bytes12 => 12,
            Self::Bytes16 => 16,
            Self::Bytes20 => 20,
            Self::Bytes24 => 24,
            Self::Bytes32 => 32,
            Self::Bytes48 => 48,
            Self::Bytes64 => 64,
            short => u8::from(short) as usize,
        }
    }
}

/// CAN 2.0 / CAN FD 帧的统一抽象
///
/// # 设计特性
///
/// - **Copy trait**：固定 64 字节，无堆分配
/// - **FD 填充**：`new_fd` 会把长度补齐到下一个合法的 FD 长度
/// - **时间戳**：`timestamp_us` 由适配器填充，0 表示不可用
///
/// ```rust
/// use radar_protocol::RadarFrame;
///
/// let frame = RadarFrame::new_fd(0x200, &[0u8; 47]);
/// assert_eq!(frame.len, 48);
/// assert_eq!(frame.dlc(), 14);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadarFrame {
    /// CAN ID（标准帧或扩展帧）
    pub id: u32,

    /// 帧数据（固定 64 字节，未使用部分为 0）
    pub data: [u8; CANFD_MAX_LEN],

    /// 有效数据长度（经典帧 0-8，FD 帧为合法 FD 长度）
    pub len: u8,

    /// 是否为扩展帧（29-bit ID）
    pub is_extended: bool,

    /// 是否为 CAN FD 帧
    pub is_fd: bool,

    /// 接收时间戳（微秒），0 表示不可用
    pub timestamp_us: u64,
}

impl RadarFrame {
    /// 创建经典 CAN 标准帧（超过 8 字节的部分被截断）
    pub fn new_standard(id: u16, data: &[u8]) -> Self {
        Self::new(id as u32, data, false, false)
    }

    /// 创建经典 CAN 扩展帧
    pub fn new_extended(id: u32, data: &[u8]) -> Self {
        Self::new(id, data, true, false)
    }

    /// 创建 CAN FD 标准帧，长度补齐到合法 FD 长度（超过 64 字节的部分被截断）
    pub fn new_fd(id: u16, data: &[u8]) -> Self {
        Self::new(id as u32, data, false, true)
    }

    /// 通用构造器
    pub fn new(id: u32, data: &[u8], is_extended: bool, is_fd: bool) -> Self {
        let max = if is_fd { CANFD_MAX_LEN } else { CAN_MAX_LEN };
        let copy_len = data.len().min(max);
        let mut fixed_data = [0u8; CANFD_MAX_LEN];
        fixed_data[..copy_len].copy_from_slice(&data[..copy_len]);

        let len = if is_fd {
            FdDataLengthCode::for_length(copy_len)
                .map(FdDataLengthCode::num_bytes)
                .unwrap_or(CANFD_MAX_LEN)
        } else {
            copy_len
        };

        Self {
            id,
            data: fixed_data,
            len: len as u8,
            is_extended,
            is_fd,
            timestamp_us: 0,
        }
    }

    /// 附加时间戳
    pub fn with_timestamp(mut self, timestamp_us: u64) -> Self {
        self.timestamp_us = timestamp_us;
        self
    }

    /// 获取数据切片（只包含有效数据）
    pub fn data_slice(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// 获取 CAN ID
    pub fn id(&self) -> u32 {
        self.id
    }

    /// 4 bit DLC
    pub fn dlc(&self) -> u8 {
        FdDataLengthCode::for_length(self.len as usize)
            .map(u8::from)
            .unwrap_or(FdDataLengthCode::Bytes64 as u8)
    }
}
