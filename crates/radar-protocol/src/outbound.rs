//! 周期发送帧
//!
//! 每个出站逻辑帧由固定模板 + 一个或多个 E2E 段组成。0x210 由车辆配置段
//! （字节 0..5）和电源模式段（字节 5..9）拼接，两段各自保护，发送时补零到 12 字节。
//!
//! [`OutboundFrameState`] 不可变：保护或写入数据都返回新值，旧值不受影响。

use crate::e2e::{E2eProtection, Profile05};
use crate::frame::{CANFD_MAX_LEN, RadarFrame};
use crate::ids::*;
use crate::ProtocolError;

/// 一个 E2E 保护段（CRC 位于段首）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct E2eSection {
    pub start: usize,
    pub len: usize,
    pub data_id: u16,
    /// CRC 之后参与计算的字节数
    covered: usize,
}

impl E2eSection {
    /// CRC 之后参与计算的字节数
    pub const fn protected_len(&self) -> usize {
        self.covered
    }
}

/// CRC 覆盖段内 CRC 之后的全部字节
const fn section(start: usize, len: usize, data_id: u16) -> E2eSection {
    partial_section(start, len, len - 2, data_id)
}

/// CRC 只覆盖 CRC 之后的前 `covered` 个字节
const fn partial_section(start: usize, len: usize, covered: usize, data_id: u16) -> E2eSection {
    E2eSection {
        start,
        len,
        data_id,
        covered,
    }
}

// ============================================================================
// 模板
// ============================================================================

const VEH_MOTION_TEMPLATE: [u8; 47] = [
    0x00, 0x00, 0x00, 0xE0, 0x3F, 0xE0, 0x3F, 0xE0, 0x3F, 0x00, 0x80, 0x00, 0x00, 0x00, 0x80, 0x00,
    0x24, 0x42, 0x3F, 0x00, 0x00, 0x80, 0x7F, 0x80, 0x7F, 0x80, 0x7F, 0x80, 0x7F, 0x24, 0x24, 0x00,
    0x04, 0x24, 0x24, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

const CAR_CONFIG_TEMPLATE: [u8; 9] = [
    0x00, 0x00, 0x00, 0x09, 0x00, // CarConfig
    0x00, 0x00, 0x00, 0x01, // PowerMode
];

const GLOBAL_SNAPSHOT_TEMPLATE: [u8; 32] = [0; 32];
const VEH_MODES_TEMPLATE: [u8; 5] = [0x00, 0x00, 0x00, 0xF8, 0x08];
const FUNC_INFO_TEMPLATE: [u8; 4] = [0x00; 4];
const TIME_SYNC_TEMPLATE: [u8; 8] = [0x00; 8];

/// 时间同步帧中 u32 值（大端）的偏移
pub const TIME_SYNC_VALUE_OFFSET: usize = 4;

const VEH_MOTION_SECTIONS: [E2eSection; 1] = [section(0, 47, E2E_ID_VEH_MOTION_STATE)];
const CAR_CONFIG_SECTIONS: [E2eSection; 2] = [
    section(0, 5, E2E_ID_CAR_CONFIG),
    // 电源模式段 CRC 只覆盖计数器和第一个数据字节
    partial_section(5, 4, 2, E2E_ID_POWER_MODE),
];
const GLOBAL_SNAPSHOT_SECTIONS: [E2eSection; 1] = [section(0, 32, E2E_ID_GLOBAL_SNAPSHOT)];
const VEH_MODES_SECTIONS: [E2eSection; 1] = [section(0, 5, E2E_ID_VEH_MODES)];
const FUNC_INFO_SECTIONS: [E2eSection; 1] = [section(0, 4, E2E_ID_FUNC_INFO)];
const TIME_SYNC_SECONDS_SECTIONS: [E2eSection; 1] = [section(0, 8, E2E_ID_TIME_SYNC_SECONDS)];
const TIME_SYNC_NANOS_SECTIONS: [E2eSection; 1] = [section(0, 8, E2E_ID_TIME_SYNC_NANOS)];

/// 出站逻辑帧
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutboundFrameKind {
    /// 车辆运动状态（0x200）
    VehicleMotion,
    /// 车辆配置 + 电源模式（0x210）
    CarConfig,
    /// 全局快照（0x220）
    GlobalSnapshot,
    /// 车辆模式（0x230）
    VehicleModes,
    /// 功能信息（0x240）
    FunctionInfo,
    /// 时间同步：秒（0x250）
    TimeSyncSeconds,
    /// 时间同步：纳秒（0x251）
    TimeSyncNanos,
}

impl OutboundFrameKind {
    /// 60 ms 周期组
    pub const VEHICLE_GROUP: [Self; 5] = [
        Self::VehicleMotion,
        Self::CarConfig,
        Self::GlobalSnapshot,
        Self::VehicleModes,
        Self::FunctionInfo,
    ];

    /// 125 ms 周期组
    pub const TIME_SYNC_GROUP: [Self; 2] = [Self::TimeSyncSeconds, Self::TimeSyncNanos];

    pub const fn arbitration_id(self) -> u32 {
        match self {
            Self::VehicleMotion => ID_VEH_MOTION_STATE,
            Self::CarConfig => ID_CAR_CONFIG,
            Self::GlobalSnapshot => ID_GLOBAL_SNAPSHOT,
            Self::VehicleModes => ID_VEH_MODES,
            Self::FunctionInfo => ID_FUNC_INFO,
            Self::TimeSyncSeconds => ID_TIME_SYNC_SECONDS,
            Self::TimeSyncNanos => ID_TIME_SYNC_NANOS,
        }
    }

    pub fn template(self) -> &'static [u8] {
        match self {
            Self::VehicleMotion => &VEH_MOTION_TEMPLATE,
            Self::CarConfig => &CAR_CONFIG_TEMPLATE,
            Self::GlobalSnapshot => &GLOBAL_SNAPSHOT_TEMPLATE,
            Self::VehicleModes => &VEH_MODES_TEMPLATE,
            Self::FunctionInfo => &FUNC_INFO_TEMPLATE,
            Self::TimeSyncSeconds | Self::TimeSyncNanos => &TIME_SYNC_TEMPLATE,
        }
    }

    pub fn sections(self) -> &'static [E2eSection] {
        match self {
            Self::VehicleMotion => &VEH_MOTION_SECTIONS,
            Self::CarConfig => &CAR_CONFIG_SECTIONS,
            Self::GlobalSnapshot => &GLOBAL_SNAPSHOT_SECTIONS,
            Self::VehicleModes => &VEH_MODES_SECTIONS,
            Self::FunctionInfo => &FUNC_INFO_SECTIONS,
            Self::TimeSyncSeconds => &TIME_SYNC_SECONDS_SECTIONS,
            Self::TimeSyncNanos => &TIME_SYNC_NANOS_SECTIONS,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::VehicleMotion => "VehMotionState",
            Self::CarConfig => "CarConfig",
            Self::GlobalSnapshot => "GlobalSnapshot",
            Self::VehicleModes => "VehModes",
            Self::FunctionInfo => "FuncInfo",
            Self::TimeSyncSeconds => "TimeSyncSeconds",
            Self::TimeSyncNanos => "TimeSyncNanos",
        }
    }
}

/// 出站帧状态：负载 + 保护序号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboundFrameState {
    kind: OutboundFrameKind,
    payload: [u8; CANFD_MAX_LEN],
    len: usize,
    /// 已完成的保护次数（单调递增，不回绕）
    sequence: u64,
}

impl OutboundFrameState {
    pub fn new(kind: OutboundFrameKind) -> Self {
        let template = kind.template();
        let mut payload = [0u8; CANFD_MAX_LEN];
        payload[..template.len()].copy_from_slice(template);
        Self {
            kind,
            payload,
            len: template.len(),
            sequence: 0,
        }
    }

    pub fn kind(&self) -> OutboundFrameKind {
        self.kind
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.len]
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// 第一个 E2E 段的计数器
    pub fn counter(&self) -> u8 {
        self.section_counter(0).unwrap_or(0)
    }

    /// 指定 E2E 段的计数器
    pub fn section_counter(&self, section: usize) -> Option<u8> {
        let s = self.kind.sections().get(section)?;
        Profile05::counter(&self.payload[s.start..s.start + s.len], 0)
    }

    /// 写入数据字节，返回新状态（CRC 需重新保护）
    pub fn with_bytes(&self, offset: usize, bytes: &[u8]) -> Result<Self, ProtocolError> {
        let end = offset + bytes.len();
        if end > self.len {
            return Err(ProtocolError::InvalidLength {
                expected: end,
                actual: self.len,
            });
        }
        let mut next = *self;
        next.payload[offset..end].copy_from_slice(bytes);
        Ok(next)
    }

    /// 时间同步帧：写入大端 u32
    pub fn with_time_sync_value(&self, value: u32) -> Result<Self, ProtocolError> {
        self.with_bytes(TIME_SYNC_VALUE_OFFSET, &value.to_be_bytes())
    }

    /// 对全部段执行保护（计数器 +1），返回新状态
    ///
    /// 任一段失败则返回错误，原状态不变。
    pub fn protected(&self, e2e: &dyn E2eProtection) -> Result<Self, ProtocolError> {
        let mut next = *self;
        for s in self.kind.sections() {
            let bytes = &mut next.payload[s.start..s.start + s.len];
            e2e.protect(bytes, s.protected_len(), 0, s.data_id, true)?;
        }
        next.sequence = self.sequence + 1;
        Ok(next)
    }

    /// 构建 CAN FD 标准帧
    pub fn to_frame(&self) -> RadarFrame {
        RadarFrame::new(self.kind.arbitration_id(), self.payload(), false, true)
    }
}
