//! # Radar Protocol
//!
//! 前向雷达 CAN FD 协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `frame`: CAN / CAN FD 帧抽象与 DLC 映射
//! - `ids`: CAN ID 与 E2E Data ID 常量
//! - `registry`: 目标列表帧注册表（ID → 槽位对 + 信号名）
//! - `object`: 目标槽位与雷达视图
//! - `status`: 雷达诊断/标定状态帧解码
//! - `ego`: 自车运动快照
//! - `outbound`: 周期发送帧模板
//! - `e2e`: E2E 保护能力接口与 Profile 05 实现
//! - `signals`: 信号数据库能力接口、类型化信号访问器与 DBC 实现
//!
//! ## 信任边界
//!
//! 目标列表帧只有在 E2E 校验通过后才会被解释；状态帧的校验结果仅作参考。

pub mod e2e;
pub mod ego;
pub mod frame;
pub mod ids;
pub mod object;
pub mod outbound;
pub mod registry;
pub mod signals;
pub mod status;

// 重新导出常用类型
pub use e2e::{E2eProtection, Profile05};
pub use ego::EgoMotion;
pub use frame::{FdDataLengthCode, RadarFrame};
pub use ids::*;
pub use object::{
    INVALID_OBJECT_ID, OBJECT_SLOT_COUNT, ObjectClass, ObjectPairUpdate, ObjectSlot, RadarView,
};
pub use outbound::{OutboundFrameKind, OutboundFrameState};
pub use registry::{FrameMapping, FrameRegistry, ObjectSignals};
pub use signals::{DbcDatabase, SignalDatabase, SignalReader, SignalValues};
pub use status::{CalibrationStatus, RadarSignalStatus, StatusDecode};

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid CAN ID: 0x{id:X}")]
    InvalidCanId { id: u32 },

    #[error("Unknown message: 0x{id:X}")]
    UnknownMessage { id: u32 },

    #[error("Signal {signal} does not fit in a {frame_len}-byte frame")]
    SignalOutOfFrame { signal: String, frame_len: usize },

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: f64 },

    #[error("Signal database error: {0}")]
    Database(String),
}
