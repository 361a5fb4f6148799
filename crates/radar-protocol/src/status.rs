//! 雷达诊断/标定状态帧
//!
//! 状态帧（`ID_RADAR_STATUS`）独立于目标列表解码。每个字段都有一个文档化的
//! 默认值（即 [`RadarSignalStatus::default`] 中的值），信号缺失时只影响该字段。

use crate::signals::SignalValues;
use num_enum::{FromPrimitive, IntoPrimitive};

// ============================================================================
// 信号名
// ============================================================================

pub const SIG_CRC: &str = "FLR2RdrStsCrc";
pub const SIG_COUNTER: &str = "FLR2RdrStsCntr";
pub const SIG_INTERNAL_TEMP: &str = "FLR2RdrStsInternTemp";
pub const SIG_TIMESTAMP: &str = "FLR2RdrStsTiStamp";
pub const SIG_CAL_STATUS: &str = "FLR2RdrStsCalSts";
pub const SIG_CAL_PROGRESS: &str = "FLR2RdrStsCalPrgs";
pub const SIG_CAL_RESULT: &str = "FLR2RdrStsCalRes";
pub const SIG_SW_VERSION_MAJOR: &str = "FLR2RdrStsSwVerMajor";
pub const SIG_SW_VERSION_MINOR: &str = "FLR2RdrStsSwVerMinor";
pub const SIG_IF_VERSION_MAJOR: &str = "FLR2RdrStsIfVerMajor";
pub const SIG_IF_VERSION_MINOR: &str = "FLR2RdrStsIfVerMinor";
pub const SIG_FAULT_REASON: &str = "FLR2RdrStsFltRsn";
pub const SIG_COMM_FAULT_REASON: &str = "FLR2RdrStsComFltRsn";
pub const SIG_BLOCKAGE_LEVEL: &str = "FLR2RdrStsBlkgLvl";
pub const SIG_INTERFERENCE_LEVEL: &str = "FLR2RdrStsIntfrLvl";
pub const SIG_FAULT: &str = "FLR2RdrStsFault";
pub const SIG_BLOCKAGE: &str = "FLR2RdrStsBlkg";
pub const SIG_INTERFERENCE: &str = "FLR2RdrStsIntfr";
pub const SIG_DEGRADED: &str = "FLR2RdrStsDegraded";
pub const SIG_ALIGNED: &str = "FLR2RdrStsAligned";
pub const SIG_POSITION_LATERAL: &str = "FLR2RdrStsPosnLat";
pub const SIG_POSITION_LONGITUDINAL: &str = "FLR2RdrStsPosnLgt";
pub const SIG_POSITION_VERTICAL: &str = "FLR2RdrStsPosnVert";
pub const SIG_AZIMUTH_CORRECTION: &str = "FLR2RdrStsAzCorr";
pub const SIG_ELEVATION_CORRECTION: &str = "FLR2RdrStsElevCorr";
pub const SIG_ORIENTATION_YAW: &str = "FLR2RdrStsOrientYaw";

/// 状态帧全部信号名
pub const STATUS_SIGNALS: [&str; 26] = [
    SIG_CRC,
    SIG_COUNTER,
    SIG_INTERNAL_TEMP,
    SIG_TIMESTAMP,
    SIG_CAL_STATUS,
    SIG_CAL_PROGRESS,
    SIG_CAL_RESULT,
    SIG_SW_VERSION_MAJOR,
    SIG_SW_VERSION_MINOR,
    SIG_IF_VERSION_MAJOR,
    SIG_IF_VERSION_MINOR,
    SIG_FAULT_REASON,
    SIG_COMM_FAULT_REASON,
    SIG_BLOCKAGE_LEVEL,
    SIG_INTERFERENCE_LEVEL,
    SIG_FAULT,
    SIG_BLOCKAGE,
    SIG_INTERFERENCE,
    SIG_DEGRADED,
    SIG_ALIGNED,
    SIG_POSITION_LATERAL,
    SIG_POSITION_LONGITUDINAL,
    SIG_POSITION_VERTICAL,
    SIG_AZIMUTH_CORRECTION,
    SIG_ELEVATION_CORRECTION,
    SIG_ORIENTATION_YAW,
];

/// 标定状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum CalibrationStatus {
    /// 未标定（包括未定义的编码）
    #[default]
    NotCalibrated = 0,
    /// 标定中
    Running = 1,
    /// 已标定
    Calibrated = 2,
    /// 标定失败
    Failed = 3,
}

/// 雷达状态记录
///
/// `Default` 即各字段的文档化默认值：数值为 0，标定状态为未标定，
/// 健康标志全部为 false。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RadarSignalStatus {
    pub crc: u16,
    pub counter: u8,
    /// 内部温度（°C）
    pub internal_temperature: f64,
    /// 雷达内部时间戳
    pub timestamp: u32,
    pub calibration_status: CalibrationStatus,
    /// 标定进度（%）
    pub calibration_progress: u8,
    pub calibration_result: u8,
    pub sw_version: (u8, u8),
    pub interface_version: (u8, u8),
    pub fault_reason: u8,
    pub comm_fault_reason: u8,
    pub blockage_level: u8,
    pub interference_level: u8,
    pub fault: bool,
    pub blockage: bool,
    pub interference: bool,
    pub degraded: bool,
    pub aligned: bool,
    /// 安装位置偏移（m）
    pub position_lateral: f64,
    pub position_longitudinal: f64,
    pub position_vertical: f64,
    /// 角度修正（deg）
    pub azimuth_correction: f64,
    pub elevation_correction: f64,
    pub orientation_yaw: f64,
}

/// 状态帧解码结果
#[derive(Debug, Clone, PartialEq)]
pub struct StatusDecode {
    pub status: RadarSignalStatus,
    /// 缺失而使用默认值的信号
    pub missing: Vec<String>,
}

impl RadarSignalStatus {
    /// 从解码结果构建状态记录
    ///
    /// 永不失败：缺失的信号取默认值并记录在 `missing` 中。
    pub fn decode(values: &SignalValues) -> StatusDecode {
        let d = Self::default();
        let mut r = values.reader();

        let status = Self {
            crc: r.u16(SIG_CRC, d.crc),
            counter: r.u8(SIG_COUNTER, d.counter),
            internal_temperature: r.f64(SIG_INTERNAL_TEMP, d.internal_temperature),
            timestamp: r.u32(SIG_TIMESTAMP, d.timestamp),
            calibration_status: r.enumeration(SIG_CAL_STATUS, d.calibration_status),
            calibration_progress: r.u8(SIG_CAL_PROGRESS, d.calibration_progress),
            calibration_result: r.u8(SIG_CAL_RESULT, d.calibration_result),
            sw_version: (
                r.u8(SIG_SW_VERSION_MAJOR, d.sw_version.0),
                r.u8(SIG_SW_VERSION_MINOR, d.sw_version.1),
            ),
            interface_version: (
                r.u8(SIG_IF_VERSION_MAJOR, d.interface_version.0),
                r.u8(SIG_IF_VERSION_MINOR, d.interface_version.1),
            ),
            fault_reason: r.u8(SIG_FAULT_REASON, d.fault_reason),
            comm_fault_reason: r.u8(SIG_COMM_FAULT_REASON, d.comm_fault_reason),
            blockage_level: r.u8(SIG_BLOCKAGE_LEVEL, d.blockage_level),
            interference_level: r.u8(SIG_INTERFERENCE_LEVEL, d.interference_level),
            fault: r.bool(SIG_FAULT, d.fault),
            blockage: r.bool(SIG_BLOCKAGE, d.blockage),
            interference: r.bool(SIG_INTERFERENCE, d.interference),
            degraded: r.bool(SIG_DEGRADED, d.degraded),
            aligned: r.bool(SIG_ALIGNED, d.aligned),
            position_lateral: r.f64(SIG_POSITION_LATERAL, d.position_lateral),
            position_longitudinal: r.f64(SIG_POSITION_LONGITUDINAL, d.position_longitudinal),
            position_vertical: r.f64(SIG_POSITION_VERTICAL, d.position_vertical),
            azimuth_correction: r.f64(SIG_AZIMUTH_CORRECTION, d.azimuth_correction),
            elevation_correction: r.f64(SIG_ELEVATION_CORRECTION, d.elevation_correction),
            orientation_yaw: r.f64(SIG_ORIENTATION_YAW, d.orientation_yaw),
        };

        StatusDecode {
            status,
            missing: r.finish(),
        }
    }

    /// 雷达是否处于可用状态
    pub fn is_healthy(&self) -> bool {
        !self.fault && !self.degraded && !self.blockage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_values() -> SignalValues {
        STATUS_SIGNALS
            .iter()
            .map(|name| (name.to_string(), 1.0))
            .collect::<SignalValues>()
            .with(SIG_INTERNAL_TEMP, 48.5)
            .with(SIG_CAL_STATUS, 2.0)
            .with(SIG_CAL_PROGRESS, 100.0)
            .with(SIG_SW_VERSION_MAJOR, 3.0)
            .with(SIG_SW_VERSION_MINOR, 14.0)
            .with(SIG_AZIMUTH_CORRECTION, -0.25)
            .with(SIG_DEGRADED, 0.0)
    }

    #[test]
    fn test_decode_full_record() {
        let decoded = RadarSignalStatus::decode(&full_values());
        assert!(decoded.missing.is_empty());
        let s = decoded.status;
        assert_eq!(s.internal_temperature, 48.5);
        assert_eq!(s.calibration_status, CalibrationStatus::Calibrated);
        assert_eq!(s.calibration_progress, 100);
        assert_eq!(s.sw_version, (3, 14));
        assert_eq!(s.azimuth_correction, -0.25);
        assert!(s.fault);
        assert!(!s.degraded);
        assert!(s.aligned);
    }

    #[test]
    fn test_missing_signal_uses_field_default() {
        let full = RadarSignalStatus::decode(&full_values()).status;

        let partial: SignalValues = full_values()
            .iter()
            .filter(|(name, _)| *name != SIG_INTERNAL_TEMP)
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        let decoded = RadarSignalStatus::decode(&partial);

        assert_eq!(decoded.missing, vec![SIG_INTERNAL_TEMP]);
        assert_eq!(
            decoded.status.internal_temperature,
            RadarSignalStatus::default().internal_temperature
        );
        // 其余字段不受影响
        let mut expected = full;
        expected.internal_temperature = RadarSignalStatus::default().internal_temperature;
        assert_eq!(decoded.status, expected);
    }

    #[test]
    fn test_empty_decode_is_default() {
        let decoded = RadarSignalStatus::decode(&SignalValues::new());
        assert_eq!(decoded.status, RadarSignalStatus::default());
        assert_eq!(decoded.missing.len(), STATUS_SIGNALS.len());
    }

    #[test]
    fn test_unknown_calibration_code() {
        let values = SignalValues::new().with(SIG_CAL_STATUS, 9.0);
        let decoded = RadarSignalStatus::decode(&values);
        assert_eq!(decoded.status.calibration_status, CalibrationStatus::NotCalibrated);
    }
}
