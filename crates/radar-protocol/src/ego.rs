//! 自车运动快照
//!
//! `EgoMotion` 不可变：每次更新都基于旧值构建新值，再整体发布。

use crate::signals::SignalValues;

pub const SIG_VEHICLE_SPEED: &str = "VehSpd";
pub const SIG_LEFT_WHEEL_SPEED: &str = "WhlSpdLe";
pub const SIG_RIGHT_WHEEL_SPEED: &str = "WhlSpdRi";
pub const SIG_YAW_RATE: &str = "YawRate";
pub const SIG_LATERAL_ACC: &str = "LatAcc";
pub const SIG_LONGITUDINAL_ACC: &str = "LgtAcc";

/// 自车运动状态
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EgoMotion {
    /// 车速（m/s）
    pub speed: f64,
    pub left_wheel_speed: f64,
    pub right_wheel_speed: f64,
    /// 横摆角速度（rad/s）
    pub yaw_rate: f64,
    /// 横向加速度（m/s²）
    pub lateral_acc: f64,
    /// 纵向加速度（m/s²）
    pub longitudinal_acc: f64,
}

impl EgoMotion {
    pub fn with_speed(self, speed: f64) -> Self {
        Self { speed, ..self }
    }

    pub fn with_wheel_speeds(self, left: f64, right: f64) -> Self {
        Self {
            left_wheel_speed: left,
            right_wheel_speed: right,
            ..self
        }
    }

    pub fn with_yaw_rate(self, yaw_rate: f64) -> Self {
        Self { yaw_rate, ..self }
    }

    pub fn with_accelerations(self, lateral: f64, longitudinal: f64) -> Self {
        Self {
            lateral_acc: lateral,
            longitudinal_acc: longitudinal,
            ..self
        }
    }

    /// 用解码结果中出现的信号构建新快照
    ///
    /// 没有任何自车信号时返回 `None`（快照不变）。
    pub fn updated_from(&self, values: &SignalValues) -> Option<Self> {
        let pick = |name: &str, old: f64| values.get(name).unwrap_or(old);

        let touched = [
            SIG_VEHICLE_SPEED,
            SIG_LEFT_WHEEL_SPEED,
            SIG_RIGHT_WHEEL_SPEED,
            SIG_YAW_RATE,
            SIG_LATERAL_ACC,
            SIG_LONGITUDINAL_ACC,
        ]
        .iter()
        .any(|name| values.contains(name));
        if !touched {
            return None;
        }

        Some(
            self.with_speed(pick(SIG_VEHICLE_SPEED, self.speed))
                .with_wheel_speeds(
                    pick(SIG_LEFT_WHEEL_SPEED, self.left_wheel_speed),
                    pick(SIG_RIGHT_WHEEL_SPEED, self.right_wheel_speed),
                )
                .with_yaw_rate(pick(SIG_YAW_RATE, self.yaw_rate))
                .with_accelerations(
                    pick(SIG_LATERAL_ACC, self.lateral_acc),
                    pick(SIG_LONGITUDINAL_ACC, self.longitudinal_acc),
                ),
        )
    }
}
