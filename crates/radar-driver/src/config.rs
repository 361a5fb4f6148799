//! Pipeline 配置

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pipeline 配置
///
/// 控制 RX/TX 线程的超时、周期和队列容量。可以从 TOML 的 `[pipeline]` 表反序列化，
/// 缺省字段取默认值。
///
/// # Example
///
/// ```
/// use radar_driver::PipelineConfig;
///
/// let config = PipelineConfig {
///     vehicle_tx_period_ms: 50,
///     ..PipelineConfig::default()
/// };
/// assert_eq!(config.time_sync_period_ms, 125);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// CAN 接收超时（毫秒）
    pub receive_timeout_ms: u64,
    /// 原始帧诊断日志容量（条）
    pub frame_log_capacity: usize,
    /// 车辆状态组发送周期（毫秒）
    pub vehicle_tx_period_ms: u64,
    /// 时间同步组发送周期（毫秒）
    pub time_sync_period_ms: u64,
    /// 调度器检查停止信号的最大间隔（毫秒）
    pub scheduler_tick_ms: u64,
    /// 总线错误后的退避时间（毫秒）
    pub bus_error_backoff_ms: u64,
    /// 发送队列容量（帧）
    pub tx_queue_capacity: usize,
    /// 嗅探模式下是否跳过目标列表处理
    pub skip_objects_in_sniffer_mode: bool,
    /// 启动时的嗅探模式
    pub sniffer_enabled: bool,
    /// 超过该时间没有收到帧则认为总线断开（毫秒）
    pub connection_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            receive_timeout_ms: 100,
            frame_log_capacity: 512,
            vehicle_tx_period_ms: 60,
            time_sync_period_ms: 125,
            scheduler_tick_ms: 5,
            bus_error_backoff_ms: 50,
            tx_queue_capacity: 32,
            skip_objects_in_sniffer_mode: false,
            sniffer_enabled: false,
            connection_timeout_ms: 1000,
        }
    }
}

impl PipelineConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn vehicle_tx_period(&self) -> Duration {
        Duration::from_millis(self.vehicle_tx_period_ms)
    }

    pub fn time_sync_period(&self) -> Duration {
        Duration::from_millis(self.time_sync_period_ms)
    }

    /// 调度 tick，至少 1 ms
    pub fn scheduler_tick(&self) -> Duration {
        Duration::from_millis(self.scheduler_tick_ms.max(1))
    }

    pub fn bus_error_backoff(&self) -> Duration {
        Duration::from_millis(self.bus_error_backoff_ms)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    /// 检查取值是否可用
    pub fn validate(&self) -> Result<(), String> {
        if self.vehicle_tx_period_ms == 0 || self.time_sync_period_ms == 0 {
            return Err("TX periods must be greater than zero".to_string());
        }
        if self.tx_queue_capacity == 0 {
            return Err("tx_queue_capacity must be greater than zero".to_string());
        }
        if self.frame_log_capacity == 0 {
            return Err("frame_log_capacity must be greater than zero".to_string());
        }
        Ok(())
    }
}
