//! 监控程序配置
//!
//! 从 TOML 文件加载，命令行参数覆盖文件中的同名项。

use anyhow::{Context, Result};
use radar_driver::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 单条总线的接口与信号数据库
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// SocketCAN 接口名称（如 can0、vcan0）
    pub interface: Option<String>,
    /// DBC 文件路径
    pub dbc: Option<PathBuf>,
}

/// 监控程序配置
///
/// ```toml
/// summary_interval_ms = 1000
///
/// [radar]
/// interface = "can0"
/// dbc = "flr.dbc"
///
/// [pipeline]
/// vehicle_tx_period_ms = 60
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub radar: BusConfig,
    pub vehicle: BusConfig,
    /// 是否启动周期发送
    pub tx_enabled: bool,
    /// 摘要日志间隔（毫秒）
    pub summary_interval_ms: u64,
    pub pipeline: PipelineConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            radar: BusConfig::default(),
            vehicle: BusConfig::default(),
            tx_enabled: true,
            summary_interval_ms: 1000,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// 加载配置，文件不存在时返回默认配置
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.pipeline.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    pub fn summary_interval(&self) -> Duration {
        Duration::from_millis(self.summary_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = MonitorConfig::load(Path::new("/nonexistent/radar-monitor.toml")).unwrap();
        assert_eq!(config, MonitorConfig::default());
        assert!(config.tx_enabled);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
tx_enabled = false

[radar]
interface = "vcan0"
dbc = "/etc/radar/flr.dbc"

[vehicle]
interface = "vcan1"

[pipeline]
vehicle_tx_period_ms = 50
skip_objects_in_sniffer_mode = true
"#
        )
        .unwrap();

        let config = MonitorConfig::load(file.path()).unwrap();
        assert!(!config.tx_enabled);
        assert_eq!(config.radar.interface.as_deref(), Some("vcan0"));
        assert_eq!(config.radar.dbc, Some(PathBuf::from("/etc/radar/flr.dbc")));
        assert_eq!(config.vehicle.interface.as_deref(), Some("vcan1"));
        assert_eq!(config.vehicle.dbc, None);
        assert_eq!(config.pipeline.vehicle_tx_period_ms, 50);
        assert!(config.pipeline.skip_objects_in_sniffer_mode);
        // 未指定的字段保持默认
        assert_eq!(config.pipeline.time_sync_period_ms, 125);
        assert_eq!(config.summary_interval_ms, 1000);
    }

    #[test]
    fn test_invalid_pipeline_is_rejected() {
        let result = MonitorConfig::parse("[pipeline]\nvehicle_tx_period_ms = 0\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(MonitorConfig::parse("tx_enabled = \"yes\"").is_err());
    }
}
