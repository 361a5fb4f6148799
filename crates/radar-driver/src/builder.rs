//! Builder 模式实现
//!
//! 提供链式构造 `RadarDriver` 实例的便捷方式：打开 SocketCAN 接口、
//! 加载 DBC 信号数据库、启动线程。

use crate::config::PipelineConfig;
use crate::driver::{RadarDriver, SignalDatabases};
use crate::error::DriverError;
use radar_protocol::{DbcDatabase, E2eProtection, Profile05, SignalDatabase};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// RadarDriver Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use radar_driver::{PipelineConfig, RadarDriverBuilder};
///
/// let driver = RadarDriverBuilder::new()
///     .radar_interface("can0")
///     .radar_dbc("flr.dbc")
///     .vehicle_interface("can1")
///     .vehicle_dbc("vehicle.dbc")
///     .pipeline_config(PipelineConfig::default())
///     .build()
///     .unwrap();
/// ```
pub struct RadarDriverBuilder {
    /// 雷达总线接口（如 "can0"、"vcan0"）
    radar_interface: Option<String>,
    /// 整车总线接口，未设置则不接收自车运动
    vehicle_interface: Option<String>,
    radar_dbc: Option<PathBuf>,
    vehicle_dbc: Option<PathBuf>,
    pipeline_config: PipelineConfig,
    /// 是否启动周期发送
    tx_enabled: bool,
    e2e: Arc<dyn E2eProtection>,
}

impl RadarDriverBuilder {
    pub fn new() -> Self {
        Self {
            radar_interface: None,
            vehicle_interface: None,
            radar_dbc: None,
            vehicle_dbc: None,
            pipeline_config: PipelineConfig::default(),
            tx_enabled: true,
            e2e: Arc::new(Profile05::new()),
        }
    }

    pub fn radar_interface(mut self, interface: impl Into<String>) -> Self {
        self.radar_interface = Some(interface.into());
        self
    }

    pub fn vehicle_interface(mut self, interface: impl Into<String>) -> Self {
        self.vehicle_interface = Some(interface.into());
        self
    }

    /// 雷达总线 DBC（必需）
    pub fn radar_dbc(mut self, path: impl Into<PathBuf>) -> Self {
        self.radar_dbc = Some(path.into());
        self
    }

    /// 整车总线 DBC（设置了整车接口时必需）
    pub fn vehicle_dbc(mut self, path: impl Into<PathBuf>) -> Self {
        self.vehicle_dbc = Some(path.into());
        self
    }

    pub fn pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.pipeline_config = config;
        self
    }

    /// 是否启动周期发送（默认启动）
    pub fn tx_enabled(mut self, enabled: bool) -> Self {
        self.tx_enabled = enabled;
        self
    }

    /// 替换 E2E 实现（默认 Profile 05）
    pub fn e2e(mut self, e2e: Arc<dyn E2eProtection>) -> Self {
        self.e2e = e2e;
        self
    }

    /// 加载两条总线的信号数据库
    fn load_databases(&self) -> Result<SignalDatabases, DriverError> {
        let radar_path = self
            .radar_dbc
            .as_ref()
            .ok_or_else(|| DriverError::Config("radar DBC path is required".to_string()))?;
        let radar = DbcDatabase::from_file(radar_path)?;
        info!("Loaded radar DBC {:?} ({} messages)", radar_path, radar.len());
        let radar: Arc<dyn SignalDatabase> = Arc::new(radar);

        let vehicle: Arc<dyn SignalDatabase> = match (&self.vehicle_interface, &self.vehicle_dbc) {
            (_, Some(path)) => {
                let vehicle = DbcDatabase::from_file(path)?;
                info!("Loaded vehicle DBC {:?} ({} messages)", path, vehicle.len());
                Arc::new(vehicle)
            },
            (Some(interface), None) => {
                return Err(DriverError::Config(format!(
                    "vehicle interface {} requires a vehicle DBC path",
                    interface
                )));
            },
            // 没有整车总线：数据库不会被使用
            (None, None) => radar.clone(),
        };

        Ok(SignalDatabases { radar, vehicle })
    }

    /// 打开接口并启动驱动
    #[cfg(target_os = "linux")]
    pub fn build(self) -> Result<RadarDriver, DriverError> {
        use radar_can::{
            SocketCanFdAdapter, SocketCanFdRxAdapter, SocketCanFdTxAdapter, SplittableAdapter,
        };

        let radar_interface = self
            .radar_interface
            .clone()
            .ok_or_else(|| DriverError::Config("radar interface is required".to_string()))?;
        let databases = self.load_databases()?;
        let timeout = self.pipeline_config.receive_timeout();

        let vehicle_rx = self
            .vehicle_interface
            .as_deref()
            .map(|interface| SocketCanFdRxAdapter::open(interface, timeout))
            .transpose()?;

        if self.tx_enabled {
            let mut radar = SocketCanFdAdapter::new(radar_interface)?;
            radar.set_read_timeout(timeout)?;
            let (radar_rx, radar_tx) = radar.split()?;
            RadarDriver::start(
                radar_rx,
                Some(radar_tx),
                vehicle_rx,
                databases,
                self.e2e,
                self.pipeline_config,
            )
        } else {
            let radar_rx = SocketCanFdRxAdapter::open(&radar_interface, timeout)?;
            RadarDriver::start(
                radar_rx,
                None::<SocketCanFdTxAdapter>,
                vehicle_rx,
                databases,
                self.e2e,
                self.pipeline_config,
            )
        }
    }

    /// 打开接口并启动驱动
    #[cfg(not(target_os = "linux"))]
    pub fn build(self) -> Result<RadarDriver, DriverError> {
        Err(DriverError::Config(
            "SocketCAN is only available on Linux; use RadarDriver::start with a custom adapter"
                .to_string(),
        ))
    }
}

impl Default for RadarDriverBuilder {
    fn default() -> Self {
        Self::new()
    }
}
