//! # Radar Monitor
//!
//! 前向雷达链路监控程序：接收目标列表、状态帧和自车运动，
//! 按固定周期发送车辆状态组与时间同步组，并定期打印摘要。
//!
//! ```bash
//! # 雷达总线 + 整车总线
//! radar-monitor --radar can0 --radar-dbc flr.dbc --vehicle can1 --vehicle-dbc vehicle.dbc
//!
//! # 只监听，不发送
//! radar-monitor --radar vcan0 --radar-dbc flr.dbc --no-tx --sniffer
//! ```

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use config::MonitorConfig;
use radar_driver::{MetricsSnapshot, RadarDriver, RadarDriverBuilder};
use radar_protocol::RadarView;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

/// Radar Monitor - 前向雷达 CAN FD 链路监控
#[derive(Parser, Debug)]
#[command(name = "radar-monitor")]
#[command(about = "Monitor a forward radar CAN FD link", long_about = None)]
#[command(version)]
struct Args {
    /// 配置文件路径（TOML）
    ///
    /// 文件不存在时使用默认配置
    #[arg(short, long, default_value = "radar-monitor.toml")]
    config: PathBuf,

    /// 雷达总线接口（覆盖配置文件）
    #[arg(long)]
    radar: Option<String>,

    /// 雷达总线 DBC（覆盖配置文件）
    #[arg(long)]
    radar_dbc: Option<PathBuf>,

    /// 整车总线接口
    #[arg(long)]
    vehicle: Option<String>,

    /// 整车总线 DBC
    #[arg(long)]
    vehicle_dbc: Option<PathBuf>,

    /// 不启动周期发送
    #[arg(long)]
    no_tx: bool,

    /// 启动时进入嗅探模式
    #[arg(long)]
    sniffer: bool,

    /// 摘要打印间隔（毫秒）
    #[arg(long)]
    summary_interval: Option<u64>,
}

impl Args {
    /// 命令行参数覆盖配置文件
    fn apply(self, mut config: MonitorConfig) -> MonitorConfig {
        if let Some(interface) = self.radar {
            config.radar.interface = Some(interface);
        }
        if let Some(dbc) = self.radar_dbc {
            config.radar.dbc = Some(dbc);
        }
        if let Some(interface) = self.vehicle {
            config.vehicle.interface = Some(interface);
        }
        if let Some(dbc) = self.vehicle_dbc {
            config.vehicle.dbc = Some(dbc);
        }
        if self.no_tx {
            config.tx_enabled = false;
        }
        if self.sniffer {
            config.pipeline.sniffer_enabled = true;
        }
        if let Some(interval) = self.summary_interval {
            config.summary_interval_ms = interval;
        }
        config
    }
}

fn build_driver(config: &MonitorConfig) -> Result<RadarDriver> {
    let mut builder = RadarDriverBuilder::new()
        .pipeline_config(config.pipeline.clone())
        .tx_enabled(config.tx_enabled);

    if let Some(interface) = &config.radar.interface {
        builder = builder.radar_interface(interface.clone());
    }
    if let Some(dbc) = &config.radar.dbc {
        builder = builder.radar_dbc(dbc.clone());
    }
    if let Some(interface) = &config.vehicle.interface {
        builder = builder.vehicle_interface(interface.clone());
    }
    if let Some(dbc) = &config.vehicle.dbc {
        builder = builder.vehicle_dbc(dbc.clone());
    }

    builder.build().context("failed to start radar driver")
}

/// 最近目标（纵向距离最小）
fn nearest_object(view: &RadarView) -> Option<String> {
    view.present_objects()
        .min_by(|a, b| a.longitudinal_pos.total_cmp(&b.longitudinal_pos))
        .map(|o| {
            format!(
                "#{} {:?} at ({:.2}, {:.2}) m",
                o.object_id, o.class, o.longitudinal_pos, o.lateral_pos
            )
        })
}

/// 计数器摘要（失败率本身已是百分比）
fn metrics_line(metrics: &MetricsSnapshot) -> String {
    format!(
        "rx={} dropped={} e2e_fail={} ({:.2}%) bus_errors={} tx={} tx_errors={} queue_drops={}",
        metrics.rx_frames_total,
        metrics.rx_dropped(),
        metrics.e2e_failures,
        metrics.e2e_failure_rate(),
        metrics.bus_errors,
        metrics.tx_frames_total,
        metrics.tx_errors,
        metrics.tx_queue_drops
    )
}

fn log_summary(driver: &RadarDriver) {
    let view = driver.radar_view();
    let status = driver.signal_status();
    let ego = driver.ego_motion();
    let metrics = driver.metrics();

    info!(
        "radar: {} objects, scan {}, counter {}, nearest {}",
        view.present_count(),
        view.scan_id,
        view.message_counter,
        nearest_object(&view).unwrap_or_else(|| "-".to_string())
    );
    if status.frames_decoded > 0 {
        info!(
            "status: healthy={} calibration={:?} temp={:.1} fault={} blockage={} e2e_ok={}",
            status.status.is_healthy(),
            status.status.calibration_status,
            status.status.internal_temperature,
            status.status.fault,
            status.status.blockage,
            status.e2e_verified
        );
    }
    info!(
        "ego: speed={:.2} m/s yaw_rate={:.3} wheels=({:.2}, {:.2})",
        ego.speed, ego.yaw_rate, ego.left_wheel_speed, ego.right_wheel_speed
    );
    info!("{}", metrics_line(&metrics));

    if !driver.is_radar_connected() {
        warn!("Radar bus silent");
    }
    let vehicle_link = &driver.context().vehicle_link;
    if vehicle_link.time_since_last_feedback().is_some() && !driver.is_vehicle_connected() {
        warn!("Vehicle bus silent");
    }
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = MonitorConfig::load(&args.config)?;
    let config = args.apply(config);

    let running = Arc::new(AtomicBool::new(true));
    let running_for_handler = running.clone();
    ctrlc::set_handler(move || {
        running_for_handler.store(false, Ordering::Release);
    })
    .context("failed to set signal handler")?;

    let driver = build_driver(&config)?;
    info!(
        "Radar monitor started (tx: {}, sniffer: {}). Press Ctrl+C to stop.",
        config.tx_enabled,
        driver.sniffer_enabled()
    );

    let interval = config.summary_interval();
    let tick = Duration::from_millis(50).min(interval);
    let mut elapsed = Duration::ZERO;
    while running.load(Ordering::Acquire) {
        std::thread::sleep(tick);
        elapsed += tick;
        if elapsed >= interval {
            elapsed = Duration::ZERO;
            log_summary(&driver);
        }
    }

    info!("Shutting down...");
    drop(driver);
    Ok(())
}
