//! 雷达驱动（对外 API）
//!
//! 线程模型：
//! - `radar-rx`: 雷达总线接收 + 分发
//! - `vehicle-rx`: 整车总线接收 + 分发（可选）
//! - `vehicle-sched` / `time-sync-sched`: 两个出站帧组的周期调度（可选）
//! - `radar-tx`: 唯一的发送线程（可选）
//!
//! 读取接口全部是无锁快照，不会阻塞任何 IO 线程。

use crate::config::PipelineConfig;
use crate::dispatcher::RxDispatcher;
use crate::error::DriverError;
use crate::frame_log::{FrameLog, LoggedFrame};
use crate::metrics::MetricsSnapshot;
use crate::pipeline::rx_loop;
use crate::state::{OutboundCounters, RadarContext, StatusSnapshot};
use crate::tx::{OutboundGroup, TimeSyncClock, scheduler_loop, tx_loop};
use radar_can::{RxAdapter, TxAdapter};
use radar_protocol::{E2eProtection, EgoMotion, RadarView, SignalDatabase};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, sleep};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// 关停时所有线程共享的等待预算
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// 工作线程的退出方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ThreadExit {
    Clean,
    Panicked,
    /// 截止时间前未退出，句柄被分离
    Detached,
}

/// 在 `deadline` 前等待线程结束
///
/// 轮询 `is_finished`，避免为超时 join 额外起一个看门狗线程。
fn join_before(handle: JoinHandle<()>, deadline: Instant) -> ThreadExit {
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return ThreadExit::Detached;
        }
        sleep(Duration::from_millis(5));
    }
    match handle.join() {
        Ok(()) => ThreadExit::Clean,
        Err(_) => ThreadExit::Panicked,
    }
}

/// 两条总线的信号数据库
#[derive(Clone)]
pub struct SignalDatabases {
    /// 雷达总线（目标列表 + 状态帧）
    pub radar: Arc<dyn SignalDatabase>,
    /// 整车总线（车速、轮速）
    pub vehicle: Arc<dyn SignalDatabase>,
}

/// 前向雷达驱动
pub struct RadarDriver {
    ctx: Arc<RadarContext>,
    is_running: Arc<AtomicBool>,
    /// TX 侧单独的运行标志：发送致命错误只停止 TX
    tx_running: Arc<AtomicBool>,
    radar_rx_thread: Option<JoinHandle<()>>,
    vehicle_rx_thread: Option<JoinHandle<()>>,
    vehicle_scheduler_thread: Option<JoinHandle<()>>,
    time_sync_scheduler_thread: Option<JoinHandle<()>>,
    tx_thread: Option<JoinHandle<()>>,
}

impl RadarDriver {
    /// 使用已打开的适配器启动驱动
    ///
    /// - `radar_rx`: 雷达总线接收端（必需）
    /// - `radar_tx`: 雷达总线发送端；`None` 时不启动调度和 TX 线程
    /// - `vehicle_rx`: 整车总线接收端；`None` 时自车运动保持默认值
    ///
    /// # Example
    ///
    /// ```no_run
    /// use radar_can::mock::MockCanAdapter;
    /// use radar_driver::{PipelineConfig, RadarDriver, SignalDatabases};
    /// use radar_protocol::{DbcDatabase, Profile05};
    /// use std::sync::Arc;
    ///
    /// let radar_db = Arc::new(DbcDatabase::from_file("flr.dbc").unwrap());
    /// let vehicle_db = Arc::new(DbcDatabase::from_file("vehicle.dbc").unwrap());
    /// let bus = MockCanAdapter::new();
    /// let driver = RadarDriver::start(
    ///     bus.clone(),
    ///     Some(bus),
    ///     None::<MockCanAdapter>,
    ///     SignalDatabases { radar: radar_db, vehicle: vehicle_db },
    ///     Arc::new(Profile05::new()),
    ///     PipelineConfig::default(),
    /// )
    /// .unwrap();
    /// println!("{} objects", driver.radar_view().present_count());
    /// ```
    pub fn start<RR, RT, VR>(
        radar_rx: RR,
        radar_tx: Option<RT>,
        vehicle_rx: Option<VR>,
        databases: SignalDatabases,
        e2e: Arc<dyn E2eProtection>,
        config: PipelineConfig,
    ) -> Result<Self, DriverError>
    where
        RR: RxAdapter + Send + 'static,
        RT: TxAdapter + Send + 'static,
        VR: RxAdapter + Send + 'static,
    {
        config.validate().map_err(DriverError::Config)?;

        let ctx = Arc::new(RadarContext::new(&config));
        let mut driver = Self {
            ctx: ctx.clone(),
            is_running: Arc::new(AtomicBool::new(true)),
            tx_running: Arc::new(AtomicBool::new(radar_tx.is_some())),
            radar_rx_thread: None,
            vehicle_rx_thread: None,
            vehicle_scheduler_thread: None,
            time_sync_scheduler_thread: None,
            tx_thread: None,
        };

        // 启动失败时 driver 被 drop，已启动的线程在 Drop 中回收
        let backoff = config.bus_error_backoff();

        let dispatcher =
            RxDispatcher::radar(ctx.clone(), databases.radar.clone(), e2e.clone(), &config);
        driver.radar_rx_thread = Some(driver.spawn_named("radar-rx", {
            let is_running = driver.is_running.clone();
            move || rx_loop(radar_rx, dispatcher, backoff, is_running)
        })?);

        if let Some(vehicle_rx) = vehicle_rx {
            let dispatcher = RxDispatcher::vehicle(ctx.clone(), databases.vehicle);
            driver.vehicle_rx_thread = Some(driver.spawn_named("vehicle-rx", {
                let is_running = driver.is_running.clone();
                move || rx_loop(vehicle_rx, dispatcher, backoff, is_running)
            })?);
        }

        if let Some(radar_tx) = radar_tx {
            driver.start_tx(radar_tx, e2e, &config)?;
        }

        info!(
            "Radar driver started (vehicle bus: {}, TX: {})",
            driver.vehicle_rx_thread.is_some(),
            driver.tx_thread.is_some()
        );
        Ok(driver)
    }

    fn start_tx(
        &mut self,
        radar_tx: impl TxAdapter + Send + 'static,
        e2e: Arc<dyn E2eProtection>,
        config: &PipelineConfig,
    ) -> Result<(), DriverError> {
        let (queue_tx, queue_rx) = crossbeam_channel::bounded(config.tx_queue_capacity);
        let tick = config.scheduler_tick();

        self.tx_thread = Some(self.spawn_named("radar-tx", {
            let ctx = self.ctx.clone();
            let is_running = self.is_running.clone();
            let tx_running = self.tx_running.clone();
            move || tx_loop(radar_tx, queue_rx, ctx, tick, is_running, tx_running)
        })?);

        let vehicle_group = OutboundGroup::vehicle(e2e.clone());
        let period = config.vehicle_tx_period();
        self.vehicle_scheduler_thread = Some(self.spawn_named("vehicle-sched", {
            let ctx = self.ctx.clone();
            let is_running = self.is_running.clone();
            let queue = queue_tx.clone();
            move || scheduler_loop(vehicle_group, period, tick, queue, ctx, is_running)
        })?);

        let time_sync_group = OutboundGroup::time_sync(e2e, Arc::new(TimeSyncClock::new()));
        let period = config.time_sync_period();
        self.time_sync_scheduler_thread = Some(self.spawn_named("time-sync-sched", {
            let ctx = self.ctx.clone();
            let is_running = self.is_running.clone();
            move || scheduler_loop(time_sync_group, period, tick, queue_tx, ctx, is_running)
        })?);

        Ok(())
    }

    fn spawn_named(
        &self,
        name: &str,
        f: impl FnOnce() + Send + 'static,
    ) -> Result<JoinHandle<()>, DriverError> {
        std::thread::Builder::new()
            .name(name.to_string())
            .spawn(f)
            .map_err(|e| DriverError::Thread(format!("Failed to spawn {} thread: {}", name, e)))
    }

    // ========================================================================
    // 快照读取
    // ========================================================================

    /// 目标表快照
    pub fn radar_view(&self) -> Arc<RadarView> {
        self.ctx.radar_view.load_full()
    }

    /// 最近一次状态帧
    pub fn signal_status(&self) -> StatusSnapshot {
        **self.ctx.signal_status.load()
    }

    /// 自车运动
    pub fn ego_motion(&self) -> EgoMotion {
        **self.ctx.ego_motion.load()
    }

    /// 出站帧计数器
    pub fn outbound_counters(&self) -> Arc<OutboundCounters> {
        self.ctx.outbound.load_full()
    }

    pub fn frame_log(&self) -> &FrameLog {
        &self.ctx.frame_log
    }

    /// 最近 `n` 条原始帧
    pub fn recent_frames(&self, n: usize) -> Vec<LoggedFrame> {
        self.ctx.frame_log.recent(n)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    pub fn context(&self) -> &Arc<RadarContext> {
        &self.ctx
    }

    // ========================================================================
    // 链路状态与控制
    // ========================================================================

    pub fn is_radar_connected(&self) -> bool {
        self.ctx.radar_link.check_connection()
    }

    pub fn is_vehicle_connected(&self) -> bool {
        self.ctx.vehicle_link.check_connection()
    }

    /// TX 侧是否仍在运行（未启用或遇到致命错误时为 false）
    pub fn is_tx_running(&self) -> bool {
        self.tx_running.load(Ordering::Acquire)
    }

    pub fn sniffer_enabled(&self) -> bool {
        self.ctx.sniffer_enabled()
    }

    /// 运行时切换嗅探模式
    pub fn set_sniffer_enabled(&self, enabled: bool) {
        self.ctx.set_sniffer_enabled(enabled);
        info!("Sniffer mode {}", if enabled { "enabled" } else { "disabled" });
    }
}

impl Drop for RadarDriver {
    fn drop(&mut self) {
        // Release: 所有之前的写入对看到 false 的线程可见
        self.is_running.store(false, Ordering::Release);

        let deadline = Instant::now() + SHUTDOWN_GRACE;
        let threads = [
            ("radar-rx", self.radar_rx_thread.take()),
            ("vehicle-rx", self.vehicle_rx_thread.take()),
            ("vehicle-sched", self.vehicle_scheduler_thread.take()),
            ("time-sync-sched", self.time_sync_scheduler_thread.take()),
            ("radar-tx", self.tx_thread.take()),
        ];
        for (name, handle) in threads {
            let Some(handle) = handle else { continue };
            match join_before(handle, deadline) {
                ThreadExit::Clean => debug!("Thread '{}' stopped", name),
                ThreadExit::Panicked => error!("Thread '{}' panicked before shutdown", name),
                ThreadExit::Detached => warn!(
                    "Thread '{}' still running after {:?} shutdown grace, detaching",
                    name, SHUTDOWN_GRACE
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radar_can::mock::MockCanAdapter;
    use radar_protocol::{DbcDatabase, Profile05};

    const EMPTY_DBC: &str = "VERSION \"\"\n\n\nNS_ :\n    CM_\n\nBS_:\n\nBU_: FLR\n\n";

    fn empty_databases() -> SignalDatabases {
        let db = Arc::new(DbcDatabase::from_slice(EMPTY_DBC.as_bytes()).unwrap());
        SignalDatabases {
            radar: db.clone(),
            vehicle: db,
        }
    }

    #[test]
    fn test_join_before_reports_exit_kind() {
        let deadline = Instant::now() + Duration::from_secs(1);
        assert_eq!(join_before(std::thread::spawn(|| {}), deadline), ThreadExit::Clean);
        let panicking = std::thread::spawn(|| panic!("rx worker failed"));
        assert_eq!(join_before(panicking, deadline), ThreadExit::Panicked);
    }

    #[test]
    fn test_join_before_detaches_slow_thread() {
        let slow = std::thread::spawn(|| std::thread::sleep(Duration::from_millis(300)));
        let start = Instant::now();
        let exit = join_before(slow, start + Duration::from_millis(20));
        assert_eq!(exit, ThreadExit::Detached);
        assert!(start.elapsed() < Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = PipelineConfig {
            tx_queue_capacity: 0,
            ..PipelineConfig::default()
        };
        let result = RadarDriver::start(
            MockCanAdapter::new(),
            None::<MockCanAdapter>,
            None::<MockCanAdapter>,
            empty_databases(),
            Arc::new(Profile05::new()),
            config,
        );
        assert!(matches!(result, Err(DriverError::Config(_))));
    }

    #[test]
    fn test_drop_stops_all_threads_quickly() {
        let bus = MockCanAdapter::new();
        let driver = RadarDriver::start(
            bus.clone(),
            Some(bus.clone()),
            Some(MockCanAdapter::new()),
            empty_databases(),
            Arc::new(Profile05::new()),
            PipelineConfig::default(),
        )
        .unwrap();
        assert!(driver.is_tx_running());
        assert!(!driver.is_radar_connected());

        let start = Instant::now();
        drop(driver);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
