//! 驱动层模块
//!
//! 本模块提供前向雷达链路的运行时，包括：
//! - RX 线程管理（雷达总线、整车总线各一个）
//! - 帧分发：E2E 校验、目标表更新、状态帧/自车运动解码
//! - 状态同步（ArcSwap 无锁读取）
//! - 周期发送：车辆状态组 60 ms、时间同步组 125 ms，E2E 保护后经单一 TX 线程发送
//!
//! # 使用场景
//!
//! 生产环境使用 [`RadarDriverBuilder`] 打开 SocketCAN 接口；
//! 测试或自定义后端使用 [`RadarDriver::start`] 直接传入适配器。

mod builder;
mod config;
pub mod dispatcher;
mod driver;
mod error;
pub mod frame_log;
pub mod heartbeat;
pub mod metrics;
pub mod pipeline;
pub mod scheduler;
pub mod state;
pub mod tx;

pub use builder::RadarDriverBuilder;
pub use config::PipelineConfig;
pub use dispatcher::{DropReason, FrameDisposition, RxDispatcher, RxState};
pub use driver::{RadarDriver, SignalDatabases};
pub use error::DriverError;
pub use frame_log::{Bus, FrameLog, LoggedFrame};
pub use heartbeat::ConnectionMonitor;
pub use metrics::{MetricsSnapshot, RadarMetrics};
pub use pipeline::rx_loop;
pub use scheduler::{PeriodicSchedule, run_periodic};
pub use state::*;
pub use tx::{OutboundGroup, TimeSyncClock, scheduler_loop, tx_loop};
