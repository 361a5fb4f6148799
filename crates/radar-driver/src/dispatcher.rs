//! RX 分发器
//!
//! 每条总线一个分发器，状态机：`Idle → FrameReceived → Classified | Dropped`。
//!
//! 收到的每一帧都先写入原始帧日志，再按 CAN ID 分类：
//!
//! - 雷达总线：状态帧 → 状态解码；目标列表区间 → 目标表更新；其余只记录
//! - 整车总线：经整车信号数据库解码，命中自车信号则更新自车运动
//!
//! 目标列表帧只有在 E2E 校验通过后才被解释；校验失败时丢弃，
//! 任何快照都不改变。状态帧的校验结果只作参考，失败也继续解码。

use crate::config::PipelineConfig;
use crate::error::DriverError;
use crate::frame_log::Bus;
use crate::metrics::RadarMetrics;
use crate::state::{RadarContext, StatusSnapshot};
use radar_can::{CanError, RxAdapter};
use radar_protocol::ids::RadarFrameClass;
use radar_protocol::{
    E2E_ID_RADAR_STATUS, E2eProtection, FrameRegistry, OBJECT_SLOT_COUNT, ProtocolError,
    RadarFrame, RadarSignalStatus, SignalDatabase, SignalValues,
};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::{debug, trace, warn};

/// 每累计多少次 E2E 失败输出一次 warn
const E2E_WARN_EVERY: u64 = 100;

/// 分发器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxState {
    /// 等待下一帧
    Idle,
    /// 已收到帧，尚未分类
    FrameReceived,
    /// 帧已被分类并处理
    Classified,
    /// 帧被丢弃
    Dropped,
}

/// 丢帧原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// E2E 校验失败
    ValidationFailure,
    /// 槽位下标越界
    OutOfRange,
    /// 目标列表区间内但未配置的 ID
    Unmapped,
    /// 负载长度与数据库声明不符
    Malformed,
    /// 信号数据库解码失败
    DecodeFailed,
    /// 嗅探模式下跳过目标列表
    SnifferGate,
}

/// 单帧处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDisposition {
    /// 更新了目标表槽位 `[index, index + 1]`
    ObjectsUpdated { index: usize },
    /// 更新了状态记录
    StatusUpdated { verified: bool },
    /// 更新了自车运动
    EgoUpdated,
    /// 只写入帧日志
    LoggedOnly,
    Dropped(DropReason),
}

/// 单总线 RX 分发器
pub struct RxDispatcher {
    bus: Bus,
    ctx: Arc<RadarContext>,
    database: Arc<dyn SignalDatabase>,
    /// 整车总线不带 E2E 保护
    e2e: Option<Arc<dyn E2eProtection>>,
    registry: FrameRegistry,
    skip_objects_in_sniffer_mode: bool,
    state: RxState,
}

impl RxDispatcher {
    /// 雷达总线分发器（目标列表 + 状态帧）
    pub fn radar(
        ctx: Arc<RadarContext>,
        database: Arc<dyn SignalDatabase>,
        e2e: Arc<dyn E2eProtection>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            bus: Bus::Radar,
            ctx,
            database,
            e2e: Some(e2e),
            registry: FrameRegistry::new(),
            skip_objects_in_sniffer_mode: config.skip_objects_in_sniffer_mode,
            state: RxState::Idle,
        }
    }

    /// 整车总线分发器（自车运动）
    pub fn vehicle(ctx: Arc<RadarContext>, database: Arc<dyn SignalDatabase>) -> Self {
        Self {
            bus: Bus::Vehicle,
            ctx,
            database,
            e2e: None,
            registry: FrameRegistry::new(),
            skip_objects_in_sniffer_mode: false,
            state: RxState::Idle,
        }
    }

    /// 替换目标列表注册表
    pub fn with_registry(mut self, registry: FrameRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn bus(&self) -> Bus {
        self.bus
    }

    pub fn state(&self) -> RxState {
        self.state
    }

    pub fn context(&self) -> &Arc<RadarContext> {
        &self.ctx
    }

    /// 接收并处理一帧
    ///
    /// - `Ok(Some(_))`: 处理了一帧
    /// - `Ok(None)`: 接收超时，快照保持不变
    /// - `Err(DriverError::Can)`: 总线错误，由调用方决定退避
    pub fn poll_once(
        &mut self,
        rx: &mut impl RxAdapter,
    ) -> Result<Option<FrameDisposition>, DriverError> {
        self.state = RxState::Idle;
        match rx.receive() {
            Ok(frame) => Ok(Some(self.dispatch(&frame))),
            Err(CanError::Timeout) => {
                RadarMetrics::incr(&self.ctx.metrics.rx_timeouts);
                Ok(None)
            },
            Err(e) => {
                RadarMetrics::incr(&self.ctx.metrics.bus_errors);
                Err(DriverError::Can(e))
            },
        }
    }

    /// 处理一帧（不做任何 IO）
    pub fn dispatch(&mut self, frame: &RadarFrame) -> FrameDisposition {
        self.state = RxState::FrameReceived;

        // 无论后续结果如何，先写入帧日志
        self.ctx.frame_log.push(self.bus, *frame);
        RadarMetrics::incr(&self.ctx.metrics.rx_frames_total);
        match self.bus {
            Bus::Radar => self.ctx.radar_link.register_feedback(),
            Bus::Vehicle => self.ctx.vehicle_link.register_feedback(),
        }

        let disposition = match self.bus {
            Bus::Radar => self.dispatch_radar(frame),
            Bus::Vehicle => self.dispatch_vehicle(frame),
        };

        self.state = match disposition {
            FrameDisposition::Dropped(reason) => {
                self.count_drop(frame, reason);
                RxState::Dropped
            },
            FrameDisposition::LoggedOnly => {
                RadarMetrics::incr(&self.ctx.metrics.frames_logged_only);
                RxState::Classified
            },
            _ => RxState::Classified,
        };
        disposition
    }

    // ========================================================================
    // 雷达总线
    // ========================================================================

    fn dispatch_radar(&self, frame: &RadarFrame) -> FrameDisposition {
        match RadarFrameClass::from_id(frame.id) {
            RadarFrameClass::Status => self.handle_status(frame),
            RadarFrameClass::ObjectList if self.registry.in_range(frame.id) => {
                self.handle_object_list(frame)
            },
            _ => {
                trace!("Radar frame 0x{:X} logged only", frame.id);
                FrameDisposition::LoggedOnly
            },
        }
    }

    fn handle_object_list(&self, frame: &RadarFrame) -> FrameDisposition {
        if self.skip_objects_in_sniffer_mode && self.ctx.sniffer_enabled() {
            return FrameDisposition::Dropped(DropReason::SnifferGate);
        }

        let Some(mapping) = self.registry.lookup(frame.id) else {
            return FrameDisposition::Dropped(DropReason::Unmapped);
        };
        let index = self.registry.slot_index(mapping);
        if index + 1 >= OBJECT_SLOT_COUNT {
            return FrameDisposition::Dropped(DropReason::OutOfRange);
        }
        if !self.length_matches(frame) {
            return FrameDisposition::Dropped(DropReason::Malformed);
        }

        if !self.verify(frame, mapping.e2e_data_id) {
            let failures = RadarMetrics::incr(&self.ctx.metrics.e2e_failures);
            if failures % E2E_WARN_EVERY == 1 {
                warn!(
                    "E2E check failed for object frame 0x{:X} ({} failures so far)",
                    frame.id, failures
                );
            }
            return FrameDisposition::Dropped(DropReason::ValidationFailure);
        }

        let values = match self.decode(frame) {
            Ok(values) => values,
            Err(reason) => return FrameDisposition::Dropped(reason),
        };

        let mut reader = values.reader();
        let update = mapping.read_pair(&mut reader, index);
        self.count_misses(reader.finish().len());

        let next = self.ctx.radar_view.load().with_update(&update);
        self.ctx.radar_view.store(Arc::new(next));
        RadarMetrics::incr(&self.ctx.metrics.object_frames_applied);

        trace!(
            "Object frame 0x{:X} applied to slots {}..={} (scan {}, counter {})",
            frame.id,
            index,
            index + 1,
            update.scan_id,
            update.message_counter
        );
        FrameDisposition::ObjectsUpdated { index }
    }

    fn handle_status(&self, frame: &RadarFrame) -> FrameDisposition {
        if !self.length_matches(frame) {
            return FrameDisposition::Dropped(DropReason::Malformed);
        }

        let verified = self.verify(frame, E2E_ID_RADAR_STATUS);
        if !verified {
            let failures = RadarMetrics::incr(&self.ctx.metrics.status_e2e_failures);
            if failures % E2E_WARN_EVERY == 1 {
                warn!(
                    "E2E check failed for status frame 0x{:X}, decoding anyway ({} failures so far)",
                    frame.id, failures
                );
            }
        }

        let values = match self.decode(frame) {
            Ok(values) => values,
            Err(reason) => return FrameDisposition::Dropped(reason),
        };

        let decoded = RadarSignalStatus::decode(&values);
        self.count_misses(decoded.missing.len());
        if !decoded.missing.is_empty() {
            debug!(
                "Status frame missing {} signals, using defaults: {:?}",
                decoded.missing.len(),
                decoded.missing
            );
        }

        let frames_decoded = RadarMetrics::incr(&self.ctx.metrics.status_frames_decoded);
        self.ctx.signal_status.store(Arc::new(StatusSnapshot {
            status: decoded.status,
            e2e_verified: verified,
            frames_decoded,
        }));
        FrameDisposition::StatusUpdated { verified }
    }

    // ========================================================================
    // 整车总线
    // ========================================================================

    fn dispatch_vehicle(&self, frame: &RadarFrame) -> FrameDisposition {
        if self.database.message_len(frame.id).is_none() {
            trace!("Vehicle frame 0x{:X} logged only", frame.id);
            return FrameDisposition::LoggedOnly;
        }
        if !self.length_matches(frame) {
            return FrameDisposition::Dropped(DropReason::Malformed);
        }

        let values = match self.decode(frame) {
            Ok(values) => values,
            Err(reason) => return FrameDisposition::Dropped(reason),
        };

        let current = self.ctx.ego_motion.load();
        match current.updated_from(&values) {
            Some(next) => {
                self.ctx.ego_motion.store(Arc::new(next));
                RadarMetrics::incr(&self.ctx.metrics.ego_updates);
                FrameDisposition::EgoUpdated
            },
            None => FrameDisposition::LoggedOnly,
        }
    }

    // ========================================================================
    // 辅助函数
    // ========================================================================

    /// 负载不能短于数据库声明的长度（数据库未收录的 ID 不检查）
    fn length_matches(&self, frame: &RadarFrame) -> bool {
        self.database
            .message_len(frame.id)
            .is_none_or(|expected| frame.data_slice().len() >= expected)
    }

    /// CRC 位于偏移 0，参与计算的长度为负载长度减去 CRC
    fn verify(&self, frame: &RadarFrame, data_id: u16) -> bool {
        let payload = frame.data_slice();
        payload.len() > 2
            && self
                .e2e
                .as_ref()
                .is_some_and(|e2e| e2e.verify(payload, payload.len() - 2, data_id))
    }

    fn decode(&self, frame: &RadarFrame) -> Result<SignalValues, DropReason> {
        self.database
            .decode(frame.id, frame.data_slice())
            .map_err(|e| match e {
                ProtocolError::InvalidLength { .. } => DropReason::Malformed,
                other => {
                    debug!("Failed to decode frame 0x{:X}: {}", frame.id, other);
                    DropReason::DecodeFailed
                },
            })
    }

    fn count_misses(&self, misses: usize) {
        if misses > 0 {
            self.ctx
                .metrics
                .decode_misses
                .fetch_add(misses as u64, Ordering::Relaxed);
        }
    }

    fn count_drop(&self, frame: &RadarFrame, reason: DropReason) {
        let metrics = &self.ctx.metrics;
        match reason {
            // E2E 失败已在校验处计数
            DropReason::ValidationFailure => {},
            DropReason::OutOfRange | DropReason::Unmapped => {
                RadarMetrics::incr(&metrics.frames_out_of_range);
            },
            DropReason::Malformed | DropReason::DecodeFailed => {
                RadarMetrics::incr(&metrics.frames_malformed);
            },
            DropReason::SnifferGate => {
                RadarMetrics::incr(&metrics.frames_sniffer_skipped);
            },
        }
        debug!(
            "Dropped {} frame 0x{:X} (len {}): {:?}",
            self.bus.name(),
            frame.id,
            frame.len,
            reason
        );
    }
}
