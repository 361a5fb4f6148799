//! 目标列表帧注册表
//!
//! 由一张声明式表（槽位对 → 帧 ID、E2E Data ID、报文名）在启动时构建，
//! 之后只读。每个槽位的信号名由 `{前缀}{属性}{0|1}` 拼接得到，
//! 前缀为 `FLR2RdrObject{a}To{b}`。

use crate::ids::ID_OBJECT_LIST_FIRST;
use crate::object::{OBJECT_SLOT_COUNT, ObjectClass, ObjectPairUpdate, ObjectSlot};
use crate::signals::SignalReader;

/// 声明式表项
#[derive(Debug, Clone, Copy)]
pub struct ObjectFrameEntry {
    /// 槽位对中第一个目标的 ID
    pub first_object: u8,
    pub arbitration_id: u32,
    pub e2e_data_id: u16,
    pub message_name: &'static str,
}

const fn entry(first_object: u8, arbitration_id: u32, e2e_data_id: u16, message_name: &'static str) -> ObjectFrameEntry {
    ObjectFrameEntry {
        first_object,
        arbitration_id,
        e2e_data_id,
        message_name,
    }
}

/// 目标列表帧配置
///
/// 注意：0x148 与 0x14A 共用 E2E Data ID 0x8D3 和报文名 FlrFlr1canFr86（与雷达输出一致）。
pub const OBJECT_FRAME_TABLE: [ObjectFrameEntry; 15] = [
    entry(0, 0x140, 0x8CF, "FlrFlr1canFr82"),
    entry(2, 0x142, 0x8D0, "FlrFlr1canFr83"),
    entry(4, 0x144, 0x8D1, "FlrFlr1canFr84"),
    entry(6, 0x146, 0x8D2, "FlrFlr1canFr85"),
    entry(8, 0x148, 0x8D3, "FlrFlr1canFr86"),
    entry(10, 0x14A, 0x8D3, "FlrFlr1canFr86"),
    entry(12, 0x14C, 0x8D4, "FlrFlr1canFr87"),
    entry(14, 0x14E, 0x8D5, "FlrFlr1canFr88"),
    entry(16, 0x150, 0x8D6, "FlrFlr1canFr89"),
    entry(18, 0x152, 0x8D7, "FlrFlr1canFr90"),
    entry(20, 0x154, 0x8A9, "FlrFlr1canFr91"),
    entry(22, 0x156, 0x8AA, "FlrFlr1canFr92"),
    entry(24, 0x158, 0x8AB, "FlrFlr1canFr93"),
    entry(26, 0x15A, 0x8AC, "FlrFlr1canFr94"),
    entry(28, 0x15C, 0x8AD, "FlrFlr1canFr95"),
];

/// 单个槽位的信号名集合
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSignals {
    pub class: String,
    pub data_conf: String,
    pub data_len: String,
    pub data_width: String,
    pub heading_angle: String,
    pub lat_acc: String,
    pub lat_pos: String,
    pub lat_velo: String,
    pub lgt_acc: String,
    pub lgt_pos: String,
    pub lgt_velo: String,
    pub model_info: String,
    pub quality: String,
}

impl ObjectSignals {
    /// `position` 为 0（第一个槽位）或 1（第二个槽位）
    pub fn new(prefix: &str, position: u8) -> Self {
        let name = |attr: &str| format!("{prefix}{attr}{position}");
        Self {
            class: name("Class"),
            data_conf: name("DataConf"),
            data_len: name("DataLen"),
            data_width: name("DataWidth"),
            heading_angle: name("HeadingAng"),
            lat_acc: name("LatAcc"),
            lat_pos: name("LatPos"),
            lat_velo: name("LatVelo"),
            lgt_acc: name("LgtAcc"),
            lgt_pos: name("LgtPos"),
            lgt_velo: name("LgtVelo"),
            model_info: name("ModelInfo"),
            quality: name("Qly"),
        }
    }

    /// 读取一个槽位，缺失信号取中性值
    pub fn read(&self, reader: &mut SignalReader<'_>, object_id: u8) -> ObjectSlot {
        let d = ObjectSlot::neutral(object_id);
        ObjectSlot {
            object_id,
            class: reader.enumeration(&self.class, ObjectClass::default()),
            data_confidence: reader.u8(&self.data_conf, d.data_confidence),
            length: reader.f64(&self.data_len, d.length),
            width: reader.f64(&self.data_width, d.width),
            heading_angle: reader.f64(&self.heading_angle, d.heading_angle),
            lateral_acc: reader.f64(&self.lat_acc, d.lateral_acc),
            lateral_pos: reader.f64(&self.lat_pos, d.lateral_pos),
            lateral_velocity: reader.f64(&self.lat_velo, d.lateral_velocity),
            longitudinal_acc: reader.f64(&self.lgt_acc, d.longitudinal_acc),
            longitudinal_pos: reader.f64(&self.lgt_pos, d.longitudinal_pos),
            longitudinal_velocity: reader.f64(&self.lgt_velo, d.longitudinal_velocity),
            model_info: reader.u8(&self.model_info, d.model_info),
            quality: reader.u8(&self.quality, d.quality),
        }
    }
}

/// 单个目标列表帧的映射
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameMapping {
    pub arbitration_id: u32,
    pub e2e_data_id: u16,
    pub message_name: &'static str,
    pub first_object: u8,
    pub first_slot_signals: ObjectSignals,
    pub second_slot_signals: ObjectSignals,
    pub scan_id_signal: String,
    pub counter_signal: String,
}

impl FrameMapping {
    fn from_entry(entry: &ObjectFrameEntry) -> Self {
        let prefix = format!(
            "FLR2RdrObject{}To{}",
            entry.first_object,
            entry.first_object + 1
        );
        Self {
            arbitration_id: entry.arbitration_id,
            e2e_data_id: entry.e2e_data_id,
            message_name: entry.message_name,
            first_object: entry.first_object,
            first_slot_signals: ObjectSignals::new(&prefix, 0),
            second_slot_signals: ObjectSignals::new(&prefix, 1),
            scan_id_signal: format!("{prefix}ScanID"),
            counter_signal: format!("{prefix}MsgCntr"),
        }
    }

    /// 将解码结果转换为槽位对更新
    ///
    /// `index` 由注册表根据帧 ID 计算；两个槽位的 ID 分别为 `index` 和 `index + 1`。
    pub fn read_pair(&self, reader: &mut SignalReader<'_>, index: usize) -> ObjectPairUpdate {
        ObjectPairUpdate {
            index,
            slots: [
                self.first_slot_signals.read(reader, index as u8),
                self.second_slot_signals.read(reader, index as u8 + 1),
            ],
            message_counter: reader.u8(&self.counter_signal, 0),
            scan_id: reader.u16(&self.scan_id_signal, 0),
        }
    }
}

/// 目标列表帧注册表
#[derive(Debug, Clone)]
pub struct FrameRegistry {
    /// 按 ID 升序
    mappings: Vec<FrameMapping>,
    reference_id: u32,
    last_id: u32,
}

impl Default for FrameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameRegistry {
    /// 使用内置表构建
    pub fn new() -> Self {
        Self::from_entries(&OBJECT_FRAME_TABLE)
    }

    /// 使用自定义表构建
    ///
    /// 表必须非空，且帧 ID 步长与槽位对大小一致（`id - reference == first_object`）。
    /// 不满足时属于配置缺陷，debug 构建下直接断言失败。
    pub fn from_entries(entries: &[ObjectFrameEntry]) -> Self {
        let mut mappings: Vec<FrameMapping> = entries.iter().map(FrameMapping::from_entry).collect();
        mappings.sort_by_key(|m| m.arbitration_id);

        let reference_id = mappings.first().map_or(ID_OBJECT_LIST_FIRST, |m| m.arbitration_id);
        let last_id = mappings.last().map_or(ID_OBJECT_LIST_FIRST, |m| m.arbitration_id);

        debug_assert!(!mappings.is_empty(), "object frame table is empty");
        debug_assert!(mappings.iter().all(|m| {
            m.arbitration_id - reference_id == m.first_object as u32
                && (m.first_object as usize) + 1 < OBJECT_SLOT_COUNT
        }));

        Self {
            mappings,
            reference_id,
            last_id,
        }
    }

    /// 按帧 ID 查找映射；范围外或未配置的 ID 返回 `None`
    pub fn lookup(&self, arbitration_id: u32) -> Option<&FrameMapping> {
        if !self.in_range(arbitration_id) {
            return None;
        }
        self.mappings
            .binary_search_by_key(&arbitration_id, |m| m.arbitration_id)
            .ok()
            .map(|i| &self.mappings[i])
    }

    /// 帧 ID 是否落在 `[reference_id, last_id]`
    pub fn in_range(&self, arbitration_id: u32) -> bool {
        (self.reference_id..=self.last_id).contains(&arbitration_id)
    }

    /// 槽位对的第一个下标：`arbitration_id - reference_id`
    pub fn slot_index(&self, mapping: &FrameMapping) -> usize {
        (mapping.arbitration_id - self.reference_id) as usize
    }

    pub fn reference_id(&self) -> u32 {
        self.reference_id
    }

    pub fn last_id(&self) -> u32 {
        self.last_id
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameMapping> {
        self.mappings.iter()
    }
}
