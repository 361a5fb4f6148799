//! 目标槽位与雷达视图
//!
//! 雷达视图固定 30 个槽位，槽位下标即目标 ID。`object_id == INVALID_OBJECT_ID`
//! 的槽位表示该位置尚未收到过目标。

use num_enum::{FromPrimitive, IntoPrimitive};

/// 槽位数量
pub const OBJECT_SLOT_COUNT: usize = 30;

/// 无效目标 ID（未收到数据的槽位）
pub const INVALID_OBJECT_ID: u8 = 30;

/// 目标分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ObjectClass {
    /// 未知（包括未定义的编码）
    #[default]
    Unknown = 0,
    /// 汽车
    Car = 1,
    /// 自行车
    Bicycle = 2,
    /// 行人
    Pedestrian = 3,
}

/// 单个跟踪目标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectSlot {
    /// 目标 ID（0..29 与槽位下标一致；30 表示空槽）
    pub object_id: u8,
    pub class: ObjectClass,
    /// 置信度（0-100）
    pub data_confidence: u8,
    /// 长度（m）
    pub length: f64,
    /// 宽度（m）
    pub width: f64,
    /// 航向角（rad）
    pub heading_angle: f64,
    pub lateral_acc: f64,
    pub lateral_pos: f64,
    pub lateral_velocity: f64,
    pub longitudinal_acc: f64,
    pub longitudinal_pos: f64,
    pub longitudinal_velocity: f64,
    pub model_info: u8,
    pub quality: u8,
}

impl ObjectSlot {
    /// 空槽
    pub const fn absent() -> Self {
        Self {
            object_id: INVALID_OBJECT_ID,
            class: ObjectClass::Unknown,
            data_confidence: 0,
            length: 0.0,
            width: 0.0,
            heading_angle: 0.0,
            lateral_acc: 0.0,
            lateral_pos: 0.0,
            lateral_velocity: 0.0,
            longitudinal_acc: 0.0,
            longitudinal_pos: 0.0,
            longitudinal_velocity: 0.0,
            model_info: 0,
            quality: 0,
        }
    }

    /// 指定 ID、其余字段为中性值的槽位（解码缺失信号时的基准值）
    pub const fn neutral(object_id: u8) -> Self {
        let mut slot = Self::absent();
        slot.object_id = object_id;
        slot
    }

    pub fn is_present(&self) -> bool {
        self.object_id != INVALID_OBJECT_ID
    }
}

impl Default for ObjectSlot {
    fn default() -> Self {
        Self::absent()
    }
}

/// 一帧目标列表带来的更新：两个相邻槽位 + 帧级计数器/扫描 ID
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectPairUpdate {
    /// 第一个槽位下标
    pub index: usize,
    pub slots: [ObjectSlot; 2],
    pub message_counter: u8,
    pub scan_id: u16,
}

/// 雷达视图（规范目标表）
#[derive(Debug, Clone, PartialEq)]
pub struct RadarView {
    /// 最近一帧的报文计数器
    pub message_counter: u8,
    /// 最近一帧的扫描 ID
    pub scan_id: u16,
    pub objects: [ObjectSlot; OBJECT_SLOT_COUNT],
}

impl Default for RadarView {
    fn default() -> Self {
        Self {
            message_counter: 0,
            scan_id: 0,
            objects: [ObjectSlot::absent(); OBJECT_SLOT_COUNT],
        }
    }
}

impl RadarView {
    /// 写入一个槽位对，只修改 `[index, index + 1]`
    ///
    /// 越界的下标会被忽略（返回 false），不修改任何字段。
    pub fn apply(&mut self, update: &ObjectPairUpdate) -> bool {
        if update.index + 1 >= OBJECT_SLOT_COUNT {
            return false;
        }
        self.message_counter = update.message_counter;
        self.scan_id = update.scan_id;
        self.objects[update.index] = update.slots[0];
        self.objects[update.index + 1] = update.slots[1];
        true
    }

    /// 基于当前视图构建应用了更新的新视图
    pub fn with_update(&self, update: &ObjectPairUpdate) -> Self {
        let mut next = self.clone();
        next.apply(update);
        next
    }

    /// 已收到数据的目标
    pub fn present_objects(&self) -> impl Iterator<Item = &ObjectSlot> {
        self.objects.iter().filter(|o| o.is_present())
    }

    pub fn present_count(&self) -> usize {
        self.present_objects().count()
    }
}
