//! CAN ID 常量定义和分类
//!
//! 雷达总线与整车总线的所有帧 ID、E2E Data ID 常量。

// ============================================================================
// 雷达总线：目标列表帧（0x140 ~ 0x15C，步长 2，每帧两个目标）
// ============================================================================

/// 目标列表首帧 ID（槽位 0/1），也是槽位索引的参考 ID
pub const ID_OBJECT_LIST_FIRST: u32 = 0x140;

/// 目标列表末帧 ID（槽位 28/29）
pub const ID_OBJECT_LIST_LAST: u32 = 0x15C;

// ============================================================================
// 雷达总线：状态帧
// ============================================================================

/// 雷达诊断/标定状态帧
pub const ID_RADAR_STATUS: u32 = 0x160;

/// 状态帧 E2E Data ID
pub const E2E_ID_RADAR_STATUS: u16 = 0x8D8;

// ============================================================================
// 整车总线
// ============================================================================

/// 车速
pub const ID_VEHICLE_SPEED: u32 = 0x164;

/// 轮速
pub const ID_WHEEL_SPEED: u32 = 0x309;

// ============================================================================
// 雷达总线：发送帧
// ============================================================================

/// 车辆运动状态
pub const ID_VEH_MOTION_STATE: u32 = 0x200;

/// 车辆配置 + 电源模式（两个 E2E 段拼接为一帧）
pub const ID_CAR_CONFIG: u32 = 0x210;

/// 全局快照
pub const ID_GLOBAL_SNAPSHOT: u32 = 0x220;

/// 车辆模式
pub const ID_VEH_MODES: u32 = 0x230;

/// 功能信息
pub const ID_FUNC_INFO: u32 = 0x240;

/// 时间同步：秒
pub const ID_TIME_SYNC_SECONDS: u32 = 0x250;

/// 时间同步：纳秒
pub const ID_TIME_SYNC_NANOS: u32 = 0x251;

pub const E2E_ID_VEH_MOTION_STATE: u16 = 0xA33;
pub const E2E_ID_CAR_CONFIG: u16 = 0xA35;
pub const E2E_ID_POWER_MODE: u16 = 0xD0B;
pub const E2E_ID_GLOBAL_SNAPSHOT: u16 = 0xD1C;
pub const E2E_ID_VEH_MODES: u16 = 0xA47;
pub const E2E_ID_FUNC_INFO: u16 = 0xB7A;
pub const E2E_ID_TIME_SYNC_SECONDS: u16 = 0xC10;
pub const E2E_ID_TIME_SYNC_NANOS: u16 = 0xC11;

// ============================================================================
// ID 分类
// ============================================================================

/// 雷达总线帧分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadarFrameClass {
    /// 目标列表帧
    ObjectList,
    /// 状态帧
    Status,
    /// 其它（只记录，不解析）
    Other,
}

impl RadarFrameClass {
    /// 根据 CAN ID 判断帧类型
    pub fn from_id(id: u32) -> Self {
        match id {
            ID_RADAR_STATUS => RadarFrameClass::Status,
            ID_OBJECT_LIST_FIRST..=ID_OBJECT_LIST_LAST => RadarFrameClass::ObjectList,
            _ => RadarFrameClass::Other,
        }
    }
}
