//! 集成测试公共工具：小型 DBC、E2E 保护帧构造、等待条件

#![allow(dead_code)]

use radar_protocol::{
    DbcDatabase, E2eProtection, Profile05, RadarFrame, SignalDatabase, SignalValues,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 雷达总线：第一个目标列表帧（0x140）+ 状态帧（0x160，只含部分信号）
pub const RADAR_DBC: &str = r#"VERSION ""


NS_ :
    NS_DESC_
    CM_
    BA_DEF_
    BA_
    VAL_

BS_:

BU_: FLR ADAS


BO_ 320 FlrFlr1canFr82: 64 FLR
 SG_ FLR2RdrObject0To1Crc : 0|16@1+ (1,0) [0|65535] "" ADAS
 SG_ FLR2RdrObject0To1MsgCntr : 16|8@1+ (1,0) [0|255] "" ADAS
 SG_ FLR2RdrObject0To1ScanID : 24|16@1+ (1,0) [0|65535] "" ADAS
 SG_ FLR2RdrObject0To1Class0 : 40|4@1+ (1,0) [0|15] "" ADAS
 SG_ FLR2RdrObject0To1Class1 : 44|4@1+ (1,0) [0|15] "" ADAS
 SG_ FLR2RdrObject0To1LgtPos0 : 48|16@1- (0.01,0) [-327.68|327.67] "m" ADAS
 SG_ FLR2RdrObject0To1LgtPos1 : 64|16@1- (0.01,0) [-327.68|327.67] "m" ADAS
 SG_ FLR2RdrObject0To1LatPos0 : 80|16@1- (0.01,0) [-327.68|327.67] "m" ADAS
 SG_ FLR2RdrObject0To1LatPos1 : 96|16@1- (0.01,0) [-327.68|327.67] "m" ADAS
 SG_ FLR2RdrObject0To1DataConf0 : 112|8@1+ (1,0) [0|100] "%" ADAS
 SG_ FLR2RdrObject0To1DataConf1 : 120|8@1+ (1,0) [0|100] "%" ADAS

BO_ 352 FLR2RdrSts: 16 FLR
 SG_ FLR2RdrStsCrc : 0|16@1+ (1,0) [0|65535] "" ADAS
 SG_ FLR2RdrStsCntr : 16|8@1+ (1,0) [0|255] "" ADAS
 SG_ FLR2RdrStsInternTemp : 24|8@1+ (1,-40) [-40|215] "degC" ADAS
 SG_ FLR2RdrStsCalSts : 32|2@1+ (1,0) [0|3] "" ADAS
 SG_ FLR2RdrStsFault : 34|1@1+ (1,0) [0|1] "" ADAS
 SG_ FLR2RdrStsAligned : 35|1@1+ (1,0) [0|1] "" ADAS
 SG_ FLR2RdrStsTiStamp : 40|32@1+ (1,0) [0|4294967295] "ms" ADAS

"#;

/// 状态帧 DBC 中包含的信号数量
pub const STATUS_SIGNALS_IN_DBC: usize = 7;

/// 整车总线：车速（Motorola）+ 轮速（Intel）
pub const VEHICLE_DBC: &str = r#"VERSION ""


NS_ :
    NS_DESC_
    CM_
    BA_DEF_
    BA_
    VAL_

BS_:

BU_: FLR VCU


BO_ 356 VehSpd: 8 VCU
 SG_ VehSpd : 7|16@0+ (0.01,0) [0|655.35] "m/s" FLR

BO_ 777 WhlSpd: 8 VCU
 SG_ WhlSpdLe : 0|16@1+ (0.01,0) [0|655.35] "m/s" FLR
 SG_ WhlSpdRi : 16|16@1+ (0.01,0) [0|655.35] "m/s" FLR

BO_ 1024 Gear: 8 VCU
 SG_ GearPos : 0|4@1+ (1,0) [0|15] "" FLR

"#;

pub const E2E_ID_FR82: u16 = 0x8CF;

pub fn radar_db() -> Arc<DbcDatabase> {
    Arc::new(DbcDatabase::from_slice(RADAR_DBC.as_bytes()).unwrap())
}

pub fn vehicle_db() -> Arc<DbcDatabase> {
    Arc::new(DbcDatabase::from_slice(VEHICLE_DBC.as_bytes()).unwrap())
}

/// 编码后按 Profile 05 保护（CRC 位于偏移 0，计数器由信号值给出）
pub fn protected_fd_frame(
    db: &DbcDatabase,
    id: u16,
    values: &SignalValues,
    data_id: u16,
) -> RadarFrame {
    let mut payload = db.encode(id as u32, values).unwrap();
    let len = payload.len();
    Profile05::new()
        .protect(&mut payload, len - 2, 0, data_id, false)
        .unwrap();
    RadarFrame::new_fd(id, &payload)
}

/// 0x140 目标列表帧
pub fn object_frame(db: &DbcDatabase, counter: u8, scan_id: u16, values: SignalValues) -> RadarFrame {
    let values = values
        .with("FLR2RdrObject0To1MsgCntr", counter as f64)
        .with("FLR2RdrObject0To1ScanID", scan_id as f64);
    protected_fd_frame(db, 0x140, &values, E2E_ID_FR82)
}

/// 0x160 状态帧
pub fn status_frame(db: &DbcDatabase, values: SignalValues) -> RadarFrame {
    protected_fd_frame(db, 0x160, &values, radar_protocol::E2E_ID_RADAR_STATUS)
}

/// 轮询直到条件成立或超时
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}
