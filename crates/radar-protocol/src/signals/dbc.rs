//! 基于 `can-dbc` 的信号数据库
//!
//! 读取 Vector DBC 文件，转换为内部布局表后按位解码/编码。
//!
//! ## 位布局
//!
//! - Intel（`@1`）：`start_bit` 为最低位，按位号递增
//! - Motorola（`@0`）：`start_bit` 为最高位，按 DBC 锯齿编号前进
//!   （字节内递减，越过字节的 bit 0 时跳到下一字节的 bit 7）
//!
//! 多路复用报文中，被复用的信号只在复用器取值匹配时才出现在解码结果里。

use super::{SignalDatabase, SignalValues};
use crate::ProtocolError;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// DBC 扩展帧标志位
const DBC_EXTENDED_FLAG: u32 = 0x8000_0000;
const CAN_EFF_MASK: u32 = 0x1FFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum MuxRole {
    Plain,
    Multiplexor,
    Multiplexed(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SignalLayout {
    pub name: String,
    pub start_bit: u32,
    pub size: u32,
    pub little_endian: bool,
    pub signed: bool,
    pub factor: f64,
    pub offset: f64,
    pub mux: MuxRole,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MessageLayout {
    pub name: String,
    pub size: usize,
    pub signals: Vec<SignalLayout>,
}

/// DBC 信号数据库
#[derive(Debug, Clone, Default)]
pub struct DbcDatabase {
    messages: HashMap<u32, MessageLayout>,
}

impl DbcDatabase {
    /// 从 DBC 文件加载（非 UTF-8 文件按 Latin-1 读取）
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ProtocolError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            ProtocolError::Database(format!("Failed to read DBC file {:?}: {}", path, e))
        })?;

        let content = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!("DBC file {:?} is not UTF-8, falling back to Latin-1", path);
                e.into_bytes().iter().map(|&b| b as char).collect()
            },
        };

        let db = Self::from_slice(content.as_bytes())?;
        info!("Loaded {} messages from {:?}", db.messages.len(), path);
        Ok(db)
    }

    /// 从内存中的 DBC 文本加载
    pub fn from_slice(buffer: &[u8]) -> Result<Self, ProtocolError> {
        let dbc = can_dbc::DBC::from_slice(buffer)
            .map_err(|e| ProtocolError::Database(format!("Failed to parse DBC: {:?}", e)))?;

        let mut messages = HashMap::new();
        for message in dbc.messages() {
            let raw_id = message.message_id().0;
            let id = if raw_id & DBC_EXTENDED_FLAG != 0 {
                raw_id & CAN_EFF_MASK
            } else {
                raw_id
            };
            let layout = MessageLayout {
                name: message.message_name().to_string(),
                size: *message.message_size() as usize,
                signals: message.signals().iter().map(convert_signal).collect(),
            };
            debug!(
                "DBC message 0x{:X} {} ({} bytes, {} signals)",
                id,
                layout.name,
                layout.size,
                layout.signals.len()
            );
            messages.insert(id, layout);
        }

        Ok(Self { messages })
    }

    /// 报文名（用于日志/显示）
    pub fn message_name(&self, id: u32) -> Option<&str> {
        self.messages.get(&id).map(|m| m.name.as_str())
    }

    /// 已加载报文数量
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn from_layouts(layouts: impl IntoIterator<Item = (u32, MessageLayout)>) -> Self {
        Self {
            messages: layouts.into_iter().collect(),
        }
    }
}

fn convert_signal(signal: &can_dbc::Signal) -> SignalLayout {
    let mux = match *signal.multiplexer_indicator() {
        can_dbc::MultiplexIndicator::Multiplexor => MuxRole::Multiplexor,
        can_dbc::MultiplexIndicator::MultiplexedSignal(value) => MuxRole::Multiplexed(value),
        can_dbc::MultiplexIndicator::MultiplexorAndMultiplexedSignal(value) => {
            MuxRole::Multiplexed(value)
        },
        can_dbc::MultiplexIndicator::Plain => MuxRole::Plain,
    };

    SignalLayout {
        name: signal.name().to_string(),
        start_bit: *signal.start_bit() as u32,
        size: *signal.signal_size() as u32,
        little_endian: matches!(*signal.byte_order(), can_dbc::ByteOrder::LittleEndian),
        signed: matches!(*signal.value_type(), can_dbc::ValueType::Signed),
        factor: *signal.factor(),
        offset: *signal.offset(),
        mux,
    }
}

// ============================================================================
// 位操作
// ============================================================================

/// 信号占用的负载位号（从最低有效位到最高有效位）
fn bit_positions(signal: &SignalLayout) -> Vec<u32> {
    if signal.little_endian {
        (signal.start_bit..signal.start_bit + signal.size).collect()
    } else {
        // Motorola：从 MSB 开始按锯齿编号前进，最后反转为 LSB 在前
        let mut positions = Vec::with_capacity(signal.size as usize);
        let mut pos = signal.start_bit;
        for i in 0..signal.size {
            positions.push(pos);
            if i + 1 < signal.size {
                pos = if pos % 8 == 0 { pos + 15 } else { pos - 1 };
            }
        }
        positions.reverse();
        positions
    }
}

fn check_fits(signal: &SignalLayout, positions: &[u32], frame_len: usize) -> Result<(), ProtocolError> {
    if signal.size == 0 || signal.size > 64 || positions.iter().any(|&p| p as usize >= frame_len * 8) {
        return Err(ProtocolError::SignalOutOfFrame {
            signal: signal.name.clone(),
            frame_len,
        });
    }
    Ok(())
}

fn extract_raw(signal: &SignalLayout, payload: &[u8]) -> Result<u64, ProtocolError> {
    let positions = bit_positions(signal);
    check_fits(signal, &positions, payload.len())?;

    let mut raw = 0u64;
    for (i, pos) in positions.iter().enumerate() {
        let bit = (payload[(*pos / 8) as usize] >> (pos % 8)) & 1;
        raw |= (bit as u64) << i;
    }
    Ok(raw)
}

fn insert_raw(signal: &SignalLayout, payload: &mut [u8], raw: u64) -> Result<(), ProtocolError> {
    let positions = bit_positions(signal);
    check_fits(signal, &positions, payload.len())?;

    for (i, pos) in positions.iter().enumerate() {
        let byte = &mut payload[(*pos / 8) as usize];
        let mask = 1u8 << (pos % 8);
        if (raw >> i) & 1 == 1 {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }
    Ok(())
}

fn sign_extend(raw: u64, size: u32) -> i64 {
    if size >= 64 {
        return raw as i64;
    }
    let sign_bit = 1u64 << (size - 1);
    if raw & sign_bit != 0 {
        (raw | !((1u64 << size) - 1)) as i64
    } else {
        raw as i64
    }
}

fn to_physical(signal: &SignalLayout, raw: u64) -> f64 {
    let value = if signal.signed {
        sign_extend(raw, signal.size) as f64
    } else {
        raw as f64
    };
    value * signal.factor + signal.offset
}

fn to_raw(signal: &SignalLayout, physical: f64) -> u64 {
    let factor = if signal.factor == 0.0 { 1.0 } else { signal.factor };
    let scaled = ((physical - signal.offset) / factor).round();
    let mask = if signal.size >= 64 {
        u64::MAX
    } else {
        (1u64 << signal.size) - 1
    };
    if signal.signed {
        (scaled as i64 as u64) & mask
    } else {
        (scaled.max(0.0) as u64) & mask
    }
}

impl MessageLayout {
    fn decode(&self, payload: &[u8]) -> Result<SignalValues, ProtocolError> {
        // 先取复用器的值，决定哪些被复用信号有效
        let mut selector = None;
        for signal in self.signals.iter().filter(|s| s.mux == MuxRole::Multiplexor) {
            selector = Some(extract_raw(signal, payload)?);
        }

        let mut values = SignalValues::new();
        for signal in &self.signals {
            if let MuxRole::Multiplexed(switch) = signal.mux
                && selector != Some(switch)
            {
                continue;
            }
            let raw = extract_raw(signal, payload)?;
            values.insert(signal.name.clone(), to_physical(signal, raw));
        }
        Ok(values)
    }

    fn encode(&self, values: &SignalValues) -> Result<Vec<u8>, ProtocolError> {
        let mut payload = vec![0u8; self.size];
        for signal in &self.signals {
            if let Some(physical) = values.get(&signal.name) {
                insert_raw(signal, &mut payload, to_raw(signal, physical))?;
            }
        }
        Ok(payload)
    }
}

impl SignalDatabase for DbcDatabase {
    fn decode(&self, id: u32, payload: &[u8]) -> Result<SignalValues, ProtocolError> {
        let message = self
            .messages
            .get(&id)
            .ok_or(ProtocolError::UnknownMessage { id })?;
        if payload.len() < message.size {
            return Err(ProtocolError::InvalidLength {
                expected: message.size,
                actual: payload.len(),
            });
        }
        message.decode(payload)
    }

    fn encode(&self, id: u32, values: &SignalValues) -> Result<Vec<u8>, ProtocolError> {
        self.messages
            .get(&id)
            .ok_or(ProtocolError::UnknownMessage { id })?
            .encode(values)
    }

    fn message_len(&self, id: u32) -> Option<usize> {
        self.messages.get(&id).map(|m| m.size)
    }
}
