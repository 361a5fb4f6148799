//! 信号数据库能力接口与类型化信号访问
//!
//! 信号数据库负责把帧负载翻译成 `信号名 → 物理值`。解析格式（DBC）由
//! [`DbcDatabase`] 提供；上层只依赖 [`SignalDatabase`] trait。
//!
//! [`SignalReader`] 在解码结果之上提供带默认值的类型化读取：缺失的信号
//! 不会中断整条记录的解码，只会以字段默认值替代并被记为一次 decode miss。

mod dbc;

pub use dbc::DbcDatabase;

use crate::ProtocolError;
use num_enum::FromPrimitive;
use std::collections::HashMap;

/// 信号数据库能力
///
/// 实现方需保证线程安全：RX 线程和测试代码可能并发调用。
pub trait SignalDatabase: Send + Sync {
    /// 将负载解码为物理值
    ///
    /// # 错误
    /// - `ProtocolError::UnknownMessage`: 数据库中没有该 ID
    /// - `ProtocolError::InvalidLength`: 负载短于数据库声明的长度
    fn decode(&self, id: u32, payload: &[u8]) -> Result<SignalValues, ProtocolError>;

    /// 将物理值编码为负载（长度为数据库声明的长度，未给出的信号为 0）
    fn encode(&self, id: u32, values: &SignalValues) -> Result<Vec<u8>, ProtocolError>;

    /// 数据库声明的负载长度
    fn message_len(&self, id: u32) -> Option<usize>;
}

/// 一帧的解码结果：信号名 → 物理值
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalValues {
    values: HashMap<String, f64>,
}

impl SignalValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    /// 链式插入，便于构造测试数据与编码输入
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// 基于本结果创建类型化读取器
    pub fn reader(&self) -> SignalReader<'_> {
        SignalReader::new(self)
    }
}

impl FromIterator<(String, f64)> for SignalValues {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// 类型化信号读取器
///
/// 每个读取方法都带一个字段默认值；信号缺失时返回默认值并记录缺失的信号名。
/// 数值转换为饱和转换（NaN → 0）。
pub struct SignalReader<'a> {
    values: &'a SignalValues,
    missing: Vec<String>,
}

impl<'a> SignalReader<'a> {
    pub fn new(values: &'a SignalValues) -> Self {
        Self {
            values,
            missing: Vec::new(),
        }
    }

    fn raw(&mut self, name: &str) -> Option<f64> {
        let value = self.values.get(name);
        if value.is_none() {
            self.missing.push(name.to_owned());
        }
        value
    }

    pub fn f64(&mut self, name: &str, default: f64) -> f64 {
        self.raw(name).unwrap_or(default)
    }

    pub fn f32(&mut self, name: &str, default: f32) -> f32 {
        self.raw(name).map(|v| v as f32).unwrap_or(default)
    }

    pub fn u8(&mut self, name: &str, default: u8) -> u8 {
        self.raw(name).map(|v| v.round() as u8).unwrap_or(default)
    }

    pub fn u16(&mut self, name: &str, default: u16) -> u16 {
        self.raw(name).map(|v| v.round() as u16).unwrap_or(default)
    }

    pub fn u32(&mut self, name: &str, default: u32) -> u32 {
        self.raw(name).map(|v| v.round() as u32).unwrap_or(default)
    }

    /// 非零即真
    pub fn bool(&mut self, name: &str, default: bool) -> bool {
        self.raw(name).map(|v| v != 0.0).unwrap_or(default)
    }

    /// 读取为 `num_enum::FromPrimitive` 枚举（未定义的编码落到枚举的默认变体）
    pub fn enumeration<T>(&mut self, name: &str, default: T) -> T
    where
        T: FromPrimitive<Primitive = u8>,
    {
        self.raw(name)
            .map(|v| T::from_primitive(v.round() as u8))
            .unwrap_or(default)
    }

    /// 读取过程中缺失的信号数
    pub fn miss_count(&self) -> usize {
        self.missing.len()
    }

    /// 结束读取，返回缺失的信号名
    pub fn finish(self) -> Vec<String> {
        self.missing
    }
}
