//! 驱动层错误类型定义

use radar_can::CanError;
use radar_protocol::ProtocolError;
use thiserror::Error;

/// 驱动层错误类型
///
/// 只有总线错误（`Can`）会从 RX 分发器向上报告；E2E 失败、解码缺失、
/// 超范围 ID 都在分发器内部消化，以 `FrameDisposition` 表示。
#[derive(Error, Debug)]
pub enum DriverError {
    /// CAN 总线错误
    #[error("CAN bus error: {0}")]
    Can(#[from] CanError),

    /// 协议解析错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 配置错误（如 DBC 加载失败）
    #[error("Configuration error: {0}")]
    Config(String),

    /// 线程创建/退出错误
    #[error("Thread error: {0}")]
    Thread(String),
}
