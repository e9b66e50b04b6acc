//! Ingestion 错误类型
//!
//! 所有错误均为单条消息的拒收原因，不会中断 pipeline。

use contracts::{PointFieldDatatype, PointcloudFormat};
use thiserror::Error;

/// 消息拒收原因
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestionError {
    /// 消息不含任何点
    #[error("pointcloud is empty")]
    EmptyPointcloud,

    /// 缺少必需的坐标字段
    #[error("missing required field '{field}'")]
    MissingField {
        /// 字段名
        field: &'static str,
    },

    /// 坐标字段顺序不是 x, y, z
    #[error("expected field '{expected}' after '{after}', found '{found}'")]
    FieldOutOfOrder {
        /// 期望字段
        expected: &'static str,
        /// 前一个字段
        after: &'static str,
        /// 实际字段
        found: String,
    },

    /// 坐标字段不是单个 float32
    #[error("field '{field}' must be a single float32, got {datatype:?} x{count}")]
    UnsupportedDatatype {
        field: &'static str,
        datatype: PointFieldDatatype,
        count: u32,
    },

    /// 数据长度与点布局不符
    #[error("point data truncated: need {expected} bytes, got {actual}")]
    TruncatedData { expected: usize, actual: usize },

    /// 消息格式与配置的 topic_type 不一致
    #[error("expected {expected} message, got {actual}")]
    FormatMismatch {
        expected: PointcloudFormat,
        actual: PointcloudFormat,
    },

    /// 消费端已关闭
    #[error("ingestion queue closed")]
    QueueClosed,
}

impl IngestionError {
    /// 用于日志和指标的简短原因标签
    pub fn reason(&self) -> &'static str {
        match self {
            Self::EmptyPointcloud => "empty",
            Self::MissingField { .. } => "missing_field",
            Self::FieldOutOfOrder { .. } => "field_order",
            Self::UnsupportedDatatype { .. } => "datatype",
            Self::TruncatedData { .. } => "truncated",
            Self::FormatMismatch { .. } => "format_mismatch",
            Self::QueueClosed => "queue_closed",
        }
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
