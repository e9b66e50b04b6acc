//! 原始点云消息
//!
//! 传感器传输层送达的消息结构，进入 ingestion 后统一转换为
//! `GenericStampedPointcloud`。

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// 消息头
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    /// 采集时间戳 (纳秒)
    pub stamp_ns: u64,

    /// 点所在坐标系
    pub frame_id: String,
}

/// 字段数据类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointFieldDatatype {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
}

impl PointFieldDatatype {
    /// 单个元素字节数
    pub fn size(self) -> usize {
        match self {
            Self::Int8 | Self::Uint8 => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }
}

/// 点字段描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointField {
    /// 字段名 (x, y, z, intensity, ...)
    pub name: String,

    /// 在单个点内的字节偏移
    pub offset: u32,

    /// 数据类型
    pub datatype: PointFieldDatatype,

    /// 元素个数
    pub count: u32,
}

impl PointField {
    /// 单个 float32 字段
    pub fn float32(name: impl Into<String>, offset: u32) -> Self {
        Self {
            name: name.into(),
            offset,
            datatype: PointFieldDatatype::Float32,
            count: 1,
        }
    }
}

/// 结构化稠密点云 (PointCloud2 风格)
///
/// 不携带逐点时间，整帧共用 `header.stamp_ns`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredPointcloudMsg {
    pub header: MessageHeader,

    /// 行数 (无序点云为 1)
    pub height: u32,

    /// 每行点数
    pub width: u32,

    /// 字段列表，顺序有意义
    pub fields: Vec<PointField>,

    /// 是否大端序
    pub is_bigendian: bool,

    /// 单个点字节数
    pub point_step: u32,

    /// 单行字节数
    pub row_step: u32,

    /// 原始数据 (零拷贝)
    pub data: Bytes,
}

impl StructuredPointcloudMsg {
    /// 点数量
    pub fn num_points(&self) -> usize {
        (self.height as usize).saturating_mul(self.width as usize)
    }
}

/// 带逐点时间偏移的点 (Livox 风格)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedPoint {
    /// 相对 timebase 的偏移 (纳秒)
    pub offset_time: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub reflectivity: u8,
    pub tag: u8,
    pub line: u8,
}

/// 逐点时间戳点云 (Livox CustomMsg 风格)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedPointcloudMsg {
    pub header: MessageHeader,

    /// 第一个点的时间 (纳秒)，逐点偏移以此为基准
    pub timebase: u64,

    /// 激光雷达 ID
    pub lidar_id: u8,

    pub points: Vec<TimedPoint>,
}

/// 消息格式 (配置中的 `topic_type`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointcloudFormat {
    /// 结构化稠密点云
    #[default]
    #[serde(alias = "pointcloud2")]
    PointCloud2,
    /// 逐点时间戳点云
    Livox,
}

impl std::fmt::Display for PointcloudFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PointCloud2 => f.write_str("point_cloud2"),
            Self::Livox => f.write_str("livox"),
        }
    }
}

/// 传输层送达的任意点云消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RawPointcloudMsg {
    Structured(StructuredPointcloudMsg),
    Timed(TimedPointcloudMsg),
}

impl RawPointcloudMsg {
    /// 消息格式
    pub fn format(&self) -> PointcloudFormat {
        match self {
            Self::Structured(_) => PointcloudFormat::PointCloud2,
            Self::Timed(_) => PointcloudFormat::Livox,
        }
    }

    pub fn header(&self) -> &MessageHeader {
        match self {
            Self::Structured(msg) => &msg.header,
            Self::Timed(msg) => &msg.header,
        }
    }
}

impl From<StructuredPointcloudMsg> for RawPointcloudMsg {
    fn from(msg: StructuredPointcloudMsg) -> Self {
        Self::Structured(msg)
    }
}

impl From<TimedPointcloudMsg> for RawPointcloudMsg {
    fn from(msg: TimedPointcloudMsg) -> Self {
        Self::Timed(msg)
    }
}
