//! 原始消息适配器 trait

use contracts::{GenericStampedPointcloud, PointcloudFormat, RawPointcloudMsg};

use crate::adapters::{StructuredAdapter, TimedAdapter};
use crate::error::Result;

/// 原始消息适配器 trait
///
/// 每种消息格式实现此 trait，负责：
/// 1. 读取消息自带的时间基准
/// 2. 读取消息自带的坐标系
/// 3. 校验字段布局并提取 (x, y, z, 时间偏移)
///
/// 时间偏移量、坐标系覆盖和入队由 `PointcloudIngestor` 统一处理。
pub trait RawMessageAdapter: Send + Sync {
    /// 适配的消息格式
    fn format(&self) -> PointcloudFormat;

    /// 消息中的点数量
    fn num_points(&self, msg: &RawPointcloudMsg) -> Result<usize>;

    /// 消息原生时间基准 (纳秒，未加偏移)
    fn extract_timebase(&self, msg: &RawPointcloudMsg) -> Result<u64>;

    /// 消息自带的坐标系
    fn extract_frame<'a>(&self, msg: &'a RawPointcloudMsg) -> &'a str {
        &msg.header().frame_id
    }

    /// 按消息顺序把点追加到 `cloud`
    fn extract_points(&self, msg: &RawPointcloudMsg, cloud: &mut GenericStampedPointcloud)
        -> Result<()>;
}

/// 按配置的 `topic_type` 选择适配器
pub fn adapter_for(format: PointcloudFormat) -> Box<dyn RawMessageAdapter> {
    match format {
        PointcloudFormat::PointCloud2 => Box::new(StructuredAdapter),
        PointcloudFormat::Livox => Box::new(TimedAdapter),
    }
}
