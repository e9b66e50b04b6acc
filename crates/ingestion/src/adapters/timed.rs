//! Per-point timestamped (Livox-style) message adapter

use contracts::{GenericStampedPointcloud, PointcloudFormat, RawPointcloudMsg, TimedPointcloudMsg};

use crate::adapter::RawMessageAdapter;
use crate::error::{IngestionError, Result};

/// Clouds whose points carry their own offset from the message timebase
#[derive(Debug, Clone, Copy, Default)]
pub struct TimedAdapter;

impl TimedAdapter {
    fn expect(msg: &RawPointcloudMsg) -> Result<&TimedPointcloudMsg> {
        match msg {
            RawPointcloudMsg::Timed(inner) => Ok(inner),
            other => Err(IngestionError::FormatMismatch {
                expected: PointcloudFormat::Livox,
                actual: other.format(),
            }),
        }
    }
}

impl RawMessageAdapter for TimedAdapter {
    fn format(&self) -> PointcloudFormat {
        PointcloudFormat::Livox
    }

    fn num_points(&self, msg: &RawPointcloudMsg) -> Result<usize> {
        Ok(Self::expect(msg)?.points.len())
    }

    /// The message's own timebase, not the header stamp
    fn extract_timebase(&self, msg: &RawPointcloudMsg) -> Result<u64> {
        Ok(Self::expect(msg)?.timebase)
    }

    fn extract_points(
        &self,
        msg: &RawPointcloudMsg,
        cloud: &mut GenericStampedPointcloud,
    ) -> Result<()> {
        for point in &Self::expect(msg)?.points {
            cloud.push(point.x, point.y, point.z, point.offset_time);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{MessageHeader, TimedPoint};

    fn timed_point(offset_time: u32, x: f32) -> TimedPoint {
        TimedPoint {
            offset_time,
            x,
            y: 0.0,
            z: 0.0,
            reflectivity: 0,
            tag: 0,
            line: 0,
        }
    }

    #[test]
    fn test_uses_message_timebase_and_offsets() {
        let msg = RawPointcloudMsg::from(TimedPointcloudMsg {
            header: MessageHeader {
                stamp_ns: 9_999,
                frame_id: "livox_frame".into(),
            },
            timebase: 5_000,
            lidar_id: 0,
            points: vec![timed_point(0, 1.0), timed_point(250, 2.0)],
        });

        assert_eq!(TimedAdapter.extract_timebase(&msg).unwrap(), 5_000);
        assert_eq!(TimedAdapter.extract_frame(&msg), "livox_frame");

        let mut cloud = GenericStampedPointcloud::with_capacity(5_000, "livox_frame", 2);
        TimedAdapter.extract_points(&msg, &mut cloud).unwrap();
        assert_eq!(cloud.points()[1].time_offset, 250);
        assert_eq!(cloud.end_time(), 5_250);
    }
}
