//! Adapter common utility functions

use bytemuck::{Pod, Zeroable};
use contracts::{MessageHeader, PointField, StructuredPointcloudMsg};

/// Dense point layout used by mock sources and tests (16 bytes per point)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct XyzPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub intensity: f32,
}

impl XyzPoint {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            intensity: 0.0,
        }
    }
}

const XYZ_POINT_STEP: u32 = std::mem::size_of::<XyzPoint>() as u32;

/// Safely convert slice implementing bytemuck::Pod to bytes::Bytes
#[inline]
pub fn pod_slice_to_bytes<T: Pod>(slice: &[T]) -> bytes::Bytes {
    bytes::Bytes::copy_from_slice(bytemuck::cast_slice(slice))
}

/// Build an unordered (height 1) structured cloud with x, y, z, intensity fields
pub fn structured_msg_from_points(header: MessageHeader, points: &[XyzPoint]) -> StructuredPointcloudMsg {
    let width = points.len() as u32;
    StructuredPointcloudMsg {
        header,
        height: 1,
        width,
        fields: vec![
            PointField::float32("x", 0),
            PointField::float32("y", 4),
            PointField::float32("z", 8),
            PointField::float32("intensity", 12),
        ],
        is_bigendian: cfg!(target_endian = "big"),
        point_step: XYZ_POINT_STEP,
        row_step: XYZ_POINT_STEP * width,
        data: pod_slice_to_bytes(points),
    }
}

/// Read one float32 at `pos`, honouring the message byte order
#[inline]
pub(crate) fn read_f32(data: &[u8], pos: usize, is_bigendian: bool) -> Option<f32> {
    let raw: [u8; 4] = data.get(pos..pos + 4)?.try_into().ok()?;
    Some(if is_bigendian {
        f32::from_be_bytes(raw)
    } else {
        f32::from_le_bytes(raw)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_layout() {
        let header = MessageHeader {
            stamp_ns: 7,
            frame_id: "os_sensor".into(),
        };
        let msg = structured_msg_from_points(
            header,
            &[XyzPoint::new(1.0, 2.0, 3.0), XyzPoint::new(4.0, 5.0, 6.0)],
        );
        assert_eq!(msg.num_points(), 2);
        assert_eq!(msg.data.len(), 32);
        assert_eq!(read_f32(&msg.data, 16 + 8, msg.is_bigendian), Some(6.0));
        assert_eq!(read_f32(&msg.data, 30, msg.is_bigendian), None);
    }
}
