//! Structured (PointCloud2-style) message adapter

use contracts::{
    GenericStampedPointcloud, PointField, PointFieldDatatype, PointcloudFormat, RawPointcloudMsg,
    StructuredPointcloudMsg,
};

use crate::adapter::RawMessageAdapter;
use crate::adapters::common::read_f32;
use crate::error::{IngestionError, Result};

/// Dense clouds without per-point timing; every point gets offset 0
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredAdapter;

/// Byte offsets of x, y, z within one point
struct XyzLayout {
    x: usize,
    y: usize,
    z: usize,
}

/// Buffer geometry implied by the header, checked against the data
struct BufferLayout {
    point_step: usize,
    row_step: usize,
}

impl StructuredAdapter {
    fn expect(msg: &RawPointcloudMsg) -> Result<&StructuredPointcloudMsg> {
        match msg {
            RawPointcloudMsg::Structured(inner) => Ok(inner),
            other => Err(IngestionError::FormatMismatch {
                expected: PointcloudFormat::PointCloud2,
                actual: other.format(),
            }),
        }
    }

    /// `x` may sit anywhere, but `y` and `z` must directly follow it
    fn xyz_layout(msg: &StructuredPointcloudMsg) -> Result<XyzLayout> {
        let x_idx = msg
            .fields
            .iter()
            .position(|f| f.name == "x")
            .ok_or(IngestionError::MissingField { field: "x" })?;

        let next = |idx: usize, expected: &'static str, after: &'static str| {
            let field = msg
                .fields
                .get(idx)
                .ok_or(IngestionError::MissingField { field: expected })?;
            if field.name != expected {
                return Err(IngestionError::FieldOutOfOrder {
                    expected,
                    after,
                    found: field.name.clone(),
                });
            }
            Ok(field)
        };
        let x = &msg.fields[x_idx];
        let y = next(x_idx + 1, "y", "x")?;
        let z = next(x_idx + 2, "z", "y")?;

        for (name, field) in [("x", x), ("y", y), ("z", z)] {
            Self::check_float32(name, field)?;
            let end = (field.offset as usize).saturating_add(4);
            if end > msg.point_step as usize {
                return Err(IngestionError::TruncatedData {
                    expected: end,
                    actual: msg.point_step as usize,
                });
            }
        }

        Ok(XyzLayout {
            x: x.offset as usize,
            y: y.offset as usize,
            z: z.offset as usize,
        })
    }

    /// Header geometry must fit in the data buffer
    ///
    /// All arithmetic is checked: a header whose size overflows is as
    /// truncated as one that points past the data.
    fn buffer_layout(msg: &StructuredPointcloudMsg) -> Result<BufferLayout> {
        let actual = msg.data.len();
        let overflow = || IngestionError::TruncatedData {
            expected: usize::MAX,
            actual,
        };

        let point_step = msg.point_step as usize;
        let row_bytes = (msg.width as usize)
            .checked_mul(point_step)
            .ok_or_else(overflow)?;
        let row_step = (msg.row_step as usize).max(row_bytes);
        let expected = match (msg.height as usize).checked_sub(1) {
            None => 0,
            Some(full_rows) => full_rows
                .checked_mul(row_step)
                .and_then(|bytes| bytes.checked_add(row_bytes))
                .ok_or_else(overflow)?,
        };
        if actual < expected {
            return Err(IngestionError::TruncatedData { expected, actual });
        }
        Ok(BufferLayout {
            point_step,
            row_step,
        })
    }

    fn check_float32(name: &'static str, field: &PointField) -> Result<()> {
        if field.datatype != PointFieldDatatype::Float32 || field.count != 1 {
            return Err(IngestionError::UnsupportedDatatype {
                field: name,
                datatype: field.datatype,
                count: field.count,
            });
        }
        Ok(())
    }
}

impl RawMessageAdapter for StructuredAdapter {
    fn format(&self) -> PointcloudFormat {
        PointcloudFormat::PointCloud2
    }

    /// Validates layout and buffer size first, so the count can size an
    /// allocation without trusting the header
    fn num_points(&self, msg: &RawPointcloudMsg) -> Result<usize> {
        let msg = Self::expect(msg)?;
        let num_points = msg.num_points();
        if num_points == 0 {
            return Ok(0);
        }
        Self::xyz_layout(msg)?;
        Self::buffer_layout(msg)?;
        Ok(num_points)
    }

    fn extract_timebase(&self, msg: &RawPointcloudMsg) -> Result<u64> {
        Ok(Self::expect(msg)?.header.stamp_ns)
    }

    fn extract_points(
        &self,
        msg: &RawPointcloudMsg,
        cloud: &mut GenericStampedPointcloud,
    ) -> Result<()> {
        let msg = Self::expect(msg)?;
        let layout = Self::xyz_layout(msg)?;
        let BufferLayout {
            point_step,
            row_step,
        } = Self::buffer_layout(msg)?;

        for row in 0..msg.height as usize {
            for col in 0..msg.width as usize {
                let base = row * row_step + col * point_step;
                let truncated = || IngestionError::TruncatedData {
                    expected: base + point_step,
                    actual: msg.data.len(),
                };
                let x = read_f32(&msg.data, base + layout.x, msg.is_bigendian).ok_or_else(truncated)?;
                let y = read_f32(&msg.data, base + layout.y, msg.is_bigendian).ok_or_else(truncated)?;
                let z = read_f32(&msg.data, base + layout.z, msg.is_bigendian).ok_or_else(truncated)?;
                cloud.push(x, y, z, 0);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{structured_msg_from_points, XyzPoint};
    use contracts::MessageHeader;

    fn header() -> MessageHeader {
        MessageHeader {
            stamp_ns: 1_000,
            frame_id: "os_sensor".into(),
        }
    }

    fn sample_msg() -> StructuredPointcloudMsg {
        structured_msg_from_points(
            header(),
            &[XyzPoint::new(1.0, 2.0, 3.0), XyzPoint::new(-1.0, -2.0, -3.0)],
        )
    }

    fn extract(msg: StructuredPointcloudMsg) -> Result<GenericStampedPointcloud> {
        let raw = RawPointcloudMsg::from(msg);
        let mut cloud = GenericStampedPointcloud::with_capacity(0, "os_sensor", 2);
        StructuredAdapter.extract_points(&raw, &mut cloud)?;
        Ok(cloud)
    }

    #[test]
    fn test_extracts_points_with_zero_offset() {
        let cloud = extract(sample_msg()).unwrap();
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.points()[1].position.z, -3.0);
        assert!(cloud.points().iter().all(|p| p.time_offset == 0));
    }

    #[test]
    fn test_rejects_misordered_fields() {
        let mut msg = sample_msg();
        msg.fields[1].name = "z".into();
        msg.fields[2].name = "y".into();
        let err = extract(msg).unwrap_err();
        assert_eq!(
            err,
            IngestionError::FieldOutOfOrder {
                expected: "y",
                after: "x",
                found: "z".into()
            }
        );
    }

    #[test]
    fn test_rejects_missing_x_and_trailing_x() {
        let mut msg = sample_msg();
        msg.fields.retain(|f| f.name != "x");
        assert_eq!(
            extract(msg).unwrap_err(),
            IngestionError::MissingField { field: "x" }
        );

        let mut msg = sample_msg();
        msg.fields = vec![PointField::float32("intensity", 0), PointField::float32("x", 4)];
        assert_eq!(
            extract(msg).unwrap_err(),
            IngestionError::MissingField { field: "y" }
        );
    }

    #[test]
    fn test_x_need_not_be_first() {
        let mut msg = sample_msg();
        // intensity, x, y, z
        msg.fields = vec![
            PointField::float32("intensity", 12),
            PointField::float32("x", 0),
            PointField::float32("y", 4),
            PointField::float32("z", 8),
        ];
        assert_eq!(extract(msg).unwrap().len(), 2);
    }

    #[test]
    fn test_rejects_non_float_and_short_data() {
        let mut msg = sample_msg();
        msg.fields[2].datatype = PointFieldDatatype::Float64;
        assert!(matches!(
            extract(msg).unwrap_err(),
            IngestionError::UnsupportedDatatype { field: "z", .. }
        ));

        let mut msg = sample_msg();
        msg.data = msg.data.slice(..20);
        assert!(matches!(
            extract(msg).unwrap_err(),
            IngestionError::TruncatedData { expected: 32, actual: 20 }
        ));
    }

    #[test]
    fn test_count_requires_matching_buffer() {
        let mut msg = sample_msg();
        msg.height = 1 << 16;
        msg.width = 1 << 16;
        let raw = RawPointcloudMsg::from(msg);
        assert!(matches!(
            StructuredAdapter.num_points(&raw).unwrap_err(),
            IngestionError::TruncatedData { actual: 32, .. }
        ));

        assert_eq!(
            StructuredAdapter.num_points(&RawPointcloudMsg::from(sample_msg())),
            Ok(2)
        );
    }

    #[test]
    fn test_hostile_header_values_are_rejected_not_panicking() {
        let mut msg = sample_msg();
        msg.fields[2].offset = u32::MAX;
        assert!(matches!(
            extract(msg).unwrap_err(),
            IngestionError::TruncatedData { .. }
        ));

        let mut msg = sample_msg();
        msg.height = u32::MAX;
        msg.width = u32::MAX;
        msg.point_step = u32::MAX;
        msg.row_step = u32::MAX;
        let raw = RawPointcloudMsg::from(msg);
        assert!(matches!(
            StructuredAdapter.num_points(&raw).unwrap_err(),
            IngestionError::TruncatedData { .. }
        ));
        let mut cloud = GenericStampedPointcloud::with_capacity(0, "os_sensor", 0);
        assert!(matches!(
            StructuredAdapter.extract_points(&raw, &mut cloud).unwrap_err(),
            IngestionError::TruncatedData { .. }
        ));
        assert!(cloud.is_empty());
    }
}
