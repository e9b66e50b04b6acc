//! FileSink - writes point clouds as PLY and range images as PNG

use contracts::{
    ContractError, DebugMessage, DebugSink, PosedPointcloud, PosedRangeImage, SubscriberGauge,
};
use image::{GrayImage, Luma};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, error, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Base output directory
    pub base_path: PathBuf,
    /// Write points in the world frame instead of the sensor frame
    pub world_frame: bool,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));
        let world_frame = params
            .get("frame")
            .map(|f| f != "sensor")
            .unwrap_or(true);

        Self {
            base_path,
            world_frame,
        }
    }
}

/// Sink that writes debug messages to disk
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    subscribers: SubscriberGauge,
}

impl FileSink {
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        fs::create_dir_all(&config.base_path)?;

        Ok(Self {
            name: name.into(),
            config,
            subscribers: SubscriberGauge::new(1),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        Self::new(name, FileSinkConfig::from_params(params))
    }

    fn path_for(&self, message: &DebugMessage) -> PathBuf {
        let extension = match message {
            DebugMessage::Pointcloud { .. } => "ply",
            DebugMessage::RangeImage { .. } => "png",
        };
        self.config
            .base_path
            .join(format!("{}_{}.{}", message.kind(), message.stamp_ns(), extension))
    }

    fn save_pointcloud(&self, path: PathBuf, pointcloud: &PosedPointcloud) -> std::io::Result<()> {
        let mut file = BufWriter::new(File::create(path)?);
        writeln!(file, "ply")?;
        writeln!(file, "format binary_little_endian 1.0")?;
        writeln!(file, "element vertex {}", pointcloud.len())?;
        writeln!(file, "property float x")?;
        writeln!(file, "property float y")?;
        writeln!(file, "property float z")?;
        writeln!(file, "end_header")?;

        let mut write_point = |x: f32, y: f32, z: f32| -> std::io::Result<()> {
            file.write_all(&x.to_le_bytes())?;
            file.write_all(&y.to_le_bytes())?;
            file.write_all(&z.to_le_bytes())
        };
        if self.config.world_frame {
            for p in pointcloud.world_points() {
                write_point(p.x, p.y, p.z)?;
            }
        } else {
            for p in pointcloud.points() {
                write_point(p.x, p.y, p.z)?;
            }
        }
        file.flush()
    }

    /// Ranges scaled to 8 bit, nearest = brightest, empty cells black
    fn save_range_image(&self, path: PathBuf, range_image: &PosedRangeImage) -> std::io::Result<()> {
        let max_range = range_image.max_range();
        let image = GrayImage::from_fn(range_image.width, range_image.height, |col, row| {
            let range = range_image.get(row, col).unwrap_or(0.0);
            if range <= 0.0 || max_range <= 0.0 {
                return Luma([0]);
            }
            Luma([(255.0 * (1.0 - 0.9 * range / max_range)) as u8])
        });
        image.save(path).map_err(std::io::Error::other)
    }

    fn persist(&self, message: &DebugMessage) -> Result<(), ContractError> {
        let path = self.path_for(message);
        let result = match message {
            DebugMessage::Pointcloud { pointcloud, .. } => self.save_pointcloud(path, pointcloud),
            DebugMessage::RangeImage { range_image, .. } => {
                self.save_range_image(path, range_image)
            }
        };
        result.map_err(|e| {
            error!(sink = %self.name, stamp_ns = message.stamp_ns(), error = %e, "Write failed");
            ContractError::sink_write(&self.name, e.to_string())
        })
    }
}

impl DebugSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn subscribers(&self) -> SubscriberGauge {
        self.subscribers.clone()
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, message),
        fields(sink = %self.name, kind = message.kind(), stamp_ns = message.stamp_ns())
    )]
    async fn write(&mut self, message: &DebugMessage) -> Result<(), ContractError> {
        self.persist(message)
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, "FileSink closed");
        Ok(())
    }
}
