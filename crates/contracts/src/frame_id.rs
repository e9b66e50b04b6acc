//! FrameId - Cheap-to-clone coordinate frame identifier
//!
//! Every queued point cloud carries its sensor frame, and the same few frame
//! names are shared by thousands of clouds, so the name lives behind an `Arc<str>`.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// Coordinate frame identifier (e.g. `"odom"`, `"os_sensor"`).
///
/// # Examples
/// ```
/// use contracts::FrameId;
///
/// let frame: FrameId = "lidar".into();
/// assert_eq!(frame, "lidar");
/// assert_eq!(FrameId::resolve(Some("lidar_override"), "lidar"), "lidar_override");
/// assert_eq!(FrameId::resolve(None, "lidar"), "lidar");
/// ```
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FrameId(Arc<str>);

impl FrameId {
    /// Create a new FrameId from a string slice.
    #[inline]
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    /// Get the underlying string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Pick the configured override when present and non-empty, otherwise the
    /// frame embedded in the message.
    pub fn resolve(override_frame: Option<&str>, embedded: &str) -> Self {
        match override_frame {
            Some(frame) if !frame.is_empty() => Self::new(frame),
            _ => Self::new(embedded),
        }
    }
}

impl Deref for FrameId {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for FrameId {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for FrameId {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FrameId {
    #[inline]
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for FrameId {
    #[inline]
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<FrameId> for String {
    fn from(frame: FrameId) -> Self {
        frame.0.to_string()
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameId({:?})", self.0)
    }
}

impl PartialEq for FrameId {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for FrameId {}

impl PartialEq<str> for FrameId {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for FrameId {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

// Must agree with `str`'s hash so `HashMap<FrameId, _>` can be queried by `&str`.
impl Hash for FrameId {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_clone_shares_storage() {
        let a: FrameId = "velodyne".into();
        let b = a.clone();
        assert_eq!(a.as_str().as_ptr(), b.as_str().as_ptr());
    }

    #[test]
    fn test_resolve_ignores_empty_override() {
        assert_eq!(FrameId::resolve(Some(""), "os_sensor"), "os_sensor");
        assert_eq!(FrameId::resolve(Some("imu"), "os_sensor"), "imu");
    }

    #[test]
    fn test_lookup_by_str() {
        let mut poses: HashMap<FrameId, u32> = HashMap::new();
        poses.insert("lidar".into(), 7);
        assert_eq!(poses.get("lidar"), Some(&7));
    }

    #[test]
    fn test_serde_as_plain_string() {
        let frame: FrameId = "base_link".into();
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(json, "\"base_link\"");
        let parsed: FrameId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, frame);
    }
}
