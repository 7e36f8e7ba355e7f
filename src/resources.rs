//! Resource probes: free storage on the data volume and battery charge

use std::path::{Path, PathBuf};
use tracing::debug;

/// Linux power-supply class; each entry may expose a `capacity` file.
const POWER_SUPPLY_DIR: &str = "/sys/class/power_supply";

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("statvfs failed for {}: {}", .0.display(), .1)]
    Statvfs(PathBuf, std::io::Error),
    #[error("path contains an interior NUL byte: {}", .0.display())]
    InvalidPath(PathBuf),
    #[error("volume at {} reports zero blocks", .0.display())]
    EmptyVolume(PathBuf),
}

/// Read-only view of the node's consumable resources.
pub trait ResourceProbe: Send + Sync {
    /// Percentage of the data volume still available to the node.
    fn storage_free_percent(&self) -> Result<f64, ResourceError>;

    /// Battery charge in percent, `None` when no gauge is available.
    fn battery_percent(&self) -> Option<f64>;
}

/// Probe backed by the host: `statvfs` on the data directory and the
/// kernel's power-supply class for battery.
pub struct SystemResources {
    data_dir: PathBuf,
    battery_override: Option<f64>,
}

impl SystemResources {
    pub fn new(data_dir: impl Into<PathBuf>, battery_override: Option<f64>) -> Self {
        Self {
            data_dir: data_dir.into(),
            battery_override,
        }
    }
}

impl ResourceProbe for SystemResources {
    fn storage_free_percent(&self) -> Result<f64, ResourceError> {
        free_percent(&self.data_dir)
    }

    fn battery_percent(&self) -> Option<f64> {
        self.battery_override.or_else(read_power_supply_capacity)
    }
}

fn free_percent(path: &Path) -> Result<f64, ResourceError> {
    use std::mem::MaybeUninit;
    use std::os::unix::ffi::OsStrExt;

    let c_path = std::ffi::CString::new(path.as_os_str().as_bytes())
        .map_err(|_| ResourceError::InvalidPath(path.to_path_buf()))?;
    let mut stat = MaybeUninit::<libc::statvfs>::uninit();

    let result = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
    if result != 0 {
        return Err(ResourceError::Statvfs(
            path.to_path_buf(),
            std::io::Error::last_os_error(),
        ));
    }

    let stat = unsafe { stat.assume_init() };
    if stat.f_blocks == 0 {
        return Err(ResourceError::EmptyVolume(path.to_path_buf()));
    }
    #[allow(clippy::unnecessary_cast)]
    let percent = stat.f_bavail as f64 / stat.f_blocks as f64 * 100.0;
    Ok(percent)
}

fn read_power_supply_capacity() -> Option<f64> {
    let entries = std::fs::read_dir(POWER_SUPPLY_DIR).ok()?;
    for entry in entries.flatten() {
        let capacity = entry.path().join("capacity");
        if let Ok(raw) = std::fs::read_to_string(&capacity) {
            if let Ok(value) = raw.trim().parse::<f64>() {
                debug!(path = %capacity.display(), value, "Battery gauge read");
                return Some(value.clamp(0.0, 100.0));
            }
        }
    }
    None
}

/// Fixed readings, for tests and bench runs without hardware.
#[derive(Debug, Clone, Copy)]
pub struct FixedResources {
    pub storage_free_percent: f64,
    pub battery_percent: Option<f64>,
}

impl ResourceProbe for FixedResources {
    fn storage_free_percent(&self) -> Result<f64, ResourceError> {
        Ok(self.storage_free_percent)
    }

    fn battery_percent(&self) -> Option<f64> {
        self.battery_percent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statvfs_on_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let probe = SystemResources::new(dir.path(), Some(42.0));
        let free = probe.storage_free_percent().unwrap();
        assert!((0.0..=100.0).contains(&free));
        assert_eq!(probe.battery_percent(), Some(42.0));
    }

    #[test]
    fn missing_path_is_an_error() {
        let probe = SystemResources::new("/definitely/not/here", None);
        assert!(matches!(
            probe.storage_free_percent(),
            Err(ResourceError::Statvfs(..))
        ));
    }
}
