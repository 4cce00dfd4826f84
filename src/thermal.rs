//! SoC temperature readout for the periodic status line.

use std::path::{Path, PathBuf};
use std::process::Command;

pub const SYSFS_THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

/// Reads the board temperature from sysfs, falling back to `vcgencmd` on Raspberry Pi
/// firmware. Either source may be missing; callers treat `None` as "unknown".
#[derive(Clone, Debug)]
pub struct ThermalProbe {
    sysfs_path: PathBuf,
    vcgencmd: bool,
}

impl Default for ThermalProbe {
    fn default() -> Self {
        Self {
            sysfs_path: PathBuf::from(SYSFS_THERMAL_ZONE),
            vcgencmd: true,
        }
    }
}

impl ThermalProbe {
    pub fn with_sysfs_path(path: impl Into<PathBuf>) -> Self {
        Self {
            sysfs_path: path.into(),
            vcgencmd: false,
        }
    }

    /// Temperature in degrees Celsius.
    pub fn read_celsius(&self) -> Option<f32> {
        if let Some(value) = read_sysfs(&self.sysfs_path) {
            return Some(value);
        }
        if !self.vcgencmd {
            return None;
        }
        let output = Command::new("vcgencmd").arg("measure_temp").output().ok()?;
        if !output.status.success() {
            return None;
        }
        parse_vcgencmd(&String::from_utf8_lossy(&output.stdout))
    }
}

fn read_sysfs(path: &Path) -> Option<f32> {
    let raw = std::fs::read_to_string(path).ok()?;
    parse_millidegrees(&raw)
}

/// `"48312\n"` → 48.312
pub fn parse_millidegrees(raw: &str) -> Option<f32> {
    let value: i64 = raw.trim().parse().ok()?;
    Some(value as f32 / 1000.0)
}

/// `"temp=48.3'C\n"` → 48.3
pub fn parse_vcgencmd(raw: &str) -> Option<f32> {
    let value = raw.trim().strip_prefix("temp=")?;
    let value = value.trim_end_matches("'C");
    value.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sysfs_millidegrees() {
        assert_eq!(parse_millidegrees("48312\n"), Some(48.312));
        assert_eq!(parse_millidegrees("garbage"), None);
    }

    #[test]
    fn parses_vcgencmd_output() {
        assert_eq!(parse_vcgencmd("temp=48.3'C\n"), Some(48.3));
        assert_eq!(parse_vcgencmd("error"), None);
    }

    #[test]
    fn probe_reads_custom_zone() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let zone = dir.path().join("temp");
        std::fs::write(&zone, "51000\n")?;
        assert_eq!(ThermalProbe::with_sysfs_path(&zone).read_celsius(), Some(51.0));

        let missing = ThermalProbe::with_sysfs_path(dir.path().join("absent"));
        assert_eq!(missing.read_celsius(), None);
        Ok(())
    }
}
