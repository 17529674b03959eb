//! Cross-platform data path resolution.
//!
//! Decides where session records and event queues live on disk, based on
//! platform conventions and Docker detection.

use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Resolved paths for on-disk storage.
#[derive(Debug, Clone)]
pub struct DataPaths {
    /// Base data directory
    pub data_dir: PathBuf,
    /// Root of the filesystem session store (one subdirectory per service)
    pub session_path: PathBuf,
}

/// Configuration for path resolution.
#[derive(Debug, Default)]
pub struct PathConfig {
    /// Explicit data directory
    pub data_dir: Option<PathBuf>,
    /// Explicit session store root, overrides `<data_dir>/sessions`
    pub session_path: Option<PathBuf>,
}

impl DataPaths {
    /// Resolve data paths.
    ///
    /// Priority (highest to lowest):
    /// 1. Explicit session_path
    /// 2. Explicit data_dir
    /// 3. Default directory (platform-specific or Docker-detected)
    ///
    /// Directories are not created here; the store creates them on first write.
    pub fn resolve(config: PathConfig) -> anyhow::Result<Self> {
        let data_dir = match config.data_dir {
            Some(dir) => dir,
            None => Self::default_data_dir()?,
        };

        let default_sessions = data_dir.join("sessions");
        let session_path = match config.session_path {
            Some(path) => {
                Self::log_path_override(&path, &default_sessions);
                path
            }
            None => default_sessions,
        };

        Ok(Self {
            data_dir,
            session_path,
        })
    }

    /// Determine the default data directory based on platform and environment.
    fn default_data_dir() -> anyhow::Result<PathBuf> {
        if Self::is_docker() {
            info!("Docker environment detected, using ./data/ for storage");
            return Ok(PathBuf::from("./data"));
        }

        if let Some(proj_dirs) = ProjectDirs::from("", "", "mcpgate") {
            Ok(proj_dirs.data_dir().to_path_buf())
        } else {
            warn!("Could not determine user data directory, falling back to ./data/");
            Ok(PathBuf::from("./data"))
        }
    }

    /// Detect if running inside a Docker container.
    fn is_docker() -> bool {
        if Path::new("/.dockerenv").exists() {
            return true;
        }

        if let Ok(cgroup) = std::fs::read_to_string("/proc/self/cgroup") {
            if cgroup.contains("docker") || cgroup.contains("containerd") {
                return true;
            }
        }

        false
    }

    fn log_path_override(path: &Path, default: &Path) {
        if path != default {
            info!(
                "Using custom session path: {} (overriding default: {})",
                path.display(),
                default.display()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_data_dir() {
        let data_dir = DataPaths::default_data_dir().unwrap();
        assert!(!data_dir.as_os_str().is_empty());
    }

    #[test]
    fn test_session_path_defaults_below_data_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::resolve(PathConfig {
            data_dir: Some(temp_dir.path().to_path_buf()),
            session_path: None,
        })
        .unwrap();

        assert_eq!(paths.data_dir, temp_dir.path());
        assert_eq!(paths.session_path, temp_dir.path().join("sessions"));
    }

    #[test]
    fn test_explicit_session_path_wins() {
        let temp_dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::resolve(PathConfig {
            data_dir: Some(temp_dir.path().to_path_buf()),
            session_path: Some(PathBuf::from("/override/sessions")),
        })
        .unwrap();

        assert_eq!(paths.session_path, PathBuf::from("/override/sessions"));
    }
}
