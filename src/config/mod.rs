mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Maximum number of camera tiles a session can drive
pub const MAX_CAMERAS: u8 = 16;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./camsync.toml",
        "./config.toml",
        "~/.config/camsync/config.toml",
        "/etc/camsync/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    // Return default config if no file found
    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    // Validate cameras
    if config.cameras.count == 0 || config.cameras.count > MAX_CAMERAS {
        anyhow::bail!(
            "Camera count must be between 1 and {}, got {}",
            MAX_CAMERAS,
            config.cameras.count
        );
    }

    for id in &config.cameras.disabled {
        if *id == 0 || *id > config.cameras.count {
            anyhow::bail!("Disabled camera {} is outside 1..={}", id, config.cameras.count);
        }
    }

    // Validate timeline
    if config.timeline.bucket_secs == 0 {
        anyhow::bail!("Timeline bucket length cannot be 0");
    }

    if config.timeline.bucket_secs > MAX_BUCKET_SECS {
        anyhow::bail!(
            "Timeline bucket length must be at most {}s, got {}s",
            MAX_BUCKET_SECS,
            config.timeline.bucket_secs
        );
    }

    if parse_utc_offset(&config.timeline.utc_offset).is_none() {
        anyhow::bail!("Invalid UTC offset: {:?}", config.timeline.utc_offset);
    }

    // Validate directory
    match config.directory.kind {
        DirectoryKind::Http => {
            if config.directory.base_url.trim().is_empty() {
                anyhow::bail!("HTTP directory requires a base_url");
            }
        }
        DirectoryKind::Fs => match &config.directory.root {
            None => anyhow::bail!("Filesystem directory requires a root path"),
            Some(root) if !root.exists() => {
                tracing::warn!("Recordings root does not exist: {:?}", root);
            }
            Some(_) => {}
        },
    }

    if !config.directory.camera_dir.contains("{id}") {
        tracing::warn!(
            "camera_dir {:?} has no {{id}} placeholder; all cameras share one directory",
            config.directory.camera_dir
        );
    }

    Ok(())
}
