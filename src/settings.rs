use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};

use crate::viewer::{
    DEFAULT_RESERVED_HEIGHT, DEFAULT_WINDOW_HEIGHT, DEFAULT_WINDOW_WIDTH, ViewerConfig, ZoomPolicy,
};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "folioview";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub zoom: ZoomPolicy,

    /// Window height kept for toolbar and padding when fitting pages
    #[serde(default = "default_reserved_height")]
    pub reserved_height: f32,

    #[serde(default = "default_device_pixel_ratio")]
    pub device_pixel_ratio: f32,

    #[serde(default = "default_window_width")]
    pub window_width: f32,

    #[serde(default = "default_window_height")]
    pub window_height: f32,

    #[serde(default = "default_true")]
    pub remember_sessions: bool,
}

fn default_true() -> bool {
    true
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_reserved_height() -> f32 {
    DEFAULT_RESERVED_HEIGHT
}

fn default_device_pixel_ratio() -> f32 {
    1.0
}

fn default_window_width() -> f32 {
    DEFAULT_WINDOW_WIDTH
}

fn default_window_height() -> f32 {
    DEFAULT_WINDOW_HEIGHT
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            zoom: ZoomPolicy::default(),
            reserved_height: default_reserved_height(),
            device_pixel_ratio: default_device_pixel_ratio(),
            window_width: default_window_width(),
            window_height: default_window_height(),
            remember_sessions: true,
        }
    }
}

impl Settings {
    /// Viewer configuration derived from these settings
    pub fn viewer_config(&self) -> ViewerConfig {
        let ratio = if self.device_pixel_ratio.is_finite() && self.device_pixel_ratio > 0.0 {
            self.device_pixel_ratio
        } else {
            warn!(
                "Ignoring invalid device_pixel_ratio {}",
                self.device_pixel_ratio
            );
            default_device_pixel_ratio()
        };
        ViewerConfig {
            reserved_height: self.reserved_height.max(0.0),
            ..ViewerConfig::default()
        }
        .with_zoom(self.zoom)
        .with_device_pixel_ratio(ratio)
        .with_window(self.window_width, self.window_height)
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load settings from the default location, creating the file with
/// defaults on first run
pub fn load_settings() {
    let Some(path) = config_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };
    if path.exists() {
        load_settings_from_path(&path);
    } else {
        info!("Settings file not found, creating with defaults at {path:?}");
        if let Ok(settings) = SETTINGS.read() {
            save_settings_to_file(&settings, &path);
        }
    }
}

/// Replace the global settings with the contents of `path`. Unreadable or
/// invalid files leave the current settings untouched.
pub fn load_settings_from_path(path: &Path) {
    match fs::read_to_string(path) {
        Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
            Ok(mut settings) => {
                debug!("Loaded settings from {path:?}");

                if settings.version < CURRENT_VERSION {
                    migrate_settings(&mut settings);
                    save_settings_to_file(&settings, path);
                }

                if let Ok(mut global) = SETTINGS.write() {
                    *global = settings;
                }
            }
            Err(e) => {
                error!("Failed to parse settings file {path:?}: {e}");
            }
        },
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );
    settings.zoom = settings.zoom.sanitized();
    settings.version = CURRENT_VERSION;
}

pub fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let body = match serde_yaml::to_string(settings) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to serialize settings: {e}");
            return;
        }
    };

    match fs::write(path, format!("{SETTINGS_HEADER}{body}")) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

const SETTINGS_HEADER: &str = r#"# folioview settings
#
# zoom.min_scale / zoom.max_scale   bounds for every zoom level
# zoom.zoom_step                    multiplier per zoom-in step
# zoom.max_auto_scale               upper bound for fit-to-height
# reserved_height                   pixels kept for toolbar and padding
# device_pixel_ratio                backing pixels per CSS pixel
"#;

// Read accessors over the global settings

pub fn get_settings() -> Settings {
    SETTINGS.read().map(|s| s.clone()).unwrap_or_default()
}

pub fn viewer_config() -> ViewerConfig {
    get_settings().viewer_config()
}

pub fn is_remember_sessions() -> bool {
    SETTINGS.read().map(|s| s.remember_sessions).unwrap_or(true)
}

/// Reset the in-memory settings to defaults without touching disk
pub fn reset_settings() {
    if let Ok(mut settings) = SETTINGS.write() {
        *settings = Settings::default();
    }
}
