//! Configuration file handling for flipdot-caster.
//!
//! Loads configuration from `~/.config/flipdot-caster/config.toml` or a
//! custom path, then applies environment overrides (after `.env` has been
//! loaded by the binary).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::capture::ClipRegion;
use crate::dither::{DitherMode, DEFAULT_THRESHOLD};
use crate::display::PanelLayout;
use crate::raycast::RenderConfig;

/// Configuration file structure for flipdot-caster.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scheduler rate for the raycaster loop.
    pub fps: f64,
    pub display: DisplayConfig,
    pub render: RenderConfig,
    pub player: PlayerConfig,
    pub live: LiveConfig,
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fps: 15.0,
            display: DisplayConfig::default(),
            render: RenderConfig::default(),
            player: PlayerConfig::default(),
            live: LiveConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    pub dither: DitherMode,
    pub threshold: u8,
    pub flush_timeout_ms: u64,
    pub layout: PanelLayout,
    pub targets: Vec<TargetConfig>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        let layout = PanelLayout::default();
        let (width, height) = layout.board_size();
        Self {
            width,
            height,
            dither: DitherMode::default(),
            threshold: DEFAULT_THRESHOLD,
            flush_timeout_ms: 2000,
            layout,
            targets: vec![TargetConfig::new(TargetMode::Stdout)],
        }
    }
}

/// One entry of `[[display.targets]]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TargetConfig {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub mode: TargetMode,
    #[serde(default)]
    pub encoding: Option<EncodingKind>,
    /// Packed bitmaps mark dark dots unless this is set.
    #[serde(default)]
    pub invert: bool,
    #[serde(default)]
    pub force_flush: bool,
}

impl TargetConfig {
    pub fn new(mode: TargetMode) -> Self {
        Self {
            id: None,
            mode,
            encoding: None,
            invert: false,
            force_flush: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum TargetMode {
    Serial {
        #[serde(default = "default_serial_path")]
        path: PathBuf,
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
    },
    Tcp {
        #[serde(default = "default_tcp_host")]
        host: String,
        #[serde(default = "default_tcp_port")]
        port: u16,
    },
    Http {
        url: String,
    },
    Stdout,
    Emulator,
    Off,
}

impl TargetMode {
    pub fn name(&self) -> &'static str {
        match self {
            TargetMode::Serial { .. } => "serial",
            TargetMode::Tcp { .. } => "tcp",
            TargetMode::Http { .. } => "http",
            TargetMode::Stdout => "stdout",
            TargetMode::Emulator => "emulator",
            TargetMode::Off => "off",
        }
    }

    /// Panel packets for controller links, packed bitmaps otherwise.
    pub fn default_encoding(&self) -> EncodingKind {
        match self {
            TargetMode::Serial { .. } | TargetMode::Tcp { .. } | TargetMode::Emulator => {
                EncodingKind::Panel
            }
            TargetMode::Http { .. } | TargetMode::Stdout | TargetMode::Off => {
                EncodingKind::Packed
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingKind {
    Panel,
    Packed,
}

fn default_serial_path() -> PathBuf {
    PathBuf::from("/dev/ttyACM0")
}

fn default_baud_rate() -> u32 {
    57600
}

fn default_tcp_host() -> String {
    "127.0.0.1".to_string()
}

fn default_tcp_port() -> u16 {
    7890
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub spawn_x: f64,
    pub spawn_y: f64,
    pub spawn_angle: f64,
    /// Map units per tick at delta 1.0.
    pub move_speed: f64,
    /// Radians per tick at delta 1.0.
    pub rotation_speed: f64,
    pub autopilot: bool,
    /// Steer with the global keyboard listener.
    pub keyboard: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            spawn_x: 6.5,
            spawn_y: 6.5,
            spawn_angle: 0.0,
            move_speed: 0.05,
            rotation_speed: 0.03,
            autopilot: false,
            keyboard: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Page the headless browser renders.
    pub url: String,
    /// Chromium-compatible executable.
    pub browser: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Part of the page that becomes the frame; whole viewport when unset.
    pub clip: Option<ClipRegion>,
    pub frame_rate: f64,
    pub retain_frames: usize,
    pub output_dir: PathBuf,
    pub capture_timeout_ms: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000/room".to_string(),
            browser: "chromium".to_string(),
            viewport_width: 1200,
            viewport_height: 650,
            clip: None,
            frame_rate: 15.0,
            retain_frames: 450,
            output_dir: PathBuf::from("frames/live"),
            capture_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
                path: path.clone(),
                source: e,
            })?;
            let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.clone(),
                source: e,
            })?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("FPS") {
            self.fps = parse_env("FPS", &v)?;
            self.live.frame_rate = self.fps;
        }
        if let Some(v) = get("AUTO_DEMO") {
            self.player.autopilot = parse_bool("AUTO_DEMO", &v)?;
        }
        if let Some(v) = get("LIVE_ROOM_URL") {
            self.live.url = v;
        }
        if let Some(v) = get("FRAME_OUTPUT_DIR") {
            self.live.output_dir = PathBuf::from(v);
        }
        if let Some(v) = get("FRAME_RETAIN_COUNT") {
            self.live.retain_frames = parse_env("FRAME_RETAIN_COUNT", &v)?;
        }
        if let Some(v) = get("PORT") {
            self.server.port = parse_env("PORT", &v)?;
        }
        if let Some(modes) = get("DISPLAY_MODE") {
            self.display.targets = targets_from_modes(&modes, &get)?;
        }
        Ok(())
    }

    /// Replace the display targets with a `DISPLAY_MODE`-style list, reading
    /// per-mode settings from the process environment.
    pub fn set_display_modes(&mut self, modes: &str) -> Result<(), ConfigError> {
        let get = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        self.display.targets = targets_from_modes(modes, &get)?;
        Ok(())
    }

    /// Reject values that would make the pipeline meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(ConfigError::Invalid(format!("fps must be positive, got {}", self.fps)));
        }
        if !(self.live.frame_rate.is_finite() && self.live.frame_rate > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "live.frame_rate must be positive, got {}",
                self.live.frame_rate
            )));
        }
        if self.display.width == 0 || self.display.height == 0 {
            return Err(ConfigError::Invalid("display size must be non-zero".to_string()));
        }
        if self.live.retain_frames == 0 {
            return Err(ConfigError::Invalid("live.retain_frames must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Map a `DISPLAY_MODE` list (`flipdot,led,emu,stdout,http,off`) to targets.
fn targets_from_modes<G>(modes: &str, get: &G) -> Result<Vec<TargetConfig>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let mut targets = Vec::new();
    for mode in modes.split(',').map(|m| m.trim().to_ascii_lowercase()) {
        let target = match mode.as_str() {
            "" => continue,
            "flipdot" => TargetMode::Serial {
                path: get("FLIPDOT_SERIAL_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(default_serial_path),
                baud_rate: match get("FLIPDOT_BAUD_RATE") {
                    Some(v) => parse_env("FLIPDOT_BAUD_RATE", &v)?,
                    None => default_baud_rate(),
                },
            },
            "led" => TargetMode::Tcp {
                host: get("LED_HOST").unwrap_or_else(default_tcp_host),
                port: match get("LED_PORT") {
                    Some(v) => parse_env("LED_PORT", &v)?,
                    None => default_tcp_port(),
                },
            },
            "http" => TargetMode::Http {
                url: get("FLIPDOT_HTTP_URL").ok_or_else(|| ConfigError::InvalidEnv {
                    var: "FLIPDOT_HTTP_URL".to_string(),
                    value: String::new(),
                    reason: "required by DISPLAY_MODE=http".to_string(),
                })?,
            },
            "emu" | "emulator" => TargetMode::Emulator,
            "stdout" => TargetMode::Stdout,
            "none" | "off" => TargetMode::Off,
            other => {
                return Err(ConfigError::InvalidEnv {
                    var: "DISPLAY_MODE".to_string(),
                    value: other.to_string(),
                    reason: "expected flipdot, led, http, emu, stdout, none or off".to_string(),
                })
            }
        };
        targets.push(TargetConfig::new(target));
    }
    Ok(targets)
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidEnv {
            var: var.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn parse_bool(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var: var.to_string(),
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    InvalidEnv {
        var: String,
        value: String,
        reason: String,
    },
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::ParseError { path, source } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::InvalidEnv { var, value, reason } => {
                write!(f, "Invalid value '{}' for {}: {}", value, var, reason)
            }
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
            ConfigError::InvalidEnv { .. } | ConfigError::Invalid(_) => None,
        }
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("flipdot-caster").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/flipdot-caster/config.toml")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.display.width, 84);
        assert_eq!(config.display.height, 28);
        assert_eq!(config.live.retain_frames, 450);
        assert_eq!(config.live.viewport_width, 1200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let config = Config::load(Some(Path::new("/nonexistent/flipdot.toml"))).unwrap();
        assert_eq!(config.fps, 15.0);
    }

    #[test]
    fn test_parse_targets() {
        let toml = r#"
            fps = 30

            [[display.targets]]
            mode = "serial"
            path = "/dev/ttyUSB1"

            [[display.targets]]
            id = "gateway"
            mode = "http"
            url = "http://10.0.0.2/frame"
            invert = true

            [[display.targets]]
            mode = "tcp"
            port = 9000
            force_flush = true
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        let targets = &config.display.targets;
        assert_eq!(targets.len(), 3);
        assert_eq!(
            targets[0].mode,
            TargetMode::Serial {
                path: PathBuf::from("/dev/ttyUSB1"),
                baud_rate: 57600
            }
        );
        assert_eq!(targets[1].id.as_deref(), Some("gateway"));
        assert!(targets[1].invert);
        assert_eq!(
            targets[2].mode,
            TargetMode::Tcp {
                host: "127.0.0.1".to_string(),
                port: 9000
            }
        );
        assert!(targets[2].force_flush);
    }

    #[test]
    fn test_unknown_mode_is_parse_error() {
        let toml = r#"
            [[display.targets]]
            mode = "carrier-pigeon"
        "#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn test_display_mode_env() {
        let vars = env(&[
            ("DISPLAY_MODE", "flipdot, led,emu,stdout"),
            ("FLIPDOT_SERIAL_PATH", "/dev/ttyS3"),
            ("LED_PORT", "7000"),
        ]);
        let mut config = Config::default();
        config.apply_env_with(|k| vars.get(k).cloned()).unwrap();

        let modes: Vec<_> = config.display.targets.iter().map(|t| t.mode.clone()).collect();
        assert_eq!(
            modes,
            vec![
                TargetMode::Serial {
                    path: PathBuf::from("/dev/ttyS3"),
                    baud_rate: 57600
                },
                TargetMode::Tcp {
                    host: "127.0.0.1".to_string(),
                    port: 7000
                },
                TargetMode::Emulator,
                TargetMode::Stdout,
            ]
        );
    }

    #[test]
    fn test_display_mode_off_and_invalid() {
        let vars = env(&[("DISPLAY_MODE", "off")]);
        let mut config = Config::default();
        config.apply_env_with(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.display.targets[0].mode, TargetMode::Off);

        let vars = env(&[("DISPLAY_MODE", "hologram")]);
        let err = config.apply_env_with(|k| vars.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("DISPLAY_MODE"));
    }

    #[test]
    fn test_numeric_env_overrides() {
        let vars = env(&[
            ("FPS", "20"),
            ("FRAME_RETAIN_COUNT", "10"),
            ("PORT", "8080"),
            ("AUTO_DEMO", "true"),
        ]);
        let mut config = Config::default();
        config.apply_env_with(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.fps, 20.0);
        assert_eq!(config.live.frame_rate, 20.0);
        assert_eq!(config.live.retain_frames, 10);
        assert_eq!(config.server.port, 8080);
        assert!(config.player.autopilot);

        let vars = env(&[("PORT", "eighty")]);
        assert!(config.apply_env_with(|k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_fps() {
        let config = Config {
            fps: 0.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_path_ends_with_config_toml() {
        let path = default_path();
        assert!(path.ends_with("flipdot-caster/config.toml"));
    }
}
