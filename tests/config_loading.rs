//! Integration tests for config file + environment layering and building
//! the display from the result.

use std::collections::HashMap;
use std::io::Write;

use tempfile::NamedTempFile;

use flipdot_caster::config::{Config, ConfigError, TargetMode};
use flipdot_caster::display::{Display, Transport};
use flipdot_caster::dither::DitherMode;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

const BOARD_TOML: &str = r#"
fps = 12

[display]
dither = "floyd-steinberg"
threshold = 100

[[display.targets]]
id = "wall"
mode = "tcp"
host = "10.0.0.7"
port = 7000

[[display.targets]]
mode = "emulator"
force_flush = true

[[display.targets]]
mode = "off"

[live]
url = "http://localhost:4000/room"
retain_frames = 20
clip = { x = 10, y = 20, width = 840, height = 280 }

[server]
port = 8088
"#;

#[test]
fn test_file_builds_display_targets() {
    let file = write_config(BOARD_TOML);
    let config = Config::load(Some(file.path())).unwrap();
    config.validate().unwrap();

    assert_eq!(config.fps, 12.0);
    assert_eq!(config.display.dither, DitherMode::FloydSteinberg);
    assert_eq!(config.display.threshold, 100);
    assert_eq!(config.live.retain_frames, 20);
    assert_eq!(config.live.clip.unwrap().width, 840);
    assert_eq!(config.server.port, 8088);

    let display = Display::from_config(&config.display).unwrap();
    let ids: Vec<&str> = display.targets().iter().map(|t| t.id()).collect();
    // Off targets are skipped
    assert_eq!(ids, vec!["wall", "emulator-1"]);
    assert!(matches!(
        display.targets()[0].transport(),
        Transport::Tcp { .. }
    ));
    assert!(display.emulator("emulator-1").is_some());
    assert!(display.emulator("wall").is_none());
}

#[test]
fn test_environment_overrides_file() {
    let file = write_config(BOARD_TOML);
    let mut config = Config::load(Some(file.path())).unwrap();
    config
        .apply_env_with(lookup(&[
            ("DISPLAY_MODE", "http,emu"),
            ("FLIPDOT_HTTP_URL", "http://gateway.local/frame"),
            ("FRAME_RETAIN_COUNT", "5"),
            ("LIVE_ROOM_URL", ""),
        ]))
        .unwrap();

    assert_eq!(config.live.retain_frames, 5);
    // Empty values leave the file setting alone
    assert_eq!(config.live.url, "http://localhost:4000/room");
    assert_eq!(
        config.display.targets[0].mode,
        TargetMode::Http {
            url: "http://gateway.local/frame".to_string()
        }
    );
    assert_eq!(config.display.targets[1].mode, TargetMode::Emulator);

    let display = Display::from_config(&config.display).unwrap();
    assert_eq!(display.targets().len(), 2);
}

#[test]
fn test_http_mode_requires_url() {
    let mut config = Config::default();
    let err = config
        .apply_env_with(lookup(&[("DISPLAY_MODE", "http")]))
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnv { ref var, .. } if var == "FLIPDOT_HTTP_URL"));
}

#[test]
fn test_broken_file_reports_path() {
    let file = write_config("fps = [oops");
    let err = Config::load(Some(file.path())).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError { .. }));
    assert!(err.to_string().contains(&file.path().display().to_string()));
}
