use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use flipdot_caster::app::{AppError, GalleryLoop};
use flipdot_caster::capture::{
    BrowserSource, CaptureLoop, FrameSource, LiveCaptureService, RendererSource,
};
use flipdot_caster::config::{Config, ServerConfig};
use flipdot_caster::display::Display;
use flipdot_caster::input::{Controls, KeyboardListener};
use flipdot_caster::raster::{create_surface, DEFAULT_BACKENDS};
use flipdot_caster::scheduler::Ticker;
use flipdot_caster::server::{StatusServer, StatusState};
use flipdot_caster::telemetry::Telemetry;

/// Parse and validate a frame rate (0 < fps <= 120)
fn parse_fps(s: &str) -> Result<f64, String> {
    let fps: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid frame rate", s))?;
    if !(fps > 0.0 && fps <= 120.0) {
        return Err(format!("Frame rate must be between 0 and 120 fps, got {}", fps));
    }
    Ok(fps)
}

/// flipdot-caster: raycast gallery for flip-dot and LED boards
#[derive(Parser)]
#[command(name = "flipdot-caster")]
#[command(version, about = "Raycast gallery renderer for flip-dot and LED boards")]
#[command(after_help = "EXAMPLES:
    # Render the gallery to the terminal
    flipdot-caster run --display stdout

    # Drive a serial flip-dot board on autopilot
    FLIPDOT_SERIAL_PATH=/dev/ttyUSB0 flipdot-caster run --display flipdot --autopilot

    # Mirror a live page to the board
    flipdot-caster live --url http://localhost:3000/room

    # Write one binarized frame
    flipdot-caster snapshot --out frame.png

ENVIRONMENT:
    FPS, DISPLAY_MODE, FLIPDOT_SERIAL_PATH, FLIPDOT_BAUD_RATE, LED_HOST,
    LED_PORT, FLIPDOT_HTTP_URL, AUTO_DEMO, LIVE_ROOM_URL, FRAME_OUTPUT_DIR,
    FRAME_RETAIN_COUNT, PORT (read from .env as well)")]
struct Cli {
    /// Custom config file path (default: ~/.config/flipdot-caster/config.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the gallery and send it to the configured displays (default)
    #[command(after_help = "KEYS (with --keyboard):
    W/S or Up/Down     Move
    A/D or Left/Right  Turn
    Q/E                Strafe
    P                  Toggle autopilot
    R                  Back to spawn
    Ctrl+C             Quit")]
    Run {
        /// Frames per second
        #[arg(long, short = 'f', value_parser = parse_fps)]
        fps: Option<f64>,

        /// Comma list of display modes (flipdot, led, http, emu, stdout, off)
        #[arg(long, short = 'd')]
        display: Option<String>,

        /// Patrol the gallery without input
        #[arg(long)]
        autopilot: bool,

        /// Steer with the global keyboard listener
        #[arg(long, short = 'k')]
        keyboard: bool,

        /// Do not start the status server
        #[arg(long)]
        no_server: bool,
    },

    /// Capture frames from a headless browser (or the renderer) instead
    Live {
        /// Page to capture
        #[arg(long, short = 'u')]
        url: Option<String>,

        /// Where frames come from
        #[arg(long, value_enum, default_value_t = LiveSource::Browser)]
        source: LiveSource,

        /// Captures per second
        #[arg(long, short = 'f', value_parser = parse_fps)]
        fps: Option<f64>,

        /// Comma list of display modes (flipdot, led, http, emu, stdout, off)
        #[arg(long, short = 'd')]
        display: Option<String>,

        /// Directory for retained frames
        #[arg(long, short = 'o')]
        output_dir: Option<PathBuf>,

        /// Number of frames kept on disk
        #[arg(long)]
        retain: Option<usize>,

        /// Do not start the status server
        #[arg(long)]
        no_server: bool,
    },

    /// Render one binarized frame to a PNG file
    Snapshot {
        /// Output file
        #[arg(long, short = 'o')]
        out: PathBuf,

        /// Camera x (default: spawn point)
        #[arg(long, allow_hyphen_values = true)]
        x: Option<f64>,

        /// Camera y (default: spawn point)
        #[arg(long, allow_hyphen_values = true)]
        y: Option<f64>,

        /// Camera heading in radians
        #[arg(long, allow_hyphen_values = true)]
        angle: Option<f64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LiveSource {
    Browser,
    Renderer,
}

/// Set up the Ctrl+C handler. Only one handler may be installed per process.
fn install_ctrlc<F>(on_signal: F) -> Result<(), ctrlc::Error>
where
    F: Fn() + Send + 'static,
{
    ctrlc::set_handler(move || {
        eprintln!("\nReceived Ctrl+C, shutting down...");
        on_signal();
    })
}

async fn spawn_status_server(
    config: &ServerConfig,
    state: StatusState,
) -> Result<Option<JoinHandle<()>>, AppError> {
    if !config.enabled {
        return Ok(None);
    }
    let server = StatusServer::bind(&config.host, config.port, state).await?;
    Ok(Some(tokio::spawn(async move {
        if let Err(e) = server.serve().await {
            error!("Status server stopped: {}", e);
        }
    })))
}

async fn run_gallery(config: Config) -> Result<(), AppError> {
    let telemetry = Telemetry::new(config.fps);
    let controls = Controls::new();
    let server = spawn_status_server(
        &config.server,
        StatusState::new(telemetry.clone(), controls.clone()),
    )
    .await?;

    let mut keyboard = None;
    if config.player.keyboard {
        let mut listener = KeyboardListener::new(controls.clone());
        listener.start();
        keyboard = Some(listener);
    }

    let mut gallery = GalleryLoop::from_config(&config, controls, telemetry.clone())?;
    let ticker = Ticker::new(config.fps);
    let handle = ticker.handle();
    install_ctrlc(move || handle.stop())?;

    info!("Rendering at {} fps", config.fps);
    ticker.start(&mut gallery).await;

    drop(keyboard);
    if let Some(server) = server {
        server.abort();
    }
    let stats = telemetry.stats();
    info!(
        "Rendered {} frames, dispatched {}, {} errors",
        stats.frames_captured, stats.frames_dispatched, stats.errors
    );
    Ok(())
}

async fn run_capture<S: FrameSource + 'static>(source: S, config: &Config) -> Result<(), AppError> {
    let telemetry = Telemetry::new(config.live.frame_rate);
    let server = spawn_status_server(
        &config.server,
        StatusState::new(telemetry.clone(), Controls::new()),
    )
    .await?;

    let parts = CaptureLoop::from_config(source, config, telemetry)?;
    let mut service = LiveCaptureService::new(parts);

    let shutdown = Arc::new(Notify::new());
    let signal = Arc::clone(&shutdown);
    install_ctrlc(move || signal.notify_one())?;

    service.start().await?;
    shutdown.notified().await;
    service.stop().await;

    if let Some(server) = server {
        server.abort();
    }
    let stats = service.stats();
    info!(
        "Captured {} frames, dispatched {}, {} errors",
        stats.frames_captured, stats.frames_dispatched, stats.errors
    );
    Ok(())
}

fn snapshot(config: &Config, out: &Path) -> Result<(), AppError> {
    let surface = create_surface(DEFAULT_BACKENDS, config.display.width, config.display.height)?;
    let display = Display::new(Vec::new(), Duration::from_millis(config.display.flush_timeout_ms));
    let mut gallery = GalleryLoop::new(
        config,
        surface,
        display,
        Controls::new(),
        Telemetry::new(config.fps),
    );
    let png = gallery.snapshot_png();
    std::fs::write(out, &png)?;
    println!(
        "Wrote {}x{} frame to {}",
        config.display.width,
        config.display.height,
        out.display()
    );
    Ok(())
}

fn run(cli: Cli) -> Result<(), AppError> {
    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_env()?;

    let command = cli.command.unwrap_or(Commands::Run {
        fps: None,
        display: None,
        autopilot: false,
        keyboard: false,
        no_server: false,
    });

    // CLI args > environment > config file > built-in defaults
    match command {
        Commands::Run {
            fps,
            display,
            autopilot,
            keyboard,
            no_server,
        } => {
            if let Some(fps) = fps {
                config.fps = fps;
            }
            if let Some(modes) = display {
                config.set_display_modes(&modes)?;
            }
            config.player.autopilot |= autopilot;
            config.player.keyboard |= keyboard;
            config.server.enabled &= !no_server;
            config.validate()?;

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_gallery(config))
        }
        Commands::Live {
            url,
            source,
            fps,
            display,
            output_dir,
            retain,
            no_server,
        } => {
            if let Some(url) = url {
                config.live.url = url;
            }
            if let Some(fps) = fps {
                config.live.frame_rate = fps;
            }
            if let Some(modes) = display {
                config.set_display_modes(&modes)?;
            }
            if let Some(dir) = output_dir {
                config.live.output_dir = dir;
            }
            if let Some(retain) = retain {
                config.live.retain_frames = retain;
            }
            config.server.enabled &= !no_server;
            config.validate()?;

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(async {
                match source {
                    LiveSource::Browser => {
                        run_capture(BrowserSource::new(&config.live), &config).await
                    }
                    LiveSource::Renderer => {
                        let (width, height) = (config.display.width, config.display.height);
                        let source =
                            RendererSource::new(config.render.clone(), &config.player, width, height);
                        run_capture(source, &config).await
                    }
                }
            })
        }
        Commands::Snapshot { out, x, y, angle } => {
            config.player.spawn_x = x.unwrap_or(config.player.spawn_x);
            config.player.spawn_y = y.unwrap_or(config.player.spawn_y);
            config.player.spawn_angle = angle.unwrap_or(config.player.spawn_angle);
            config.validate()?;
            snapshot(&config, &out)
        }
    }
}

fn main() {
    // Load .env file, don't override existing env vars
    let _ = dotenv::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
