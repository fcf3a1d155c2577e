use std::path::PathBuf;

use clap::Parser;
use iv::{AppConfig, LogLevel, Settings};
use iv_gpu::GpuConfig;

#[derive(Parser, Debug)]
#[command(name = "iv", version, about = "GPU image inspection viewer")]
struct Cli {
    /// Image files or folders to open
    files: Vec<PathBuf>,

    /// Log verbosity (overrides the config file)
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,

    /// Start with the pixel-peek inset hidden
    #[arg(long)]
    no_peek: bool,

    /// Decode on the main thread
    #[arg(long)]
    sync_decode: bool,

    /// Present without waiting for VSync
    #[arg(long)]
    no_vsync: bool,

    /// Render to an sRGB surface (the GPU encodes output values)
    #[arg(long)]
    srgb: bool,
}

fn main() {
    let cli = Cli::parse();

    // The logger has to be up before the config file is read, so its own
    // warnings are shown. RUST_LOG, when set, decides alone.
    let env_filter = std::env::var_os("RUST_LOG").is_some();
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Trace)
        .parse_default_env()
        .init();
    if !env_filter {
        log::set_max_level(LogLevel::resolve(cli.log_level, None).to_level_filter());
    }

    let config = AppConfig::load_or_default();
    let mut preferences = config.preferences;
    preferences.log_level = LogLevel::resolve(cli.log_level, Some(preferences.log_level));
    if !env_filter {
        log::set_max_level(preferences.log_level.to_level_filter());
    }
    if cli.no_peek {
        preferences.show_pixel_peek = false;
    }
    if cli.sync_decode {
        preferences.background_decode = false;
    }

    log::info!("iv {} starting", env!("CARGO_PKG_VERSION"));

    let settings = Settings {
        files: cli.files,
        preferences,
        gpu: GpuConfig::default()
            .with_vsync(!cli.no_vsync)
            .with_srgb_surface(cli.srgb),
        ..Settings::default()
    };

    if let Err(e) = iv::run(settings) {
        log::error!("Application error: {}", e);
        std::process::exit(1);
    }
}
