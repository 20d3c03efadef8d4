use rendercmp::cli::Args;
use rendercmp::config::Settings;
use rendercmp::core::{ChannelSink, Layout, Session};
use rendercmp::entities::EventInfo;
use rendercmp::paths::{self, PathConfig};
use rendercmp::ui::ViewerApp;

use anyhow::{Context, Result};
use clap::Parser;
use eframe::egui;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;

fn init_logging(args: &Args, path_config: &PathConfig) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| paths::data_file(paths::LOG_FILE, path_config));
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .filter_module("egui", log::LevelFilter::Info) // Suppress egui DEBUG spam
            .filter_module("eframe", log::LevelFilter::Info)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging (respects RUST_LOG if set)
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .filter_module("egui", log::LevelFilter::Info)
            .filter_module("eframe", log::LevelFilter::Info)
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());
    if let Err(e) = paths::ensure_dirs(&path_config) {
        eprintln!("Warning: Failed to create application directories: {:#}", e);
    }

    init_logging(&args, &path_config)?;

    info!("rendercmp {} starting...", env!("CARGO_PKG_VERSION"));
    debug!("Command-line args: {:?}", args);

    let settings_path = paths::config_file(paths::SETTINGS_FILE, &path_config);
    info!("Config path: {}", settings_path.display());

    // CLI arguments override persisted settings for this run
    let mut settings = Settings::load_or_default(&settings_path);
    if let Some(layout) = args.layout {
        settings.default_layout = Layout::from(layout);
    }
    if let Some(speed) = args.speed {
        settings.speed_index = speed as usize;
    }
    let settings = settings.sanitized();

    if args.dump_config {
        println!("{}", settings.to_json()?);
        return Ok(());
    }

    // Decode threads: settings value, never more than the machine has
    let threads = settings.loader_threads.min(num_cpus::get()).max(1);
    info!("Loader threads: {}, cache: {} images", threads, settings.cache_capacity);

    let (sink, reports) = ChannelSink::channel();
    let mut session = Session::with_disk(
        settings.session_config(),
        threads,
        settings.cache_capacity,
        Arc::new(sink),
    )
    .context("Failed to start loader threads")?;

    if let Some(path) = &args.event {
        info!("Event: {}", path.display());
        match EventInfo::load(path) {
            Ok(event) => {
                let now = Instant::now();
                session.open_event(event, now);
                if let Some(frame) = args.start_frame {
                    session.seek(frame, now);
                }
                if args.autoplay {
                    session.play_forward(now);
                }
            }
            Err(e) => warn!("{}", e),
        }
    } else {
        info!("No event given, starting empty (drag-and-drop supported)");
    }

    let app = ViewerApp::new(session, reports, settings, settings_path);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(format!("rendercmp v{}", env!("CARGO_PKG_VERSION")))
            .with_inner_size([1600.0, 900.0])
            .with_resizable(true)
            .with_drag_and_drop(true),
        persist_window: true,
        persistence_path: Some(paths::config_file("rendercmp_window.ron", &path_config)),
        ..Default::default()
    };

    eframe::run_native(
        "rendercmp",
        native_options,
        Box::new(move |_cc| Ok(Box::new(app))),
    )
    .map_err(|e| anyhow::anyhow!("eframe: {}", e))?;

    info!("Application exiting");
    Ok(())
}
