mod app;
mod state;
mod ui;

use std::fs::{File, OpenOptions};

use anyhow::Context;
use app::QevrApp;
use eframe::egui;
use qevr::config::{config_file_path, executable_folder, Config};
use state::AppState;

const LOG_FILE_NAME: &str = "qevr.log";

fn main() -> eframe::Result {
    setup_logging();
    log::info!(
        "QeVR {} on {} ({})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    );

    let state = initial_state();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([640.0, 420.0])
            .with_min_inner_size([520.0, 360.0]),
        ..Default::default()
    };

    let result = eframe::run_native(
        "QeVR",
        options,
        Box::new(|_cc| Ok(Box::new(QevrApp::new(state)))),
    );
    log::info!("Close logging");
    result
}

/// Load `config.yaml`. A broken file is reported in the UI and left untouched.
fn initial_state() -> AppState {
    let path = match config_file_path() {
        Ok(path) => path,
        Err(e) => {
            log::error!("{e:#}");
            let mut state = AppState::new(Config::default(), None);
            state.error_message = Some(format!("{e:#}"));
            return state;
        }
    };
    match Config::load(&path) {
        Ok(config) => AppState::new(config, Some(path)),
        Err(e) => {
            log::error!("{e:#}");
            let mut state = AppState::new(Config::default(), None);
            state.error_message = Some(format!("{e:#}"));
            state
        }
    }
}

/// Log to `qevr.log` next to the executable, falling back to stderr.
/// Panics are written to the log before the default report.
fn setup_logging() {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    match open_log_file() {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        Err(e) => eprintln!("{e:#}; logging to stderr"),
    }
    builder.init();
    log::info!("Logging started");

    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        log::error!("{info}");
        default_hook(info);
    }));
}

fn open_log_file() -> anyhow::Result<File> {
    let path = executable_folder()?.join(LOG_FILE_NAME);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("{}: failed to open log file", path.display()))
}
