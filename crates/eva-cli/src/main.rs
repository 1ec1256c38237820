//! `eva-bridge` – behavior bridge between the decision layer and the Eva
//! animation backend.
//!
//! 1. Loads `~/.eva/config.toml` (or `$EVA_CONFIG`), falling back to
//!    defaults.  `eva-bridge init` writes the defaults out and exits.
//! 2. Waits for the camera → animation transform; if it never shows up the
//!    process exits with status 1.
//! 3. Reads rosbridge frames from stdin and writes rosbridge frames to
//!    stdout.  Logs go to stderr.
//! 4. On Ctrl-C, switches behaviors off (recentering the face) and exits.

mod bridge;
mod config;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use eva_middleware::EventBus;
use eva_perception::TransformListener;
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// Grace period for blocking stdin reads when the runtime shuts down.
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

fn main() -> ExitCode {
    let _guard = eva_runtime::init_tracing("eva-bridge");
    print_banner();

    if std::env::args().nth(1).as_deref() == Some("init") {
        return write_default_config();
    }

    let cfg = match config::load() {
        Ok(cfg) => {
            info!(path = %config::config_path().display(), "configuration loaded");
            cfg
        }
        Err(e) => {
            eprintln!("  {}: {}", "Config error".red(), e);
            eprintln!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };
    let settings = match cfg.settings() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    // The writer's tap must exist before bootstrap: it is what the
    // configuration client connects to, since parameter batches reach the
    // reconfigure server through stdout.  With the tap in place the binary
    // never starts in degraded mode.
    let bus = EventBus::new(cfg.bus_capacity);
    let tap = bus.subscribe_all();

    let transforms = TransformListener::new(cfg.transform_engine());
    let ctx = match eva_runtime::bootstrap(&settings, bus, &transforms) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!(error = %e, "startup failed");
            eprintln!("  {}", "No camera transforms!".red().bold());
            return ExitCode::FAILURE;
        }
    };
    eprintln!(
        "  {} {} → {}",
        "✓ transform cached:".green(),
        settings.camera_frame.bold(),
        settings.location_frame.bold()
    );
    if !ctx.mirror.has_client() {
        eprintln!("  {}", "⚠ parameter pushes disabled (no configuration client)".yellow());
    }

    let shutdown = Arc::new(Notify::new());
    let on_signal = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("{}", "⚠  Ctrl-C received – recentering and shutting down …".yellow().bold());
        on_signal.notify_one();
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; Ctrl-C will not recenter the face");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to start the async runtime");
            return ExitCode::FAILURE;
        }
    };
    runtime.block_on(bridge::run(ctx, tap, cfg.push_interval(), shutdown));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);

    eprintln!("{}", "  ✓ Exiting eva-bridge.".green());
    ExitCode::SUCCESS
}

fn write_default_config() -> ExitCode {
    let path = config::config_path();
    if path.exists() {
        eprintln!("  {} already exists; leaving it alone.", path.display().to_string().bold());
        return ExitCode::SUCCESS;
    }
    match config::save_to(&config::Config::default(), &path) {
        Ok(()) => {
            eprintln!(
                "  {} Config saved to {}",
                "✓".green().bold(),
                path.display().to_string().bold()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("  {}: {}", "Error saving config".red(), e);
            ExitCode::FAILURE
        }
    }
}

fn print_banner() {
    eprintln!();
    eprintln!("{}", r#"   ____              "#.bold().cyan());
    eprintln!("{}", r#"  / __/  _____ _     "#.bold().cyan());
    eprintln!("{}", r#" / _/| |/ / _ `/     "#.bold().cyan());
    eprintln!("{}", r#"/___/|___/\_,_/      "#.bold().cyan());
    eprintln!();
    eprintln!(
        "  {} {}",
        "eva-bridge".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    eprintln!("  Behavior bridge for the Eva animation backend");
    eprintln!();
}
