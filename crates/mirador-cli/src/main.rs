//! `mirador-cli` – interactive entry point for the Mirador agent.
//!
//! 1. Initialises logging (and OTLP export when configured).
//! 2. Loads `~/.mirador/config.toml`, writing defaults on first run.
//! 3. Checks the local Ollama instance and warns about missing models.
//! 4. Opens the camera and screen sources (or simulated ones).
//! 5. Runs the conversation REPL until a STOP turn or end of input.

mod config;
mod ollama;
mod preview;
mod repl;

use colored::Colorize;
use std::io;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};

use mirador_hal::sim::{SimCamera, SimScreen};
use mirador_hal::{Camera, CommandCamera, ImagePipeline, ScreenCapture};
use mirador_runtime::{AgentLoop, ReasoningProvider, init_tracing};

use crate::config::Config;
use crate::preview::TerminalPreview;

fn main() -> ExitCode {
    let _telemetry = init_tracing("mirador");

    print_banner();

    if !config::exists() {
        match config::save(&Config::default()) {
            Ok(()) => println!(
                "  {} Default config written to {}",
                "✓".green().bold(),
                config::config_path().display().to_string().bold()
            ),
            Err(e) => println!("  {}: {}", "Could not write default config".yellow(), e),
        }
    }

    let cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            return ExitCode::FAILURE;
        }
    };
    info!(config = ?cfg, "configuration loaded");

    check_ollama(&cfg);

    let pipeline = build_pipeline(&cfg);
    let mut agent = match AgentLoop::new(cfg.agent_config(), pipeline) {
        Ok(agent) => agent,
        Err(e) => {
            println!("{}: {}", "Startup error".red(), e);
            return ExitCode::FAILURE;
        }
    };

    // Created after Ollama discovery: the blocking client must not run
    // inside a runtime.
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            println!("{}: {}", "Failed to start async runtime".red(), e);
            return ExitCode::FAILURE;
        }
    };

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    if let Err(e) = repl::run(&mut agent, &rt, stdin.lock(), &mut stdout) {
        eprintln!("{}: {}", "I/O error".red(), e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

// ─────────────────────────────────────────────────────────────────────────────
// Startup helpers
// ─────────────────────────────────────────────────────────────────────────────

fn check_ollama(cfg: &Config) {
    print!("\n  Checking Ollama at {} … ", cfg.classifier_url.dimmed());
    match ollama::fetch_models(&cfg.classifier_url) {
        Ok(models) => {
            println!("{} ({} model(s) available)", "online".green(), models.len());
            let mut wanted = vec![&cfg.classifier_model];
            if cfg.reasoning_provider == ReasoningProvider::Ollama
                && cfg.reasoning_url == cfg.classifier_url
            {
                wanted.push(&cfg.reasoning_model);
            }
            for model in wanted {
                if !ollama::has_model(&models, model) {
                    warn!(model = %model, "model not pulled");
                    println!(
                        "  {} {} is not pulled.  Run `{}`.",
                        "⚠".yellow(),
                        model.bold(),
                        format!("ollama pull {model}").bold()
                    );
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "Ollama discovery failed");
            println!("{}", "offline".yellow());
            println!(
                "  {}  Every turn will be treated as CHAT until `{}` is running.",
                "No Ollama instance detected.".dimmed(),
                "ollama serve".bold()
            );
        }
    }
}

fn build_pipeline(cfg: &Config) -> ImagePipeline {
    let (camera, screen): (Option<Box<dyn Camera>>, Box<dyn ScreenCapture>) =
        if cfg.simulate_devices {
            info!("using simulated camera and screen");
            (
                Some(SimCamera::new("sim-camera") as Box<dyn Camera>),
                SimScreen::new(),
            )
        } else {
            let camera = match CommandCamera::open(cfg.camera_device.clone()) {
                Ok(camera) => {
                    Some(Box::new(camera.with_timeout(cfg.capture_timeout())) as Box<dyn Camera>)
                }
                Err(e) => {
                    warn!(error = %e, "camera unavailable for this session");
                    None
                }
            };
            (camera, screen_source(cfg))
        };

    let pipeline = ImagePipeline::new(cfg.pipeline_config(), camera, screen);
    if cfg.preview_ms > 0 {
        pipeline.with_preview(Box::new(TerminalPreview::new(Duration::from_millis(
            cfg.preview_ms,
        ))))
    } else {
        pipeline
    }
}

/// A configured `screen_command` wins; otherwise the in-process capture when
/// built with `native-screen`, else the platform screenshot tool.
fn screen_source(cfg: &Config) -> Box<dyn ScreenCapture> {
    if let Some(screen) = cfg.screen_override() {
        info!(command = ?cfg.screen_command, "using configured screenshot command");
        return Box::new(screen);
    }
    #[cfg(feature = "native-screen")]
    {
        Box::new(mirador_hal::NativeScreen::new())
    }
    #[cfg(not(feature = "native-screen"))]
    {
        let screen = mirador_hal::CommandScreen::platform_default();
        Box::new(screen.with_timeout(cfg.capture_timeout()))
    }
}

fn print_banner() {
    println!();
    println!("{}", r#"   __  ____              __         "#.bold().cyan());
    println!("{}", r#"  /  |/  (_)______ ____/ /__  ____ "#.bold().cyan());
    println!("{}", r#" / /|_/ / / __/ _ `/ _  / _ \/ __/ "#.bold().cyan());
    println!("{}", r#"/_/  /_/_/_/  \_,_/\_,_/\___/_/    "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Mirador".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  A conversational agent that can look");
    println!();
}
