use anyhow::{Context, Result as AnyhowResult};
use autostops::config::Config;
use autostops::replay::{Replay, Script};
use autostops::services::tracing_setup;
use clap::Parser;
use std::path::PathBuf;

/// Replay editing sessions through the auto-stops engine
#[derive(Parser, Debug)]
#[command(name = "autostops")]
#[command(about = "Replays scripted editor sessions and prints the recorded stops", long_about = None)]
#[command(version)]
struct Args {
    /// Replay script (JSON) to run
    #[arg(value_name = "SCRIPT")]
    script: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Path to log file for engine diagnostics (default: stderr, warnings only)
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,

    /// Print the configuration JSON schema and exit
    #[arg(long)]
    print_schema: bool,
}

fn main() -> AnyhowResult<()> {
    let args = Args::parse();

    if args.print_schema {
        println!("{}", serde_json::to_string_pretty(&Config::json_schema())?);
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    if args.dump_config {
        let json = serde_json::to_string_pretty(&config).context("Failed to serialize config")?;
        println!("{json}");
        return Ok(());
    }

    let directive = if args.log_file.is_some() { "debug" } else { "warn" };
    tracing_setup::init_global(args.log_file.as_deref(), directive)
        .context("Failed to initialize logging")?;

    let Some(script_path) = args.script else {
        anyhow::bail!("No replay script given, see --help");
    };
    let script = Script::load_from_file(&script_path)
        .with_context(|| format!("Failed to read replay script {}", script_path.display()))?;

    tracing::info!(
        "Replaying {} steps from {}",
        script.steps.len(),
        script_path.display()
    );
    let report = Replay::new(config, script.start_unix).run(&script.steps);
    print!("{report}");

    Ok(())
}
