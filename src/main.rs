// src/main.rs - Interactive plotter console
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

use plotter_sim::{Config, Flow, Interpreter, Simulation, load_config};

/// Pen plotter simulator
#[derive(Parser, Debug)]
#[command(name = "plotter", about = "Simulates motors driving pens; reads commands from stdin.")]
struct Cli {
    /// File of commands to run before the interactive prompt
    batch: Option<PathBuf>,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for pen log files (overrides the config file)
    #[arg(short, long)]
    log_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => {
            let path = path.to_string_lossy();
            tracing::info!("Loading configuration from: {}", path);
            load_config(&path)?
        }
        None => Config::default(),
    };
    if let Some(dir) = cli.log_dir {
        config.logging.directory = dir;
    }

    let simulation = Simulation::from_config(&config)?;
    let mut interpreter = Interpreter::new(simulation);

    if let Some(path) = &cli.batch {
        tracing::info!("Running batch file: {}", path.display());
        let script = tokio::fs::read_to_string(path).await?;
        match interpreter.run_batch(&script).await {
            Ok(Flow::Terminate) => {
                println!("BYE BYE...");
                return Ok(());
            }
            Ok(Flow::Continue) => {}
            Err(e) => println!("error: {}", e),
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!(">");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim() == "dump" {
            print!("{}", interpreter.simulation().dump().await);
            continue;
        }
        match interpreter.execute(&line).await {
            Ok(Flow::Continue) => println!("OK"),
            Ok(Flow::Terminate) => {
                println!("BYE BYE...");
                return Ok(());
            }
            Err(e) => println!("error: {}", e),
        }
    }

    interpreter.shutdown().await;
    Ok(())
}
