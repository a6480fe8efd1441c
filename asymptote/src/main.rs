#[cfg(feature = "cli")]
use anyhow::Result;
#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path of the JSON syntax tree to read. Reads stdin when omitted.
    #[arg(short, long)]
    file: Option<String>,

    /// Path of a JSON engine configuration
    #[arg(short, long)]
    config: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Log analysis progress to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("asymptote needs to be installed with the cli feature (`cargo install --force asymptote -F cli`)");
}

#[cfg(feature = "cli")]
fn main() -> Result<()> {
    use std::io;
    use std::io::Read;

    use asymptote::{analyze_source_json, load_config, EngineConfig};
    use tracing_subscriber::EnvFilter;

    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };

    let source = match args.file {
        Some(path) => std::fs::read_to_string(&path)?,
        None => {
            let mut stdin = String::new();
            io::stdin().lock().read_to_string(&mut stdin)?;
            stdin
        }
    };

    let report = analyze_source_json(&source, &config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for function in &report.functions {
            println!("{}: {}", function.function_name, function.complexity);
            for warning in &function.warnings {
                println!("    warning: {warning}");
            }
        }
    }
    Ok(())
}
