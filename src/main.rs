// src/main.rs

use apkgbuild::{BuildConfig, Pipeline};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "apkgbuild")]
#[command(author, version, about = "APKG Build Tool", long_about = None)]
struct Cli {
    /// Path to the Lua build script
    script: PathBuf,

    /// Path of the output package archive (tar+zstd)
    output: PathBuf,

    /// Run the build without chroot isolation (for unprivileged use)
    #[arg(long)]
    no_isolation: bool,
}

fn main() {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> apkgbuild::Result<()> {
    let mut config = BuildConfig::from_home()?;
    if cli.no_isolation {
        config.use_isolation = false;
    }

    Pipeline::new(config).run(&cli.script, &cli.output)
}
