use std::fs;
use std::path::PathBuf;
use std::process::Command;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about = "Project automation commands", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run cargo nextest with default configuration
    Nextest {
        #[arg(long)]
        profile: Option<String>,
        #[arg(long)]
        release: bool,
    },
    /// Extract and re-embed a save file, then compare the two versions
    Roundtrip {
        /// Save file to push through the pipeline
        save_file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Nextest { profile, release } => run_nextest(profile, release)?,
        Commands::Roundtrip { save_file } => run_roundtrip(save_file)?,
    }
    Ok(())
}

fn run_nextest(profile: Option<String>, release: bool) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("nextest").arg("run");
    if let Some(profile) = profile {
        cmd.arg("--profile").arg(profile);
    }
    if release {
        cmd.arg("--release");
    }
    let status = cmd.status()?;
    if !status.success() {
        anyhow::bail!("cargo nextest run failed");
    }
    Ok(())
}

fn run_roundtrip(save_file: PathBuf) -> Result<()> {
    let temp = tempfile::tempdir()?;
    let extracted = temp.path().join("extracted");
    let rebuilt = temp.path().join("rebuilt.json");

    run_ttskit(&[
        "extract".as_ref(),
        save_file.as_os_str(),
        "--output".as_ref(),
        extracted.as_os_str(),
    ])?;
    run_ttskit(&[
        "embed".as_ref(),
        extracted.as_os_str(),
        "--output".as_ref(),
        rebuilt.as_os_str(),
    ])?;

    let original: serde_json::Value = serde_json::from_str(&fs::read_to_string(&save_file)?)?;
    let roundtripped: serde_json::Value = serde_json::from_str(&fs::read_to_string(&rebuilt)?)?;

    if original == roundtripped {
        println!("round trip OK: {}", save_file.display());
        Ok(())
    } else {
        anyhow::bail!("round trip changed {}", save_file.display())
    }
}

fn run_ttskit(args: &[&std::ffi::OsStr]) -> Result<()> {
    let status = Command::new("cargo")
        .args(["run", "--quiet", "-p", "ttskit", "--"])
        .args(args)
        .status()?;
    if !status.success() {
        anyhow::bail!("ttskit invocation failed");
    }
    Ok(())
}
