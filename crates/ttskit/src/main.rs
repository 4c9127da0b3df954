use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use ttskit::app::embed::{self, EmbedOptions};
use ttskit::app::extract::{self, ExtractOptions};
use ttskit::app::scripts::PassthroughScripts;
use ttskit::domain::model::SaveFile;
use ttskit::infra::config::Config;

#[derive(Parser)]
#[command(author, version, about = "Split and reassemble Tabletop Simulator saves", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a save file into an editable directory tree
    Extract {
        /// The save file to extract
        save_file: PathBuf,

        /// Directory the save is extracted to
        #[arg(long)]
        output: PathBuf,

        /// Remove the output directory before extracting
        #[arg(long)]
        clean: bool,

        /// Round numeric values while extracting
        #[arg(short, long)]
        normalize: bool,
    },

    /// Reassemble an extracted directory tree into a save file
    Embed {
        /// Root directory of a previously extracted save
        path: PathBuf,

        /// File the reassembled save is written to
        #[arg(long)]
        output: PathBuf,

        /// Include search roots, highest priority first
        #[arg(short, long)]
        include: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    ttskit::init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Extract {
            save_file,
            output,
            clean,
            normalize,
        } => run_extract(&config, &save_file, output, clean, normalize),
        Commands::Embed {
            path,
            output,
            include,
        } => run_embed(&config, &path, &output, include),
    }
}

fn run_extract(
    config: &Config,
    save_file: &Path,
    output: PathBuf,
    clean: bool,
    normalize: bool,
) -> Result<()> {
    if clean && output.exists() {
        fs::remove_dir_all(&output)
            .with_context(|| format!("failed to clean {}", output.display()))?;
    }

    let raw = fs::read_to_string(save_file)
        .with_context(|| format!("failed to read save file {}", save_file.display()))?;
    let save: SaveFile = serde_json::from_str(&raw)
        .with_context(|| format!("invalid save file {}", save_file.display()))?;

    let mut options = ExtractOptions::new(output);
    options.script_extension = config.defaults.script_extension.clone();
    options.contents_path = config.layout.contents_path.clone();
    options.states_path = config.layout.states_path.clone();
    options.children_path = config.layout.children_path.clone();
    if normalize {
        options.normalize = Some(config.defaults.normalize_digits);
    }

    extract::extract_save(&save, &options, &PassthroughScripts)?;
    Ok(())
}

fn run_embed(config: &Config, path: &Path, output: &Path, include: Vec<PathBuf>) -> Result<()> {
    let mut roots = include;
    roots.extend(config.include_roots());

    let mut options = EmbedOptions::new(roots);
    options.script_extension = config.defaults.script_extension.clone();

    let save = embed::embed_save(path, &options, &PassthroughScripts)?;

    fs::write(output, embed::to_save_json(&save)?)
        .with_context(|| format!("failed to write save file {}", output.display()))?;
    Ok(())
}
