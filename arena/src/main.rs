mod output;

use anyhow::{Context, Result};
use arena::config::ServerConfig;
use arena::logging::{self, LogFormat};
use arena_core::{
    Error, FileContent, VersionStore, build_tree, extract_bundle, extract_file,
    normalize_relative_path, resolve_local,
};
use clap::{Parser, Subcommand};
use output::{
    BundleEntry, CatOutput, ExtractOutput, HeadOutput, OutputWriter, SwitchOutput, TreeOutput,
    VersionsOutput, render_tree,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Arena - versioned content for synced sources
#[derive(Parser)]
#[command(name = "arena")]
#[command(about = "Inspect and switch versions of synced Arena source content", long_about = None)]
#[command(version)]
struct Cli {
    /// Source base directory (defaults to ARENA_BASE env var or the current directory)
    #[arg(short, long, global = true)]
    base: Option<PathBuf>,

    /// Emit machine readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the selected version
    Head,

    /// List versions, newest first
    Versions,

    /// Point HEAD at an existing version
    Switch {
        /// Version hash
        version: String,
    },

    /// Show the content tree HEAD resolves to
    Tree,

    /// Output a file of the resolved content to stdout
    Cat {
        /// Path relative to the content root
        path: String,
    },

    /// List the files of a tar+gzip bundle
    Extract {
        /// Bundle to read
        archive: PathBuf,

        /// Output only this file's content
        #[arg(long)]
        file: Option<String>,
    },

    /// Run the HTTP server
    Serve {
        /// Config file (defaults to ./arena.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let output = OutputWriter::new(cli.json);

    match run(cli, &output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output.write_error(&err, 1);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli, output: &OutputWriter) -> Result<()> {
    // Determine base: CLI arg > ARENA_BASE env var > current directory
    let base = cli
        .base
        .or_else(|| std::env::var("ARENA_BASE").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));

    match cli.command {
        Commands::Head => cli_logging().and_then(|()| cmd_head(&base, output)),
        Commands::Versions => cli_logging().and_then(|()| cmd_versions(&base, output)),
        Commands::Switch { version } => {
            cli_logging().and_then(|()| cmd_switch(&base, &version, output))
        }
        Commands::Tree => cli_logging().and_then(|()| cmd_tree(&base, output)),
        Commands::Cat { path } => cli_logging().and_then(|()| cmd_cat(&base, &path, output)),
        Commands::Extract { archive, file } => {
            cli_logging().and_then(|()| cmd_extract(&archive, file.as_deref(), output))
        }
        Commands::Serve { config } => cmd_serve(config.as_deref()),
    }
}

/// Terse stderr logging for the one-shot commands. `serve` sets up its own.
fn cli_logging() -> Result<()> {
    logging::init_tracing(LogFormat::Text, logging::CLI_FILTER)
}

fn open_store(base: &Path) -> Result<VersionStore> {
    let store = VersionStore::new(base);
    if !store.exists() {
        anyhow::bail!("Source directory not found: {}", base.display());
    }
    Ok(store)
}

/// Name used in messages: the base directory's own name.
fn source_name(base: &Path) -> String {
    base.canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| base.display().to_string())
}

fn cmd_head(base: &Path, output: &OutputWriter) -> Result<()> {
    let store = open_store(base)?;
    let head = store.read_head();

    let data = HeadOutput {
        success: true,
        result_code: 0,
        head: head.clone(),
    };
    output.write(&data, || match head {
        Some(hash) => format!("{}\n", hash),
        None => "(none)\n".to_string(),
    })
}

fn cmd_versions(base: &Path, output: &OutputWriter) -> Result<()> {
    let store = open_store(base)?;
    let listing = store
        .snapshot()
        .with_context(|| format!("Failed to list versions in {}", base.display()))?;

    let data = VersionsOutput {
        success: true,
        result_code: 0,
        head: listing.head.clone(),
        versions: listing.versions.clone(),
    };
    output.write(&data, || {
        if listing.versions.is_empty() {
            return "No versions\n".to_string();
        }

        let mut text = String::new();
        for version in &listing.versions {
            let marker = if listing.head.as_deref() == Some(version.hash.as_str()) {
                '*'
            } else {
                ' '
            };
            text.push_str(&format!(
                "{} {}  {}  {} files  {} bytes{}\n",
                marker,
                version.hash,
                version.created_at.format("%Y-%m-%d %H:%M:%S"),
                version.file_count,
                version.size,
                if version.is_latest { "  (latest)" } else { "" }
            ));
        }
        text
    })
}

fn cmd_switch(base: &Path, version: &str, output: &OutputWriter) -> Result<()> {
    let store = open_store(base)?;
    let switch = store
        .switch_version(version)
        .with_context(|| format!("Failed to switch to version {}", version))?;

    let data = SwitchOutput {
        success: true,
        result_code: 0,
        previous_head: switch.previous_head.clone(),
        new_head: switch.new_head.clone(),
    };
    output.write(&data, || {
        format!(
            "Switched HEAD: {} -> {}\n",
            switch.previous_head.as_deref().unwrap_or("(none)"),
            switch.new_head
        )
    })
}

fn cmd_tree(base: &Path, output: &OutputWriter) -> Result<()> {
    let resolved = resolve_local(base, &source_name(base))
        .with_context(|| format!("Failed to resolve content in {}", base.display()))?;
    let tree = build_tree(&resolved.root);

    let root = match &resolved.root {
        arena_core::ContentRoot::Directory(dir) => dir.display().to_string(),
        arena_core::ContentRoot::Files(_) => String::new(),
    };

    let text = render_tree(&tree.tree);
    let data = TreeOutput {
        success: true,
        result_code: 0,
        origin: resolved.origin,
        root,
        tree: tree.tree,
        file_count: tree.file_count,
        directory_count: tree.directory_count,
    };
    output.write(&data, || {
        format!(
            "{}\n{} files, {} directories\n",
            text, data.file_count, data.directory_count
        )
    })
}

fn cmd_cat(base: &Path, path: &str, output: &OutputWriter) -> Result<()> {
    let path = normalize_relative_path(path)?;
    let resolved = resolve_local(base, &source_name(base))
        .with_context(|| format!("Failed to resolve content in {}", base.display()))?;

    let raw = resolved
        .root
        .read_file(&path)?
        .ok_or_else(|| Error::file_not_found(&path))?;

    if output.is_json() {
        let file = FileContent::new(path, &raw);
        let data = CatOutput {
            success: true,
            result_code: 0,
            path: file.path,
            content: file.content,
            size: file.size,
        };
        output.write(&data, String::new)
    } else {
        output.write_raw(&raw)
    }
}

fn cmd_extract(archive: &Path, file: Option<&str>, output: &OutputWriter) -> Result<()> {
    let bytes = std::fs::read(archive)
        .with_context(|| format!("Failed to read bundle {}", archive.display()))?;

    if let Some(path) = file {
        let raw = extract_file(&bytes, path)
            .with_context(|| format!("Failed to extract {} from {}", path, archive.display()))?;

        if output.is_json() {
            let content = FileContent::new(path, &raw);
            let data = CatOutput {
                success: true,
                result_code: 0,
                path: content.path,
                content: content.content,
                size: content.size,
            };
            return output.write(&data, String::new);
        }
        return output.write_raw(&raw);
    }

    let files = extract_bundle(&bytes)
        .with_context(|| format!("Failed to extract {}", archive.display()))?;

    let entries: Vec<BundleEntry> = files
        .iter()
        .map(|(path, content)| BundleEntry {
            path: path.to_string(),
            size: content.len() as u64,
        })
        .collect();

    let data = ExtractOutput {
        success: true,
        result_code: 0,
        files: entries,
    };
    output.write(&data, || {
        let mut text = String::new();
        for entry in &data.files {
            text.push_str(&format!("{:>10} {}\n", entry.size, entry.path));
        }
        text
    })
}

fn cmd_serve(config_path: Option<&Path>) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    logging::init_tracing(config.log_format, logging::SERVER_FILTER)?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(arena::server::run(config))
}
