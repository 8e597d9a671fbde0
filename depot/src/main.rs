mod bundle;
mod output;

use anyhow::{Context, Result};
use bundle::TarBundler;
use clap::{Args, Parser, Subcommand};
use depot_core::{Binary, Config, Depot, LocalRepository, PackageRef};
use output::{
    InitOutput, OutputWriter, PackagesListOutput, PackagesPublishOutput, ToolsListOutput,
    ToolsPublishOutput,
};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const EXIT_ERROR: u8 = 1;
const EXIT_NO_ARTIFACTS: u8 = 2;
const EXIT_NO_MATCHING_VERSION: u8 = 3;

/// Depot - A versioned artifact repository
#[derive(Parser)]
#[command(name = "depot")]
#[command(about = "Versioned tool archives and content-addressed packages", long_about = None)]
#[command(version)]
struct Cli {
    /// Depot root directory (defaults to DEPOT_ROOT env var or ./depot)
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new depot
    Init {
        /// Tool name prefix to record in the config
        #[arg(long)]
        tool_prefix: Option<String>,
    },

    /// Tool archives
    Tools(ToolsArgs),

    /// Packages
    #[command(subcommand)]
    Packages(PackagesCommands),
}

#[derive(Args)]
struct ToolsArgs {
    /// Tool name prefix, overriding the depot config
    #[arg(long, global = true)]
    tool_prefix: Option<String>,

    #[command(subcommand)]
    command: ToolsCommands,
}

#[derive(Subcommand)]
enum ToolsCommands {
    /// List tools for a major (and optionally minor) version
    List {
        /// Major version
        #[arg(long)]
        major: u32,

        /// Minor version (any if omitted)
        #[arg(long)]
        minor: Option<u32>,

        /// Only show the newest version number
        #[arg(long)]
        newest: bool,
    },

    /// Upload a finished tool archive
    Publish {
        /// Archive file
        archive: PathBuf,

        /// Version the archive carries (major.minor.patch-platform)
        tool_version: String,

        /// Additional platforms to upload the same archive for
        #[arg(long = "alias")]
        aliases: Vec<String>,
    },
}

#[derive(Subcommand)]
enum PackagesCommands {
    /// Publish a package from a local repository (archives or directories)
    Publish {
        /// Package reference (namespace/name or namespace/name-revision)
        reference: String,

        /// Local package repository
        #[arg(long)]
        repo: PathBuf,

        /// Bump the revision of a package directory before publishing
        #[arg(long)]
        upgrade: bool,
    },

    /// List published packages
    List,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output = OutputWriter::new(cli.json);

    // Determine depot root: CLI arg > DEPOT_ROOT env var > ./depot default
    let root = cli
        .root
        .clone()
        .or_else(|| std::env::var("DEPOT_ROOT").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("./depot"));
    tracing::debug!("using depot at {}", root.display());

    let result = match &cli.command {
        Commands::Init { tool_prefix } => cmd_init(&root, tool_prefix.as_deref(), &output),
        Commands::Tools(tools) => {
            let tool_prefix = tools.tool_prefix.as_deref();
            match &tools.command {
                ToolsCommands::List {
                    major,
                    minor,
                    newest,
                } => cmd_tools_list(&root, tool_prefix, *major, *minor, *newest, &output),
                ToolsCommands::Publish {
                    archive,
                    tool_version,
                    aliases,
                } => cmd_tools_publish(&root, tool_prefix, archive, tool_version, aliases, &output),
            }
        }
        Commands::Packages(PackagesCommands::Publish {
            reference,
            repo,
            upgrade,
        }) => cmd_packages_publish(&root, reference, repo, *upgrade, &output),
        Commands::Packages(PackagesCommands::List) => cmd_packages_list(&root, &output),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = result_code(&err);
            output.write_error(&err, code);
            ExitCode::from(code)
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Distinguish "nothing published yet" from "no such version" for scripts.
fn result_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|e| e.downcast_ref::<depot_core::Error>())
        .map(|e| match e.root_cause() {
            depot_core::Error::NoArtifacts => EXIT_NO_ARTIFACTS,
            depot_core::Error::NoMatchingVersion { .. } => EXIT_NO_MATCHING_VERSION,
            _ => EXIT_ERROR,
        })
        .unwrap_or(EXIT_ERROR)
}

fn open_depot(root: &Path) -> Result<Depot> {
    Depot::open(root).with_context(|| format!("Failed to open depot at {}", root.display()))
}

fn cmd_init(root: &Path, tool_prefix: Option<&str>, output: &OutputWriter) -> Result<()> {
    let config = match tool_prefix {
        Some(prefix) => Config::default().with_tool_prefix(prefix),
        None => Config::default(),
    };

    let depot = Depot::init(root, config)
        .with_context(|| format!("Failed to initialize depot at {}", root.display()))?;

    let data = InitOutput {
        success: true,
        result_code: 0,
        root: root.display().to_string(),
        tool_prefix: depot.config().tool_prefix.clone(),
    };
    output.write(&data, || {
        format!(
            "Initialized depot at {}\nTool prefix: {}\n",
            data.root, data.tool_prefix
        )
    })
}

fn cmd_tools_list(
    root: &Path,
    tool_prefix: Option<&str>,
    major: u32,
    minor: Option<u32>,
    newest: bool,
    output: &OutputWriter,
) -> Result<()> {
    let depot = open_depot(root)?;

    let mut tools = depot
        .catalog_with_prefix(tool_prefix)
        .list_matching(major, minor)
        .with_context(|| format!("Failed to list tools in {}", root.display()))?;
    if newest {
        tools = tools.newest();
    }

    let data = ToolsListOutput {
        success: true,
        result_code: 0,
        tools: tools.into_vec(),
    };
    output.write(&data, || {
        data.tools
            .iter()
            .map(|t| format!("{} {}\n", t.version, t.url))
            .collect()
    })
}

fn cmd_tools_publish(
    root: &Path,
    tool_prefix: Option<&str>,
    archive: &Path,
    tool_version: &str,
    aliases: &[String],
    output: &OutputWriter,
) -> Result<()> {
    let depot = open_depot(root)?;

    let version = Binary::decode(tool_version)
        .with_context(|| format!("Invalid tool version: {}", tool_version))?;

    let mut file = File::open(archive)
        .with_context(|| format!("Failed to open archive: {}", archive.display()))?;
    let size = file
        .metadata()
        .with_context(|| format!("Failed to stat archive: {}", archive.display()))?
        .len();

    let catalog = depot.catalog_with_prefix(tool_prefix);
    let alias_refs: Vec<&str> = aliases.iter().map(String::as_str).collect();
    let alias_versions = catalog
        .alias_versions(&version, &alias_refs)
        .with_context(|| format!("Invalid alias platform for {}", version))?;
    let tool = catalog
        .publish(&mut file, size, &version, &alias_refs)
        .with_context(|| format!("Failed to publish tools {}", version))?;

    let data = ToolsPublishOutput {
        success: true,
        result_code: 0,
        tool,
        aliases: alias_versions.into_iter().map(|a| a.platform).collect(),
    };
    output.write(&data, || {
        let mut text = format!("{} {}\n", data.tool.version, data.tool.url);
        for alias in &data.aliases {
            text.push_str(&format!("  alias: {}\n", alias));
        }
        text
    })
}

fn cmd_packages_publish(
    root: &Path,
    reference: &str,
    repo: &Path,
    upgrade: bool,
    output: &OutputWriter,
) -> Result<()> {
    let depot = open_depot(root)?;

    let reference = PackageRef::parse(reference)
        .with_context(|| format!("Invalid package reference: {}", reference))?;

    let package = depot
        .packages(LocalRepository::new(repo).with_bundler(Arc::new(TarBundler)))
        .publish(&reference, upgrade)
        .with_context(|| format!("Failed to publish package {}", reference))?;

    let data = PackagesPublishOutput {
        success: true,
        result_code: 0,
        package,
    };
    output.write(&data, || {
        format!(
            "{} {}\nsha256: {}\n",
            data.package.reference, data.package.url, data.package.digest
        )
    })
}

fn cmd_packages_list(root: &Path, output: &OutputWriter) -> Result<()> {
    let depot = open_depot(root)?;

    let packages = depot
        .registry()
        .list()
        .with_context(|| "Failed to list packages")?;

    let data = PackagesListOutput {
        success: true,
        result_code: 0,
        packages,
    };
    output.write(&data, || {
        if data.packages.is_empty() {
            "No packages\n".to_string()
        } else {
            data.packages
                .iter()
                .map(|p| format!("{} {} {}\n", p.reference, p.digest, p.url))
                .collect()
        }
    })
}
