use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

use pygoto::config::{load_config, LoggingConfig};

mod cli;

#[derive(Parser)]
#[command(name = "pygoto")]
#[command(author = "Intent Project Team")]
#[command(version)]
#[command(about = "Python symbol index for go-to-definition", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract symbols and write them as a record stream to stdout
    Extract {
        /// File to scan (repeatable)
        #[arg(short, long = "file", value_name = "FILE")]
        file: Vec<String>,

        /// Directory to walk recursively (repeatable)
        #[arg(short, long = "dir", value_name = "DIR")]
        dir: Vec<String>,

        /// Skip paths containing this substring (repeatable)
        #[arg(short = 'x', long = "exclude", value_name = "SUBSTRING")]
        exclude: Vec<String>,
    },

    /// Index a project
    Index {
        /// Project directory to index
        #[arg(short, long, default_value = ".")]
        project: String,

        /// Clear the cache before scanning
        #[arg(short, long)]
        rebuild: bool,

        /// Watch for changes
        #[arg(short, long)]
        watch: bool,

        /// Delegate extraction to another extraction tool
        #[arg(long, value_name = "PROGRAM")]
        external: Option<String>,
    },

    /// Find definitions by name
    Find {
        /// Symbol name
        name: String,

        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,

        /// Match any name containing NAME, ignoring case
        #[arg(short, long)]
        substring: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List every symbol in display order
    List {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,
    },

    /// Show index statistics
    Stats {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,
    },
}

impl Commands {
    fn project(&self) -> Option<&str> {
        match self {
            Commands::Extract { .. } => None,
            Commands::Index { project, .. }
            | Commands::Find { project, .. }
            | Commands::List { project }
            | Commands::Stats { project } => Some(project.as_str()),
        }
    }
}

fn init_logging(debug: bool, verbose: bool, logging: &LoggingConfig) {
    let level = if debug {
        Level::DEBUG.to_string()
    } else if verbose {
        Level::INFO.to_string()
    } else {
        logging.level.clone()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries command output; logs go to stderr.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match logging.format.as_str() {
        "json" => builder.json().init(),
        "compact" => builder.compact().init(),
        _ => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let logging = cli
        .command
        .project()
        .map(|project| load_config(project).logging)
        .unwrap_or_default();
    init_logging(cli.debug, cli.verbose, &logging);

    debug!("pygoto v{} starting...", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Extract { file, dir, exclude } => {
            if file.is_empty() && dir.is_empty() {
                let mut command = Cli::command();
                if let Some(extract) = command.find_subcommand_mut("extract") {
                    eprintln!("error: one of --file or --dir is required\n\n{}", extract.render_usage());
                }
                std::process::exit(1);
            }
            let code = cli::extract::run_extract(file, dir, exclude)?;
            std::process::exit(code);
        }

        Commands::Index {
            project,
            rebuild,
            watch,
            external,
        } => {
            cli::index::index_project(project, rebuild, watch, external).await?;
        }

        Commands::Find {
            name,
            project,
            substring,
            format,
        } => {
            cli::find::find_symbols(name, project, substring, format).await?;
        }

        Commands::List { project } => {
            cli::list::list_symbols(project).await?;
        }

        Commands::Stats { project } => {
            cli::stats::show_stats(project).await?;
        }
    }

    Ok(())
}
