use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::info;
use modcat::config::Config;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use url::Url;

const DEFAULT_CONFIG_FILE: &str = "modcat.json";

#[derive(Debug, Parser)]
#[command(name = "modcat")]
#[command(about = "Serves a SKOS vocabulary service as a Linked-Data catalogue")]
#[command(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Verbose mode - sets the RUST_LOG level to info, defaults to warning level
    #[clap(long, short, action, default_value = "false", global = true)]
    verbose: bool,
    /// Debug mode - sets the RUST_LOG level to debug, defaults to warning level
    #[clap(long, action, default_value = "false", global = true)]
    debug: bool,
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Write the default configuration to a file.
    Init {
        /// Where to write the configuration
        #[clap(default_value = DEFAULT_CONFIG_FILE)]
        file: PathBuf,
        /// Replace the file if it already exists
        #[clap(long, short, action = clap::ArgAction::SetTrue, default_value = "false")]
        force: bool,
    },
    /// Print a configuration file, or the defaults when no file is given.
    Show {
        file: Option<PathBuf>,
        /// Output JSON instead of text
        #[clap(long, action, default_value = "false")]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// JSON configuration file; command line flags override its values
        #[clap(long, short)]
        config: Option<PathBuf>,
        /// Address to listen on, e.g. 0.0.0.0:5000
        #[clap(long, short)]
        bind: Option<String>,
        /// Root of the upstream vocabulary REST API
        #[clap(long, short)]
        upstream: Option<Url>,
        /// Base URL used for minted IRIs instead of the request's Host header
        #[clap(long)]
        public_url: Option<Url>,
        /// Answer cross-origin requests from any origin
        #[clap(long, action, default_value = "false")]
        cors: bool,
    },
    /// Manage modcat configuration files.
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Prints the version of the modcat binary
    Version,
}

/// Settings for `modcat serve`: the file (or defaults) first, then the flags.
fn serve_config(
    file: Option<&Path>,
    bind: Option<String>,
    upstream: Option<Url>,
    public_url: Option<Url>,
    cors: bool,
) -> Result<Config> {
    let mut config = match file {
        Some(path) => Config::from_file(path)
            .map_err(|e| anyhow!("Cannot load config {}: {e}", path.display()))?,
        None => Config::default(),
    };
    if let Some(bind) = bind {
        config.bind = bind;
    }
    if let Some(upstream) = upstream {
        config.upstream = upstream;
    }
    if public_url.is_some() {
        config.public_url = public_url;
    }
    config.cors |= cors;
    config.validate()?;
    Ok(config)
}

fn handle_config_command(config_cmd: ConfigCommands) -> Result<()> {
    match config_cmd {
        ConfigCommands::Init { file, force } => {
            if file.exists() && !force {
                return Err(anyhow!(
                    "{} already exists. Use --force to overwrite it.",
                    file.display()
                ));
            }
            Config::default().save_to_file(&file)?;
            println!("Wrote default configuration to {}", file.display());
        }
        ConfigCommands::Show { file, json } => {
            let config = match file {
                Some(path) => Config::from_file(&path)?,
                None => Config::default(),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                config.print();
            }
        }
    }
    Ok(())
}

pub fn run() -> Result<()> {
    modcat::init_logging();
    let cmd = Cli::parse();
    execute(cmd)
}

pub fn run_from_args<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    modcat::init_logging();
    let cmd = Cli::try_parse_from(args)?;
    execute(cmd)
}

fn execute(cmd: Cli) -> Result<()> {
    // The RUST_LOG env var is set by `init_logging` if MODCAT_LOG is present.
    // CLI flags for verbosity take precedence. If nothing is set, we default to "warn".
    if cmd.debug {
        std::env::set_var("RUST_LOG", "debug");
    } else if cmd.verbose {
        std::env::set_var("RUST_LOG", "info");
    } else if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "warn");
    }
    let _ = env_logger::try_init();

    match cmd.command {
        Commands::Serve {
            config,
            bind,
            upstream,
            public_url,
            cors,
        } => {
            let config = serve_config(config.as_deref(), bind, upstream, public_url, cors)?;
            info!("Starting modcat with upstream {}", config.upstream);
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(modcat::serve(config))?;
        }
        Commands::Config(config_cmd) => handle_config_command(config_cmd)?,
        Commands::Version => {
            println!("modcat {}", env!("CARGO_PKG_VERSION"));
        }
    }
    Ok(())
}
