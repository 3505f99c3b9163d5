//! Command-line interface
use crate::config::Settings;
use crate::export::ExportFormat;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

/// Create WireGuard server and client configurations
#[derive(Debug, Parser)]
#[command(name = "wg-easy-vpn", author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (JSON or TOML)
    #[arg(short = 'C', long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the server configuration of a new connection
    Create(CreateArgs),
    /// Add clients to a connection
    Add(AddArgs),
    /// List the clients of a connection
    Show(ShowArgs),
    /// Remove clients from a connection
    Rm(RmArgs),
}

/// Directory overrides shared by every command
#[derive(Debug, Clone, Default, Args)]
pub struct DirArgs {
    /// Directory of server configuration files
    #[arg(long, value_name = "DIR")]
    pub server_dir: Option<PathBuf>,

    /// Directory of client configuration files
    #[arg(long, value_name = "DIR")]
    pub client_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct CreateArgs {
    /// Connection name, such as wg0
    #[arg(default_value = "wg0")]
    pub connection: String,

    /// Public address or domain name clients connect to
    #[arg(short, long)]
    pub endpoint: String,

    /// Server address with the network clients are allocated from
    #[arg(short, long = "net", value_name = "CIDR", value_delimiter = ',')]
    pub networks: Vec<String>,

    /// Port the server listens on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// DNS servers handed to clients
    #[arg(long, value_delimiter = ',')]
    pub dns: Vec<IpAddr>,

    /// Overwrite an existing connection
    #[arg(short, long)]
    pub force: bool,

    #[command(flatten)]
    pub dirs: DirArgs,
}

#[derive(Debug, Clone, Args)]
pub struct AddArgs {
    #[arg(default_value = "wg0")]
    pub connection: String,

    /// Names of the clients to add
    #[arg(short, long = "client", value_name = "NAME", required = true, num_args = 1..)]
    pub clients: Vec<String>,

    /// Destinations routed through the tunnel
    #[arg(short, long = "route", value_name = "CIDR", value_delimiter = ',')]
    pub routes: Vec<String>,

    /// Extra DNS servers, merged with the connection's
    #[arg(long, value_delimiter = ',')]
    pub dns: Vec<IpAddr>,

    /// Do not generate pre-shared keys
    #[arg(long)]
    pub no_psk: bool,

    /// Overwrite existing client files
    #[arg(short, long)]
    pub force: bool,

    /// Export client configurations as QR codes, to the terminal unless a
    /// format is given
    #[arg(short = 'x', long)]
    pub export: bool,

    /// Write QR codes next to the client files in this format
    #[arg(long, value_enum)]
    pub export_format: Option<ExportFormat>,

    #[command(flatten)]
    pub dirs: DirArgs,
}

#[derive(Debug, Clone, Args)]
pub struct ShowArgs {
    #[arg(default_value = "wg0")]
    pub connection: String,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub dirs: DirArgs,
}

#[derive(Debug, Clone, Args)]
pub struct RmArgs {
    #[arg(default_value = "wg0")]
    pub connection: String,

    /// Client names or public keys to remove
    #[arg(short, long = "client", value_name = "NAME|KEY", required = true, num_args = 1..)]
    pub clients: Vec<String>,

    /// Keep the client configuration files
    #[arg(long)]
    pub keep_file: bool,

    #[command(flatten)]
    pub dirs: DirArgs,
}

impl Command {
    fn dirs(&self) -> &DirArgs {
        match self {
            Command::Create(args) => &args.dirs,
            Command::Add(args) => &args.dirs,
            Command::Show(args) => &args.dirs,
            Command::Rm(args) => &args.dirs,
        }
    }

    /// Apply this command's flags on top of loaded settings
    pub fn apply_to(&self, settings: &mut Settings) {
        let dirs = self.dirs();
        if let Some(dir) = &dirs.server_dir {
            settings.server_dir = dir.clone();
        }
        if let Some(dir) = &dirs.client_dir {
            settings.client_dir = dir.clone();
        }
        if let Command::Create(CreateArgs { port: Some(port), .. }) = self {
            settings.listen_port = *port;
        }
    }
}

impl Cli {
    /// Settings from the settings file and environment, overridden by flags
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = Settings::load(self.config.as_deref())?;
        self.command.apply_to(&mut settings);
        Ok(settings)
    }
}

/// Parse command line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}
