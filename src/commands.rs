//! Command handlers
//!
//! Each handler reads the files it needs, applies one change through the
//! library types and writes the results back. User-facing messages go to
//! stdout; logs go through `tracing`.
use crate::cli::{AddArgs, Command, CreateArgs, RmArgs, ShowArgs};
use crate::config::{Settings, CONFIG_SUFFIX};
use crate::encryption::Key;
use crate::error::{Error, Result};
use crate::export::{self, ExportFormat};
use crate::ini::ConfigFile;
use crate::metadata::Metadata;
use crate::network::NetSlice;
use crate::node::{Client, Server, INTERFACE_SECTION};
use crate::vpn::Vpn;
use anyhow::{bail, Context};
use console::style;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use tracing::{debug, info, warn};

/// Characters allowed in connection and client names
pub const ALLOWED_CHARS: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_-.";

/// Placeholder for peers with no matching client file
pub const UNKNOWN_CLIENT: &str = "???";

/// Strip surrounding whitespace and every character not allowed in a name
pub fn clean_name(input: &str) -> String {
    input.trim().chars().filter(|c| ALLOWED_CHARS.contains(*c)).collect()
}

fn checked_name(input: &str) -> anyhow::Result<String> {
    let name = clean_name(input);
    if name.is_empty() {
        bail!("invalid name {:?}", input);
    }
    if name != input {
        warn!("Using name {} instead of {:?}", name, input);
    }
    Ok(name)
}

/// Public key of the client described by a client configuration file
pub fn public_key_from_file(path: &Path) -> Result<Key> {
    let file = ConfigFile::parse(path)?;
    let key = file
        .get_section(INTERFACE_SECTION)?
        .get_key_from_base64("PrivateKey")?;
    Ok(key.public())
}

/// Map client names to public keys from the `*.conf` files of `dir`.
///
/// Files that cannot be read are skipped; a missing directory is empty.
pub fn client_index(dir: &Path) -> BTreeMap<String, Key> {
    let mut index = BTreeMap::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot list {}: {}", dir.display(), e);
            return index;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) if path.is_file() => name,
            _ => continue,
        };
        let Some(client) = name.strip_suffix(CONFIG_SUFFIX) else {
            continue;
        };
        match public_key_from_file(&path) {
            Ok(key) => {
                index.insert(client.to_string(), key);
            }
            Err(e) => debug!("Skipping {}: {}", path.display(), e),
        }
    }
    index
}

/// Metadata DNS servers followed by the extra ones, without duplicates
pub fn merge_dns(metadata_dns: &[IpAddr], extra: &[IpAddr]) -> Vec<IpAddr> {
    let mut dns = metadata_dns.to_vec();
    for ip in extra {
        if !dns.contains(ip) {
            dns.push(*ip);
        }
    }
    dns
}

pub fn run(settings: &Settings, command: &Command) -> anyhow::Result<()> {
    match command {
        Command::Create(args) => create(settings, args),
        Command::Add(args) => add(settings, args),
        Command::Show(args) => show(settings, args),
        Command::Rm(args) => rm(settings, args),
    }
}

pub fn create(settings: &Settings, args: &CreateArgs) -> anyhow::Result<()> {
    let connection = checked_name(&args.connection)?;
    let server_file = settings.server_file(&connection);
    if server_file.exists() && !args.force {
        return Err(Error::AlreadyExists(server_file).into());
    }

    let networks = if args.networks.is_empty() {
        settings.networks()
    } else {
        NetSlice::from_strings(&args.networks)
    }
    .context("invalid network")?;

    fs::create_dir_all(&settings.server_dir)
        .with_context(|| format!("cannot create {}", settings.server_dir.display()))?;

    let metadata_path = settings.metadata_path();
    Metadata::new(args.endpoint.clone(), networks.clone(), args.dns.clone())
        .save(&connection, &metadata_path, args.force)
        .context("cannot save connection metadata")?;

    let server = Server::new(&networks, settings.listen_port);
    Vpn::new(connection.as_str(), server)
        .save(&server_file)
        .context("cannot save server configuration")?;

    println!(
        "{} {} ({})",
        style("The connection has been set up:").green(),
        style(&connection).green().bold(),
        server_file.display()
    );
    println!(
        "{} {}",
        style("Metadata saved to").green(),
        metadata_path.display()
    );
    Ok(())
}

/// Everything shared by the clients added in one invocation
struct NewClients<'a> {
    settings: &'a Settings,
    args: &'a AddArgs,
    endpoint: String,
    dns: Vec<IpAddr>,
    routes: NetSlice,
}

impl NewClients<'_> {
    fn add(&self, vpn: &mut Vpn, name: &str) -> anyhow::Result<()> {
        let name = checked_name(name)?;
        let file = self.settings.client_file(&name);
        if file.exists() && !self.args.force {
            return Err(Error::AlreadyExists(file).into());
        }

        let address = vpn.provide_net_slice()?;
        let client = Client::new(&address, !self.args.no_psk, self.dns.clone());
        client
            .to_config(vpn.server(), Some(&self.routes), &self.endpoint)?
            .save(&file)
            .with_context(|| format!("cannot save client {}", name))?;
        vpn.add_peer(client.to_peer());

        println!(
            "{} {} ({}) {} {}",
            style("Client").green(),
            style(&name).green().bold(),
            file.display(),
            style("has been added to").green(),
            vpn.name()
        );

        if self.args.export || self.args.export_format.is_some() {
            export_client(&file, self.args.export_format)
                .with_context(|| format!("cannot export client {}", name))?;
        }
        Ok(())
    }
}

fn export_client(file: &Path, format: Option<ExportFormat>) -> Result<()> {
    let code = export::encode_file(file)?;
    match format {
        None => print!("{}", export::render_text(&code)),
        Some(format) => {
            let output = file.with_extension(format.extension());
            export::save(&code, &output, format)?;
            println!("{} {}", style("QR code written to").green(), output.display());
        }
    }
    Ok(())
}

pub fn add(settings: &Settings, args: &AddArgs) -> anyhow::Result<()> {
    let connection = checked_name(&args.connection)?;
    let server_file = settings.server_file(&connection);
    let mut vpn = Vpn::read(&server_file)
        .with_context(|| format!("cannot read connection {}", connection))?;
    vpn.add_metadata(&settings.metadata_path())
        .with_context(|| format!("cannot load metadata of {}", connection))?;
    let metadata = vpn
        .metadata()
        .cloned()
        .with_context(|| format!("no metadata for {}", connection))?;

    let routes = if args.routes.is_empty() {
        settings.default_routes()
    } else {
        NetSlice::from_strings(&args.routes)
    }
    .context("invalid route")?;

    fs::create_dir_all(&settings.client_dir)
        .with_context(|| format!("cannot create {}", settings.client_dir.display()))?;

    let clients = NewClients {
        settings,
        args,
        endpoint: metadata.endpoint().to_string(),
        dns: merge_dns(metadata.dns(), &args.dns),
        routes,
    };
    // Keep the clients added before a failure
    let outcome = args
        .clients
        .iter()
        .try_for_each(|name| clients.add(&mut vpn, name));
    vpn.save(&server_file)
        .context("cannot save server configuration")?;
    outcome
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerEntry {
    pub public_key: String,
    pub client: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSummary {
    pub connection: String,
    pub peers: Vec<PeerEntry>,
}

/// Peers of a connection named after their client files
pub fn summarize(settings: &Settings, connection: &str) -> anyhow::Result<ConnectionSummary> {
    let vpn = Vpn::read(&settings.server_file(connection))
        .with_context(|| format!("cannot read connection {}", connection))?;
    let names: HashMap<String, String> = client_index(&settings.client_dir)
        .into_iter()
        .map(|(name, key)| (key.base64(), name))
        .collect();
    let peers = vpn
        .peer_public_keys()
        .into_iter()
        .map(|public_key| PeerEntry {
            client: names.get(&public_key).cloned(),
            public_key,
        })
        .collect();
    Ok(ConnectionSummary {
        connection: vpn.name().to_string(),
        peers,
    })
}

pub fn show(settings: &Settings, args: &ShowArgs) -> anyhow::Result<()> {
    let connection = checked_name(&args.connection)?;
    let summary = summarize(settings, &connection)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    println!(
        "{}: {}",
        style("interface").green().bold(),
        style(&summary.connection).green()
    );
    for peer in &summary.peers {
        println!(
            "\t{}: {}",
            style(&peer.public_key).yellow(),
            style(peer.client.as_deref().unwrap_or(UNKNOWN_CLIENT)).yellow().bold()
        );
    }
    Ok(())
}

pub fn rm(settings: &Settings, args: &RmArgs) -> anyhow::Result<()> {
    let connection = checked_name(&args.connection)?;
    let server_file = settings.server_file(&connection);
    let mut vpn = Vpn::read(&server_file)
        .with_context(|| format!("cannot read connection {}", connection))?;
    let index = client_index(&settings.client_dir);

    let mut files = Vec::new();
    for target in &args.clients {
        let (key, name) = match index.get(target) {
            Some(key) => (*key, Some(target)),
            None => match Key::from_base64(target) {
                Ok(key) => (key, None),
                Err(e) => {
                    println!("{} {} ({})", style("Not a client name nor a valid key:").yellow().bold(), target, e);
                    continue;
                }
            },
        };
        match vpn.remove_peer_from_public_key(&key) {
            Ok(()) => {
                println!(
                    "{} {} {} {}",
                    style("The client with public key").yellow(),
                    key.base64(),
                    style("has been removed from").yellow(),
                    connection
                );
                if let Some(name) = name {
                    files.push(settings.client_file(name));
                }
            }
            Err(e) => println!("{}", style(e).yellow().bold()),
        }
    }

    vpn.save(&server_file)
        .context("cannot save server configuration")?;

    if !args.keep_file {
        for file in files {
            fs::remove_file(&file).with_context(|| format!("cannot remove {}", file.display()))?;
            info!("Removed {}", file.display());
            println!("{} {}", style("Removed").yellow(), file.display());
        }
    }
    Ok(())
}
