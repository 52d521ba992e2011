//! Pelotari node binary

mod cli;

use clap::Parser;
use tracing::{error, info, warn};

use pelotari::config::{self, NodeConfig};
use pelotari::error::{Error, Result};
use pelotari::{logging, net, version, CommsManager, Snapshot};

use crate::cli::{Cli, Commands, ConfigSubcommand};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = dispatch(cli) {
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Version => {
            version::print_version();
            Ok(())
        }
        Commands::Config { subcommand } => handle_config_command(subcommand),
        Commands::Interfaces { interface } => show_interface(interface.as_deref()),
        Commands::Run {
            config,
            max_peers,
            interval_ms,
            json,
        } => {
            let mut cfg = NodeConfig::load(config.as_deref())?;
            if let Some(n) = max_peers {
                cfg.protocol.max_peers = n;
            }
            if let Some(ms) = interval_ms {
                cfg.protocol.broadcast_interval_ms = ms;
            }
            cfg.validate()?;

            // Held until exit so buffered file logs are flushed
            let _log_guards = logging::init_logging(&cfg.logging, cli.verbose, cli.quiet)?;
            run_node(cfg, json).inspect_err(|e| error!("Node failed: {}", e.format_for_log()))
        }
    }
}

/// Run discovery until Ctrl+C
fn run_node(config: NodeConfig, json: bool) -> Result<()> {
    let build = version::BuildInfo::current();
    info!(version = %build.full_version(), target = %build.target, "Starting pelotari");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(num_cpus::get().clamp(1, 4))
        .thread_name("pelotari")
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create async runtime: {}", e)))?;

    runtime.block_on(async_node_main(config, json))
}

async fn async_node_main(config: NodeConfig, json: bool) -> Result<()> {
    let manager = CommsManager::udp(config.protocol_config()?, &config.network)?;
    let mut membership = manager.subscribe();

    manager.start().await;

    let shutdown_signal = tokio::signal::ctrl_c();
    tokio::pin!(shutdown_signal);

    loop {
        tokio::select! {
            result = &mut shutdown_signal => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl+C, shutting down");
                }
                info!("Shutdown signal received");
                break;
            }

            snapshot = membership.next() => {
                match snapshot {
                    Some(peers) => print_peers(&peers, json)?,
                    None => break,
                }
            }
        }
    }

    manager.close().await;
    info!(peers = manager.peer_count(), "Node stopped");
    Ok(())
}

fn print_peers(peers: &Snapshot, json: bool) -> Result<()> {
    if json {
        let line = serde_json::to_string(&peers[..])
            .map_err(|e| Error::Internal(format!("Failed to encode snapshot: {}", e)))?;
        println!("{}", line);
        return Ok(());
    }

    println!("Peers ({}):", peers.len());
    for peer in peers.iter() {
        println!(
            "  {:<15}  since {}",
            peer.ip,
            peer.first_seen.format("%H:%M:%S")
        );
    }
    Ok(())
}

fn show_interface(interface: Option<&str>) -> Result<()> {
    let iface = net::private_ipv4(interface)?;
    println!("Interface:  {}", iface.name);
    println!("Address:    {}", iface.ip);
    println!("Netmask:    {}", iface.netmask);
    println!("Broadcast:  {}", iface.broadcast());
    Ok(())
}

fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = NodeConfig::load(config.as_deref())?;
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        ConfigSubcommand::Init { path, force } => {
            let written = config::init_config(path.as_deref(), force)?;
            println!("Configuration written to {}", written.display());
        }
        ConfigSubcommand::Validate { config } => {
            NodeConfig::load(config.as_deref())?;
            println!("Configuration is valid.");
        }
    }

    Ok(())
}
