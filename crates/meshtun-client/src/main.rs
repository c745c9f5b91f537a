// ============================================
// File: crates/meshtun-client/src/main.rs
// ============================================
//! # meshtun CLI Entry Point
//!
//! ## Creation Reason
//! Offline tooling around the client library: route computation,
//! interface dump inspection and config validation.
//!
//! ## Main Functionality
//! - CLI argument parsing with clap
//! - Logging initialization with tracing
//! - Subcommand execution
//!
//! ## Usage
//! ```bash
//! # Routes for a full tunnel that leaves the LAN alone
//! meshtun routes --allow 0.0.0.0/0 --allow ::/0 --exclude 192.168.0.0/16
//!
//! # Inspect an interface dump captured from a device
//! meshtun interfaces ifaces.json
//!
//! # Validate a config file
//! meshtun validate --config /etc/meshtun/client.toml
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use meshtun_client::interfaces::InterfaceAddr;
use meshtun_client::{parse_interfaces, ClientConfig};
use meshtun_routes::{parse_prefix, RouteCalculator};

// ============================================
// CLI Definition
// ============================================

/// meshtun client tools
#[derive(Parser, Debug)]
#[command(name = "meshtun")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute the minimal route prefixes for allowed minus excluded
    Routes {
        /// Prefix to route (repeatable, e.g. 0.0.0.0/0)
        #[arg(short, long = "allow", value_name = "PREFIX", required = true)]
        allow: Vec<String>,

        /// Prefix to keep off the tunnel (repeatable)
        #[arg(short, long = "exclude", value_name = "PREFIX")]
        exclude: Vec<String>,
    },

    /// Parse an interface dump (text or JSON) and print a summary
    Interfaces {
        /// File containing the dump
        file: PathBuf,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/meshtun/client.toml")]
        config: PathBuf,
    },
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    let result = match cli.command {
        Commands::Routes { allow, exclude } => cmd_routes(&allow, &exclude),
        Commands::Interfaces { file } => cmd_interfaces(file).await,
        Commands::Validate { config } => cmd_validate(config).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

// ============================================
// Commands
// ============================================

/// Prints IPv4 then IPv6 prefixes, one per line.
fn cmd_routes(allow: &[String], exclude: &[String]) -> anyhow::Result<()> {
    let mut calc = RouteCalculator::default();
    for prefix in allow {
        calc = calc.allow(parse_prefix(prefix).with_context(|| format!("--allow {prefix}"))?);
    }
    for prefix in exclude {
        calc = calc.exclude(parse_prefix(prefix).with_context(|| format!("--exclude {prefix}"))?);
    }

    for prefix in calc.calculate() {
        println!("{prefix}");
    }
    Ok(())
}

/// Prints one line per interface and the parse statistics.
async fn cmd_interfaces(path: PathBuf) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;

    let (ifaces, stats) = parse_interfaces(&content)?;

    for iface in &ifaces {
        let flags = &iface.flags;
        let state = if flags.up { "up" } else { "down" };
        let addrs: Vec<String> = iface.addrs.iter().map(InterfaceAddr::to_string).collect();

        println!(
            "{:<16} #{:<4} mtu {:<6} {:<4}{}{} {}",
            iface.name,
            iface.index,
            iface.mtu,
            state,
            if flags.loopback { " loopback" } else { "" },
            if flags.point_to_point { " p2p" } else { "" },
            addrs.join(" ")
        );
    }

    println!();
    println!("{stats}");
    Ok(())
}

/// Validates configuration file.
async fn cmd_validate(config_path: PathBuf) -> anyhow::Result<()> {
    if !config_path.exists() {
        println!("⚠️  Config file not found: {}", config_path.display());
        println!("   Client will use default values.");
        return Ok(());
    }

    let config = ClientConfig::load(&config_path).await?;

    println!("✅ Configuration is valid");
    println!();
    println!("TUN:");
    println!("   Default MTU:       {}", config.tun.default_mtu);
    println!("   Seamless handover: {}", config.tun.seamless_handover);
    println!("   Queue depth:       {}", config.tun.queue_depth);
    println!();
    println!("DNS:");
    println!("   Avoid empty DNS:   {}", config.dns.avoid_empty_dns);
    for server in &config.dns.fallback_nameservers {
        println!("   Fallback:          {server}");
    }
    println!();
    println!("Logging:");
    println!("   Level:             {}", config.logging.level);
    println!();

    Ok(())
}

// ============================================
// Helper Functions
// ============================================

/// Initializes the tracing subscriber.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .ok();
}
