//! httpdouble - CLI Entry Point

use anyhow::Result;
use clap::Parser;
use httpdouble::{HttpServer, MockServer, MockServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "httpdouble",
    about = "HTTP test double - request stubbing, proxying and request verification",
    version
)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "httpdouble.yaml")]
    config: PathBuf,

    /// Listen address, overrides settings.listen
    #[arg(short, long, value_name = "ADDR")]
    listen: Option<SocketAddr>,

    /// Content root for file bodies, overrides settings.files_root
    #[arg(long, value_name = "DIR")]
    root_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.print_config {
        let default_config = include_str!("../config/default-config.yaml");
        println!("{}", default_config);
        return Ok(());
    }

    // Load configuration
    let mut config = if args.config.exists() {
        info!(path = ?args.config, "Loading configuration");
        MockServerConfig::from_file(&args.config)?
    } else if args.validate {
        anyhow::bail!("Configuration file not found: {:?}", args.config);
    } else {
        info!("Using default configuration (no stubs)");
        MockServerConfig::default()
    };

    if args.validate {
        config.validate()?;
        println!(
            "Configuration is valid ({} stubs defined)",
            config.stubs.len()
        );
        return Ok(());
    }

    if let Some(listen) = args.listen {
        config.settings.listen = listen;
    }
    if let Some(root_dir) = args.root_dir {
        config.settings.files_root = root_dir;
    }

    let listen = config.settings.listen;
    let server = Arc::new(MockServer::from_config(config)?);
    let http = HttpServer::bind(listen, server).await?;

    tokio::select! {
        result = http.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}
