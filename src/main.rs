use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use ringkv::Node;

#[derive(Parser, Debug)]
#[command(name = "ringkv")]
#[command(author, version, about = "A Chord distributed hash table peer", long_about = None)]
struct Args {
    /// Address this node listens on, host:port. Also determines its ring id.
    #[arg(long)]
    address: String,

    /// Address of an existing node to join. Omit to start a new ring.
    #[arg(long)]
    join: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let node = Node::new(args.address.as_str());
    let handle = match &args.join {
        Some(peer) => {
            info!(peer = %peer, "joining an existing ring");
            node.join(peer).await?
        }
        None => {
            info!("no join address provided, starting a new ring");
            node.bootstrap().await?
        }
    };

    tokio::signal::ctrl_c().await?;
    info!("received SIGINT, shutting down");
    handle.stop().await;
    Ok(())
}
