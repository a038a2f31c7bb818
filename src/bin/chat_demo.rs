//! Line-based chat server on top of the readiness loop.
//!
//! Connect with `nc 127.0.0.1 12345`, answer with a name, then chat.

use anyhow::Context;
use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tcp_reactor::chat::ChatRoom;
use tcp_reactor::{Endpoint, Server, ServerError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "chat-demo", about = "Single-threaded TCP chat server")]
struct Args {
    /// Port shared by every listening address.
    #[arg(short, long, default_value_t = 12345)]
    port: u16,

    /// Addresses to listen on. The first one is required to bind, the rest are best effort.
    #[arg(short, long = "bind", default_values_t = [
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(Ipv6Addr::LOCALHOST),
    ])]
    addresses: Vec<IpAddr>,

    /// Events returned by a single poll cycle, at most.
    #[arg(long, default_value_t = tcp_reactor::builder::DEFAULT_EVENT_CAPACITY)]
    event_capacity: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut endpoints = args
        .addresses
        .iter()
        .map(|address| Endpoint::new(*address, args.port));

    let primary = endpoints
        .next()
        .context("at least one --bind address is required")?;

    let mut server = Server::builder()
        .event_capacity(args.event_capacity)
        .build(primary)
        .with_context(|| format!("unable to start server on {primary}"))?;

    for endpoint in endpoints {
        if let Err(error) = server.add_local_endpoint(endpoint) {
            warn!(%endpoint, %error, "skipping endpoint");
        }
    }

    server.set_delegate(ChatRoom::new());
    info!("server started");

    loop {
        match server.handle_events() {
            Ok(()) => {}
            Err(error @ ServerError::UnableToAcceptConnection { .. }) => {
                warn!(%error, "accept failed");
            }
            Err(error) => return Err(error.into()),
        }
    }
}
