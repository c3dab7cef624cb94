use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the key-value server, accepting HTTP connections.
    Server(ServerArgs),
    /// Send a single request to a running server.
    Client(ClientArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Socket address the server should bind to. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub addr: SocketAddr,

    /// File the store is snapshotted to.
    #[arg(long, default_value = "database.json")]
    pub snapshot_path: PathBuf,

    /// Seconds between periodic snapshots.
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u64).range(1..))]
    pub snapshot_interval: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Base URL of the server to send the request to.
    #[arg(long, default_value = "http://localhost:8080")]
    pub host: String,

    /// The operation to perform.
    #[arg(long, short = 'm')]
    pub method: Method,

    /// The key the operation applies to.
    #[arg(long)]
    pub key: String,

    /// The value stored by `put`. Not valid for `get` or `delete`.
    #[arg(long)]
    pub value: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Delete,
}
