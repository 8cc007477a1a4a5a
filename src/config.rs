use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Landmark audio fingerprinting: index songs and recognize clips.
#[derive(Debug, Parser)]
#[command(name = "tunetrace", version, about)]
pub struct Config {
    /// SQLite URL of the fingerprint store, or `memory` for a throwaway store.
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:tunetrace.db", global = true)]
    pub database_url: String,

    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 5, global = true)]
    pub max_connections: u32,

    #[command(flatten)]
    pub serve: ServeArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// HTTP options, accepted before or after the `serve` subcommand.
#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    #[arg(
        long,
        env = "HOST",
        default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        global = true
    )]
    pub host: IpAddr,

    #[arg(long, env = "PORT", default_value_t = 8080, global = true)]
    pub port: u16,

    /// Largest accepted request body, in bytes.
    #[arg(long, env = "BODY_LIMIT", default_value_t = 64 << 20, global = true)]
    pub body_limit: usize,
}

impl ServeArgs {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the HTTP service (the default).
    Serve,
    /// Fingerprint an audio file and store it under a song name.
    Store { name: String, path: PathBuf },
    /// Find the stored song that best matches an audio file.
    Recognize { path: PathBuf },
    /// Remove a song from the corpus.
    Delete { name: String },
    /// List every stored song.
    List,
}
