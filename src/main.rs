use std::path::Path;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tunetrace::config::{Command, Config};
use tunetrace::{fingerprint_pipeline, persistance, server, Fingerprint, Matcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::parse();

    let store = persistance::open(&config.database_url, config.max_connections)
        .await
        .with_context(|| format!("failed to open fingerprint store at {}", config.database_url))?;
    let matcher = Matcher::new(store);

    match config.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let app = server::router(matcher, config.serve.body_limit);
            server::serve(config.serve.socket_addr(), app)
                .await
                .context("server error")?;
        }
        Command::Store { name, path } => {
            if name.trim().is_empty() {
                bail!("song name is required");
            }
            let fingerprint = fingerprint_file(&path).await?;
            let hashes = matcher.store_fingerprint(&name, &fingerprint).await?;
            println!("stored {hashes} hashes for {name}");
        }
        Command::Recognize { path } => {
            let fingerprint = fingerprint_file(&path).await?;
            let found = matcher.find_match(&fingerprint).await?;
            if found.is_found() {
                println!("{} (confidence {:.3})", found.song_name, found.similarity);
            } else {
                println!("no match found");
            }
        }
        Command::Delete { name } => {
            matcher.delete_song(&name).await?;
            println!("deleted {name}");
        }
        Command::List => {
            for song in matcher.list_songs().await? {
                println!("{song}");
            }
        }
    }

    Ok(())
}

async fn fingerprint_file(path: &Path) -> anyhow::Result<Fingerprint> {
    let audio_bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    if audio_bytes.is_empty() {
        bail!("{} is empty", path.display());
    }

    let fingerprint = tokio::task::spawn_blocking(move || fingerprint_pipeline(&audio_bytes))
        .await?
        .with_context(|| format!("failed to fingerprint {}", path.display()))?;

    Ok(fingerprint)
}
