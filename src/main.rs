use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast;

use opslink::auth::SessionState;
use opslink::feed::LogEntry;
use opslink::{config, OpslinkClient};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "opslink=info".into()),
        ))
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();
    let client = OpslinkClient::new(cfg).context("initializing client")?;

    match args.command {
        cli::Commands::Login { email, password } => {
            let user = client.login(&email, &password).await?;
            println!("logged in as {} ({})", user.name, user.role);
        }
        cli::Commands::Logout => {
            client.logout().await;
            println!("logged out");
        }
        cli::Commands::Tail => run_tail(&client).await?,
        cli::Commands::ClearHistory => {
            client.clear_history(None).await?;
            println!("log history cleared");
        }
    }

    Ok(())
}

async fn run_tail(client: &OpslinkClient) -> anyhow::Result<()> {
    let (feed, mut errors) = client.start_feed().await;
    let mut updates = feed.session().subscribe();
    let mut session_rx = client.session().subscribe();

    loop {
        tokio::select! {
            entry = updates.recv() => match entry {
                Ok(e) => print_entry(&e),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "rendering fell behind the feed");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            Some(err) = errors.recv() => {
                tracing::warn!("feed error: {}", err);
            }
            _ = session_rx.changed() => {
                let state = session_rx.borrow_and_update().clone();
                if let SessionState::Unauthenticated { reason } = state {
                    eprintln!("session ended: {}", reason);
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    feed.detach();
    Ok(())
}

fn print_entry(entry: &LogEntry) {
    let actor = entry.actor.as_deref().unwrap_or("-");
    let duration = entry
        .duration_ms
        .map(|ms| format!(" ({}ms)", ms))
        .unwrap_or_default();
    println!(
        "{} [{:?}] {} — {}{}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
        entry.level,
        actor,
        entry.message,
        duration
    );
}
