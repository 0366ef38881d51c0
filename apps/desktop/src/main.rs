use anyhow::Result;
use clap::Parser;
use client_core::{ServiceConfig, SessionEvent, VoteSession};
use shared::domain::CandidateId;

#[derive(Parser, Debug)]
struct Args {
    /// Vote service base url, e.g. http://127.0.0.1:8090
    #[arg(long)]
    server_url: String,
    /// Cast one vote for this candidate id and exit.
    #[arg(long)]
    vote: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let config = ServiceConfig::new(args.server_url);
    let session = VoteSession::new(config);

    if let Some(id) = args.vote {
        session.cast_vote(&CandidateId::new(id)).await?;
        println!("vote submitted");
        return Ok(());
    }

    let mut events = session.subscribe_events();
    session.start().await?;

    for candidate in session.tallies().await {
        println!(
            "{:<14} {:<24} {}",
            candidate.id, candidate.name, candidate.votes
        );
    }

    loop {
        match events.recv().await {
            Ok(SessionEvent::TallyUpdated { id, votes }) => {
                let label = session
                    .tallies()
                    .await
                    .into_iter()
                    .find(|candidate| candidate.id == id)
                    .map(|candidate| candidate.name)
                    .unwrap_or_else(|| id.to_string());
                println!("{label}: {votes}");
            }
            Ok(SessionEvent::StreamEnded(reason)) => {
                println!("live updates ended: {reason}");
                break;
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }

    session.close().await;
    Ok(())
}
