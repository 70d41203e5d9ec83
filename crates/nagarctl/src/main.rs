//! Nagar operator CLI.
//!
//! Talks to the nagard HTTP API: daemon/sidecar status, complaint
//! inspection, and the two explicit enrichment resets (retry, stuck-lease
//! reset).

mod client;

use anyhow::Result;
use clap::{Parser, Subcommand};
use client::DaemonClient;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "nagarctl", about = "Operator CLI for the Nagar daemon", version)]
struct Cli {
    /// Daemon base URL
    #[arg(long, default_value = "http://127.0.0.1:7870")]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Daemon, sidecar, and enrichment-queue status
    Status,
    /// Show one complaint in full
    Complaint { id: Uuid },
    /// List complaints whose enrichment failed
    Failed,
    /// Retry enrichment for a failed complaint
    Retry { id: Uuid },
    /// Reset a complaint stuck at `processing` (crashed worker)
    Reset { id: Uuid },
    /// Control the AI sidecar process
    Sidecar {
        #[command(subcommand)]
        action: SidecarAction,
    },
}

#[derive(Subcommand)]
enum SidecarAction {
    Start,
    Stop,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = DaemonClient::new(&cli.url);

    match cli.command {
        Command::Status => {
            let status = client.status().await?;
            println!("nagard v{}", status.version);
            println!("  uptime:    {}s", status.uptime_seconds);
            println!(
                "  sidecar:   {}{}",
                if status.sidecar.running { "running" } else { "stopped" },
                status
                    .sidecar
                    .pid
                    .map(|p| format!(" (pid {})", p))
                    .unwrap_or_default()
            );
            println!(
                "  ai:        {} ({})",
                if status.ai.reachable { "reachable" } else { "unreachable" },
                status.ai.base_url
            );
            println!(
                "  enrichment: {} pending, {} processing, {} done, {} failed",
                status.pending, status.processing, status.done, status.failed
            );
        }
        Command::Complaint { id } => {
            let complaint = client.complaint(id).await?;
            println!("{}", serde_json::to_string_pretty(&complaint)?);
        }
        Command::Failed => {
            let complaints = client.failed_complaints().await?;
            if complaints.is_empty() {
                println!("No failed enrichments");
            }
            for c in complaints {
                match c.enrichment_note {
                    Some(note) => println!("{}  {}  {}  [{}]", c.id, c.ticket, c.title, note),
                    None => println!("{}  {}  {}", c.id, c.ticket, c.title),
                }
            }
        }
        Command::Retry { id } => {
            let response = client.retry(id).await?;
            println!("Enrichment retry queued for {}", response.id);
        }
        Command::Reset { id } => {
            let response = client.reset(id).await?;
            println!("Enrichment reset to pending for {}", response.id);
        }
        Command::Sidecar { action } => match action {
            SidecarAction::Start => {
                client.sidecar("start").await?;
                println!("Sidecar start requested");
            }
            SidecarAction::Stop => {
                client.sidecar("stop").await?;
                println!("Sidecar stopped");
            }
        },
    }
    Ok(())
}
