use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use reqwest::{Client, Response};
use serde_json::json;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "status-tracker-cli")]
#[command(about = "Status Tracker CLI", version, long_about = None)]
struct Cli {
    #[arg(short, long, env = "STATUS_TRACKER_URL", default_value = "http://localhost:8080")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List unresolved incidents across providers
    Active,

    /// List incidents touched within the last hours
    Recent {
        #[arg(short, long, default_value = "openai")]
        provider: String,

        #[arg(short = 'H', long, default_value = "24")]
        hours: i64,
    },

    /// Show a single incident
    Get {
        provider: String,

        #[arg(value_name = "SERVICE_ID")]
        service_id: String,
    },

    /// Show the status change audit trail of a provider
    Changes { provider: String },

    /// List a provider's components
    Components { provider: String },

    /// List components that are not operational
    Degraded,

    /// Provider reachability
    Providers,

    /// Inspect or toggle the polling fallback
    Polling {
        #[arg(value_enum)]
        action: PollingAction,

        #[arg(short, long)]
        reason: Option<String>,
    },

    /// Post a saved webhook payload to the server
    ReplayWebhook {
        provider: String,

        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(short, long)]
        signature: Option<String>,
    },

    /// Check server health
    Health,
}

#[derive(Clone, Copy, ValueEnum)]
enum PollingAction {
    Enable,
    Disable,
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let base = cli.endpoint.trim_end_matches('/').to_string();

    let response = match cli.command {
        Commands::Active => client.get(format!("{}/status/active", base)).send().await?,

        Commands::Recent { provider, hours } => {
            client
                .get(format!("{}/status/recent", base))
                .query(&[("provider", provider), ("hours", hours.to_string())])
                .send()
                .await?
        }

        Commands::Get {
            provider,
            service_id,
        } => {
            client
                .get(format!("{}/status/incidents/{}/{}", base, provider, service_id))
                .send()
                .await?
        }

        Commands::Changes { provider } => {
            client
                .get(format!("{}/status/changes/{}", base, provider))
                .send()
                .await?
        }

        Commands::Components { provider } => {
            client
                .get(format!("{}/components/{}", base, provider))
                .send()
                .await?
        }

        Commands::Degraded => client.get(format!("{}/components/degraded", base)).send().await?,

        Commands::Providers => client.get(format!("{}/health/providers", base)).send().await?,

        Commands::Polling { action, reason } => {
            let url = format!("{}/control/polling", base);
            match action {
                PollingAction::Status => client.get(&url).send().await?,
                PollingAction::Enable | PollingAction::Disable => {
                    client
                        .post(&url)
                        .json(&json!({
                            "enabled": matches!(action, PollingAction::Enable),
                            "reason": reason,
                        }))
                        .send()
                        .await?
                }
            }
        }

        Commands::ReplayWebhook {
            provider,
            file,
            signature,
        } => {
            let payload = tokio::fs::read(&file)
                .await
                .with_context(|| format!("reading webhook payload {}", file.display()))?;
            let mut request = client
                .post(format!("{}/webhook/{}", base, provider))
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(payload);
            if let Some(signature) = signature {
                request = request.header(status_tracker::providers::SIGNATURE_HEADER, signature);
            }
            request.send().await?
        }

        Commands::Health => client.get(format!("{}/health", base)).send().await?,
    };

    print_response(response).await
}

async fn print_response(response: Response) -> Result<()> {
    let status = response.status();
    let body: serde_json::Value = response
        .json()
        .await
        .context("server returned a non-JSON body")?;
    println!("{}", serde_json::to_string_pretty(&body)?);

    if !status.is_success() {
        bail!("server responded with {}", status);
    }
    Ok(())
}
