//! `ccr`: a thin CLI client for the Control API (spec §9 Open Question (b)). The
//! routing core lives entirely behind the HTTP API; this binary only formats
//! requests to it and prints the JSON response.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ccr", about = "Claude Code Router control client")]
struct Cli {
    #[arg(long, env = "CCR_API_BASE", default_value = "http://127.0.0.1:7601")]
    api_base: String,

    #[arg(long, env = "CCR_API_KEY")]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show current status and provider health.
    Status,
    /// Validate the currently loaded configuration.
    Validate,
    /// Reload the configuration from disk.
    Reload,
    /// Roll back to a previous config version.
    Rollback { version_id: String },
    /// Switch the active router group.
    Switch { group_id: String },
    /// List recorded config versions.
    Versions,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let response = match cli.command {
        Command::Status => get(&client, &cli, "/config/status").await?,
        Command::Validate => {
            let current = get(&client, &cli, "/config").await?;
            post(&client, &cli, "/config/validate", &current).await?
        }
        Command::Reload => post(&client, &cli, "/config/hot-reload", &()).await?,
        Command::Rollback { version_id } => {
            post(
                &client,
                &cli,
                "/config/rollback",
                &serde_json::json!({ "versionId": version_id }),
            )
            .await?
        }
        Command::Switch { group_id } => {
            post(
                &client,
                &cli,
                "/router-groups/switch",
                &serde_json::json!({ "groupId": group_id }),
            )
            .await?
        }
        Command::Versions => get(&client, &cli, "/config/versions").await?,
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn get(client: &reqwest::Client, cli: &Cli, path: &str) -> Result<serde_json::Value, anyhow::Error> {
    let mut request = client.get(format!("{}{}", cli.api_base, path));
    if let Some(key) = &cli.api_key {
        request = request.bearer_auth(key);
    }
    Ok(request.send().await?.json().await?)
}

async fn post(
    client: &reqwest::Client,
    cli: &Cli,
    path: &str,
    body: &impl serde::Serialize,
) -> Result<serde_json::Value, anyhow::Error> {
    let mut request = client.post(format!("{}{}", cli.api_base, path)).json(body);
    if let Some(key) = &cli.api_key {
        request = request.bearer_auth(key);
    }
    Ok(request.send().await?.json().await?)
}
