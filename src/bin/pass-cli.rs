use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};
use serde_json::json;

use edge_pass::issuer::Issuer;
use edge_pass::token::{signer, PassToken};

#[derive(Parser)]
#[command(name = "pass-cli")]
#[command(about = "Operator CLI for the pass token services", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mint a pass header value for the given request metadata
    Mint {
        #[arg(short, long)]
        secret: String,

        #[arg(short, long, default_value = "")]
        user_agent: String,

        #[arg(short, long, default_value = "")]
        request_id: String,
    },
    /// Check a pass header value offline (grammar, freshness, signature)
    Check {
        #[arg(short, long)]
        secret: String,

        /// The raw header value to check
        token: String,

        #[arg(short, long, default_value = "")]
        user_agent: String,

        #[arg(short, long, default_value = "")]
        request_id: String,

        /// Freshness window in seconds
        #[arg(short = 'w', long, default_value_t = 28_800)]
        freshness_window_secs: u64,
    },
    /// Send a probe request to a running service and report the outcome
    Probe {
        #[arg(long, default_value = "http://localhost:8080")]
        url: String,

        #[arg(short, long, default_value = "pass-cli-probe")]
        user_agent: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Mint {
            secret,
            user_agent,
            request_id,
        } => {
            let token = Issuer::new(secret.as_bytes()).issue(&user_agent, &request_id);
            println!("{token}");
        }
        Commands::Check {
            secret,
            token,
            user_agent,
            request_id,
            freshness_window_secs,
        } => {
            let verdict = check_token(
                &secret,
                &token,
                &user_agent,
                &request_id,
                freshness_window_secs,
            );
            println!("{}", serde_json::to_string_pretty(&verdict)?);
        }
        Commands::Probe { url, user_agent } => {
            let client = reqwest::Client::new();
            let res = client
                .get(&url)
                .header(reqwest::header::USER_AGENT, &user_agent)
                .send()
                .await?;
            let status = res.status().as_u16();
            let body = res.text().await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "status": status, "body": body }))?
            );
        }
    }

    Ok(())
}

/// Offline gate: everything the origin checks except the nonce store.
fn check_token(
    secret: &str,
    raw: &str,
    user_agent: &str,
    request_id: &str,
    freshness_window_secs: u64,
) -> serde_json::Value {
    let token = match PassToken::from_str(raw) {
        Ok(token) => token,
        Err(e) => return json!({ "valid": false, "reason": format!("malformed token: {e}") }),
    };

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    if now.abs_diff(token.timestamp) > freshness_window_secs {
        return json!({ "valid": false, "reason": "stale token" });
    }

    let input = signer::signing_input(user_agent, request_id, token.timestamp, &token.nonce);
    if !signer::verify(secret.as_bytes(), &input, &token.signature) {
        return json!({ "valid": false, "reason": "signature mismatch" });
    }

    json!({ "valid": true, "timestamp": token.timestamp, "nonce": token.nonce })
}
