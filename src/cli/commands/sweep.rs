use std::time::Duration;

use anyhow::Context;
use clap::Args;
use serde_json::Value;

use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;

#[derive(Args)]
pub struct SweepArgs {
    #[arg(help = "imminent, upcoming, long-range, deadline or force-close")]
    pub tier: String,

    #[arg(long, env = "TENDER_API_URL", default_value = "http://localhost:3000", help = "Server base URL")]
    pub url: String,

    #[arg(long, env = "TENDER_API_TOKEN", help = "Bearer token with an elevated role")]
    pub token: String,
}

pub async fn handle(args: SweepArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let endpoint = format!("{}/api/root/reminders/{}", args.url.trim_end_matches('/'), args.tier);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(300))
        .build()
        .context("failed to build HTTP client")?;

    let response = client
        .post(&endpoint)
        .bearer_auth(&args.token)
        .send()
        .await
        .with_context(|| format!("request to {} failed", endpoint))?;

    let status = response.status();
    let body: Value = response.json().await.context("server returned a non-JSON body")?;

    if status.is_success() {
        let report = body.get("data").cloned().unwrap_or(Value::Null);
        output_success(&output_format, &format!("{} sweep finished", args.tier), Some(report))
    } else {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("sweep request failed")
            .to_string();
        let code = body.get("code").and_then(Value::as_str);
        output_error(&output_format, &message, code)?;
        anyhow::bail!("server answered {}", status)
    }
}
