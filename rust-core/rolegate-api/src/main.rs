// SPDX-License-Identifier: PMPL-1.0-or-later
//! Rolegate API server binary
//!
//! Starts the HTTP API server over in-memory repositories.

use rolegate_api::ApiConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ApiConfig::from_env();

    tracing::info!(
        "Starting Rolegate API server on {}:{} (identity header: {})",
        config.host,
        config.port,
        config.identity_header
    );

    rolegate_api::serve(config).await?;

    Ok(())
}
