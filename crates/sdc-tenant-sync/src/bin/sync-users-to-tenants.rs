// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Sync identity-service users to per-user tenants.
//!
//! Usage:
//!   sync-users-to-tenants [--os-token <token>] [--os-endpoint <url>] [--dry-run]
//!
//! Credentials default to OS_SERVICE_TOKEN / SERVICE_TOKEN and
//! OS_SERVICE_ENDPOINT / SERVICE_ENDPOINT.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use tracing::{error, info};

use sdc_tenant_sync::{
    Credentials, IdentityError, KeystoneClient, Reconciler, SyncConfig, SyncError,
};

/// Give every user a same-named tenant with the configured roles.
#[derive(Parser, Debug)]
#[command(name = "sync-users-to-tenants", version, about, long_about = None)]
struct Cli {
    /// Admin token to use instead of env[OS_SERVICE_TOKEN]
    #[arg(long = "os-token")]
    token: Option<String>,

    /// Identity admin endpoint to use instead of env[OS_SERVICE_ENDPOINT]
    #[arg(long = "os-endpoint")]
    endpoint: Option<String>,

    /// Role to grant (repeatable; replaces the default role set)
    #[arg(long = "grant-role")]
    grant_roles: Vec<String>,

    /// Additional user name to skip (repeatable)
    #[arg(long = "ignore-user")]
    ignore_users: Vec<String>,

    /// Report what would change without changing anything
    #[arg(long)]
    dry_run: bool,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

impl Cli {
    fn sync_config(&self) -> SyncConfig {
        let mut config = SyncConfig::new()
            .with_ignored_users(self.ignore_users.iter().cloned())
            .with_dry_run(self.dry_run);
        if !self.grant_roles.is_empty() {
            config = config.with_roles(self.grant_roles.iter().cloned());
        }
        config
    }
}

fn usage() -> String {
    Cli::command().render_help().to_string()
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let filter = match "sdc_tenant_sync=info".parse() {
        Ok(directive) => tracing_subscriber::EnvFilter::from_default_env().add_directive(directive),
        Err(_) => tracing_subscriber::EnvFilter::from_default_env(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let Some(credentials) = Credentials::resolve(cli.token.clone(), cli.endpoint.clone()) else {
        println!("{}", usage());
        return ExitCode::FAILURE;
    };
    let credentials = credentials.with_timeout(Duration::from_secs(cli.timeout_secs));

    let client = match KeystoneClient::new(&credentials) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match client.verify().await {
        Ok(()) => {}
        Err(IdentityError::Unauthorized) => {
            eprintln!("Invalid OpenStack Identity credentials.");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let reconciler = Reconciler::new(Arc::new(client), cli.sync_config());
    match reconciler.run().await {
        Ok(report) => {
            info!(
                users = report.users.len(),
                actions = report.actions.len(),
                dry_run = report.dry_run,
                "Sync complete"
            );
            ExitCode::SUCCESS
        }
        Err(SyncError::Identity(IdentityError::Unauthorized)) => {
            eprintln!("Invalid OpenStack Identity credentials.");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("Sync failed: {}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
