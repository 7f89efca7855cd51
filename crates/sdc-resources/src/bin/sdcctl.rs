// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SmartDataCenter resource control CLI
//!
//! Minimal host for the resource adapters: issues one lifecycle operation and
//! polls it to completion.
//!
//! Usage:
//!   sdcctl [--config <path>] [--no-wait] <command> [options]
//!
//! Commands:
//!   types                                   List registered resource types
//!   create --type <t> --stack <name> -p k=v Create a resource
//!   suspend --type <t> --id <id> -p k=v     Stop a machine
//!   resume --type <t> --id <id> -p k=v      Start a machine
//!   delete --type <t> --id <id> -p k=v      Delete a resource
//!   update-script --id <id> --script <s>    Replace a machine's user script
//!   attribute --type <t> --id <id> --name <attr>
//!   status --type <t> --id <id>             Show the current lifecycle status

use std::collections::BTreeMap;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::{debug, info};

use sdc_resources::variant::props;
use sdc_resources::{
    HttpDataCenterFactory, PluginConfig, Properties, ResourceAdapter, UpdateToken, Variant,
    resource_mapping,
};

/// Drive SmartDataCenter machines and networks through their lifecycle.
#[derive(Parser, Debug)]
#[command(name = "sdcctl", version, about, long_about = None)]
struct Cli {
    /// Override configuration file (TOML)
    #[arg(long, global = true, env = "SDC_PLUGIN_CONFIG")]
    config: Option<String>,

    /// Interval between completion polls, in milliseconds
    #[arg(long, global = true, default_value_t = 2000)]
    poll_ms: u64,

    /// Give up waiting after this many seconds
    #[arg(long, global = true, default_value_t = 600)]
    timeout_secs: u64,

    /// Return after issuing the operation instead of polling to completion
    #[arg(long, global = true)]
    no_wait: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered resource types with their properties and attributes
    Types,
    /// Create a resource
    Create {
        #[command(flatten)]
        target: Target,
        /// Stack name used to scope synthesized machine aliases
        #[arg(long, default_value = "")]
        stack: String,
    },
    /// Stop a machine (no-op for networks)
    Suspend {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        id: String,
    },
    /// Start a machine (no-op for networks)
    Resume {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        id: String,
    },
    /// Delete a resource
    Delete {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        id: String,
    },
    /// Replace a machine's user script and ask for it to be rerun
    UpdateScript {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        id: String,
        #[arg(long)]
        script: String,
    },
    /// Resolve a resource attribute
    Attribute {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        id: String,
        /// Attribute name, e.g. network_ip or subnet
        #[arg(long)]
        name: String,
    },
    /// Show the current lifecycle status
    Status {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        id: String,
    },
}

#[derive(Args, Debug)]
struct Target {
    /// Resource type, e.g. SDC::Compute::SmartMachine
    #[arg(long = "type", default_value = "SDC::Compute::SmartMachine")]
    resource_type: String,

    /// Resource property as key=value (repeatable)
    #[arg(short = 'p', long = "property", value_parser = parse_property)]
    properties: Vec<(String, String)>,
}

fn parse_property(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    if key.trim().is_empty() {
        return Err(format!("empty property name in '{}'", raw));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

impl Target {
    fn variant(&self, config: &PluginConfig) -> anyhow::Result<&'static Variant> {
        resource_mapping(config)
            .into_iter()
            .find(|v| v.type_name == self.resource_type)
            .ok_or_else(|| anyhow!("unknown resource type: {}", self.resource_type))
    }

    fn values(&self) -> BTreeMap<String, Value> {
        self.properties
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect()
    }
}

/// Operation whose completion is being polled.
#[derive(Debug)]
enum Phase {
    Create,
    Suspend,
    Resume,
    Delete,
    Update(UpdateToken),
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Create => "create",
            Phase::Suspend => "suspend",
            Phase::Resume => "resume",
            Phase::Delete => "delete",
            Phase::Update(_) => "update",
        }
    }

    async fn poll(&self, adapter: &ResourceAdapter) -> sdc_resources::Result<bool> {
        match self {
            Phase::Create => adapter.poll_create().await,
            Phase::Suspend => adapter.poll_suspend().await,
            Phase::Resume => adapter.poll_resume().await,
            Phase::Delete => adapter.poll_delete().await,
            Phase::Update(token) => adapter.poll_update(token).await,
        }
    }
}

struct Host {
    config: Arc<PluginConfig>,
    factory: Arc<HttpDataCenterFactory>,
    poll_interval: Duration,
    timeout: Duration,
    wait: bool,
}

impl Host {
    fn adapter(
        &self,
        variant: &'static Variant,
        properties: Properties,
        stack: &str,
    ) -> ResourceAdapter {
        ResourceAdapter::new(
            variant,
            self.config.clone(),
            self.factory.clone(),
            properties,
            stack,
        )
    }

    /// Adapter for an existing resource. Only the endpoint property matters
    /// here, so the property set is not validated.
    fn existing(&self, target: &Target, id: &str) -> anyhow::Result<ResourceAdapter> {
        let variant = target.variant(&self.config)?;
        let properties = Properties::from_values(target.values());
        Ok(self.adapter(variant, properties, "").with_resource_id(id))
    }

    async fn wait_for(&self, adapter: &ResourceAdapter, phase: Phase) -> anyhow::Result<()> {
        if !self.wait {
            return Ok(());
        }

        let started = tokio::time::Instant::now();
        loop {
            if phase.poll(adapter).await? {
                info!(phase = phase.name(), "Operation complete");
                return Ok(());
            }
            if started.elapsed() >= self.timeout {
                bail!(
                    "timed out after {:?} waiting for {} to complete",
                    self.timeout,
                    phase.name()
                );
            }
            debug!(phase = phase.name(), "Not complete yet");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn print_types(config: &PluginConfig) {
    for variant in resource_mapping(config) {
        println!("{}", variant.type_name);
        println!("  properties:");
        for property in variant.schema {
            let mut flags = Vec::new();
            if property.required {
                flags.push("required".to_string());
            }
            if let Some(default) = property.default {
                flags.push(format!("default {:?}", default));
            }
            if property.update_allowed {
                flags.push("updatable".to_string());
            }
            println!(
                "    {:<20} {:<8} {} [{}]",
                property.name,
                format!("{:?}", property.kind).to_lowercase(),
                property.description,
                flags.join(", ")
            );
        }
        println!("  attributes:");
        for attribute in variant.attributes {
            println!("    {:<20} {}", attribute.name(), attribute.description());
        }
    }
}

async fn execute_command(host: &Host, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Types => print_types(&host.config),

        Command::Create { target, stack } => {
            let variant = target.variant(&host.config)?;
            let properties = Properties::resolve(variant.schema, target.values())?;
            let mut adapter = host.adapter(variant, properties, &stack);
            let id = adapter.create().await?;
            println!("{}", id);
            host.wait_for(&adapter, Phase::Create).await?;
        }

        Command::Suspend { target, id } => {
            let adapter = host.existing(&target, &id)?;
            adapter.suspend().await?;
            host.wait_for(&adapter, Phase::Suspend).await?;
            println!("Suspended: {}", id);
        }

        Command::Resume { target, id } => {
            let adapter = host.existing(&target, &id)?;
            adapter.resume().await?;
            host.wait_for(&adapter, Phase::Resume).await?;
            println!("Resumed: {}", id);
        }

        Command::Delete { target, id } => {
            let adapter = host.existing(&target, &id)?;
            adapter.delete().await?;
            host.wait_for(&adapter, Phase::Delete).await?;
            println!("Deleted: {}", id);
        }

        Command::UpdateScript { target, id, script } => {
            let mut adapter = host.existing(&target, &id)?;
            let changed = Properties::from_values([(props::USER_SCRIPT, Value::String(script))]);
            match adapter.update(&changed).await? {
                Some(token) => {
                    host.wait_for(&adapter, Phase::Update(token)).await?;
                    println!("Updated: {}", id);
                }
                None => println!("Nothing to update: {}", id),
            }
        }

        Command::Attribute { target, id, name } => {
            let adapter = host.existing(&target, &id)?;
            let value = adapter.resolve_attribute(&name).await?;
            match value {
                Some(Value::String(s)) => println!("{}", s),
                Some(other) => println!("{}", other),
                None => println!("null"),
            }
        }

        Command::Status { target, id } => {
            let adapter = host.existing(&target, &id)?;
            println!("{}", adapter.status().await?.as_str());
        }
    }

    Ok(())
}

fn load_config(path: Option<&str>) -> anyhow::Result<PluginConfig> {
    match path {
        Some(path) if !path.is_empty() => PluginConfig::load(path)
            .with_context(|| format!("failed to load override file {}", path)),
        _ => Ok(PluginConfig::default()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let filter = match "sdc_resources=info".parse() {
        Ok(directive) => tracing_subscriber::EnvFilter::from_default_env().add_directive(directive),
        Err(_) => tracing_subscriber::EnvFilter::from_default_env(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let host = Host {
        factory: Arc::new(HttpDataCenterFactory::new(config.http.timeout())),
        config: Arc::new(config),
        poll_interval: Duration::from_millis(cli.poll_ms),
        timeout: Duration::from_secs(cli.timeout_secs),
        wait: !cli.no_wait,
    };

    match execute_command(&host, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Helper to create args vector from string slice
    fn args(a: &[&str]) -> Vec<String> {
        a.iter().map(|s| s.to_string()).collect()
    }

    fn parse(a: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(args(a))
    }

    #[test]
    fn test_parse_types() {
        let cli = parse(&["sdcctl", "types"]).unwrap();
        assert!(matches!(cli.command, Command::Types));
        assert_eq!(cli.poll_ms, 2000);
        assert_eq!(cli.timeout_secs, 600);
        assert!(!cli.no_wait);
    }

    #[test]
    fn test_parse_no_command() {
        assert!(parse(&["sdcctl"]).is_err());
    }

    #[test]
    fn test_parse_unknown_command() {
        assert!(parse(&["sdcctl", "reboot"]).is_err());
    }

    #[test]
    fn test_parse_create_with_properties() {
        let cli = parse(&[
            "sdcctl",
            "create",
            "--type",
            "SDC::Network::ManagedNetwork",
            "--stack",
            "web",
            "-p",
            "name=backend",
            "--property",
            "owner_count=12",
            "--no-wait",
        ])
        .unwrap();

        assert!(cli.no_wait);
        match cli.command {
            Command::Create { target, stack } => {
                assert_eq!(target.resource_type, "SDC::Network::ManagedNetwork");
                assert_eq!(stack, "web");
                assert_eq!(
                    target.properties,
                    vec![
                        ("name".to_string(), "backend".to_string()),
                        ("owner_count".to_string(), "12".to_string()),
                    ]
                );
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_default_type_is_smart_machine() {
        let cli = parse(&["sdcctl", "suspend", "--id", "vm-1"]).unwrap();
        match cli.command {
            Command::Suspend { target, id } => {
                assert_eq!(target.resource_type, "SDC::Compute::SmartMachine");
                assert_eq!(id, "vm-1");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_suspend_requires_id() {
        assert!(parse(&["sdcctl", "suspend"]).is_err());
    }

    #[test]
    fn test_parse_update_script() {
        let cli = parse(&[
            "sdcctl",
            "update-script",
            "--id",
            "vm-1",
            "--script",
            "#!/bin/sh\necho hi",
            "--poll-ms",
            "100",
        ])
        .unwrap();
        assert_eq!(cli.poll_ms, 100);
        match cli.command {
            Command::UpdateScript { id, script, .. } => {
                assert_eq!(id, "vm-1");
                assert!(script.starts_with("#!/bin/sh"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_attribute() {
        let cli = parse(&[
            "sdcctl",
            "attribute",
            "--type",
            "SDC::Network::Network",
            "--id",
            "net-1",
            "--name",
            "subnet",
        ])
        .unwrap();
        match cli.command {
            Command::Attribute { target, id, name } => {
                assert_eq!(target.resource_type, "SDC::Network::Network");
                assert_eq!(id, "net-1");
                assert_eq!(name, "subnet");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_status() {
        let cli = parse(&["sdcctl", "status", "--id", "vm-1"]).unwrap();
        match cli.command {
            Command::Status { target, id } => {
                assert_eq!(target.resource_type, "SDC::Compute::SmartMachine");
                assert_eq!(id, "vm-1");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_property_rejects_missing_separator() {
        assert!(parse_property("image").is_err());
        assert!(parse_property("=value").is_err());
        assert_eq!(
            parse_property("routes=10.0.0.0/8:10.1.1.1").unwrap(),
            ("routes".to_string(), "10.0.0.0/8:10.1.1.1".to_string())
        );
    }

    #[test]
    fn test_target_rejects_disabled_type() {
        let config = PluginConfig::parse("[resources]\nkvm = false").unwrap();
        let target = Target {
            resource_type: "SDC::Compute::KVM".to_string(),
            properties: Vec::new(),
        };
        assert!(target.variant(&config).is_err());
        assert!(target.variant(&PluginConfig::default()).is_ok());
    }

    #[test]
    fn test_load_config_without_path_gives_defaults() {
        let config = load_config(None).unwrap();
        assert!(config.owner.uuid.is_none());
        assert!(load_config(Some("/nonexistent/sdc.toml")).is_err());
    }

    #[tokio::test]
    async fn test_wait_for_skipped_with_no_wait() {
        let host = Host {
            config: Arc::new(PluginConfig::default()),
            factory: Arc::new(HttpDataCenterFactory::default()),
            poll_interval: Duration::from_millis(1),
            timeout: Duration::from_millis(1),
            wait: false,
        };
        let target = Target {
            resource_type: "SDC::Compute::SmartMachine".to_string(),
            properties: Vec::new(),
        };
        let adapter = host.existing(&target, "vm-1").unwrap();
        host.wait_for(&adapter, Phase::Create).await.unwrap();
    }
}
