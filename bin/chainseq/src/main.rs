//! chainseq deploys a set of interdependent smart contracts in dependency order and writes
//! their addresses for client applications.

mod cli;

use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use chainseq_deploy::{
    ConstructorArg, DEPLOY_CONFIG_FILENAME, DeployConfig, DeploymentRecord, DeploymentUnit,
    FileSink, HardhatArtifacts, JsonRpcBackend, RunError, Sequencer, resolve,
};
use clap::Parser;
use comfy_table::{Table, presets::UTF8_FULL};
use figment::{
    Figment, Provider,
    providers::{Env, Format, Serialized, Toml},
};

use cli::{Cli, Command, DeployArgs};

/// Process exit codes. Every unit was deployed and recorded.
const EXIT_SUCCESS: u8 = 0;
/// A unit failed to deploy, or the node could not be reached.
const EXIT_DEPLOYMENT_FAILED: u8 = 1;
/// The plan was rejected or the configuration is invalid. Nothing was deployed.
const EXIT_INVALID_PLAN: u8 = 2;
/// Every unit was deployed but the address map could not be written.
const EXIT_NOT_PERSISTED: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "Invalid configuration");
            return ExitCode::from(EXIT_INVALID_PLAN);
        }
    };

    let code = match cli.command {
        Command::Plan => plan(&config),
        Command::Deploy(args) => deploy(apply_overrides(config, args)).await,
        Command::Init { path } => match config.save_to_file(&path) {
            Ok(()) => EXIT_SUCCESS,
            Err(err) => {
                tracing::error!(error = %format!("{err:#}"), "Failed to write configuration");
                EXIT_INVALID_PLAN
            }
        },
    };
    ExitCode::from(code)
}

/// Layer the configuration: defaults, then the config file, then `CHAINSEQ_*` variables.
fn load_config(path: Option<&Path>) -> Result<DeployConfig> {
    let figment = match path {
        // An explicit path must exist.
        Some(path) => layered(Serialized::defaults(DeployConfig::load_from_file(path)?)),
        None => layered(Toml::file(DEPLOY_CONFIG_FILENAME)),
    };

    figment
        .extract()
        .context("Failed to merge configuration layers")
}

fn layered(file: impl Provider) -> Figment {
    Figment::from(Serialized::defaults(DeployConfig::default()))
        .merge(file)
        .merge(Env::prefixed("CHAINSEQ_").split("__"))
}

fn apply_overrides(mut config: DeployConfig, args: DeployArgs) -> DeployConfig {
    if let Some(rpc_url) = args.rpc_url {
        config.network.rpc_url = rpc_url;
    }
    if let Some(from) = args.from {
        config.network.from = Some(from);
    }
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }
    if let Some(artifacts_dir) = args.artifacts_dir {
        config.artifacts_dir = artifacts_dir;
    }
    if let Some(confirmations) = args.confirmations {
        config.network.confirmations = confirmations;
    }
    config
}

fn plan(config: &DeployConfig) -> u8 {
    match resolve(config.units()) {
        Ok(order) => {
            println!("{}", plan_table(&order));
            EXIT_SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "Deployment plan rejected");
            EXIT_INVALID_PLAN
        }
    }
}

async fn deploy(config: DeployConfig) -> u8 {
    let units = config.units();

    // Reject a broken plan before touching the network.
    if let Err(err) = resolve(units.clone()) {
        tracing::error!(error = %err, "Deployment plan rejected, nothing was deployed");
        return EXIT_INVALID_PLAN;
    }

    let backend = match JsonRpcBackend::connect(&config.network).await {
        Ok(backend) => backend,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "Failed to connect to node");
            return EXIT_DEPLOYMENT_FAILED;
        }
    };

    let artifacts = HardhatArtifacts::new(&config.artifacts_dir);
    let sink = FileSink::new(&config.output_dir);

    tracing::info!(
        units = units.len(),
        output_dir = %config.output_dir.display(),
        "Starting deployment"
    );

    let result = Sequencer::new(&artifacts, &backend, &sink)
        .recorder(config.recorder())
        .run(units)
        .await;

    match result {
        Ok(report) => {
            println!("{}", records_table(&report.records));
            tracing::info!(
                path = %output_path(&config, config.recorder().addresses_key()).display(),
                "Contract addresses saved"
            );
            EXIT_SUCCESS
        }
        Err(err) => {
            if !err.records().is_empty() {
                println!("{}", records_table(err.records()));
            }
            tracing::error!(error = %err, "Deployment did not complete");
            if let Some(persist_error) = err.persist_error() {
                tracing::error!(error = %persist_error, "Deployment result was not saved");
            }
            exit_code(&err)
        }
    }
}

fn exit_code(err: &RunError) -> u8 {
    match err {
        RunError::Resolve(_) | RunError::InternalOrdering { .. } => EXIT_INVALID_PLAN,
        RunError::Deployment { .. } => EXIT_DEPLOYMENT_FAILED,
        RunError::NotPersisted { .. } => EXIT_NOT_PERSISTED,
    }
}

fn output_path(config: &DeployConfig, key: &str) -> PathBuf {
    config.output_dir.join(key)
}

fn plan_table(order: &[DeploymentUnit]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["#", "Unit", "Depends on", "Constructor"]);

    for (position, unit) in order.iter().enumerate() {
        let dependencies = unit
            .dependencies
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let constructor = unit
            .constructor_template
            .iter()
            .map(|arg| match arg {
                ConstructorArg::AddressOf(name) => format!("address_of({name})"),
                ConstructorArg::Literal(value) => format!("{value:?}"),
            })
            .collect::<Vec<_>>()
            .join(", ");

        table.add_row(vec![
            (position + 1).to_string(),
            unit.name.clone(),
            dependencies,
            constructor,
        ]);
    }
    table
}

fn records_table(records: &[DeploymentRecord]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Unit", "Status", "Transaction", "Address", "Error"]);

    for record in records {
        table.add_row(vec![
            record.unit_name().to_string(),
            record.status().to_string(),
            record.tx_hash().map(|hash| hash.to_string()).unwrap_or_default(),
            record
                .address()
                .map(|address| address.to_checksum(None))
                .unwrap_or_default(),
            record.error().unwrap_or_default().to_string(),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainseq_deploy::{
        AbiValue, AddressMap, DeploymentError, InternalOrderingError, PersistError, ResolveError,
        SinkError,
    };
    use tempdir::TempDir;

    #[test]
    fn test_file_layer_overrides_defaults() {
        let temp_dir = TempDir::new("chainseq-cli").unwrap();
        let path = temp_dir.path().join(DEPLOY_CONFIG_FILENAME);
        std::fs::write(
            &path,
            r#"
            output_dir = "deployed"

            [network]
            confirmations = 2
            "#,
        )
        .unwrap();

        let config = load_config(Some(temp_dir.path())).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("deployed"));
        assert_eq!(config.network.confirmations, 2);
        assert_eq!(config.artifacts_dir, PathBuf::from("artifacts"));
        assert_eq!(config.units.len(), 2);
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let temp_dir = TempDir::new("chainseq-cli").unwrap();
        assert!(load_config(Some(&temp_dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_cli_overrides_win() {
        let args = DeployArgs {
            rpc_url: Some("http://node:8545".parse().unwrap()),
            confirmations: Some(5),
            output_dir: Some(PathBuf::from("out")),
            ..Default::default()
        };
        let config = apply_overrides(DeployConfig::default(), args);

        assert_eq!(config.network.rpc_url.as_str(), "http://node:8545/");
        assert_eq!(config.network.confirmations, 5);
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.artifacts_dir, PathBuf::from("artifacts"));
    }

    #[test]
    fn test_exit_codes() {
        let resolve = RunError::Resolve(ResolveError::Cycle {
            members: vec!["A".to_string(), "B".to_string()],
        });
        assert_eq!(exit_code(&resolve), EXIT_INVALID_PLAN);

        let deployment = RunError::Deployment {
            unit: "BugBounty".to_string(),
            error: DeploymentError::Submission(anyhow::anyhow!("insufficient funds")),
            deployed: AddressMap::default(),
            records: Vec::new(),
            persist_error: None,
        };
        assert_eq!(exit_code(&deployment), EXIT_DEPLOYMENT_FAILED);

        let ordering = RunError::InternalOrdering {
            error: InternalOrderingError::UnresolvedPlaceholder {
                unit: "BugBounty".to_string(),
                dependency: "EduChain".to_string(),
            },
            deployed: AddressMap::default(),
            records: Vec::new(),
            persist_error: None,
        };
        assert_eq!(exit_code(&ordering), EXIT_INVALID_PLAN);

        let not_persisted = RunError::NotPersisted {
            error: PersistError::Sink(SinkError::InvalidKey {
                key: "../addresses.json".to_string(),
            }),
            deployed: AddressMap::default(),
            records: Vec::new(),
        };
        assert_eq!(exit_code(&not_persisted), EXIT_NOT_PERSISTED);
    }

    #[test]
    fn test_plan_table_lists_units_in_order() {
        let order = resolve(vec![
            DeploymentUnit::new("BugBounty")
                .address_of("EduChain")
                .literal(AbiValue::Bool(true)),
            DeploymentUnit::new("EduChain"),
        ])
        .unwrap();

        let rendered = plan_table(&order).to_string();
        let edu = rendered.find("EduChain").unwrap();
        let bounty = rendered.find("BugBounty").unwrap();
        assert!(edu < bounty);
        assert!(rendered.contains("address_of(EduChain)"));
    }
}
