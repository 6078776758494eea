//! Sequential deployment execution.
//!
//! Units are deployed one at a time, in the order given. A unit is only started once the
//! previous one is confirmed; the first failure aborts the rest of the run.

use alloy_core::primitives::Address;
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    AbiValue, AddressMap, ConstructorArg, DeploymentRecord, DeploymentUnit,
    backend::{Artifact, ArtifactError, ArtifactSource, ChainBackend},
    record::TransitionError,
};

/// A per-unit deployment failure. Recorded on the unit and aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("constructor of '{contract}' takes {expected} arguments but {actual} were provided")]
    ArgumentCount {
        contract: String,
        expected: usize,
        actual: usize,
    },

    #[error("argument {index} of '{contract}' constructor must be {expected}, got {actual:?}")]
    ArgumentType {
        contract: String,
        index: usize,
        expected: String,
        actual: AbiValue,
    },

    #[error("submission failed: {0:#}")]
    Submission(#[source] anyhow::Error),

    #[error("confirmation failed: {0:#}")]
    Confirmation(#[source] anyhow::Error),
}

/// The executor was handed an order it cannot follow. This is a bug, never an
/// environmental failure, and is never recovered from.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InternalOrderingError {
    #[error("unit '{unit}' references '{dependency}' before it was deployed")]
    UnresolvedPlaceholder { unit: String, dependency: String },

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Why a run stopped before reaching the end of the order.
#[derive(Debug, thiserror::Error)]
pub enum Abort {
    #[error("deployment of '{unit}' failed: {error}")]
    Deployment {
        unit: String,
        #[source]
        error: DeploymentError,
    },

    #[error(transparent)]
    InternalOrdering(#[from] InternalOrderingError),
}

impl Abort {
    /// The unit the run stopped at.
    pub fn unit(&self) -> &str {
        match self {
            Abort::Deployment { unit, .. } => unit,
            Abort::InternalOrdering(InternalOrderingError::UnresolvedPlaceholder {
                unit, ..
            }) => unit,
            Abort::InternalOrdering(InternalOrderingError::Transition(err)) => &err.unit,
        }
    }

    /// The failure itself, without the unit name.
    pub fn reason(&self) -> String {
        match self {
            Abort::Deployment { error, .. } => error.to_string(),
            Abort::InternalOrdering(error) => error.to_string(),
        }
    }
}

impl From<TransitionError> for Abort {
    fn from(err: TransitionError) -> Self {
        Abort::InternalOrdering(err.into())
    }
}

/// Everything an execution produced.
#[derive(Debug)]
pub struct Execution {
    /// One record per visited unit, in visit order.
    pub records: Vec<DeploymentRecord>,
    /// Confirmed addresses, in deployment order.
    pub addresses: AddressMap,
    /// Set when the run stopped early.
    pub abort: Option<Abort>,
}

impl Execution {
    pub fn is_complete(&self) -> bool {
        self.abort.is_none()
    }
}

/// Deploys an already ordered list of units.
pub struct Executor<'a, A, B> {
    artifacts: &'a A,
    backend: &'a B,
    events: Option<UnboundedSender<DeploymentRecord>>,
}

impl<'a, A, B> Executor<'a, A, B>
where
    A: ArtifactSource,
    B: ChainBackend,
{
    pub fn new(artifacts: &'a A, backend: &'a B) -> Self {
        Self {
            artifacts,
            backend,
            events: None,
        }
    }

    /// Publish a snapshot of every record change on `events`.
    pub fn with_events(mut self, events: UnboundedSender<DeploymentRecord>) -> Self {
        self.events = Some(events);
        self
    }

    /// Deploy `order` front to back.
    ///
    /// Every placeholder of a unit must name a unit confirmed earlier in `order`.
    pub async fn execute(&self, order: &[DeploymentUnit]) -> Execution {
        let mut records = Vec::with_capacity(order.len());
        let mut addresses = AddressMap::default();

        for (position, unit) in order.iter().enumerate() {
            let mut record = DeploymentRecord::pending(&unit.name);
            self.emit(&record);

            tracing::info!(
                unit = %unit.name,
                position = position + 1,
                total = order.len(),
                "Deploying unit"
            );

            match self.deploy_unit(unit, &addresses, &mut record).await {
                Ok(address) => {
                    tracing::info!(unit = %unit.name, address = %address, "Unit deployed");
                    addresses.insert(unit.name.clone(), address);
                    records.push(record);
                }
                Err(abort) => {
                    tracing::error!(unit = %unit.name, error = %abort, "Aborting deployment run");
                    if record.failed(abort.reason()).is_ok() {
                        self.emit(&record);
                    }
                    records.push(record);

                    let skipped = order.len() - position - 1;
                    if skipped > 0 {
                        tracing::warn!(skipped, "Remaining units were not attempted");
                    }

                    return Execution {
                        records,
                        addresses,
                        abort: Some(abort),
                    };
                }
            }
        }

        Execution {
            records,
            addresses,
            abort: None,
        }
    }

    async fn deploy_unit(
        &self,
        unit: &DeploymentUnit,
        addresses: &AddressMap,
        record: &mut DeploymentRecord,
    ) -> Result<Address, Abort> {
        let args = resolve_args(unit, addresses)?;

        let artifact = self
            .artifacts
            .get_artifact(&unit.name)
            .map_err(|err| deployment_failure(unit, err.into()))?;
        check_args(&artifact, &args).map_err(|err| deployment_failure(unit, err))?;

        let handle = self
            .backend
            .submit_deployment(&artifact, &args)
            .await
            .map_err(|err| deployment_failure(unit, DeploymentError::Submission(err)))?;

        record.submitted(handle.tx_hash)?;
        self.emit(record);
        tracing::debug!(unit = %unit.name, tx_hash = %handle.tx_hash, "Waiting for confirmation");

        let address = self
            .backend
            .await_confirmation(&handle)
            .await
            .map_err(|err| deployment_failure(unit, DeploymentError::Confirmation(err)))?;

        record.confirmed(address)?;
        self.emit(record);

        Ok(address)
    }

    fn emit(&self, record: &DeploymentRecord) {
        if let Some(events) = &self.events {
            if events.send(record.clone()).is_err() {
                tracing::trace!(unit = record.unit_name(), "Record listener dropped");
            }
        }
    }
}

fn deployment_failure(unit: &DeploymentUnit, error: DeploymentError) -> Abort {
    Abort::Deployment {
        unit: unit.name.clone(),
        error,
    }
}

/// Substitute confirmed addresses into the unit's constructor template.
fn resolve_args(
    unit: &DeploymentUnit,
    addresses: &AddressMap,
) -> Result<Vec<AbiValue>, InternalOrderingError> {
    unit.constructor_template
        .iter()
        .map(|slot| match slot {
            ConstructorArg::Literal(value) => Ok(value.clone()),
            ConstructorArg::AddressOf(dependency) => addresses
                .get(dependency)
                .map(|address| AbiValue::Address(*address))
                .ok_or_else(|| InternalOrderingError::UnresolvedPlaceholder {
                    unit: unit.name.clone(),
                    dependency: dependency.clone(),
                }),
        })
        .collect()
}

/// Check resolved arguments against the artifact's constructor schema.
fn check_args(artifact: &Artifact, args: &[AbiValue]) -> Result<(), DeploymentError> {
    if artifact.constructor.len() != args.len() {
        return Err(DeploymentError::ArgumentCount {
            contract: artifact.name.clone(),
            expected: artifact.constructor.len(),
            actual: args.len(),
        });
    }

    for (index, (input, arg)) in artifact.constructor.iter().zip(args).enumerate() {
        if !arg.matches_type(&input.ty) {
            return Err(DeploymentError::ArgumentType {
                contract: artifact.name.clone(),
                index,
                expected: input.ty.clone(),
                actual: arg.clone(),
            });
        }
    }
    Ok(())
}
