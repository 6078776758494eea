//! End-to-end deployment runs: resolve, execute, record.

use tokio::sync::mpsc::UnboundedSender;

use crate::{
    AddressFile, AddressMap, DeploymentLog, DeploymentRecord, DeploymentUnit, PersistError,
    Recorder,
    backend::{ArtifactSource, ChainBackend},
    executor::{Abort, DeploymentError, Executor, InternalOrderingError},
    resolver::{ResolveError, resolve},
    sink::Sink,
};

/// A run in which every unit was confirmed and the result was persisted.
#[derive(Debug)]
pub struct RunReport {
    /// Confirmed addresses of all units, in deployment order.
    pub addresses: AddressMap,
    /// One confirmed record per unit.
    pub records: Vec<DeploymentRecord>,
    /// The address file as written to the sink.
    pub written: AddressFile,
    /// Set when the address file was written but the deployment log was not.
    pub log_error: Option<PersistError>,
}

/// Why a run did not produce a complete, persisted address map.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The unit list was rejected. Nothing was deployed or written.
    #[error("invalid deployment plan: {0}")]
    Resolve(#[from] ResolveError),

    /// A unit failed to deploy. Units confirmed before it stand and are listed in
    /// `deployed`; a partial address file was written unless `persist_error` is set.
    /// A failed log write is only logged.
    #[error("deployment of '{unit}' failed: {error}")]
    Deployment {
        unit: String,
        #[source]
        error: DeploymentError,
        deployed: AddressMap,
        records: Vec<DeploymentRecord>,
        persist_error: Option<PersistError>,
    },

    /// The executor could not follow the resolved order.
    #[error("internal ordering violation: {error}")]
    InternalOrdering {
        #[source]
        error: InternalOrderingError,
        deployed: AddressMap,
        records: Vec<DeploymentRecord>,
        persist_error: Option<PersistError>,
    },

    /// Every unit was deployed but the address file could not be written.
    #[error("all units deployed but the result was not persisted: {error}")]
    NotPersisted {
        #[source]
        error: PersistError,
        deployed: AddressMap,
        records: Vec<DeploymentRecord>,
    },
}

impl RunError {
    /// Addresses confirmed during the run.
    pub fn deployed(&self) -> Option<&AddressMap> {
        match self {
            RunError::Resolve(_) => None,
            RunError::Deployment { deployed, .. }
            | RunError::InternalOrdering { deployed, .. }
            | RunError::NotPersisted { deployed, .. } => Some(deployed),
        }
    }

    /// Records of the units visited during the run.
    pub fn records(&self) -> &[DeploymentRecord] {
        match self {
            RunError::Resolve(_) => &[],
            RunError::Deployment { records, .. }
            | RunError::InternalOrdering { records, .. }
            | RunError::NotPersisted { records, .. } => records,
        }
    }

    /// The secondary persistence failure, if the address file could not be written.
    pub fn persist_error(&self) -> Option<&PersistError> {
        match self {
            RunError::Resolve(_) => None,
            RunError::Deployment { persist_error, .. }
            | RunError::InternalOrdering { persist_error, .. } => persist_error.as_ref(),
            RunError::NotPersisted { error, .. } => Some(error),
        }
    }
}

/// Drives a unit list through resolution, execution and recording.
pub struct Sequencer<'a, A, B, S: ?Sized> {
    artifacts: &'a A,
    backend: &'a B,
    sink: &'a S,
    recorder: Recorder,
    events: Option<UnboundedSender<DeploymentRecord>>,
}

impl<'a, A, B, S> Sequencer<'a, A, B, S>
where
    A: ArtifactSource,
    B: ChainBackend,
    S: Sink + ?Sized,
{
    pub fn new(artifacts: &'a A, backend: &'a B, sink: &'a S) -> Self {
        Self {
            artifacts,
            backend,
            sink,
            recorder: Recorder::default(),
            events: None,
        }
    }

    pub fn recorder(mut self, recorder: Recorder) -> Self {
        self.recorder = recorder;
        self
    }

    /// Publish every record change on `events`.
    pub fn events(mut self, events: UnboundedSender<DeploymentRecord>) -> Self {
        self.events = Some(events);
        self
    }

    /// Deploy `units` in dependency order and persist the outcome.
    pub async fn run(&self, units: Vec<DeploymentUnit>) -> Result<RunReport, RunError> {
        let log = DeploymentLog::begin(&units);

        let order = resolve(units).inspect_err(|err| {
            tracing::error!(error = %err, "Deployment plan rejected, nothing was deployed");
        })?;

        tracing::info!(
            order = ?order.iter().map(|u| u.name.as_str()).collect::<Vec<_>>(),
            "Resolved deployment order"
        );

        let mut executor = Executor::new(self.artifacts, self.backend);
        if let Some(events) = &self.events {
            executor = executor.with_events(events.clone());
        }
        let execution = executor.execute(&order).await;

        let log = log.finish(&execution.records, execution.is_complete());
        let persisted = self
            .recorder
            .persist(&execution.records, self.sink)
            .inspect_err(|err| {
                tracing::error!(error = %err, "Failed to persist address map");
            });
        // The log is a diagnostic; the address file alone decides the outcome.
        let log_error = self
            .recorder
            .persist_log(&log, self.sink)
            .inspect_err(|err| {
                tracing::warn!(error = %err, "Failed to write deployment log");
            })
            .err();

        let records = execution.records;
        let deployed = execution.addresses;

        match (execution.abort, persisted) {
            (None, Ok(written)) => {
                tracing::info!(units = deployed.len(), "Deployment complete");
                Ok(RunReport {
                    addresses: deployed,
                    records,
                    written,
                    log_error,
                })
            }
            (None, Err(error)) => Err(RunError::NotPersisted {
                error,
                deployed,
                records,
            }),
            (Some(Abort::Deployment { unit, error }), persisted) => Err(RunError::Deployment {
                unit,
                error,
                deployed,
                records,
                persist_error: persisted.err(),
            }),
            (Some(Abort::InternalOrdering(error)), persisted) => Err(RunError::InternalOrdering {
                error,
                deployed,
                records,
                persist_error: persisted.err(),
            }),
        }
    }
}
