//! chainseq-deploy - Dependency-ordered smart contract deployment.
//!
//! This crate resolves a set of named deployment units into a safe order, deploys them
//! one at a time against a chain backend, and records the confirmed addresses for
//! client applications.

pub mod abi;

mod artifacts;
pub use artifacts::{ArtifactSet, HardhatArtifacts};

pub mod backend;
pub use backend::{
    Artifact, ArtifactError, ArtifactSource, ChainBackend, ConstructorInput, DeploymentHandle,
    JsonRpcBackend,
};

mod config;
pub use config::{DEFAULT_RPC_URL, DEPLOY_CONFIG_FILENAME, DeployConfig, NetworkConfig};

mod deployment_log;
pub use deployment_log::{DeploymentLog, OpenLog, RunOutcome, units_hash};

mod executor;
pub use executor::{Abort, DeploymentError, Execution, Executor, InternalOrderingError};

mod record;
pub use record::{DeploymentRecord, DeploymentStatus, TransitionError};

mod recorder;
pub use recorder::{
    AddressFile, AddressMap, DEFAULT_ADDRESSES_KEY, DEFAULT_LOG_KEY, ERROR_ENTRY_KEY,
    FailureEntry, PersistError, PersistResult, Recorder,
};

mod resolver;
pub use resolver::{ResolveError, resolve};

pub mod rpc;

mod sequencer;
pub use sequencer::{RunError, RunReport, Sequencer};

mod sink;
pub use sink::{FileSink, MemorySink, Sink, SinkError};

mod unit;
pub use unit::{AbiValue, ConstructorArg, DeploymentUnit, default_units, output_key};
