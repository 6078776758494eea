//! Collaborators the sequencer drives: where artifacts come from and how deployments
//! reach the chain.

use std::future::Future;

use alloy_core::primitives::{Address, B256, Bytes};
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::AbiValue;

pub mod json_rpc;

pub use json_rpc::JsonRpcBackend;

/// One input of a contract constructor, as declared in its ABI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructorInput {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

/// A deployable contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    /// Creation bytecode, without constructor arguments.
    pub bytecode: Bytes,
    /// Constructor inputs in declaration order. Empty for argument-less constructors.
    pub constructor: Vec<ConstructorInput>,
}

/// Failure to produce an artifact for a contract name.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("no artifact found for contract '{name}'")]
    NotFound { name: String },

    #[error("artifact for contract '{name}' has no creation bytecode")]
    NotDeployable { name: String },

    #[error("failed to load artifact for contract '{name}'")]
    Invalid {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Produces deployable artifacts by contract name.
pub trait ArtifactSource: Send + Sync {
    fn get_artifact(&self, name: &str) -> Result<Artifact, ArtifactError>;
}

/// A submitted, not yet confirmed deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentHandle {
    pub contract: String,
    pub tx_hash: B256,
}

/// Submits deployments and waits for them to be confirmed.
///
/// Retry and timeout policy for confirmation belongs to the implementation: the caller
/// waits on [`ChainBackend::await_confirmation`] for as long as it takes.
pub trait ChainBackend: Send + Sync {
    /// Submit a contract creation transaction for `artifact` with encoded `args`.
    fn submit_deployment(
        &self,
        artifact: &Artifact,
        args: &[AbiValue],
    ) -> impl Future<Output = Result<DeploymentHandle>> + Send;

    /// Wait until the deployment is confirmed and return the contract address.
    fn await_confirmation(
        &self,
        handle: &DeploymentHandle,
    ) -> impl Future<Output = Result<Address>> + Send;
}
