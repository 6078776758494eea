//! Shared fixtures: a scripted chain, in-memory artifacts and failing sinks.

#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use alloy_core::primitives::{Address, B256, Bytes};
use anyhow::Result;
use chainseq_deploy::{
    AbiValue, Artifact, ArtifactSet, ChainBackend, ConstructorArg, ConstructorInput,
    DeploymentHandle, DeploymentUnit, MemorySink, Sink, SinkError,
};

/// One call the scripted chain received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Submit(String),
    Confirm(String),
}

#[derive(Debug, Default)]
struct ChainState {
    nonce: u64,
    calls: Vec<Call>,
    submitted: HashMap<String, Vec<AbiValue>>,
    confirmed: HashMap<String, Address>,
}

/// A chain backend whose outcomes are fixed up front.
///
/// Units get the address registered with [`ScriptedChain::address`], or one derived from
/// the submission nonce.
#[derive(Debug, Default)]
pub struct ScriptedChain {
    addresses: HashMap<String, Address>,
    fail_submit: HashSet<String>,
    fail_confirm: HashSet<String>,
    state: Mutex<ChainState>,
}

impl ScriptedChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn address(mut self, contract: &str, address: Address) -> Self {
        self.addresses.insert(contract.to_string(), address);
        self
    }

    pub fn fail_submit(mut self, contract: &str) -> Self {
        self.fail_submit.insert(contract.to_string());
        self
    }

    pub fn fail_confirm(mut self, contract: &str) -> Self {
        self.fail_confirm.insert(contract.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Arguments a contract was submitted with.
    pub fn submitted_args(&self, contract: &str) -> Option<Vec<AbiValue>> {
        self.state.lock().unwrap().submitted.get(contract).cloned()
    }

    pub fn submissions(&self) -> usize {
        self.state.lock().unwrap().submitted.len()
    }

    /// The address a contract was confirmed at.
    pub fn confirmed_address(&self, contract: &str) -> Option<Address> {
        self.state.lock().unwrap().confirmed.get(contract).copied()
    }
}

impl ChainBackend for ScriptedChain {
    async fn submit_deployment(
        &self,
        artifact: &Artifact,
        args: &[AbiValue],
    ) -> Result<DeploymentHandle> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Submit(artifact.name.clone()));

        if self.fail_submit.contains(&artifact.name) {
            anyhow::bail!("insufficient funds for gas");
        }

        state.nonce += 1;
        state.submitted.insert(artifact.name.clone(), args.to_vec());

        Ok(DeploymentHandle {
            contract: artifact.name.clone(),
            tx_hash: B256::left_padding_from(&state.nonce.to_be_bytes()),
        })
    }

    async fn await_confirmation(&self, handle: &DeploymentHandle) -> Result<Address> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Confirm(handle.contract.clone()));

        if self.fail_confirm.contains(&handle.contract) {
            anyhow::bail!("transaction {} reverted", handle.tx_hash);
        }

        let address = match self.addresses.get(&handle.contract) {
            Some(address) => *address,
            None => Address::from_word(handle.tx_hash),
        };
        state.confirmed.insert(handle.contract.clone(), address);
        Ok(address)
    }
}

/// A sink that rejects every write.
pub struct BrokenSink;

impl Sink for BrokenSink {
    fn write(&self, key: &str, _value: &[u8]) -> Result<(), SinkError> {
        Err(SinkError::Io {
            key: key.to_string(),
            source: std::io::Error::other("read-only file system"),
        })
    }
}

/// A sink that rejects writes to one key and keeps everything else in memory.
pub struct FailingKeySink {
    failing: String,
    inner: MemorySink,
}

impl FailingKeySink {
    pub fn new(failing: &str) -> Self {
        Self {
            failing: failing.to_string(),
            inner: MemorySink::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.get(key)
    }
}

impl Sink for FailingKeySink {
    fn write(&self, key: &str, value: &[u8]) -> Result<(), SinkError> {
        if key == self.failing {
            return Err(SinkError::Io {
                key: key.to_string(),
                source: std::io::Error::other("quota exceeded"),
            });
        }
        self.inner.write(key, value)
    }
}

pub fn artifact(name: &str, inputs: &[&str]) -> Artifact {
    Artifact {
        name: name.to_string(),
        bytecode: Bytes::from_static(&[0x60, 0x80, 0x60, 0x40, 0x52]),
        constructor: inputs
            .iter()
            .enumerate()
            .map(|(i, ty)| ConstructorInput {
                name: format!("arg{i}"),
                ty: ty.to_string(),
            })
            .collect(),
    }
}

/// Artifacts whose constructor schema matches each unit's template.
pub fn artifacts_for(units: &[DeploymentUnit]) -> ArtifactSet {
    units.iter().fold(ArtifactSet::new(), |set, unit| {
        let inputs: Vec<&str> = unit
            .constructor_template
            .iter()
            .map(|arg| match arg {
                ConstructorArg::AddressOf(_) => "address",
                ConstructorArg::Literal(value) => match value {
                    AbiValue::Address(_) => "address",
                    AbiValue::Uint(_) => "uint256",
                    AbiValue::Bool(_) => "bool",
                    AbiValue::Bytes32(_) => "bytes32",
                    AbiValue::String(_) => "string",
                },
            })
            .collect();
        set.with(artifact(&unit.name, &inputs))
    })
}

/// Initialize tracing for tests (idempotent).
pub fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init()
        .ok();
}

pub fn names(units: &[DeploymentUnit]) -> Vec<&str> {
    units.iter().map(|u| u.name.as_str()).collect()
}
