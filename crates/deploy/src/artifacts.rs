//! Artifact sources.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use alloy_core::primitives::Bytes;
use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;

use crate::backend::{Artifact, ArtifactError, ArtifactSource, ConstructorInput};

/// The fields of a Hardhat artifact file this crate reads.
#[derive(Debug, Deserialize)]
struct HardhatArtifact {
    abi: Vec<Value>,
    bytecode: Bytes,
}

/// Reads compiled contracts from a Hardhat `artifacts/` directory.
///
/// `<root>/contracts/<Name>.sol/<Name>.json` is tried first. Contracts declared in a file
/// with another name are found by searching the tree for `<Name>.json`.
#[derive(Debug, Clone)]
pub struct HardhatArtifacts {
    root: PathBuf,
}

impl HardhatArtifacts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn locate(&self, name: &str) -> Option<PathBuf> {
        let direct = self
            .root
            .join("contracts")
            .join(format!("{name}.sol"))
            .join(format!("{name}.json"));
        if direct.is_file() {
            return Some(direct);
        }
        find_file(&self.root, &format!("{name}.json"))
    }

    fn load(name: &str, path: &Path) -> anyhow::Result<Artifact> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let raw: HardhatArtifact = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        Ok(Artifact {
            name: name.to_string(),
            bytecode: raw.bytecode,
            constructor: constructor_inputs(&raw.abi)?,
        })
    }
}

impl ArtifactSource for HardhatArtifacts {
    fn get_artifact(&self, name: &str) -> Result<Artifact, ArtifactError> {
        let path = self.locate(name).ok_or_else(|| ArtifactError::NotFound {
            name: name.to_string(),
        })?;

        tracing::debug!(contract = name, path = %path.display(), "Loading artifact");

        let artifact = Self::load(name, &path).map_err(|source| ArtifactError::Invalid {
            name: name.to_string(),
            source,
        })?;

        if artifact.bytecode.is_empty() {
            return Err(ArtifactError::NotDeployable {
                name: name.to_string(),
            });
        }
        Ok(artifact)
    }
}

/// In-memory artifacts keyed by contract name.
#[derive(Debug, Clone, Default)]
pub struct ArtifactSet {
    artifacts: HashMap<String, Artifact>,
}

impl ArtifactSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, artifact: Artifact) -> Self {
        self.artifacts.insert(artifact.name.clone(), artifact);
        self
    }
}

impl ArtifactSource for ArtifactSet {
    fn get_artifact(&self, name: &str) -> Result<Artifact, ArtifactError> {
        self.artifacts
            .get(name)
            .cloned()
            .ok_or_else(|| ArtifactError::NotFound {
                name: name.to_string(),
            })
    }
}

/// Constructor inputs from a JSON ABI. A missing constructor entry means no arguments.
fn constructor_inputs(abi: &[Value]) -> anyhow::Result<Vec<ConstructorInput>> {
    let Some(constructor) = abi
        .iter()
        .find(|item| item.get("type").and_then(Value::as_str) == Some("constructor"))
    else {
        return Ok(Vec::new());
    };

    match constructor.get("inputs") {
        Some(inputs) => serde_json::from_value(inputs.clone())
            .context("Failed to parse constructor inputs"),
        None => Ok(Vec::new()),
    }
}

/// Depth-first search for a file named `file_name`. `<Name>.dbg.json` files never match.
fn find_file(dir: &Path, file_name: &str) -> Option<PathBuf> {
    let mut entries: Vec<_> = std::fs::read_dir(dir).ok()?.flatten().map(|e| e.path()).collect();
    entries.sort();

    for path in entries {
        if path.is_dir() {
            if let Some(found) = find_file(&path, file_name) {
                return Some(found);
            }
        } else if path.file_name().and_then(|n| n.to_str()) == Some(file_name) {
            return Some(path);
        }
    }
    None
}
