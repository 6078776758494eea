//! Persisting deployment results.
//!
//! The address file is read by client applications and its shape is a stable contract:
//! a flat JSON object from logical unit name to checksummed address, plus an `_error`
//! entry when the run stopped early.
//!
//! ```json
//! {
//!   "eduChain": "0x5FbDB2315678afecb367f032d93F642f64180aa3",
//!   "_error": { "unit": "bugBounty", "message": "submission failed: ..." }
//! }
//! ```

use alloy_core::primitives::Address;
use derive_more::{Deref, From};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    DeploymentLog, DeploymentRecord, DeploymentStatus,
    sink::{Sink, SinkError},
    unit::output_key,
};

/// Default sink key of the address file.
pub const DEFAULT_ADDRESSES_KEY: &str = "addresses.json";
/// Default sink key of the deployment log.
pub const DEFAULT_LOG_KEY: &str = "deployment-log.json";
/// Address file entry naming the failed unit. No unit may publish under it.
pub const ERROR_ENTRY_KEY: &str = "_error";

/// Confirmed addresses by unit name, in deployment order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Deref, From)]
pub struct AddressMap(IndexMap<String, Address>);

impl AddressMap {
    pub fn insert(&mut self, unit: String, address: Address) {
        self.0.insert(unit, address);
    }

    /// Rebuild the map from records, keeping confirmed units in record order.
    pub fn from_records(records: &[DeploymentRecord]) -> Self {
        records
            .iter()
            .filter_map(|record| Some((record.unit_name().to_string(), record.address()?)))
            .collect::<IndexMap<_, _>>()
            .into()
    }
}

/// The failed unit named in a partial address file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub unit: String,
    pub message: String,
}

/// The document written under the addresses key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressFile {
    #[serde(flatten)]
    pub addresses: IndexMap<String, String>,
    #[serde(rename = "_error", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureEntry>,
}

impl AddressFile {
    /// Confirmed units plus the first failed one, if any.
    pub fn from_records(records: &[DeploymentRecord]) -> Self {
        let addresses = records
            .iter()
            .filter(|record| record.status() == DeploymentStatus::Confirmed)
            .filter_map(|record| {
                let address = record.address()?;
                Some((output_key(record.unit_name()), address.to_checksum(None)))
            })
            .collect();

        let error = records
            .iter()
            .find(|record| record.status() == DeploymentStatus::Failed)
            .map(|record| FailureEntry {
                unit: output_key(record.unit_name()),
                message: record.error().unwrap_or_default().to_string(),
            });

        Self { addresses, error }
    }

    pub fn is_partial(&self) -> bool {
        self.error.is_some()
    }
}

/// A result could not be made durable. The deployments it describes still stand.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("failed to serialize '{key}'")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Sink(#[from] SinkError),
}

pub type PersistResult<T = AddressFile> = Result<T, PersistError>;

/// Writes run results to a [`Sink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorder {
    addresses_key: String,
    log_key: Option<String>,
}

impl Default for Recorder {
    fn default() -> Self {
        Self {
            addresses_key: DEFAULT_ADDRESSES_KEY.to_string(),
            log_key: Some(DEFAULT_LOG_KEY.to_string()),
        }
    }
}

impl Recorder {
    pub fn new(addresses_key: impl Into<String>, log_key: Option<String>) -> Self {
        Self {
            addresses_key: addresses_key.into(),
            log_key,
        }
    }

    pub fn addresses_key(&self) -> &str {
        &self.addresses_key
    }

    pub fn log_key(&self) -> Option<&str> {
        self.log_key.as_deref()
    }

    /// Write the address file for `records` in a single sink write.
    pub fn persist<S: Sink + ?Sized>(
        &self,
        records: &[DeploymentRecord],
        sink: &S,
    ) -> PersistResult {
        let file = AddressFile::from_records(records);
        write_json(sink, &self.addresses_key, &file)?;

        if let Some(failure) = &file.error {
            tracing::warn!(
                key = %self.addresses_key,
                deployed = file.addresses.len(),
                failed_unit = %failure.unit,
                "Partial address map written"
            );
        } else {
            tracing::info!(
                key = %self.addresses_key,
                deployed = file.addresses.len(),
                "Address map written"
            );
        }
        Ok(file)
    }

    /// Write the deployment log, when a log key is configured.
    pub fn persist_log<S: Sink + ?Sized>(&self, log: &DeploymentLog, sink: &S) -> PersistResult<()> {
        let Some(key) = &self.log_key else {
            return Ok(());
        };
        write_json(sink, key, log)?;
        tracing::debug!(key = %key, units_hash = %log.units_hash, "Deployment log written");
        Ok(())
    }
}

fn write_json<S, T>(sink: &S, key: &str, value: &T) -> PersistResult<()>
where
    S: Sink + ?Sized,
    T: Serialize,
{
    let mut bytes = serde_json::to_vec_pretty(value).map_err(|source| PersistError::Serialize {
        key: key.to_string(),
        source,
    })?;
    bytes.push(b'\n');
    sink.write(key, &bytes)?;
    Ok(())
}
