use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{DeploymentRecord, DeploymentUnit};

/// Compute a SHA-256 hash of a unit list.
///
/// The hash is deterministic: the same units, in the same order, always produce the same
/// hash. It identifies which plan a log was produced from.
pub fn units_hash(units: &[DeploymentUnit]) -> String {
    let mut hasher = Sha256::new();
    for unit in units {
        // Serializing plain data into a Vec cannot fail.
        let json = serde_json::to_vec(unit).unwrap_or_default();
        hasher.update((json.len() as u64).to_be_bytes());
        hasher.update(&json);
    }
    hex::encode(hasher.finalize())
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunOutcome {
    Complete,
    Aborted,
}

/// Versioned record of a deployment run, stored next to the address file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentLog {
    /// SHA-256 of the unit list that was deployed.
    pub units_hash: String,
    /// Version of the tool that produced this log.
    pub tool_version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    /// Every record of the run, in visit order.
    pub records: Vec<DeploymentRecord>,
}

/// A run that has started but not finished.
#[derive(Debug, Clone)]
pub struct OpenLog {
    units_hash: String,
    started_at: DateTime<Utc>,
}

impl DeploymentLog {
    /// Start a log for deploying `units`.
    pub fn begin(units: &[DeploymentUnit]) -> OpenLog {
        OpenLog {
            units_hash: units_hash(units),
            started_at: Utc::now(),
        }
    }
}

impl OpenLog {
    pub fn finish(self, records: &[DeploymentRecord], complete: bool) -> DeploymentLog {
        DeploymentLog {
            units_hash: self.units_hash,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: self.started_at,
            finished_at: Utc::now(),
            outcome: if complete {
                RunOutcome::Complete
            } else {
                RunOutcome::Aborted
            },
            records: records.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::default_units;
    use alloy_core::primitives::{Address, B256};

    #[test]
    fn test_hash_determinism() {
        let hash1 = units_hash(&default_units());
        let hash2 = units_hash(&default_units());

        assert_eq!(hash1, hash2, "Hash should be deterministic");
        assert_eq!(hash1.len(), 64, "SHA-256 hash should be 64 hex characters");
    }

    #[test]
    fn test_hash_changes_with_constructor() {
        let mut units = default_units();
        let original = units_hash(&units);

        units[1] = units[1].clone().literal(crate::AbiValue::Bool(true));

        assert_ne!(original, units_hash(&units));
    }

    #[test]
    fn test_hash_changes_with_order() {
        let mut units = default_units();
        let original = units_hash(&units);
        units.reverse();
        assert_ne!(original, units_hash(&units));
    }

    #[test]
    fn test_log_round_trip() {
        let mut record = DeploymentRecord::pending("EduChain");
        record.submitted(B256::repeat_byte(1)).unwrap();
        record.confirmed(Address::repeat_byte(2)).unwrap();

        let log = DeploymentLog::begin(&default_units()).finish(&[record], false);
        assert_eq!(log.outcome, RunOutcome::Aborted);
        assert!(log.finished_at >= log.started_at);

        let json = serde_json::to_string_pretty(&log).unwrap();
        assert!(json.contains("\"outcome\": \"aborted\""));
        assert!(json.contains("\"status\": \"confirmed\""));

        let loaded: DeploymentLog = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, log);
    }
}
