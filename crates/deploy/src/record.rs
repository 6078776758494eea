//! Per-unit deployment records.

use alloy_core::primitives::{Address, B256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`DeploymentRecord`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeploymentStatus {
    Pending,
    Submitted,
    Confirmed,
    Failed,
}

impl DeploymentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DeploymentStatus::Confirmed | DeploymentStatus::Failed)
    }
}

/// Rejected state change on a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("record for '{unit}' cannot move from {from} to {to}")]
pub struct TransitionError {
    pub unit: String,
    pub from: DeploymentStatus,
    pub to: DeploymentStatus,
}

/// Outcome of attempting to deploy one unit.
///
/// Fields are only reachable through accessors so the status and its payload stay
/// consistent: `address` is set iff the record is confirmed, `error` iff it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    unit_name: String,
    status: DeploymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tx_hash: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    attempted_at: DateTime<Utc>,
}

impl DeploymentRecord {
    /// A fresh record for a unit the executor just reached.
    pub fn pending(unit_name: impl Into<String>) -> Self {
        Self {
            unit_name: unit_name.into(),
            status: DeploymentStatus::Pending,
            tx_hash: None,
            address: None,
            error: None,
            attempted_at: Utc::now(),
        }
    }

    pub fn unit_name(&self) -> &str {
        &self.unit_name
    }

    pub fn status(&self) -> DeploymentStatus {
        self.status
    }

    pub fn tx_hash(&self) -> Option<B256> {
        self.tx_hash
    }

    pub fn address(&self) -> Option<Address> {
        self.address
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn attempted_at(&self) -> DateTime<Utc> {
        self.attempted_at
    }

    /// Pending -> Submitted.
    pub fn submitted(&mut self, tx_hash: B256) -> Result<(), TransitionError> {
        self.check(DeploymentStatus::Submitted, &[DeploymentStatus::Pending])?;
        self.tx_hash = Some(tx_hash);
        self.status = DeploymentStatus::Submitted;
        Ok(())
    }

    /// Submitted -> Confirmed.
    pub fn confirmed(&mut self, address: Address) -> Result<(), TransitionError> {
        self.check(DeploymentStatus::Confirmed, &[DeploymentStatus::Submitted])?;
        self.address = Some(address);
        self.status = DeploymentStatus::Confirmed;
        Ok(())
    }

    /// Pending or Submitted -> Failed.
    pub fn failed(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.check(
            DeploymentStatus::Failed,
            &[DeploymentStatus::Pending, DeploymentStatus::Submitted],
        )?;
        self.error = Some(error.into());
        self.status = DeploymentStatus::Failed;
        Ok(())
    }

    fn check(
        &self,
        to: DeploymentStatus,
        allowed_from: &[DeploymentStatus],
    ) -> Result<(), TransitionError> {
        if allowed_from.contains(&self.status) {
            Ok(())
        } else {
            Err(TransitionError {
                unit: self.unit_name.clone(),
                from: self.status,
                to,
            })
        }
    }
}
