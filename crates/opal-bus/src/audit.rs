//! Audit trail
//!
//! The bus appends one record per invocation, fire-and-forget. The
//! default [`LedgerSink`] keeps a hash-chained in-process ledger whose
//! integrity can be verified after the fact; [`TracingSink`] just logs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AuditError;
use crate::types::{CommandContext, CommandResult};

/// One audited invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Target app
    pub app_id: String,
    /// Target action
    pub action_id: String,
    /// Parameter bag as submitted
    pub params: serde_json::Value,
    /// Invoker context
    pub context: CommandContext,
    /// Outcome
    pub result: CommandResult,
    /// Append time
    pub at: DateTime<Utc>,
    /// Hash of the previous entry (zeros for the first)
    pub prev_hash: [u8; 32],
    /// Hash of this entry
    pub hash: [u8; 32],
}

impl AuditRecord {
    /// New unchained record; the ledger fills in the hashes on append
    #[must_use]
    pub fn new(
        app_id: impl Into<String>,
        action_id: impl Into<String>,
        params: serde_json::Value,
        context: CommandContext,
        result: CommandResult,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            action_id: action_id.into(),
            params,
            context,
            result,
            at: Utc::now(),
            prev_hash: [0u8; 32],
            hash: [0u8; 32],
        }
    }
}

/// Destination for audit records
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one record
    ///
    /// # Errors
    /// Sink-specific; the bus logs and swallows them.
    async fn append(&self, record: AuditRecord) -> Result<(), AuditError>;
}

/// In-process hash-chained ledger
#[derive(Debug, Default)]
pub struct LedgerSink {
    inner: Mutex<Vec<AuditRecord>>,
}

impl LedgerSink {
    /// New empty ledger
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries, oldest first
    #[must_use]
    pub fn entries(&self) -> Vec<AuditRecord> {
        self.inner.lock().clone()
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Check if the ledger is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Walk the chain and recompute every hash
    ///
    /// # Errors
    /// `AuditError::IntegrityViolation` at the first entry whose stored
    /// hashes do not match the recomputation.
    pub fn verify_integrity(&self) -> Result<(), AuditError> {
        let guard = self.inner.lock();
        let mut prev = [0u8; 32];
        for (index, record) in guard.iter().enumerate() {
            if record.prev_hash != prev {
                return Err(AuditError::IntegrityViolation { index });
            }
            if record.hash != compute_hash(record) {
                return Err(AuditError::IntegrityViolation { index });
            }
            prev = record.hash;
        }
        Ok(())
    }
}

#[async_trait]
impl AuditSink for LedgerSink {
    async fn append(&self, mut record: AuditRecord) -> Result<(), AuditError> {
        let mut guard = self.inner.lock();
        record.prev_hash = guard.last().map(|r| r.hash).unwrap_or([0u8; 32]);
        record.hash = compute_hash(&record);
        guard.push(record);
        Ok(())
    }
}

/// Sink that only logs, keeping no state
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl AuditSink for TracingSink {
    async fn append(&self, record: AuditRecord) -> Result<(), AuditError> {
        tracing::info!(
            app_id = %record.app_id,
            action_id = %record.action_id,
            user_id = %record.context.user_id,
            success = record.result.success,
            "audit"
        );
        Ok(())
    }
}

fn compute_hash(record: &AuditRecord) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(record.app_id.as_bytes());
    hasher.update([0]);
    hasher.update(record.action_id.as_bytes());
    hasher.update([0]);
    hasher.update(record.params.to_string().as_bytes());
    hasher.update([0]);
    hasher.update(record.context.user_id.as_bytes());
    hasher.update([0]);
    hasher.update(record.context.context_id.as_bytes());
    hasher.update([0]);
    hasher.update([u8::from(record.result.success)]);
    hasher.update(record.at.timestamp_millis().to_le_bytes());
    hasher.update(record.prev_hash);
    hasher.finalize().into()
}
