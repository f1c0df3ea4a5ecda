//! Best-effort audit trail.
//!
//! Services emit one record per state change after the commit succeeds.
//! Delivery can never fail a business operation: the sink contract returns
//! nothing, and the tracing-backed sink degrades to a log line at worst.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

use crate::types::ActorId;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    LoanOriginated,
    LoanCanceled,
    LoanMarkedOverdue,
    PaymentApplied,
    PaymentReversed,
}

/// What kind of entity `entity_id` names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEntity {
    Loan,
    Payment,
}

/// One audit event, ready for whatever trail the deployment wires up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub actor_id: ActorId,
    pub action: AuditAction,
    pub entity_type: AuditEntity,
    pub entity_id: Uuid,
    pub details: serde_json::Value,
    pub at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(
        actor_id: ActorId,
        action: AuditAction,
        entity_type: AuditEntity,
        entity_id: Uuid,
        details: serde_json::Value,
    ) -> Self {
        Self {
            actor_id,
            action,
            entity_type,
            entity_id,
            details,
            at: Utc::now(),
        }
    }
}

/// Receives audit records. Must not fail and must not block the caller on
/// anything that can.
pub trait AuditSink {
    fn record(&self, record: AuditRecord);
}

/// Emits every record as a structured log line under `cartera::audit`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: AuditRecord) {
        tracing::info!(
            target: "cartera::audit",
            actor = %record.actor_id,
            action = ?record.action,
            entity = %record.entity_id,
            details = %record.details,
            "audit event"
        );
    }
}

/// Captures records in memory. Test suites and the CLI simulator read them
/// back; a poisoned lock drops the record, as best-effort allows.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: AuditRecord) {
        if let Ok(mut guard) = self.records.lock() {
            guard.push(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn memory_sink_captures_in_order() {
        let sink = MemoryAuditSink::new();
        let actor = Uuid::new_v4();
        let loan = Uuid::new_v4();

        sink.record(AuditRecord::new(
            actor,
            AuditAction::LoanOriginated,
            AuditEntity::Loan,
            loan,
            serde_json::json!({ "principal": "10000" }),
        ));
        sink.record(AuditRecord::new(
            actor,
            AuditAction::PaymentApplied,
            AuditEntity::Payment,
            Uuid::new_v4(),
            serde_json::json!({ "amount": "300" }),
        ));

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].action, AuditAction::LoanOriginated);
        assert_eq!(records[1].action, AuditAction::PaymentApplied);
        assert_eq!(records[0].entity_id, loan);
    }

    #[test]
    fn audit_records_serialize_with_screaming_tags() {
        let record = AuditRecord::new(
            Uuid::new_v4(),
            AuditAction::PaymentReversed,
            AuditEntity::Payment,
            Uuid::new_v4(),
            serde_json::json!({}),
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["action"], "PAYMENT_REVERSED");
        assert_eq!(value["entity_type"], "PAYMENT");
    }
}
