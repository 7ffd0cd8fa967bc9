//! Collaborator-owned state, consumed through traits.
//!
//! The payment record and the cash-flow audit log belong to the order
//! domain; this crate only reads payment data, drives legal forward
//! status transitions, and appends audit entries. In-memory
//! implementations live in [`memory`]; a production deployment plugs its
//! own persistence behind the same traits.

pub mod memory;

use crate::payments::types::{BillingContact, Money, PaymentStatus, ProviderName, PurchasedItem, SourceMeta};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("payment not found: {0}")]
    PaymentNotFound(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Snapshot of one payment record as owned by the order domain.
#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub id: Uuid,
    /// opaque token the shop uses in its own URLs
    pub token: String,
    /// merchant trade number sent to (and echoed by) the gateways
    pub trade_no: String,
    pub variant: ProviderName,
    pub status: PaymentStatus,
    pub total: Money,
    pub items: Vec<PurchasedItem>,
    pub billing: BillingContact,
    pub payment_date: Option<String>,
    pub cash_flow_log: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// Trade date in the `YYYY/MM/DD HH:MM:SS` shape the aggregator
    /// expects.
    pub fn trade_date(&self) -> String {
        self.created_at.format("%Y/%m/%d %H:%M:%S").to_string()
    }
}

/// Fields needed to open a new payment record.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub trade_no: String,
    pub variant: ProviderName,
    pub total: Money,
    pub items: Vec<PurchasedItem>,
    pub billing: BillingContact,
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn create(&self, payment: NewPayment) -> StoreResult<PaymentRecord>;

    async fn find_by_token(&self, token: &str) -> StoreResult<Option<PaymentRecord>>;

    async fn find_by_trade_no(&self, trade_no: &str) -> StoreResult<Option<PaymentRecord>>;

    /// Atomic check-and-set on the status field. Returns `true` when the
    /// record was in `from` and is now in `to`; `false` when some other
    /// caller won the race. Callers treat `false` as "no-op, produce no
    /// artifact".
    async fn try_transition(
        &self,
        id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> StoreResult<bool>;

    /// Move the payment to `Confirmed` from whatever state it is in.
    /// Idempotent: confirming an already-confirmed payment is a no-op.
    async fn mark_confirmed(&self, id: Uuid) -> StoreResult<()>;

    /// Point the payment at its latest cash-flow audit entry, optionally
    /// recording the gateway-reported payment date.
    async fn attach_cash_flow_log(
        &self,
        id: Uuid,
        log_id: Uuid,
        payment_date: Option<String>,
    ) -> StoreResult<()>;
}

/// One write-once audit entry for an inbound gateway payload.
#[derive(Debug, Clone)]
pub struct CashFlowEntry {
    pub id: Uuid,
    pub raw_payload: String,
    pub source_device: String,
    pub source_ip: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only sink recording every raw gateway payload, verified or
/// not. Entries are never mutated after the append.
#[async_trait]
pub trait CashFlowAudit: Send + Sync {
    async fn append(&self, raw_payload: &str, meta: &SourceMeta) -> StoreResult<Uuid>;
}
