//! In-memory store implementations, used by the dev server and tests.

use crate::payments::types::{PaymentStatus, SourceMeta};
use crate::store::{
    CashFlowAudit, CashFlowEntry, NewPayment, PaymentRecord, PaymentStore, StoreError, StoreResult,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryPaymentStore {
    payments: Mutex<HashMap<Uuid, PaymentRecord>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, HashMap<Uuid, PaymentRecord>>> {
        self.payments
            .lock()
            .map_err(|_| StoreError::Backend("payment store lock poisoned".to_string()))
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn create(&self, payment: NewPayment) -> StoreResult<PaymentRecord> {
        let record = PaymentRecord {
            id: Uuid::new_v4(),
            token: Uuid::new_v4().simple().to_string(),
            trade_no: payment.trade_no,
            variant: payment.variant,
            status: PaymentStatus::Waiting,
            total: payment.total,
            items: payment.items,
            billing: payment.billing,
            payment_date: None,
            cash_flow_log: None,
            created_at: Utc::now(),
        };
        self.lock()?.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_token(&self, token: &str) -> StoreResult<Option<PaymentRecord>> {
        Ok(self.lock()?.values().find(|p| p.token == token).cloned())
    }

    async fn find_by_trade_no(&self, trade_no: &str) -> StoreResult<Option<PaymentRecord>> {
        Ok(self
            .lock()?
            .values()
            .find(|p| p.trade_no == trade_no)
            .cloned())
    }

    async fn try_transition(
        &self,
        id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> StoreResult<bool> {
        let mut payments = self.lock()?;
        let record = payments
            .get_mut(&id)
            .ok_or_else(|| StoreError::PaymentNotFound(id.to_string()))?;
        if record.status != from {
            return Ok(false);
        }
        record.status = to;
        Ok(true)
    }

    async fn mark_confirmed(&self, id: Uuid) -> StoreResult<()> {
        let mut payments = self.lock()?;
        let record = payments
            .get_mut(&id)
            .ok_or_else(|| StoreError::PaymentNotFound(id.to_string()))?;
        record.status = PaymentStatus::Confirmed;
        Ok(())
    }

    async fn attach_cash_flow_log(
        &self,
        id: Uuid,
        log_id: Uuid,
        payment_date: Option<String>,
    ) -> StoreResult<()> {
        let mut payments = self.lock()?;
        let record = payments
            .get_mut(&id)
            .ok_or_else(|| StoreError::PaymentNotFound(id.to_string()))?;
        record.cash_flow_log = Some(log_id);
        if payment_date.is_some() {
            record.payment_date = payment_date;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCashFlowAudit {
    entries: Mutex<Vec<CashFlowEntry>>,
}

impl InMemoryCashFlowAudit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn entries(&self) -> Vec<CashFlowEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CashFlowAudit for InMemoryCashFlowAudit {
    async fn append(&self, raw_payload: &str, meta: &SourceMeta) -> StoreResult<Uuid> {
        let entry = CashFlowEntry {
            id: Uuid::new_v4(),
            raw_payload: raw_payload.to_string(),
            source_device: meta.device.clone(),
            source_ip: meta.ip.clone(),
            created_at: Utc::now(),
        };
        let id = entry.id;
        self.entries
            .lock()
            .map_err(|_| StoreError::Backend("audit log lock poisoned".to_string()))?
            .push(entry);
        Ok(id)
    }
}
