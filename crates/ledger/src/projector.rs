use std::sync::Arc;

use apothek_core::MedicineId;

use crate::error::LedgerError;
use crate::store::StockLedger;

/// Read-side view over the ledger's maintained on-hand counters.
///
/// There is no catch-up or replay: counters are updated inside the append's
/// critical section, so every read here reflects every committed entry.
#[derive(Debug, Clone)]
pub struct StockProjector {
    ledger: Arc<StockLedger>,
}

impl StockProjector {
    pub fn new(ledger: Arc<StockLedger>) -> Self {
        Self { ledger }
    }

    /// Current on-hand quantity for one medicine.
    pub fn current_stock(&self, medicine_id: MedicineId) -> Result<u64, LedgerError> {
        self.ledger.on_hand(medicine_id)
    }

    /// Whether removing `quantity` units would drive stock negative.
    ///
    /// Advisory only: the authoritative check happens under the medicine's
    /// guard at append time.
    pub fn would_underflow(
        &self,
        medicine_id: MedicineId,
        quantity: u64,
    ) -> Result<bool, LedgerError> {
        Ok(self.ledger.on_hand(medicine_id)? < quantity)
    }

    /// On-hand quantities for every tracked medicine, ordered by id.
    pub fn snapshot(&self) -> Result<Vec<(MedicineId, u64)>, LedgerError> {
        self.ledger.levels()
    }
}
