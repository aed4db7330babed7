use chrono::{DateTime, Utc};

use crate::transaction::{StockTransaction, TransactionType};

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 200;

/// Filter for ledger history queries. All fields optional; an empty filter
/// returns the most recent `DEFAULT_LIMIT` entries.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub tx_type: Option<TransactionType>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &StockTransaction) -> bool {
        if self.tx_type.is_some_and(|t| t != tx.tx_type) {
            return false;
        }
        if self.start.is_some_and(|s| tx.recorded_at < s) {
            return false;
        }
        if self.end.is_some_and(|e| tx.recorded_at > e) {
            return false;
        }
        true
    }

    /// Requested limit clamped to `MAX_LIMIT`; defaults to `DEFAULT_LIMIT`.
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apothek_core::{ActorId, MedicineId, TransactionId};
    use chrono::Duration;

    fn entry(tx_type: TransactionType, at: DateTime<Utc>) -> StockTransaction {
        StockTransaction {
            id: TransactionId::new(),
            medicine_id: MedicineId::new(),
            tx_type,
            quantity_delta: 1,
            vendor_id: None,
            prescription_id: None,
            corrects: None,
            recorded_at: at,
            actor_id: ActorId::new(),
            sequence_number: 1,
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = TransactionFilter::default();
        assert!(filter.matches(&entry(TransactionType::Receipt, Utc::now())));
        assert_eq!(filter.effective_limit(), DEFAULT_LIMIT);
    }

    #[test]
    fn type_and_window_filters_apply() {
        let now = Utc::now();
        let filter = TransactionFilter {
            tx_type: Some(TransactionType::Dispense),
            start: Some(now - Duration::hours(1)),
            end: Some(now + Duration::hours(1)),
            limit: None,
        };
        assert!(filter.matches(&entry(TransactionType::Dispense, now)));
        assert!(!filter.matches(&entry(TransactionType::Receipt, now)));
        assert!(!filter.matches(&entry(
            TransactionType::Dispense,
            now - Duration::hours(2)
        )));
    }

    #[test]
    fn limit_is_clamped() {
        let filter = TransactionFilter {
            limit: Some(5000),
            ..Default::default()
        };
        assert_eq!(filter.effective_limit(), MAX_LIMIT);

        let zero = TransactionFilter {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(zero.effective_limit(), 1);
    }
}
