use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, TryLockError};
use std::time::{Duration, Instant};

use chrono::Utc;

use apothek_core::{MedicineId, TransactionId, VendorId};

use crate::error::LedgerError;
use crate::query::TransactionFilter;
use crate::transaction::{NewTransaction, StockTransaction};

/// How long an append waits for a medicine's guard before giving up with
/// `LedgerError::Busy`.
pub const GUARD_DEADLINE: Duration = Duration::from_millis(250);

const GUARD_RETRY: Duration = Duration::from_millis(1);

/// Per-medicine ledger segment plus its derived on-hand counter.
///
/// Both live behind one mutex: an append and the counter update commit in the
/// same critical section, so a reader can never observe one without the other.
#[derive(Debug, Default)]
struct MedicineCell {
    on_hand: u64,
    entries: Vec<StockTransaction>,
}

/// Append-only stock ledger with per-medicine serialization.
///
/// Each tracked medicine owns a guarded cell. Writers acquire the guard
/// (bounded wait), perform the check-then-act balance check, and append;
/// concurrent writers on different medicines proceed independently.
#[derive(Debug)]
pub struct StockLedger {
    cells: RwLock<HashMap<MedicineId, Arc<Mutex<MedicineCell>>>>,
    guard_deadline: Duration,
}

impl Default for StockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl StockLedger {
    pub fn new() -> Self {
        Self::with_guard_deadline(GUARD_DEADLINE)
    }

    /// Mainly for tests: a ledger whose guard acquisition gives up after
    /// `deadline` instead of the default.
    pub fn with_guard_deadline(deadline: Duration) -> Self {
        Self {
            cells: RwLock::new(HashMap::new()),
            guard_deadline: deadline,
        }
    }

    /// Start tracking a medicine (idempotent). Returns false if it was
    /// already tracked. Appends against untracked medicines are rejected.
    pub fn track(&self, medicine_id: MedicineId) -> bool {
        match self.cells.write() {
            Ok(mut cells) => match cells.entry(medicine_id) {
                std::collections::hash_map::Entry::Occupied(_) => false,
                std::collections::hash_map::Entry::Vacant(v) => {
                    v.insert(Arc::new(Mutex::new(MedicineCell::default())));
                    true
                }
            },
            Err(_) => false,
        }
    }

    pub fn is_tracked(&self, medicine_id: MedicineId) -> bool {
        self.cells
            .read()
            .map(|cells| cells.contains_key(&medicine_id))
            .unwrap_or(false)
    }

    /// Append a single validated entry.
    ///
    /// The balance check for negative deltas and the counter update happen
    /// under the medicine's guard, as one atomic unit of work.
    pub fn append(&self, new: NewTransaction) -> Result<StockTransaction, LedgerError> {
        new.validate()?;

        let cell = self.cell(new.medicine_id)?;
        let mut guard = lock_cell(new.medicine_id, &cell, self.guard_deadline)?;

        if new.quantity_delta < 0 {
            let requested = new.quantity_delta.unsigned_abs();
            if requested > guard.on_hand {
                return Err(LedgerError::InsufficientStock {
                    medicine_id: new.medicine_id,
                    on_hand: guard.on_hand,
                    requested,
                });
            }
        }

        Ok(commit(&mut guard, new))
    }

    /// Append a batch of entries across one or more medicines, all-or-nothing.
    ///
    /// Guards are acquired in ascending medicine-id order (deadlock
    /// avoidance), every balance is pre-checked cumulatively in item order,
    /// and only then is anything written. On any failure, zero entries are
    /// applied.
    pub fn append_batch(
        &self,
        batch: Vec<NewTransaction>,
    ) -> Result<Vec<StockTransaction>, LedgerError> {
        if batch.is_empty() {
            return Ok(vec![]);
        }
        for tx in &batch {
            tx.validate()?;
        }

        let mut ids: Vec<MedicineId> = batch.iter().map(|tx| tx.medicine_id).collect();
        ids.sort();
        ids.dedup();

        let mut cells = Vec::with_capacity(ids.len());
        for id in &ids {
            cells.push(self.cell(*id)?);
        }

        let mut guards: Vec<MutexGuard<'_, MedicineCell>> = Vec::with_capacity(cells.len());
        for (id, cell) in ids.iter().zip(&cells) {
            guards.push(lock_cell(*id, cell, self.guard_deadline)?);
        }

        let index: HashMap<MedicineId, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        // Cumulative pre-check: repeated items against the same medicine must
        // not pass individually while underflowing together. Balances are
        // projected in i128 so the full u64 on-hand range stays exact.
        let mut projected: Vec<i128> = guards.iter().map(|g| g.on_hand as i128).collect();
        for tx in &batch {
            let i = index[&tx.medicine_id];
            let next = projected[i] + i128::from(tx.quantity_delta);
            if next < 0 {
                return Err(LedgerError::InsufficientStock {
                    medicine_id: tx.medicine_id,
                    on_hand: guards[i].on_hand,
                    requested: tx.quantity_delta.unsigned_abs(),
                });
            }
            projected[i] = next;
        }

        let mut committed = Vec::with_capacity(batch.len());
        for tx in batch {
            let i = index[&tx.medicine_id];
            committed.push(commit(&mut guards[i], tx));
        }
        Ok(committed)
    }

    /// Derived on-hand quantity; reflects every committed append.
    pub fn on_hand(&self, medicine_id: MedicineId) -> Result<u64, LedgerError> {
        let cell = self.cell(medicine_id)?;
        let guard = lock_cell(medicine_id, &cell, self.guard_deadline)?;
        Ok(guard.on_hand)
    }

    /// On-hand quantity for every tracked medicine.
    pub fn levels(&self) -> Result<Vec<(MedicineId, u64)>, LedgerError> {
        let cells = self
            .cells
            .read()
            .map_err(|_| LedgerError::Internal("cell map lock poisoned".to_string()))?;

        let mut levels = Vec::with_capacity(cells.len());
        for (id, cell) in cells.iter() {
            let guard = lock_cell(*id, cell, self.guard_deadline)?;
            levels.push((*id, guard.on_hand));
        }
        levels.sort_by_key(|(id, _)| *id);
        Ok(levels)
    }

    /// Whether any committed entry references the vendor (receipt history).
    pub fn vendor_has_history(&self, vendor_id: VendorId) -> Result<bool, LedgerError> {
        let cells = self
            .cells
            .read()
            .map_err(|_| LedgerError::Internal("cell map lock poisoned".to_string()))?;

        for (id, cell) in cells.iter() {
            let guard = lock_cell(*id, cell, self.guard_deadline)?;
            if guard.entries.iter().any(|e| e.vendor_id == Some(vendor_id)) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Audit/reporting query for one medicine, newest first.
    ///
    /// Never used for balance computation; that is always the maintained
    /// on-hand counter.
    pub fn list_for_medicine(
        &self,
        medicine_id: MedicineId,
        filter: &TransactionFilter,
    ) -> Result<Vec<StockTransaction>, LedgerError> {
        let cell = self.cell(medicine_id)?;
        let entries = {
            let guard = lock_cell(medicine_id, &cell, self.guard_deadline)?;
            guard.entries.clone()
        };
        Ok(filter_and_order(entries, filter))
    }

    /// Ledger-wide query across all medicines, newest first.
    pub fn list(&self, filter: &TransactionFilter) -> Result<Vec<StockTransaction>, LedgerError> {
        let cells = self
            .cells
            .read()
            .map_err(|_| LedgerError::Internal("cell map lock poisoned".to_string()))?;

        let mut entries = Vec::new();
        for (id, cell) in cells.iter() {
            let guard = lock_cell(*id, cell, self.guard_deadline)?;
            entries.extend(guard.entries.iter().cloned());
        }
        drop(cells);
        Ok(filter_and_order(entries, filter))
    }

    fn cell(&self, medicine_id: MedicineId) -> Result<Arc<Mutex<MedicineCell>>, LedgerError> {
        let cells = self
            .cells
            .read()
            .map_err(|_| LedgerError::Internal("cell map lock poisoned".to_string()))?;
        cells
            .get(&medicine_id)
            .cloned()
            .ok_or(LedgerError::UnknownMedicine(medicine_id))
    }

    #[cfg(test)]
    fn with_cell_held<R>(&self, medicine_id: MedicineId, f: impl FnOnce() -> R) -> R {
        let cell = self.cell(medicine_id).unwrap();
        let _guard = cell.lock().unwrap();
        f()
    }
}

/// Acquire a medicine guard with a bounded wait.
fn lock_cell<'a>(
    medicine_id: MedicineId,
    cell: &'a Mutex<MedicineCell>,
    deadline: Duration,
) -> Result<MutexGuard<'a, MedicineCell>, LedgerError> {
    let started = Instant::now();
    loop {
        match cell.try_lock() {
            Ok(guard) => return Ok(guard),
            Err(TryLockError::WouldBlock) => {
                if started.elapsed() >= deadline {
                    return Err(LedgerError::Busy(medicine_id));
                }
                std::thread::sleep(GUARD_RETRY);
            }
            Err(TryLockError::Poisoned(_)) => {
                return Err(LedgerError::Internal(
                    "medicine cell lock poisoned".to_string(),
                ));
            }
        }
    }
}

/// Write one entry into a held cell: assign id + sequence, push, update the
/// counter. Callers have already validated and balance-checked.
fn commit(cell: &mut MedicineCell, new: NewTransaction) -> StockTransaction {
    let sequence_number = cell.entries.last().map(|e| e.sequence_number).unwrap_or(0) + 1;
    let stored = StockTransaction {
        id: TransactionId::new(),
        medicine_id: new.medicine_id,
        tx_type: new.tx_type,
        quantity_delta: new.quantity_delta,
        vendor_id: new.vendor_id,
        prescription_id: new.prescription_id,
        corrects: new.corrects,
        recorded_at: Utc::now(),
        actor_id: new.actor_id,
        sequence_number,
    };

    cell.on_hand = cell.on_hand.saturating_add_signed(new.quantity_delta);
    cell.entries.push(stored.clone());

    tracing::debug!(
        medicine_id = %stored.medicine_id,
        tx_type = %stored.tx_type,
        delta = stored.quantity_delta,
        on_hand = cell.on_hand,
        "ledger append"
    );

    stored
}

fn filter_and_order(
    mut entries: Vec<StockTransaction>,
    filter: &TransactionFilter,
) -> Vec<StockTransaction> {
    entries.retain(|e| filter.matches(e));
    // Newest first; sequence breaks ties within one medicine's stream.
    entries.sort_by(|a, b| {
        b.recorded_at
            .cmp(&a.recorded_at)
            .then(b.sequence_number.cmp(&a.sequence_number))
    });
    entries.truncate(filter.effective_limit());
    entries
}
