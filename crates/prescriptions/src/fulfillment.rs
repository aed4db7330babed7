use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, TryLockError};
use std::time::{Duration, Instant};

use chrono::Utc;

use apothek_catalog::MedicineCatalog;
use apothek_core::{ActorId, DoctorId, MedicineId, PatientId, PrescriptionId};
use apothek_core::Aggregate;
use apothek_ledger::{NewTransaction, StockLedger};

use crate::error::FulfillmentError;
use crate::prescription::{
    CancelPrescription, CreatePrescription, FinalizePrescription, MarkDispensed, Prescription,
    PrescriptionCommand, PrescriptionItem, PrescriptionStatus,
};

/// One requested item on a new prescription.
#[derive(Debug, Clone)]
pub struct NewPrescriptionItem {
    pub medicine_id: MedicineId,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub quantity: u32,
}

/// Input for creating a draft prescription.
#[derive(Debug, Clone)]
pub struct NewPrescription {
    pub patient_id: PatientId,
    pub doctor_id: DoctorId,
    pub items: Vec<NewPrescriptionItem>,
    pub notes: Option<String>,
}

/// Listing filter for prescriptions.
#[derive(Debug, Clone, Default)]
pub struct PrescriptionQuery {
    pub status: Option<PrescriptionStatus>,
    pub patient_id: Option<PatientId>,
    /// Case-insensitive match against item medicine names and notes.
    pub search: Option<String>,
    pub limit: Option<usize>,
}

/// Bounded wait for one prescription's guard before giving up with `Busy`.
const GUARD_DEADLINE: Duration = Duration::from_millis(250);
const GUARD_RETRY: Duration = Duration::from_millis(1);

type PrescriptionCell = Arc<Mutex<Prescription>>;

/// Drives prescriptions through their lifecycle and writes the resulting
/// inventory movements through the stock ledger.
///
/// Each prescription lives in its own guarded cell, so an in-flight dispense
/// only blocks operations on that same prescription. The outer map lock is
/// held just long enough to look cells up or insert new ones.
pub struct FulfillmentService {
    catalog: Arc<MedicineCatalog>,
    ledger: Arc<StockLedger>,
    prescriptions: RwLock<HashMap<PrescriptionId, PrescriptionCell>>,
}

impl FulfillmentService {
    pub fn new(catalog: Arc<MedicineCatalog>, ledger: Arc<StockLedger>) -> Self {
        Self {
            catalog,
            ledger,
            prescriptions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a draft prescription. Every item's medicine must exist in the
    /// catalog and be active; names are snapshotted, prices are not (they
    /// lock at finalization).
    pub fn create(&self, new: NewPrescription) -> Result<Prescription, FulfillmentError> {
        if new.items.is_empty() {
            return Err(FulfillmentError::Validation(
                "a prescription needs at least one item".to_string(),
            ));
        }

        let mut items = Vec::with_capacity(new.items.len());
        for requested in &new.items {
            let medicine = self.catalog.resolve_for_prescribing(requested.medicine_id)?;
            items.push(PrescriptionItem {
                medicine_id: requested.medicine_id,
                medicine_name: medicine.name().to_string(),
                dosage: requested.dosage.clone(),
                frequency: requested.frequency.clone(),
                duration: requested.duration.clone(),
                quantity: requested.quantity,
                unit_price: None,
            });
        }

        let id = PrescriptionId::new();
        let mut prescription = Prescription::empty(id);
        let events = prescription.handle(&PrescriptionCommand::CreatePrescription(
            CreatePrescription {
                prescription_id: id,
                patient_id: new.patient_id,
                doctor_id: new.doctor_id,
                items,
                notes: new.notes,
                occurred_at: Utc::now(),
            },
        ))?;
        for event in &events {
            prescription.apply(event);
        }

        let mut store = self.write_store()?;
        store.insert(id, Arc::new(Mutex::new(prescription.clone())));
        tracing::info!(prescription_id = %id, items = prescription.items().len(), "prescription created");
        Ok(prescription)
    }

    /// Finalize a draft: lock each item's unit price from the catalog's
    /// current price and compute the total.
    pub fn finalize(&self, id: PrescriptionId) -> Result<Prescription, FulfillmentError> {
        let cell = self.cell(id)?;
        let mut prescription = lock_prescription(id, &cell)?;

        let mut unit_prices = Vec::with_capacity(prescription.items().len());
        for item in prescription.items() {
            let medicine = self.catalog.resolve_for_prescribing(item.medicine_id)?;
            unit_prices.push(medicine.unit_price());
        }

        let events = prescription.handle(&PrescriptionCommand::FinalizePrescription(
            FinalizePrescription {
                prescription_id: id,
                unit_prices,
                occurred_at: Utc::now(),
            },
        ))?;
        for event in &events {
            prescription.apply(event);
        }

        tracing::info!(prescription_id = %id, total = prescription.total(), "prescription finalized");
        Ok(prescription.clone())
    }

    /// Dispense a finalized prescription.
    ///
    /// All item movements go to the ledger as one batch: either every item's
    /// stock is deducted or none is, and the prescription only transitions to
    /// dispensed after the batch commits. Only this prescription's guard is
    /// held across the ledger write; other prescriptions stay available.
    pub fn dispense(
        &self,
        id: PrescriptionId,
        actor_id: ActorId,
    ) -> Result<Prescription, FulfillmentError> {
        let cell = self.cell(id)?;
        let mut prescription = lock_prescription(id, &cell)?;

        let events = prescription.handle(&PrescriptionCommand::MarkDispensed(MarkDispensed {
            prescription_id: id,
            occurred_at: Utc::now(),
        }))?;

        let batch: Vec<NewTransaction> = prescription
            .items()
            .iter()
            .map(|item| {
                NewTransaction::dispense(item.medicine_id, item.quantity as i64, Some(id), actor_id)
            })
            .collect();
        self.ledger.append_batch(batch)?;

        for event in &events {
            prescription.apply(event);
        }

        tracing::info!(prescription_id = %id, actor_id = %actor_id, "prescription dispensed");
        Ok(prescription.clone())
    }

    /// Cancel a draft or finalized prescription. Dispensed prescriptions are
    /// immutable; corrections go through stock returns instead.
    pub fn cancel(&self, id: PrescriptionId) -> Result<Prescription, FulfillmentError> {
        let cell = self.cell(id)?;
        let mut prescription = lock_prescription(id, &cell)?;

        let events = prescription.handle(&PrescriptionCommand::CancelPrescription(
            CancelPrescription {
                prescription_id: id,
                occurred_at: Utc::now(),
            },
        ))?;
        for event in &events {
            prescription.apply(event);
        }

        tracing::info!(prescription_id = %id, "prescription cancelled");
        Ok(prescription.clone())
    }

    pub fn get(&self, id: PrescriptionId) -> Result<Prescription, FulfillmentError> {
        let cell = self.cell(id)?;
        let prescription = lock_prescription(id, &cell)?;
        Ok(prescription.clone())
    }

    /// Prescriptions matching the query, newest first.
    pub fn list(&self, query: &PrescriptionQuery) -> Result<Vec<Prescription>, FulfillmentError> {
        // Snapshot the cells first so the map lock is not held while each
        // prescription's guard is taken.
        let cells: Vec<(PrescriptionId, PrescriptionCell)> = {
            let store = self
                .prescriptions
                .read()
                .map_err(|_| store_poisoned())?;
            store.iter().map(|(id, cell)| (*id, Arc::clone(cell))).collect()
        };

        let needle = query.search.as_deref().map(str::to_lowercase);
        let mut matched: Vec<Prescription> = Vec::new();
        for (id, cell) in &cells {
            let p = lock_prescription(*id, cell)?;
            if query.status.is_some_and(|s| p.status() != s) {
                continue;
            }
            if query.patient_id.is_some_and(|pid| p.patient_id() != Some(pid)) {
                continue;
            }
            if let Some(needle) = needle.as_deref() {
                let hit = p
                    .items()
                    .iter()
                    .any(|item| item.medicine_name.to_lowercase().contains(needle))
                    || p.notes().is_some_and(|n| n.to_lowercase().contains(needle));
                if !hit {
                    continue;
                }
            }
            matched.push(p.clone());
        }
        matched.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        if let Some(limit) = query.limit {
            matched.truncate(limit.max(1));
        }
        Ok(matched)
    }

    fn cell(&self, id: PrescriptionId) -> Result<PrescriptionCell, FulfillmentError> {
        let store = self
            .prescriptions
            .read()
            .map_err(|_| store_poisoned())?;
        store.get(&id).cloned().ok_or(FulfillmentError::NotFound(id))
    }

    fn write_store(
        &self,
    ) -> Result<
        std::sync::RwLockWriteGuard<'_, HashMap<PrescriptionId, PrescriptionCell>>,
        FulfillmentError,
    > {
        self.prescriptions.write().map_err(|_| store_poisoned())
    }

    #[cfg(test)]
    fn with_prescription_held<R>(&self, id: PrescriptionId, f: impl FnOnce() -> R) -> R {
        let cell = self.cell(id).unwrap();
        let _guard = cell.lock().unwrap();
        f()
    }
}

fn store_poisoned() -> FulfillmentError {
    FulfillmentError::Internal("prescription store lock poisoned".to_string())
}

/// Acquire a prescription guard with a bounded wait.
fn lock_prescription<'a>(
    id: PrescriptionId,
    cell: &'a Mutex<Prescription>,
) -> Result<MutexGuard<'a, Prescription>, FulfillmentError> {
    let started = Instant::now();
    loop {
        match cell.try_lock() {
            Ok(guard) => return Ok(guard),
            Err(TryLockError::WouldBlock) => {
                if started.elapsed() >= GUARD_DEADLINE {
                    return Err(FulfillmentError::Busy(id));
                }
                std::thread::sleep(GUARD_RETRY);
            }
            Err(TryLockError::Poisoned(_)) => {
                return Err(FulfillmentError::Internal(
                    "prescription lock poisoned".to_string(),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apothek_catalog::{NewMedicine, UpdateMedicine};
    use apothek_core::VendorId;
    use apothek_ledger::{LedgerError, TransactionFilter, TransactionType};

    struct Fixture {
        catalog: Arc<MedicineCatalog>,
        ledger: Arc<StockLedger>,
        service: FulfillmentService,
    }

    fn fixture() -> Fixture {
        let catalog = Arc::new(MedicineCatalog::new());
        let ledger = Arc::new(StockLedger::new());
        let service = FulfillmentService::new(Arc::clone(&catalog), Arc::clone(&ledger));
        Fixture {
            catalog,
            ledger,
            service,
        }
    }

    impl Fixture {
        fn stocked_medicine(&self, name: &str, unit_price: u64, stock: i64) -> MedicineId {
            let medicine = self
                .catalog
                .register(NewMedicine {
                    name: name.to_string(),
                    unit_price,
                    low_stock_threshold: Some(10),
                })
                .unwrap();
            let id = medicine.id_typed();
            self.ledger.track(id);
            if stock > 0 {
                self.ledger
                    .append(NewTransaction::receipt(
                        id,
                        stock,
                        VendorId::new(),
                        ActorId::new(),
                    ))
                    .unwrap();
            }
            id
        }

        fn draft(&self, items: Vec<(MedicineId, u32)>) -> Prescription {
            self.service
                .create(NewPrescription {
                    patient_id: PatientId::new(),
                    doctor_id: DoctorId::new(),
                    items: items
                        .into_iter()
                        .map(|(medicine_id, quantity)| NewPrescriptionItem {
                            medicine_id,
                            dosage: "500mg".to_string(),
                            frequency: "2x daily".to_string(),
                            duration: "5 days".to_string(),
                            quantity,
                        })
                        .collect(),
                    notes: None,
                })
                .unwrap()
        }
    }

    #[test]
    fn create_snapshots_medicine_names() {
        let fx = fixture();
        let medicine = fx.stocked_medicine("ibuprofen 400mg", 120, 100);
        let rx = fx.draft(vec![(medicine, 10)]);

        assert_eq!(rx.status(), PrescriptionStatus::Draft);
        assert_eq!(rx.items()[0].medicine_name, "ibuprofen 400mg");
        assert_eq!(rx.items()[0].unit_price, None);
    }

    #[test]
    fn create_rejects_discontinued_medicine() {
        let fx = fixture();
        let medicine = fx.stocked_medicine("old stock", 100, 10);
        fx.catalog.discontinue(medicine).unwrap();

        let err = fx
            .service
            .create(NewPrescription {
                patient_id: PatientId::new(),
                doctor_id: DoctorId::new(),
                items: vec![NewPrescriptionItem {
                    medicine_id: medicine,
                    dosage: "1 tab".to_string(),
                    frequency: "daily".to_string(),
                    duration: "3 days".to_string(),
                    quantity: 3,
                }],
                notes: None,
            })
            .unwrap_err();
        assert!(matches!(err, FulfillmentError::Catalog(_)));
    }

    #[test]
    fn finalized_total_survives_catalog_price_change() {
        let fx = fixture();
        let medicine = fx.stocked_medicine("amoxicillin", 150, 100);
        let rx = fx.draft(vec![(medicine, 10)]);

        let finalized = fx.service.finalize(rx.id_typed()).unwrap();
        assert_eq!(finalized.total(), Some(1500));

        // Catalog price doubles after finalization.
        fx.catalog
            .update(
                medicine,
                UpdateMedicine {
                    unit_price: Some(300),
                    ..Default::default()
                },
            )
            .unwrap();

        let dispensed = fx
            .service
            .dispense(rx.id_typed(), ActorId::new())
            .unwrap();
        assert_eq!(dispensed.total(), Some(1500));
        assert_eq!(dispensed.items()[0].unit_price, Some(150));
    }

    #[test]
    fn dispense_writes_one_ledger_entry_per_item() {
        let fx = fixture();
        let a = fx.stocked_medicine("medicine a", 100, 50);
        let b = fx.stocked_medicine("medicine b", 200, 50);
        let rx = fx.draft(vec![(a, 5), (b, 7)]);
        fx.service.finalize(rx.id_typed()).unwrap();

        fx.service.dispense(rx.id_typed(), ActorId::new()).unwrap();

        assert_eq!(fx.ledger.on_hand(a).unwrap(), 45);
        assert_eq!(fx.ledger.on_hand(b).unwrap(), 43);

        let entries = fx
            .ledger
            .list_for_medicine(a, &TransactionFilter::default())
            .unwrap();
        let dispense = entries
            .iter()
            .find(|e| e.tx_type == TransactionType::Dispense)
            .unwrap();
        assert_eq!(dispense.prescription_id, Some(rx.id_typed()));
        assert_eq!(dispense.quantity_delta, -5);
    }

    #[test]
    fn dispense_is_all_or_nothing_across_items() {
        let fx = fixture();
        let a = fx.stocked_medicine("plenty", 100, 50);
        let b = fx.stocked_medicine("scarce", 100, 3);
        let c = fx.stocked_medicine("plenty too", 100, 50);
        let rx = fx.draft(vec![(a, 5), (b, 10), (c, 5)]);
        fx.service.finalize(rx.id_typed()).unwrap();

        let err = fx
            .service
            .dispense(rx.id_typed(), ActorId::new())
            .unwrap_err();
        assert_eq!(
            err,
            FulfillmentError::Stock(LedgerError::InsufficientStock {
                medicine_id: b,
                on_hand: 3,
                requested: 10,
            })
        );

        // No stock moved and the prescription stays finalized (retryable
        // after a receipt tops the scarce medicine up).
        assert_eq!(fx.ledger.on_hand(a).unwrap(), 50);
        assert_eq!(fx.ledger.on_hand(b).unwrap(), 3);
        assert_eq!(fx.ledger.on_hand(c).unwrap(), 50);
        let current = fx.service.get(rx.id_typed()).unwrap();
        assert_eq!(current.status(), PrescriptionStatus::Finalized);

        fx.ledger
            .append(NewTransaction::receipt(b, 20, VendorId::new(), ActorId::new()))
            .unwrap();
        fx.service.dispense(rx.id_typed(), ActorId::new()).unwrap();
        assert_eq!(fx.ledger.on_hand(b).unwrap(), 13);
    }

    #[test]
    fn dispense_requires_finalized_status() {
        let fx = fixture();
        let medicine = fx.stocked_medicine("paracetamol", 50, 100);
        let rx = fx.draft(vec![(medicine, 4)]);

        let err = fx
            .service
            .dispense(rx.id_typed(), ActorId::new())
            .unwrap_err();
        assert!(matches!(err, FulfillmentError::Lifecycle(_)));
        assert_eq!(fx.ledger.on_hand(medicine).unwrap(), 100);
    }

    #[test]
    fn cancel_before_dispense_leaves_stock_untouched() {
        let fx = fixture();
        let medicine = fx.stocked_medicine("cough syrup", 80, 30);
        let rx = fx.draft(vec![(medicine, 2)]);
        fx.service.finalize(rx.id_typed()).unwrap();

        let cancelled = fx.service.cancel(rx.id_typed()).unwrap();
        assert_eq!(cancelled.status(), PrescriptionStatus::Cancelled);
        assert_eq!(fx.ledger.on_hand(medicine).unwrap(), 30);

        let err = fx
            .service
            .dispense(rx.id_typed(), ActorId::new())
            .unwrap_err();
        assert!(matches!(err, FulfillmentError::Lifecycle(_)));
    }

    #[test]
    fn list_filters_by_status_and_patient() {
        let fx = fixture();
        let medicine = fx.stocked_medicine("metformin", 90, 100);
        let first = fx.draft(vec![(medicine, 1)]);
        let second = fx.draft(vec![(medicine, 2)]);
        fx.service.finalize(second.id_typed()).unwrap();

        let drafts = fx
            .service
            .list(&PrescriptionQuery {
                status: Some(PrescriptionStatus::Draft),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].id_typed(), first.id_typed());

        let by_patient = fx
            .service
            .list(&PrescriptionQuery {
                patient_id: second.patient_id(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_patient.len(), 1);
        assert_eq!(by_patient[0].id_typed(), second.id_typed());

        let by_name = fx
            .service
            .list(&PrescriptionQuery {
                search: Some("METFORMIN".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_name.len(), 2);

        let none = fx
            .service
            .list(&PrescriptionQuery {
                search: Some("insulin".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn held_prescription_does_not_block_the_rest_of_the_store() {
        let fx = fixture();
        let medicine = fx.stocked_medicine("lisinopril", 60, 40);
        let held = fx.draft(vec![(medicine, 1)]);
        let other = fx.draft(vec![(medicine, 2)]);
        fx.service.finalize(other.id_typed()).unwrap();

        fx.service.with_prescription_held(held.id_typed(), || {
            let dispensed = fx
                .service
                .dispense(other.id_typed(), ActorId::new())
                .unwrap();
            assert_eq!(dispensed.status(), PrescriptionStatus::Dispensed);
            assert!(fx.service.get(other.id_typed()).is_ok());
            assert!(fx.service.create(NewPrescription {
                patient_id: PatientId::new(),
                doctor_id: DoctorId::new(),
                items: vec![NewPrescriptionItem {
                    medicine_id: medicine,
                    dosage: "10mg".to_string(),
                    frequency: "daily".to_string(),
                    duration: "30 days".to_string(),
                    quantity: 1,
                }],
                notes: None,
            })
            .is_ok());
        });
    }

    #[test]
    fn contended_prescription_surfaces_busy() {
        let fx = fixture();
        let medicine = fx.stocked_medicine("warfarin", 70, 40);
        let held = fx.draft(vec![(medicine, 1)]);

        fx.service.with_prescription_held(held.id_typed(), || {
            let err = fx.service.get(held.id_typed()).unwrap_err();
            assert_eq!(err, FulfillmentError::Busy(held.id_typed()));
            assert!(err.is_retryable());
        });
    }

    #[test]
    fn unknown_prescription_is_not_found() {
        let fx = fixture();
        let id = PrescriptionId::new();
        assert_eq!(
            fx.service.get(id).unwrap_err(),
            FulfillmentError::NotFound(id)
        );
        assert!(matches!(
            fx.service.finalize(id).unwrap_err(),
            FulfillmentError::NotFound(_)
        ));
    }
}
