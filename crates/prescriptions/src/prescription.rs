use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use apothek_core::{Aggregate, AggregateRoot, DomainError, DoctorId, MedicineId, PatientId, PrescriptionId};

/// Prescription status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrescriptionStatus {
    Draft,
    Finalized,
    Dispensed,
    Cancelled,
}

impl PrescriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Finalized => "finalized",
            Self::Dispensed => "dispensed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for PrescriptionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PrescriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "finalized" => Ok(Self::Finalized),
            "dispensed" => Ok(Self::Dispensed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown prescription status '{other}'")),
        }
    }
}

/// One prescribed medicine with its dosage instructions.
///
/// `unit_price` stays unset while the prescription is a draft and is locked
/// from the catalog when the prescription is finalized. Later catalog price
/// changes never touch a finalized prescription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrescriptionItem {
    pub medicine_id: MedicineId,
    pub medicine_name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub quantity: u32,
    /// Locked price in smallest currency unit; `None` until finalized.
    pub unit_price: Option<u64>,
}

impl PrescriptionItem {
    /// Line total once priced.
    pub fn line_total(&self) -> Option<u64> {
        self.unit_price
            .and_then(|price| price.checked_mul(self.quantity as u64))
    }
}

/// Aggregate root: Prescription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prescription {
    id: PrescriptionId,
    patient_id: Option<PatientId>,
    doctor_id: Option<DoctorId>,
    status: PrescriptionStatus,
    items: Vec<PrescriptionItem>,
    notes: Option<String>,
    /// Locked grand total; `None` until finalized.
    total: Option<u64>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Prescription {
    /// Empty, not-yet-created instance for rehydration.
    pub fn empty(id: PrescriptionId) -> Self {
        Self {
            id,
            patient_id: None,
            doctor_id: None,
            status: PrescriptionStatus::Draft,
            items: Vec::new(),
            notes: None,
            total: None,
            created_at: None,
            updated_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PrescriptionId {
        self.id
    }

    pub fn patient_id(&self) -> Option<PatientId> {
        self.patient_id
    }

    pub fn doctor_id(&self) -> Option<DoctorId> {
        self.doctor_id
    }

    pub fn status(&self) -> PrescriptionStatus {
        self.status
    }

    pub fn items(&self) -> &[PrescriptionItem] {
        &self.items
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn is_dispensable(&self) -> bool {
        matches!(self.status, PrescriptionStatus::Finalized)
    }

    pub fn is_cancellable(&self) -> bool {
        matches!(
            self.status,
            PrescriptionStatus::Draft | PrescriptionStatus::Finalized
        )
    }
}

impl AggregateRoot for Prescription {
    type Id = PrescriptionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreatePrescription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePrescription {
    pub prescription_id: PrescriptionId,
    pub patient_id: PatientId,
    pub doctor_id: DoctorId,
    pub items: Vec<PrescriptionItem>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FinalizePrescription. `unit_prices` aligns with the item order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizePrescription {
    pub prescription_id: PrescriptionId,
    pub unit_prices: Vec<u64>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkDispensed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkDispensed {
    pub prescription_id: PrescriptionId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelPrescription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelPrescription {
    pub prescription_id: PrescriptionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrescriptionCommand {
    CreatePrescription(CreatePrescription),
    FinalizePrescription(FinalizePrescription),
    MarkDispensed(MarkDispensed),
    CancelPrescription(CancelPrescription),
}

/// Event: PrescriptionCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrescriptionCreated {
    pub prescription_id: PrescriptionId,
    pub patient_id: PatientId,
    pub doctor_id: DoctorId,
    pub items: Vec<PrescriptionItem>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PrescriptionFinalized. Carries the locked prices and total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrescriptionFinalized {
    pub prescription_id: PrescriptionId,
    pub unit_prices: Vec<u64>,
    pub total: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PrescriptionDispensed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrescriptionDispensed {
    pub prescription_id: PrescriptionId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PrescriptionCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrescriptionCancelled {
    pub prescription_id: PrescriptionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrescriptionEvent {
    PrescriptionCreated(PrescriptionCreated),
    PrescriptionFinalized(PrescriptionFinalized),
    PrescriptionDispensed(PrescriptionDispensed),
    PrescriptionCancelled(PrescriptionCancelled),
}

impl Aggregate for Prescription {
    type Command = PrescriptionCommand;
    type Event = PrescriptionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PrescriptionEvent::PrescriptionCreated(e) => {
                self.id = e.prescription_id;
                self.patient_id = Some(e.patient_id);
                self.doctor_id = Some(e.doctor_id);
                self.status = PrescriptionStatus::Draft;
                self.items = e.items.clone();
                self.notes = e.notes.clone();
                self.total = None;
                self.created_at = Some(e.occurred_at);
                self.updated_at = Some(e.occurred_at);
                self.created = true;
            }
            PrescriptionEvent::PrescriptionFinalized(e) => {
                for (item, price) in self.items.iter_mut().zip(&e.unit_prices) {
                    item.unit_price = Some(*price);
                }
                self.total = Some(e.total);
                self.status = PrescriptionStatus::Finalized;
                self.updated_at = Some(e.occurred_at);
            }
            PrescriptionEvent::PrescriptionDispensed(e) => {
                self.status = PrescriptionStatus::Dispensed;
                self.updated_at = Some(e.occurred_at);
            }
            PrescriptionEvent::PrescriptionCancelled(e) => {
                self.status = PrescriptionStatus::Cancelled;
                self.updated_at = Some(e.occurred_at);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PrescriptionCommand::CreatePrescription(cmd) => self.handle_create(cmd),
            PrescriptionCommand::FinalizePrescription(cmd) => self.handle_finalize(cmd),
            PrescriptionCommand::MarkDispensed(cmd) => self.handle_dispense(cmd),
            PrescriptionCommand::CancelPrescription(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Prescription {
    fn ensure_id(&self, prescription_id: PrescriptionId) -> Result<(), DomainError> {
        if self.id != prescription_id {
            return Err(DomainError::rule("prescription id mismatch"));
        }
        Ok(())
    }

    fn ensure_exists(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_create(
        &self,
        cmd: &CreatePrescription,
    ) -> Result<Vec<PrescriptionEvent>, DomainError> {
        if self.created {
            return Err(DomainError::rule("prescription already exists"));
        }
        if cmd.items.is_empty() {
            return Err(DomainError::validation(
                "a prescription needs at least one item",
            ));
        }
        for item in &cmd.items {
            if item.quantity == 0 {
                return Err(DomainError::validation("item quantity must be positive"));
            }
            if item.dosage.trim().is_empty() {
                return Err(DomainError::validation("item dosage must not be empty"));
            }
        }

        Ok(vec![PrescriptionEvent::PrescriptionCreated(
            PrescriptionCreated {
                prescription_id: cmd.prescription_id,
                patient_id: cmd.patient_id,
                doctor_id: cmd.doctor_id,
                items: cmd.items.clone(),
                notes: cmd.notes.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_finalize(
        &self,
        cmd: &FinalizePrescription,
    ) -> Result<Vec<PrescriptionEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_id(cmd.prescription_id)?;

        if self.status != PrescriptionStatus::Draft {
            return Err(DomainError::rule(format!(
                "only draft prescriptions can be finalized (status is {})",
                self.status
            )));
        }
        if cmd.unit_prices.len() != self.items.len() {
            return Err(DomainError::validation(
                "one unit price per prescription item is required",
            ));
        }

        let mut total: u64 = 0;
        for (item, price) in self.items.iter().zip(&cmd.unit_prices) {
            let line = price
                .checked_mul(item.quantity as u64)
                .and_then(|line| total.checked_add(line))
                .ok_or_else(|| DomainError::validation("prescription total overflows"))?;
            total = line;
        }

        Ok(vec![PrescriptionEvent::PrescriptionFinalized(
            PrescriptionFinalized {
                prescription_id: cmd.prescription_id,
                unit_prices: cmd.unit_prices.clone(),
                total,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_dispense(
        &self,
        cmd: &MarkDispensed,
    ) -> Result<Vec<PrescriptionEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_id(cmd.prescription_id)?;

        if !self.is_dispensable() {
            return Err(DomainError::rule(format!(
                "only finalized prescriptions can be dispensed (status is {})",
                self.status
            )));
        }

        Ok(vec![PrescriptionEvent::PrescriptionDispensed(
            PrescriptionDispensed {
                prescription_id: cmd.prescription_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_cancel(
        &self,
        cmd: &CancelPrescription,
    ) -> Result<Vec<PrescriptionEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_id(cmd.prescription_id)?;

        if self.status == PrescriptionStatus::Cancelled {
            return Err(DomainError::rule("prescription is already cancelled"));
        }
        if !self.is_cancellable() {
            return Err(DomainError::rule(
                "a dispensed prescription cannot be cancelled",
            ));
        }

        Ok(vec![PrescriptionEvent::PrescriptionCancelled(
            PrescriptionCancelled {
                prescription_id: cmd.prescription_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: u32) -> PrescriptionItem {
        PrescriptionItem {
            medicine_id: MedicineId::new(),
            medicine_name: "amoxicillin 500mg".to_string(),
            dosage: "500mg".to_string(),
            frequency: "3x daily".to_string(),
            duration: "7 days".to_string(),
            quantity,
            unit_price: None,
        }
    }

    fn created(items: Vec<PrescriptionItem>) -> Prescription {
        let id = PrescriptionId::new();
        let mut rx = Prescription::empty(id);
        let events = rx
            .handle(&PrescriptionCommand::CreatePrescription(CreatePrescription {
                prescription_id: id,
                patient_id: PatientId::new(),
                doctor_id: DoctorId::new(),
                items,
                notes: None,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            rx.apply(e);
        }
        rx
    }

    fn finalize(rx: &mut Prescription, unit_prices: Vec<u64>) -> Result<(), DomainError> {
        let events = rx.handle(&PrescriptionCommand::FinalizePrescription(
            FinalizePrescription {
                prescription_id: rx.id_typed(),
                unit_prices,
                occurred_at: Utc::now(),
            },
        ))?;
        for e in &events {
            rx.apply(e);
        }
        Ok(())
    }

    #[test]
    fn create_requires_at_least_one_item() {
        let id = PrescriptionId::new();
        let rx = Prescription::empty(id);
        let err = rx
            .handle(&PrescriptionCommand::CreatePrescription(CreatePrescription {
                prescription_id: id,
                patient_id: PatientId::new(),
                doctor_id: DoctorId::new(),
                items: vec![],
                notes: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn create_rejects_zero_quantity() {
        let id = PrescriptionId::new();
        let rx = Prescription::empty(id);
        let err = rx
            .handle(&PrescriptionCommand::CreatePrescription(CreatePrescription {
                prescription_id: id,
                patient_id: PatientId::new(),
                doctor_id: DoctorId::new(),
                items: vec![item(0)],
                notes: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn finalize_locks_prices_and_total() {
        let mut rx = created(vec![item(10), item(2)]);
        assert_eq!(rx.status(), PrescriptionStatus::Draft);
        assert_eq!(rx.total(), None);

        finalize(&mut rx, vec![150, 400]).unwrap();

        assert_eq!(rx.status(), PrescriptionStatus::Finalized);
        assert_eq!(rx.total(), Some(10 * 150 + 2 * 400));
        assert_eq!(rx.items()[0].unit_price, Some(150));
        assert_eq!(rx.items()[1].line_total(), Some(800));
    }

    #[test]
    fn finalize_twice_is_rejected() {
        let mut rx = created(vec![item(1)]);
        finalize(&mut rx, vec![100]).unwrap();
        let err = finalize(&mut rx, vec![200]).unwrap_err();
        assert!(matches!(err, DomainError::Rule(_)));
        // First locked price survives.
        assert_eq!(rx.items()[0].unit_price, Some(100));
    }

    #[test]
    fn dispense_requires_finalized() {
        let rx = created(vec![item(1)]);
        let err = rx
            .handle(&PrescriptionCommand::MarkDispensed(MarkDispensed {
                prescription_id: rx.id_typed(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Rule(_)));
    }

    #[test]
    fn dispensed_prescription_cannot_be_cancelled() {
        let mut rx = created(vec![item(1)]);
        finalize(&mut rx, vec![100]).unwrap();
        let events = rx
            .handle(&PrescriptionCommand::MarkDispensed(MarkDispensed {
                prescription_id: rx.id_typed(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            rx.apply(e);
        }
        assert_eq!(rx.status(), PrescriptionStatus::Dispensed);

        let err = rx
            .handle(&PrescriptionCommand::CancelPrescription(CancelPrescription {
                prescription_id: rx.id_typed(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Rule(_)));
    }

    #[test]
    fn repeat_cancel_is_a_rule_violation_not_a_retryable_conflict() {
        let mut rx = created(vec![item(1)]);
        let events = rx
            .handle(&PrescriptionCommand::CancelPrescription(CancelPrescription {
                prescription_id: rx.id_typed(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            rx.apply(e);
        }

        let err = rx
            .handle(&PrescriptionCommand::CancelPrescription(CancelPrescription {
                prescription_id: rx.id_typed(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        // Cancelled is terminal, so retrying can never succeed.
        assert!(matches!(err, DomainError::Rule(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn finalized_prescription_can_be_cancelled() {
        let mut rx = created(vec![item(1)]);
        finalize(&mut rx, vec![100]).unwrap();
        let events = rx
            .handle(&PrescriptionCommand::CancelPrescription(CancelPrescription {
                prescription_id: rx.id_typed(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            rx.apply(e);
        }
        assert_eq!(rx.status(), PrescriptionStatus::Cancelled);
        assert_eq!(rx.version(), 3);
    }
}
