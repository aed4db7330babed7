use std::sync::Arc;

use apothek_catalog::{Medicine, MedicineCatalog, NewMedicine};
use apothek_core::MedicineId;
use apothek_ledger::{
    MedicineStockView, StockAlert, StockLedger, StockProjector, compute_alerts,
};
use apothek_patients::PatientRegistry;
use apothek_prescriptions::FulfillmentService;
use apothek_vendors::VendorDirectory;

use crate::app::errors::ApiError;

/// All domain services behind the HTTP layer, wired once at startup.
pub struct AppServices {
    pub catalog: Arc<MedicineCatalog>,
    pub ledger: Arc<StockLedger>,
    pub projector: StockProjector,
    pub fulfillment: FulfillmentService,
    pub vendors: VendorDirectory,
    pub patients: PatientRegistry,
}

impl AppServices {
    pub fn new() -> Self {
        let catalog = Arc::new(MedicineCatalog::new());
        let ledger = Arc::new(StockLedger::new());
        let projector = StockProjector::new(Arc::clone(&ledger));
        let fulfillment = FulfillmentService::new(Arc::clone(&catalog), Arc::clone(&ledger));

        Self {
            catalog,
            ledger,
            projector,
            fulfillment,
            vendors: VendorDirectory::new(),
            patients: PatientRegistry::new(),
        }
    }

    /// Register a medicine and start tracking its stock in the same step, so
    /// a freshly registered medicine can receive stock straight away.
    pub fn register_medicine(&self, input: NewMedicine) -> Result<Medicine, ApiError> {
        let medicine = self.catalog.register(input)?;
        self.ledger.track(medicine.id_typed());
        Ok(medicine)
    }

    /// Join current stock levels with catalog thresholds and derive the
    /// active alert set. Fresh on every call; nothing is stored.
    pub fn stock_alerts(&self) -> Result<Vec<StockAlert>, ApiError> {
        Ok(compute_alerts(&self.stock_views()?))
    }

    /// Current stock joined with catalog data for every tracked medicine.
    pub fn stock_views(&self) -> Result<Vec<MedicineStockView>, ApiError> {
        let levels = self.projector.snapshot()?;
        let mut views = Vec::with_capacity(levels.len());
        for (medicine_id, on_hand) in levels {
            if let Some(medicine) = self.catalog.get(medicine_id) {
                views.push(MedicineStockView {
                    medicine_id,
                    name: medicine.name().to_string(),
                    on_hand,
                    low_stock_threshold: medicine.low_stock_threshold(),
                });
            }
        }
        Ok(views)
    }

    /// Stock view for one medicine, if it exists in the catalog.
    pub fn stock_view(&self, medicine_id: MedicineId) -> Result<MedicineStockView, ApiError> {
        let medicine = self.catalog.get(medicine_id).ok_or(ApiError::not_found("medicine"))?;
        let on_hand = self.projector.current_stock(medicine_id)?;
        Ok(MedicineStockView {
            medicine_id,
            name: medicine.name().to_string(),
            on_hand,
            low_stock_threshold: medicine.low_stock_threshold(),
        })
    }
}

impl Default for AppServices {
    fn default() -> Self {
        Self::new()
    }
}
