use serde::{Deserialize, Serialize};

use apothek_core::MedicineId;

/// One medicine's stock position as assembled by the caller: current on-hand
/// quantity joined with the catalog's reorder threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MedicineStockView {
    pub medicine_id: MedicineId,
    pub name: String,
    pub on_hand: u64,
    pub low_stock_threshold: Option<u32>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// Stock at or below the reorder threshold, but not exhausted.
    Low,
    /// Stock exhausted.
    Out,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAlert {
    pub medicine_id: MedicineId,
    pub medicine_name: String,
    pub on_hand: u64,
    pub threshold: Option<u32>,
    pub severity: AlertSeverity,
}

/// Derive the active alert set from current stock positions.
///
/// Pure and idempotent: the same inputs always yield the same alerts, and
/// there is no stored alert state to acknowledge or clear. A medicine with no
/// threshold (or a zero threshold) only ever raises an out-of-stock alert.
pub fn compute_alerts(views: &[MedicineStockView]) -> Vec<StockAlert> {
    let mut alerts: Vec<StockAlert> = views
        .iter()
        .filter_map(|view| {
            let severity = if view.on_hand == 0 {
                AlertSeverity::Out
            } else {
                let threshold = view.low_stock_threshold.unwrap_or(0) as u64;
                if view.on_hand <= threshold {
                    AlertSeverity::Low
                } else {
                    return None;
                }
            };
            Some(StockAlert {
                medicine_id: view.medicine_id,
                medicine_name: view.name.clone(),
                on_hand: view.on_hand,
                threshold: view.low_stock_threshold,
                severity,
            })
        })
        .collect();

    // Out-of-stock first, then lowest absolute stock, then name for a
    // stable presentation order.
    alerts.sort_by(|a, b| {
        severity_rank(a.severity)
            .cmp(&severity_rank(b.severity))
            .then(a.on_hand.cmp(&b.on_hand))
            .then_with(|| a.medicine_name.cmp(&b.medicine_name))
    });
    alerts
}

fn severity_rank(severity: AlertSeverity) -> u8 {
    match severity {
        AlertSeverity::Out => 0,
        AlertSeverity::Low => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(name: &str, on_hand: u64, threshold: Option<u32>) -> MedicineStockView {
        MedicineStockView {
            medicine_id: MedicineId::new(),
            name: name.to_string(),
            on_hand,
            low_stock_threshold: threshold,
        }
    }

    #[test]
    fn exhausted_stock_is_out_regardless_of_threshold() {
        for threshold in [None, Some(0), Some(10)] {
            let alerts = compute_alerts(&[view("amoxicillin", 0, threshold)]);
            assert_eq!(alerts.len(), 1);
            assert_eq!(alerts[0].severity, AlertSeverity::Out);
        }
    }

    #[test]
    fn at_or_below_threshold_is_low() {
        let alerts = compute_alerts(&[
            view("at threshold", 10, Some(10)),
            view("below threshold", 3, Some(10)),
            view("above threshold", 11, Some(10)),
        ]);
        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().all(|a| a.severity == AlertSeverity::Low));
    }

    #[test]
    fn no_threshold_never_raises_low() {
        assert!(compute_alerts(&[view("ad hoc compound", 1, None)]).is_empty());
        assert!(compute_alerts(&[view("ad hoc compound", 1, Some(0))]).is_empty());
    }

    #[test]
    fn recomputation_is_idempotent() {
        let views = vec![view("a", 0, Some(5)), view("b", 2, Some(5)), view("c", 9, Some(5))];
        let first = compute_alerts(&views);
        let second = compute_alerts(&views);
        assert_eq!(first, second);
    }

    #[test]
    fn out_alerts_sort_before_low() {
        let alerts = compute_alerts(&[
            view("scarce", 1, Some(5)),
            view("gone", 0, Some(5)),
            view("scarcer", 1, Some(5)),
        ]);
        let names: Vec<&str> = alerts.iter().map(|a| a.medicine_name.as_str()).collect();
        assert_eq!(names, vec!["gone", "scarce", "scarcer"]);
    }
}
