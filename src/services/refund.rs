use rust_decimal::{Decimal, RoundingStrategy};

/// Refund share as a function of notice given before the appointment.
///
/// Tiers are `(minimum hours of notice, percent refunded)`; the first tier
/// whose minimum is met wins, so they must be sorted by descending hours.
#[derive(Debug, Clone, PartialEq)]
pub struct RefundPolicy {
    tiers: Vec<(f64, Decimal)>,
}

impl Default for RefundPolicy {
    fn default() -> Self {
        Self {
            tiers: vec![(24.0, Decimal::ONE_HUNDRED), (4.0, Decimal::new(50, 0))],
        }
    }
}

impl RefundPolicy {
    pub fn new(mut tiers: Vec<(f64, Decimal)>) -> Self {
        tiers.sort_by(|a, b| b.0.total_cmp(&a.0));
        Self { tiers }
    }

    pub fn percent_for(&self, hours_until_appointment: f64) -> Decimal {
        self.tiers
            .iter()
            .find(|(min_hours, _)| hours_until_appointment >= *min_hours)
            .map(|(_, percent)| *percent)
            .unwrap_or(Decimal::ZERO)
    }

    /// Amount to refund on `total`, rounded to cents.
    pub fn refund_for(&self, hours_until_appointment: f64, total: Decimal) -> Decimal {
        (total * self.percent_for(hours_until_appointment) / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }
}
