//! Risk limit configuration

/// Pre-trade limits, in nominal (float) units.
#[derive(Debug, Clone, Copy)]
pub struct RiskLimits {
    /// Largest |price × quantity| a single order may carry.
    pub max_order_value: f64,
    /// Bound on |committed exposure| across all live reservations.
    pub max_position_exposure: f64,
    /// Daily loss bound consumed by the external VaR collaborator.
    pub max_daily_loss: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_order_value: 1_000_000.0,
            max_position_exposure: 5_000_000.0,
            max_daily_loss: 100_000.0,
        }
    }
}
