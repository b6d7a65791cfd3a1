use super::error::PlanError;
use super::money::round_money;

/// Income minus expenses for one month.
pub fn monthly_surplus(incomes: &[f64], expenses: &[f64]) -> f64 {
    let income: f64 = incomes.iter().sum();
    let spent: f64 = expenses.iter().sum();
    round_money(income - spent)
}

/// Rejects a surplus that leaves nothing to put towards debt.
pub fn require_positive_surplus(surplus: f64) -> Result<f64, PlanError> {
    if !surplus.is_finite() {
        return Err(PlanError::invalid("surplus", "must be a finite amount"));
    }
    if surplus <= 0.0 {
        return Err(PlanError::NoSurplus { surplus });
    }
    Ok(surplus)
}
