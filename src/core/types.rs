use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// Extra money goes to the highest APR first.
    Avalanche,
    /// Extra money goes to the smallest balance first.
    Snowball,
}

/// A debt as supplied by the caller. Never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtInput {
    pub name: String,
    pub principal: f64,
    pub apr: f64,
    pub minimum_payment: f64,
}

impl DebtInput {
    pub fn new(name: impl Into<String>, principal: f64, apr: f64, minimum_payment: f64) -> Self {
        Self {
            name: name.into(),
            principal,
            apr,
            minimum_payment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtBreakdown {
    pub name: String,
    pub min_payment: f64,
    pub extra_payment: f64,
    pub interest_accrued: f64,
    pub remaining_balance: f64,
}

impl DebtBreakdown {
    pub fn total_payment(&self) -> f64 {
        self.min_payment + self.extra_payment
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthRecord {
    pub month: u32,
    pub total_payment: f64,
    pub total_interest: f64,
    pub remaining_balance: f64,
    pub per_debt_breakdown: Vec<DebtBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearedDebtRecord {
    pub name: String,
    /// 0 when the debt was already cleared before month 1.
    pub cleared_month: u32,
    pub total_paid: f64,
    pub amount_saved: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResult {
    pub strategy: Strategy,
    pub months: u32,
    pub total_interest_paid: f64,
    pub cleared_debts: Vec<ClearedDebtRecord>,
    pub timeline: Vec<MonthRecord>,
}

/// Outcome of a minimum-payment-only amortization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselineResult {
    pub months: u32,
    pub interest: f64,
    pub total_paid: f64,
}

/// One month applied to a set of debts, with the new principals.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthStep {
    pub record: MonthRecord,
    pub debts: Vec<DebtInput>,
}
