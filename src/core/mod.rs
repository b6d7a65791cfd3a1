mod budget;
mod engine;
mod error;
mod money;
mod planner;
mod types;

pub use budget::{monthly_surplus, require_positive_surplus};
pub use engine::{
    BASELINE_MAX_MONTHS, MAX_SIMULATION_MONTHS, baseline_amortization, monthly_interest,
    pay_month, simulate,
};
pub use error::PlanError;
pub use money::{PAID_OFF_THRESHOLD, round_money};
pub use planner::{
    DebtRecord, OneTimeShortage, PaymentOutcome, PaymentType, PlanReport, StrategyComparison,
    apply_monthly_payment, build_plan_report, compare_strategies, recommend,
};
pub use types::{
    BaselineResult, ClearedDebtRecord, DebtBreakdown, DebtInput, MonthRecord, MonthStep,
    PlanResult, Strategy,
};
