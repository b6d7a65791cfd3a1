use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::{debug, warn};

use super::error::PlanError;
use super::money::{PAID_OFF_THRESHOLD, round_money};
use super::types::{
    BaselineResult, ClearedDebtRecord, DebtBreakdown, DebtInput, MonthRecord, MonthStep,
    PlanResult, Strategy,
};

/// Hard bound on the repayment loop. Reaching it means the input cannot converge.
pub const MAX_SIMULATION_MONTHS: u32 = 600;
/// Cap for the minimum-payment-only baseline behind `amount_saved`.
pub const BASELINE_MAX_MONTHS: u32 = 480;

#[derive(Debug, Clone)]
struct WorkingDebt {
    index: usize,
    name: String,
    balance: f64,
    apr: f64,
    minimum_payment: f64,
    interest_paid: f64,
}

impl WorkingDebt {
    fn from_input(index: usize, debt: &DebtInput) -> Self {
        Self {
            index,
            name: debt.name.clone(),
            balance: round_money(debt.principal.max(0.0)),
            apr: debt.apr,
            minimum_payment: round_money(debt.minimum_payment),
            interest_paid: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct MonthLedger {
    interest: f64,
    min_payment: f64,
    extra_payment: f64,
}

#[derive(Debug, Clone, Copy)]
struct ClearedEntry {
    index: usize,
    cleared_month: u32,
    interest_paid: f64,
}

/// Projects month-by-month repayment of `debts` under `strategy`.
///
/// Each month accrues interest, pays every minimum, then sends whatever is
/// left of `monthly_surplus` to a single target debt. The run ends when all
/// debts are cleared or the outstanding total drops to the paid-off threshold.
pub fn simulate(
    debts: &[DebtInput],
    monthly_surplus: f64,
    strategy: Strategy,
) -> Result<PlanResult, PlanError> {
    let surplus = validate_inputs(debts, monthly_surplus)?;

    let mut active = Vec::with_capacity(debts.len());
    let mut cleared = Vec::new();
    for (index, debt) in debts.iter().enumerate() {
        let working = WorkingDebt::from_input(index, debt);
        if working.balance <= 0.0 {
            cleared.push(ClearedEntry {
                index,
                cleared_month: 0,
                interest_paid: 0.0,
            });
        } else {
            active.push(working);
        }
    }

    let mut timeline: Vec<MonthRecord> = Vec::new();
    let mut total_interest = 0.0;

    if active.is_empty() {
        return Ok(assemble_report(debts, strategy, timeline, &cleared, 0.0));
    }

    for month in 1..=MAX_SIMULATION_MONTHS {
        let record = run_month(&mut active, surplus, strategy, month)?;
        total_interest = round_money(total_interest + record.total_interest);
        let remaining = record.remaining_balance;
        timeline.push(record);

        let (paid_off, still_open): (Vec<_>, Vec<_>) =
            active.into_iter().partition(|d| d.balance <= 0.0);
        cleared.extend(paid_off.iter().map(|d| cleared_entry(d, month)));
        active = still_open;

        if active.is_empty() || remaining <= PAID_OFF_THRESHOLD {
            // Residual cents under the threshold count as paid.
            cleared.extend(active.iter().map(|d| cleared_entry(d, month)));
            let plan = assemble_report(debts, strategy, timeline, &cleared, total_interest);
            debug!(
                strategy = ?plan.strategy,
                months = plan.months,
                total_interest = plan.total_interest_paid,
                "simulation finished"
            );
            return Ok(plan);
        }
    }

    let remaining_balance = round_money(active.iter().map(|d| d.balance).sum());
    warn!(
        strategy = ?strategy,
        remaining_balance,
        "simulation did not converge within {MAX_SIMULATION_MONTHS} months"
    );
    Err(PlanError::NonConvergentSimulation {
        months: MAX_SIMULATION_MONTHS,
        remaining_balance,
    })
}

/// Applies a single month of payments and returns the debts as they stand
/// afterwards. Debts with nothing owed are carried over unchanged.
pub fn pay_month(
    debts: &[DebtInput],
    monthly_surplus: f64,
    strategy: Strategy,
) -> Result<MonthStep, PlanError> {
    let surplus = validate_inputs(debts, monthly_surplus)?;

    let mut active: Vec<WorkingDebt> = debts
        .iter()
        .enumerate()
        .map(|(index, debt)| WorkingDebt::from_input(index, debt))
        .filter(|d| d.balance > 0.0)
        .collect();
    let record = run_month(&mut active, surplus, strategy, 1)?;

    let mut updated: Vec<DebtInput> = debts.to_vec();
    for debt in &mut updated {
        debt.principal = round_money(debt.principal.max(0.0));
    }
    for working in &active {
        updated[working.index].principal = working.balance;
    }

    Ok(MonthStep {
        record,
        debts: updated,
    })
}

/// Monthly interest on `balance` at `apr` percent, rounded to cents.
pub fn monthly_interest(balance: f64, apr: f64) -> f64 {
    if balance <= 0.0 || apr <= 0.0 {
        return 0.0;
    }
    round_money(balance * (apr / 100.0) / 12.0)
}

/// Amortizes the original principal paying only the contractual minimum.
pub fn baseline_amortization(debt: &DebtInput, max_months: u32) -> BaselineResult {
    let minimum = round_money(debt.minimum_payment.max(0.0));
    let mut balance = round_money(debt.principal.max(0.0));
    let mut months = 0;
    let mut interest_total = 0.0;
    let mut total_paid = 0.0;

    while balance > 0.0 && months < max_months {
        months += 1;
        let interest = monthly_interest(balance, debt.apr);
        interest_total = round_money(interest_total + interest);
        total_paid = round_money(total_paid + minimum.min(balance + interest));

        let principal_paid = (minimum - interest).max(0.0);
        balance = round_money((balance - principal_paid).max(0.0));
        if balance < 0.01 {
            balance = 0.0;
        }
    }

    BaselineResult {
        months,
        interest: interest_total,
        total_paid,
    }
}

fn validate_inputs(debts: &[DebtInput], monthly_surplus: f64) -> Result<f64, PlanError> {
    if debts.is_empty() {
        return Err(PlanError::NoDebts);
    }
    if !monthly_surplus.is_finite() {
        return Err(PlanError::invalid("surplus", "must be a finite amount"));
    }

    let mut seen = HashSet::with_capacity(debts.len());
    for debt in debts {
        let name = debt.name.trim();
        if name.is_empty() {
            return Err(PlanError::invalid(&debt.name, "name must not be empty"));
        }
        if !seen.insert(name) {
            return Err(PlanError::invalid(name, "duplicate name"));
        }
        for (label, value) in [
            ("principal", debt.principal),
            ("apr", debt.apr),
            ("minimum payment", debt.minimum_payment),
        ] {
            if !value.is_finite() {
                return Err(PlanError::invalid(name, format!("{label} must be finite")));
            }
        }
        if debt.apr < 0.0 {
            return Err(PlanError::invalid(name, "apr must be >= 0"));
        }
        if debt.minimum_payment < 0.0 {
            return Err(PlanError::invalid(name, "minimum payment must be >= 0"));
        }
    }

    Ok(round_money(monthly_surplus))
}

fn run_month(
    active: &mut [WorkingDebt],
    surplus: f64,
    strategy: Strategy,
    month: u32,
) -> Result<MonthRecord, PlanError> {
    let mut ledger = accrue_interest(active);
    allocate_payments(active, &mut ledger, surplus, strategy)?;
    Ok(month_record(month, active, &ledger))
}

fn accrue_interest(active: &[WorkingDebt]) -> Vec<MonthLedger> {
    active
        .iter()
        .map(|d| MonthLedger {
            interest: monthly_interest(d.balance, d.apr),
            ..MonthLedger::default()
        })
        .collect()
}

/// Pays every minimum, then the single strategy target. Nothing is mutated
/// when the surplus cannot cover this month's minimums.
fn allocate_payments(
    active: &mut [WorkingDebt],
    ledger: &mut [MonthLedger],
    surplus: f64,
    strategy: Strategy,
) -> Result<(), PlanError> {
    let mut total_minimum = 0.0;
    for (debt, entry) in active.iter().zip(ledger.iter_mut()) {
        entry.min_payment = round_money(debt.minimum_payment.min(debt.balance + entry.interest));
        total_minimum = round_money(total_minimum + entry.min_payment);
    }

    if surplus < total_minimum {
        return Err(PlanError::InsufficientSurplus {
            supplied_surplus: surplus,
            required_minimum: total_minimum,
        });
    }

    for (debt, entry) in active.iter_mut().zip(ledger.iter()) {
        let principal_paid = (entry.min_payment - entry.interest).max(0.0);
        debt.balance = round_money((debt.balance - principal_paid).max(0.0));
        debt.interest_paid = round_money(debt.interest_paid + entry.interest);
    }

    let extra_budget = round_money(surplus - total_minimum);
    if extra_budget > 0.0 {
        if let Some(pos) = select_target(active, strategy) {
            let target = &mut active[pos];
            let extra = round_money(extra_budget.min(target.balance));
            target.balance = round_money(target.balance - extra);
            ledger[pos].extra_payment = extra;
        }
    }

    Ok(())
}

/// Picks the one debt that receives this month's extra budget.
///
/// Only debts still owing compete. Avalanche ranks by APR descending and
/// Snowball by balance ascending; equal ranks go to the debt supplied first.
/// The comparator is total, so the choice never depends on sort stability.
fn select_target(active: &[WorkingDebt], strategy: Strategy) -> Option<usize> {
    active
        .iter()
        .enumerate()
        .filter(|(_, d)| d.balance > 0.0)
        .min_by(|(_, a), (_, b)| target_order(a, b, strategy))
        .map(|(pos, _)| pos)
}

fn target_order(a: &WorkingDebt, b: &WorkingDebt, strategy: Strategy) -> Ordering {
    let rank = match strategy {
        Strategy::Avalanche => b.apr.total_cmp(&a.apr),
        Strategy::Snowball => a.balance.total_cmp(&b.balance),
    };
    rank.then_with(|| a.index.cmp(&b.index))
}

fn month_record(month: u32, active: &[WorkingDebt], ledger: &[MonthLedger]) -> MonthRecord {
    let per_debt_breakdown: Vec<DebtBreakdown> = active
        .iter()
        .zip(ledger)
        .map(|(debt, entry)| DebtBreakdown {
            name: debt.name.clone(),
            min_payment: entry.min_payment,
            extra_payment: entry.extra_payment,
            interest_accrued: entry.interest,
            remaining_balance: debt.balance,
        })
        .collect();

    MonthRecord {
        month,
        total_payment: round_money(per_debt_breakdown.iter().map(|b| b.total_payment()).sum()),
        total_interest: round_money(per_debt_breakdown.iter().map(|b| b.interest_accrued).sum()),
        remaining_balance: round_money(
            per_debt_breakdown.iter().map(|b| b.remaining_balance).sum(),
        ),
        per_debt_breakdown,
    }
}

fn cleared_entry(debt: &WorkingDebt, month: u32) -> ClearedEntry {
    ClearedEntry {
        index: debt.index,
        cleared_month: month,
        interest_paid: debt.interest_paid,
    }
}

fn assemble_report(
    debts: &[DebtInput],
    strategy: Strategy,
    timeline: Vec<MonthRecord>,
    cleared: &[ClearedEntry],
    total_interest: f64,
) -> PlanResult {
    let cleared_debts = cleared
        .iter()
        .map(|entry| {
            let debt = &debts[entry.index];
            if entry.cleared_month == 0 {
                return ClearedDebtRecord {
                    name: debt.name.clone(),
                    cleared_month: 0,
                    total_paid: 0.0,
                    amount_saved: 0.0,
                };
            }

            let baseline = baseline_amortization(debt, BASELINE_MAX_MONTHS);
            let amount_saved = round_money(baseline.interest - entry.interest_paid).max(0.0);
            let total_paid = round_money(
                timeline
                    .iter()
                    .flat_map(|m| m.per_debt_breakdown.iter())
                    .filter(|b| b.name == debt.name)
                    .map(|b| b.total_payment())
                    .sum(),
            );

            ClearedDebtRecord {
                name: debt.name.clone(),
                cleared_month: entry.cleared_month,
                total_paid,
                amount_saved,
            }
        })
        .collect();

    PlanResult {
        strategy,
        months: timeline.len() as u32,
        total_interest_paid: total_interest,
        cleared_debts,
        timeline,
    }
}
