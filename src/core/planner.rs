use std::thread;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::budget::require_positive_surplus;
use super::engine::{baseline_amortization, pay_month, simulate};
use super::error::PlanError;
use super::money::round_money;
use super::types::{ClearedDebtRecord, DebtBreakdown, DebtInput, MonthRecord, Strategy};

/// Cap for the minimum-only schedule behind a stored debt's saving figure.
pub const PLANNED_TOTAL_MAX_MONTHS: u32 = 600;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentType {
    #[default]
    Recurring,
    #[serde(alias = "oneTime", alias = "one_time")]
    OneTime,
}

/// A debt as the surrounding application stores it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DebtRecord {
    pub name: String,
    pub amount: f64,
    /// APR in percent.
    pub interest: f64,
    pub minimum_payment: f64,
    pub payment_type: PaymentType,
    pub cleared: bool,
    pub total_paid: f64,
    pub original_amount: Option<f64>,
}

impl DebtRecord {
    fn is_settled(&self) -> bool {
        self.cleared || self.amount <= 0.0
    }

    fn to_input(&self) -> DebtInput {
        DebtInput::new(
            self.name.clone(),
            self.amount,
            self.interest,
            self.minimum_payment,
        )
    }
}

impl From<DebtInput> for DebtRecord {
    fn from(value: DebtInput) -> Self {
        Self {
            name: value.name,
            amount: value.principal,
            interest: value.apr,
            minimum_payment: value.minimum_payment,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OneTimeShortage {
    pub name: String,
    pub amount: f64,
    pub shortage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanReport {
    pub strategy: Strategy,
    pub best_strategy: Strategy,
    pub months: u32,
    pub total_interest_paid: f64,
    pub total_principal: f64,
    pub total_future_interest: f64,
    pub total_debt: f64,
    pub one_time_shortages: Vec<OneTimeShortage>,
    pub cleared_debts: Vec<ClearedDebtRecord>,
    pub timeline: Vec<MonthRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyComparison {
    pub best_strategy: Strategy,
    pub avalanche: PlanReport,
    pub snowball: PlanReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
    pub record: MonthRecord,
    pub debts: Vec<DebtRecord>,
    pub cleared_now: Vec<String>,
}

/// Builds the full plan view for stored debts.
///
/// Recurring debts go through the simulation. One-time debts only count
/// towards the principal total and are flagged when the surplus cannot cover
/// them. Settled debts are listed as cleared unless their name is in
/// `forgotten`.
pub fn build_plan_report(
    debts: &[DebtRecord],
    surplus: f64,
    strategy: Strategy,
    forgotten: &[String],
) -> Result<PlanReport, PlanError> {
    let surplus = require_positive_surplus(surplus)?;
    let is_forgotten = |name: &str| forgotten.iter().any(|f| f == name);

    let mut cleared_debts: Vec<ClearedDebtRecord> = debts
        .iter()
        .filter(|d| d.is_settled() && !is_forgotten(&d.name))
        .map(stored_cleared_record)
        .collect();

    let one_time: Vec<&DebtRecord> = debts
        .iter()
        .filter(|d| !d.is_settled() && d.payment_type == PaymentType::OneTime)
        .collect();
    let recurring: Vec<DebtInput> = debts
        .iter()
        .filter(|d| !d.is_settled() && d.payment_type == PaymentType::Recurring)
        .map(DebtRecord::to_input)
        .collect();

    let one_time_shortages = one_time
        .iter()
        .filter(|d| d.amount > surplus)
        .map(|d| OneTimeShortage {
            name: d.name.clone(),
            amount: round_money(d.amount),
            shortage: round_money(d.amount - surplus),
        })
        .collect();

    let one_time_principal: f64 = one_time.iter().map(|d| d.amount).sum();
    let recurring_principal: f64 = recurring.iter().map(|d| d.principal).sum();
    let total_principal = round_money(one_time_principal + recurring_principal);

    if recurring.is_empty() {
        return Ok(PlanReport {
            strategy,
            best_strategy: strategy,
            months: 0,
            total_interest_paid: 0.0,
            total_principal,
            total_future_interest: 0.0,
            total_debt: total_principal,
            one_time_shortages,
            cleared_debts,
            timeline: Vec::new(),
        });
    }

    let plan = simulate(&recurring, surplus, strategy)?;
    cleared_debts.extend(
        plan.cleared_debts
            .into_iter()
            .filter(|c| !is_forgotten(&c.name)),
    );

    Ok(PlanReport {
        strategy: plan.strategy,
        best_strategy: plan.strategy,
        months: plan.months,
        total_interest_paid: plan.total_interest_paid,
        total_principal,
        total_future_interest: plan.total_interest_paid,
        total_debt: round_money(total_principal + plan.total_interest_paid),
        one_time_shortages,
        cleared_debts,
        timeline: plan.timeline,
    })
}

/// Runs both strategies side by side and recommends the cheaper one.
pub fn compare_strategies(
    debts: &[DebtRecord],
    surplus: f64,
    forgotten: &[String],
) -> Result<StrategyComparison, PlanError> {
    let (avalanche, snowball) = thread::scope(|scope| {
        let snowball =
            scope.spawn(|| build_plan_report(debts, surplus, Strategy::Snowball, forgotten));
        let avalanche = build_plan_report(debts, surplus, Strategy::Avalanche, forgotten);
        let snowball = snowball
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
        (avalanche, snowball)
    });
    let (mut avalanche, mut snowball) = (avalanche?, snowball?);

    let best_strategy = recommend(&avalanche, &snowball);
    avalanche.best_strategy = best_strategy;
    snowball.best_strategy = best_strategy;
    debug!(
        ?best_strategy,
        avalanche_interest = avalanche.total_interest_paid,
        snowball_interest = snowball.total_interest_paid,
        "compared strategies"
    );

    Ok(StrategyComparison {
        best_strategy,
        avalanche,
        snowball,
    })
}

/// Applies this month's payments to stored debts and returns the updated records.
///
/// Unsettled one-time debts are paid in full first and count towards the
/// month's required minimum. What is left of the surplus goes through
/// [`pay_month`] for the recurring debts. Settled debts are returned as they
/// came in.
pub fn apply_monthly_payment(
    debts: &[DebtRecord],
    surplus: f64,
    strategy: Strategy,
) -> Result<PaymentOutcome, PlanError> {
    let surplus = require_positive_surplus(surplus)?;

    let (one_time, recurring): (Vec<usize>, Vec<usize>) = debts
        .iter()
        .enumerate()
        .filter(|(_, d)| !d.is_settled())
        .map(|(i, _)| i)
        .partition(|&i| debts[i].payment_type == PaymentType::OneTime);
    if one_time.is_empty() && recurring.is_empty() {
        return Err(PlanError::NoDebts);
    }

    let one_time_total = round_money(one_time.iter().map(|&i| debts[i].amount).sum());
    let left_for_recurring = round_money(surplus - one_time_total);

    let (mut record, paid_recurring) = if recurring.is_empty() {
        if left_for_recurring < 0.0 {
            return Err(PlanError::InsufficientSurplus {
                supplied_surplus: surplus,
                required_minimum: one_time_total,
            });
        }
        let empty = MonthRecord {
            month: 1,
            total_payment: 0.0,
            total_interest: 0.0,
            remaining_balance: 0.0,
            per_debt_breakdown: Vec::new(),
        };
        (empty, Vec::new())
    } else {
        let inputs: Vec<DebtInput> = recurring.iter().map(|&i| debts[i].to_input()).collect();
        let step = pay_month(&inputs, left_for_recurring, strategy).map_err(|err| match err {
            PlanError::InsufficientSurplus {
                required_minimum, ..
            } => PlanError::InsufficientSurplus {
                supplied_surplus: surplus,
                required_minimum: round_money(required_minimum + one_time_total),
            },
            other => other,
        })?;
        (step.record, step.debts)
    };

    record
        .per_debt_breakdown
        .extend(one_time.iter().map(|&i| DebtBreakdown {
            name: debts[i].name.clone(),
            min_payment: round_money(debts[i].amount),
            extra_payment: 0.0,
            interest_accrued: 0.0,
            remaining_balance: 0.0,
        }));
    record.total_payment = round_money(record.total_payment + one_time_total);

    let mut updated = debts.to_vec();
    let new_amounts = recurring
        .iter()
        .zip(paid_recurring.iter().map(|d| d.principal))
        .chain(one_time.iter().map(|i| (i, 0.0)));
    for (&i, amount) in new_amounts {
        let debt = &mut updated[i];
        let spent: f64 = record
            .per_debt_breakdown
            .iter()
            .filter(|b| b.name == debt.name)
            .map(|b| b.total_payment())
            .sum();

        if debt.original_amount.is_none() {
            debt.original_amount = Some(debt.amount);
        }
        debt.amount = amount;
        debt.total_paid = round_money(debt.total_paid + spent);
        if debt.amount <= 0.0 {
            debt.amount = 0.0;
            debt.cleared = true;
        }
    }
    let cleared_now = updated
        .iter()
        .zip(debts)
        .filter(|(after, before)| after.cleared && !before.is_settled())
        .map(|(after, _)| after.name.clone())
        .collect();

    Ok(PaymentOutcome {
        record,
        debts: updated,
        cleared_now,
    })
}

/// Lower total interest wins, then fewer months, then Avalanche.
pub fn recommend(avalanche: &PlanReport, snowball: &PlanReport) -> Strategy {
    let by_interest = snowball
        .total_interest_paid
        .total_cmp(&avalanche.total_interest_paid);
    let by_months = snowball.months.cmp(&avalanche.months);
    if by_interest.then(by_months).is_lt() {
        Strategy::Snowball
    } else {
        Strategy::Avalanche
    }
}

fn stored_cleared_record(debt: &DebtRecord) -> ClearedDebtRecord {
    ClearedDebtRecord {
        name: debt.name.clone(),
        cleared_month: 0,
        total_paid: round_money(debt.total_paid),
        amount_saved: round_money(planned_total(debt) - debt.total_paid).max(0.0),
    }
}

/// What the debt would have cost paying only its minimum from the start.
fn planned_total(debt: &DebtRecord) -> f64 {
    if debt.payment_type == PaymentType::OneTime {
        return round_money(debt.amount);
    }
    let original = DebtInput::new(
        debt.name.clone(),
        debt.original_amount.unwrap_or(debt.amount),
        debt.interest,
        debt.minimum_payment,
    );
    baseline_amortization(&original, PLANNED_TOTAL_MAX_MONTHS).total_paid
}
