use axum::{
    Router,
    extract::Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use clap::{Parser, ValueEnum, error::ErrorKind};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    DebtInput, DebtRecord, PlanError, Strategy, apply_monthly_payment, build_plan_report,
    compare_strategies, monthly_surplus,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliStrategy {
    Avalanche,
    Snowball,
}

impl From<CliStrategy> for Strategy {
    fn from(value: CliStrategy) -> Self {
        match value {
            CliStrategy::Avalanche => Strategy::Avalanche,
            CliStrategy::Snowball => Strategy::Snowball,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
enum ApiStrategy {
    #[serde(alias = "avalanche", alias = "AVALANCHE")]
    Avalanche,
    #[serde(alias = "snowball", alias = "SNOWBALL")]
    Snowball,
}

impl From<ApiStrategy> for Strategy {
    fn from(value: ApiStrategy) -> Self {
        match value {
            ApiStrategy::Avalanche => Strategy::Avalanche,
            ApiStrategy::Snowball => Strategy::Snowball,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PlanPayload {
    debts: Vec<DebtRecord>,
    incomes: Vec<f64>,
    expenses: Vec<f64>,
    surplus: Option<f64>,
    #[serde(alias = "strategy")]
    mode: Option<ApiStrategy>,
    #[serde(alias = "deletedCleared")]
    forgotten: Vec<String>,
}

#[derive(Parser, Debug)]
#[command(
    name = "payoff plan",
    about = "Debt repayment planner: avalanche (highest APR first) or snowball (smallest balance first)"
)]
struct Cli {
    #[arg(
        long = "debt",
        value_name = "NAME:PRINCIPAL:APR:MIN",
        value_parser = parse_debt_arg,
        required = true,
        help = "Debt to plan, APR in percent; repeat for each debt"
    )]
    debts: Vec<DebtInput>,
    #[arg(
        long,
        help = "Monthly surplus; derived from --income and --expense when omitted"
    )]
    surplus: Option<f64>,
    #[arg(long = "income", help = "Monthly income line; repeatable")]
    incomes: Vec<f64>,
    #[arg(long = "expense", help = "Monthly expense line; repeatable")]
    expenses: Vec<f64>,
    #[arg(long, value_enum, default_value_t = CliStrategy::Avalanche)]
    strategy: CliStrategy,
    #[arg(long, help = "Run both strategies and recommend the cheaper one")]
    compare: bool,
    #[arg(long = "forget", help = "Cleared debt name to leave out of the report")]
    forgotten: Vec<String>,
}

#[derive(Debug)]
struct PlanRequest {
    debts: Vec<DebtRecord>,
    surplus: f64,
    strategy: Strategy,
    forgotten: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(flatten)]
    details: Option<PlanError>,
}

fn parse_debt_arg(raw: &str) -> Result<DebtInput, String> {
    let mut parts = raw.rsplitn(4, ':');
    let (Some(min), Some(apr), Some(principal), Some(name)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(format!("expected NAME:PRINCIPAL:APR:MIN, got '{raw}'"));
    };

    let number = |label: &str, value: &str| {
        value
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid {label} '{value}' for debt '{name}': {e}"))
    };

    Ok(DebtInput::new(
        name.trim(),
        number("principal", principal)?,
        number("apr", apr)?,
        number("minimum payment", min)?,
    ))
}

fn build_request(cli: Cli) -> Result<PlanRequest, String> {
    if cli.surplus.is_none() && cli.incomes.is_empty() {
        return Err("--surplus or at least one --income is required".to_string());
    }

    let surplus = cli
        .surplus
        .unwrap_or_else(|| monthly_surplus(&cli.incomes, &cli.expenses));
    if !surplus.is_finite() {
        return Err("--surplus must be a finite amount".to_string());
    }

    Ok(PlanRequest {
        debts: cli.debts.into_iter().map(DebtRecord::from).collect(),
        surplus,
        strategy: cli.strategy.into(),
        forgotten: cli.forgotten,
    })
}

/// Runs the `plan` command and returns the report as pretty JSON.
pub fn run_plan_command<I, T>(args: I) -> Result<String, String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            return Ok(e.to_string());
        }
        Err(e) => return Err(e.to_string()),
    };
    let compare = cli.compare;
    let request = build_request(cli)?;

    let json = if compare {
        compare_strategies(&request.debts, request.surplus, &request.forgotten)
            .map(|comparison| serde_json::to_string_pretty(&comparison))
    } else {
        build_plan_report(
            &request.debts,
            request.surplus,
            request.strategy,
            &request.forgotten,
        )
        .map(|report| serde_json::to_string_pretty(&report))
    };

    match json {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(format!("failed to serialize plan: {e}")),
        Err(err) => Err(err.to_string()),
    }
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "payoff HTTP API listening");
    info!("local access: http://127.0.0.1:{port}/api/plan");

    axum::serve(listener, router()).await
}

fn router() -> Router {
    Router::new()
        .route("/api/plan", post(plan_handler))
        .route("/api/plan/compare", post(compare_handler))
        .route("/api/plan/pay", post(pay_handler))
        .fallback(not_found_handler)
}

async fn not_found_handler() -> Response {
    json_response(StatusCode::NOT_FOUND, not_found_body())
}

fn not_found_body() -> ErrorResponse {
    error_body("NOT_FOUND", "Not found")
}

async fn plan_handler(Json(payload): Json<PlanPayload>) -> Response {
    let request = match plan_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, "INVALID_REQUEST", &msg),
    };

    match build_plan_report(
        &request.debts,
        request.surplus,
        request.strategy,
        &request.forgotten,
    ) {
        Ok(report) => {
            info!(strategy = ?report.strategy, months = report.months, "plan built");
            json_response(StatusCode::OK, report)
        }
        Err(err) => plan_error_response(err),
    }
}

async fn compare_handler(Json(payload): Json<PlanPayload>) -> Response {
    let request = match plan_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, "INVALID_REQUEST", &msg),
    };

    match compare_strategies(&request.debts, request.surplus, &request.forgotten) {
        Ok(comparison) => {
            info!(best = ?comparison.best_strategy, "strategies compared");
            json_response(StatusCode::OK, comparison)
        }
        Err(err) => plan_error_response(err),
    }
}

async fn pay_handler(Json(payload): Json<PlanPayload>) -> Response {
    let request = match plan_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, "INVALID_REQUEST", &msg),
    };

    match apply_monthly_payment(&request.debts, request.surplus, request.strategy) {
        Ok(outcome) => {
            info!(cleared = outcome.cleared_now.len(), "monthly payment applied");
            json_response(StatusCode::OK, outcome)
        }
        Err(err) => plan_error_response(err),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, code: &str, msg: &str) -> Response {
    json_response(status, error_body(code, msg))
}

fn error_body(code: &str, msg: &str) -> ErrorResponse {
    ErrorResponse {
        error: code.to_string(),
        message: msg.to_string(),
        details: None,
    }
}

fn plan_error_response(err: PlanError) -> Response {
    let status = status_for(&err);
    warn!(code = err.code(), %status, "plan request failed: {err}");
    json_response(status, plan_error_body(err))
}

fn plan_error_body(err: PlanError) -> ErrorResponse {
    ErrorResponse {
        error: err.code().to_string(),
        message: err.to_string(),
        details: Some(err),
    }
}

fn status_for(err: &PlanError) -> StatusCode {
    match err {
        PlanError::InvalidDebt { .. } => StatusCode::BAD_REQUEST,
        // An empty debt list renders as a neutral state, not a failure.
        PlanError::NoDebts => StatusCode::OK,
        PlanError::InsufficientSurplus { .. }
        | PlanError::NoSurplus { .. }
        | PlanError::NonConvergentSimulation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

#[cfg(test)]
fn plan_request_from_json(json: &str) -> Result<PlanRequest, String> {
    let payload = serde_json::from_str::<PlanPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    plan_request_from_payload(payload)
}

fn plan_request_from_payload(payload: PlanPayload) -> Result<PlanRequest, String> {
    let surplus = payload
        .surplus
        .unwrap_or_else(|| monthly_surplus(&payload.incomes, &payload.expenses));
    if !surplus.is_finite() {
        return Err("surplus must be a finite amount".to_string());
    }

    for debt in &payload.debts {
        if [debt.amount, debt.interest, debt.minimum_payment, debt.total_paid]
            .iter()
            .any(|v| !v.is_finite())
        {
            return Err(format!("debt '{}' has a non-finite amount", debt.name));
        }
    }

    Ok(PlanRequest {
        debts: payload.debts,
        surplus,
        strategy: payload.mode.map(Into::into).unwrap_or(Strategy::Avalanche),
        forgotten: payload.forgotten,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PaymentType;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn cli_from(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("plan").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    #[test]
    fn parse_debt_arg_reads_all_fields() {
        let debt = parse_debt_arg("Credit card:1500.5:19.9:45").expect("valid debt");
        assert_eq!(debt.name, "Credit card");
        assert_approx(debt.principal, 1500.5);
        assert_approx(debt.apr, 19.9);
        assert_approx(debt.minimum_payment, 45.0);
    }

    #[test]
    fn parse_debt_arg_keeps_colons_in_names() {
        let debt = parse_debt_arg("Loan: car:900:4:100").expect("valid debt");
        assert_eq!(debt.name, "Loan: car");
        assert_approx(debt.principal, 900.0);
    }

    #[test]
    fn parse_debt_arg_rejects_bad_shapes() {
        let err = parse_debt_arg("Card:100:5").expect_err("too few fields");
        assert!(err.contains("NAME:PRINCIPAL:APR:MIN"));

        let err = parse_debt_arg("Card:lots:5:10").expect_err("bad number");
        assert!(err.contains("invalid principal"));
    }

    #[test]
    fn build_request_derives_surplus_from_income_and_expenses() {
        let cli = cli_from(&[
            "--debt",
            "Card:1000:20:50",
            "--income",
            "2500",
            "--income",
            "300",
            "--expense",
            "2400",
            "--strategy",
            "snowball",
        ]);
        let request = build_request(cli).expect("valid request");
        assert_approx(request.surplus, 400.0);
        assert_eq!(request.strategy, Strategy::Snowball);
        assert_eq!(request.debts.len(), 1);
        assert_eq!(request.debts[0].payment_type, PaymentType::Recurring);
        assert_approx(request.debts[0].amount, 1000.0);
    }

    #[test]
    fn build_request_prefers_explicit_surplus() {
        let cli = cli_from(&["--debt", "Card:1000:20:50", "--surplus", "120", "--income", "9"]);
        let request = build_request(cli).expect("valid request");
        assert_approx(request.surplus, 120.0);
        assert_eq!(request.strategy, Strategy::Avalanche);
    }

    #[test]
    fn build_request_requires_some_source_of_surplus() {
        let cli = cli_from(&["--debt", "Card:1000:20:50"]);
        let err = build_request(cli).expect_err("missing surplus must fail");
        assert!(err.contains("--surplus"));
    }

    #[test]
    fn plan_command_prints_report_json() {
        let text = run_plan_command(["plan", "--debt", "Loan:100:0:100", "--surplus", "100"])
            .expect("command should succeed");
        let value: serde_json::Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(value["months"], 1);
        assert_eq!(value["strategy"], "Avalanche");
        assert_eq!(value["clearedDebts"][0]["clearedMonth"], 1);
    }

    #[test]
    fn plan_command_reports_engine_errors_as_text() {
        let err = run_plan_command(["plan", "--debt", "Car:1000:10:200", "--surplus", "100"])
            .expect_err("must be infeasible");
        assert!(err.contains("does not cover minimum payments"));
    }

    #[test]
    fn plan_command_returns_argument_errors_instead_of_exiting() {
        let err = run_plan_command(["plan", "--debt", "Card:1000:20:50", "--bogus"])
            .expect_err("unknown flag must fail");
        assert!(err.contains("--bogus"));

        let err = run_plan_command(["plan", "--surplus", "100"]).expect_err("--debt is required");
        assert!(err.contains("--debt"));

        let help = run_plan_command(["plan", "--help"]).expect("help is not an error");
        assert!(help.contains("--surplus"));
    }

    #[test]
    fn not_found_body_matches_error_shape() {
        let json = serde_json::to_string(&not_found_body()).expect("body should serialize");
        assert_eq!(json, r#"{"error":"NOT_FOUND","message":"Not found"}"#);
    }

    #[test]
    fn plan_request_from_json_parses_web_keys() {
        let json = r#"{
          "debts": [
            { "name": "Card", "amount": 1000, "interest": 20, "minimumPayment": 50 },
            { "name": "Phone", "amount": 300, "interest": 0, "minimumPayment": 0, "paymentType": "one-time" }
          ],
          "incomes": [3000, 500],
          "expenses": [3200],
          "mode": "snowball",
          "deletedCleared": ["Old loan"]
        }"#;
        let request = plan_request_from_json(json).expect("json should parse");

        assert_approx(request.surplus, 300.0);
        assert_eq!(request.strategy, Strategy::Snowball);
        assert_eq!(request.debts.len(), 2);
        assert_eq!(request.debts[1].payment_type, PaymentType::OneTime);
        assert_eq!(request.forgotten, vec!["Old loan".to_string()]);
    }

    #[test]
    fn plan_request_defaults_to_avalanche_and_explicit_surplus_wins() {
        let json = r#"{ "debts": [], "surplus": 250, "incomes": [10] }"#;
        let request = plan_request_from_json(json).expect("json should parse");
        assert_approx(request.surplus, 250.0);
        assert_eq!(request.strategy, Strategy::Avalanche);
    }

    #[test]
    fn plan_request_rejects_unknown_mode() {
        let err = plan_request_from_json(r#"{ "mode": "random" }"#).expect_err("bad mode");
        assert!(err.contains("Invalid API JSON payload"));
    }

    #[test]
    fn plan_errors_map_to_statuses() {
        assert_eq!(status_for(&PlanError::NoDebts), StatusCode::OK);
        assert_eq!(
            status_for(&PlanError::NoSurplus { surplus: 0.0 }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&PlanError::InsufficientSurplus {
                supplied_surplus: 1.0,
                required_minimum: 2.0,
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&PlanError::NonConvergentSimulation {
                months: 600,
                remaining_balance: 10.0,
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&PlanError::InvalidDebt {
                name: "x".to_string(),
                reason: "duplicate name".to_string(),
            }),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn error_body_flattens_details() {
        let body = plan_error_body(PlanError::InsufficientSurplus {
            supplied_surplus: 100.0,
            required_minimum: 200.0,
        });
        let json = serde_json::to_string(&body).expect("error should serialize");
        assert!(json.contains("\"error\":\"INSUFFICIENT_SURPLUS\""));
        assert!(json.contains("\"kind\":\"InsufficientSurplus\""));
        assert!(json.contains("\"requiredMinimum\":200.0"));
        assert!(json.contains("\"message\":"));
    }

    #[test]
    fn plan_report_serialization_contains_expected_fields() {
        let request = plan_request_from_json(
            r#"{
              "debts": [
                { "name": "A", "amount": 1000, "interest": 20, "minimumPayment": 50 },
                { "name": "B", "amount": 200, "interest": 5, "minimumPayment": 20 }
              ],
              "surplus": 100
            }"#,
        )
        .expect("json should parse");
        let report = build_plan_report(
            &request.debts,
            request.surplus,
            request.strategy,
            &request.forgotten,
        )
        .expect("report should build");

        let json = serde_json::to_string(&report).expect("report should serialize");
        for key in [
            "\"strategy\":\"Avalanche\"",
            "\"bestStrategy\":\"Avalanche\"",
            "\"months\"",
            "\"totalInterestPaid\"",
            "\"totalPrincipal\"",
            "\"totalFutureInterest\"",
            "\"totalDebt\"",
            "\"clearedDebts\"",
            "\"timeline\"",
            "\"perDebtBreakdown\"",
            "\"extraPayment\"",
            "\"interestAccrued\"",
            "\"remainingBalance\"",
            "\"amountSaved\"",
        ] {
            assert!(json.contains(key), "missing {key}");
        }
    }
}
