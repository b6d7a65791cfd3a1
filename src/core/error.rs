use serde::Serialize;
use thiserror::Error;

/// Every way a plan request can fail. Returned as a value, never panicked.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all_fields = "camelCase")]
pub enum PlanError {
    #[error("no debts to plan")]
    NoDebts,

    #[error(
        "monthly surplus {supplied_surplus:.2} does not cover minimum payments of {required_minimum:.2}"
    )]
    InsufficientSurplus {
        supplied_surplus: f64,
        required_minimum: f64,
    },

    #[error(
        "balances did not converge within {months} months ({remaining_balance:.2} still owed)"
    )]
    NonConvergentSimulation { months: u32, remaining_balance: f64 },

    #[error("invalid debt '{name}': {reason}")]
    InvalidDebt { name: String, reason: String },

    #[error("no monthly surplus ({surplus:.2}); increase income or reduce expenses")]
    NoSurplus { surplus: f64 },
}

impl PlanError {
    /// Stable upper-case code rendered by the API.
    pub fn code(&self) -> &'static str {
        match self {
            PlanError::NoDebts => "NO_DEBTS",
            PlanError::InsufficientSurplus { .. } => "INSUFFICIENT_SURPLUS",
            PlanError::NonConvergentSimulation { .. } => "NON_CONVERGENT_SIMULATION",
            PlanError::InvalidDebt { .. } => "INVALID_DEBT",
            PlanError::NoSurplus { .. } => "NO_SURPLUS",
        }
    }

    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        PlanError::InvalidDebt {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_surplus_serializes_with_kind_tag() {
        let err = PlanError::InsufficientSurplus {
            supplied_surplus: 100.0,
            required_minimum: 200.0,
        };
        let json = serde_json::to_string(&err).expect("error should serialize");
        assert!(json.contains("\"kind\":\"InsufficientSurplus\""));
        assert!(json.contains("\"suppliedSurplus\":100.0"));
        assert!(json.contains("\"requiredMinimum\":200.0"));
    }

    #[test]
    fn display_messages_carry_amounts() {
        let err = PlanError::NoSurplus { surplus: -50.0 };
        assert_eq!(
            err.to_string(),
            "no monthly surplus (-50.00); increase income or reduce expenses"
        );
        assert_eq!(err.code(), "NO_SURPLUS");
    }
}
