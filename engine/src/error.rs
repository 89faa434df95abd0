use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalcError {
    // Missing, non-finite or wrong-sign field. The message is shown to the user as-is.
    #[error("{0}")]
    InvalidInput(String),

    // Value parsed fine but falls outside the plausible range for the model.
    #[error("{0}")]
    OutOfRange(String),

    // Payment does not exceed the interest accrued for the period.
    #[error("{0}")]
    PaymentTrap(String),

    // Iteration cap reached before the balance was cleared.
    #[error("{0}")]
    HorizonExceeded(String),

    #[error("Unknown calculator: {0}")]
    UnknownCalculator(String),

    #[error("Invalid parameters: {source}")]
    Parameters {
        #[from]
        source: serde_json::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("CSV output error: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

pub type CalcResult<T> = Result<T, CalcError>;

impl CalcError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        CalcError::InvalidInput(msg.into())
    }

    pub fn out_of_range(msg: impl Into<String>) -> Self {
        CalcError::OutOfRange(msg.into())
    }

    /// Errors a user can fix by changing their inputs. These become error reports
    /// instead of failing the command.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            CalcError::InvalidInput(_)
                | CalcError::OutOfRange(_)
                | CalcError::PaymentTrap(_)
                | CalcError::HorizonExceeded(_)
                | CalcError::Parameters { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_classification() {
        assert!(CalcError::invalid("Enter a valid balance greater than 0.").is_user_facing());
        assert!(CalcError::PaymentTrap("trap".into()).is_user_facing());
        assert!(!CalcError::UnknownCalculator("nope".into()).is_user_facing());
        assert!(!CalcError::Config("bad".into()).is_user_facing());
    }

    #[test]
    fn test_display_passes_message_through() {
        let err = CalcError::out_of_range("Deflection limit looks unusual. Use a value between L/180 and L/720.");
        assert_eq!(err.to_string(), "Deflection limit looks unusual. Use a value between L/180 and L/720.");
        assert_eq!(CalcError::UnknownCalculator("x".into()).to_string(), "Unknown calculator: x");
    }
}
