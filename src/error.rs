// ⚠️ Error taxonomy for the resolution + aggregation engine
//
// Only conditions a caller has to branch on live here. Record-level
// problems (bad weight, empty name) are counted and logged, never raised.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// A fund has holdings but no entry in the fund-total lookup.
    #[error("no declared total value for fund '{fund}'")]
    MissingDeclaredValue { fund: String },

    /// No adapter recognises the input file.
    #[error("could not detect source adapter for file: {file}")]
    UnknownSource { file: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    /// Fund-scoped errors abort one fund, not the whole run (unless configured to).
    pub fn is_fund_scoped(&self) -> bool {
        matches!(self, LedgerError::MissingDeclaredValue { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_declared_value_message() {
        let err = LedgerError::MissingDeclaredValue {
            fund: "ADAGE CAPITAL".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no declared total value for fund 'ADAGE CAPITAL'"
        );
        assert!(err.is_fund_scoped());
    }

    #[test]
    fn test_io_error_converts() {
        fn read(path: &str) -> Result<String> {
            Ok(std::fs::read_to_string(path)?)
        }

        let err = read("/nonexistent/exposure-ledger.toml").unwrap_err();
        assert!(matches!(err, LedgerError::Io(_)));
        assert!(!err.is_fund_scoped());
    }

    #[test]
    fn test_config_error_is_not_fund_scoped() {
        let err = LedgerError::Config("threshold out of range".to_string());
        assert!(!err.is_fund_scoped());
        assert!(err.to_string().contains("threshold out of range"));
    }
}
