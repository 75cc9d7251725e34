//! Exit codes for the etest CLI.
//!
//! Exit code ranges:
//! - 0-1: Outcomes (parse the outcome from the code, not the output)
//! - 10-19: User/environment errors (recoverable by user action)
//! - 20-29: Internal errors (bugs, should be reported)

use crate::calibrate::CalibrationError;
use crate::config::ConfigError;
use crate::etest::EtestError;

/// Process exit codes. Stable for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Completed; nothing significant to report
    Clean = 0,

    /// `pvalue --alpha` was given and p < alpha
    Significant = 1,

    /// Invalid arguments or test preconditions
    ArgsError = 10,

    /// Calibration config missing, unparsable or invalid
    ConfigError = 11,

    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Codes 20 and up point at a bug or the environment, not the caller.
    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Error code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::Significant => "OK_SIGNIFICANT",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

impl From<&EtestError> for ExitCode {
    fn from(err: &EtestError) -> Self {
        if err.is_precondition() {
            ExitCode::ArgsError
        } else {
            ExitCode::InternalError
        }
    }
}

impl From<&ConfigError> for ExitCode {
    fn from(err: &ConfigError) -> Self {
        match err {
            ConfigError::IoError { .. } => ExitCode::IoError,
            _ => ExitCode::ConfigError,
        }
    }
}

impl From<&CalibrationError> for ExitCode {
    fn from(err: &CalibrationError) -> Self {
        match err {
            CalibrationError::InvalidConfig(_) => ExitCode::ConfigError,
            CalibrationError::InvalidSamplingMean { .. } => ExitCode::InternalError,
            CalibrationError::Etest { source, .. } => ExitCode::from(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationError;
    use std::path::PathBuf;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ExitCode::Clean.as_i32(), 0);
        assert_eq!(ExitCode::Significant.as_i32(), 1);
        assert_eq!(ExitCode::ArgsError.as_i32(), 10);
        assert_eq!(ExitCode::ConfigError.as_i32(), 11);
        assert_eq!(ExitCode::InternalError.as_i32(), 20);
        assert_eq!(i32::from(ExitCode::IoError), 21);
    }

    #[test]
    fn ranges() {
        assert!(!ExitCode::Significant.is_internal_error());
        assert!(!ExitCode::ConfigError.is_internal_error());
        assert!(ExitCode::InternalError.is_internal_error());
        assert!(ExitCode::IoError.is_internal_error());
    }

    #[test]
    fn display_includes_name_and_code() {
        assert_eq!(ExitCode::ArgsError.to_string(), "ERR_ARGS (10)");
    }

    #[test]
    fn error_mapping() {
        let precondition = EtestError::NonPositiveExposure {
            sample: 1,
            value: 0.0,
        };
        assert_eq!(ExitCode::from(&precondition), ExitCode::ArgsError);

        let range = EtestError::ResultOutOfRange { raw: 1.5 };
        assert_eq!(ExitCode::from(&range), ExitCode::InternalError);

        let io = ConfigError::IoError {
            path: PathBuf::from("x"),
            source: std::io::Error::other("boom"),
        };
        assert_eq!(ExitCode::from(&io), ExitCode::IoError);
        let missing = ConfigError::NotFound {
            path: PathBuf::from("x"),
        };
        assert_eq!(ExitCode::from(&missing), ExitCode::ConfigError);

        let invalid = CalibrationError::InvalidConfig(ValidationError::ZeroTrials);
        assert_eq!(ExitCode::from(&invalid), ExitCode::ConfigError);
    }
}
