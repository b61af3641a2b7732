pub mod error;

pub use error::{
    CrossCheckError, ErrorCategory, ErrorClassifier, FailureKind, LlmError, Result,
    parse_rate_limit_delay,
};
