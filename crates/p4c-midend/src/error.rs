//! Fatal middle-end errors.
//!
//! Recoverable semantic errors are [`p4c_common::Diagnostic`]s accumulated
//! in the pass context; the types here abort the current pipeline at once.

use thiserror::Error;

use crate::pass::SideTables;

/// A call or constructor call that matches none of the known kinds. The
/// type checker accepted something the middle-end cannot classify.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassificationError {
    #[error("cannot classify call `{call}`: {reason}")]
    Call { call: String, reason: String },

    #[error("cannot classify constructor call `{call}`: {reason}")]
    Constructor { call: String, reason: String },
}

#[derive(Debug, Error)]
pub enum MidendError {
    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error("recursive inlining: {}", cycle.join(" -> "))]
    RecursiveInlining { cycle: Vec<String> },

    #[error("pass `{pass}` needs side tables {stale:?} that are stale")]
    StaleSideTables { pass: String, stale: SideTables },

    #[error("internal error in `{pass}`: {message}")]
    Internal { pass: String, message: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid middle-end options: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        let err = MidendError::RecursiveInlining {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "recursive inlining: a -> b -> a");

        let err: MidendError = ClassificationError::Call {
            call: "f()".into(),
            reason: "callee is a table".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "cannot classify call `f()`: callee is a table"
        );
    }
}
