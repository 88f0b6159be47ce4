//! Result value reported by every concurrent unit to its fan-in point.

use crate::StitchError;

/// What a worker reports once it is done with its subject.
///
/// `subject` identifies what the worker acted on: a part URL for segment
/// fetches, a stream name for downloads and merges.
#[derive(Debug)]
pub enum Outcome<T> {
    Success { subject: String, value: T },
    Failure { subject: String, cause: StitchError },
}

impl<T> Outcome<T> {
    pub fn success(subject: impl Into<String>, value: T) -> Self {
        Self::Success {
            subject: subject.into(),
            value,
        }
    }

    pub fn failure(subject: impl Into<String>, cause: StitchError) -> Self {
        Self::Failure {
            subject: subject.into(),
            cause,
        }
    }

    /// Wrap the result of a fallible unit of work.
    pub fn from_result(subject: impl Into<String>, result: Result<T, StitchError>) -> Self {
        match result {
            Ok(value) => Self::success(subject, value),
            Err(cause) => Self::failure(subject, cause),
        }
    }

    pub fn subject(&self) -> &str {
        match self {
            Self::Success { subject, .. } | Self::Failure { subject, .. } => subject,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn into_result(self) -> Result<T, StitchError> {
        match self {
            Self::Success { value, .. } => Ok(value),
            Self::Failure { cause, .. } => Err(cause),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_result_keeps_subject_for_both_arms() {
        let ok: Outcome<u32> = Outcome::from_result("http://h/a/seg-1.ts", Ok(7));
        assert!(ok.is_success());
        assert_eq!(ok.subject(), "http://h/a/seg-1.ts");
        assert_eq!(ok.into_result().unwrap(), 7);

        let failed: Outcome<u32> =
            Outcome::from_result("show", Err(StitchError::internal("gone")));
        assert!(!failed.is_success());
        assert_eq!(failed.subject(), "show");
        assert_eq!(
            failed.into_result().unwrap_err().to_string(),
            "internal error: gone"
        );
    }
}
