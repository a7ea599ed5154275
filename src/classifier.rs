// Facility Gateway - Occupancy and environmental telemetry gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Store error classification
//!
//! Separates "the store is simply not there" (safe to mask with synthetic
//! data) from "something is actively wrong" (must reach an operator). The
//! decision is a lookup in a table of soft codes; every code not in the
//! table is a hard failure.

use crate::error::{ErrorCode, StoreError};
use std::collections::HashSet;

/// Outcome of classifying a store error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Answer with synthetic data, status 200
    SoftFallback(ErrorCode),
    /// Surface the failure with diagnostics, status 502
    HardFail(ErrorCode),
}

impl Classification {
    pub fn code(&self) -> &ErrorCode {
        match self {
            Self::SoftFallback(code) | Self::HardFail(code) => code,
        }
    }

    pub fn is_soft(&self) -> bool {
        matches!(self, Self::SoftFallback(_))
    }
}

/// Codes masked by default: host not found, connection refused,
/// authentication rejected.
pub fn default_soft_codes() -> Vec<ErrorCode> {
    vec![
        ErrorCode::HostNotFound,
        ErrorCode::ConnectionRefused,
        ErrorCode::AuthenticationRejected,
    ]
}

/// Table-driven error classifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorClassifier {
    soft_codes: HashSet<ErrorCode>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::with_soft_codes(default_soft_codes())
    }
}

impl ErrorClassifier {
    /// Classifier masking exactly the given codes
    pub fn with_soft_codes(codes: impl IntoIterator<Item = ErrorCode>) -> Self {
        Self {
            soft_codes: codes.into_iter().collect(),
        }
    }

    /// Add a code to the soft table
    pub fn add_soft_code(&mut self, code: ErrorCode) {
        self.soft_codes.insert(code);
    }

    /// Extend the default table with more codes
    pub fn extended(codes: impl IntoIterator<Item = ErrorCode>) -> Self {
        let mut classifier = Self::default();
        for code in codes {
            classifier.add_soft_code(code);
        }
        classifier
    }

    pub fn is_soft(&self, code: &ErrorCode) -> bool {
        self.soft_codes.contains(code)
    }

    /// Classify a tagged store error
    pub fn classify(&self, error: &StoreError) -> Classification {
        let code = error.code().clone();
        if self.is_soft(&code) {
            Classification::SoftFallback(code)
        } else {
            Classification::HardFail(code)
        }
    }

    /// Soft codes in wire form, sorted
    pub fn soft_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.soft_codes.iter().map(ErrorCode::as_code).collect();
        codes.sort();
        codes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect_error(code: ErrorCode) -> StoreError {
        StoreError::connect(code, "db.facility.local", 5432, "boom")
    }

    #[test]
    fn test_default_soft_codes() {
        let classifier = ErrorClassifier::default();
        for code in default_soft_codes() {
            let result = classifier.classify(&connect_error(code.clone()));
            assert_eq!(result, Classification::SoftFallback(code));
        }
    }

    #[test]
    fn test_everything_else_is_hard() {
        let classifier = ErrorClassifier::default();
        let hard = [
            ErrorCode::TimedOut,
            ErrorCode::ConnectionReset,
            ErrorCode::HostUnreachable,
            ErrorCode::Tls,
            ErrorCode::PoolClosed,
            ErrorCode::Protocol,
            ErrorCode::Sql("42P01".into()),
            ErrorCode::Other("mystery".into()),
        ];
        for code in hard {
            let result = classifier.classify(&connect_error(code.clone()));
            assert!(!result.is_soft(), "{code} should be hard");
            assert_eq!(result.code(), &code);
        }
    }

    #[test]
    fn test_query_errors_use_same_table() {
        let classifier = ErrorClassifier::default();
        let err = StoreError::query(ErrorCode::Sql("57014".into()), "db", 5432, "canceled");
        assert!(matches!(classifier.classify(&err), Classification::HardFail(_)));
    }

    #[test]
    fn test_extended_table() {
        let classifier = ErrorClassifier::extended(vec![ErrorCode::TimedOut]);
        assert!(classifier.is_soft(&ErrorCode::TimedOut));
        assert!(classifier.is_soft(&ErrorCode::HostNotFound));
        assert_eq!(
            classifier.soft_codes(),
            vec!["auth-rejected", "dns-enotfound", "econnrefused", "etimedout"]
        );
    }

    #[test]
    fn test_empty_table_fails_hard() {
        let classifier = ErrorClassifier::with_soft_codes(Vec::new());
        let result = classifier.classify(&connect_error(ErrorCode::HostNotFound));
        assert_eq!(result, Classification::HardFail(ErrorCode::HostNotFound));
    }
}
