// Facility Gateway Server - Prometheus metrics definitions
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Prometheus metrics for the gateway.
//!
//! Every telemetry response is counted by category and outcome; synthetic
//! answers are also counted by the kind of fallback that produced them.

use facility_gateway::{Category, GatewayResponse, ResponseStatus};
use lazy_static::lazy_static;
use prometheus::{register_counter_vec, CounterVec, Encoder, TextEncoder};
use tracing::error;

lazy_static! {
    /// Responses served, labeled by category and outcome.
    pub static ref RESPONSES_TOTAL: CounterVec = register_counter_vec!(
        "facility_gateway_responses_total",
        "Telemetry responses served",
        &["category", "outcome"]
    ).unwrap();

    /// Synthetic responses, labeled by category and fallback kind.
    pub static ref FALLBACKS_TOTAL: CounterVec = register_counter_vec!(
        "facility_gateway_fallbacks_total",
        "Telemetry responses answered with synthetic data",
        &["category", "reason_kind"]
    ).unwrap();
}

/// Outcome label of a response
pub fn outcome(response: &GatewayResponse) -> &'static str {
    match response.status {
        ResponseStatus::Ok if response.is_mock() => "mock",
        ResponseStatus::Ok => "live",
        ResponseStatus::NotFound => "not_found",
        ResponseStatus::InternalError => "internal_error",
        ResponseStatus::BadGateway => "bad_gateway",
    }
}

/// Count one response.
pub fn record_response(category: Category, response: &GatewayResponse) {
    RESPONSES_TOTAL
        .with_label_values(&[category.as_str(), outcome(response)])
        .inc();
    if response.is_mock() {
        FALLBACKS_TOTAL
            .with_label_values(&[category.as_str(), response.decision.kind()])
            .inc();
    }
}

/// Encode all metrics to Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!("failed to encode metrics: {}", err);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use facility_gateway::envelope::{assemble, internal_error, FallbackDecision};

    #[test]
    fn test_outcome_labels() {
        let live = assemble(Category::Occupancy, Vec::<u8>::new(), FallbackDecision::None, Utc::now());
        assert_eq!(outcome(&live), "live");
        let mock = assemble(
            Category::Occupancy,
            Vec::<u8>::new(),
            FallbackDecision::ForcedMock,
            Utc::now(),
        );
        assert_eq!(outcome(&mock), "mock");
        assert_eq!(outcome(&internal_error("x")), "internal_error");
    }

    #[test]
    fn test_record_and_encode() {
        let mock = assemble(
            Category::Environment,
            Vec::<u8>::new(),
            FallbackDecision::OutOfWindow { hour: 23 },
            Utc::now(),
        );
        let before = FALLBACKS_TOTAL
            .with_label_values(&["environment", "out_of_window"])
            .get();
        record_response(Category::Environment, &mock);
        let after = FALLBACKS_TOTAL
            .with_label_values(&["environment", "out_of_window"])
            .get();
        assert!(after >= before + 1.0);

        let output = encode_metrics();
        assert!(output.contains("facility_gateway_responses_total"));
        assert!(output.contains("facility_gateway_fallbacks_total"));
    }
}
