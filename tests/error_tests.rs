// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use fitness_hub::error::{AppError, ErrorCategory};

#[test]
fn test_internal_errors_hide_details() {
    let err = AppError::Database("connection refused on 10.0.0.3".to_string());
    assert_eq!(err.category(), ErrorCategory::Internal);
    assert_eq!(err.public_message(), AppError::TRY_AGAIN_LATER);

    let err = AppError::CorruptCredential("expected 6 fields, found 3".to_string());
    assert_eq!(err.public_message(), AppError::TRY_AGAIN_LATER);
}

#[test]
fn test_adverse_errors_are_reported_verbatim() {
    let err = AppError::StateNotFound;
    assert_eq!(err.category(), ErrorCategory::Adverse);
    assert!(err.public_message().contains("does not match"));

    let err = AppError::NoDataAvailable;
    assert!(err.public_message().contains("try again later"));
}

#[test]
fn test_provider_errors_are_upstream() {
    let err = AppError::provider_api("fitbit", "HTTP 500");
    assert_eq!(err.category(), ErrorCategory::Upstream);
    assert_eq!(err.to_string(), "fitbit API error: HTTP 500");

    let err = AppError::Timeout {
        provider: "strava".to_string(),
    };
    assert_eq!(err.category(), ErrorCategory::Upstream);
}

#[test]
fn test_client_input_errors() {
    let err = AppError::UnsupportedProvider("garmin".to_string());
    assert_eq!(err.category(), ErrorCategory::ClientInput);
    assert_eq!(err.public_message(), "Provider not supported: garmin");
}
