//! Failure handling: configuration, collaborator errors, broken permutations,
//! and the serialised result shape.

use std::error::Error as _;

use uor_orbit::prelude::*;
use uor_orbit::{ConfigError, EngineConfig, TransitionError};
use uor_orbit_test_helpers::{
    collapsing, escaping, init_tracing, scenario_b, FailingSpace, UnavailableSpace,
};

const MODES: [Mode; 4] = [Mode::Sequential, Mode::Static, Mode::Dynamic, Mode::Hybrid];

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_zero_workers() {
    let err = enumerate(&scenario_b(), &EnumerateOptions::new(0)).unwrap_err();
    assert!(matches!(err, EnumerationError::Configuration(ConfigError::ZeroWorkers)));
}

#[test]
fn test_engine_rejects_bad_config() {
    let config = EngineConfig::from_toml_str("[batch]\nmin_size = 0\n");
    assert!(matches!(config, Err(ConfigError::ZeroBatchSize)));
}

#[test]
fn test_engine_honours_config_timeout() {
    let config = EngineConfig::from_toml_str("timeout_ms = 60000\n[queue]\ndepth = 1\naggregation = 1\n")
        .unwrap();
    let engine = Engine::new(config).unwrap();
    let result = engine
        .enumerate(&scenario_b(), &EnumerateOptions::new(3).mode(Mode::Dynamic).batch_size(1))
        .unwrap();
    assert_eq!(result.periods(), vec![2, 6]);
    assert!(result.diagnostics.fallback.is_none());
}

// =============================================================================
// Collaborator failures
// =============================================================================

#[test]
fn test_collaborator_error_propagates_unchanged() {
    init_tracing();
    for mode in MODES {
        let err = enumerate(
            &FailingSpace::new(64, 40),
            &EnumerateOptions::new(4).mode(mode).batch_size(4),
        )
        .unwrap_err();
        match &err {
            EnumerationError::Collaborator(TransitionError::Failed { index, message, .. }) => {
                assert_eq!(*index, StateIndex::new(40), "{mode}");
                assert_eq!(message.as_str(), "field arithmetic unavailable");
            }
            other => panic!("{mode}: unexpected {other}"),
        }
        assert_eq!(
            err.source().map(ToString::to_string).as_deref(),
            Some("lookup table missing")
        );
    }
}

#[test]
fn test_evaluator_setup_failure() {
    for mode in MODES {
        let err = enumerate(
            &UnavailableSpace { total: 32 },
            &EnumerateOptions::new(2).mode(mode),
        )
        .unwrap_err();
        assert!(matches!(err, EnumerationError::Collaborator(TransitionError::Failed { .. })));
    }
}

#[test]
fn test_non_permutation_rejected() {
    for mode in MODES {
        let err = enumerate(&collapsing(50), &EnumerateOptions::new(3).mode(mode).batch_size(5))
            .unwrap_err();
        assert!(
            matches!(err, EnumerationError::Collaborator(TransitionError::NotAPermutation { .. })),
            "{mode}: {err}"
        );
    }
}

#[test]
fn test_out_of_range_successor_rejected() {
    let err = enumerate(&escaping(10), &EnumerateOptions::new(2).mode(Mode::Static)).unwrap_err();
    assert!(matches!(
        err,
        EnumerationError::Collaborator(TransitionError::OutOfRange { successor: 10, total: 10, .. })
    ));
}

// =============================================================================
// Result shape
// =============================================================================

#[test]
fn test_result_serialises() {
    let options = EnumerateOptions::new(2).mode(Mode::Static).detail(Detail::Full);
    let result = enumerate(&scenario_b(), &options).unwrap();
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["total_period_sum"], 8);
    assert_eq!(json["period_by_cycle"]["0"], 2);
    assert_eq!(json["period_by_cycle"]["2"], 6);
    assert_eq!(json["members_by_cycle"]["2"].as_array().map(Vec::len), Some(6));
    assert_eq!(json["diagnostics"]["plan"]["mode"], "static");
    assert_eq!(json["diagnostics"]["algorithm"], "enumeration");
    assert_eq!(json["diagnostics"]["workers"].as_array().map(Vec::len), Some(2));

    let back: AggregateResult = serde_json::from_value(json).unwrap();
    assert!(back.same_census(&result));
}
