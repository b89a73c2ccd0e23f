// Unit tests for error module
// Tests conversion from core errors and the location in messages

use crate::error::DashboardError;

use gateway_core::CoreError;
use gateway_core::error::{ConfigError, SyncError};

/// **VALUE**: Core errors convert into the single startup error type.
///
/// **WHY THIS MATTERS**: `main` reports every startup failure the same way. If a
/// core error lost its message on conversion, the user would see only a location.
///
/// **BUG THIS CATCHES**: Would catch a `From<CoreError>` that drops the source
/// message or maps to the wrong variant.
#[test]
fn given_core_error_when_converted_then_message_preserved() {
    // GIVEN: A config validation error wrapped in CoreError
    let core = CoreError::from(ConfigError::validation("port must not be 0"));

    // WHEN: Converting to DashboardError
    let err = DashboardError::from(core);

    // THEN: Core variant carrying the original message
    assert!(matches!(err, DashboardError::Core { .. }));
    assert!(err.to_string().contains("port must not be 0"));
}

/// **VALUE**: Builtin data errors convert without going through CoreError.
///
/// **BUG THIS CATCHES**: Would catch a missing `From<SyncError>` that forces
/// callers to wrap by hand.
#[test]
fn given_sync_error_when_converted_then_core_variant() {
    // GIVEN: A builtin data error
    let sync = SyncError::builtin("invalid builtin data");

    // WHEN: Converting
    let err: DashboardError = sync.into();

    // THEN: Message kept
    assert!(err.to_string().contains("invalid builtin data"));
}

/// **VALUE**: Error messages carry the file and line where they were raised.
///
/// **BUG THIS CATCHES**: Would catch removing `#[track_caller]` from the
/// constructors, which would point every location at error.rs.
#[test]
fn given_path_error_when_displayed_then_location_is_caller() {
    // GIVEN/WHEN: A path error built here
    let err = DashboardError::path("no home");

    // THEN: Location names this test file, not error.rs
    let text = err.to_string();
    assert!(text.contains("no home"));
    assert!(text.contains("tests/error.rs"), "got: {text}");
}
