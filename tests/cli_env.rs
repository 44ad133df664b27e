//! Environment bindings of the command line. Kept in its own test binary
//! because it mutates the process environment.

use clap::Parser;
use gcwatch::allocations::AllocationLevel;
use gcwatch::{CliArgs, TelemetryConfig};

#[test]
fn test_environment_fills_missing_flags() {
    std::env::set_var("GCWATCH_ENDPOINT", "192.0.2.1:9321");
    std::env::set_var("GCWATCH_HISTORY_CAPACITY", "0");
    std::env::set_var("GCWATCH_ALLOCATION_LEVEL", "all");

    let from_env = CliArgs::try_parse_from(["gcwatch"]).expect("env values parse");
    assert_eq!(from_env.endpoint.as_deref(), Some("192.0.2.1:9321"));
    assert_eq!(from_env.history_capacity, Some(0));
    assert_eq!(from_env.allocation_level, Some(AllocationLevel::All));

    // An explicit flag wins over its variable.
    let flagged = CliArgs::try_parse_from(["gcwatch", "--history-capacity", "4"]).expect("flag parses");
    assert_eq!(flagged.history_capacity, Some(4));

    let config = TelemetryConfig::load(&flagged).expect("loads");
    assert_eq!(config.endpoint, "192.0.2.1:9321");
    assert_eq!(config.history_capacity, 4);
    assert_eq!(config.allocation_level, AllocationLevel::All);

    std::env::set_var("GCWATCH_HISTORY_CAPACITY", "abc");
    let err = CliArgs::try_parse_from(["gcwatch"]).expect_err("malformed env value");
    assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

    for key in ["GCWATCH_ENDPOINT", "GCWATCH_HISTORY_CAPACITY", "GCWATCH_ALLOCATION_LEVEL"] {
        std::env::remove_var(key);
    }
}
