//! Loading configuration and opening a space from it

use crate::common::*;
use std::io::Write;

#[test]
fn space_opens_from_toml() {
    let config = SpaceConfig::from_toml_str(
        "minute_ms = 25\ncleanup_period_secs = 60\nregistration_lease_secs = 5\n",
    )
    .unwrap();
    let space = builder().config(config.clone()).open().unwrap();
    assert_eq!(space.config(), &config);

    space.write(car(4, "red"), 1);
    wait_until("lease expiry", || space.read(Entry::new("Car")).is_none());
}

#[test]
fn config_file_round_trip() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "minute_ms = 1000").unwrap();
    let config = SpaceConfig::from_file(file.path()).unwrap();
    assert_eq!(config.minute, Duration::from_secs(1));
    assert_eq!(config.cleanup_period, SpaceConfig::default().cleanup_period);
}

#[test]
fn bad_config_is_reported() {
    let err = SpaceConfig::from_toml_str("minute_ms = \"fast\"").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    let err = builder().minute(Duration::ZERO).open().unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn duplicate_schema_registration() {
    let space = space();
    assert!(space.register_type(TypeSchema::new("Car").extends("Vehicle").attribute("color")).is_ok());
    let err = space.register_type(TypeSchema::new("Car").attribute("color")).unwrap_err();
    assert!(matches!(err, Error::SchemaConflict(_)));
}
