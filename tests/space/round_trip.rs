//! Write then read returns an equal entry

use crate::common::*;

#[test]
fn read_returns_written_entry() {
    let space = space();
    space.write(car(4, "red"), 5);
    assert_eq!(space.read(car(4, "red")), Some(car(4, "red")));
}

#[test]
fn read_does_not_remove() {
    let space = space();
    space.write(car(4, "red"), 5);
    for _ in 0..3 {
        assert!(space.read(Entry::new("Car")).is_some());
    }
}

#[test]
fn all_value_kinds_survive() {
    let space = Space::builder()
        .register(
            TypeSchema::new("Blob")
                .attribute("flag")
                .attribute("ratio")
                .attribute("bytes")
                .attribute("list"),
        )
        .open()
        .unwrap();
    let blob = Entry::new("Blob")
        .with("flag", true)
        .with("ratio", 0.25)
        .with("bytes", vec![1u8, 2, 3])
        .with("list", vec![Value::from(1), Value::from("two")]);
    space.write(blob.clone(), 1);

    assert_eq!(space.read(Entry::new("Blob").with("ratio", 0.25)), Some(blob.clone()));
    assert_eq!(space.read(Entry::new("Blob").with("bytes", vec![1u8, 2, 3])), Some(blob));
}

#[test]
fn unset_attributes_are_stored_and_found() {
    let space = space();
    space.write(Entry::new("Car").with("color", "blue"), 5);
    assert_eq!(
        space.read(Entry::new("Vehicle")),
        Some(Entry::new("Car").with("color", "blue"))
    );
}

#[test]
fn attributeless_entry_round_trip() {
    let space = space();
    space.write(Entry::new("Beacon"), 5);
    assert_eq!(space.read(Entry::new("Beacon")), Some(Entry::new("Beacon")));
    assert_eq!(space.read(Entry::new("Signal")), Some(Entry::new("Beacon")));
}

#[test]
fn invalid_entries_are_dropped() {
    let space = space();
    space.write(Entry::new("Plane"), 5);
    space.write(Entry::new("Car").with("altitude", 3), 5);
    assert!(space.read(Entry::new("Vehicle")).is_none());
    assert!(space.try_write(Entry::new("Plane"), 5).unwrap_err().is_schema_error());
}
