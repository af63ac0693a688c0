//! Shared fixtures
//!
//! ```text
//! Vehicle(wheels) ─┬─ Car(color)
//!                  └─ Truck(load)
//! Signal ── Beacon                 attributeless
//! Signal ── Alarm(level)
//! ```

#![allow(dead_code)]

pub use std::sync::Arc;
pub use std::time::{Duration, Instant};
pub use tuplespace::prelude::*;

pub fn schemas() -> Vec<TypeSchema> {
    vec![
        TypeSchema::new("Vehicle").attribute("wheels"),
        TypeSchema::new("Car").extends("Vehicle").attribute("color"),
        TypeSchema::new("Truck").extends("Vehicle").attribute("load"),
        TypeSchema::new("Signal"),
        TypeSchema::new("Beacon").extends("Signal"),
        TypeSchema::new("Alarm").extends("Signal").attribute("level"),
    ]
}

pub fn builder() -> SpaceBuilder {
    schemas()
        .into_iter()
        .fold(Space::builder(), |builder, schema| builder.register(schema))
}

pub fn space() -> Space {
    builder().open().unwrap()
}

/// Space whose lease minute lasts `minute`
pub fn fast_space(minute: Duration) -> Space {
    builder().minute(minute).open().unwrap()
}

pub fn car(wheels: i64, color: &str) -> Entry {
    Entry::new("Car").with("wheels", wheels).with("color", color)
}

pub fn truck(wheels: i64, load: i64) -> Entry {
    Entry::new("Truck").with("wheels", wheels).with("load", load)
}

/// Poll `cond` until it holds, failing after five seconds
pub fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(2));
    }
}
