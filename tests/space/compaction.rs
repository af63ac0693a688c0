//! Compaction prunes empty nodes without losing live entries

use crate::common::*;
use std::thread;

#[test]
fn compaction_prunes_emptied_indexes() {
    let space = space();
    space.write(car(4, "red"), 5);
    assert_eq!(space.stats().attribute_indexes, 2);
    assert_eq!(space.stats().value_nodes, 2);

    assert!(space.take(Entry::new("Car")).is_some());
    space.flush();
    let report = space.compact_now();
    assert_eq!(report.value_nodes, 2);
    assert_eq!(report.attribute_indexes, 2);
    assert_eq!(space.stats().attribute_indexes, 0);
    assert_eq!(space.stats().pending_hints, 0);
}

#[test]
fn compaction_keeps_live_entries() {
    let space = space();
    space.write(car(4, "red"), 5);
    space.write(car(4, "blue"), 5);
    assert!(space.take(Entry::new("Car").with("color", "red")).is_some());
    space.flush();

    let report = space.compact_now();
    assert_eq!(report.value_nodes, 1);
    assert_eq!(report.attribute_indexes, 0);
    assert_eq!(space.read(Entry::new("Car")), Some(car(4, "blue")));
    assert_eq!(space.read(Entry::new("Vehicle").with("wheels", 4)), Some(car(4, "blue")));
}

#[test]
fn space_is_usable_after_full_compaction() {
    let space = space();
    space.write(car(4, "red"), 5);
    space.take(Entry::new("Car"));
    space.flush();
    space.compact_now();

    space.write(car(4, "red"), 5);
    assert_eq!(space.read(Entry::new("Car").with("color", "red")), Some(car(4, "red")));
}

#[test]
fn compaction_with_stale_hints_is_harmless() {
    let space = space();
    space.write(car(4, "red"), 5);
    space.take(Entry::new("Car"));
    space.flush();
    // Refill the emptied nodes before compaction runs
    space.write(car(4, "red"), 5);
    let report = space.compact_now();
    assert_eq!(report.value_nodes, 0);
    assert!(space.read(car(4, "red")).is_some());
}

#[test]
fn periodic_compaction_runs_on_its_own() {
    let space = builder()
        .cleanup_period(Duration::from_millis(20))
        .open()
        .unwrap();
    space.write(truck(6, 1), 5);
    space.take(Entry::new("Truck"));
    space.flush();
    wait_until("periodic compaction", || space.stats().attribute_indexes == 0);
}

#[test]
fn compaction_racing_writers_loses_nothing() {
    let space = Arc::new(space());
    let writers = 4;
    let per_writer = 200;

    thread::scope(|s| {
        for w in 0..writers {
            let space = Arc::clone(&space);
            s.spawn(move || {
                for i in 0..per_writer {
                    space.write(truck(w, i), 5);
                    // Churn: take what was just written every other time
                    if i % 2 == 0 {
                        assert!(space.take(truck(w, i)).is_some());
                    }
                }
            });
        }
        let space = Arc::clone(&space);
        s.spawn(move || {
            for _ in 0..200 {
                space.flush();
                space.compact_now();
            }
        });
    });

    for w in 0..writers {
        for i in (1..per_writer).step_by(2) {
            assert!(space.read(truck(w, i)).is_some(), "lost truck({w}, {i})");
        }
    }
}

#[test]
fn nan_attributes_are_compacted() {
    let space = space();
    for _ in 0..50 {
        space.write(Entry::new("Alarm").with("level", f64::NAN), 5);
    }
    assert_eq!(space.stats().value_nodes, 1);

    let mut taken = 0;
    while space.take(Entry::new("Alarm")).is_some() {
        taken += 1;
    }
    assert_eq!(taken, 50);
    space.flush();
    space.compact_now();
    let stats = space.stats();
    assert_eq!(stats.value_nodes, 0);
    assert_eq!(stats.attribute_indexes, 0);
}
