//! Concurrent index creation and mixed workloads

use crate::common::*;
use std::sync::Barrier;
use std::thread;

#[test]
fn concurrent_first_writes_create_one_index_per_attribute() {
    for _ in 0..10 {
        let space = Arc::new(space());
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads as i64)
            .map(|t| {
                let space = Arc::clone(&space);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    space.write(car(t, "same"), 5);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let stats = space.stats();
        assert_eq!(stats.attribute_indexes, 2);
        // wheels 0..8 plus one shared color node
        assert_eq!(stats.value_nodes, threads + 1);

        let mut found = 0;
        while space.take(Entry::new("Car").with("color", "same")).is_some() {
            found += 1;
        }
        assert_eq!(found, threads);
    }
}

#[test]
fn readers_and_writers_interleave() {
    let space = Arc::new(space());
    thread::scope(|s| {
        for w in 0..4i64 {
            let space = Arc::clone(&space);
            s.spawn(move || {
                for i in 0..250 {
                    space.write(truck(w, i), 5);
                }
            });
        }
        for _ in 0..4 {
            let space = Arc::clone(&space);
            s.spawn(move || {
                for i in 0..250 {
                    let _ = space.read(Entry::new("Truck").with("load", i));
                }
            });
        }
    });

    for w in 0..4 {
        for i in 0..250 {
            assert!(space.read(truck(w, i)).is_some());
        }
    }
}

#[test]
fn schemaless_fallback_under_concurrent_writes() {
    let space = Arc::new(space());
    thread::scope(|s| {
        for level in 0..4i64 {
            let space = Arc::clone(&space);
            s.spawn(move || space.write(Entry::new("Alarm").with("level", level), 5));
        }
        let space = Arc::clone(&space);
        s.spawn(move || space.write(Entry::new("Beacon"), 5));
    });
    space.flush();

    let mut taken = 0;
    while space.take(Entry::new("Signal")).is_some() {
        taken += 1;
    }
    assert_eq!(taken, 5);
}
