//! Take removes exactly once, even under contention

use crate::common::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;

#[test]
fn take_removes_entry() {
    let space = space();
    space.write(car(4, "red"), 5);
    assert_eq!(space.take(Entry::new("Car")), Some(car(4, "red")));
    assert!(space.take(Entry::new("Car")).is_none());
    assert!(space.read(Entry::new("Car")).is_none());
}

#[test]
fn take_picks_one_of_several() {
    let space = space();
    for color in ["red", "green", "blue"] {
        space.write(car(4, color), 5);
    }
    let mut taken = Vec::new();
    while let Some(entry) = space.take(Entry::new("Car").with("wheels", 4)) {
        taken.push(entry.get("color").cloned().unwrap());
    }
    taken.sort_by_key(|v| v.to_string());
    assert_eq!(taken, [Value::from("blue"), Value::from("green"), Value::from("red")]);
}

#[test]
fn concurrent_takes_of_one_entry_have_one_winner() {
    for _ in 0..20 {
        let space = Arc::new(space());
        space.write(car(4, "red"), 5);

        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let winners = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let space = Arc::clone(&space);
                let barrier = Arc::clone(&barrier);
                let winners = Arc::clone(&winners);
                thread::spawn(move || {
                    barrier.wait();
                    // Mix template shapes so different indexes are searched
                    let template = if i % 2 == 0 {
                        Entry::new("Car").with("color", "red")
                    } else {
                        Entry::new("Vehicle").with("wheels", 4)
                    };
                    if space.take(template).is_some() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn every_written_entry_is_taken_exactly_once() {
    let space = Arc::new(space());
    let total = 400;
    for i in 0..total {
        space.write(truck(i % 4, i), 5);
    }

    let taken = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let space = Arc::clone(&space);
            let taken = Arc::clone(&taken);
            thread::spawn(move || {
                while let Some(entry) = space.take(Entry::new("Truck")) {
                    taken.lock().push(entry.get("load").cloned().unwrap());
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let mut loads: Vec<_> = taken.lock().iter().map(|v| v.to_string()).collect();
    loads.sort();
    loads.dedup();
    assert_eq!(loads.len(), total as usize);
    assert_eq!(taken.lock().len(), total as usize);
}

#[test]
fn take_of_attributeless_entry_is_exclusive() {
    let space = Arc::new(space());
    space.write(Entry::new("Beacon"), 5);
    let winners: usize = thread::scope(|s| {
        let handles: Vec<_> = (0..6)
            .map(|_| s.spawn(|| space.take(Entry::new("Signal")).is_some() as usize))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });
    assert_eq!(winners, 1);
}
