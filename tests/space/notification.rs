//! Register: one delivery per registration

use crate::common::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

fn recorder() -> (Arc<Mutex<Vec<Entry>>>, impl Listener) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |entry: Entry| sink.lock().push(entry))
}

#[test]
fn future_write_is_delivered_once() {
    let space = space();
    let (seen, listener) = recorder();
    space.register(Entry::new("Car").with("color", "red"), listener).unwrap();
    assert!(seen.lock().is_empty());
    assert_eq!(space.stats().pending_registrations, 1);

    space.write(car(4, "blue"), 5);
    space.write(car(4, "red"), 5);
    space.write(car(3, "red"), 5);
    space.flush();

    assert_eq!(*seen.lock(), vec![car(4, "red")]);
    assert_eq!(space.stats().pending_registrations, 0);
}

#[test]
fn existing_match_is_delivered_immediately() {
    let space = space();
    space.write(car(4, "red"), 5);
    let (seen, listener) = recorder();
    space.register(Entry::new("Vehicle"), listener).unwrap();
    assert_eq!(*seen.lock(), vec![car(4, "red")]);

    space.write(car(2, "red"), 5);
    space.flush();
    assert_eq!(seen.lock().len(), 1);
}

#[test]
fn notification_does_not_consume_entry() {
    let space = space();
    let (_seen, listener) = recorder();
    space.register(Entry::new("Truck"), listener).unwrap();
    space.write(truck(6, 1), 5);
    space.flush();
    assert!(space.take(Entry::new("Truck")).is_some());
}

#[test]
fn subtype_write_notifies_parent_registration() {
    let space = space();
    let (seen, listener) = recorder();
    space.register(Entry::new("Signal"), listener).unwrap();
    space.write(Entry::new("Alarm").with("level", 1), 5);
    space.flush();
    assert_eq!(seen.lock()[0].type_name(), "Alarm");
}

#[test]
fn registrations_race_writes_without_loss_or_duplicates() {
    let space = Arc::new(space());
    let registrations = 50;
    let counts: Arc<Vec<AtomicUsize>> =
        Arc::new((0..registrations).map(|_| AtomicUsize::new(0)).collect());

    let registrar = {
        let space = Arc::clone(&space);
        let counts = Arc::clone(&counts);
        thread::spawn(move || {
            for i in 0..registrations {
                let counts = Arc::clone(&counts);
                space
                    .register(Entry::new("Truck").with("load", 7), move |_: Entry| {
                        counts[i].fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap();
            }
        })
    };
    let writer = {
        let space = Arc::clone(&space);
        thread::spawn(move || {
            for _ in 0..20 {
                space.write(truck(4, 7), 5);
            }
        })
    };
    registrar.join().unwrap();
    writer.join().unwrap();
    space.flush();

    // Every registration made after the first write saw a stored match, and
    // the ones before it are matched by a later write; none fires twice.
    for count in counts.iter() {
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn registration_lease_drops_undelivered() {
    let space = builder()
        .registration_lease(Duration::from_millis(20))
        .open()
        .unwrap();
    let (seen, listener) = recorder();
    space.register(Entry::new("Car"), listener).unwrap();
    std::thread::sleep(Duration::from_millis(40));
    space.compact_now();
    space.flush();
    assert_eq!(space.stats().pending_registrations, 0);

    space.write(car(4, "late"), 5);
    space.flush();
    assert!(seen.lock().is_empty());
}

#[test]
fn panicking_listener_does_not_break_delivery() {
    let space = space();
    space
        .register(Entry::new("Car"), |_: Entry| panic!("listener exploded"))
        .unwrap();
    let (seen, listener) = recorder();
    space.register(Entry::new("Car"), listener).unwrap();
    space.write(car(4, "red"), 5);
    space.flush();
    assert_eq!(seen.lock().len(), 1);
}

#[test]
fn invalid_template_is_rejected() {
    let space = space();
    let (_seen, listener) = recorder();
    let err = space.register(Entry::new("Boat"), listener).unwrap_err();
    assert!(err.is_schema_error());
}

#[test]
fn listener_may_flush_the_space() {
    let space = Arc::new(space());
    let weak = Arc::downgrade(&space);
    let done = Arc::new(AtomicUsize::new(0));
    {
        let done = Arc::clone(&done);
        space
            .register(Entry::new("Truck"), move |_: Entry| {
                if let Some(space) = weak.upgrade() {
                    space.flush();
                }
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }

    space.write(truck(6, 2), 5);
    wait_until("listener returns", || done.load(Ordering::SeqCst) == 1);
    space.flush();
    assert_eq!(space.stats().pending_registrations, 0);
}
