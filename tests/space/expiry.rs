//! Leases: entries disappear once their minutes run out

use crate::common::*;

const MINUTE: Duration = Duration::from_millis(40);

#[test]
fn entry_expires_after_lease() {
    let space = fast_space(MINUTE);
    let written = Instant::now();
    space.write(car(4, "red"), 2);
    assert!(space.read(car(4, "red")).is_some());

    wait_until("lease expiry", || space.read(car(4, "red")).is_none());
    assert!(written.elapsed() >= MINUTE * 2);
}

#[test]
fn zero_minutes_is_raised_to_one() {
    let space = fast_space(MINUTE);
    space.write(car(4, "red"), 0);
    assert!(space.read(Entry::new("Car")).is_some());
    wait_until("lease expiry", || space.read(Entry::new("Car")).is_none());
}

#[test]
fn take_cancels_the_lease() {
    let space = fast_space(MINUTE);
    space.write(car(4, "red"), 1);
    assert!(space.take(Entry::new("Car")).is_some());
    std::thread::sleep(MINUTE * 2);
    space.flush();
    assert!(space.read(Entry::new("Car")).is_none());
}

#[test]
fn expired_entries_are_unlinked() {
    let space = fast_space(MINUTE);
    space.write(car(4, "red"), 1);
    space.write(Entry::new("Beacon"), 1);
    wait_until("lease expiry", || {
        space.read(Entry::new("Car")).is_none() && space.read(Entry::new("Beacon")).is_none()
    });
    space.flush();
    assert_eq!(space.stats().schemaless_records, 0);
    assert_eq!(space.stats().pending_disposals, 0);
}

#[test]
fn longer_leases_outlive_shorter_ones() {
    let space = fast_space(MINUTE);
    space.write(car(4, "short"), 1);
    space.write(car(4, "long"), 50);
    wait_until("short lease expiry", || {
        space.read(Entry::new("Car").with("color", "short")).is_none()
    });
    assert!(space.read(Entry::new("Car").with("color", "long")).is_some());
}
