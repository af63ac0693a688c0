//! Template semantics: subtypes, subsets, wildcards, shared attributes

use crate::common::*;

// ============================================================================
// Wildcards and subtypes
// ============================================================================

#[test]
fn empty_template_matches_any_subtype() {
    let space = space();
    space.write(truck(6, 10), 5);
    assert_eq!(space.read(Entry::new("Vehicle")), Some(truck(6, 10)));
    assert_eq!(space.read(Entry::new("Truck")), Some(truck(6, 10)));
    assert!(space.read(Entry::new("Car")).is_none());
}

#[test]
fn subtype_template_never_matches_parent_instance() {
    let space = space();
    space.write(Entry::new("Vehicle").with("wheels", 2), 5);
    assert!(space.read(Entry::new("Car").with("wheels", 2)).is_none());
    assert!(space.read(Entry::new("Vehicle").with("wheels", 2)).is_some());
}

#[test]
fn attributeless_parent_finds_attribute_bearing_child() {
    let space = space();
    space.write(Entry::new("Alarm").with("level", 3), 5);
    space.flush();
    assert_eq!(
        space.take(Entry::new("Signal")),
        Some(Entry::new("Alarm").with("level", 3))
    );
    assert!(space.read(Entry::new("Signal")).is_none());
}

// ============================================================================
// Subset matching
// ============================================================================

#[test]
fn template_subset_matches() {
    let space = space();
    space.write(car(4, "red"), 5);
    assert!(space.read(Entry::new("Car").with("color", "red")).is_some());
    assert!(space.read(Entry::new("Car").with("wheels", 4)).is_some());
    assert!(space.read(car(4, "red")).is_some());
}

#[test]
fn one_differing_attribute_prevents_match() {
    let space = space();
    space.write(car(4, "red"), 5);
    assert!(space.read(car(4, "blue")).is_none());
    assert!(space.read(car(3, "red")).is_none());
}

#[test]
fn values_compare_without_coercion() {
    let space = space();
    space.write(Entry::new("Car").with("wheels", 4), 5);
    assert!(space.read(Entry::new("Car").with("wheels", 4.0)).is_none());
    assert!(space.read(Entry::new("Car").with("wheels", "4")).is_none());
}

#[test]
fn explicit_null_is_a_wildcard() {
    let space = space();
    space.write(car(4, "red"), 5);
    let template = Entry::new("Car").with("wheels", Value::Null).with("color", "red");
    assert!(space.read(template).is_some());
}

// ============================================================================
// Polymorphic attribute sharing
// ============================================================================

#[test]
fn inherited_attribute_is_shared_between_siblings() {
    let space = space();
    space.write(car(4, "red"), 5);
    space.write(truck(4, 20), 5);

    // Both live under Vehicle.wheels = 4
    let stats = space.stats();
    assert_eq!(stats.attribute_indexes, 3);

    let first = space.take(Entry::new("Vehicle").with("wheels", 4)).unwrap();
    let second = space.take(Entry::new("Vehicle").with("wheels", 4)).unwrap();
    let mut kinds = vec![first.type_name().to_string(), second.type_name().to_string()];
    kinds.sort();
    assert_eq!(kinds, ["Car", "Truck"]);
    assert!(space.read(Entry::new("Vehicle")).is_none());
}

#[test]
fn child_template_on_inherited_attribute_skips_siblings() {
    let space = space();
    space.write(truck(4, 20), 5);
    assert!(space.read(Entry::new("Car").with("wheels", 4)).is_none());
    space.write(car(4, "green"), 5);
    assert_eq!(space.read(Entry::new("Car").with("wheels", 4)), Some(car(4, "green")));
}

// ============================================================================
// Properties
// ============================================================================

mod props {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Whatever a template returns agrees with it on every attribute
        /// it sets, and a template built from a stored car always hits.
        #[test]
        fn reads_agree_with_template(
            cars in prop::collection::vec((0i64..4, 0usize..3), 1..20),
            wheels in prop::option::of(0i64..4),
            color in prop::option::of(0usize..3),
        ) {
            const COLORS: [&str; 3] = ["red", "green", "blue"];
            let space = space();
            for (w, c) in &cars {
                space.write(car(*w, COLORS[*c]), 5);
            }

            let mut template = Entry::new("Car");
            if let Some(w) = wheels {
                template.set("wheels", w);
            }
            if let Some(c) = color {
                template.set("color", COLORS[c]);
            }

            let expected = cars.iter().any(|(w, c)| {
                wheels.map_or(true, |x| x == *w) && color.map_or(true, |x| x == *c)
            });
            match space.read(template) {
                Some(found) => {
                    prop_assert!(expected);
                    if let Some(w) = wheels {
                        prop_assert_eq!(found.get("wheels"), Some(&Value::from(w)));
                    }
                    if let Some(c) = color {
                        prop_assert_eq!(found.get("color"), Some(&Value::from(COLORS[c])));
                    }
                }
                None => prop_assert!(!expected),
            }
        }
    }
}
