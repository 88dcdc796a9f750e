//! Course model and ETA tests
//!
//! Exercise the loop graph through the public API: forward-only cart
//! traversal, staff shortcuts, zone ineligibility, and map validation.

use fairway_dispatch::course::{CourseError, CourseMap, Location, LoopId, Segment, TimeOfDay};

#[test]
fn test_forward_only_cart_eta_mid_segment() {
    // cart mid-segment 4->5, order back at hole 2: residual(4->5) plus the
    // whole wrap 5-6-7-8-9-1-2, never the two-hole reverse path
    let course = CourseMap::standard();
    let loc = Location::MidSegment {
        from: 4,
        to: 5,
        fraction: 0.25,
    };
    let eta = course
        .cart_eta(&loc, LoopId::Front, 2, TimeOfDay::Afternoon)
        .unwrap();

    let residual = 0.75 * 1.5;
    let wrap = 6.0 * 1.5; // 5-6, 6-7, 7-8, 8-9, 9-1, 1-2
    assert!((eta - (residual + wrap)).abs() < 1e-9);

    // and the reverse path would have been far shorter
    let reverse = 2.0 * 1.5;
    assert!(eta > reverse);
}

#[test]
fn test_cart_zone_mismatch_is_infinite_not_error() {
    let course = CourseMap::standard();
    let eta = course
        .cart_eta(&Location::Hole(3), LoopId::Front, 14, TimeOfDay::Noon)
        .unwrap();
    assert!(eta.is_infinite());
}

#[test]
fn test_staff_take_the_short_way_round() {
    let course = CourseMap::standard();
    let eta = course
        .staff_eta(&Location::Hole(8), 1, TimeOfDay::Afternoon)
        .unwrap();
    // 8 -> 9 -> 1 beats walking back through 7..2
    assert!((eta - 2.0 * 1.5).abs() < 1e-9);
}

#[test]
fn test_staff_cross_loop_goes_through_clubhouse() {
    let course = CourseMap::standard();
    let direct = course
        .staff_eta(&Location::Hole(3), 12, TimeOfDay::Afternoon)
        .unwrap();
    let to_club = course
        .staff_eta_to_clubhouse(&Location::Hole(3), TimeOfDay::Afternoon)
        .unwrap();
    let from_club = course
        .staff_eta(&Location::Clubhouse, 12, TimeOfDay::Afternoon)
        .unwrap();
    assert!((direct - (to_club + from_club)).abs() < 1e-9);
}

#[test]
fn test_time_of_day_and_terrain_multipliers() {
    let course = CourseMap::standard();
    let flat_noon = course.forward_time(2, 3, TimeOfDay::Noon).unwrap();
    let flat_morning = course.forward_time(2, 3, TimeOfDay::Morning).unwrap();
    assert!((flat_noon - 1.5 * 1.2).abs() < 1e-9);
    assert!((flat_morning - 1.5 * 0.8).abs() < 1e-9);

    // the climb out of 12 carries the additive surcharge
    let uphill_noon = course.forward_time(12, 13, TimeOfDay::Noon).unwrap();
    assert!((uphill_noon - 1.5 * (1.2 + 0.15)).abs() < 1e-9);
}

#[test]
fn test_map_validation_rejects_broken_loops() {
    // drop one segment: the front cycle no longer closes
    let mut table = Vec::new();
    for loop_id in [LoopId::Front, LoopId::Back] {
        for from in loop_id.holes() {
            if from == 4 {
                continue;
            }
            let to = if from == *loop_id.holes().end() {
                *loop_id.holes().start()
            } else {
                from + 1
            };
            table.push(Segment {
                from,
                to,
                avg_minutes: 1.5,
            });
        }
    }
    assert!(matches!(
        CourseMap::from_segments(table),
        Err(CourseError::IncompleteLoop(LoopId::Front))
    ));
}

#[test]
fn test_unknown_hole_rejected_at_boundary() {
    let course = CourseMap::standard();
    assert!(matches!(
        course.staff_eta(&Location::Hole(3), 19, TimeOfDay::Noon),
        Err(CourseError::UnknownHole(19))
    ));
    assert!(matches!(
        LoopId::of_hole(0),
        Err(CourseError::UnknownHole(0))
    ));
}

#[test]
fn test_player_prediction_converges() {
    let course = CourseMap::standard();
    // a slow delivery catches the golfer two holes later
    let (hole, eta) = course.predict_drop_hole(6, 15.0, |h| match h {
        6 => 32.0,
        7 => 33.5,
        8 => 35.0,
        _ => 36.5,
    });
    assert_eq!(hole, 8);
    assert!((eta - 35.0).abs() < 1e-9);
}
