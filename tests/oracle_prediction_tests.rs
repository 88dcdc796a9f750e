//! Prediction oracle tests: formulas, clamps, determinism, fallbacks.

use fairway_dispatch::course::{CourseMap, Location, LoopId, TimeOfDay};
use fairway_dispatch::models::{Asset, Complexity, Order, OrderItem};
use fairway_dispatch::oracle::{self, PredictionOracle};
use fairway_dispatch::{AssetKind, RngManager};

fn oracle() -> PredictionOracle {
    PredictionOracle::new(CourseMap::standard())
}

fn item(name: &str, qty: u32, complexity: Complexity, cents: i64) -> OrderItem {
    OrderItem {
        name: name.to_string(),
        quantity: qty,
        complexity,
        unit_price_cents: cents,
    }
}

#[test]
fn test_prep_time_scales_with_sqrt_quantity() {
    let o = oracle();
    // Q = 9 simple items: 2 * 9 * 0.8 * (3/9) = 4.8
    let items = vec![item("Bottled Water", 9, Complexity::Simple, 300)];
    assert!((o.expected_prep_time(&items) - 4.8).abs() < 1e-9);

    // complexity factor is the max across lines, not a blend
    let mixed = vec![
        item("Bottled Water", 3, Complexity::Simple, 300),
        item("Nachos", 1, Complexity::Complex, 1100),
    ];
    // Q = 4: 2 * 4 * 1.5 * (2/4) = 6.0
    assert!((o.expected_prep_time(&mixed) - 6.0).abs() < 1e-9);
}

#[test]
fn test_prep_time_default_when_empty() {
    assert_eq!(oracle().expected_prep_time(&[]), oracle::FALLBACK_PREP_MIN);
}

#[test]
fn test_sampled_prep_stays_inside_the_band() {
    let o = oracle();
    let items = vec![item("Hot Dog", 2, Complexity::Medium, 700)];
    let expected = o.expected_prep_time(&items);
    let mut rng = RngManager::new(31);
    for _ in 0..500 {
        let s = o.sample_prep_time(&items, &mut rng);
        assert!(s >= (expected * 0.8 - 1e-9).max(1.0));
        assert!(s <= expected * 1.2 + 1e-9);
    }
}

#[test]
fn test_travel_sampling_deterministic_and_bounded() {
    let o = oracle();
    let mut rng1 = RngManager::new(7);
    let mut rng2 = RngManager::new(7);
    let expected = o
        .expected_travel_time(
            &Location::Clubhouse,
            6,
            AssetKind::DeliveryStaff,
            TimeOfDay::Afternoon,
        )
        .unwrap();
    for _ in 0..200 {
        let a = o
            .sample_travel_time(
                &Location::Clubhouse,
                6,
                AssetKind::DeliveryStaff,
                TimeOfDay::Afternoon,
                &mut rng1,
            )
            .unwrap();
        let b = o
            .sample_travel_time(
                &Location::Clubhouse,
                6,
                AssetKind::DeliveryStaff,
                TimeOfDay::Afternoon,
                &mut rng2,
            )
            .unwrap();
        assert_eq!(a, b);
        assert!(a >= expected * 0.9 - 1e-9 && a <= expected * 1.1 + 1e-9);
        assert!(a >= 0.5);
    }
}

#[test]
fn test_acceptance_model_terms() {
    let o = oracle();
    let order = Order::new(
        "ORD0001".to_string(),
        5,
        vec![item("Bottled Water", 1, Complexity::Simple, 300)],
        TimeOfDay::Morning,
        0.0,
    )
    .unwrap();

    // staff at the clubhouse: baseline 0.80
    let staff = Asset::new_staff(
        "staff1".to_string(),
        "Esteban".to_string(),
        Location::Clubhouse,
    );
    assert!((o.predict_acceptance(&staff, &order) - 0.80).abs() < 1e-9);

    // in-loop cart gains the zone bonus
    let cart = Asset::new_cart(
        "cart1".to_string(),
        "Cart Alpha".to_string(),
        LoopId::Front,
        Location::Hole(1),
    )
    .unwrap();
    assert!((o.predict_acceptance(&cart, &order) - 0.90).abs() < 1e-9);

    // off-loop order effectively disqualifies the cart
    let back_order = Order::new(
        "ORD0002".to_string(),
        14,
        vec![item("Bottled Water", 1, Complexity::Simple, 300)],
        TimeOfDay::Morning,
        0.0,
    )
    .unwrap();
    assert!((o.predict_acceptance(&cart, &back_order) - 0.50).abs() < 1e-9);
}

#[test]
fn test_acceptance_clamped_to_floor() {
    let o = oracle();
    let mut swamped = Asset::new_staff(
        "staff1".to_string(),
        "Esteban".to_string(),
        Location::Hole(5),
    );
    for i in 0..10 {
        swamped.enqueue_order(format!("o{}", i), 16).unwrap();
    }
    let order = Order::new(
        "ORD0001".to_string(),
        5,
        vec![item("Bottled Water", 1, Complexity::Simple, 300)],
        TimeOfDay::Noon,
        0.0,
    )
    .unwrap();
    assert_eq!(o.predict_acceptance(&swamped, &order), 0.10);
}

#[test]
fn test_high_value_bonus() {
    let o = oracle();
    let staff = Asset::new_staff(
        "staff1".to_string(),
        "Esteban".to_string(),
        Location::Clubhouse,
    );
    // $75 order clears the $50 bar
    let pricey = Order::new(
        "ORD0001".to_string(),
        5,
        vec![item("Chicken Tenders", 6, Complexity::Complex, 1250)],
        TimeOfDay::Noon,
        0.0,
    )
    .unwrap();
    assert!(pricey.is_high_value());
    assert!((o.predict_acceptance(&staff, &pricey) - 0.85).abs() < 1e-9);
}

#[test]
fn test_travel_fallback_never_fails() {
    let o = oracle();
    // a cart standing off its loop is a planner bug upstream, but the
    // fallback path still produces a finite estimate
    let eta = o.travel_time_or_default(
        &Location::Hole(12),
        5,
        AssetKind::BeverageCart {
            loop_id: LoopId::Front,
        },
        TimeOfDay::Noon,
    );
    assert!(eta.is_finite());
    assert!(eta >= 0.5);
}
