use geodash::color::{ColorRule, Rgba, parse_color};
use geodash::models::OverlayLayer;
use geodash::DashError;
use serde_json::json;

fn rule(layer: serde_json::Value) -> Option<ColorRule> {
    let layer: OverlayLayer = serde_json::from_value(layer).unwrap();
    ColorRule::from_layer(&layer).unwrap()
}

#[test]
fn discrete_buckets_are_open_below_closed_above() {
    let r = rule(json!({
        "name": "L", "dataIndexUrl": "i.json",
        "colorMap": [[-1000, 50, "#d8f3dc"], [50, 1000, "#2d6a4f"]]
    }))
    .unwrap();
    let low = parse_color("#d8f3dc");
    let high = parse_color("#2d6a4f");
    assert_eq!(r.color_for(0.0), low);
    assert_eq!(r.color_for(50.0), low);
    assert_eq!(r.color_for(50.0001), high);
    assert_eq!(r.color_for(1000.0), high);
    // outside every bucket
    assert_eq!(r.color_for(-1000.0), None);
    assert_eq!(r.color_for(1000.5), None);
    assert_eq!(r.color_for(f64::NAN), None);
    assert!(!r.is_continuous());
}

#[test]
fn first_matching_bucket_wins_on_overlap() {
    let r = rule(json!({
        "name": "L", "dataIndexUrl": "i.json",
        "colorMap": [[0, 10, "#ff0000"], [5, 20, "#0000ff"]]
    }))
    .unwrap();
    assert_eq!(r.color_for(7.0), Some(Rgba::rgb(255, 0, 0)));
    assert_eq!(r.color_for(15.0), Some(Rgba::rgb(0, 0, 255)));
}

#[test]
fn continuous_scale_interpolates_and_clamps() {
    let r = rule(json!({
        "name": "L", "dataIndexUrl": "i.json",
        "valueColorPairs": [[100, "#ffffff"], [0, "#000000"]]
    }))
    .unwrap();
    assert!(r.is_continuous());
    assert_eq!(r.color_for(50.0).map(|c| c.to_css()).as_deref(), Some("#808080"));
    assert_eq!(r.color_for(-10.0), Some(Rgba::BLACK));
    assert_eq!(r.color_for(100.0), Some(Rgba::WHITE));
    assert_eq!(r.color_for(1e9), Some(Rgba::WHITE));
    assert_eq!(r.color_for(f64::NAN), None);
}

#[test]
fn same_value_always_maps_to_same_color() {
    let discrete = rule(json!({
        "name": "L", "dataIndexUrl": "i.json",
        "colorMap": [[0, 10, "#ff0000"], [10, 20, "#0000ff"]]
    }))
    .unwrap();
    let continuous = rule(json!({
        "name": "L", "dataIndexUrl": "i.json",
        "valueColorPairs": [[0, "#000000"], [100, "#ffffff"]],
        "thresholds": [25, 75]
    }))
    .unwrap();
    for v in [-5.0, 0.0, 3.3, 10.0, 19.9, 25.0, 60.0, 100.0, 250.0] {
        assert_eq!(discrete.color_for(v), discrete.color_for(v));
        assert_eq!(continuous.color_for(v), continuous.color_for(v));
        assert_eq!(discrete.clone().color_for(v), discrete.color_for(v));
    }
}

#[test]
fn threshold_count_is_ignored_by_continuous_rules() {
    let plain = rule(json!({
        "name": "L", "dataIndexUrl": "i.json",
        "valueColorPairs": [[0, "#000000"], [100, "#ffffff"]]
    }))
    .unwrap();
    let counted = rule(json!({
        "name": "L", "dataIndexUrl": "i.json",
        "valueColorPairs": [[0, "#000000"], [100, "#ffffff"]],
        "thresholds": 4
    }))
    .unwrap();
    assert_eq!(plain, counted);
    assert_eq!(counted.color_for(50.0).map(|c| c.to_css()).as_deref(), Some("#808080"));
}

#[test]
fn continuous_scale_with_three_stops() {
    let r = rule(json!({
        "name": "L", "dataIndexUrl": "i.json",
        "valueColorPairs": [[0, "rgb(0, 0, 0)"], [10, "rgb(200, 0, 0)"], [20, "rgb(200, 200, 0)"]]
    }))
    .unwrap();
    assert_eq!(r.color_for(5.0), Some(Rgba::rgb(100, 0, 0)));
    assert_eq!(r.color_for(15.0), Some(Rgba::rgb(200, 100, 0)));
}

#[test]
fn thresholds_band_continuous_values() {
    let r = rule(json!({
        "name": "L", "dataIndexUrl": "i.json",
        "valueColorPairs": [[0, "#000000"], [100, "#ffffff"]],
        "thresholds": [0, 50]
    }))
    .unwrap();
    assert_eq!(r.color_for(49.0), Some(Rgba::BLACK));
    assert_eq!(r.color_for(99.0).map(|c| c.to_css()).as_deref(), Some("#808080"));
}

#[test]
fn no_rule_means_no_fill() {
    assert_eq!(rule(json!({"name": "L", "dataIndexUrl": "i.json"})), None);
}

#[test]
fn malformed_rules_are_rejected() {
    let both: OverlayLayer = serde_json::from_value(json!({
        "name": "L",
        "colorMap": [[0, 1, "red"]],
        "valueColorPairs": [[0, "red"]]
    }))
    .unwrap();
    assert!(matches!(
        ColorRule::from_layer(&both),
        Err(DashError::MalformedColorRule { layer, .. }) if layer == "L"
    ));

    let bad: OverlayLayer = serde_json::from_value(json!({
        "name": "L", "valueColorPairs": [[0, "#12345"]]
    }))
    .unwrap();
    assert!(ColorRule::from_layer(&bad).is_err());
}

#[test]
fn css_color_forms() {
    assert_eq!(parse_color("#fff"), Some(Rgba::WHITE));
    assert_eq!(parse_color("#2D6A4F"), Some(Rgba::rgb(0x2d, 0x6a, 0x4f)));
    assert_eq!(parse_color("rgba(10, 20, 30, 0.5)").map(|c| c.a), Some(128));
    assert_eq!(parse_color("hsl(0, 100%, 50%)"), Some(Rgba::rgb(255, 0, 0)));
    assert_eq!(parse_color("nonsense"), None);
}
