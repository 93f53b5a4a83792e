
use std::collections::HashSet;
use std::sync::Arc;

use autotap::{EngineConfig, Rule, RuleEngine};
use testtree::{n, TestClock, TestConfig, TestNode, TestTree};

type TestEngine = RuleEngine<Arc<TestClock>, Arc<TestConfig>>;

fn engine() -> (Arc<TestClock>, Arc<TestConfig>, TestEngine) {
    let clock = Arc::new(TestClock::new());
    let config = Arc::new(TestConfig::default());
    let engine = RuleEngine::new(Arc::clone(&clock), Arc::clone(&config));
    (clock, config, engine)
}

fn selector_rule(id: i64, package: &str, selector: &str) -> Rule {
    let mut rule = Rule::new(id, package, "App");
    rule.selector = Some(selector.to_owned());
    rule
}

fn skip_tree() -> TestNode {
    n("FrameLayout")
        .child(n("TextView").vid("com.x:id/skip").text("Skip").clickable())
        .build()
}

#[test]
fn fires_matching_rule_and_clicks_target() {
    let (_clock, _config, engine) = engine();
    engine.replace_rules(vec![selector_rule(1, "com.x", "[text=\"Skip\"]")]);

    let root = skip_tree();
    let tree = TestTree::new(root.clone());
    assert_eq!(engine.match_and_trigger("com.x", "Main", &tree), Some(1));
    assert_eq!(root.clicks(), vec!["com.x:id/skip".to_owned()]);
    assert!(tree.taps().is_empty());
}

#[test]
fn click_walks_up_to_clickable_container() {
    let (_clock, _config, engine) = engine();
    engine.replace_rules(vec![selector_rule(1, "com.x", "[text=\"Sponsored\"]")]);

    let root = n("FrameLayout")
        .child(
            n("LinearLayout")
                .vid("com.x:id/card")
                .clickable()
                .child(n("TextView").text("Sponsored")),
        )
        .build();
    let tree = TestTree::new(root.clone());
    assert_eq!(engine.match_and_trigger("com.x", "Main", &tree), Some(1));
    assert_eq!(root.clicks(), vec!["com.x:id/card".to_owned()]);
}

#[test]
fn falls_back_to_synthetic_tap_at_center() {
    let (_clock, _config, engine) = engine();
    engine.replace_rules(vec![selector_rule(1, "com.x", "[text=\"Skip\"]")]);

    let root = n("FrameLayout")
        .child(n("TextView").text("Skip").bounds(100, 200, 300, 400))
        .build();
    let tree = TestTree::new(root.clone());
    assert_eq!(engine.match_and_trigger("com.x", "Main", &tree), Some(1));
    assert!(root.clicks().is_empty());
    assert_eq!(tree.taps(), vec![(200, 300)]);
}

#[test]
fn click_failure_moves_on_to_next_candidate() {
    let (_clock, _config, engine) = engine();
    engine.replace_rules(vec![
        selector_rule(1, "com.x", "[text=\"Broken\"]"),
        selector_rule(2, "com.x", "[text=\"Works\"]"),
    ]);

    let root = n("FrameLayout")
        .child(n("TextView").text("Broken").click_fails())
        .child(n("TextView").text("Works").clickable())
        .build();
    let tree = TestTree::new(root.clone());
    // The failed click also exhausts the tap fallback.
    tree.set_tap_ok(false);

    assert_eq!(engine.match_and_trigger("com.x", "Main", &tree), Some(2));
    assert_eq!(root.clicks(), vec!["Broken".to_owned(), "Works".to_owned()]);
    assert_eq!(tree.taps().len(), 1);
}

#[test]
fn rule_throttle_sliding_window() {
    let (clock, config, engine) = engine();
    // Element cooldown off so only the per-rule window gates.
    config.set(EngineConfig {
        element_cooldown_ms: 0,
        ..EngineConfig::default()
    });
    engine.replace_rules(vec![selector_rule(1, "com.x", "[text=\"Skip\"]")]);
    let tree = TestTree::new(skip_tree());

    assert_eq!(engine.match_and_trigger("com.x", "Main", &tree), Some(1));
    clock.advance(100);
    assert_eq!(engine.match_and_trigger("com.x", "Main", &tree), Some(1));
    clock.advance(100);
    // Two triggers inside the 5000ms window: held.
    assert_eq!(engine.match_and_trigger("com.x", "Main", &tree), None);
    // The first trigger ages out; one slot frees up.
    clock.set(5050);
    assert_eq!(engine.match_and_trigger("com.x", "Main", &tree), Some(1));
}

#[test]
fn element_cooldown_blocks_repeat_clicks_on_same_node() {
    let (clock, config, engine) = engine();
    config.set(EngineConfig {
        max_triggers: 10,
        ..EngineConfig::default()
    });
    engine.replace_rules(vec![selector_rule(1, "com.x", "[text=\"Skip\"]")]);
    let tree = TestTree::new(skip_tree());

    assert_eq!(engine.match_and_trigger("com.x", "Main", &tree), Some(1));
    clock.advance(1000);
    assert_eq!(engine.match_and_trigger("com.x", "Main", &tree), None);
    clock.set(5001);
    assert_eq!(engine.match_and_trigger("com.x", "Main", &tree), Some(1));
}

#[test]
fn global_disable_stops_everything() {
    let (_clock, config, engine) = engine();
    engine.replace_rules(vec![selector_rule(1, "com.x", "[text=\"Skip\"]")]);
    engine.replace_enabled_packages(HashSet::from(["com.x".to_owned()]));
    config.set(EngineConfig {
        enabled: false,
        ..EngineConfig::default()
    });

    let tree = TestTree::new(skip_tree());
    assert!(!engine.should_scan("com.x"));
    assert_eq!(engine.match_and_trigger("com.x", "Main", &tree), None);
}

#[test]
fn should_scan_whitelist_and_debounce() {
    let (clock, _config, engine) = engine();
    engine.replace_enabled_packages(HashSet::from(["com.x".to_owned()]));

    assert!(!engine.should_scan("com.y"));
    assert!(engine.should_scan("com.x"));
    // Within the 400ms debounce window.
    clock.advance(100);
    assert!(!engine.should_scan("com.x"));
    clock.advance(300);
    assert!(engine.should_scan("com.x"));
    // Packages debounce independently.
    engine.replace_enabled_packages(HashSet::from(["com.x".to_owned(), "com.z".to_owned()]));
    assert!(engine.should_scan("com.z"));
}

#[test]
fn activity_scope_gates_rules() {
    let (_clock, _config, engine) = engine();
    let mut rule = selector_rule(1, "com.x", "[text=\"Skip\"]");
    rule.activity_ids = Some("com.x.Main, com.x.Video".to_owned());
    engine.replace_rules(vec![rule]);

    let tree = TestTree::new(skip_tree());
    assert_eq!(engine.match_and_trigger("com.x", "com.x.Other", &tree), None);
    // A scoped rule never fires when the activity is unknown.
    assert_eq!(engine.match_and_trigger("com.x", "", &tree), None);
    assert_eq!(
        engine.match_and_trigger("com.x", "com.x.Video", &tree),
        Some(1)
    );
}

#[test]
fn exclusion_selector_suppresses_rule() {
    let (_clock, _config, engine) = engine();
    let mut rule = selector_rule(1, "com.x", "[text=\"Skip\"]");
    rule.exclude_selector = Some("[text=\"Loading\"]".to_owned());
    engine.replace_rules(vec![rule]);

    let loading = n("FrameLayout")
        .child(n("TextView").text("Loading"))
        .child(n("TextView").text("Skip").clickable())
        .build();
    let tree = TestTree::new(loading);
    assert_eq!(engine.match_and_trigger("com.x", "Main", &tree), None);

    tree.set_root(Some(skip_tree()));
    assert_eq!(engine.match_and_trigger("com.x", "Main", &tree), Some(1));
}

#[test]
fn broken_exclusion_selector_does_not_suppress() {
    let (_clock, _config, engine) = engine();
    let mut rule = selector_rule(1, "com.x", "[text=\"Skip\"]");
    rule.exclude_selector = Some("[broken".to_owned());
    engine.replace_rules(vec![rule]);

    let tree = TestTree::new(skip_tree());
    assert_eq!(engine.match_and_trigger("com.x", "Main", &tree), Some(1));
}

#[test]
fn sequence_steps_fire_in_order_and_reset_on_context_change() {
    let (clock, _config, engine) = engine();
    let mut step2 = selector_rule(2, "com.x", "[text=\"Confirm\"]");
    step2.step_key = Some(2);
    step2.pre_keys = Some("1".to_owned());
    step2.group_key = Some(7);
    let mut step1 = selector_rule(1, "com.x", "[text=\"Open\"]");
    step1.step_key = Some(1);
    step1.group_key = Some(7);
    // Dependent step listed first: ordering must not matter for sequencing.
    engine.replace_rules(vec![step2, step1]);

    let root = n("FrameLayout")
        .child(n("TextView").text("Open").clickable())
        .child(n("TextView").text("Confirm").clickable())
        .build();
    let tree = TestTree::new(root);

    // Step 2 is held until step 1 has fired.
    assert_eq!(engine.match_and_trigger("com.x", "Main", &tree), Some(1));
    clock.advance(100);
    assert_eq!(engine.match_and_trigger("com.x", "Main", &tree), Some(2));

    // Activity change clears sequence progress; step 1 leads again.
    clock.advance(6000);
    assert_eq!(engine.match_and_trigger("com.x", "Detail", &tree), Some(1));
}

#[test]
fn legacy_fallbacks_in_strict_order() {
    let (_clock, _config, engine) = engine();
    let root = n("FrameLayout")
        .child(n("A").vid("com.x:id/target").clickable())
        .child(n("B").text("fallback text").clickable())
        .child(n("C").bounds(500, 500, 600, 600).clickable())
        .build();
    let tree = TestTree::new(root.clone());

    // All legacy fields set: the view id wins.
    let mut rule = Rule::new(1, "com.x", "X");
    rule.target_view_id = Some("com.x:id/target".to_owned());
    rule.target_text = Some("fallback".to_owned());
    rule.bounds_in_screen = Some("500,500,600,600".to_owned());
    engine.replace_rules(vec![rule.clone()]);
    assert_eq!(engine.match_and_trigger("com.x", "Main", &tree), Some(1));
    assert_eq!(root.clicks(), vec!["com.x:id/target".to_owned()]);

    // No view id match: text is next.
    let mut rule2 = rule.clone();
    rule2.id = 2;
    rule2.target_view_id = Some("com.x:id/gone".to_owned());
    engine.replace_rules(vec![rule2.clone()]);
    assert_eq!(engine.match_and_trigger("com.x", "Main", &tree), Some(2));
    assert_eq!(root.clicks().last(), Some(&"fallback text".to_owned()));

    // Bounds are last, matched within tolerance.
    let mut rule3 = rule2.clone();
    rule3.id = 3;
    rule3.target_text = Some("absent".to_owned());
    rule3.bounds_in_screen = Some("510,490,590,610".to_owned());
    engine.replace_rules(vec![rule3]);
    assert_eq!(engine.match_and_trigger("com.x", "Main", &tree), Some(3));
    assert_eq!(root.clicks().last(), Some(&"C".to_owned()));
}

#[test]
fn unmatched_selector_falls_back_to_legacy_fields() {
    let (_clock, _config, engine) = engine();
    let mut rule = selector_rule(1, "com.x", "[text=\"not here\"]");
    rule.target_view_id = Some("com.x:id/skip".to_owned());
    engine.replace_rules(vec![rule]);

    let root = skip_tree();
    let tree = TestTree::new(root.clone());
    assert_eq!(engine.match_and_trigger("com.x", "Main", &tree), Some(1));
    assert_eq!(root.clicks(), vec!["com.x:id/skip".to_owned()]);
}

#[test]
fn at_most_one_rule_fires_per_pass() {
    let (_clock, _config, engine) = engine();
    engine.replace_rules(vec![
        selector_rule(1, "com.x", "[text=\"Open\"]"),
        selector_rule(2, "com.x", "[text=\"Confirm\"]"),
    ]);

    let root = n("FrameLayout")
        .child(n("TextView").text("Open").clickable())
        .child(n("TextView").text("Confirm").clickable())
        .build();
    let tree = TestTree::new(root.clone());
    assert_eq!(engine.match_and_trigger("com.x", "Main", &tree), Some(1));
    assert_eq!(root.clicks().len(), 1);
}

#[test]
fn package_rules_take_priority_over_wildcard() {
    let (_clock, _config, engine) = engine();
    engine.replace_rules(vec![
        selector_rule(1, "*", "[text=\"Skip\"]"),
        selector_rule(2, "com.x", "[text=\"Skip\"]"),
    ]);

    let tree = TestTree::new(skip_tree());
    assert_eq!(engine.match_and_trigger("com.x", "Main", &tree), Some(2));
    // The wildcard rule still covers everything else.
    assert_eq!(engine.match_and_trigger("com.other", "Main", &tree), Some(1));
}

#[test]
fn no_active_root_is_a_quiet_no_op() {
    let (_clock, _config, engine) = engine();
    engine.replace_rules(vec![selector_rule(1, "com.x", "[text=\"Skip\"]")]);
    let tree = TestTree::empty();
    assert_eq!(engine.match_and_trigger("com.x", "Main", &tree), None);
}
