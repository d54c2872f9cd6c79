//! Loading router configuration from TOML files and reconfiguring a running
//! service.

use std::collections::HashMap;
use std::time::Duration;

use cmdroute::{ConfigError, PolicyKind, RouterConfig, RouterService};
use rust_decimal_macros::dec;
use tempfile::tempdir;

fn write_config(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cmdroute.toml");
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}

#[test]
fn full_config_file_round_trips_into_service() {
    let (_dir, path) = write_config(
        r#"
policy = "intelligent"

[weights]
capability = 0.5
complexity = 0.2
context = 0.2
cost = 0.1

[costs]
economy_unit_cost = "0.0002"
premium_unit_cost = "0.006"
tokens_per_word = 4

[signals]
cost_efficiency = 0.9

[dispatch]
attempt_timeout = "5s"
"#,
    );

    let config = RouterConfig::from_file(&path).unwrap();
    assert_eq!(config.policy, PolicyKind::Intelligent);
    assert_eq!(config.weights.capability, 0.5);
    assert_eq!(config.costs.economy_unit_cost, dec!(0.0002));
    assert_eq!(config.costs.tokens_per_word, 4);
    assert_eq!(config.dispatch.attempt_timeout, Duration::from_secs(5));

    let svc = RouterService::new(config).unwrap();
    assert_eq!(svc.policy(), PolicyKind::Intelligent);
    let decision = svc.route("/help me", None);
    assert_eq!(decision.estimated_tokens(), 8);
    assert_eq!(decision.estimated_cost(), dec!(0.0016));
}

#[test]
fn empty_file_yields_defaults() {
    let (_dir, path) = write_config("");
    pretty_assertions::assert_eq!(RouterConfig::from_file(&path).unwrap(), RouterConfig::default());
}

#[test]
fn unknown_policy_in_file_is_a_parse_error() {
    let (_dir, path) = write_config(r#"policy = "cheapest""#);
    let err = RouterConfig::from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError(_)), "{err}");
}

#[test]
fn weights_that_do_not_sum_to_one_are_rejected() {
    let (_dir, path) = write_config(
        r#"
[weights]
capability = 0.7
"#,
    );
    let err = RouterConfig::from_file(&path).unwrap_err();
    assert!(err.to_string().contains("must sum to 1.0"), "{err}");
}

#[test]
fn reconfiguring_with_unknown_parameter_fails_and_keeps_state() {
    let svc = RouterService::new(RouterConfig::default()).unwrap();
    let params: HashMap<String, String> = [("threshold.shiny".to_string(), "0.5".to_string())].into();

    let err = svc.configure_policy("fallback", &params).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownParameter { .. }));
    assert_eq!(svc.policy(), PolicyKind::EconomyFirst);
}

#[test]
fn policy_aliases_are_accepted() {
    let svc = RouterService::new(RouterConfig::default()).unwrap();
    svc.configure_policy("Intelligent", &HashMap::new()).unwrap();
    assert_eq!(svc.policy(), PolicyKind::Intelligent);
    svc.configure_policy("economy-only", &HashMap::new()).unwrap();
    assert_eq!(svc.policy(), PolicyKind::EconomyOnly);
}
