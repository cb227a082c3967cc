use std::path::PathBuf;

use lantern::config::Config;

#[test]
fn test_config_port_only() {
    let cfg = Config::from_args(["lantern", "8080"]).unwrap();
    assert_eq!(cfg.port, "8080");
    assert_eq!(cfg.root, PathBuf::from("public_html"));
    assert_eq!(cfg.max_events, 10);
}

#[test]
fn test_config_service_name_port() {
    let cfg = Config::from_args(["lantern", "http"]).unwrap();
    assert_eq!(cfg.port, "http");
}

#[test]
fn test_config_missing_port_is_an_error() {
    assert!(Config::from_args(["lantern"]).is_err());
}

#[test]
fn test_config_extra_positional_is_an_error() {
    assert!(Config::from_args(["lantern", "8080", "9090"]).is_err());
}

#[test]
fn test_config_custom_root() {
    let cfg = Config::from_args(["lantern", "8080", "--root", "/srv/www"]).unwrap();
    assert_eq!(cfg.root, PathBuf::from("/srv/www"));
}

#[test]
fn test_config_max_events_must_be_positive() {
    assert!(Config::from_args(["lantern", "8080", "--max-events", "0"]).is_err());

    let cfg = Config::from_args(["lantern", "8080", "--max-events", "64"]).unwrap();
    assert_eq!(cfg.max_events, 64);
}

#[test]
fn test_config_clone() {
    let cfg1 = Config::from_args(["lantern", "8080"]).unwrap();
    let cfg2 = cfg1.clone();
    assert_eq!(cfg1.port, cfg2.port);
    assert_eq!(cfg1.root, cfg2.root);
}
