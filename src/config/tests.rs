use std::collections::HashMap;
use std::path::Path;

use super::*;

fn raw_with_sources() -> RawSettings {
    let mut raw = RawSettings::default();
    raw.catalog.category_leaf_path = Some(PathBuf::from("/data/leaf.json"));
    raw.catalog.category_top_level_path = Some(PathBuf::from("/data/top.json"));
    raw.catalog.category_all_path = Some(PathBuf::from("/data/all.json"));
    raw.catalog.product_path = Some(PathBuf::from("/data/products.json"));
    raw
}

fn legacy_lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| vars.get(key).cloned()
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = raw_with_sources();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        sources: SourceOverrides {
            product_path: Some(PathBuf::from("/override/products.json")),
            ..Default::default()
        },
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(
        settings.catalog.product_path,
        Path::new("/override/products.json")
    );
    assert_eq!(settings.catalog.category_leaf_path, Path::new("/data/leaf.json"));
}

#[test]
fn defaults_apply_when_only_sources_are_set() {
    let settings = Settings::from_raw(raw_with_sources()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert_eq!(
        settings.server.graceful_shutdown,
        Duration::from_secs(DEFAULT_GRACEFUL_SHUTDOWN_SECS)
    );
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert!(settings.catalog.warm_on_startup);
}

#[test]
fn legacy_variables_fill_missing_paths() {
    let mut raw = RawSettings::default();
    raw.apply_legacy_paths(legacy_lookup(&[
        (LEGACY_CATEGORY_LEAF_VAR, "/legacy/leaf.json"),
        (LEGACY_CATEGORY_TOP_LEVEL_VAR, " /legacy/top.json "),
        (LEGACY_CATEGORY_ALL_VAR, "/legacy/all.json"),
        (LEGACY_PRODUCT_VAR, "/legacy/products.json"),
    ]));

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.catalog.category_leaf_path, Path::new("/legacy/leaf.json"));
    assert_eq!(
        settings.catalog.category_top_level_path,
        Path::new("/legacy/top.json")
    );
    assert_eq!(settings.catalog.category_all_path, Path::new("/legacy/all.json"));
    assert_eq!(settings.catalog.product_path, Path::new("/legacy/products.json"));
}

#[test]
fn legacy_variables_do_not_override_configured_paths() {
    let mut raw = raw_with_sources();
    raw.apply_legacy_paths(legacy_lookup(&[(LEGACY_PRODUCT_VAR, "/legacy/products.json")]));

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.catalog.product_path, Path::new("/data/products.json"));
}

#[test]
fn blank_legacy_variable_is_ignored() {
    let mut raw = RawSettings::default();
    raw.apply_legacy_paths(legacy_lookup(&[(LEGACY_PRODUCT_VAR, "   ")]));
    assert!(raw.catalog.product_path.is_none());
}

#[test]
fn missing_source_path_is_rejected() {
    let mut raw = raw_with_sources();
    raw.catalog.category_all_path = None;

    match Settings::from_raw(raw) {
        Err(LoadError::Invalid { key, reason }) => {
            assert_eq!(key, "catalog.category_all_path");
            assert!(reason.contains(LEGACY_CATEGORY_ALL_VAR));
        }
        other => panic!("expected invalid configuration, got {other:?}"),
    }
}

#[test]
fn empty_source_path_is_rejected() {
    let mut raw = raw_with_sources();
    raw.catalog.product_path = Some(PathBuf::new());

    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "catalog.product_path",
            ..
        })
    ));
}

#[test]
fn zero_port_is_rejected() {
    let mut raw = raw_with_sources();
    raw.server.port = Some(0);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "server.port",
            ..
        })
    ));
}

#[test]
fn unparsable_log_level_is_rejected() {
    let mut raw = raw_with_sources();
    raw.logging.level = Some("chatty".to_string());
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "logging.level",
            ..
        })
    ));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = raw_with_sources();
    let overrides = ServeOverrides {
        log_json: Some(true),
        warm_on_startup: Some(false),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
    assert!(!settings.catalog.warm_on_startup);
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["catalog-server"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_arguments() {
    let args = CliArgs::parse_from([
        "catalog-server",
        "--env-file",
        "/etc/catalog.env",
        "serve",
        "--server-port",
        "9000",
        "--product-path",
        "/srv/products.json",
        "--log-json",
        "true",
    ]);

    assert_eq!(args.env_file.as_deref(), Some(Path::new("/etc/catalog.env")));
    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_port, Some(9000));
            assert_eq!(
                serve.overrides.sources.product_path.as_deref(),
                Some(Path::new("/srv/products.json"))
            );
            assert_eq!(serve.overrides.log_json, Some(true));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_check_arguments() {
    let args = CliArgs::parse_from([
        "catalog-server",
        "check",
        "--category-leaf-path",
        "/srv/leaf.json",
    ]);

    match args.command.expect("check command") {
        Command::Check(check) => {
            assert_eq!(
                check.sources.category_leaf_path.as_deref(),
                Some(Path::new("/srv/leaf.json"))
            );
            assert!(check.sources.product_path.is_none());
        }
        _ => panic!("wrong command parsed"),
    }
}
