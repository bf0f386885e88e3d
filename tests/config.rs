// ABOUTME: Integration tests for configuration parsing and validation.
// ABOUTME: Tests YAML parsing, file discovery, and environment variable layering.

use bluegreen::config::*;
use bluegreen::error::Error;
use bluegreen::runtime::RuntimeType;
use std::fs;
use std::time::Duration;

/// Unset every variable the config layer reads so the host environment
/// cannot leak into a test.
fn without_config_env<R>(vars: &[(&str, Option<&str>)], f: impl FnOnce() -> R) -> R {
    let mut all: Vec<(&str, Option<&str>)> = ENV_VARS
        .iter()
        .filter(|v| !vars.iter().any(|(k, _)| k == *v))
        .map(|v| (*v, None))
        .collect();
    all.extend_from_slice(vars);
    temp_env::with_vars(all, f)
}

mod parsing {
    use super::*;

    #[test]
    fn parse_full_config() {
        let yaml = r#"
app: shop
service: api
traffic_label: traefik.enable
traffic_value: "true"
priority_label: traefik.http.routers.shop-api.priority
health_url: http://localhost:3000/healthz
health_timeout: 90s
health_interval: 500ms
health_attempt_timeout: 3s
skip_health: false
auto_confirm: false
compose_file: deploy/compose.yml
runtime: podman
socket: /run/podman/podman.sock
pull_policy: missing
compose_timeout: 10m
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.app.as_str(), "shop");
        assert_eq!(config.service.as_str(), "api");
        assert_eq!(
            config.priority_label(),
            "traefik.http.routers.shop-api.priority"
        );
        assert_eq!(config.health_timeout, Duration::from_secs(90));
        assert_eq!(config.health_interval, Duration::from_millis(500));
        assert_eq!(config.health_attempt_timeout, Duration::from_secs(3));
        assert!(!config.auto_confirm);
        assert_eq!(config.runtime, Some(RuntimeType::Podman));
        assert_eq!(config.compose_timeout, Duration::from_secs(600));
        assert_eq!(config.pull_policy, "missing");

        let runtime = config.runtime_config();
        assert_eq!(runtime.socket.as_deref(), Some("/run/podman/podman.sock"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = Config::from_yaml("app: shop\nimage: nginx\n");
        assert!(matches!(result, Err(Error::Yaml(_))));
    }

    #[test]
    fn invalid_app_name_is_rejected() {
        assert!(Config::from_yaml("app: My Shop\n").is_err());
    }

    #[test]
    fn false_cannot_mark_enabled_stacks() {
        let result = Config::from_yaml("traffic_value: \"false\"\n");
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}

mod discovery {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.app.as_str(), "app");
        assert_eq!(config.health_url, "http://localhost:8080/health");
    }

    #[test]
    fn finds_primary_then_alternate_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME_ALT), "app: alt\n").unwrap();
        assert_eq!(Config::discover(dir.path()).unwrap().app.as_str(), "alt");

        fs::write(dir.path().join(CONFIG_FILENAME), "app: primary\n").unwrap();
        assert_eq!(Config::discover(dir.path()).unwrap().app.as_str(), "primary");
    }

    #[test]
    fn finds_dot_directory_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".bluegreen")).unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME_DIR), "service: api\n").unwrap();
        assert_eq!(Config::discover(dir.path()).unwrap().service.as_str(), "api");
    }
}

mod layering {
    use super::*;

    #[test]
    fn env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILENAME),
            "app: shop\nhealth_timeout: 30s\n",
        )
        .unwrap();

        let config = without_config_env(
            &[("HEALTH_TIMEOUT", Some("120")), ("SKIP_HEALTH", Some("yes"))],
            || Config::resolve(dir.path(), None),
        )
        .unwrap();

        assert_eq!(config.app.as_str(), "shop");
        assert_eq!(config.health_timeout, Duration::from_secs(120));
        assert!(config.skip_health);
    }

    #[test]
    fn explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yml");

        let result = without_config_env(&[], || Config::resolve(dir.path(), Some(&missing)));
        assert!(matches!(result, Err(Error::ConfigNotFound(p)) if p == missing));
    }

    #[test]
    fn explicit_path_beats_discovery() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "app: discovered\n").unwrap();
        let explicit = dir.path().join("staging.yml");
        fs::write(&explicit, "app: staging\n").unwrap();

        let config =
            without_config_env(&[], || Config::resolve(dir.path(), Some(&explicit))).unwrap();
        assert_eq!(config.app.as_str(), "staging");
    }

    #[test]
    fn invalid_env_value_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = without_config_env(&[("HEALTH_INTERVAL", Some("0"))], || {
            Config::resolve(dir.path(), None)
        });
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}
