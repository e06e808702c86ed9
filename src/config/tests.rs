use std::io::Write;
use std::time::Duration;

use serial_test::serial;

use super::*;

fn write_yaml(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("temp file");
    file.write_all(contents.as_bytes()).expect("write yaml");
    file
}

#[test]
fn test_config_defaults() {
    let config = Config::default();
    assert_eq!(config.local.port, 1883);
    assert_eq!(config.local.keep_alive_secs, 179);
    assert_eq!(config.local.queue_size, 100);
    assert_eq!(config.cloud.queue_size, 900);
    assert_eq!(config.cloud.resubscribe_interval(), Duration::from_secs(1201));
    assert_eq!(config.cloud.queue_timeout(false), Duration::from_secs(1));
    assert_eq!(config.throttle.queue_timeout(), Duration::from_secs(366));
    assert_eq!(config.throttle.disconnected_queue_timeout(), Duration::from_secs(1));
    assert_eq!(config.local.disconnected_queue_timeout(), Duration::from_secs(1));
    assert_eq!(config.supervisor.event_queue_size, 1000);
    assert_eq!(config.supervisor.max_disconnect(), Duration::from_secs(20 * 60));
    assert!(!config.weather.enabled());
    assert!(!config.energy.enabled());
    assert!(!config.bays.enabled);
}

#[test]
fn test_default_config_requires_credentials() {
    let err = Config::default().validate().unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
    assert!(Config::for_test().validate().is_ok());
}

#[test]
fn test_bad_timeout_values_are_rejected() {
    let mut config = Config::for_test();
    config.local.publish_timeout_secs = -1.0;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("local.publish_timeout_secs"));

    let mut config = Config::for_test();
    config.energy.timeout_secs = f64::NAN;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

    let mut config = Config::for_test();
    config.cloud.fetch_timeout_secs = f64::INFINITY;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

    let mut config = Config::for_test();
    config.weather.request_timeout_secs = 0.0;
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_negative_timeout_from_env_is_rejected() {
    std::env::set_var("ADABRIDGE__CLOUD__USERNAME", "carol");
    std::env::set_var("ADABRIDGE__CLOUD__KEY", "secret");
    std::env::set_var("ADABRIDGE__LOCAL__PUBLISH_TIMEOUT_SECS", "-1");

    let result = Config::load(None);

    std::env::remove_var("ADABRIDGE__CLOUD__USERNAME");
    std::env::remove_var("ADABRIDGE__CLOUD__KEY");
    std::env::remove_var("ADABRIDGE__LOCAL__PUBLISH_TIMEOUT_SECS");

    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_throttle_topics() {
    let config = Config::for_test();
    assert_eq!(
        config.throttle.topics(&config.cloud.username),
        vec!["tester/errors".to_string(), "tester/throttle".to_string()]
    );
}

#[test]
#[serial]
fn test_load_from_file() {
    let file = write_yaml(
        r#"
cloud:
  username: alice
  key: secret
  weather_id: "1234"
local:
  host: broker.lan
weather:
  api_key: abc
  city_id: "4956184"
bays:
  enabled: true
  interval_secs: 20
"#,
    );

    let config = Config::load(file.path().to_str()).unwrap();
    assert_eq!(config.cloud.username, "alice");
    assert_eq!(config.cloud.weather_id.as_deref(), Some("1234"));
    assert_eq!(config.local.host, "broker.lan");
    assert_eq!(config.local.port, 1883);
    assert!(config.weather.enabled());
    assert!(config.bays.enabled);
    assert_eq!(config.bays.interval(), Duration::from_secs(20));
}

#[test]
#[serial]
fn test_env_overrides_file() {
    let file = write_yaml("cloud:\n  username: alice\n  key: secret\n");
    std::env::set_var("ADABRIDGE__CLOUD__USERNAME", "bob");
    std::env::set_var("ADABRIDGE__LOCAL__PORT", "1884");

    let result = Config::load(file.path().to_str());

    std::env::remove_var("ADABRIDGE__CLOUD__USERNAME");
    std::env::remove_var("ADABRIDGE__LOCAL__PORT");

    let config = result.unwrap();
    assert_eq!(config.cloud.username, "bob");
    assert_eq!(config.local.port, 1884);
}

#[test]
#[serial]
fn test_missing_explicit_file_is_error() {
    let result = Config::load(Some("/definitely/not/here/adabridge.yaml"));
    assert!(matches!(result, Err(ConfigError::Load(_))));
}
