//! 配置文件反序列化测试（需要 `serde` feature）
#![cfg(feature = "serde")]

use rover_driver::PipelineConfig;

#[test]
fn test_partial_toml_keeps_defaults() {
    let config: PipelineConfig = toml::from_str(
        r#"
        min_safe_range_cm = 25

        [watchdog]
        interval_ms = 250
        wake_sweep = [0]
        "#,
    )
    .unwrap();

    assert_eq!(config.min_safe_range_cm, 25);
    assert_eq!(config.watchdog.interval_ms, 250);
    assert_eq!(config.watchdog.wake_sweep, vec![0]);
    assert_eq!(config.watchdog.attempts, 4);
    assert_eq!(config.motor.slowest_speed, 0);
    assert_eq!(config.correlation_ttl_ms, None);
}

#[test]
fn test_empty_toml_is_default() {
    let config: PipelineConfig = toml::from_str("").unwrap();
    assert_eq!(config, PipelineConfig::default());
}

#[test]
fn test_serialize_then_parse() {
    let mut config = PipelineConfig::default();
    config.correlation_ttl_ms = Some(5_000);
    config.motor.slowest_speed = 60;
    let text = toml::to_string(&config).unwrap();
    let parsed: PipelineConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed, config);
}
