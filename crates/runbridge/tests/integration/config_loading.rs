use runbridge::config::{Config, ConfigError, LanguageId};

use super::FIXTURES_PATH;

#[test]
fn test_load_minimal_config_keeps_defaults() {
    let path = format!("{FIXTURES_PATH}/configs/valid_minimal.toml");
    let config = Config::from_file(&path).expect("Failed to load config");

    assert_eq!(config.bind.port(), 9000);
    assert_eq!(config.stream.chunk_size, 256);
    assert_eq!(config.stream.channel_capacity, 64);
    for id in LanguageId::ALL.into_iter().filter(|id| id.layout().is_some()) {
        assert!(config.get_language(id).is_ok(), "missing {id}");
    }
}

#[test]
fn test_load_stand_in_config() {
    let path = format!("{FIXTURES_PATH}/stand_in.toml");
    let config = Config::from_file(&path).expect("Failed to load config");

    let c = config.get_language(LanguageId::C).unwrap();
    assert_eq!(c.name, "C (sh stand-in)");
    assert!(c.is_compiled());
    assert_eq!(c.run.command[0], "sh");
}

#[test]
fn test_load_missing_file() {
    let path = format!("{FIXTURES_PATH}/configs/does_not_exist.toml");
    assert!(matches!(
        Config::from_file(&path),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn test_load_invalid_unknown_language() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_unknown_language.toml");
    match Config::from_file(&path) {
        Err(ConfigError::Invalid(msg)) => assert!(msg.contains("ruby"), "{msg}"),
        other => panic!("expected Invalid, got {other:?}"),
    }
}

#[test]
fn test_load_invalid_empty_name() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_empty_name.toml");
    assert!(matches!(
        Config::from_file(&path),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_load_invalid_compile_for_interpreted() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_compile_for_interpreted.toml");
    match Config::from_file(&path) {
        Err(ConfigError::Invalid(msg)) => assert!(msg.contains("javascript"), "{msg}"),
        other => panic!("expected Invalid, got {other:?}"),
    }
}

#[test]
fn test_load_invalid_zero_chunk_size() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_zero_chunk_size.toml");
    match Config::from_file(&path) {
        Err(ConfigError::Invalid(msg)) => assert!(msg.contains("chunk_size"), "{msg}"),
        other => panic!("expected Invalid, got {other:?}"),
    }
}
