/*!
 * Tests for configuration defaults, validation and persistence
 */

use doctran::app_config::{Config, LogLevel, TranslationProvider};
use doctran::chunking::Tier;

use crate::common::create_temp_dir;

#[test]
fn test_default_shouldMatchTierTable() {
    let config = Config::default();

    assert_eq!(config.target_language, "fr");
    assert!(config.source_language.is_none());
    assert_eq!(config.log_level, LogLevel::Info);

    let basic = config.chunking.tiers.get(Tier::Basic);
    assert_eq!((basic.max_tokens, basic.overlap, basic.generate_dna), (500, 50, false));

    let standard = config.chunking.tiers.get(Tier::Standard);
    assert_eq!((standard.max_tokens, standard.overlap, standard.generate_dna), (1000, 100, false));
    assert!(standard.preserve_structure);

    let premium = config.chunking.tiers.get(Tier::Premium);
    assert_eq!((premium.max_tokens, premium.overlap, premium.generate_dna), (1500, 100, true));
    assert_eq!(premium.concurrency, 1);

    assert_eq!(config.queue.max_attempts, 3);
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_overlapNotBelowMax_shouldFail() {
    let mut config = Config::default();
    config.chunking.tiers.get_mut(Tier::Standard).overlap = 1000;

    let error = config.validate().unwrap_err();
    assert!(format!("{:#}", error).contains("standard"));
}

#[test]
fn test_validate_unknownTargetLanguage_shouldFail() {
    let config = Config {
        target_language: "klingon".to_string(),
        ..Config::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_hostedProviderWithoutKey_shouldFail() {
    let mut config = Config::default();
    config.chunking.tiers.get_mut(Tier::Premium).provider = TranslationProvider::OpenAI;

    let error = config.validate().unwrap_err().to_string();
    assert!(error.contains("API key"), "unexpected error: {}", error);

    for provider in config.translation.available_providers.iter_mut() {
        if provider.provider_type == "openai" {
            provider.api_key = "sk-test".to_string();
        }
    }
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_badEndpoint_shouldFail() {
    let mut config = Config::default();
    for provider in config.translation.available_providers.iter_mut() {
        if provider.provider_type == "ollama" {
            provider.endpoint = "not a url".to_string();
        }
    }
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_unusedProviderProblems_shouldBeIgnored() {
    let mut config = Config::default();
    // Every tier runs on Ollama, so the Anthropic entry is never reached
    for provider in config.translation.available_providers.iter_mut() {
        if provider.provider_type == "anthropic" {
            provider.api_key.clear();
            provider.endpoint = "::".to_string();
        }
    }
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_zeroConcurrencyOrWorkers_shouldFail() {
    let mut config = Config::default();
    config.chunking.tiers.get_mut(Tier::Basic).concurrency = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.queue.workers = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.chunking.heading_pattern = Some("(unclosed".to_string());
    assert!(config.validate().is_err());
}

#[test]
fn test_loadOrCreate_missingFile_shouldWriteDefaults() {
    let dir = create_temp_dir().unwrap();
    let path = dir.path().join("nested").join("conf.json");

    let config = Config::load_or_create(&path).unwrap();

    assert!(path.exists());
    assert_eq!(config.target_language, "fr");

    let reloaded = Config::load_or_create(&path).unwrap();
    assert_eq!(reloaded.chunking.tiers, config.chunking.tiers);
}

#[test]
fn test_loadOrCreate_partialFile_shouldFillDefaults() {
    let dir = create_temp_dir().unwrap();
    let path = dir.path().join("conf.json");
    std::fs::write(
        &path,
        r#"{ "target_language": "de", "queue": { "max_attempts": 5 }, "log_level": "debug" }"#,
    )
    .unwrap();

    let config = Config::load_or_create(&path).unwrap();

    assert_eq!(config.target_language, "de");
    assert_eq!(config.queue.max_attempts, 5);
    assert_eq!(config.queue.workers, 2);
    assert_eq!(config.log_level, LogLevel::Debug);
    assert_eq!(config.chunking.tiers.get(Tier::Premium).max_tokens, 1500);
}

#[test]
fn test_loadOrCreate_malformedFile_shouldFail() {
    let dir = create_temp_dir().unwrap();
    let path = dir.path().join("conf.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(Config::load_or_create(&path).is_err());
}

#[test]
fn test_modelFor_tierOverride_shouldWin() {
    let mut config = Config::default();
    let tier = config.chunking.tiers.get_mut(Tier::Basic);
    tier.model = None;
    let settings = tier.clone();

    let provider_model = config
        .translation
        .get_provider_config(&TranslationProvider::Ollama)
        .map(|p| p.model.clone())
        .unwrap();
    assert_eq!(config.translation.model_for(&settings), provider_model);

    let premium = config.chunking.tiers.get(Tier::Premium);
    assert_eq!(config.translation.model_for(premium), "llama3.1:70b");
}
