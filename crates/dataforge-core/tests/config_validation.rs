use dataforge_core::{
    Categorical, ConfigError, DatasetConfig, DatasetKind, GenerationConfig, KeyTransform,
    PartitionKey, validate_config,
};

fn events_config() -> GenerationConfig {
    GenerationConfig {
        total_rows: 1_000,
        workers: Some(4),
        ..GenerationConfig::default()
    }
}

#[test]
fn default_config_is_valid() {
    GenerationConfig::default()
        .validate()
        .expect("defaults validate");
}

#[test]
fn every_dataset_default_validates() {
    for kind in [
        DatasetKind::Users,
        DatasetKind::Events,
        DatasetKind::StructuredEvents,
        DatasetKind::Leaderboard,
        DatasetKind::TenantActivity,
    ] {
        let config = GenerationConfig {
            dataset: DatasetConfig::default_for(kind),
            ..events_config()
        };
        validate_config(&config).unwrap_or_else(|err| panic!("{kind}: {err}"));
    }
}

#[test]
fn zero_rows_are_rejected() {
    let config = GenerationConfig {
        total_rows: 0,
        ..events_config()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidRowCount(_))
    ));
}

#[test]
fn zero_workers_are_rejected() {
    let config = GenerationConfig {
        workers: Some(0),
        ..events_config()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidParallelism(_))
    ));
}

#[test]
fn unnormalized_weights_are_rejected() {
    let mut config = events_config();
    if let DatasetConfig::Events(events) = &mut config.dataset {
        events.event_type = Categorical::weighted(&[("purchase", 0.6), ("session", 0.6)]);
        events.transaction_types = vec!["purchase".to_string()];
    }
    assert!(matches!(
        config.validate(),
        Err(ConfigError::WeightsNotNormalized { .. })
    ));
}

#[test]
fn inverted_date_range_is_rejected() {
    let mut config = events_config();
    if let DatasetConfig::Events(events) = &mut config.dataset {
        std::mem::swap(&mut events.event_at.start, &mut events.event_at.end);
    }
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvertedRange { .. })
    ));
}

#[test]
fn unknown_partition_field_is_rejected() {
    let config = GenerationConfig {
        partition_by: Some(vec![PartitionKey::new(
            "date",
            "created_at",
            KeyTransform::Day,
        )]),
        ..events_config()
    };
    assert_eq!(
        config.validate(),
        Err(ConfigError::UnknownField {
            context: "partition_by",
            field: "created_at".to_string(),
        })
    );
}

#[test]
fn time_transform_needs_temporal_field() {
    let config = GenerationConfig {
        partition_by: Some(vec![PartitionKey::new(
            "kind",
            "event_type",
            KeyTransform::Day,
        )]),
        ..events_config()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::IncompatibleTransform { .. })
    ));
}

#[test]
fn hidden_partition_key_names_are_rejected() {
    for name in ["_staging", ".kind"] {
        let config = GenerationConfig {
            partition_by: Some(vec![PartitionKey::new(
                name,
                "event_type",
                KeyTransform::Identity,
            )]),
            ..events_config()
        };
        assert!(
            matches!(config.validate(), Err(ConfigError::InvalidOutput(_))),
            "{name} should be rejected"
        );
    }
}

#[test]
fn unknown_sort_field_is_rejected() {
    let config = GenerationConfig {
        sort_by: Some("amount".to_string()),
        ..events_config()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::UnknownField {
            context: "sort_by",
            ..
        })
    ));
}

#[test]
fn toml_overrides_merge_with_defaults() {
    let raw = r#"
total_rows = 5000
seed = 7

[output]
root = "out/tenants"
codec = "zstd"

[dataset]
kind = "tenant_activity"

[dataset.dt]
start = "2026-02-01"
end = "2026-02-03"
"#;
    let config: GenerationConfig = toml::from_str(raw).expect("parse toml");
    assert_eq!(config.total_rows, 5000);
    assert_eq!(config.seed, 7);
    assert_eq!(config.output.codec.as_str(), "zstd");
    assert_eq!(config.output.file_prefix, "part");
    assert_eq!(config.dataset.kind(), DatasetKind::TenantActivity);

    let names: Vec<String> = config
        .partition_keys()
        .into_iter()
        .map(|key| key.name)
        .collect();
    assert_eq!(names, vec!["dt", "tenant"]);
    config.validate().expect("valid tenant config");
}

#[test]
fn default_config_round_trips_through_toml() {
    let config = GenerationConfig::default();
    let rendered = toml::to_string_pretty(&config).expect("render toml");
    let parsed: GenerationConfig = toml::from_str(&rendered).expect("parse rendered toml");
    assert_eq!(parsed, config);
}
