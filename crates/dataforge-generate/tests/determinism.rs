use std::collections::HashMap;

use dataforge_core::{BatchDescriptor, DatasetConfig, DatasetKind, EventsConfig, GenerationConfig};
use dataforge_generate::datasets::{EventsGenerator, StructuredEventsGenerator};
use dataforge_generate::{generate_batch, plan_batches};

fn descriptor(start_index: u64, end_index: u64, seed: u64) -> BatchDescriptor {
    BatchDescriptor {
        batch_id: 3,
        start_index,
        end_index,
        seed,
    }
}

#[test]
fn same_descriptor_produces_identical_batches() {
    let generator = EventsGenerator::new(&EventsConfig::default()).expect("events generator");
    let batch = descriptor(1_000, 3_000, 987_654);

    let first = generate_batch(&generator, &batch).expect("first batch");
    let second = generate_batch(&generator, &batch).expect("second batch");

    assert_eq!(first.len(), 2_000);
    assert_eq!(first, second);
    assert_eq!(first[0].row_index, 1_000);
    assert_eq!(first[1_999].row_index, 2_999);
}

#[test]
fn different_seeds_produce_different_batches() {
    let generator = EventsGenerator::new(&EventsConfig::default()).expect("events generator");
    let a = generate_batch(&generator, &descriptor(0, 500, 1)).expect("batch a");
    let b = generate_batch(&generator, &descriptor(0, 500, 2)).expect("batch b");
    assert_ne!(a, b);
}

#[test]
fn planned_seeds_are_stable_per_batch() {
    let a = plan_batches(10_000, 4, None, 42).expect("plan a");
    let b = plan_batches(10_000, 4, None, 42).expect("plan b");
    assert_eq!(a, b);

    let seeds: std::collections::HashSet<u64> = a.iter().map(|batch| batch.seed).collect();
    assert_eq!(seeds.len(), a.len(), "batch seeds should be distinct");
}

#[test]
fn revenue_is_zero_outside_transactions() {
    let config = EventsConfig::default();
    let generator = EventsGenerator::new(&config).expect("events generator");
    let records = generate_batch(&generator, &descriptor(0, 50_000, 7)).expect("batch");

    let mut transactions = 0;
    for record in &records {
        if config.transaction_types.contains(&record.event_type) {
            transactions += 1;
            assert!(
                record.revenue >= config.revenue.min && record.revenue <= config.revenue.max,
                "revenue {} outside range",
                record.revenue
            );
        } else {
            assert_eq!(record.revenue, 0.0, "non-transaction {}", record.event_type);
        }
    }
    assert!(transactions > 0);
}

#[test]
fn event_type_shares_follow_weights() {
    let config = EventsConfig::default();
    let generator = EventsGenerator::new(&config).expect("events generator");
    let records = generate_batch(&generator, &descriptor(0, 200_000, 11)).expect("batch");

    let mut counts: HashMap<&str, u64> = HashMap::new();
    for record in &records {
        *counts.entry(record.event_type.as_str()).or_default() += 1;
    }
    let weights = config.event_type.probabilities();
    for (label, weight) in config.event_type.values.iter().zip(weights) {
        let observed = counts.get(label.as_str()).copied().unwrap_or(0) as f64 / 200_000.0;
        assert!(
            (observed - weight).abs() < 0.01,
            "{label}: observed {observed}, expected {weight}"
        );
    }
}

#[test]
fn structured_properties_are_json_objects() {
    let config = GenerationConfig {
        dataset: DatasetConfig::default_for(DatasetKind::StructuredEvents),
        ..GenerationConfig::default()
    };
    let DatasetConfig::StructuredEvents(structured) = &config.dataset else {
        panic!("expected structured events config");
    };
    let generator = StructuredEventsGenerator::new(structured).expect("structured generator");
    let records = generate_batch(&generator, &descriptor(0, 1_000, 5)).expect("batch");

    for record in &records {
        let value: serde_json::Value =
            serde_json::from_str(&record.properties).expect("properties are json");
        let object = value.as_object().expect("properties are an object");
        assert!((2..=5).contains(&object.len()));
    }
}
