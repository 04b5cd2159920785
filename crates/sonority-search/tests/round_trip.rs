//! Build → save → load tests against the public API.

use sonority_core::FeatureVector;
use sonority_search::ann::angular_distance;
use sonority_search::{BuildOptions, Engine, IndexBuilder, Model, ModelHandle, TrainingRow};
use tempfile::TempDir;

fn dataset(count: u32) -> Vec<TrainingRow> {
    (0..count)
        .map(|i| {
            let x = f64::from(i);
            let features = FeatureVector::new(
                (x * 1.618).fract(),
                (x * 0.414).fract() * 0.8,
                (x * 2.718).fract(),
                55.0 + (x * 37.0) % 160.0,
            );
            TrainingRow::new(features, 1960 + (i % 64) as u16)
        })
        .collect()
}

/// Ids of the `k` items truly closest to `features` in index space.
fn exact_top_k(engine: &Engine, features: &FeatureVector, k: usize) -> Vec<u32> {
    let query = engine.prepare_query(features).unwrap().map(|v| v as f32);
    let index = engine.model().index();
    let mut all: Vec<(u32, f32)> = (0..index.len() as u32)
        .map(|id| (id, angular_distance(&query, index.vector(id).unwrap())))
        .collect();
    all.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    all.into_iter().take(k).map(|(id, _)| id).collect()
}

#[test]
fn test_loaded_model_answers_like_in_memory_model() {
    let temp_dir = TempDir::new().unwrap();
    let model_dir = temp_dir.path().join("models");

    let rows = dataset(400);
    let model = IndexBuilder::build(&rows, BuildOptions::default().with_seed(11)).unwrap();
    model.save(&model_dir).unwrap();

    let in_memory = Engine::new(model);
    let loaded = Engine::load(&model_dir).unwrap();

    for query in [
        FeatureVector::FALLBACK,
        FeatureVector::new(0.1, 0.7, 0.9, 180.0),
        rows[123].features,
    ] {
        assert_eq!(
            in_memory.recommend(&query, Some(1990), 10).unwrap(),
            loaded.recommend(&query, Some(1990), 10).unwrap()
        );
    }
}

#[test]
fn test_results_come_from_true_neighbourhood() {
    let rows = dataset(500);
    let engine = Engine::new(
        IndexBuilder::build(&rows, BuildOptions::default().with_seed(23)).unwrap(),
    );

    let query = FeatureVector::new(0.35, 0.15, 0.55, 118.0);
    let exact = exact_top_k(&engine, &query, 30);
    let results = engine.recommend(&query, None, 10).unwrap();

    let hits = results.iter().filter(|r| exact.contains(&r.id)).count();
    assert!(hits >= 9, "only {hits} of {} results in exact top 30", results.len());
}

#[test]
fn test_rebuilt_model_can_be_swapped_in() {
    let temp_dir = TempDir::new().unwrap();
    let model_dir = temp_dir.path().join("models");

    IndexBuilder::build(&dataset(100), BuildOptions::default().with_seed(1))
        .unwrap()
        .save(&model_dir)
        .unwrap();
    let handle = ModelHandle::with_engine(Engine::load(&model_dir).unwrap());
    let first = handle.current().unwrap();

    IndexBuilder::build(&dataset(150), BuildOptions::default().with_seed(2))
        .unwrap()
        .save(&model_dir)
        .unwrap();
    handle.publish(Engine::load(&model_dir).unwrap());

    assert_eq!(first.stats().items, 100);
    assert_eq!(handle.current().unwrap().stats().items, 150);
    assert_eq!(Model::load(&model_dir).unwrap().index().len(), 150);
}

#[test]
fn test_fallback_features_need_no_special_handling() {
    let engine = Engine::new(
        IndexBuilder::build(&dataset(80), BuildOptions::default().with_seed(5)).unwrap(),
    );
    let results = engine.recommend(&FeatureVector::FALLBACK, None, 10).unwrap();
    assert_eq!(results.len(), 10);
}
