//! Integration test: end-to-end feature selection runs

use featswarm::cli::load_dataset;
use featswarm::dataset::{Column, Dataset};
use featswarm::optimizer::EngineState;
use featswarm::selection::{SelectionConfig, SelectionEngine, SelectionReport, SelectionStatus};
use featswarm::training::{ForestConfig, ModelKind, SENTINEL_FAILURE};
use polars::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tempfile::tempdir;

/// 100 plots, five numeric candidates (rain and temp matter), a site id
/// with a per-site offset and a year column that is metadata
fn plots_df(n: usize) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(21);
    let offsets = [-3.0, -1.0, 0.0, 1.5, 2.5];
    let mut rain = Vec::with_capacity(n);
    let mut temp = Vec::with_capacity(n);
    let mut wind = Vec::with_capacity(n);
    let mut ph = Vec::with_capacity(n);
    let mut slope = Vec::with_capacity(n);
    let mut site = Vec::with_capacity(n);
    let mut year = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);

    for i in 0..n {
        let r: f64 = rng.gen_range(0.0..10.0);
        let t: f64 = rng.gen_range(10.0..30.0);
        let s = i % 5;
        rain.push(r);
        temp.push(t);
        wind.push(rng.gen_range(0.0..5.0));
        ph.push(rng.gen_range(5.0..8.0));
        slope.push(rng.gen_range(0.0..1.0));
        site.push(s as i64);
        year.push(2015 + (i % 4) as i64);
        y.push(3.0 * r + 0.8 * t + offsets[s] + rng.gen_range(-0.5..0.5));
    }

    df!(
        "yield" => y,
        "rain" => rain,
        "temp" => temp,
        "wind" => wind,
        "ph" => ph,
        "slope" => slope,
        "site" => site,
        "year" => year
    )
    .unwrap()
}

fn base_config() -> SelectionConfig {
    SelectionConfig::new("yield")
        .with_exclude(vec!["site".to_string(), "year".to_string()])
        .with_folds(5)
        .with_warm_start_sizes(vec![1, 3])
        .with_swarm_size(10)
        .with_max_iterations(5)
}

#[test]
fn test_linear_run_completes() {
    let data = Dataset::from_dataframe(&plots_df(100)).unwrap();
    let report = SelectionEngine::new(base_config()).unwrap().run(&data).unwrap();

    assert_eq!(report.status, SelectionStatus::Stable);
    assert_eq!(report.n_candidates, 5);
    assert_eq!(report.best_position.len(), 5);
    assert!(report.best_position.iter().all(|v| (0.0..=1.0).contains(v)));
    assert_eq!(report.trace.len(), 5);
    assert!(report.trace.windows(2).all(|w| w[1] <= w[0]));
    assert!(report.fitness <= report.initial_best_fitness);
    assert_eq!(report.state, EngineState::MaxIterReached);
    assert_eq!(report.evaluations, 10 * 6);

    assert!(report.selected.contains(&"rain".to_string()));
    assert!(report.selected.contains(&"temp".to_string()));
    let cv = report.cv_error.unwrap();
    let expected = cv + report.selected.len() as f64 * report.penalty_per_variable;
    assert!((report.fitness - expected).abs() < 1e-9);
}

#[test]
fn test_zero_penalty_fitness_equals_cv_error() {
    let data = Dataset::from_dataframe(&plots_df(100)).unwrap();
    let config = base_config().with_penalty_factor(0.0);
    let report = SelectionEngine::new(config).unwrap().run(&data).unwrap();

    assert_eq!(report.penalty_per_variable, 0.0);
    assert_eq!(Some(report.fitness), report.cv_error);
}

#[test]
fn test_runs_are_reproducible() {
    let data = Dataset::from_dataframe(&plots_df(100)).unwrap();
    let a = SelectionEngine::new(base_config()).unwrap().run(&data).unwrap();
    let b = SelectionEngine::new(base_config().with_pso(base_config().pso.with_parallel(false)))
        .unwrap()
        .run(&data)
        .unwrap();

    assert_eq!(a.selected, b.selected);
    assert_eq!(a.best_position, b.best_position);
    assert_eq!(a.trace, b.trace);
}

#[test]
fn test_mixed_effects_run_with_site_group() {
    let data = Dataset::from_dataframe(&plots_df(100)).unwrap();
    let config = base_config()
        .with_exclude(vec!["year".to_string()])
        .with_group("site")
        .with_model_kind(ModelKind::MixedEffects);
    let engine = SelectionEngine::new(config).unwrap();

    let candidates = engine.candidates(&data).unwrap();
    assert!(candidates.index_of("site").is_none());

    let report = engine.run(&data).unwrap();
    assert!(report.is_stable());
    assert_eq!(report.n_candidates, 5);
    assert!(report.selected.contains(&"rain".to_string()));
}

#[test]
fn test_mixed_effects_requires_group() {
    let config = base_config().with_model_kind(ModelKind::MixedEffects);
    assert!(SelectionEngine::new(config).is_err());
}

#[test]
fn test_random_forest_run() {
    let data = Dataset::from_dataframe(&plots_df(80)).unwrap();
    let config = base_config()
        .with_model_kind(ModelKind::RandomForest)
        .with_forest(ForestConfig::default().with_n_estimators(8))
        .with_swarm_size(4)
        .with_max_iterations(2);
    let report = SelectionEngine::new(config).unwrap().run(&data).unwrap();

    assert!(report.is_stable());
    assert_eq!(report.trace.len(), 2);
    assert!(report.fitness < SENTINEL_FAILURE);
}

#[test]
fn test_unfittable_candidates_give_unstable_report() {
    let n = 30;
    let labels: Vec<&str> = (0..n).map(|i| if i == 4 { "rare" } else { "common" }).collect();
    let data = Dataset::new(vec![
        Column::numeric("yield", (0..n).map(|i| i as f64).collect::<Vec<_>>()),
        Column::categorical("soil", &labels),
    ])
    .unwrap();

    let config = SelectionConfig::new("yield")
        .with_folds(3)
        .with_warm_start_sizes(vec![])
        .with_swarm_size(4)
        .with_max_iterations(3);
    let report = SelectionEngine::new(config).unwrap().run(&data).unwrap();

    assert_eq!(report.status, SelectionStatus::Unstable);
    assert_eq!(report.fitness, SENTINEL_FAILURE);
    assert!(report.cv_error.is_none());
    assert_eq!(report.failed_evaluations, report.evaluations);
    assert!(report.to_string().starts_with("UNSTABLE"));
}

#[test]
fn test_csv_run_and_report_json() {
    let dir = tempdir().unwrap();
    let csv_path = dir.path().join("plots.csv");

    let mut df = plots_df(60);
    let mut file = std::fs::File::create(&csv_path).unwrap();
    CsvWriter::new(&mut file).finish(&mut df).unwrap();

    let data = load_dataset(&csv_path).unwrap();
    assert_eq!(data.n_rows(), 60);
    assert!(data.column("site").unwrap().is_numeric());

    let config_path = dir.path().join("run.json");
    std::fs::write(
        &config_path,
        r#"{"response": "yield", "exclude": ["site", "year"], "warm_start_sizes": [2],
            "swarm_size": 5, "max_iterations": 3, "seed": 9}"#,
    )
    .unwrap();

    let config = SelectionConfig::from_json_file(&config_path).unwrap();
    assert_eq!(config.pso.swarm_size, 5);
    assert_eq!(config.pso.seed, 9);

    let report = SelectionEngine::new(config).unwrap().run(&data).unwrap();
    let report_path = dir.path().join("report.json");
    report.save_json(&report_path).unwrap();

    let text = std::fs::read_to_string(&report_path).unwrap();
    let back: SelectionReport = serde_json::from_str(&text).unwrap();
    assert_eq!(back.selected, report.selected);
    assert_eq!(back.status, report.status);
    assert_eq!(back.trace.len(), 3);
    assert!((back.fitness - report.fitness).abs() < 1e-9);
}

/// Response in the billions: a clean fit still has a CV error above the
/// failure sentinel
fn large_scale_df(n: usize, with_rare_soil: bool) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(17);
    let x: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..10.0)).collect();
    let z: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..10.0)).collect();
    let y: Vec<f64> = x.iter().map(|v| 1e9 * v + rng.gen_range(-5e7..5e7)).collect();

    let mut df = df!("y" => y, "x" => x, "z" => z).unwrap();
    if with_rare_soil {
        let soil: Vec<&str> = (0..n).map(|i| if i == 4 { "peat" } else { "clay" }).collect();
        df.with_column(Series::new("soil".into(), soil)).unwrap();
    }
    df
}

#[test]
fn test_large_scale_response_is_stable() {
    let data = Dataset::from_dataframe(&large_scale_df(100, false)).unwrap();
    let config = SelectionConfig::new("y")
        .with_penalty_factor(0.0)
        .with_warm_start_sizes(vec![1])
        .with_swarm_size(6)
        .with_max_iterations(3);
    let report = SelectionEngine::new(config).unwrap().run(&data).unwrap();

    assert!(report.fitness > SENTINEL_FAILURE);
    assert_eq!(report.status, SelectionStatus::Stable);
    assert_eq!(report.cv_error, Some(report.fitness));
    assert!(report.selected.contains(&"x".to_string()));
    assert!(!report.to_string().starts_with("UNSTABLE"));
}

#[test]
fn test_failing_subsets_never_beat_large_errors() {
    let data = Dataset::from_dataframe(&large_scale_df(100, true)).unwrap();
    let config = SelectionConfig::new("y")
        .with_penalty_factor(0.0)
        .with_warm_start_sizes(vec![1])
        .with_swarm_size(8)
        .with_max_iterations(4);
    let report = SelectionEngine::new(config).unwrap().run(&data).unwrap();

    assert!(report.failed_evaluations > 0);
    assert!(report.is_stable());
    assert!(!report.selected.contains(&"soil".to_string()));
    assert!(report.trace.iter().all(|f| *f > SENTINEL_FAILURE));
}

/// y = 5·x1 + x2 + small noise; x3..x5 are pure noise
fn penalty_df(n: usize) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(33);
    let cols: Vec<Vec<f64>> = (0..5)
        .map(|_| (0..n).map(|_| rng.gen_range(0.0..10.0)).collect())
        .collect();
    let y: Vec<f64> = (0..n)
        .map(|i| 5.0 * cols[0][i] + cols[1][i] + rng.gen_range(-0.2..0.2))
        .collect();

    df!(
        "y" => y,
        "x1" => &cols[0],
        "x2" => &cols[1],
        "x3" => &cols[2],
        "x4" => &cols[3],
        "x5" => &cols[4]
    )
    .unwrap()
}

#[test]
fn test_larger_penalty_never_selects_more() {
    let data = Dataset::from_dataframe(&penalty_df(100)).unwrap();

    let sizes: Vec<usize> = [0.0, 0.5, 5.0]
        .iter()
        .map(|&factor| {
            let config = SelectionConfig::new("y")
                .with_penalty_factor(factor)
                .with_warm_start_sizes(vec![1, 5])
                .with_swarm_size(10)
                .with_max_iterations(5)
                .with_seed(3);
            let report = SelectionEngine::new(config).unwrap().run(&data).unwrap();
            assert!(report.is_stable());
            report.selected.len()
        })
        .collect();

    assert!(sizes.windows(2).all(|w| w[1] <= w[0]), "{:?}", sizes);
    assert!(sizes[0] >= 2, "{:?}", sizes);
    assert_eq!(sizes[2], 1);
}
