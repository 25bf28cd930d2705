use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use pairs_trading_core::correlation::SerialCorrelationEngine;
use pairs_trading_core::half_life::HalfLifeEstimator;
use pairs_trading_core::matrix::{CointegrationMatrixBuilder, FileMatrixCache, ResultCache};
use pairs_trading_core::pairs::{enumerate_pairs, pair_counts, SectorMap};
use pairs_trading_core::stability::StabilityAggregator;
use pairs_trading_core::{AnalysisConfig, ExecutionMode, PriceTable, TRADING_DAYS};

// ===========================================================================
// Fixtures
// ===========================================================================

/// One tech sector with a cointegrated pair (BBB tracks 3x AAA) and an
/// unrelated third symbol, over a full trading year.
fn sample_universe() -> (SectorMap, PriceTable) {
    let mut sectors = SectorMap::new();
    sectors.insert(
        "information-technology".to_string(),
        vec!["AAA".into(), "BBB".into(), "CCC".into()],
    );

    let n = TRADING_DAYS;
    let mut rng = StdRng::seed_from_u64(101);
    let mut aaa = vec![100.0];
    for i in 1..n {
        aaa.push(aaa[i - 1] + rng.gen::<f64>() - 0.5);
    }
    let bbb: Vec<f64> = aaa
        .iter()
        .map(|x| 3.0 * x + 0.02 * (rng.gen::<f64>() - 0.5))
        .collect();
    let mut ccc = vec![40.0];
    for i in 1..n {
        ccc.push(ccc[i - 1] + rng.gen::<f64>() - 0.5);
    }

    let start = NaiveDate::from_ymd_opt(2007, 1, 3).unwrap();
    let dates = (0..n).map(|i| start + chrono::Days::new(i as u64)).collect();
    let columns = BTreeMap::from([
        ("AAA".to_string(), aaa),
        ("BBB".to_string(), bbb),
        ("CCC".to_string(), ccc),
    ]);
    (sectors, PriceTable::new(dates, columns).unwrap())
}

fn temp_cache(name: &str) -> FileMatrixCache {
    let path: PathBuf = std::env::temp_dir().join(format!(
        "pairs-trading-pipeline-{}-{}.json",
        name,
        std::process::id()
    ));
    let _ = fs::remove_file(&path);
    FileMatrixCache::new(path)
}

// ===========================================================================
// End-to-end pipeline
// ===========================================================================

#[test]
fn test_full_pipeline_selects_the_constructed_pair() {
    let (sectors, table) = sample_universe();
    let config = AnalysisConfig::default();

    let pairs = enumerate_pairs(&sectors);
    assert_eq!(pairs.len(), 3);
    let summary = pair_counts(&sectors);
    assert_eq!(summary.last().unwrap().num_pairs, 3);

    let engine = SerialCorrelationEngine::new(&table, pairs, config.window).unwrap();
    let correlations = engine.windowed_matrix(&table).unwrap();
    // 252 sessions at a 126-session window: exactly two rows
    assert_eq!(correlations.num_windows(), 2);

    let cache = temp_cache("full");
    let matrix = CointegrationMatrixBuilder::with_mode(config.mode)
        .build(&table, &correlations, &cache)
        .unwrap();
    assert_eq!(matrix.num_windows(), 2);
    assert_eq!(matrix.columns.len(), 3);

    // the constructed pair is column 0 (sector symbols are enumerated
    // in order) and must be flagged by both tests in both windows
    for row in 0..2 {
        let cell = matrix.cell(row, 0);
        assert_eq!(cell.granger.asset_a, "BBB", "larger slope side is canonical");
        assert!(cell.granger.cointegrated);
        assert!(cell.johansen.cointegrated);
        assert!(cell.correlation >= config.correlation_cutoff);
        assert!((cell.granger.weight - 3.0).abs() < 0.1);
    }

    let report = StabilityAggregator::from_config(&config).aggregate(&matrix);
    assert_eq!(report.counters.total_pairs, 6);
    assert!(report.counters.correlation.total >= 1);
    assert!(report.counters.by_test.granger.total >= 1);
    // the constructed pair stays cointegrated into the second window
    assert!(report.counters.by_test.granger.serial >= 1);
    assert_eq!(report.granger_pair_counts.len(), 1);
    assert!(report.granger_pair_counts[0].1 >= 1);

    let half_lives = HalfLifeEstimator::from_config(&config)
        .estimate(&table, &matrix)
        .unwrap();
    assert!(!half_lives.is_empty());
    assert!(half_lives.iter().all(|h| *h > 0 && *h < config.window as i64));

    let _ = fs::remove_file(cache.path());
}

#[test]
fn test_cached_matrix_is_reused_verbatim() {
    let (sectors, table) = sample_universe();
    let config = AnalysisConfig::default();
    let pairs = enumerate_pairs(&sectors);
    let engine = SerialCorrelationEngine::new(&table, pairs, config.window).unwrap();
    let correlations = engine.windowed_matrix(&table).unwrap();

    let cache = temp_cache("reuse");
    let builder = CointegrationMatrixBuilder::new();
    let first = builder.build(&table, &correlations, &cache).unwrap();
    assert!(cache.has_existing_matrix());

    // rebuilding against flat prices would produce an entirely
    // different matrix, so equality proves the cache was used
    let start = NaiveDate::from_ymd_opt(2007, 1, 3).unwrap();
    let dates: Vec<NaiveDate> = (0..TRADING_DAYS)
        .map(|i| start + chrono::Days::new(i as u64))
        .collect();
    let flat = BTreeMap::from([
        ("AAA".to_string(), vec![1.0; TRADING_DAYS]),
        ("BBB".to_string(), vec![1.0; TRADING_DAYS]),
        ("CCC".to_string(), vec![1.0; TRADING_DAYS]),
    ]);
    let flat_table = PriceTable::new(dates, flat).unwrap();
    let second = builder.build(&flat_table, &correlations, &cache).unwrap();
    assert_eq!(first, second);

    let _ = fs::remove_file(cache.path());
}

#[test]
fn test_parallel_build_agrees_with_sequential() {
    let (sectors, table) = sample_universe();
    let config = AnalysisConfig::default();
    let pairs = enumerate_pairs(&sectors);
    let engine = SerialCorrelationEngine::new(&table, pairs, config.window).unwrap();
    let correlations = engine.windowed_matrix(&table).unwrap();

    let cache_seq = temp_cache("agree-seq");
    let cache_par = temp_cache("agree-par");
    let sequential = CointegrationMatrixBuilder::new()
        .build(&table, &correlations, &cache_seq)
        .unwrap();
    let parallel = CointegrationMatrixBuilder::with_mode(ExecutionMode::Parallel)
        .build(&table, &correlations, &cache_par)
        .unwrap();
    assert_eq!(sequential, parallel);

    let _ = fs::remove_file(cache_seq.path());
    let _ = fs::remove_file(cache_par.path());
}

// ===========================================================================
// Stability invariants
// ===========================================================================

#[test]
fn test_stability_counts_are_internally_consistent() {
    let (sectors, table) = sample_universe();
    let config = AnalysisConfig::default();
    let pairs = enumerate_pairs(&sectors);
    let engine = SerialCorrelationEngine::new(&table, pairs, config.window).unwrap();
    let correlations = engine.windowed_matrix(&table).unwrap();
    let cache = temp_cache("invariants");
    let matrix = CointegrationMatrixBuilder::new()
        .build(&table, &correlations, &cache)
        .unwrap();
    let c = StabilityAggregator::from_config(&config)
        .aggregate(&matrix)
        .counters;

    for count in [
        c.correlation,
        c.by_test.granger,
        c.by_test.johansen,
        c.by_test.either,
        c.by_test.both,
    ] {
        assert!(count.serial <= count.total);
        assert!(count.total <= c.total_pairs);
    }
    assert!(c.by_test.granger.total <= c.by_test.either.total);
    assert!(c.by_test.johansen.total <= c.by_test.either.total);
    assert!(c.by_test.both.total <= c.by_test.granger.total);
    assert!(c.by_test.both.total <= c.by_test.johansen.total);

    let ladder_total = c.granger_confidence.pct90.total
        + c.granger_confidence.pct95.total
        + c.granger_confidence.pct99.total;
    assert_eq!(ladder_total, c.by_test.granger.total);

    let _ = fs::remove_file(cache.path());
}
