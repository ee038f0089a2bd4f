//! End-to-end pipeline tests against synthetic providers.

mod common;

use common::{fast_config, SyntheticProvider, UnavailableProvider};
use farsight_core::data::PriceCache;
use farsight_core::domain::Horizon;
use farsight_runner::{run_forecast, PipelineContext, PipelineError, SilentObserver};

#[test]
fn long_horizon_gets_scenario_band_and_short_does_not() {
    let dir = tempfile::tempdir().unwrap();
    let cache = PriceCache::new(dir.path());
    let provider = SyntheticProvider { bars: 420 };
    let config = fast_config(dir.path().to_path_buf());
    let ctx = PipelineContext {
        provider: &provider,
        cache: &cache,
    };

    let horizons = vec![Horizon::OneMonth, Horizon::FiveYears];
    let outcome = run_forecast("t1", "SPY", &horizons, &ctx, &config, &SilentObserver).unwrap();

    assert_eq!(outcome.results.len(), 2);

    let short = &outcome.results[0];
    let long = &outcome.results[1];
    assert_eq!(short.horizon, Horizon::OneMonth);
    assert_eq!(long.horizon, Horizon::FiveYears);

    assert!(short.monte_carlo.is_none());
    let band = long.monte_carlo.as_ref().expect("5yr band missing");
    assert!(band.is_ordered());

    // Scenario band may only widen the interval
    assert!(long.lower_bound <= band.p10);
    assert!(long.upper_bound >= band.p90);

    for fc in &outcome.results {
        assert!(fc.is_well_formed(), "malformed forecast at {}", fc.horizon);
    }
}

#[test]
fn confidence_is_non_increasing_across_all_horizons() {
    let dir = tempfile::tempdir().unwrap();
    let cache = PriceCache::new(dir.path());
    let provider = SyntheticProvider { bars: 420 };
    let config = fast_config(dir.path().to_path_buf());
    let ctx = PipelineContext {
        provider: &provider,
        cache: &cache,
    };

    let horizons: Vec<Horizon> = Horizon::ALL.to_vec();
    let outcome = run_forecast("t2", "QQQ", &horizons, &ctx, &config, &SilentObserver).unwrap();

    assert_eq!(outcome.results.len(), Horizon::ALL.len());
    let mut prev_confidence = f64::INFINITY;
    let mut prev_width = 0.0_f64;
    for fc in &outcome.results {
        assert!(fc.confidence <= prev_confidence + 1e-12);
        let width = fc.upper_bound - fc.lower_bound;
        assert!(width + 1e-9 >= prev_width);
        prev_confidence = fc.confidence;
        prev_width = width;
    }
}

#[test]
fn thirty_day_history_fails_with_insufficient_history() {
    let dir = tempfile::tempdir().unwrap();
    let cache = PriceCache::new(dir.path());
    let provider = SyntheticProvider { bars: 30 };
    let config = fast_config(dir.path().to_path_buf());
    let ctx = PipelineContext {
        provider: &provider,
        cache: &cache,
    };

    let err = run_forecast(
        "t3",
        "NEWIPO",
        &[Horizon::OneMonth],
        &ctx,
        &config,
        &SilentObserver,
    )
    .unwrap_err();
    assert!(matches!(err, PipelineError::InsufficientHistory { .. }));
}

#[test]
fn provider_outage_surfaces_as_data_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let cache = PriceCache::new(dir.path());
    let config = fast_config(dir.path().to_path_buf());
    let ctx = PipelineContext {
        provider: &UnavailableProvider,
        cache: &cache,
    };

    let err = run_forecast(
        "t4",
        "SPY",
        &[Horizon::OneYear],
        &ctx,
        &config,
        &SilentObserver,
    )
    .unwrap_err();
    assert!(matches!(err, PipelineError::DataUnavailable(_)));
    assert_eq!(err.kind(), "data_unavailable");
}

#[test]
fn forecast_timeseries_covers_future_dates_within_cap() {
    let dir = tempfile::tempdir().unwrap();
    let cache = PriceCache::new(dir.path());
    let provider = SyntheticProvider { bars: 420 };
    let config = fast_config(dir.path().to_path_buf());
    let ctx = PipelineContext {
        provider: &provider,
        cache: &cache,
    };

    let outcome = run_forecast(
        "t5",
        "SPY",
        &[Horizon::FiveYears],
        &ctx,
        &config,
        &SilentObserver,
    )
    .unwrap();

    assert!(!outcome.forecast_timeseries.is_empty());
    assert!(outcome.forecast_timeseries.len() <= farsight_runner::FORECAST_TIMESERIES_CAP);

    let today = chrono::Local::now().date_naive();
    for pair in outcome.forecast_timeseries.windows(2) {
        assert!(pair[0].date < pair[1].date);
    }
    assert!(outcome.forecast_timeseries[0].date > today - chrono::Duration::days(7));
    for point in &outcome.forecast_timeseries {
        assert!(point.lower <= point.value && point.value <= point.upper);
    }
}

#[test]
fn identical_seed_and_data_reproduce_the_forecast() {
    let dir = tempfile::tempdir().unwrap();
    let cache = PriceCache::new(dir.path());
    let provider = SyntheticProvider { bars: 420 };
    let config = fast_config(dir.path().to_path_buf());
    let ctx = PipelineContext {
        provider: &provider,
        cache: &cache,
    };

    let horizons = vec![Horizon::OneMonth, Horizon::ThreeYears];
    let a = run_forecast("same-key", "SPY", &horizons, &ctx, &config, &SilentObserver).unwrap();
    let b = run_forecast("same-key", "SPY", &horizons, &ctx, &config, &SilentObserver).unwrap();

    for (fa, fb) in a.results.iter().zip(&b.results) {
        assert_eq!(fa.predicted_price, fb.predicted_price);
        assert_eq!(fa.lower_bound, fb.lower_bound);
        assert_eq!(fa.upper_bound, fb.upper_bound);
        match (&fa.monte_carlo, &fb.monte_carlo) {
            (Some(ba), Some(bb)) => assert_eq!(ba.p50, bb.p50),
            (None, None) => {}
            _ => panic!("scenario band presence differs between runs"),
        }
    }
}
