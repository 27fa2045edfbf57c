//! End-to-end checks: simulate, fit, diagnose, analyze.

use std::sync::OnceLock;

use approx::assert_abs_diff_eq;
use chrono::{Duration, NaiveDate};

use bayes_cpd::analysis::{associate_with_events, batch_analyze, identify_changepoints};
use bayes_cpd::app::pipeline::{run_detect, run_detect_on};
use bayes_cpd::data::{SimulationSpec, generate_two_regime};
use bayes_cpd::diagnostics::Diagnostics;
use bayes_cpd::domain::{
    ConvergenceThresholds, Direction, EstimateMethod, Event, EventTable, MU_2, Magnitude, ModelConfig,
    PARAM_NAMES, RunConfig, SamplerConfig, Series, TAU,
};
use bayes_cpd::error::AppError;
use bayes_cpd::fit::PosteriorTrace;
use bayes_cpd::models::ChangePointModel;

fn sampler() -> SamplerConfig {
    SamplerConfig {
        samples: 1000,
        tune: 500,
        chains: 2,
        target_accept: 0.9,
        seed: Some(2024),
    }
}

/// 60 draws of N(0,1) then 60 of N(5,1), fitted once with L = 20.
fn fitted() -> &'static ChangePointModel {
    static MODEL: OnceLock<ChangePointModel> = OnceLock::new();
    MODEL.get_or_init(|| {
        let _ = env_logger::builder().is_test(true).try_init();
        let series = generate_two_regime(&SimulationSpec::default()).unwrap();
        let mut model = ChangePointModel::new(series);
        model
            .build(ModelConfig {
                prior_std_scale: 2.0,
                min_segment_length: 20,
            })
            .unwrap();
        model.fit(&sampler()).unwrap();
        model
    })
}

#[test]
fn recovers_two_regime_changepoint() {
    let model = fitted();
    let trace = model.trace().unwrap();
    let series = model.series();

    let analysis = batch_analyze(trace, series, None, 30).unwrap();
    let cp = &analysis.changepoints[0];
    assert!((45..=75).contains(&cp.index), "tau estimate {}", cp.index);
    assert!((55..=65).contains(&cp.index), "tau estimate {}", cp.index);
    assert!(cp.credible_interval.0 <= cp.credible_interval.1);
    assert!(cp.credible_interval.0 >= 20 && cp.credible_interval.1 <= 99);

    assert_eq!(analysis.impact.direction, Direction::Increase);
    assert!(matches!(analysis.impact.magnitude, Magnitude::Large | Magnitude::VeryLarge));
    assert_abs_diff_eq!(analysis.impact.mu_before, 0.0, epsilon = 0.5);
    assert_abs_diff_eq!(analysis.impact.mu_after, 5.0, epsilon = 0.5);
    assert!(analysis.associations.is_none());
}

#[test]
fn well_mixed_fit_passes_convergence() {
    let trace = fitted().trace().unwrap();
    let diagnostics = Diagnostics::new(trace);
    let thresholds = ConvergenceThresholds::default();

    let report = diagnostics.convergence_report(&PARAM_NAMES, &thresholds).unwrap();
    assert!(report.converged, "{:?}", report.issues);
    assert!(diagnostics.check_convergence(&PARAM_NAMES, &thresholds).unwrap());
    assert_eq!(diagnostics.summary(&PARAM_NAMES, 0.94).unwrap().len(), 5);
}

#[test]
fn every_estimate_method_lands_in_the_interval() {
    let model = fitted();
    let trace = model.trace().unwrap();
    for method in [EstimateMethod::Mean, EstimateMethod::Median, EstimateMethod::Mode] {
        let cp = &identify_changepoints(trace, model.series(), 0.94, method).unwrap()[0];
        assert!((20..=99).contains(&cp.index));
        assert_eq!(cp.estimate_method, method);
        let estimate = model.changepoint_estimate(method).unwrap();
        assert_eq!(estimate.index, cp.index);
        assert_eq!(estimate.date, cp.date);
    }
}

#[test]
fn statement_names_the_date_and_labels() {
    let model = fitted();
    let analysis = batch_analyze(model.trace().unwrap(), model.series(), None, 30).unwrap();
    let cp = &analysis.changepoints[0];
    let date = cp.date.unwrap().format("%Y-%m-%d").to_string();
    assert!(analysis.statement.contains(&date));
    assert!(analysis.statement.contains("INCREASE"));
    assert!(analysis.statement.contains(&analysis.impact.magnitude.as_str().to_uppercase()));
}

#[test]
fn disjoint_chains_fail_convergence_and_name_the_variable() {
    let mixed: Vec<f64> = (0..200).map(|i| ((i * 37) % 17) as f64).collect();
    let low: Vec<f64> = (0..200).map(|i| ((i * 13) % 7) as f64 * 0.1).collect();
    let high: Vec<f64> = low.iter().map(|x| x + 10.0).collect();
    let trace = PosteriorTrace::from_chains(vec![
        (TAU, vec![mixed.clone(), mixed.iter().rev().copied().collect()]),
        (MU_2, vec![low, high]),
    ])
    .unwrap();

    let diagnostics = Diagnostics::new(&trace);
    let report = diagnostics
        .convergence_report(&[], &ConvergenceThresholds::default())
        .unwrap();
    assert!(!report.converged);
    assert!(report.issues.iter().any(|i| i.var == MU_2));
    assert!(!diagnostics.check_convergence(&[MU_2], &ConvergenceThresholds::default()).unwrap());
}

fn dated_changepoint() -> (NaiveDate, Vec<bayes_cpd::domain::ChangePointRecord>) {
    let model = fitted();
    let cps = identify_changepoints(model.trace().unwrap(), model.series(), 0.94, EstimateMethod::Mean).unwrap();
    (cps[0].date.unwrap(), cps)
}

fn event(date: NaiveDate, name: &str) -> Event {
    Event {
        date,
        name: name.to_string(),
        event_type: "policy".to_string(),
        description: None,
        expected_impact: None,
    }
}

#[test]
fn events_inside_the_window_are_associated_closest_first() {
    let (date, cps) = dated_changepoint();
    let table = EventTable::from_events(&[
        event(date - Duration::days(5), "minus five"),
        event(date + Duration::days(3), "plus three"),
        event(date + Duration::days(40), "plus forty"),
    ]);

    let assoc = &associate_with_events(&cps, &table, 30, "date").unwrap()[0];
    assert_eq!(assoc.num_events_in_window, 2);
    assert_eq!(assoc.days_from_closest, Some(3));
    assert_eq!(assoc.closest_event.as_ref().unwrap().event.name, "plus three");
    assert_eq!(assoc.associated_events[1].days_from_changepoint, -5);
}

#[test]
fn wider_windows_never_lose_events() {
    let (date, cps) = dated_changepoint();
    let events: Vec<Event> = [-45, -20, -7, 0, 2, 15, 31, 90]
        .iter()
        .map(|d| event(date + Duration::days(*d), &format!("e{d}")))
        .collect();
    let table = EventTable::from_events(&events);

    let mut previous = 0;
    for window in [0, 1, 7, 15, 30, 45, 90, 365] {
        let count = associate_with_events(&cps, &table, window, "date").unwrap()[0].num_events_in_window;
        assert!(count >= previous, "window {window}: {count} < {previous}");
        previous = count;
    }
    assert_eq!(previous, events.len());
}

#[test]
fn too_short_series_for_the_segment_length_is_rejected() {
    for n in 2..40usize {
        let values: Vec<f64> = (0..n).map(|i| (i % 5) as f64).collect();
        let series = Series::new(values).unwrap();
        for l in 1..=n {
            if 2 * l < n {
                continue;
            }
            let mut model = ChangePointModel::new(series.clone());
            let err = model
                .build(ModelConfig {
                    prior_std_scale: 2.0,
                    min_segment_length: l,
                })
                .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "n={n} l={l}: {err}");
            assert!(!model.is_built());
        }
    }
}

#[test]
fn detect_pipeline_runs_from_csv_and_honors_strict() {
    let dir = std::env::temp_dir().join(format!("bayes-cpd-it-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let input = dir.join("prices.csv");
    let series = generate_two_regime(&SimulationSpec::default()).unwrap().named("Price");
    bayes_cpd::io::write_series_csv(&input, &series).unwrap();

    let mut config = RunConfig {
        input: input.clone(),
        value_column: "Price".to_string(),
        date_column: "Date".to_string(),
        log_returns: false,
        events: None,
        model: ModelConfig {
            prior_std_scale: 2.0,
            min_segment_length: 20,
        },
        sampler: SamplerConfig {
            samples: 300,
            tune: 300,
            ..sampler()
        },
        thresholds: ConvergenceThresholds {
            rhat: 1.2,
            ess_bulk: 20.0,
            ess_tail: 20.0,
        },
        analysis: Default::default(),
        strict: false,
        export: None,
        export_trace: None,
    };

    let run = run_detect(&config).unwrap();
    assert_eq!(run.series().len(), 120);
    assert_eq!(run.parameters.len(), 5);
    let result = run.result_file(&config);
    assert_eq!(result.series.count, 120);
    assert!(result.tool.starts_with("cpd "));

    // Impossible thresholds turn the gate into a numerical failure under --strict.
    config.strict = true;
    config.thresholds.ess_bulk = 1e9;
    let err = run_detect_on(series, None, &config).unwrap_err();
    assert!(matches!(err, AppError::Numerical(_)));
    assert_eq!(err.exit_code(), 4);

    std::fs::remove_dir_all(&dir).ok();
}
