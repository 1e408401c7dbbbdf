//! Property-based tests for experiment-audit
//!
//! - Row counts follow the fetched data exactly
//! - Row order follows experiment → run → metric → sample
//! - Run ProptestConfig::with_cases(100)

use chrono::DateTime;
use experiment_audit::aggregate::{Aggregator, UtilizationStats};
use experiment_audit::client::{MemoryTrackingClient, TrackingClient};
use experiment_audit::experiment::{Experiment, MetricSample, Run, RunStatus};
use experiment_audit::report::summary_table;
use proptest::prelude::*;

const CPU: &str = "system/cpu_utilization_percentage";
const GPU: &str = "system/gpu_0_utilization_percentage";

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

#[derive(Debug, Clone)]
struct RunShape {
    params: Vec<(String, String)>,
    accuracy: Option<f64>,
    cpu: Vec<f64>,
    gpu: Vec<f64>,
}

fn arb_run() -> impl Strategy<Value = RunShape> {
    (
        proptest::collection::vec(("[a-d]", "[0-9]{1,3}"), 0..4),
        proptest::option::of(0.0f64..1.0),
        proptest::collection::vec(0.0f64..100.0, 0..6),
        proptest::collection::vec(0.0f64..100.0, 0..4),
    )
        .prop_map(|(params, accuracy, cpu, gpu)| RunShape {
            params,
            accuracy,
            cpu,
            gpu,
        })
}

/// Experiments, each with its runs.
fn arb_audit() -> impl Strategy<Value = Vec<Vec<RunShape>>> {
    proptest::collection::vec(proptest::collection::vec(arb_run(), 0..5), 0..4)
}

fn sample(run_id: &str, metric: &str, step: usize, value: f64) -> MetricSample {
    let step = i64::try_from(step).unwrap();
    let ts = DateTime::from_timestamp_millis(1_700_000_000_000 + step).unwrap();
    MetricSample::new(run_id, metric, ts, step, value)
}

fn build_client(experiments: &[Vec<RunShape>]) -> MemoryTrackingClient {
    let mut client = MemoryTrackingClient::new();
    for (e, runs) in experiments.iter().enumerate() {
        let experiment_id = e.to_string();
        client.add_experiment(Experiment::new(&experiment_id, format!("exp-{e}")));

        for (r, shape) in runs.iter().enumerate() {
            let run_id = format!("{e}-{r}");
            let mut builder = Run::builder(&run_id, &experiment_id, RunStatus::Finished);
            for (key, value) in &shape.params {
                builder = builder.param(key, value);
            }
            if let Some(accuracy) = shape.accuracy {
                builder = builder.metric("accuracy", accuracy);
            }
            client.add_run(builder.build());

            for (step, value) in shape.cpu.iter().enumerate() {
                client.add_metric_sample(sample(&run_id, CPU, step, *value));
            }
            for (step, value) in shape.gpu.iter().enumerate() {
                client.add_metric_sample(sample(&run_id, GPU, step, *value));
            }
        }
    }
    client
}

fn metrics() -> Vec<String> {
    vec![CPU.to_string(), GPU.to_string()]
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: one summary row per run and one raw row per sample
    #[test]
    fn prop_row_counts_match_fetched_data(shapes in arb_audit()) {
        let client = build_client(&shapes);
        let experiments = client.list_experiments().unwrap();
        let tables = Aggregator::new(&client, metrics()).build_tables(&experiments).unwrap();

        let runs: usize = shapes.iter().map(Vec::len).sum();
        let samples: usize = shapes.iter().flatten().map(|s| s.cpu.len() + s.gpu.len()).sum();
        prop_assert_eq!(tables.summary.len(), runs);
        prop_assert_eq!(tables.raw_metrics.len(), samples);
        prop_assert_eq!(client.sample_count(), samples);
    }

    /// Property: rows follow experiment → run → metric → sample order
    #[test]
    fn prop_rows_preserve_fetch_order(shapes in arb_audit()) {
        let client = build_client(&shapes);
        let experiments = client.list_experiments().unwrap();
        let tables = Aggregator::new(&client, metrics()).build_tables(&experiments).unwrap();

        let mut expected_runs = Vec::new();
        let mut expected_samples = Vec::new();
        for (e, runs) in shapes.iter().enumerate() {
            for (r, shape) in runs.iter().enumerate() {
                let run_id = format!("{e}-{r}");
                for value in &shape.cpu {
                    expected_samples.push((run_id.clone(), CPU, *value));
                }
                for value in &shape.gpu {
                    expected_samples.push((run_id.clone(), GPU, *value));
                }
                expected_runs.push(run_id);
            }
        }

        let run_ids: Vec<String> = tables.summary.iter().map(|row| row.run_id.clone()).collect();
        prop_assert_eq!(run_ids, expected_runs);

        let samples: Vec<(String, &str, f64)> = tables
            .raw_metrics
            .iter()
            .map(|row| (row.run_id.clone(), row.metric.as_str(), row.value))
            .collect();
        prop_assert_eq!(samples, expected_samples);
    }

    /// Property: each empty history is skipped exactly once
    #[test]
    fn prop_skipped_metrics_counted(shapes in arb_audit()) {
        let client = build_client(&shapes);
        let experiments = client.list_experiments().unwrap();
        let tables = Aggregator::new(&client, metrics()).build_tables(&experiments).unwrap();

        let expected: usize = shapes
            .iter()
            .flatten()
            .map(|s| usize::from(s.cpu.is_empty()) + usize::from(s.gpu.is_empty()))
            .sum();
        prop_assert_eq!(tables.skipped_metrics, expected);
    }

    /// Property: fetching on a pool gives the sequential result
    #[test]
    fn prop_pool_matches_sequential(shapes in arb_audit(), workers in 2usize..6) {
        let client = build_client(&shapes);
        let experiments = client.list_experiments().unwrap();

        let sequential = Aggregator::new(&client, metrics()).build_tables(&experiments).unwrap();
        let pooled = Aggregator::new(&client, metrics())
            .with_fetch_workers(workers)
            .build_tables(&experiments)
            .unwrap();
        prop_assert_eq!(sequential, pooled);
    }

    /// Property: every summary row has exactly one cell per column, and headers are unique
    #[test]
    fn prop_summary_table_rectangular(shapes in arb_audit()) {
        let client = build_client(&shapes);
        let experiments = client.list_experiments().unwrap();
        let tables = Aggregator::new(&client, metrics()).build_tables(&experiments).unwrap();
        let table = summary_table(&tables.summary);

        let width = table.headers().len();
        prop_assert!(table.rows().iter().all(|row| row.len() == width));

        let mut headers = table.headers().to_vec();
        headers.sort();
        headers.dedup();
        prop_assert_eq!(headers.len(), width);
    }

    /// Property: mean lies within [min, peak] and peak is the maximum
    #[test]
    fn prop_utilization_stats_bounds(values in proptest::collection::vec(0.0f64..100.0, 1..50)) {
        let samples: Vec<MetricSample> = values
            .iter()
            .enumerate()
            .map(|(i, v)| sample("r", CPU, i, *v))
            .collect();
        let stats = UtilizationStats::from_samples(&samples).unwrap();

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        prop_assert_eq!(stats.samples, values.len());
        prop_assert!((stats.peak - max).abs() < f64::EPSILON);
        prop_assert!(stats.mean >= min - 1e-9 && stats.mean <= max + 1e-9);
    }
}
