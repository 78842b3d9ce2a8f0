use crate::analytics::{AnalyticsResult, WorkloadRecord};

use super::{Descriptors, Family, MetricSample};

/// Percentile label values, in emission order
pub const PERCENTILES: [&str; 6] = ["25", "50", "75", "90", "99", "999"];

/// Convert the workloads of `result` into samples of `family`
///
/// The liveness gauge is not part of the output, see [`liveness`].
pub fn translate(
    result: &AnalyticsResult,
    family: Family,
    descriptors: &Descriptors,
) -> Vec<MetricSample> {
    let workloads = result.workloads();

    match family {
        Family::Requests => workloads
            .iter()
            .flat_map(|workload| request_samples(workload, descriptors))
            .collect(),
        Family::CpuTime => workloads
            .iter()
            .flat_map(|workload| cpu_time_samples(workload, descriptors))
            .collect(),
    }
}

/// Liveness gauge of `family`
pub fn liveness(family: Family, up: bool, descriptors: &Descriptors) -> MetricSample {
    let value = if up { 1.0 } else { 0.0 };
    MetricSample::new(descriptors.liveness(family), Vec::new(), value)
}

fn request_samples(workload: &WorkloadRecord, descriptors: &Descriptors) -> [MetricSample; 3] {
    let labels = vec![
        workload.dimensions.script_name.clone(),
        workload.dimensions.status.clone(),
    ];
    let sum = &workload.sum;

    [
        MetricSample::new(
            &descriptors.requests_received,
            labels.clone(),
            sum.requests as f64,
        ),
        MetricSample::new(&descriptors.errors, labels.clone(), sum.errors as f64),
        MetricSample::new(&descriptors.subrequests, labels, sum.subrequests as f64),
    ]
}

fn cpu_time_samples(workload: &WorkloadRecord, descriptors: &Descriptors) -> [MetricSample; 6] {
    let quantiles = &workload.quantiles;
    let values = [
        quantiles.cpu_time_p25,
        quantiles.cpu_time_p50,
        quantiles.cpu_time_p75,
        quantiles.cpu_time_p90,
        quantiles.cpu_time_p99,
        quantiles.cpu_time_p999,
    ];

    std::array::from_fn(|i| {
        MetricSample::new(
            &descriptors.cpu_time_percentile,
            vec![
                workload.dimensions.script_name.clone(),
                workload.dimensions.status.clone(),
                PERCENTILES[i].to_owned(),
            ],
            values[i],
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{AccountUsage, CpuTimeQuantiles, Dimensions, InvocationSums};
    use crate::metrics::MetricKind;

    fn record(name: &str, status: &str, requests: u64, p50: f64) -> WorkloadRecord {
        WorkloadRecord {
            dimensions: Dimensions {
                script_name: name.to_owned(),
                status: status.to_owned(),
            },
            sum: InvocationSums {
                requests,
                errors: requests / 10,
                subrequests: requests * 2,
            },
            quantiles: CpuTimeQuantiles {
                cpu_time_p25: p50 / 2.0,
                cpu_time_p50: p50,
                cpu_time_p75: p50 * 1.5,
                cpu_time_p90: p50 * 2.0,
                cpu_time_p99: p50 * 4.0,
                cpu_time_p999: p50 * 8.0,
            },
        }
    }

    fn result(workloads: Vec<WorkloadRecord>) -> AnalyticsResult {
        AnalyticsResult {
            accounts: vec![AccountUsage { workloads }],
        }
    }

    fn sample_result() -> AnalyticsResult {
        result(vec![
            record("api", "success", 100, 2.0),
            record("api", "scriptThrewException", 10, 3.0),
            record("cron", "success", 7, 0.5),
        ])
    }

    #[test]
    fn requests_three_counters_per_workload() {
        let descriptors = Descriptors::default();
        let input = sample_result();
        let samples = translate(&input, Family::Requests, &descriptors);

        assert_eq!(samples.len(), 3 * input.workloads().len());
        assert!(samples.iter().all(|s| s.kind() == MetricKind::Counter));

        for (chunk, workload) in samples.chunks(3).zip(input.workloads()) {
            let names = chunk.iter().map(MetricSample::name).collect::<Vec<_>>();
            assert_eq!(
                names,
                [
                    "cloudflare_worker_requests_received_total",
                    "cloudflare_worker_errors_total",
                    "cloudflare_worker_subrequests_total",
                ]
            );
            for sample in chunk {
                assert_eq!(
                    sample.label("worker"),
                    Some(workload.dimensions.script_name.as_str())
                );
                assert_eq!(
                    sample.label("status"),
                    Some(workload.dimensions.status.as_str())
                );
            }
            assert_eq!(chunk[0].value, workload.sum.requests as f64);
            assert_eq!(chunk[1].value, workload.sum.errors as f64);
            assert_eq!(chunk[2].value, workload.sum.subrequests as f64);
        }
    }

    #[test]
    fn cpu_time_six_gauges_per_workload() {
        let descriptors = Descriptors::default();
        let input = sample_result();
        let samples = translate(&input, Family::CpuTime, &descriptors);

        assert_eq!(samples.len(), 6 * input.workloads().len());
        assert!(samples.iter().all(|s| s.kind() == MetricKind::Gauge));
        assert!(samples
            .iter()
            .all(|s| s.name() == "cloudflare_worker_cpu_time_percentile"));

        for (chunk, workload) in samples.chunks(6).zip(input.workloads()) {
            let percentiles = chunk
                .iter()
                .map(|s| s.label("percentile").unwrap())
                .collect::<Vec<_>>();
            assert_eq!(percentiles, PERCENTILES);
            assert!(chunk
                .iter()
                .all(|s| s.label("worker") == Some(workload.dimensions.script_name.as_str())));
            assert_eq!(chunk[1].value, workload.quantiles.cpu_time_p50);
            assert_eq!(chunk[5].value, workload.quantiles.cpu_time_p999);
        }
    }

    #[test]
    fn empty_results() {
        let descriptors = Descriptors::default();
        for family in Family::ALL {
            assert!(translate(&AnalyticsResult::default(), family, &descriptors).is_empty());
            assert!(translate(&result(Vec::new()), family, &descriptors).is_empty());
        }
    }

    #[test]
    fn deterministic() {
        let descriptors = Descriptors::default();
        let input = sample_result();
        for family in Family::ALL {
            assert_eq!(
                translate(&input, family, &descriptors),
                translate(&input, family, &descriptors)
            );
        }
    }

    #[test]
    fn liveness_gauge() {
        let descriptors = Descriptors::default();

        let up = liveness(Family::Requests, true, &descriptors);
        assert_eq!(up.name(), "cloudflare_worker_requests_up");
        assert_eq!(up.kind(), MetricKind::Gauge);
        assert!(up.label_values.is_empty());
        assert_eq!(up.value, 1.0);

        let down = liveness(Family::CpuTime, false, &descriptors);
        assert_eq!(down.name(), "cloudflare_worker_cpu_time_up");
        assert_eq!(down.value, 0.0);
    }
}
