use std::collections::HashMap;

use prometheus::{CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};

use super::{Descriptors, MetricKind, MetricSample};

/// Content type of the Prometheus text exposition format
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

enum Collector {
    Gauge(GaugeVec),
    Counter(CounterVec),
}

/// Render `samples` in the Prometheus text exposition format
///
/// A fresh registry is built for every call so nothing leaks between scrapes.
/// Metrics without any sample are left out of the output.
pub fn encode(
    descriptors: &Descriptors,
    samples: &[MetricSample],
) -> Result<String, prometheus::Error> {
    let registry = Registry::new();
    let mut collectors = HashMap::with_capacity(descriptors.all().len());

    for desc in descriptors.all() {
        let opts = Opts::new(desc.name.as_str(), desc.help.as_str());
        let collector = match desc.kind {
            MetricKind::Gauge => {
                let gauge = GaugeVec::new(opts, desc.label_names)?;
                registry.register(Box::new(gauge.clone()))?;
                Collector::Gauge(gauge)
            }
            MetricKind::Counter => {
                let counter = CounterVec::new(opts, desc.label_names)?;
                registry.register(Box::new(counter.clone()))?;
                Collector::Counter(counter)
            }
        };
        collectors.insert(desc.name.as_str(), collector);
    }

    for sample in samples {
        let Some(collector) = collectors.get(sample.name()) else {
            log::warn!("Dropping sample of unknown metric {}", sample.name());
            continue;
        };
        let label_values = sample
            .label_values
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>();

        match collector {
            Collector::Gauge(gauge) => gauge
                .get_metric_with_label_values(&label_values)?
                .set(sample.value),
            // Counters are fresh for every scrape, so incrementing sets the value
            Collector::Counter(counter) => counter
                .get_metric_with_label_values(&label_values)?
                .inc_by(sample.value),
        }
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;

    String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
}
