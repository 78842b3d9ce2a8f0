use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc;

use crate::analytics::{AnalyticsClient, AnalyticsResult, QueryError};
use crate::metrics::{
    translate::{liveness, translate},
    Descriptors, Family, MetricSample,
};

/// Collects the analytics of all the families on every scrape
#[derive(Clone)]
pub struct Exporter {
    /// Client shared by all the family tasks
    client: Arc<dyn AnalyticsClient>,
    /// Descriptors of the exported metrics
    descriptors: Arc<Descriptors>,
    /// Maximum duration of a single family fetch
    deadline: Duration,
}

impl Exporter {
    /// Create a new [`Exporter`]
    pub fn new(
        client: Arc<dyn AnalyticsClient>,
        descriptors: Arc<Descriptors>,
        deadline: Duration,
    ) -> Self {
        Self {
            client,
            descriptors,
            deadline,
        }
    }

    pub fn descriptors(&self) -> &Descriptors {
        &self.descriptors
    }

    /// Fetch and translate all the families concurrently
    ///
    /// Never fails: a family that could not be collected only reports its
    /// liveness gauge with a value of 0.
    pub async fn collect(&self) -> Vec<MetricSample> {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let tasks = Family::ALL.map(|family| {
            let task = FamilyTask {
                client: self.client.clone(),
                descriptors: self.descriptors.clone(),
                deadline: self.deadline,
                family,
            };
            (family, tokio::spawn(task.run(tx.clone())))
        });

        for (family, task) in tasks {
            if let Err(err) = task.await {
                log::error!("Collection of {family} analytics aborted: {err}");
                // The task may have died before reporting its liveness
                let _ = tx.send(liveness(family, false, &self.descriptors));
            }
        }
        drop(tx);

        let mut samples = Vec::new();
        while let Some(sample) = rx.recv().await {
            samples.push(sample);
        }

        log::debug!("Collected {} samples", samples.len());

        samples
    }
}

/// Collection of a single family within one scrape
struct FamilyTask {
    client: Arc<dyn AnalyticsClient>,
    descriptors: Arc<Descriptors>,
    deadline: Duration,
    family: Family,
}

impl FamilyTask {
    async fn run(self, sink: mpsc::UnboundedSender<MetricSample>) {
        let family = self.family;

        let samples = match self.fetch().await {
            Ok(result) => {
                let mut samples = vec![liveness(family, true, &self.descriptors)];
                samples.extend(translate(&result, family, &self.descriptors));
                samples
            }
            Err(err) => {
                log::error!("Could not collect {family} analytics: {err}");
                vec![liveness(family, false, &self.descriptors)]
            }
        };

        log::trace!("Collected {} {family} samples", samples.len());

        for sample in samples {
            // The receiver outlives every task
            let _ = sink.send(sample);
        }
    }

    async fn fetch(&self) -> Result<AnalyticsResult, QueryError> {
        let window = self.family.window(chrono::Utc::now());
        let query = self.family.query();

        let result = tokio::time::timeout(self.deadline, self.client.execute(query, &window))
            .await
            .map_err(|_| QueryError::Timeout(self.deadline))??;

        // An empty account list cannot be told apart from an unavailable upstream
        if result.accounts.is_empty() {
            return Err(QueryError::EmptyResult);
        }

        Ok(result)
    }
}
