//! Pipeline stages and their wall-clock budget.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{Instrument, debug, info_span};

use super::error::PipelineError;
use crate::upload::StageTiming;

/// Ordered stages of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Filename, tax id and period checks.
    ValidateFilename,
    /// Stored object presence and content hash.
    VerifyFile,
    /// Sheet read, header detection, parse and ledger write.
    Parse,
    /// Catalog enrichment and movement checks.
    Enrich,
    /// Incidence detection.
    Detect,
    /// Incidence consolidation and write.
    Consolidate,
    /// Cache publication and final upload state.
    Publish,
}

impl Stage {
    /// Stages of a first ingestion, in order.
    pub const INGEST: [Self; 7] = [
        Self::ValidateFilename,
        Self::VerifyFile,
        Self::Parse,
        Self::Enrich,
        Self::Detect,
        Self::Consolidate,
        Self::Publish,
    ];

    /// Returns the stage name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ValidateFilename => "validate_filename",
            Self::VerifyFile => "verify_file",
            Self::Parse => "parse",
            Self::Enrich => "enrich",
            Self::Detect => "detect",
            Self::Consolidate => "consolidate",
            Self::Publish => "publish",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs stages under a per-stage timeout and records their durations.
#[derive(Debug)]
pub(crate) struct StageRunner {
    budget: Duration,
    started: Instant,
    timings: Vec<StageTiming>,
}

impl StageRunner {
    pub(crate) fn new(budget: Duration) -> Self {
        Self {
            budget,
            started: Instant::now(),
            timings: Vec::new(),
        }
    }

    /// Runs one stage. Exceeding the budget is a failure of that stage.
    pub(crate) async fn run<T, F>(&mut self, stage: Stage, work: F) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, PipelineError>>,
    {
        let span = info_span!("stage", stage = stage.as_str());
        let begin = Instant::now();
        let result = tokio::time::timeout(self.budget, work.instrument(span)).await;
        let millis = elapsed_millis(begin);
        self.timings.push(StageTiming {
            stage: stage.as_str().to_string(),
            millis,
        });

        match result {
            Ok(outcome) => {
                debug!(stage = stage.as_str(), millis, ok = outcome.is_ok(), "stage finished");
                outcome
            }
            Err(_) => Err(PipelineError::Timeout {
                stage,
                seconds: self.budget.as_secs(),
            }),
        }
    }

    pub(crate) fn timings(&self) -> Vec<StageTiming> {
        self.timings.clone()
    }

    pub(crate) fn elapsed_ms(&self) -> u64 {
        elapsed_millis(self.started)
    }
}

fn elapsed_millis(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_timings_in_order() {
        let mut runner = StageRunner::new(Duration::from_secs(5));
        let a = runner
            .run(Stage::ValidateFilename, async { Ok::<_, PipelineError>(1) })
            .await
            .unwrap();
        let b = runner
            .run(Stage::VerifyFile, async { Ok::<_, PipelineError>(2) })
            .await
            .unwrap();
        assert_eq!(a + b, 3);

        let names: Vec<String> = runner.timings().into_iter().map(|t| t.stage).collect();
        assert_eq!(names, vec!["validate_filename", "verify_file"]);
    }

    #[tokio::test]
    async fn test_timeout_is_a_stage_failure() {
        let mut runner = StageRunner::new(Duration::from_millis(20));
        let result = runner
            .run(Stage::Parse, async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, PipelineError>(())
            })
            .await;
        assert!(matches!(
            result,
            Err(PipelineError::Timeout { stage: Stage::Parse, .. })
        ));
        assert_eq!(runner.timings().len(), 1);
    }

    #[test]
    fn test_ingest_order() {
        assert_eq!(Stage::INGEST.first(), Some(&Stage::ValidateFilename));
        assert_eq!(Stage::INGEST.last(), Some(&Stage::Publish));
        assert!(Stage::INGEST.windows(2).all(|w| w[0] < w[1]));
    }
}
