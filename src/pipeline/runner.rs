//! Pipeline orchestration.
//!
//! One `run_one` call takes a search configuration through scrape, extract
//! and analyze, producing an `ExecutionRun` with full failure accounting.
//! `run_all` drives several configurations concurrently over one shared
//! rate limiter, so the remote source sees a single request cadence no
//! matter how many runs are in flight. Cancellation stops new work from
//! being dispatched; records already in flight finish and are counted.

use std::sync::Arc;

use chrono::Local;
use futures::{stream, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::AppError;
use crate::models::{
    AnalysisStatus, AnalyzedCase, Config, ExecutionRun, SearchConfiguration,
};
use crate::pipeline::filter::DateFilter;
use crate::services::{
    AnalysisStage, CaseScraper, DocumentExtractor, SessionClient, TextGenerator,
};
use crate::utils::{BackoffPolicy, RateLimiter};

/// Everything one run produced: the accounting record plus the cases.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub run: ExecutionRun,
    pub cases: Vec<AnalyzedCase>,
}

impl RunReport {
    fn aborted(mut run: ExecutionRun, error: &AppError) -> Self {
        log::error!("[{}] run aborted: {error}", run.config_id);
        run.abort();
        Self {
            run,
            cases: Vec::new(),
        }
    }
}

/// Drives execution runs for a set of search configurations.
pub struct PipelineRunner {
    config: Config,
    limiter: Arc<RateLimiter>,
    generator: Arc<dyn TextGenerator>,
    cancel: CancellationToken,
}

impl PipelineRunner {
    pub fn new(
        config: Config,
        generator: Arc<dyn TextGenerator>,
        cancel: CancellationToken,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.http.min_interval()));
        Self {
            config,
            limiter,
            generator,
            cancel,
        }
    }

    /// Run every configuration, at most `max_concurrent_runs` at a time.
    /// Reports come back in input order regardless of completion order.
    pub async fn run_all(&self, searches: &[SearchConfiguration]) -> Vec<RunReport> {
        stream::iter(searches)
            .map(|search| self.run_one(search))
            .buffered(self.config.pipeline.max_concurrent_runs.max(1))
            .collect()
            .await
    }

    /// Execute one run. Per-configuration failures (bad configuration, the
    /// search form itself failing) abort only this run; per-record failures
    /// are absorbed into the run's counts.
    pub async fn run_one(&self, search: &SearchConfiguration) -> RunReport {
        let mut run = ExecutionRun::start(&search.id);
        log::info!("[{}] starting run ({})", search.id, search.name);

        if let Err(error) = search.validate() {
            return RunReport::aborted(run, &error);
        }
        if self.cancel.is_cancelled() {
            log::warn!("[{}] shutdown requested, run not started", search.id);
            run.abort();
            return RunReport {
                run,
                cases: Vec::new(),
            };
        }

        let base_url = match Url::parse(&self.config.http.base_url) {
            Ok(url) => url,
            Err(error) => return RunReport::aborted(run, &error.into()),
        };

        // Fresh session per run: cookies never leak across runs.
        let session = match SessionClient::new(
            &self.config.http,
            &self.config.retry,
            self.limiter.clone(),
        ) {
            Ok(session) => Arc::new(session),
            Err(error) => return RunReport::aborted(run, &error),
        };

        let window = search.window.resolve(Local::now().date_naive());
        let filter = DateFilter::new(window, self.config.scraper.date_filter_mode);
        let scraper = CaseScraper::new(
            session.clone(),
            base_url.clone(),
            self.config.scraper.clone(),
            filter,
            self.cancel.clone(),
        );

        let outcome = match scraper.search(search).await {
            Ok(outcome) => outcome,
            Err(error) => return RunReport::aborted(run, &error),
        };
        run.record_fetch(outcome.fetched, outcome.filtered_out, outcome.lost_pages);
        log::info!(
            "[{}] scraped {} pages: {} records, {} filtered out, {} pages lost",
            search.id,
            outcome.pages_fetched,
            outcome.fetched,
            outcome.filtered_out,
            outcome.lost_pages
        );

        let extractor = Arc::new(DocumentExtractor::new(session, base_url));
        let stage = Arc::new(AnalysisStage::new(
            self.generator.clone(),
            BackoffPolicy::from(&self.config.analysis),
        ));

        let mut results = stream::iter(outcome.records.into_iter().map(|record| {
            let extractor = extractor.clone();
            let stage = stage.clone();
            let cancel = self.cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    log::warn!("skipping {}: shutdown requested", record.source_id);
                    return None;
                }
                match extractor.extract(&record).await {
                    Ok(text) => Some(Ok(stage.analyze(text).await)),
                    Err(error) => {
                        log::warn!("extraction failed for {}: {error}", record.source_id);
                        Some(Err(error))
                    }
                }
            }
        }))
        .buffer_unordered(self.config.pipeline.max_concurrent_records.max(1));

        let mut cases = Vec::new();
        while let Some(result) = results.next().await {
            match result {
                Some(Ok(analyzed)) => {
                    run.record_extracted();
                    match analyzed.status {
                        AnalysisStatus::Ok => run.record_analyzed(),
                        AnalysisStatus::AnalysisFailed => run.record_analysis_failed(),
                    }
                    cases.push(analyzed);
                }
                // Extraction failures surface as the gap between fetched and
                // extracted; shutdown skips are counted explicitly.
                Some(Err(_)) => {}
                None => run.record_skipped(),
            }
        }

        let status = run.close();
        log::info!(
            "[{}] run finished: {:?}, {} analyzed, {} analysis failures, {} extraction failures, {} skipped",
            search.id,
            status,
            run.counts.analyzed,
            run.counts.failed,
            run.extraction_failures(),
            run.counts.skipped
        );
        RunReport { run, cases }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DateWindowSpec, RunStatus};

    fn search_config(id: &str) -> SearchConfiguration {
        SearchConfiguration {
            id: id.into(),
            name: "test".into(),
            criteria: Default::default(),
            window: DateWindowSpec::Range {
                from: None,
                to: None,
            },
        }
    }

    struct NoopGenerator;

    #[async_trait::async_trait]
    impl TextGenerator for NoopGenerator {
        async fn generate(&self, _system: &str, _prompt: &str) -> crate::error::Result<String> {
            Ok("summary".into())
        }
    }

    fn runner(config: Config) -> PipelineRunner {
        PipelineRunner::new(config, Arc::new(NoopGenerator), CancellationToken::new())
    }

    #[tokio::test]
    async fn invalid_configuration_aborts_without_touching_the_network() {
        let mut config = Config::default();
        // Unroutable host: any network attempt would error, not hang.
        config.http.base_url = "http://127.0.0.1:1".into();
        config.retry.max_attempts = 1;

        let report = runner(config).run_one(&search_config("  ")).await;
        assert_eq!(report.run.status, RunStatus::Failed);
        assert!(report.cases.is_empty());
        assert!(report.run.finished_at.is_some());
    }

    #[tokio::test]
    async fn unreachable_source_aborts_the_run() {
        let mut config = Config::default();
        config.http.base_url = "http://127.0.0.1:1".into();
        config.http.min_request_interval_ms = 0;
        config.retry.max_attempts = 1;
        config.retry.base_delay_ms = 1;

        let report = runner(config).run_one(&search_config("cfg-1")).await;
        assert_eq!(report.run.status, RunStatus::Failed);
        assert_eq!(report.run.counts.fetched, 0);
    }
}
