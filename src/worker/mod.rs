//! Crawl loop orchestration
//!
//! This module contains the main loop that drives one worker process:
//! - Leasing request batches sized to the current concurrency
//! - Per-item budget, depth, and robots gates
//! - Fetching, extraction, link discovery, and dataset output
//! - Ack/fail reporting with failure classification
//! - Run lifecycle events and adaptive concurrency

use std::env;
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::RunConfig;
use crate::discover::discover_links;
use crate::engine::EngineResolution;
use crate::extract::{extract_content, ExtractedContent, ExtractionOptions};
use crate::failure::{classify_failure, FailureKind};
use crate::fetch::{FetchedPage, PageFetcher};
use crate::link::{compile_globs, UrlGlob};
use crate::policy::{evaluate_stop, BudgetSnapshot, StopBudgets, StopReason};
use crate::proxy::ProxySettings;
use crate::queue::{
    AckOutcome, ConcurrencySpec, EnqueueItem, FailOutcome, LeaseItem, QueueService, RunEvent,
    EVENT_ENGINE_FALLBACK, EVENT_PROXY_APPLIED, EVENT_REQUEST_FAILED, EVENT_REQUEST_SUCCEEDED,
    EVENT_RUNTIME_FINISHED, EVENT_RUNTIME_STARTED, LEVEL_ERROR, LEVEL_WARNING, STAGE_PROXY,
    STAGE_REQUEST, STAGE_RUNTIME,
};
use crate::robots::RobotsGate;
use crate::scope::ScopeMatcher;
use crate::{FetchError, QueueError};

/// How long a leased item stays reserved for this worker
const LEASE_SECONDS: u64 = 60;

/// Pause between lease attempts when the queue comes back empty
const IDLE_SLEEP: Duration = Duration::from_millis(500);

/// Lease batch size with adaptive adjustment between batches
#[derive(Debug)]
struct Concurrency {
    min: u32,
    max: u32,
    current: u32,
    adaptive: bool,
}

impl Concurrency {
    fn new(concurrency: &ConcurrencySpec) -> Self {
        let (min, max) = concurrency.bounds();
        Self {
            min,
            max,
            current: min,
            adaptive: concurrency.adaptive(),
        }
    }

    /// One step up after a success, capped at the maximum.
    fn raise(&mut self) {
        if self.adaptive {
            self.current = self.max.min(self.current + 1);
        }
    }

    /// One step down after a failure, floored at the minimum.
    fn lower(&mut self) {
        if self.adaptive {
            self.current = self.min.max(self.current.saturating_sub(1));
        }
    }
}

/// Terminal state of one leased item's fetch-extract-report pipeline
enum ItemOutcome {
    Completed(ItemReport),
    Failed(ItemFailure),
}

/// What the success path needs after the item was acked
struct ItemReport {
    status: u16,
}

/// Caught per-item error, reported to the queue as a classified failure
struct ItemFailure {
    message: String,
    status: Option<u16>,
    latency_ms: u64,
}

/// One worker process bound to one run
///
/// Owns every per-run collaborator: the queue client, the scope matcher,
/// the robots gate with its per-origin cache, the page fetcher, and the
/// crawl counters the stop policy reads.
pub struct CrawlWorker {
    queue: Box<dyn QueueService>,
    config: RunConfig,
    resolution: EngineResolution,
    scope: ScopeMatcher,
    robots: RobotsGate,
    fetcher: PageFetcher,
    proxy: ProxySettings,
    options: ExtractionOptions,
    include_globs: Vec<UrlGlob>,
    exclude_globs: Vec<UrlGlob>,
    budgets: StopBudgets,
    concurrency: Concurrency,
    worker_id: String,
    started_at: Instant,
    processed_pages: u64,
    emitted_results: u64,
    idle_cycles: u32,
}

impl CrawlWorker {
    /// Creates a worker for one run
    ///
    /// # Arguments
    ///
    /// * `queue` - Queue collaborator the loop reports through
    /// * `config` - Validated run configuration
    /// * `resolution` - Engine resolution from startup
    /// * `concurrency` - Concurrency block of the bootstrap payload
    /// * `proxy` - Resolved proxy settings, used for the startup event
    /// * `fetcher` - Page fetcher wired for the run
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlWorker)` - Ready to run
    /// * `Err(WorkerError)` - Scope construction rejected the configuration
    pub fn new(
        queue: Box<dyn QueueService>,
        config: RunConfig,
        resolution: EngineResolution,
        concurrency: &ConcurrencySpec,
        proxy: ProxySettings,
        fetcher: PageFetcher,
    ) -> crate::Result<Self> {
        let scope =
            ScopeMatcher::new(config.scope_mode, &config.start_urls, &config.allowed_domains)?;
        let robots = RobotsGate::new(config.respect_robots, fetcher.http_client().clone());
        let options = ExtractionOptions::from_config(&config);
        let include_globs = compile_globs(&config.include_globs);
        let exclude_globs = compile_globs(&config.exclude_globs);
        let budgets = StopBudgets::from_config(&config);

        Ok(Self {
            queue,
            resolution,
            scope,
            robots,
            fetcher,
            proxy,
            options,
            include_globs,
            exclude_globs,
            budgets,
            concurrency: Concurrency::new(concurrency),
            worker_id: worker_identity(),
            started_at: Instant::now(),
            processed_pages: 0,
            emitted_results: 0,
            idle_cycles: 0,
            config,
        })
    }

    /// Replaces the generated worker id, for operators pinning identities
    /// across restarts
    pub fn with_worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = worker_id.into();
        self
    }

    /// Runs the crawl loop to completion
    ///
    /// Repeats lease-and-process until a stop budget is crossed, then emits
    /// the `runtime.finished` event. Queue lease and reporting errors abort
    /// the run; per-item errors are classified and failed item by item.
    pub async fn run(&mut self) -> crate::Result<()> {
        info!(
            worker_id = %self.worker_id,
            engine = %self.resolution.selected,
            scope = %self.scope.mode(),
            "starting crawl loop"
        );
        self.emit_startup_events().await?;

        let stop_reason = loop {
            if let Some(reason) = self.stop_reason() {
                break reason;
            }

            let items = self
                .queue
                .lease(&self.worker_id, self.concurrency.current, LEASE_SECONDS)
                .await?;
            if items.is_empty() {
                self.idle_cycles += 1;
                debug!(
                    idle = self.idle_cycles,
                    processed = self.processed_pages,
                    emitted = self.emitted_results,
                    concurrency = self.concurrency.current,
                    "no requests leased"
                );
                tokio::time::sleep(IDLE_SLEEP).await;
                continue;
            }

            debug!(
                leased = items.len(),
                concurrency = self.concurrency.current,
                "processing leased batch"
            );
            self.idle_cycles = 0;
            for item in &items {
                self.process_item(item).await?;
            }
        };

        let finished = RunEvent::new(
            EVENT_RUNTIME_FINISHED,
            STAGE_RUNTIME,
            json!({
                "processed_pages": self.processed_pages,
                "emitted_results": self.emitted_results,
                "max_pages": self.config.max_pages,
                "max_results": self.config.max_results,
                "max_runtime_seconds": self.config.max_runtime_seconds,
                "max_idle_cycles": self.config.max_idle_cycles,
                "stop_reason": stop_reason.as_str(),
                "selected_engine": self.resolution.selected.as_str(),
            }),
        );
        self.queue.emit_event(&finished).await?;
        info!(
            stop_reason = %stop_reason,
            processed = self.processed_pages,
            emitted = self.emitted_results,
            "crawl loop finished"
        );
        Ok(())
    }

    /// Emits the startup events: engine fallback (when the resolution
    /// degraded), run started, and proxy applied (when a proxy is on).
    async fn emit_startup_events(&self) -> Result<(), QueueError> {
        if let Some(reason) = self.resolution.fallback_reason {
            let event = RunEvent::new(
                EVENT_ENGINE_FALLBACK,
                STAGE_RUNTIME,
                json!({
                    "requested": self.resolution.requested.as_str(),
                    "selected": self.resolution.selected.as_str(),
                    "reason": reason,
                }),
            )
            .with_message("Camoufox unavailable; fallback to Playwright")
            .with_level(LEVEL_WARNING);
            self.queue.emit_event(&event).await?;
        }

        let started = RunEvent::new(
            EVENT_RUNTIME_STARTED,
            STAGE_RUNTIME,
            json!({
                "worker_id": self.worker_id,
                "requested_engine": self.resolution.requested.as_str(),
                "selected_engine": self.resolution.selected.as_str(),
                "scope_mode": self.config.scope_mode.as_str(),
                "respect_robots": self.config.respect_robots,
            }),
        );
        self.queue.emit_event(&started).await?;

        if self.proxy.enabled() {
            let applied = RunEvent::new(EVENT_PROXY_APPLIED, STAGE_PROXY, self.proxy.event_payload());
            self.queue.emit_event(&applied).await?;
        }
        Ok(())
    }

    /// Evaluates the stop policy against the current counters.
    fn stop_reason(&self) -> Option<StopReason> {
        let snapshot = BudgetSnapshot {
            elapsed: self.started_at.elapsed(),
            processed_pages: self.processed_pages,
            emitted_results: self.emitted_results,
            idle_cycles: self.idle_cycles,
        };
        evaluate_stop(&self.budgets, &snapshot)
    }

    /// Processes one leased item end to end.
    ///
    /// Pre-checks (stop budget, depth, robots) fail the item directly
    /// without touching concurrency; everything past them goes through
    /// [`CrawlWorker::attempt_item`] and the classify-and-report path.
    async fn process_item(&mut self, item: &LeaseItem) -> crate::Result<()> {
        if let Some(reason) = self.stop_reason() {
            let outcome = FailOutcome {
                request_id: item.request_id.clone(),
                error_type: FailureKind::Budget.as_str().to_string(),
                error_reason: format!("Run stop criteria reached ({reason})"),
                retryable: false,
                status_code: None,
                latency_ms: 0,
            };
            self.queue.fail(&outcome).await?;
            return Ok(());
        }

        let depth = item.depth();
        if depth > self.config.max_depth {
            let outcome = FailOutcome {
                request_id: item.request_id.clone(),
                error_type: FailureKind::Policy.as_str().to_string(),
                error_reason: format!("Max depth exceeded ({})", self.config.max_depth),
                retryable: false,
                status_code: None,
                latency_ms: 0,
            };
            self.queue.fail(&outcome).await?;
            return Ok(());
        }

        let url = match Url::parse(&item.url) {
            Ok(url) => url,
            Err(error) => {
                let failure = ItemFailure {
                    message: format!("URL parse failed for {}: {error}", item.url),
                    status: None,
                    latency_ms: 0,
                };
                return self.report_failure(item, failure).await;
            }
        };

        if !self.robots.is_allowed(&url).await {
            let outcome = FailOutcome {
                request_id: item.request_id.clone(),
                error_type: FailureKind::Policy.as_str().to_string(),
                error_reason: "Blocked by robots.txt".to_string(),
                retryable: false,
                status_code: Some(403),
                latency_ms: 0,
            };
            self.queue.fail(&outcome).await?;
            return Ok(());
        }

        let outcome = self.attempt_item(item, &url, depth).await?;
        match outcome {
            ItemOutcome::Completed(report) => {
                self.processed_pages += 1;
                self.emitted_results += 1;
                self.concurrency.raise();
                let event = RunEvent::new(
                    EVENT_REQUEST_SUCCEEDED,
                    STAGE_REQUEST,
                    json!({
                        "url": item.url,
                        "status_code": report.status,
                        "depth": depth,
                        "emitted_results": self.emitted_results,
                        "concurrency": self.concurrency.current,
                    }),
                )
                .with_request_id(&item.request_id);
                self.queue.emit_event(&event).await?;
                info!(
                    url = %item.url,
                    status = report.status,
                    depth,
                    emitted = self.emitted_results,
                    concurrency = self.concurrency.current,
                    "request succeeded"
                );
                Ok(())
            }
            ItemOutcome::Failed(failure) => self.report_failure(item, failure).await,
        }
    }

    /// Fetches, extracts, discovers, enqueues, pushes, and acks one item.
    ///
    /// Fetch failures, blocked statuses, and reporting calls that answer
    /// non-2xx come back as [`ItemOutcome::Failed`] for the classify path;
    /// only event emission errors abort the run.
    async fn attempt_item(
        &self,
        item: &LeaseItem,
        url: &Url,
        depth: u32,
    ) -> crate::Result<ItemOutcome> {
        let started = Instant::now();

        let fetched = match self
            .fetcher
            .fetch(url, self.resolution.selected, &self.config)
            .await
        {
            Ok(fetched) => fetched,
            Err(error) => {
                return Ok(ItemOutcome::Failed(ItemFailure {
                    message: error.to_string(),
                    status: None,
                    latency_ms: elapsed_ms(started),
                }))
            }
        };
        let status = fetched.status;
        let failed = |error: QueueError| {
            ItemOutcome::Failed(ItemFailure {
                message: error.to_string(),
                status: Some(status),
                latency_ms: elapsed_ms(started),
            })
        };

        if fetched.engine != self.resolution.selected {
            let message = fetched
                .fallback_reason
                .clone()
                .unwrap_or_else(|| "playwright fetch failed; fallback to http:fast".to_string());
            let event = RunEvent::new(
                EVENT_ENGINE_FALLBACK,
                STAGE_REQUEST,
                json!({
                    "requested": self.resolution.selected.as_str(),
                    "selected": fetched.engine.as_str(),
                    "reason": "playwright_navigation_timeout_or_proxy_error",
                }),
            )
            .with_request_id(&item.request_id)
            .with_message(message)
            .with_level(LEVEL_WARNING);
            self.queue.emit_event(&event).await?;
        }

        if matches!(status, 401 | 403 | 429) {
            return Ok(ItemOutcome::Failed(ItemFailure {
                message: FetchError::BlockedStatus { status }.to_string(),
                status: Some(status),
                latency_ms: elapsed_ms(started),
            }));
        }

        // Browser drivers and the HTTP client only ever report URLs they
        // already parsed, so this fallback stays theoretical.
        let final_url = Url::parse(&fetched.final_url).unwrap_or_else(|_| url.clone());
        let extracted = extract_content(
            &fetched.html,
            &item.url,
            &final_url,
            &self.options,
            |candidate| self.scope.in_scope(candidate),
        );
        let discovered = discover_links(
            &fetched.html,
            &final_url,
            &self.include_globs,
            &self.exclude_globs,
            |candidate| self.scope.in_scope(candidate),
        );

        let children: Vec<EnqueueItem> = discovered
            .iter()
            .map(|link| EnqueueItem {
                url: link.url.clone(),
                discovered_from_request_id: item.request_id.clone(),
                priority: link.priority,
                metadata: json!({
                    "depth": depth + 1,
                    "discovered_by": item.request_id,
                }),
            })
            .collect();
        if let Err(error) = self.queue.enqueue(&children).await {
            return Ok(failed(error));
        }

        let record = self.build_record(item, &fetched, &extracted, depth, discovered.len());
        if let Err(error) = self.queue.push_records(&[record]).await {
            return Ok(failed(error));
        }

        let ack = AckOutcome {
            request_id: item.request_id.clone(),
            status_code: status,
            latency_ms: elapsed_ms(started),
            metadata: json!({
                "selected_engine": self.resolution.selected.as_str(),
                "fetch_engine": fetched.engine.as_str(),
                "depth": depth,
                "discovered_count": discovered.len(),
            }),
        };
        if let Err(error) = self.queue.ack(&ack).await {
            return Ok(failed(error));
        }

        Ok(ItemOutcome::Completed(ItemReport { status }))
    }

    /// Classifies a caught per-item error, fails the item, and emits the
    /// `request.failed` event.
    async fn report_failure(&mut self, item: &LeaseItem, failure: ItemFailure) -> crate::Result<()> {
        let class = classify_failure(&failure.message, failure.status);
        let outcome = FailOutcome {
            request_id: item.request_id.clone(),
            error_type: class.kind.as_str().to_string(),
            error_reason: failure.message.clone(),
            retryable: class.retryable,
            status_code: failure.status,
            latency_ms: failure.latency_ms,
        };
        self.queue.fail(&outcome).await?;
        self.concurrency.lower();

        let level = if class.kind == FailureKind::Infra {
            LEVEL_ERROR
        } else {
            LEVEL_WARNING
        };
        let event = RunEvent::new(
            EVENT_REQUEST_FAILED,
            STAGE_REQUEST,
            json!({
                "url": item.url,
                "error_type": class.kind.as_str(),
                "reason": failure.message,
                "concurrency": self.concurrency.current,
            }),
        )
        .with_request_id(&item.request_id)
        .with_message(failure.message.clone())
        .with_level(level);
        self.queue.emit_event(&event).await?;
        warn!(
            url = %item.url,
            error_type = %class.kind,
            retryable = class.retryable,
            status = failure.status,
            reason = %failure.message,
            "request failed"
        );
        Ok(())
    }

    /// Assembles the dataset record for one successful page.
    fn build_record(
        &self,
        item: &LeaseItem,
        fetched: &FetchedPage,
        extracted: &ExtractedContent,
        depth: u32,
        discovered_count: usize,
    ) -> Value {
        let mut metadata = extracted.metadata.clone();
        if let Some(bundle) = metadata.as_object_mut() {
            bundle.insert("depth".to_string(), json!(depth));
            bundle.insert(
                "selected_engine".to_string(),
                json!(self.resolution.selected.as_str()),
            );
            bundle.insert("fetch_engine".to_string(), json!(fetched.engine.as_str()));
            bundle.insert("discovered_count".to_string(), json!(discovered_count));
            if self.config.save_html {
                bundle.insert("html".to_string(), json!(extracted.cleaned_html));
            }
        }

        let content_text = if self.config.save_text {
            extracted.content_text.clone()
        } else {
            None
        };
        let content_markdown = if self.config.save_markdown {
            extracted.content_markdown.clone()
        } else {
            None
        };

        json!({
            "url": item.url,
            "final_url": fetched.final_url,
            "status_code": fetched.status,
            "fetched_at": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "title": extracted.title,
            "description": extracted.description,
            "content_text": content_text,
            "content_markdown": content_markdown,
            "links": extracted.links,
            "language": extracted.language,
            "metadata": metadata,
        })
    }
}

/// `<hostname>-<unix millis>`, with a literal `worker` fallback when the
/// environment carries no hostname
fn worker_identity() -> String {
    let hostname = env::var("HOSTNAME")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "worker".to_string());
    format!("{hostname}-{}", Utc::now().timestamp_millis())
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
