//! Batch analysis over many assets
//!
//! Assets are independent: each one is fetched, paired, scored, classified
//! and checked for anomalies on its own, and a failure only degrades or
//! skips that asset. Cancellation is checked before an asset starts, never
//! while it is being processed.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use geowatch_algorithms::align::align_pair;
use geowatch_algorithms::anomaly::AnomalyDetector;
use geowatch_algorithms::classify::Classifier;
use geowatch_algorithms::fusion::fuse;
use geowatch_core::sources::{AssetSource, ContextSource, ImagerySource, Published, ResultSink};
use geowatch_core::{Asset, AssetCategory, AssetId, HistoryStore, InvalidReason, Result, ThreatLevel, TimeRange};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::pipeline::SignalPipeline;
use crate::strategy::ParallelStrategy;

/// Shared flag that stops a batch from starting further assets
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How one asset fared
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AssetOutcome {
    Succeeded,
    /// Processed, but some pairs or deliveries went wrong
    Degraded { reasons: Vec<String> },
    /// Nothing could be scored
    Skipped { reason: String },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetReport {
    pub asset_id: AssetId,
    pub category: AssetCategory,
    pub outcome: AssetOutcome,
    pub pairs_scored: usize,
    pub pairs_insufficient: usize,
    /// Pairs that could not be aligned
    pub pairs_failed: usize,
    /// Pairs already in the history, left alone
    pub pairs_known: usize,
    pub highest_threat: Option<ThreatLevel>,
    pub classifications: usize,
    pub anomalies: usize,
}

impl AssetReport {
    fn new(asset: &Asset) -> Self {
        Self {
            asset_id: asset.id.clone(),
            category: asset.category,
            outcome: AssetOutcome::Succeeded,
            pairs_scored: 0,
            pairs_insufficient: 0,
            pairs_failed: 0,
            pairs_known: 0,
            highest_threat: None,
            classifications: 0,
            anomalies: 0,
        }
    }
}

/// Totals over a batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub reports: Vec<AssetReport>,
    /// Assets per category
    pub category_counts: BTreeMap<AssetCategory, usize>,
    /// Assets per highest threat level reached in this run
    pub threat_counts: BTreeMap<ThreatLevel, usize>,
    pub classifications: usize,
    pub anomalies: usize,
}

impl BatchSummary {
    pub fn from_reports(reports: Vec<AssetReport>) -> Self {
        let mut summary = BatchSummary::default();
        for report in &reports {
            *summary.category_counts.entry(report.category).or_default() += 1;
            if let Some(level) = report.highest_threat {
                *summary.threat_counts.entry(level).or_default() += 1;
            }
            summary.classifications += report.classifications;
            summary.anomalies += report.anomalies;
        }
        summary.reports = reports;
        summary
    }

    fn count(&self, pred: impl Fn(&AssetOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, AssetOutcome::Succeeded))
    }

    pub fn degraded(&self) -> usize {
        self.count(|o| matches!(o, AssetOutcome::Degraded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, AssetOutcome::Skipped { .. }))
    }

    pub fn cancelled(&self) -> usize {
        self.count(|o| matches!(o, AssetOutcome::Cancelled))
    }

    pub fn report(&self, asset_id: &AssetId) -> Option<&AssetReport> {
        self.reports.iter().find(|r| &r.asset_id == asset_id)
    }
}

type ProgressFn<'a> = Box<dyn Fn(&AssetReport) + Send + Sync + 'a>;

/// Runs the full change pipeline for every asset of a source
pub struct BatchRunner<'a> {
    config: &'a EngineConfig,
    imagery: &'a dyn ImagerySource,
    context: &'a dyn ContextSource,
    history: &'a dyn HistoryStore,
    sink: &'a dyn ResultSink,
    pipeline: SignalPipeline,
    classifier: Classifier,
    detector: AnomalyDetector,
    cancel: CancelToken,
    progress: Option<ProgressFn<'a>>,
}

impl<'a> BatchRunner<'a> {
    pub fn new(
        config: &'a EngineConfig,
        imagery: &'a dyn ImagerySource,
        context: &'a dyn ContextSource,
        history: &'a dyn HistoryStore,
        sink: &'a dyn ResultSink,
    ) -> Result<Self> {
        Ok(Self {
            config,
            imagery,
            context,
            history,
            sink,
            pipeline: SignalPipeline::new(config.signals.clone(), config.batch.extractor_timeout())?,
            classifier: Classifier::new(config.classifier.clone()),
            detector: AnomalyDetector::new(config.anomaly.clone()),
            cancel: CancelToken::new(),
            progress: None,
        })
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Called once per asset as soon as its report is ready
    pub fn with_progress(mut self, progress: impl Fn(&AssetReport) + Send + Sync + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Analyze every asset of `assets` over imagery acquired in `range`
    pub fn run(&self, assets: &dyn AssetSource, range: TimeRange) -> Result<BatchSummary> {
        let assets: Vec<Asset> = assets.assets().collect();
        info!("Analyzing {} assets", assets.len());

        let mode = self.config.batch.processing_mode();
        let reports = mode.par_map(0..assets.len(), |i| {
            let report = self.analyze_asset(&assets[i], range);
            if let Some(progress) = &self.progress {
                progress(&report);
            }
            report
        })?;

        let summary = BatchSummary::from_reports(reports);
        info!(
            "Batch done: {} succeeded, {} degraded, {} skipped, {} cancelled",
            summary.succeeded(),
            summary.degraded(),
            summary.skipped(),
            summary.cancelled()
        );
        Ok(summary)
    }

    /// Process one asset; never fails, problems end up in the report
    pub fn analyze_asset(&self, asset: &Asset, range: TimeRange) -> AssetReport {
        let mut report = AssetReport::new(asset);
        if self.cancel.is_cancelled() {
            report.outcome = AssetOutcome::Cancelled;
            return report;
        }

        let max_cloud = self.config.batch.max_cloud_cover;
        let mut observations = self.imagery.fetch_observations(asset, range);
        let fetched = observations.len();
        observations.retain(|o| o.cloud_cover <= max_cloud);
        if observations.len() < fetched {
            debug!(
                "{}: dropped {} observations above {:.0}% cloud cover",
                asset.id,
                fetched - observations.len(),
                max_cloud * 100.0
            );
        }
        if observations.len() < 2 {
            warn!("{}: {} usable observations, skipping", asset.id, observations.len());
            report.outcome = AssetOutcome::Skipped {
                reason: format!(
                    "{} usable observations of {} fetched, at least 2 required",
                    observations.len(),
                    fetched
                ),
            };
            return report;
        }
        observations.sort_by_key(|o| o.acquired_at);

        let mut reasons = Vec::new();
        let known: HashSet<(DateTime<Utc>, DateTime<Utc>)> = match self.history.read_all(&asset.id) {
            Ok(history) => history.iter().map(|o| (o.baseline_at, o.observed_at)).collect(),
            Err(e) => {
                warn!("{}: cannot read history: {}", asset.id, e);
                reasons.push(format!("history read failed: {e}"));
                HashSet::new()
            }
        };

        let context = self.context.osm_context(asset);
        let zone = self.classifier.zone_of(asset);
        let mut new_points = HashSet::new();

        for window in observations.windows(2) {
            let (before, after) = (&window[0], &window[1]);
            if known.contains(&(before.acquired_at, after.acquired_at)) {
                report.pairs_known += 1;
                continue;
            }

            let pair = match align_pair(asset, before, after, &self.config.alignment) {
                Ok(pair) => Arc::new(pair),
                Err(e) => {
                    warn!(
                        "{}: skipping pair {} -> {}: {}",
                        asset.id, before.acquired_at, after.acquired_at, e
                    );
                    report.pairs_failed += 1;
                    reasons.push(format!("pair ending {}: {}", after.acquired_at, e));
                    continue;
                }
            };

            let signals = self.pipeline.run(Arc::clone(&pair));
            for signal in &signals {
                if let Some(InvalidReason::TimedOut { after_ms }) = signal.invalid_reason() {
                    warn!("{}: {} extractor timed out after {} ms", asset.id, signal.kind, after_ms);
                }
            }

            let observation = fuse(asset, &pair, signals, &self.config.fusion);
            if observation.is_scored() {
                report.pairs_scored += 1;
            } else {
                report.pairs_insufficient += 1;
                reasons.push(format!("insufficient data for pair ending {}", observation.observed_at));
            }

            match self.history.append(observation.clone()) {
                Ok(()) if observation.is_scored() => {
                    new_points.insert(observation.observed_at);
                }
                Ok(()) => {}
                Err(e) => {
                    warn!("{}: cannot record observation: {}", asset.id, e);
                    reasons.push(format!("history append failed: {e}"));
                }
            }

            let result = self.classifier.classify(&observation, asset, context.as_ref(), zone);
            debug!(
                "{}: {} at {} (score {:?})",
                asset.id, result.threat_level, result.observed_at, result.change_score
            );
            report.highest_threat = report.highest_threat.max(Some(result.threat_level));
            match self.sink.publish(Published::Classification(result)) {
                Ok(()) => report.classifications += 1,
                Err(e) => {
                    warn!("{}: cannot publish classification: {}", asset.id, e);
                    reasons.push(format!("publish failed: {e}"));
                }
            }
        }

        if !new_points.is_empty() {
            self.flag_anomalies(asset, &new_points, &mut report, &mut reasons);
        }

        report.outcome = if report.pairs_failed > 0 && report.pairs_scored + report.pairs_insufficient == 0 {
            AssetOutcome::Skipped {
                reason: format!("no pair could be aligned: {}", reasons.join("; ")),
            }
        } else if reasons.is_empty() {
            AssetOutcome::Succeeded
        } else {
            AssetOutcome::Degraded { reasons }
        };
        report
    }

    /// Publish anomaly flags that land on points recorded in this run
    fn flag_anomalies(
        &self,
        asset: &Asset,
        new_points: &HashSet<DateTime<Utc>>,
        report: &mut AssetReport,
        reasons: &mut Vec<String>,
    ) {
        let history = match self.history.read_all(&asset.id) {
            Ok(history) => history,
            Err(e) => {
                reasons.push(format!("history read failed: {e}"));
                return;
            }
        };

        for flag in self.detector.detect(&asset.id, &history) {
            if !new_points.contains(&flag.observed_at) {
                continue;
            }
            info!("{}: {}", asset.id, flag);
            match self.sink.publish(Published::Anomaly(flag)) {
                Ok(()) => report.anomalies += 1,
                Err(e) => reasons.push(format!("publish failed: {e}")),
            }
        }
    }
}
