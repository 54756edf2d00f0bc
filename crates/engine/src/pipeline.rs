//! Extractor execution for one aligned pair
//!
//! Each extractor runs on its own thread and reports back over a
//! `crossbeam_channel`. Whatever has not reported by the deadline is
//! recorded as timed out; its thread is left to finish on its own and its
//! late result is dropped.
//!
//! Extractor kernels run on a rayon pool owned by the pipeline, never on
//! the pool of the caller. Per-asset workers block while they wait for
//! results, so sharing their pool with the kernels would leave no thread to
//! do the work.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use geowatch_algorithms::align::AlignedPair;
use geowatch_algorithms::signals::{SignalExtractor, SignalParams};
use geowatch_core::{Error, InvalidReason, Result, SignalKind, SignalResult};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, warn};

/// Runs the closed extractor set against aligned pairs
#[derive(Debug, Clone)]
pub struct SignalPipeline {
    params: Arc<SignalParams>,
    timeout: Duration,
    kernels: Arc<ThreadPool>,
}

impl SignalPipeline {
    pub fn new(params: SignalParams, timeout: Duration) -> Result<Self> {
        let kernels = ThreadPoolBuilder::new()
            .thread_name(|i| format!("extract-kernel-{i}"))
            .build()
            .map_err(|e| Error::Other(format!("failed to build extractor pool: {e}")))?;

        Ok(Self {
            params: Arc::new(params),
            timeout,
            kernels: Arc::new(kernels),
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// One result per extractor, in [`SignalExtractor::ALL`] order.
    ///
    /// Never fails: a late extractor becomes `TimedOut`, one that could not
    /// start or died becomes `Failed`.
    pub fn run(&self, pair: Arc<AlignedPair>) -> Vec<SignalResult> {
        let (tx, rx) = crossbeam_channel::bounded(SignalExtractor::ALL.len());
        let mut slots: Vec<Option<SignalResult>> = vec![None; SignalExtractor::ALL.len()];

        for (slot, extractor) in SignalExtractor::ALL.into_iter().enumerate() {
            let tx = tx.clone();
            let pair = Arc::clone(&pair);
            let params = Arc::clone(&self.params);
            let kernels = Arc::clone(&self.kernels);

            let spawned = thread::Builder::new()
                .name(format!("extract-{}", extractor.kind()))
                .spawn(move || {
                    let result = kernels.install(|| extractor.extract(&pair, &params));
                    // The receiver is gone once the deadline has passed
                    let _ = tx.send((slot, result));
                });

            if let Err(e) = spawned {
                warn!("cannot start {} extractor: {}", extractor.kind(), e);
                slots[slot] = Some(SignalResult::invalid(
                    extractor.kind(),
                    InvalidReason::Failed {
                        message: format!("thread spawn failed: {e}"),
                    },
                ));
            }
        }
        drop(tx);

        let deadline = Instant::now() + self.timeout;
        while slots.iter().any(Option::is_none) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok((slot, result)) => slots[slot] = Some(result),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    fill_missing(&mut slots, |_| InvalidReason::Failed {
                        message: "extractor thread terminated without a result".into(),
                    });
                    break;
                }
            }
        }

        let after_ms = self.timeout.as_millis() as u64;
        fill_missing(&mut slots, |kind| {
            debug!("{} extractor missed its {} ms deadline", kind, after_ms);
            InvalidReason::TimedOut { after_ms }
        });

        slots.into_iter().flatten().collect()
    }
}

fn fill_missing(
    slots: &mut [Option<SignalResult>],
    mut reason: impl FnMut(SignalKind) -> InvalidReason,
) {
    for (slot, extractor) in slots.iter_mut().zip(SignalExtractor::ALL) {
        if slot.is_none() {
            let kind = extractor.kind();
            *slot = Some(SignalResult::invalid(kind, reason(kind)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use geowatch_algorithms::align::AlignedView;
    use geowatch_algorithms::signals::extract_all;
    use geowatch_core::{Band, GeoTransform, Raster};
    use rayon::prelude::*;

    fn pair(size: usize) -> AlignedPair {
        let band = |f: fn(usize, usize) -> f64| {
            let data: Vec<f64> = (0..size * size).map(|i| f(i / size, i % size)).collect();
            Raster::from_vec(data, size, size).unwrap()
        };
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let before = AlignedView::new("mock", t, 0.0)
            .with_band(Band::Red, band(|_, _| 0.05))
            .with_band(Band::Nir, band(|_, c| if c % 7 == 0 { 0.3 } else { 0.45 }));
        let after = AlignedView::new("mock", t + chrono::Duration::days(20), 0.0)
            .with_band(Band::Red, band(|r, _| if r % 5 == 0 { 0.3 } else { 0.05 }))
            .with_band(Band::Nir, band(|_, c| if c % 7 == 0 { 0.3 } else { 0.45 }));
        AlignedPair::from_views(before, after, GeoTransform::new(0.0, size as f64, 1.0, -1.0), size, size)
    }

    #[test]
    fn test_matches_direct_extraction() {
        let p = pair(24);
        let params = SignalParams::default();
        let pipeline = SignalPipeline::new(params.clone(), Duration::from_secs(30)).unwrap();

        let threaded = pipeline.run(Arc::new(p.clone()));
        assert_eq!(threaded, extract_all(&p, &params));
        assert_eq!(
            threaded.iter().map(|s| s.kind).collect::<Vec<_>>(),
            vec![SignalKind::Ndvi, SignalKind::Structural, SignalKind::Texture]
        );
    }

    #[test]
    fn test_callers_on_every_global_worker_still_get_results() {
        let p = Arc::new(pair(48));
        let params = SignalParams::default();
        let expected = extract_all(&p, &params);
        let pipeline = SignalPipeline::new(params, Duration::from_secs(30)).unwrap();

        // Every global worker blocks in `run` at the same time
        let runs: Vec<Vec<SignalResult>> = (0..rayon::current_num_threads() * 2)
            .into_par_iter()
            .map(|_| pipeline.run(Arc::clone(&p)))
            .collect();

        assert!(runs.iter().all(|r| r == &expected), "{:?}", runs);
    }

    #[test]
    fn test_expired_deadline_times_out() {
        let pipeline = SignalPipeline::new(SignalParams::default(), Duration::ZERO).unwrap();
        let results = pipeline.run(Arc::new(pair(512)));

        assert_eq!(results.len(), 3);
        for r in &results {
            assert_eq!(r.invalid_reason(), Some(&InvalidReason::TimedOut { after_ms: 0 }));
        }
    }
}
