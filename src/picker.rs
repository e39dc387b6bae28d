//! Running the auto-picker over lines and surveys
use crate::algorithms::{detect, filter::median_filter, Detection};
use crate::config::SurveyConfig;
use crate::error::{Error, Result, ValidationError};
use crate::model::{PickKey, PickSample, PickType, Trace};
use crate::picks::PickLineManager;
use crate::store::{SurveyLine, TraceStore};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

/// A flag shared between the caller and running pickers
///
/// Cancelling stops every line that has not finished. A cancelled line
/// keeps the traces it completed; the trace in flight is discarded.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that has not been cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An auto-pick demoted to "no pick" because it lies above a shallower
/// reflector
#[derive(Debug, Clone, PartialEq)]
pub struct Demotion {
    /// The pick line
    pub key: PickKey,
    /// Trace index
    pub index: usize,
    /// The rejected depth
    pub depth: f64,
    /// Depth of the overlying reflector at that trace
    pub overlying: f64,
}

/// The result of auto-picking one line for one pick type
///
/// A sample keeps the confidence of its raw detection only when smoothing
/// left its depth unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct LinePicks {
    /// The pick line
    pub key: PickKey,
    /// Per-trace detections before smoothing
    pub raw: Vec<Option<Detection>>,
    /// Smoothed, ordering-checked samples, ready to merge
    pub samples: Vec<PickSample>,
    /// Picks rejected by the ordering check
    pub demotions: Vec<Demotion>,
    /// Whether the run stopped before the last trace
    pub cancelled: bool,
}

/// The auto-picker for one survey configuration
#[derive(Debug, Clone, Copy)]
pub struct AutoPicker<'a> {
    config: &'a SurveyConfig,
}

impl<'a> AutoPicker<'a> {
    /// Create a picker
    pub fn new(config: &'a SurveyConfig) -> Self {
        AutoPicker { config }
    }

    /// Pick one trace
    ///
    /// `overlying` is the depth of the reflector above, required for every
    /// pick type but the bottom. `prior` is the depth picked on the
    /// previous trace.
    pub fn pick_trace(
        &self,
        trace: &Trace,
        pick_type: PickType,
        overlying: Option<f64>,
        prior: Option<f64>,
    ) -> (PickSample, Option<Detection>) {
        let picker = &self.config.picker;
        let min_depth = match (pick_type, overlying) {
            (PickType::Bottom, _) => 0.0,
            (_, Some(depth)) => depth + picker.horizon_separation,
            (_, None) => return (PickSample::auto(None, None), None),
        };
        let detection = detect(trace, picker, min_depth, prior);
        let sample = PickSample::auto(
            detection.map(|d| d.depth),
            detection.map(|d| d.confidence),
        );
        (sample, detection)
    }

    /// Pick a whole line
    ///
    /// For sub-bottom pick types, `overlying` holds the depth of the
    /// deepest reflector above at each trace. Candidates are median
    /// filtered across traces, then any pick that ends up above the
    /// overlying reflector, or above zero depth, is demoted to "no pick".
    pub fn pick_line(
        &self,
        line: &SurveyLine,
        pick_type: PickType,
        overlying: Option<&[Option<f64>]>,
        cancel: &CancelToken,
    ) -> LinePicks {
        let key = PickKey::new(line.name(), pick_type);
        let traces = line
            .nearest_channel(self.config.frequency_for(pick_type))
            .unwrap_or(&[]);

        let mut raw = Vec::with_capacity(traces.len());
        let mut prior = None;
        let mut cancelled = false;
        for (i, trace) in traces.iter().enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let above = match (pick_type, overlying) {
                (PickType::Bottom, _) => None,
                (_, Some(depths)) => depths.get(i).copied().flatten(),
                (_, None) => None,
            };
            let (_, detection) = self.pick_trace(trace, pick_type, above, prior);
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            if let Some(d) = detection {
                prior = Some(d.depth);
            }
            raw.push(detection);
        }

        let candidates: Vec<Option<f64>> = raw.iter().map(|d| d.map(|d| d.depth)).collect();
        let smoothed = median_filter(&candidates, self.config.picker.median_window);

        let mut demotions = Vec::new();
        let samples = smoothed
            .iter()
            .zip(raw.iter())
            .enumerate()
            .map(|(i, (depth, detection))| {
                let bound = match pick_type {
                    PickType::Bottom => Some(0.0),
                    _ => overlying.and_then(|o| o.get(i).copied().flatten()),
                };
                match (*depth, bound) {
                    (Some(d), Some(b)) if d < b => {
                        log::debug!("{}: trace {} pick {} above overlying {}", key, i, d, b);
                        demotions.push(Demotion {
                            key: key.clone(),
                            index: i,
                            depth: d,
                            overlying: b,
                        });
                        PickSample::auto(None, None)
                    }
                    (d, _) => {
                        let confidence = detection
                            .filter(|x| Some(x.depth) == d)
                            .map(|x| x.confidence);
                        PickSample::auto(d, confidence)
                    }
                }
            })
            .collect();

        if !demotions.is_empty() {
            log::warn!(
                "{}: {} auto-picks above the overlying reflector demoted to no pick",
                key,
                demotions.len()
            );
        }
        if cancelled {
            log::info!("{}: cancelled after {} of {} traces", key, raw.len(), traces.len());
        }

        LinePicks {
            key,
            raw,
            samples,
            demotions,
            cancelled,
        }
    }

    /// Pick every line of a store on worker threads, one per line
    ///
    /// `overlying` maps line names to overlying depths, as for
    /// [`pick_line`](Self::pick_line). Results are sorted by line name.
    pub fn pick_survey(
        &self,
        store: &TraceStore,
        pick_type: PickType,
        overlying: &BTreeMap<String, Vec<Option<f64>>>,
        cancel: &CancelToken,
    ) -> Vec<LinePicks> {
        let (tx, rx) = mpsc::channel();

        thread::scope(|s| {
            for line in store.iter() {
                let tx1 = tx.clone();
                let above = overlying.get(line.name()).map(Vec::as_slice);
                s.spawn(move || {
                    let picks = self.pick_line(line, pick_type, above, cancel);
                    // The receiver outlives every sender
                    let _ = tx1.send(picks);
                });
            }
        });

        // Explicitly drop the Sender to close the channel
        drop(tx);

        let mut results: Vec<LinePicks> = rx.into_iter().collect();
        results.sort_by(|a, b| a.key.cmp(&b.key));
        results
    }
}

/// Depths of the deepest reflector above `pick_type` at each trace
///
/// Returns `None` for the bottom. For other pick types a trace has an
/// overlying depth only where the bottom is picked; shallower horizons
/// deepen it where they are picked.
pub fn overlying_depths(
    manager: &PickLineManager,
    config: &SurveyConfig,
    line: &str,
    pick_type: PickType,
) -> Option<Vec<Option<f64>>> {
    if pick_type == PickType::Bottom {
        return None;
    }
    let len = manager.trace_count(line)?;
    let bottom = manager
        .depths(line, PickType::Bottom)
        .unwrap_or_else(|| vec![None; len]);
    let above = config
        .pick_types()
        .into_iter()
        .filter(|p| *p > PickType::Bottom && *p < pick_type)
        .filter_map(|p| manager.depths(line, p))
        .fold(bottom, |acc, depths| {
            acc.into_iter()
                .zip(depths)
                .map(|(a, d)| match (a, d) {
                    (Some(a), Some(d)) => Some(a.max(d)),
                    (a, _) => a,
                })
                .collect()
        });
    Some(above)
}

/// Commit a line's auto-picks through the manager
///
/// Records the raw detections for audit and merges the smoothed samples.
/// A cancelled run merges only the traces it completed. Returns the
/// number of samples changed.
pub fn commit(manager: &mut PickLineManager, picks: &LinePicks) -> Result<usize> {
    manager.record_detections(&picks.key, picks.raw.clone());
    if picks.cancelled {
        manager.merge_auto_at(&picks.key, 0, &picks.samples)
    } else {
        manager.merge_auto(&picks.key, &picks.samples)
    }
}

/// Auto-pick one pick type across a survey and commit the results
///
/// Returns the per-line results, with their demotions, after they have
/// been committed. Locked pick lines are left as they are.
pub fn run(
    store: &TraceStore,
    manager: &mut PickLineManager,
    config: &SurveyConfig,
    pick_type: PickType,
    cancel: &CancelToken,
) -> Result<Vec<LinePicks>> {
    let overlying: BTreeMap<String, Vec<Option<f64>>> = store
        .iter()
        .filter_map(|line| {
            overlying_depths(manager, config, line.name(), pick_type)
                .map(|d| (line.name().to_string(), d))
        })
        .collect();

    let results = AutoPicker::new(config).pick_survey(store, pick_type, &overlying, cancel);
    let mut changed = 0;
    for picks in &results {
        match commit(manager, picks) {
            Err(Error::Validation(ValidationError::Locked(key))) => {
                log::info!("{} is locked, auto-picks not merged", key);
            }
            res => changed += res?,
        }
    }
    log::info!(
        "auto-picked {} on {} lines, {} samples changed",
        pick_type,
        results.len(),
        changed
    );
    Ok(results)
}
