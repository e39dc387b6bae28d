//! The pick line manager
//!
//! Every pick line of a survey is owned by one [`PickLineManager`]. All
//! edits, manual or automatic, go through it, either by direct method
//! calls or as [`Edit`] commands, possibly sent from other threads through
//! an [`EditQueue`].
use crate::algorithms::Detection;
use crate::error::{Error, Result, ValidationError};
use crate::model::{PickKey, PickSample, PickType, Source};
use crate::store::TraceStore;
use std::collections::{btree_map, BTreeMap, VecDeque};
use std::ops::Range;
use std::sync::mpsc::{self, Receiver, Sender};

mod line;

pub use line::PickLine;

/// Number of edits kept for undo
pub const HISTORY_LIMIT: usize = 100;

/// A mutation of the pick state
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    /// Overwrite a contiguous range of traces
    SetRange {
        /// Target pick line
        key: PickKey,
        /// Traces to overwrite
        range: Range<usize>,
        /// New depths, one per trace in `range`
        depths: Vec<Option<f64>>,
        /// Provenance of the new samples
        source: Source,
    },
    /// Merge auto-picked samples starting at trace `start`
    MergeAuto {
        /// Target pick line
        key: PickKey,
        /// First trace
        start: usize,
        /// Samples to merge
        samples: Vec<PickSample>,
    },
    /// Interpolate short runs of missing picks
    InterpolateGaps {
        /// Target pick line
        key: PickKey,
        /// Longest run to fill
        max_gap: usize,
    },
    /// Lock or unlock a pick line
    SetLocked {
        /// Target pick line
        key: PickKey,
        /// New lock state
        locked: bool,
    },
    /// Revert the last edit
    Undo,
    /// Reapply the last reverted edit
    Redo,
}

/// Owner of every pick line of a survey
///
/// Each pick line always has exactly one sample per trace of its survey
/// line. Edits are all-or-nothing: they are applied to a copy of the line,
/// and the copy replaces the line only when the edit succeeds. The line as
/// it was before each successful edit is kept for [`undo`](Self::undo),
/// up to the last [`HISTORY_LIMIT`] edits.
#[derive(Debug, Default)]
pub struct PickLineManager {
    trace_counts: BTreeMap<String, usize>,
    lines: BTreeMap<PickKey, PickLine>,
    raw: BTreeMap<PickKey, Vec<Option<Detection>>>,
    undo: VecDeque<(PickKey, PickLine)>,
    redo: VecDeque<(PickKey, PickLine)>,
}

impl PickLineManager {
    /// A manager for lines with the given trace counts
    pub fn new(trace_counts: BTreeMap<String, usize>) -> Self {
        PickLineManager {
            trace_counts,
            ..Default::default()
        }
    }

    /// A manager for every line of a trace store
    pub fn for_store(store: &TraceStore) -> Self {
        Self::new(store.trace_counts())
    }

    /// Trace count of a survey line
    pub fn trace_count(&self, line: &str) -> Option<usize> {
        self.trace_counts.get(line).copied()
    }

    /// The pick line for `key`, if it exists
    pub fn get(&self, key: &PickKey) -> Option<&PickLine> {
        self.lines.get(key)
    }

    /// Depths of the pick line for `key`
    pub fn depths(&self, line: &str, pick_type: PickType) -> Option<Vec<Option<f64>>> {
        self.lines
            .get(&PickKey::new(line, pick_type))
            .map(PickLine::depths)
    }

    /// Iterate over pick lines in key order
    pub fn iter(&self) -> btree_map::Iter<'_, PickKey, PickLine> {
        self.lines.iter()
    }

    /// Raw per-trace detections of the last auto-pick run, kept for audit
    pub fn raw_detections(&self, key: &PickKey) -> Option<&[Option<Detection>]> {
        self.raw.get(key).map(Vec::as_slice)
    }

    /// Install a pick line, replacing any existing one
    ///
    /// Used when reopening a project. Does not enter the undo history.
    ///
    /// # Errors
    ///
    /// Fails when the survey line is unknown or the pick line length does
    /// not match its trace count.
    pub fn insert(&mut self, key: PickKey, line: PickLine) -> Result<()> {
        self.insert_all(vec![(key, line)])
    }

    /// Install several pick lines, all or none
    ///
    /// Every line is checked before any is installed, so a failure leaves
    /// the manager unchanged.
    pub fn insert_all(&mut self, lines: Vec<(PickKey, PickLine)>) -> Result<()> {
        for (key, line) in &lines {
            let expected = self.expected_len(key)?;
            if line.len() != expected {
                return Err(ValidationError::Misaligned {
                    key: key.to_string(),
                    expected,
                    found: line.len(),
                }
                .into());
            }
        }
        self.lines.extend(lines);
        Ok(())
    }

    /// Make sure a pick line exists for `key`, creating an unset one
    pub fn ensure(&mut self, key: &PickKey) -> Result<&PickLine> {
        let len = self.expected_len(key)?;
        Ok(self
            .lines
            .entry(key.clone())
            .or_insert_with(|| PickLine::new(len)))
    }

    fn expected_len(&self, key: &PickKey) -> Result<usize> {
        self.trace_counts
            .get(&key.line)
            .copied()
            .ok_or_else(|| ValidationError::UnknownLine(key.line.clone()).into())
    }

    /// Apply `f` to a copy of the line and commit the copy on success
    fn edit<T, F>(&mut self, key: &PickKey, f: F) -> Result<T>
    where
        F: FnOnce(&mut PickLine) -> std::result::Result<T, ValidationError>,
    {
        let current = self.ensure(key)?;
        if current.is_locked() {
            return Err(ValidationError::Locked(key.to_string()).into());
        }
        let mut next = current.clone();
        let out = f(&mut next).map_err(|e| keyed(e, key))?;
        if let Some(previous) = self.lines.insert(key.clone(), next) {
            self.record(key, previous);
        }
        Ok(out)
    }

    /// Overwrite traces `range` with `depths`
    ///
    /// Applying the same call twice leaves the same state as applying it
    /// once.
    pub fn set_range(
        &mut self,
        key: &PickKey,
        range: Range<usize>,
        depths: &[Option<f64>],
        source: Source,
    ) -> Result<()> {
        self.edit(key, |line| line.set_range(range, depths, source))?;
        log::debug!("{}: set {} samples", key, depths.len());
        Ok(())
    }

    /// Merge a full line of auto-picked samples
    ///
    /// Manual and interpolated samples are never overwritten. Returns the
    /// number of samples changed.
    pub fn merge_auto(&mut self, key: &PickKey, samples: &[PickSample]) -> Result<usize> {
        let expected = self.expected_len(key)?;
        if samples.len() != expected {
            return Err(ValidationError::Misaligned {
                key: key.to_string(),
                expected,
                found: samples.len(),
            }
            .into());
        }
        self.merge_auto_at(key, 0, samples)
    }

    /// Merge auto-picked samples for traces starting at `start`
    pub fn merge_auto_at(&mut self, key: &PickKey, start: usize, samples: &[PickSample]) -> Result<usize> {
        let changed = self.edit(key, |line| line.merge_auto(start, samples))?;
        log::debug!("{}: auto merge changed {} samples", key, changed);
        Ok(changed)
    }

    /// Interpolate runs of missing picks no longer than `max_gap`
    ///
    /// Returns the number of samples filled.
    pub fn interpolate_gaps(&mut self, key: &PickKey, max_gap: usize) -> Result<usize> {
        let filled = self.edit(key, |line| Ok(line.interpolate_gaps(max_gap)))?;
        if filled > 0 {
            log::info!("{}: interpolated {} samples", key, filled);
        }
        Ok(filled)
    }

    /// Lock or unlock a pick line
    pub fn set_locked(&mut self, key: &PickKey, locked: bool) -> Result<()> {
        self.ensure(key)?;
        if let Some(line) = self.lines.get_mut(key) {
            if line.is_locked() != locked {
                let previous = line.clone();
                line.set_locked(locked);
                self.record(key, previous);
            }
        }
        Ok(())
    }

    /// Record the raw detections of an auto-pick run for audit
    pub fn record_detections(&mut self, key: &PickKey, raw: Vec<Option<Detection>>) {
        self.raw.insert(key.clone(), raw);
    }

    /// Revert the last edit; returns whether there was one
    pub fn undo(&mut self) -> bool {
        self.swap_history(true)
    }

    /// Reapply the last reverted edit; returns whether there was one
    pub fn redo(&mut self) -> bool {
        self.swap_history(false)
    }

    fn record(&mut self, key: &PickKey, previous: PickLine) {
        push_bounded(&mut self.undo, (key.clone(), previous));
        self.redo.clear();
    }

    fn swap_history(&mut self, undo: bool) -> bool {
        let (from, to) = if undo {
            (&mut self.undo, &mut self.redo)
        } else {
            (&mut self.redo, &mut self.undo)
        };
        match from.pop_back() {
            Some((key, line)) => {
                if let Some(current) = self.lines.insert(key.clone(), line) {
                    push_bounded(to, (key, current));
                }
                true
            }
            None => false,
        }
    }

    /// Apply an edit command
    pub fn apply(&mut self, edit: Edit) -> Result<()> {
        match edit {
            Edit::SetRange {
                key,
                range,
                depths,
                source,
            } => self.set_range(&key, range, &depths, source),
            Edit::MergeAuto {
                key,
                start,
                samples,
            } => self.merge_auto_at(&key, start, &samples).map(|_| ()),
            Edit::InterpolateGaps { key, max_gap } => {
                self.interpolate_gaps(&key, max_gap).map(|_| ())
            }
            Edit::SetLocked { key, locked } => self.set_locked(&key, locked),
            Edit::Undo => {
                self.undo();
                Ok(())
            }
            Edit::Redo => {
                self.redo();
                Ok(())
            }
        }
    }
}

fn push_bounded<T>(stack: &mut VecDeque<T>, item: T) {
    stack.push_back(item);
    if stack.len() > HISTORY_LIMIT {
        stack.pop_front();
    }
}

fn keyed(e: ValidationError, key: &PickKey) -> ValidationError {
    match e {
        ValidationError::RangeOutOfBounds { start, end, len, .. } => ValidationError::RangeOutOfBounds {
            key: key.to_string(),
            start,
            end,
            len,
        },
        e => e,
    }
}

/// The receiving end of an edit channel, held by the manager's owner
///
/// Threads that produce edits hold a clone of the [`Sender`]; the owner
/// calls [`drain`](Self::drain) to apply them in arrival order.
pub struct EditQueue {
    rx: Receiver<Edit>,
}

impl EditQueue {
    /// Create a queue and a sender for it
    pub fn new() -> (Sender<Edit>, EditQueue) {
        let (tx, rx) = mpsc::channel();
        (tx, EditQueue { rx })
    }

    /// Apply every pending edit to `manager`
    ///
    /// A failing edit is logged and skipped; it leaves its pick line
    /// unchanged. The errors are returned in arrival order.
    pub fn drain(&self, manager: &mut PickLineManager) -> Vec<Error> {
        let mut errors = Vec::new();
        while let Ok(edit) = self.rx.try_recv() {
            if let Err(e) = manager.apply(edit) {
                log::warn!("edit rejected: {}", e);
                errors.push(e);
            }
        }
        errors
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::thread;

    fn manager() -> PickLineManager {
        PickLineManager::new(BTreeMap::from([("L1".to_string(), 5), ("L2".to_string(), 3)]))
    }

    fn bottom(line: &str) -> PickKey {
        PickKey::new(line, PickType::Bottom)
    }

    #[test]
    fn alignment_after_every_edit() {
        let mut m = manager();
        let key = bottom("L1");
        m.set_range(&key, 0..2, &[Some(1.0), Some(2.0)], Source::Manual).unwrap();
        assert!(m.set_range(&key, 3..7, &[None; 4], Source::Manual).is_err());
        assert!(m.merge_auto(&key, &[PickSample::unset(); 4]).is_err());
        m.interpolate_gaps(&key, 3).unwrap();
        for (k, line) in m.iter() {
            assert_eq!(Some(line.len()), m.trace_count(&k.line));
        }
    }

    #[test]
    fn unknown_line() {
        let mut m = manager();
        let err = m.set_range(&bottom("L9"), 0..0, &[], Source::Manual).unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::UnknownLine(_))));
    }

    #[test]
    fn insert_checks_length() {
        let mut m = manager();
        assert!(m.insert(bottom("L2"), PickLine::new(4)).is_err());
        assert!(m.insert(bottom("L2"), PickLine::new(3)).is_ok());
    }

    #[test]
    fn manual_survives_auto_rerun() {
        let mut m = manager();
        let key = bottom("L2");
        m.set_range(&key, 1..2, &[Some(7.5)], Source::Manual).unwrap();
        for depth in [1.0, 2.0] {
            m.merge_auto(&key, &[PickSample::auto(Some(depth), Some(0.9)); 3]).unwrap();
            assert_eq!(m.get(&key).unwrap().get(1), Some(&PickSample::manual(Some(7.5))));
            assert_eq!(m.get(&key).unwrap().get(0).unwrap().depth, Some(depth));
        }
    }

    #[test]
    fn locked_line_rejects_edits() {
        let mut m = manager();
        let key = bottom("L2");
        m.set_locked(&key, true).unwrap();
        let err = m.set_range(&key, 0..1, &[Some(1.0)], Source::Manual).unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::Locked(_))));
        m.set_locked(&key, false).unwrap();
        assert!(m.set_range(&key, 0..1, &[Some(1.0)], Source::Manual).is_ok());
    }

    #[test]
    fn undo_redo() {
        let mut m = manager();
        let key = bottom("L2");
        m.set_range(&key, 0..3, &[Some(1.0); 3], Source::Manual).unwrap();
        m.set_range(&key, 0..1, &[None], Source::Manual).unwrap();
        assert!(m.undo());
        assert_eq!(m.depths("L2", PickType::Bottom).unwrap(), vec![Some(1.0); 3]);
        assert!(m.redo());
        assert_eq!(
            m.depths("L2", PickType::Bottom).unwrap(),
            vec![None, Some(1.0), Some(1.0)]
        );
        assert!(m.undo());
        assert!(m.undo());
        assert_eq!(m.depths("L2", PickType::Bottom).unwrap(), vec![None; 3]);
        assert!(!m.undo());
    }

    #[test]
    fn history_is_bounded() {
        let mut m = manager();
        let key = bottom("L2");
        for i in 0..HISTORY_LIMIT + 10 {
            m.set_range(&key, 0..1, &[Some(i as f64)], Source::Manual).unwrap();
        }
        let mut undone = 0;
        while m.undo() {
            undone += 1;
        }
        assert_eq!(undone, HISTORY_LIMIT);
        assert_eq!(m.get(&key).unwrap().get(0).unwrap().depth, Some(9.0));
    }

    #[test]
    fn insert_all_is_all_or_nothing() {
        let mut m = manager();
        let err = m
            .insert_all(vec![(bottom("L1"), PickLine::new(5)), (bottom("L2"), PickLine::new(4))])
            .unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::Misaligned { .. })));
        assert_eq!(m.iter().count(), 0);
    }

    #[test]
    fn failed_edit_leaves_no_history() {
        let mut m = manager();
        let key = bottom("L2");
        assert!(m.set_range(&key, 0..1, &[None, None], Source::Manual).is_err());
        assert!(!m.undo());
    }

    #[test]
    fn edits_from_another_thread() {
        let mut m = manager();
        let (tx, queue) = EditQueue::new();
        let handle = thread::spawn(move || {
            tx.send(Edit::SetRange {
                key: bottom("L1"),
                range: 0..1,
                depths: vec![Some(4.0)],
                source: Source::Manual,
            })
            .unwrap();
            tx.send(Edit::SetRange {
                key: bottom("L1"),
                range: 4..6,
                depths: vec![Some(4.0); 2],
                source: Source::Manual,
            })
            .unwrap();
        });
        handle.join().unwrap();
        let errors = queue.drain(&mut m);
        assert_eq!(errors.len(), 1);
        assert_eq!(m.get(&bottom("L1")).unwrap().get(0).unwrap().depth, Some(4.0));
        assert_eq!(m.get(&bottom("L1")).unwrap().len(), 5);
    }
}
