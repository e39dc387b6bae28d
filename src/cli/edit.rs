//! Manual edits of pick lines
use super::Survey;
use crate::error::Result;
use crate::model::{PickKey, PickType, Source};
use std::ops::Range;
use std::path::Path;

/// Set a range of traces by hand and save
///
/// Without a depth the traces are marked "no pick", which later auto-pick
/// runs leave alone. With `clear` they go back to unpicked.
pub fn edit<P: AsRef<Path>>(
    dir: P,
    line: &str,
    pick_type: PickType,
    range: Range<usize>,
    depth: Option<f64>,
    clear: bool,
) -> Result<()> {
    let mut survey = Survey::open(dir)?;
    survey.config.check_pick_type(pick_type)?;
    let key = PickKey::new(line, pick_type);
    let source = if clear { Source::Unset } else { Source::Manual };
    let depths = vec![depth; range.len()];
    survey.manager.set_range(&key, range.clone(), &depths, source)?;
    survey.save()?;
    println!("{}: set traces {}..{}", key, range.start, range.end);
    Ok(())
}

/// Lock or unlock a pick line and save
pub fn lock<P: AsRef<Path>>(dir: P, line: &str, pick_type: PickType, locked: bool) -> Result<()> {
    let mut survey = Survey::open(dir)?;
    survey.config.check_pick_type(pick_type)?;
    let key = PickKey::new(line, pick_type);
    survey.manager.set_locked(&key, locked)?;
    survey.save()?;
    println!("{}: {}", key, if locked { "locked" } else { "unlocked" });
    Ok(())
}
