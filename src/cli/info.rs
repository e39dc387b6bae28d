//! Print info about a survey
use super::Survey;
use crate::error::Result;
use crate::model::Source;
use std::io::{stdout, Write};
use std::path::Path;

/// Print the lines, pick lines and tide curve of a survey
pub fn info<P: AsRef<Path>>(dir: P) -> Result<()> {
    let survey = Survey::open(dir.as_ref())?;
    let mut out = stdout().lock();

    writeln!(out, "Survey: {}", dir.as_ref().display())?;
    writeln!(out, "Lines: {}", survey.store.len())?;
    for line in survey.store.iter() {
        let channels: Vec<String> = line.frequencies().map(|f| format!("{} kHz", f)).collect();
        write!(out, "\t{}: {} traces, {}", line.name(), line.trace_count(), channels.join(", "))?;
        let first = line.fix(0);
        let last = line.fix(line.trace_count().saturating_sub(1));
        if let (Some((_, start)), Some((_, end))) = (first, last) {
            write!(out, ", {} to {}", start, end)?;
        }
        writeln!(out)?;
    }

    let types: Vec<String> = survey
        .config
        .pick_types()
        .iter()
        .map(|p| p.to_string())
        .collect();
    writeln!(out, "Pick types: {}", types.join(", "))?;

    writeln!(out, "Pick lines:")?;
    for (key, line) in survey.manager.iter() {
        let count = |source: Source| {
            line.samples()
                .iter()
                .filter(|s| s.is_pick() && s.source == source)
                .count()
        };
        let picked = line.samples().iter().filter(|s| s.is_pick()).count();
        writeln!(
            out,
            "\t{}: {} of {} picked (auto {}, manual {}, interpolated {}){}",
            key,
            picked,
            line.len(),
            count(Source::Auto),
            count(Source::Manual),
            count(Source::Interpolated),
            if line.is_locked() { ", locked" } else { "" }
        )?;
    }

    match survey.project.load_tide()? {
        Some(tide) => writeln!(
            out,
            "Tide: {} records from {} to {}",
            tide.records().len(),
            tide.start(),
            tide.end()
        )?,
        None => writeln!(out, "Tide: none")?,
    }

    Ok(())
}
