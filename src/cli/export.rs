//! Export survey points
use super::Survey;
use crate::error::{Result, ValidationError};
use crate::export::{self as points, ExportMode};
use std::path::Path;

/// Correct the saved picks with the saved tide curve and write the points
pub fn export<P: AsRef<Path>, Q: AsRef<Path>>(dir: P, output: Q, no_pre: bool) -> Result<()> {
    let survey = Survey::open(dir)?;
    let tide = survey
        .project
        .load_tide()?
        .ok_or_else(|| ValidationError::NoTide(survey.project.dir().display().to_string()))?;
    let mode = if no_pre {
        ExportMode::NoPre
    } else {
        ExportMode::Full
    };
    let n = points::export(
        output.as_ref(),
        &survey.store,
        &survey.manager,
        &tide,
        mode,
        survey.config.delimiter_byte()?,
    )?;
    println!("{} survey points written to {}", n, output.as_ref().display());
    Ok(())
}
