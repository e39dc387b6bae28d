//! Import a tide file
use crate::error::Result;
use crate::project::Project;
use crate::tide::TideCurve;
use std::path::Path;

/// Validate a tide file and save it as the project's tide curve
///
/// The previous curve is replaced as a whole. An invalid file leaves it
/// untouched.
pub fn tide<P: AsRef<Path>, Q: AsRef<Path>>(dir: P, file: Q) -> Result<()> {
    let curve = TideCurve::open(file)?;
    Project::new(dir).save_tide(&curve)?;
    println!(
        "{} tide records from {} to {}",
        curve.records().len(),
        curve.start(),
        curve.end()
    );
    Ok(())
}
