//! Exporting corrected survey points
use crate::correction::correct_line;
use crate::error::Result;
use crate::model::{PickKey, PickType, Position};
use crate::picks::PickLineManager;
use crate::store::TraceStore;
use crate::tide::TideCurve;
use std::io::Write;
use std::path::Path;

/// Which columns an export carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMode {
    /// Position, bottom elevation, pre-impoundment elevation and thickness
    Full,
    /// Position and bottom elevation only
    NoPre,
}

/// One exported survey point
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyPoint {
    /// Survey line
    pub line: String,
    /// Trace index within the line
    pub index: usize,
    /// Trace position
    pub position: Position,
    /// Corrected bottom elevation
    pub bottom_elevation: Option<f64>,
    /// Corrected pre-impoundment elevation
    pub pre_impoundment_elevation: Option<f64>,
    /// Sediment thickness
    pub thickness: Option<f64>,
}

/// Compute the survey points of every line
///
/// There is one point per trace with a bottom pick, ordered by line name
/// and then trace index. Corrections are recomputed on every call from
/// the current picks and tide curve.
pub fn survey_points(
    store: &TraceStore,
    manager: &PickLineManager,
    tide: &TideCurve,
) -> Result<Vec<SurveyPoint>> {
    let mut points = Vec::new();
    for line in store.iter() {
        let bottom = match manager.get(&PickKey::new(line.name(), PickType::Bottom)) {
            Some(bottom) => bottom,
            None => {
                log::debug!("{}: no bottom picks, skipped", line.name());
                continue;
            }
        };
        let pre = manager.get(&PickKey::new(line.name(), PickType::PreImpoundment));
        let corrected = correct_line(line, bottom, pre, tide)?;
        points.extend(corrected.into_iter().filter(|c| c.bottom_picked).map(|c| SurveyPoint {
            line: line.name().to_string(),
            index: c.index,
            position: c.position,
            bottom_elevation: c.bottom_elevation,
            pre_impoundment_elevation: c.pre_impoundment_elevation,
            thickness: c.thickness,
        }));
    }
    Ok(points)
}

fn field(v: Option<f64>) -> String {
    v.map(|v| format!("{:.3}", v)).unwrap_or_default()
}

/// Write survey points as delimited text with a header row
///
/// Missing values are written as empty fields.
pub fn write_points<W: Write>(writer: W, points: &[SurveyPoint], mode: ExportMode, delimiter: u8) -> Result<()> {
    let mut csv = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);

    let mut header = vec!["x", "y", "bottom_elevation"];
    if mode == ExportMode::Full {
        header.extend(["pre_impoundment_elevation", "sediment_thickness"]);
    }
    csv.write_record(&header)?;

    for p in points {
        let mut row = vec![
            format!("{:.3}", p.position.x),
            format!("{:.3}", p.position.y),
            field(p.bottom_elevation),
        ];
        if mode == ExportMode::Full {
            row.push(field(p.pre_impoundment_elevation));
            row.push(field(p.thickness));
        }
        csv.write_record(&row)?;
    }
    csv.flush()?;
    Ok(())
}

/// Export every survey point to a file
///
/// Returns the number of points written.
pub fn export<P: AsRef<Path>>(
    path: P,
    store: &TraceStore,
    manager: &PickLineManager,
    tide: &TideCurve,
    mode: ExportMode,
    delimiter: u8,
) -> Result<usize> {
    let points = survey_points(store, manager, tide)?;
    write_points(std::fs::File::create(path.as_ref())?, &points, mode, delimiter)?;
    log::info!("exported {} survey points to {}", points.len(), path.as_ref().display());
    Ok(points.len())
}

#[cfg(test)]
mod test {
    use super::*;

    fn point(bottom: Option<f64>, pre: Option<f64>, thickness: Option<f64>) -> SurveyPoint {
        SurveyPoint {
            line: "L1".to_string(),
            index: 0,
            position: Position { x: 1.0, y: 2.5 },
            bottom_elevation: bottom,
            pre_impoundment_elevation: pre,
            thickness,
        }
    }

    fn render(points: &[SurveyPoint], mode: ExportMode, delimiter: u8) -> String {
        let mut out = Vec::new();
        write_points(&mut out, points, mode, delimiter).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn full_mode_empty_fields() {
        let s = render(&[point(Some(80.4), None, None)], ExportMode::Full, b',');
        assert_eq!(
            s,
            "x,y,bottom_elevation,pre_impoundment_elevation,sediment_thickness\n1.000,2.500,80.400,,\n"
        );
    }

    #[test]
    fn no_pre_mode_omits_columns() {
        let s = render(&[point(Some(80.0), Some(77.0), Some(3.0))], ExportMode::NoPre, b'\t');
        assert_eq!(s, "x\ty\tbottom_elevation\n1.000\t2.500\t80.000\n");
    }
}
