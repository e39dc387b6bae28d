//! Tide and pre-impoundment correction of picked depths
use crate::error::{Result, ValidationError};
use crate::model::Position;
use crate::picks::PickLine;
use crate::store::SurveyLine;
use crate::tide::TideCurve;
use time::OffsetDateTime;

/// Corrected values for one trace
///
/// Each value is independently absent when its pick is missing or the
/// trace lies outside the tide curve.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectedTrace {
    /// Trace index within the line
    pub index: usize,
    /// Trace position
    pub position: Position,
    /// Acquisition time
    pub timestamp: OffsetDateTime,
    /// Whether the bottom is picked at this trace
    pub bottom_picked: bool,
    /// Elevation of the current bottom
    pub bottom_elevation: Option<f64>,
    /// Elevation of the pre-impoundment surface
    pub pre_impoundment_elevation: Option<f64>,
    /// Sediment thickness, never negative
    pub thickness: Option<f64>,
    /// The pre-impoundment surface was above the bottom and the thickness
    /// was clipped to zero
    pub thickness_clipped: bool,
}

/// Water-surface elevation at each trace of a line
///
/// Traces outside the tide curve get `None`. Each contiguous run of such
/// traces is logged once.
pub fn tide_at_traces(line: &SurveyLine, tide: &TideCurve) -> Vec<Option<f64>> {
    let mut run: Option<(usize, OffsetDateTime)> = None;
    let flush = |run: &mut Option<(usize, OffsetDateTime)>, end: usize| {
        if let Some((start, t)) = run.take() {
            log::warn!(
                "{}: traces {}..{} from {} outside tide coverage {}..={}, left uncorrected",
                line.name(),
                start,
                end,
                t,
                tide.start(),
                tide.end()
            );
        }
    };

    let n = line.trace_count();
    let elevations = (0..n)
        .map(|i| {
            let (_, t) = line.fix(i)?;
            match tide.elevation_at(t) {
                Ok(e) => {
                    flush(&mut run, i);
                    Some(e)
                }
                Err(_) => {
                    run.get_or_insert((i, t));
                    None
                }
            }
        })
        .collect();
    flush(&mut run, n);
    elevations
}

fn check_alignment(line: &SurveyLine, picks: &PickLine, what: &str) -> Result<()> {
    if picks.len() != line.trace_count() {
        return Err(ValidationError::Misaligned {
            key: format!("{}/{}", line.name(), what),
            expected: line.trace_count(),
            found: picks.len(),
        }
        .into());
    }
    Ok(())
}

fn elevations(picks: &PickLine, surface: &[Option<f64>]) -> Vec<Option<f64>> {
    picks
        .samples()
        .iter()
        .zip(surface)
        .map(|(s, w)| Some(w.as_ref()? - s.depth?))
        .collect()
}

/// Corrected elevation of every sample of a pick line
///
/// Works for the bottom and for any sub-bottom pick line.
pub fn corrected_elevations(line: &SurveyLine, picks: &PickLine, tide: &TideCurve) -> Result<Vec<Option<f64>>> {
    check_alignment(line, picks, "picks")?;
    Ok(elevations(picks, &tide_at_traces(line, tide)))
}

/// Correct a line's bottom and, when given, its pre-impoundment surface
///
/// Sediment thickness is the bottom elevation minus the pre-impoundment
/// elevation. Where the pre-impoundment surface is above the bottom the
/// thickness is zero and `thickness_clipped` is set.
pub fn correct_line(
    line: &SurveyLine,
    bottom: &PickLine,
    pre_impoundment: Option<&PickLine>,
    tide: &TideCurve,
) -> Result<Vec<CorrectedTrace>> {
    check_alignment(line, bottom, "bottom")?;
    if let Some(pre) = pre_impoundment {
        check_alignment(line, pre, "pre_impoundment")?;
    }

    let surface = tide_at_traces(line, tide);
    let bottom_elevations = elevations(bottom, &surface);
    let pre_elevations = pre_impoundment.map(|pre| elevations(pre, &surface));

    let mut clipped = 0;
    let corrected = (0..line.trace_count())
        .map(|i| -> Result<CorrectedTrace> {
            let (position, timestamp) = line.fix(i).ok_or_else(|| ValidationError::Misaligned {
                key: line.name().to_string(),
                expected: line.trace_count(),
                found: i,
            })?;
            let bottom_elevation = bottom_elevations[i];
            let pre_impoundment_elevation = pre_elevations.as_ref().and_then(|p| p[i]);
            let raw_thickness = bottom_elevation
                .zip(pre_impoundment_elevation)
                .map(|(b, p)| b - p);
            let thickness_clipped = raw_thickness.map_or(false, |t| t < 0.0);
            if thickness_clipped {
                clipped += 1;
            }
            Ok(CorrectedTrace {
                index: i,
                position,
                timestamp,
                bottom_picked: bottom.samples()[i].is_pick(),
                bottom_elevation,
                pre_impoundment_elevation,
                thickness: raw_thickness.map(|t| t.max(0.0)),
                thickness_clipped,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if clipped > 0 {
        log::warn!(
            "{}: pre-impoundment surface above bottom at {} traces, thickness clipped to zero",
            line.name(),
            clipped
        );
    }
    Ok(corrected)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::{PickSample, Source, Trace};

    fn line(timestamps: &[i64]) -> SurveyLine {
        let traces = timestamps
            .iter()
            .enumerate()
            .map(|(i, t)| Trace {
                line: "L1".to_string(),
                index: i,
                timestamp: OffsetDateTime::from_unix_timestamp(*t).unwrap(),
                frequency: 200,
                position: Position {
                    x: i as f64,
                    y: 2.0 * i as f64,
                },
                draft: 0.0,
                heave: 0.0,
                resolution: 0.1,
                amplitudes: vec![],
            })
            .collect();
        SurveyLine::new("L1", traces).unwrap()
    }

    fn picks(depths: &[Option<f64>]) -> PickLine {
        PickLine::from_samples(depths.iter().map(|d| PickSample::manual(*d)).collect(), false)
    }

    fn tide() -> TideCurve {
        TideCurve::new(vec![
            (OffsetDateTime::from_unix_timestamp(0).unwrap(), 100.0),
            (OffsetDateTime::from_unix_timestamp(10).unwrap(), 102.0),
        ])
        .unwrap()
    }

    #[test]
    fn tide_minus_depth() {
        let l = line(&[0, 2, 4, 6, 8]);
        let e = corrected_elevations(&l, &picks(&[Some(20.0); 5]), &tide()).unwrap();
        let expected = [80.0, 80.4, 80.8, 81.2, 81.6];
        for (e, x) in e.iter().zip(expected) {
            assert!((e.unwrap() - x).abs() < 1e-9);
        }
    }

    #[test]
    fn outside_tide_is_null() {
        let l = line(&[-5, 0, 12, 13, 5]);
        let e = corrected_elevations(&l, &picks(&[Some(20.0); 5]), &tide()).unwrap();
        assert_eq!(e[0], None);
        assert_eq!(e[1], Some(80.0));
        assert_eq!(e[2], None);
        assert_eq!(e[3], None);
        assert_eq!(e[4], Some(81.0));
    }

    #[test]
    fn thickness_and_clipping() {
        let l = line(&[0, 0, 0, 0]);
        let bottom = picks(&[Some(20.0), Some(20.0), None, Some(20.0)]);
        let pre = picks(&[Some(23.5), Some(19.0), Some(25.0), None]);
        let c = correct_line(&l, &bottom, Some(&pre), &tide()).unwrap();
        assert_eq!(c[0].thickness, Some(3.5));
        assert!(!c[0].thickness_clipped);
        assert_eq!(c[1].thickness, Some(0.0));
        assert!(c[1].thickness_clipped);
        assert_eq!(c[2].bottom_elevation, None);
        assert_eq!(c[2].pre_impoundment_elevation, Some(75.0));
        assert_eq!(c[2].thickness, None);
        assert_eq!(c[3].thickness, None);
        assert!(c.iter().filter_map(|c| c.thickness).all(|t| t >= 0.0));
    }

    #[test]
    fn misaligned_picks() {
        let l = line(&[0, 1]);
        let mut p = PickLine::new(3);
        p.set_range(0..1, &[Some(1.0)], Source::Manual).unwrap();
        assert!(corrected_elevations(&l, &p, &tide()).is_err());
        assert!(correct_line(&l, &picks(&[None, None]), Some(&p), &tide()).is_err());
    }
}
