//! Tide curves: water-surface elevation through time
use crate::error::{FetchError, RangeError, Result, ValidationError};
use std::io::Read;
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Water-surface elevation sampled at strictly increasing times
#[derive(Debug, Clone, PartialEq)]
pub struct TideCurve {
    records: Vec<(OffsetDateTime, f64)>,
}

impl TideCurve {
    /// Build a curve from `(timestamp, elevation)` records
    ///
    /// # Errors
    ///
    /// Fails when there are no records or the timestamps are not strictly
    /// increasing. Rows in errors are one-based.
    pub fn new(records: Vec<(OffsetDateTime, f64)>) -> std::result::Result<Self, ValidationError> {
        if records.is_empty() {
            return Err(ValidationError::EmptyTide);
        }
        if let Some(i) = records.windows(2).position(|w| w[1].0 <= w[0].0) {
            return Err(ValidationError::NonMonotonicTide { row: i + 2 });
        }
        if let Some(i) = records.iter().position(|(_, e)| !e.is_finite()) {
            return Err(ValidationError::MalformedTide {
                row: i + 1,
                reason: "elevation is not finite".to_string(),
            });
        }
        Ok(TideCurve { records })
    }

    /// Read a tide file
    ///
    /// Each row holds a timestamp and an elevation separated by a comma.
    /// Timestamps are RFC 3339 or Unix seconds. Blank lines and lines
    /// starting with `#` are skipped.
    pub fn read<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(false)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut records = Vec::new();
        for (i, row) in csv.records().enumerate() {
            let row = row?;
            let line = row.position().map_or(i as u64 + 1, |p| p.line()) as usize;
            if row.len() != 2 {
                return Err(ValidationError::MalformedTide {
                    row: line,
                    reason: format!("expected 2 fields, found {}", row.len()),
                }
                .into());
            }
            let timestamp = parse_timestamp(&row[0]).ok_or_else(|| ValidationError::MalformedTide {
                row: line,
                reason: format!("invalid timestamp {:?}", &row[0]),
            })?;
            let elevation = row[1].parse::<f64>().map_err(|e| ValidationError::MalformedTide {
                row: line,
                reason: format!("invalid elevation {:?}: {}", &row[1], e),
            })?;
            if let Some((last, _)) = records.last() {
                if timestamp <= *last {
                    return Err(ValidationError::NonMonotonicTide { row: line }.into());
                }
            }
            records.push((timestamp, elevation));
        }

        let curve = TideCurve::new(records)?;
        log::info!(
            "read {} tide records from {} to {}",
            curve.records.len(),
            curve.start(),
            curve.end()
        );
        Ok(curve)
    }

    /// Read a tide file from disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::read(std::fs::File::open(path)?)
    }

    /// Build a curve from a gauge
    ///
    /// The gauge is queried once; a failure is reported as is, with no
    /// retry. The series it hands off is validated like a tide file.
    pub fn from_gauge<G: TideGauge + ?Sized>(
        gauge: &G,
        gauge_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Self> {
        let records = gauge.fetch(gauge_id, start, end)?;
        log::info!("gauge {} returned {} records", gauge_id, records.len());
        Ok(TideCurve::new(records)?)
    }

    /// The records of the curve
    pub fn records(&self) -> &[(OffsetDateTime, f64)] {
        &self.records
    }

    /// First timestamp covered
    pub fn start(&self) -> OffsetDateTime {
        self.records[0].0
    }

    /// Last timestamp covered
    pub fn end(&self) -> OffsetDateTime {
        self.records[self.records.len() - 1].0
    }

    /// Elevation at `t`, linearly interpolated between records
    ///
    /// # Errors
    ///
    /// Timestamps outside the curve are a [`RangeError`]; the curve is
    /// never extrapolated.
    pub fn elevation_at(&self, t: OffsetDateTime) -> std::result::Result<f64, RangeError> {
        if t < self.start() || t > self.end() {
            return Err(RangeError {
                timestamp: t,
                start: self.start(),
                end: self.end(),
            });
        }
        let i = self.records.partition_point(|(ts, _)| *ts <= t);
        if i == self.records.len() {
            return Ok(self.records[i - 1].1);
        }
        let (t0, e0) = self.records[i - 1];
        let (t1, e1) = self.records[i];
        let frac = (t - t0).as_seconds_f64() / (t1 - t0).as_seconds_f64();
        Ok(e0 + frac * (e1 - e0))
    }
}

fn parse_timestamp(s: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(s, &Rfc3339).ok().or_else(|| {
        let secs = s.parse::<f64>().ok().filter(|v| v.is_finite())?;
        OffsetDateTime::from_unix_timestamp_nanos((secs * 1e9).round() as i128).ok()
    })
}

/// A source of tide-gauge observations
///
/// Implementations talk to the network; the engine only calls `fetch` and
/// works with what it hands back.
pub trait TideGauge {
    /// Fetch `(timestamp, elevation)` observations between `start` and `end`
    fn fetch(
        &self,
        gauge_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> std::result::Result<Vec<(OffsetDateTime, f64)>, FetchError>;
}
