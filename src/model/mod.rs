//! The picking data model
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

/// A navigation position in projected map coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[derive(Deserialize, Serialize)]
pub struct Position {
    /// Easting
    pub x: f64,
    /// Northing
    pub y: f64,
}

/// A single acoustic ping on one frequency channel
///
/// Samples are evenly spaced along the depth axis. The depth of sample `i`
/// is `draft + i * resolution - heave`.
#[derive(Debug, Clone, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Trace {
    /// The survey line this trace belongs to
    pub line: String,
    /// Position of the trace within its line, starting at 0
    pub index: usize,
    /// The time at which the ping was acquired
    #[serde(with = "time::serde::timestamp")]
    pub timestamp: OffsetDateTime,
    /// Frequency channel in kHz
    pub frequency: u32,
    /// Where the ping was acquired
    pub position: Position,
    /// Depth of the transducer below the water surface
    pub draft: f64,
    /// Vertical displacement of the vessel, positive up
    pub heave: f64,
    /// Depth spanned by one sample
    pub resolution: f64,
    /// Amplitude samples, shallowest first
    pub amplitudes: Vec<f32>,
}

impl Trace {
    /// The depth of sample `i`
    pub fn depth_at(&self, i: usize) -> f64 {
        self.draft + i as f64 * self.resolution - self.heave
    }

    /// The fractional sample index at `depth`
    pub fn sample_at(&self, depth: f64) -> f64 {
        (depth - self.draft + self.heave) / self.resolution
    }
}

/// The reflector a pick line tracks
///
/// The derived ordering is depth order: the bottom lies above every
/// sediment horizon, which lie above the pre-impoundment surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Deserialize, Serialize)]
#[serde(into = "String", try_from = "String")]
pub enum PickType {
    /// The current water bottom
    Bottom,
    /// The k-th sediment horizon below the bottom, starting at 1
    Horizon(u8),
    /// The lakebed surface before impoundment
    PreImpoundment,
}

impl fmt::Display for PickType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PickType::Bottom => write!(f, "bottom"),
            PickType::Horizon(k) => write!(f, "horizon_{}", k),
            PickType::PreImpoundment => write!(f, "pre_impoundment"),
        }
    }
}

impl FromStr for PickType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bottom" => Ok(PickType::Bottom),
            "pre_impoundment" | "pre" => Ok(PickType::PreImpoundment),
            _ => s
                .strip_prefix("horizon_")
                .and_then(|k| k.parse::<u8>().ok())
                .filter(|k| *k > 0)
                .map(PickType::Horizon)
                .ok_or_else(|| ValidationError::UnknownPickType(s.to_string())),
        }
    }
}

impl From<PickType> for String {
    fn from(p: PickType) -> String {
        p.to_string()
    }
}

impl TryFrom<String> for PickType {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Provenance of a pick sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[derive(Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Never picked
    #[default]
    Unset,
    /// Proposed by the auto-picker
    Auto,
    /// Entered by the operator
    Manual,
    /// Filled by gap interpolation
    Interpolated,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Source::Unset => "unset",
            Source::Auto => "auto",
            Source::Manual => "manual",
            Source::Interpolated => "interpolated",
        };
        f.write_str(s)
    }
}

impl FromStr for Source {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unset" => Ok(Source::Unset),
            "auto" => Ok(Source::Auto),
            "manual" => Ok(Source::Manual),
            "interpolated" => Ok(Source::Interpolated),
            _ => Err(ValidationError::UnknownSource(s.to_string())),
        }
    }
}

/// One depth value of a pick line
///
/// `depth` is `None` for "no pick". The source records how the sample
/// got its current value, including an explicit "no pick" entered by the
/// operator (`Source::Manual` with no depth).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[derive(Deserialize, Serialize)]
pub struct PickSample {
    /// Picked depth, or `None` for no pick
    pub depth: Option<f64>,
    /// Provenance
    pub source: Source,
    /// Auto-picker confidence in (0, 1]
    pub confidence: Option<f64>,
}

impl PickSample {
    /// A sample that has never been picked
    pub fn unset() -> Self {
        Self::default()
    }

    /// An auto-picked sample
    pub fn auto(depth: Option<f64>, confidence: Option<f64>) -> Self {
        PickSample {
            depth,
            source: Source::Auto,
            confidence: depth.and(confidence),
        }
    }

    /// A sample entered by the operator
    pub fn manual(depth: Option<f64>) -> Self {
        PickSample {
            depth,
            source: Source::Manual,
            confidence: None,
        }
    }

    /// A sample filled by interpolation
    pub fn interpolated(depth: f64) -> Self {
        PickSample {
            depth: Some(depth),
            source: Source::Interpolated,
            confidence: None,
        }
    }

    /// Whether the sample holds a depth
    pub fn is_pick(&self) -> bool {
        self.depth.is_some()
    }
}

/// Identifies one pick line: a survey line and a pick type
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PickKey {
    /// Survey line name
    pub line: String,
    /// Pick type
    pub pick_type: PickType,
}

impl PickKey {
    /// Create a key
    pub fn new(line: impl Into<String>, pick_type: PickType) -> Self {
        PickKey {
            line: line.into(),
            pick_type,
        }
    }
}

impl fmt::Display for PickKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.line, self.pick_type)
    }
}
