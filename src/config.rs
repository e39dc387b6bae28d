//! Survey configuration
use crate::error::{Result, ValidationError};
use crate::model::PickType;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file inside a survey directory
pub const CONFIG_FILE: &str = "survey.json";

/// Parameters of the threshold picker
#[derive(Debug, Clone, PartialEq)]
#[derive(Deserialize, Serialize)]
#[serde(default)]
pub struct PickerConfig {
    /// Number of samples in the trailing noise-floor window
    pub noise_window: usize,
    /// Threshold above the noise floor, in units of the noise spread
    pub snr: f64,
    /// Ignore returns shallower than this depth
    pub blank_depth: f64,
    /// How far from the previous trace's depth to look first
    pub search_radius: f64,
    /// Width of the median filter applied across traces (odd)
    pub median_window: usize,
    /// Minimum depth between a horizon and the reflector above it
    pub horizon_separation: f64,
}

impl Default for PickerConfig {
    fn default() -> Self {
        PickerConfig {
            noise_window: 16,
            snr: 6.0,
            blank_depth: 0.0,
            search_radius: 0.5,
            median_window: 5,
            horizon_separation: 0.1,
        }
    }
}

/// Configuration of one survey
#[derive(Debug, Clone, PartialEq)]
#[derive(Deserialize, Serialize)]
#[serde(default)]
pub struct SurveyConfig {
    /// Number of sediment horizons picked between bottom and pre-impoundment
    pub horizons: u8,
    /// Channel used for the bottom pick, in kHz
    pub bottom_frequency: u32,
    /// Channel used for sub-bottom picks, in kHz
    pub horizon_frequency: u32,
    /// Auto-picker parameters
    pub picker: PickerConfig,
    /// Longest run of missing picks filled by interpolation
    pub max_gap: usize,
    /// Delimiter of the export file
    pub delimiter: char,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        SurveyConfig {
            horizons: 0,
            bottom_frequency: 200,
            horizon_frequency: 24,
            picker: PickerConfig::default(),
            max_gap: 5,
            delimiter: ',',
        }
    }
}

impl SurveyConfig {
    /// Load `survey.json` from a survey directory
    ///
    /// A missing file yields the default configuration.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let path = dir.as_ref().join(CONFIG_FILE);
        if !path.exists() {
            log::debug!("no {} in {}, using defaults", CONFIG_FILE, dir.as_ref().display());
            return Ok(SurveyConfig::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// The pick types of this survey, in depth order
    pub fn pick_types(&self) -> Vec<PickType> {
        std::iter::once(PickType::Bottom)
            .chain((1..=self.horizons).map(PickType::Horizon))
            .chain(std::iter::once(PickType::PreImpoundment))
            .collect()
    }

    /// Fail unless `pick_type` is one of [`SurveyConfig::pick_types`]
    pub fn check_pick_type(&self, pick_type: PickType) -> std::result::Result<(), ValidationError> {
        if self.pick_types().contains(&pick_type) {
            Ok(())
        } else {
            Err(ValidationError::PickTypeNotConfigured(pick_type.to_string()))
        }
    }

    /// The export delimiter as a byte
    pub fn delimiter_byte(&self) -> std::result::Result<u8, ValidationError> {
        if self.delimiter.is_ascii() {
            Ok(self.delimiter as u8)
        } else {
            Err(ValidationError::Delimiter(self.delimiter))
        }
    }

    /// The channel an auto-pick of `pick_type` reads
    pub fn frequency_for(&self, pick_type: PickType) -> u32 {
        match pick_type {
            PickType::Bottom => self.bottom_frequency,
            _ => self.horizon_frequency,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn closed_pick_type_set() {
        let config = SurveyConfig {
            horizons: 2,
            ..Default::default()
        };
        assert_eq!(
            config.pick_types(),
            vec![
                PickType::Bottom,
                PickType::Horizon(1),
                PickType::Horizon(2),
                PickType::PreImpoundment
            ]
        );
        assert_eq!(config.check_pick_type(PickType::Horizon(2)), Ok(()));
        assert_eq!(config.check_pick_type(PickType::PreImpoundment), Ok(()));
        assert_eq!(
            config.check_pick_type(PickType::Horizon(3)),
            Err(ValidationError::PickTypeNotConfigured("horizon_3".to_string()))
        );
        assert!(SurveyConfig::default().check_pick_type(PickType::Horizon(1)).is_err());
    }

    #[test]
    fn partial_json() {
        let config: SurveyConfig =
            serde_json::from_str(r#"{"horizons": 1, "picker": {"snr": 3.0}}"#).unwrap();
        assert_eq!(config.horizons, 1);
        assert_eq!(config.picker.snr, 3.0);
        assert_eq!(config.picker.median_window, 5);
        assert_eq!(config.max_gap, 5);
    }
}
