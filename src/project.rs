//! Saving and reopening pick state
//!
//! A project lives in the `project` directory of a survey. Pick lines are
//! stored in `picks.avro`, one record per pick line, and the tide curve in
//! `tide.avro`. Absent depths and confidences are stored as NaN so that the
//! provenance of every sample survives a round trip.
use crate::error::{Result, ValidationError};
use crate::model::{PickKey, PickSample, PickType, Source};
use crate::picks::{PickLine, PickLineManager};
use crate::records::{self, PICK_LINE_SCHEMA, TIDE_SCHEMA};
use crate::tide::TideCurve;
use apache_avro::{types::Record, types::Value, Reader, Schema, Writer};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Directory inside a survey holding the saved project
pub const PROJECT_DIR: &str = "project";

const PICKS_FILE: &str = "picks.avro";
const TIDE_FILE: &str = "tide.avro";

/// Paths of the files of a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    dir: PathBuf,
}

impl Project {
    /// The project of the survey in `survey_dir`
    pub fn new<P: AsRef<Path>>(survey_dir: P) -> Self {
        Project {
            dir: survey_dir.as_ref().join(PROJECT_DIR),
        }
    }

    /// The project directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the pick file
    pub fn picks_path(&self) -> PathBuf {
        self.dir.join(PICKS_FILE)
    }

    /// Path of the tide file
    pub fn tide_path(&self) -> PathBuf {
        self.dir.join(TIDE_FILE)
    }

    /// Save every pick line of `manager`
    pub fn save_picks(&self, manager: &PickLineManager) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let lines: Vec<(PickKey, PickLine)> = manager
            .iter()
            .map(|(k, l)| (k.clone(), l.clone()))
            .collect();
        write_picks(self.picks_path(), &lines)?;
        log::info!("saved {} pick lines to {}", lines.len(), self.picks_path().display());
        Ok(())
    }

    /// Load saved pick lines into `manager`
    ///
    /// A project that was never saved loads nothing. Returns the number of
    /// pick lines loaded.
    ///
    /// # Errors
    ///
    /// Fails when a saved pick line does not match the trace count of its
    /// survey line. Nothing is loaded in that case.
    pub fn load_picks(&self, manager: &mut PickLineManager) -> Result<usize> {
        let path = self.picks_path();
        if !path.exists() {
            log::debug!("no saved picks at {}", path.display());
            return Ok(0);
        }
        let lines = read_picks(&path)?;
        let n = lines.len();
        manager.insert_all(lines)?;
        log::info!("loaded {} pick lines from {}", n, path.display());
        Ok(n)
    }

    /// Save the tide curve
    pub fn save_tide(&self, tide: &TideCurve) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        write_tide(self.tide_path(), tide)
    }

    /// Load the saved tide curve, if there is one
    pub fn load_tide(&self) -> Result<Option<TideCurve>> {
        let path = self.tide_path();
        if !path.exists() {
            return Ok(None);
        }
        read_tide(path).map(Some)
    }
}

fn sample_value(sample: &PickSample) -> Value {
    Value::Record(vec![
        ("depth".to_string(), records::from_optional(sample.depth)),
        ("source".to_string(), Value::String(sample.source.to_string())),
        ("confidence".to_string(), records::from_optional(sample.confidence)),
    ])
}

/// Write pick lines to an Avro file
pub fn write_picks<P: AsRef<Path>>(path: P, lines: &[(PickKey, PickLine)]) -> Result<()> {
    let schema = Schema::parse_str(PICK_LINE_SCHEMA)?;
    let mut writer = Writer::new(&schema, File::create(path)?);

    for (key, line) in lines {
        let mut record = Record::new(&schema).ok_or_else(|| {
            ValidationError::MalformedRecord("pick line schema is not a record".to_string())
        })?;
        record.put("line", key.line.clone());
        record.put("pick_type", key.pick_type.to_string());
        record.put("locked", line.is_locked());
        record.put(
            "samples",
            Value::Array(line.samples().iter().map(sample_value).collect()),
        );
        writer.append(record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Read pick lines from an Avro file
pub fn read_picks<P: AsRef<Path>>(path: P) -> Result<Vec<(PickKey, PickLine)>> {
    let reader = Reader::new(BufReader::new(File::open(path)?))?;
    reader
        .map(|value| -> Result<(PickKey, PickLine)> {
            let fields = records::record(value?)?;
            let pick_type: PickType = records::string(&fields, "pick_type")?.parse()?;
            let key = PickKey::new(records::string(&fields, "line")?, pick_type);
            let samples = records::array(&fields, "samples")?
                .iter()
                .map(|v| -> std::result::Result<PickSample, ValidationError> {
                    let s = records::nested(v)?;
                    let source: Source = records::string(s, "source")?.parse()?;
                    Ok(PickSample {
                        depth: records::to_optional(records::double(s, "depth")?),
                        source,
                        confidence: records::to_optional(records::double(s, "confidence")?),
                    })
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let locked = records::boolean(&fields, "locked")?;
            Ok((key, PickLine::from_samples(samples, locked)))
        })
        .collect()
}

/// Write a tide curve to an Avro file
pub fn write_tide<P: AsRef<Path>>(path: P, tide: &TideCurve) -> Result<()> {
    let schema = Schema::parse_str(TIDE_SCHEMA)?;
    let mut writer = Writer::new(&schema, File::create(path)?);

    for (timestamp, elevation) in tide.records() {
        let mut record = Record::new(&schema).ok_or_else(|| {
            ValidationError::MalformedRecord("tide schema is not a record".to_string())
        })?;
        record.put("timestamp", records::timestamp_millis(*timestamp));
        record.put("elevation", *elevation);
        writer.append(record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Read a tide curve from an Avro file
pub fn read_tide<P: AsRef<Path>>(path: P) -> Result<TideCurve> {
    let reader = Reader::new(BufReader::new(File::open(path)?))?;
    let records = reader
        .map(|value| -> Result<_> {
            let fields = records::record(value?)?;
            Ok((
                records::from_millis(records::long(&fields, "timestamp")?)?,
                records::double(&fields, "elevation")?,
            ))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(TideCurve::new(records)?)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Error;
    use std::collections::BTreeMap;
    use time::OffsetDateTime;

    fn manager() -> PickLineManager {
        PickLineManager::new(BTreeMap::from([("L1".to_string(), 4)]))
    }

    #[test]
    fn picks_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::new(dir.path());

        let mut m = manager();
        let bottom = PickKey::new("L1", PickType::Bottom);
        let horizon = PickKey::new("L1", PickType::Horizon(2));
        m.merge_auto(
            &bottom,
            &[
                PickSample::auto(Some(10.0), Some(0.75)),
                PickSample::auto(None, None),
                PickSample::auto(Some(10.4), Some(0.5)),
                PickSample::auto(Some(10.6), Some(1.0)),
            ],
        )
        .unwrap();
        m.set_range(&bottom, 3..4, &[None], Source::Manual).unwrap();
        m.interpolate_gaps(&bottom, 5).unwrap();
        m.set_range(&horizon, 0..2, &[Some(12.0), Some(12.5)], Source::Manual).unwrap();
        m.set_locked(&horizon, true).unwrap();
        project.save_picks(&m).unwrap();

        let mut reopened = manager();
        assert_eq!(project.load_picks(&mut reopened).unwrap(), 2);
        for (key, line) in m.iter() {
            assert_eq!(reopened.get(key), Some(line));
        }
        let b = reopened.get(&bottom).unwrap();
        assert_eq!(b.get(1).unwrap().source, Source::Interpolated);
        assert_eq!(b.get(3), Some(&PickSample::manual(None)));
        assert!(reopened.get(&horizon).unwrap().is_locked());
    }

    #[test]
    fn misaligned_saved_line() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::new(dir.path());
        std::fs::create_dir_all(project.dir()).unwrap();
        write_picks(
            project.picks_path(),
            &[
                (PickKey::new("A", PickType::Bottom), PickLine::new(3)),
                (PickKey::new("B", PickType::Bottom), PickLine::new(9)),
            ],
        )
        .unwrap();

        let mut m = PickLineManager::new(BTreeMap::from([("A".to_string(), 3), ("B".to_string(), 4)]));
        let err = project.load_picks(&mut m).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::Misaligned { found: 9, .. })
        ));
        assert_eq!(m.iter().count(), 0);
    }

    #[test]
    fn tide_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::new(dir.path());
        assert_eq!(project.load_tide().unwrap(), None);

        let tide = TideCurve::new(vec![
            (OffsetDateTime::from_unix_timestamp(0).unwrap(), 100.0),
            (OffsetDateTime::from_unix_timestamp(10).unwrap(), 102.25),
        ])
        .unwrap();
        project.save_tide(&tide).unwrap();
        assert_eq!(project.load_tide().unwrap(), Some(tide));
    }

    #[test]
    fn unsaved_project_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = manager();
        assert_eq!(Project::new(dir.path()).load_picks(&mut m).unwrap(), 0);
    }
}
