//! The trace store: immutable survey lines
use crate::error::{Result, ValidationError};
use crate::model::{Position, Trace};
use crate::records::{self, TRACE_SCHEMA};
use apache_avro::{types::Record, types::Value, Reader, Schema, Writer};
use std::collections::{btree_map, BTreeMap};
use std::fs::{read_dir, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

use std::sync::mpsc;
use std::thread;

/// Directory inside a survey holding one Avro file per line
pub const TRACE_DIR: &str = "traces";

/// One survey line: its traces, grouped by frequency channel
///
/// Every channel holds the same number of traces, indexed `0..n` in
/// acquisition order. A `SurveyLine` is never mutated after it is built.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyLine {
    name: String,
    channels: BTreeMap<u32, Vec<Trace>>,
}

impl SurveyLine {
    /// Build a line from its traces
    ///
    /// # Errors
    ///
    /// Returns an error when the channels differ in length or when the
    /// trace indices of a channel are not exactly `0..n`.
    pub fn new<S: Into<String>>(name: S, traces: Vec<Trace>) -> std::result::Result<Self, ValidationError> {
        let name = name.into();
        let mut channels: BTreeMap<u32, Vec<Trace>> = BTreeMap::new();
        for trace in traces {
            channels.entry(trace.frequency).or_default().push(trace);
        }

        let mut expected_len = None;
        for (&frequency, traces) in channels.iter_mut() {
            traces.sort_by_key(|t| t.index);
            for (expected, trace) in traces.iter().enumerate() {
                if trace.index != expected {
                    return Err(ValidationError::NonContiguous {
                        line: name.clone(),
                        frequency,
                        expected,
                        found: trace.index,
                    });
                }
            }
            match expected_len {
                None => expected_len = Some(traces.len()),
                Some(n) if n != traces.len() => {
                    return Err(ValidationError::ChannelLength {
                        line: name,
                        frequency,
                        expected: n,
                        found: traces.len(),
                    })
                }
                Some(_) => {}
            }
        }

        Ok(SurveyLine { name, channels })
    }

    /// The line name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of traces in the line
    pub fn trace_count(&self) -> usize {
        self.channels.values().next().map_or(0, Vec::len)
    }

    /// Frequencies available, in kHz, ascending
    pub fn frequencies(&self) -> impl Iterator<Item = u32> + '_ {
        self.channels.keys().copied()
    }

    /// The traces of one channel
    pub fn channel(&self, frequency: u32) -> Option<&[Trace]> {
        self.channels.get(&frequency).map(Vec::as_slice)
    }

    /// The channel at `frequency`, or the nearest one available
    pub fn nearest_channel(&self, frequency: u32) -> Option<&[Trace]> {
        self.channels
            .iter()
            .min_by_key(|(f, _)| f.abs_diff(frequency))
            .map(|(_, t)| t.as_slice())
    }

    /// Position and acquisition time of trace `i`
    ///
    /// Navigation is taken from the highest-frequency channel.
    pub fn fix(&self, i: usize) -> Option<(Position, OffsetDateTime)> {
        self.channels
            .values()
            .next_back()
            .and_then(|traces| traces.get(i))
            .map(|t| (t.position, t.timestamp))
    }

    /// Iterate over every trace of every channel
    pub fn traces(&self) -> impl Iterator<Item = &Trace> {
        self.channels.values().flatten()
    }
}

/// The survey lines of one survey, indexed by name
///
/// Opening a store reads every file under `traces/` in the survey
/// directory. Each file is read on its own thread and the traces are sent
/// back over a channel, then grouped into lines. Traces carry their line
/// name, so a file may hold more than one line.
#[derive(Debug, Default)]
pub struct TraceStore {
    path: Option<PathBuf>,
    lines: BTreeMap<String, SurveyLine>,
}

impl TraceStore {
    /// Open the trace store of a survey directory
    ///
    /// # Errors
    ///
    /// This function returns an error when the directory cannot be read,
    /// when a file is not a valid trace file or when a line fails
    /// validation.
    pub fn open<P>(path: P) -> Result<Self>
    where
        PathBuf: From<P>,
    {
        let path = PathBuf::from(path);
        let dir = read_dir(path.join(TRACE_DIR))?;

        // Open a channel for the traces read out of each file
        let (tx, rx) = mpsc::channel();

        let mut files = 0;
        for entry in dir {
            let filepath = entry?.path();
            if filepath.extension().map_or(true, |e| e != "avro") {
                continue;
            }
            files += 1;
            let tx1 = tx.clone();
            thread::spawn(move || {
                let res = read_traces(&filepath);
                // The receiver outlives every sender
                let _ = tx1.send((filepath, res));
            });
        }

        // Explicitly drop the Sender to close the channel
        drop(tx);

        let mut grouped: BTreeMap<String, Vec<Trace>> = BTreeMap::new();
        for (filepath, res) in rx {
            let traces = res?;
            log::debug!("read {} traces from {}", traces.len(), filepath.display());
            for trace in traces {
                grouped.entry(trace.line.clone()).or_default().push(trace);
            }
        }

        let lines = grouped
            .into_iter()
            .map(|(name, traces)| Ok((name.clone(), SurveyLine::new(name, traces)?)))
            .collect::<std::result::Result<BTreeMap<_, _>, ValidationError>>()?;

        log::info!(
            "opened {} survey lines from {} files in {}",
            lines.len(),
            files,
            path.display()
        );

        Ok(TraceStore {
            path: Some(path),
            lines,
        })
    }

    /// Build a store from lines already in memory
    pub fn from_lines<I: IntoIterator<Item = SurveyLine>>(lines: I) -> Self {
        let lines = lines
            .into_iter()
            .map(|l| (l.name().to_string(), l))
            .collect();
        TraceStore { path: None, lines }
    }

    /// The survey directory, if the store was opened from disk
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Look up a line by name
    pub fn line(&self, name: &str) -> Option<&SurveyLine> {
        self.lines.get(name)
    }

    /// Iterate over lines sorted by name
    pub fn iter(&self) -> btree_map::Values<'_, String, SurveyLine> {
        self.lines.values()
    }

    /// Number of lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the store holds no lines
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Trace count of every line
    pub fn trace_counts(&self) -> BTreeMap<String, usize> {
        self.lines
            .iter()
            .map(|(k, l)| (k.clone(), l.trace_count()))
            .collect()
    }
}

/// Read every trace in an Avro trace file
pub fn read_traces<P: AsRef<Path>>(path: P) -> Result<Vec<Trace>> {
    let reader = Reader::new(BufReader::new(File::open(path)?))?;
    reader
        .map(|value| -> Result<Trace> {
            let fields = records::record(value?)?;
            let amplitudes = records::array(&fields, "data")?
                .iter()
                .map(records::float)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let index = records::long(&fields, "index")?;
            let frequency = records::long(&fields, "frequency")?;
            Ok(Trace {
                line: records::string(&fields, "line")?.to_string(),
                index: usize::try_from(index).map_err(|_| {
                    ValidationError::MalformedRecord(format!("negative trace index {}", index))
                })?,
                timestamp: records::from_millis(records::long(&fields, "timestamp")?)?,
                frequency: u32::try_from(frequency).map_err(|_| {
                    ValidationError::MalformedRecord(format!("invalid frequency {}", frequency))
                })?,
                position: Position {
                    x: records::double(&fields, "x")?,
                    y: records::double(&fields, "y")?,
                },
                draft: records::double(&fields, "draft")?,
                heave: records::double(&fields, "heave")?,
                resolution: records::double(&fields, "resolution")?,
                amplitudes,
            })
        })
        .collect()
}

/// Write a line to an Avro trace file
pub fn write_line<P: AsRef<Path>>(path: P, line: &SurveyLine) -> Result<()> {
    let schema = Schema::parse_str(TRACE_SCHEMA)?;
    let mut writer = Writer::new(&schema, File::create(path)?);

    for trace in line.traces() {
        let mut record = Record::new(&schema).ok_or_else(|| {
            ValidationError::MalformedRecord("trace schema is not a record".to_string())
        })?;
        record.put("line", trace.line.clone());
        record.put("index", trace.index as i64);
        record.put("timestamp", records::timestamp_millis(trace.timestamp));
        record.put("frequency", i64::from(trace.frequency));
        record.put("x", trace.position.x);
        record.put("y", trace.position.y);
        record.put("draft", trace.draft);
        record.put("heave", trace.heave);
        record.put("resolution", trace.resolution);
        record.put(
            "data",
            Value::Array(trace.amplitudes.iter().map(|a| Value::Float(*a)).collect()),
        );
        writer.append(record)?;
    }

    writer.flush()?;
    Ok(())
}
