//! Threshold peak detection against a rolling noise floor
use crate::config::PickerConfig;
use crate::model::Trace;
use serde::{Deserialize, Serialize};

/// Consistency constant relating the median absolute deviation to the
/// standard deviation of normally distributed noise
const MAD_SCALE: f64 = 1.4826;

/// A reflector found in a single trace
#[derive(Debug, Clone, Copy, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Detection {
    /// Sample index of the peak
    pub sample: usize,
    /// Depth of the peak
    pub depth: f64,
    /// How far the peak clears the threshold, in (0, 1]
    pub confidence: f64,
}

/// The trailing-window mean of the amplitudes before each sample
///
/// Sample `i` gets the mean of the (up to) `window` samples before it.
/// The first sample has no history and gets the trace median.
pub fn noise_floor(amplitudes: &[f32], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let median = median(amplitudes.iter().map(|a| f64::from(*a)).collect());

    // Precompute the cumulative sum of the data
    let cumsum: Vec<f64> = std::iter::once(0.0)
        .chain(amplitudes.iter().scan(0.0f64, |acc, &x| {
            *acc += f64::from(x);
            Some(*acc)
        }))
        .collect();

    (0..amplitudes.len())
        .map(|i| {
            let lo = i.saturating_sub(window);
            if i == lo {
                median
            } else {
                (cumsum[i] - cumsum[lo]) / (i - lo) as f64
            }
        })
        .collect()
}

/// A robust estimate of the noise spread of a trace
pub fn noise_spread(amplitudes: &[f32]) -> f64 {
    let values: Vec<f64> = amplitudes.iter().map(|a| f64::from(*a)).collect();
    let m = median(values.clone());
    let deviations = values.iter().map(|v| (v - m).abs()).collect();
    MAD_SCALE * median(deviations)
}

fn median(mut v: Vec<f64>) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    v.sort_by(|a, b| a.total_cmp(b));
    let n = v.len();
    if n % 2 == 1 {
        v[n / 2]
    } else {
        0.5 * (v[n / 2 - 1] + v[n / 2])
    }
}

struct Scan<'a> {
    amplitudes: &'a [f32],
    floor: Vec<f64>,
    threshold: Vec<f64>,
    start: usize,
}

impl<'a> Scan<'a> {
    fn new(trace: &'a Trace, config: &PickerConfig, min_depth: f64) -> Self {
        let amplitudes = trace.amplitudes.as_slice();
        let floor = noise_floor(amplitudes, config.noise_window);
        let spread = noise_spread(amplitudes).max(f64::EPSILON);
        let threshold = floor.iter().map(|f| f + config.snr * spread).collect();
        let min_depth = min_depth.max(config.blank_depth);
        let start = trace.sample_at(min_depth).ceil().max(0.0) as usize;
        Scan {
            amplitudes,
            floor,
            threshold,
            start,
        }
    }

    /// Confidence of a peak at `i`, or `None` if `i` is not a peak above
    /// threshold
    fn peak(&self, i: usize) -> Option<f64> {
        if i < self.start || i >= self.amplitudes.len() {
            return None;
        }
        let a = f64::from(self.amplitudes[i]);
        let above_prev = i == 0 || a >= f64::from(self.amplitudes[i - 1]);
        let above_next = i + 1 == self.amplitudes.len() || a >= f64::from(self.amplitudes[i + 1]);
        if a > self.threshold[i] && above_prev && above_next {
            let span = a - self.floor[i];
            Some(((a - self.threshold[i]) / span).clamp(f64::MIN_POSITIVE, 1.0))
        } else {
            None
        }
    }

    fn first(&self) -> Option<(usize, f64)> {
        (self.start..self.amplitudes.len()).find_map(|i| self.peak(i).map(|c| (i, c)))
    }

    /// Scan outward from `center`, shallower side first at each offset
    fn outward(&self, center: usize, radius: usize) -> Option<(usize, f64)> {
        (0..=radius).find_map(|off| {
            let shallow = center.checked_sub(off).and_then(|i| self.peak(i).map(|c| (i, c)));
            shallow.or_else(|| self.peak(center + off).map(|c| (center + off, c)))
        })
    }
}

/// Detect the first reflector at or below `min_depth`
///
/// With a `prior` depth from the previous trace, peaks within the search
/// radius of the prior are tried first, nearest first. Otherwise, or when
/// nothing qualifies near the prior, the shallowest qualifying peak wins.
/// Returns `None` when no sample clears the threshold.
pub fn detect(
    trace: &Trace,
    config: &PickerConfig,
    min_depth: f64,
    prior: Option<f64>,
) -> Option<Detection> {
    if trace.amplitudes.is_empty() || trace.resolution <= 0.0 {
        return None;
    }
    let scan = Scan::new(trace, config, min_depth);

    let near_prior = prior.and_then(|depth| {
        let center = trace.sample_at(depth).round();
        if center < 0.0 {
            return None;
        }
        let radius = (config.search_radius / trace.resolution).ceil() as usize;
        scan.outward(center as usize, radius)
    });

    near_prior
        .or_else(|| scan.first())
        .map(|(sample, confidence)| Detection {
            sample,
            depth: trace.depth_at(sample),
            confidence,
        })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::Position;
    use time::OffsetDateTime;

    fn trace(amplitudes: Vec<f32>) -> Trace {
        Trace {
            line: "L1".to_string(),
            index: 0,
            timestamp: OffsetDateTime::UNIX_EPOCH,
            frequency: 200,
            position: Position::default(),
            draft: 0.0,
            heave: 0.0,
            resolution: 0.1,
            amplitudes,
        }
    }

    fn noisy(n: usize, peaks: &[(usize, f32)]) -> Vec<f32> {
        let mut v: Vec<f32> = (0..n).map(|i| 1.0 + 0.1 * ((i * 7) % 5) as f32).collect();
        for &(i, a) in peaks {
            v[i] = a;
        }
        v
    }

    #[test]
    fn test_noise_floor() {
        let floor = noise_floor(&[1.0, 3.0, 5.0, 7.0], 2);
        assert_eq!(floor, vec![4.0, 1.0, 2.0, 4.0]);
    }

    #[test]
    fn test_noise_spread() {
        assert_eq!(noise_spread(&[2.0; 10]), 0.0);
        let s = noise_spread(&[1.0, 2.0, 3.0, 4.0, 100.0]);
        assert!((s - MAD_SCALE).abs() < 1e-12);
    }

    #[test]
    fn first_peak_above_threshold() {
        let t = trace(noisy(200, &[(80, 50.0), (160, 40.0)]));
        let d = detect(&t, &PickerConfig::default(), 0.0, None).unwrap();
        assert_eq!(d.sample, 80);
        assert!((d.depth - 8.0).abs() < 1e-9);
        assert!(d.confidence > 0.0 && d.confidence <= 1.0);
    }

    #[test]
    fn no_pick_on_flat_trace() {
        let t = trace(vec![3.0; 100]);
        assert_eq!(detect(&t, &PickerConfig::default(), 0.0, None), None);
        let empty = trace(vec![]);
        assert_eq!(detect(&empty, &PickerConfig::default(), 0.0, None), None);
    }

    #[test]
    fn blanking_rejects_shallow_spike() {
        let t = trace(noisy(200, &[(5, 60.0), (80, 50.0)]));
        let config = PickerConfig {
            blank_depth: 1.0,
            ..Default::default()
        };
        assert_eq!(detect(&t, &config, 0.0, None).unwrap().sample, 80);
    }

    #[test]
    fn prior_rejects_spike_and_multiple() {
        // A noise spike above the bottom and a multiple at twice its depth
        let t = trace(noisy(300, &[(40, 60.0), (100, 50.0), (200, 45.0)]));
        let d = detect(&t, &PickerConfig::default(), 0.0, Some(10.2)).unwrap();
        assert_eq!(d.sample, 100);
        let d = detect(&t, &PickerConfig::default(), 0.0, None).unwrap();
        assert_eq!(d.sample, 40);
    }

    #[test]
    fn prior_far_from_any_peak_falls_back() {
        let t = trace(noisy(300, &[(100, 50.0)]));
        let d = detect(&t, &PickerConfig::default(), 0.0, Some(25.0)).unwrap();
        assert_eq!(d.sample, 100);
    }

    #[test]
    fn min_depth_excludes_overlying_reflector() {
        let t = trace(noisy(300, &[(100, 50.0), (150, 30.0)]));
        let d = detect(&t, &PickerConfig::default(), 10.1, None).unwrap();
        assert_eq!(d.sample, 150);
    }
}
