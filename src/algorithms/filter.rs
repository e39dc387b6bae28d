//! Smoothing of picks across traces

/// Median-filter a sequence of picks over a window of traces
///
/// Missing picks stay missing and are skipped when computing the median
/// of their neighbours. An even `window` is widened by one.
pub fn median_filter(depths: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let half = window / 2;
    if half == 0 {
        return depths.to_vec();
    }

    depths
        .iter()
        .enumerate()
        .map(|(i, d)| {
            d.map(|_| {
                let lo = i.saturating_sub(half);
                let hi = (i + half + 1).min(depths.len());
                let mut neighbours: Vec<f64> = depths[lo..hi].iter().flatten().copied().collect();
                neighbours.sort_by(|a, b| a.total_cmp(b));
                let n = neighbours.len();
                if n % 2 == 1 {
                    neighbours[n / 2]
                } else {
                    0.5 * (neighbours[n / 2 - 1] + neighbours[n / 2])
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn single_trace_outlier() {
        let d = vec![Some(10.0), Some(10.0), Some(25.0), Some(10.0), Some(10.0)];
        assert_eq!(median_filter(&d, 3), vec![Some(10.0); 5]);
    }

    #[test]
    fn gaps_are_kept() {
        let d = vec![Some(1.0), None, Some(3.0), Some(5.0)];
        assert_eq!(
            median_filter(&d, 3),
            vec![Some(1.0), None, Some(4.0), Some(4.0)]
        );
    }

    #[test]
    fn window_of_one() {
        let d = vec![Some(1.0), Some(9.0), None];
        assert_eq!(median_filter(&d, 1), d);
    }
}
