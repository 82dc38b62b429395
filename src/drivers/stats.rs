use ndarray::Array1;

/// Population statistics over the acquired part of the buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Statistics {
    pub mean: f64,
    pub median: f64,
    pub variance: f64,
    pub std_dev: f64,
}

impl Statistics {
    /// `None` when there is nothing to summarize.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let data = Array1::from_vec(samples.to_vec());
        let mean = data.mean()?;
        // ddof = 0: population statistics
        let variance = data.var(0.0);
        let std_dev = data.std(0.0);
        Some(Self {
            mean,
            median: median(samples),
            variance,
            std_dev,
        })
    }
}

fn median(samples: &[f64]) -> f64 {
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn empty_input_has_no_statistics() {
        assert!(Statistics::from_samples(&[]).is_none());
    }

    #[test]
    fn population_statistics() {
        let stats = Statistics::from_samples(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_abs_diff_eq!(stats.mean, 5.0);
        assert_abs_diff_eq!(stats.median, 4.5);
        assert_abs_diff_eq!(stats.variance, 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.std_dev, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn odd_length_median_and_single_sample() {
        let stats = Statistics::from_samples(&[3.0, 1.0, 2.0]).unwrap();
        assert_abs_diff_eq!(stats.median, 2.0);

        let one = Statistics::from_samples(&[1.25]).unwrap();
        assert_abs_diff_eq!(one.mean, 1.25);
        assert_abs_diff_eq!(one.variance, 0.0);
    }
}
