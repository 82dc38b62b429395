/// Transform applied to each raw sample before it is displayed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SampleFilter {
    Identity,
    /// Linear ADC conversion: `raw * reference_volts / levels`.
    AdcVolts { reference_volts: f64, levels: f64 },
}

impl SampleFilter {
    /// 10-bit converter against a 5 V reference.
    pub fn arduino_analog() -> Self {
        SampleFilter::AdcVolts {
            reference_volts: 5.0,
            levels: 1024.0,
        }
    }

    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            Self::arduino_analog()
        } else {
            Self::Identity
        }
    }

    pub fn apply(&self, raw: f64) -> f64 {
        match *self {
            SampleFilter::Identity => raw,
            SampleFilter::AdcVolts {
                reference_volts,
                levels,
            } => raw * reference_volts / levels,
        }
    }
}

impl Default for SampleFilter {
    fn default() -> Self {
        Self::arduino_analog()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn default_filter_maps_adc_range_to_volts() {
        let filter = SampleFilter::default();
        assert_abs_diff_eq!(filter.apply(0.0), 0.0);
        assert_abs_diff_eq!(filter.apply(1023.0), 4.995, epsilon = 1e-3);
        assert_abs_diff_eq!(filter.apply(512.0), 2.5, epsilon = 1e-9);
    }

    #[test]
    fn identity_passes_through() {
        assert_eq!(SampleFilter::from_enabled(false).apply(42.5), 42.5);
    }
}
