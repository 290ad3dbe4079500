use super::base::WindowSplitter;
use super::types::{SearchWindow, SplitConfig, WindowType};
use crate::config::walk_forward::WalkForwardConfig;
use crate::error::{OptimizerError, Result};
use crate::types::DateWindow;
use chrono::{Days, NaiveDate};

pub struct WalkForwardSplitter {
    config: SplitConfig,
}

impl WalkForwardSplitter {
    pub fn new(config: SplitConfig) -> Self {
        Self { config }
    }

    pub fn from_config(config: &WalkForwardConfig) -> Self {
        Self::new(SplitConfig::from(config))
    }
}

fn shift(date: NaiveDate, days: i64) -> Result<NaiveDate> {
    u64::try_from(days)
        .ok()
        .and_then(|d| date.checked_add_days(Days::new(d)))
        .ok_or_else(|| {
            OptimizerError::Validation(format!("cannot move {} forward by {} days", date, days))
        })
}

impl WindowSplitter for WalkForwardSplitter {
    /// Windows are produced while the in-sample end stays inside the range.
    /// The validation period of the last window may run past the range end.
    fn split(&self) -> Result<Vec<SearchWindow>> {
        let config = &self.config;
        if config.in_sample_days <= 0 || config.step_days <= 0 {
            return Err(OptimizerError::Validation(
                "in-sample and step lengths must be positive".to_string(),
            ));
        }

        let mut windows = Vec::new();
        let mut start = config.start;
        let mut in_sample_end = shift(start, config.in_sample_days - 1)?;

        while in_sample_end <= config.end {
            let validation_start = shift(in_sample_end, 1)?;
            let validation_end = shift(validation_start, config.step_days - 1)?;

            windows.push(SearchWindow {
                index: windows.len(),
                in_sample: DateWindow::new(start, in_sample_end),
                validation: DateWindow::new(validation_start, validation_end),
            });

            in_sample_end = shift(in_sample_end, config.step_days)?;
            if config.window_type == WindowType::Rolling {
                start = shift(start, config.step_days)?;
            }
        }

        Ok(windows)
    }

    fn config(&self) -> &SplitConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, day).unwrap()
    }

    fn splitter(window_type: WindowType) -> WalkForwardSplitter {
        WalkForwardSplitter::new(SplitConfig {
            start: date(1, 1),
            end: date(3, 31),
            in_sample_days: 30,
            step_days: 10,
            window_type,
        })
    }

    #[test]
    fn test_rolling_windows() {
        let windows = splitter(WindowType::Rolling).split().unwrap();

        assert_eq!(windows[0].in_sample, DateWindow::new(date(1, 1), date(1, 30)));
        assert_eq!(windows[0].validation, DateWindow::new(date(1, 31), date(2, 9)));
        assert_eq!(windows[1].in_sample.start, date(1, 11));
        assert_eq!(windows[1].in_sample.end, date(2, 9));

        // In-sample ends Jan 30, Feb 9, ..., Mar 30
        assert_eq!(windows.len(), 7);
        assert!(windows.iter().all(|w| w.in_sample.end <= date(3, 31)));
        assert!(windows.iter().all(|w| w.in_sample.days() == 30));
        assert_eq!(windows.last().unwrap().validation.end, date(4, 9));
    }

    #[test]
    fn test_anchored_windows_keep_start() {
        let windows = splitter(WindowType::Anchored).split().unwrap();

        assert_eq!(windows[0].in_sample, DateWindow::new(date(1, 1), date(1, 30)));
        assert_eq!(windows[1].in_sample, DateWindow::new(date(1, 1), date(2, 9)));
        assert!(windows.iter().all(|w| w.in_sample.start == date(1, 1)));
        for pair in windows.windows(2) {
            assert_eq!(pair[1].index, pair[0].index + 1);
            assert_eq!(pair[1].validation.start, shift(pair[0].validation.start, 10).unwrap());
        }
    }

    #[test]
    fn test_range_shorter_than_in_sample_yields_nothing() {
        let splitter = WalkForwardSplitter::new(SplitConfig {
            start: date(1, 1),
            end: date(1, 15),
            in_sample_days: 30,
            step_days: 10,
            window_type: WindowType::Rolling,
        });
        assert!(splitter.split().unwrap().is_empty());
    }
}
