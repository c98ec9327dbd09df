//! Date source for record stamping.

use std::sync::Mutex;

use chrono::{Days, NaiveDate, Utc};

/// Format used for `date_added` / `last_updated`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Supplies "today" to the sync store.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;

    /// Today's date rendered as an ISO date string.
    fn today_iso(&self) -> String {
        self.today().format(DATE_FORMAT).to_string()
    }
}

/// Wall-clock dates in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    today: Mutex<NaiveDate>,
}

impl ManualClock {
    pub const fn new(today: NaiveDate) -> Self {
        Self {
            today: Mutex::new(today),
        }
    }

    pub fn set(&self, date: NaiveDate) {
        *self.today.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = date;
    }

    /// Move the clock forward by `days`.
    pub fn advance_days(&self, days: u64) {
        let mut today = self
            .today
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(next) = today.checked_add_days(Days::new(days)) {
            *today = next;
        }
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        *self
            .today
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_formats_iso_dates() {
        let clock = ManualClock::new(NaiveDate::from_ymd_opt(2024, 2, 28).unwrap());
        assert_eq!(clock.today_iso(), "2024-02-28");

        clock.advance_days(2);
        assert_eq!(clock.today_iso(), "2024-03-01");
    }
}
