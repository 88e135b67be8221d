//! Scheduled timers for strategies.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use std::collections::BTreeSet;

/// Wall-clock time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32, second: u32) -> Self {
        Self {
            hour,
            minute,
            second,
        }
    }

    pub fn minutes(self) -> i64 {
        (self.hour * 60 + self.minute) as i64
    }
}

/// A timer fires when the bar clock passes `when + offset` on days that
/// pass the weekday and month-day filters; `repeat_minutes` produces
/// intra-day recurrences. `cheat` timers fire before the bar is
/// processed. The carry flags are accepted for configuration
/// compatibility but days skipped by a filter are simply not fired.
#[derive(Debug, Clone)]
pub struct Timer {
    pub id: u64,
    pub when: TimeOfDay,
    pub offset_minutes: i64,
    pub repeat_minutes: i64,
    /// ISO weekdays to fire on (1 = Monday, 7 = Sunday); empty = all.
    pub weekdays: BTreeSet<u32>,
    pub week_carry: bool,
    /// Days of month to fire on (1-31); empty = all.
    pub monthdays: BTreeSet<u32>,
    pub month_carry: bool,
    pub cheat: bool,
    triggered: bool,
    next_repeat_minutes: i64,
}

impl Timer {
    pub fn at(when: TimeOfDay) -> Self {
        Self {
            id: 0,
            when,
            offset_minutes: 0,
            repeat_minutes: 0,
            weekdays: BTreeSet::new(),
            week_carry: false,
            monthdays: BTreeSet::new(),
            month_carry: true,
            cheat: false,
            triggered: false,
            next_repeat_minutes: 0,
        }
    }

    pub fn with_offset(mut self, minutes: i64) -> Self {
        self.offset_minutes = minutes;
        self
    }

    pub fn with_repeat(mut self, minutes: i64) -> Self {
        self.repeat_minutes = minutes;
        self
    }

    pub fn on_weekdays(mut self, days: impl IntoIterator<Item = u32>) -> Self {
        self.weekdays = days.into_iter().collect();
        self
    }

    pub fn on_monthdays(mut self, days: impl IntoIterator<Item = u32>) -> Self {
        self.monthdays = days.into_iter().collect();
        self
    }

    pub fn cheating(mut self) -> Self {
        self.cheat = true;
        self
    }

    fn passes_filters(&self, dt: NaiveDateTime) -> bool {
        if !self.weekdays.is_empty() {
            let dow = dt.weekday().number_from_monday();
            if !self.weekdays.contains(&dow) {
                return false;
            }
        }
        if !self.monthdays.is_empty() && !self.monthdays.contains(&dt.day()) {
            return false;
        }
        true
    }

    /// Should the timer fire at this bar time?
    pub fn check(&mut self, dt: NaiveDateTime) -> bool {
        if !self.passes_filters(dt) {
            return false;
        }
        let trigger_minutes = self.when.minutes() + self.offset_minutes;
        let now_minutes = (dt.hour() * 60 + dt.minute()) as i64;

        if !self.triggered {
            if now_minutes >= trigger_minutes {
                self.triggered = true;
                self.next_repeat_minutes = trigger_minutes + self.repeat_minutes;
                return true;
            }
            return false;
        }

        if self.repeat_minutes > 0 && now_minutes >= self.next_repeat_minutes {
            self.next_repeat_minutes += self.repeat_minutes;
            return true;
        }
        false
    }

    /// Reset the fired flag when the calendar day changes.
    pub fn reset_daily(&mut self) {
        self.triggered = false;
        self.next_repeat_minutes = 0;
    }
}

/// Owns the timers of one strategy and tells the engine which ids fire on
/// each bar.
#[derive(Debug, Default)]
pub struct TimerManager {
    timers: Vec<Timer>,
    next_id: u64,
    last_day: Option<NaiveDate>,
}

impl TimerManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mut timer: Timer) -> u64 {
        self.next_id += 1;
        timer.id = self.next_id;
        self.timers.push(timer);
        self.next_id
    }

    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != id);
        self.timers.len() != before
    }

    pub fn get(&self, id: u64) -> Option<&Timer> {
        self.timers.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Ids of timers firing at `dt` during the given phase. A new
    /// calendar day resets every timer first.
    pub fn check(&mut self, dt: NaiveDateTime, cheat_phase: bool) -> Vec<u64> {
        let day = dt.date();
        if self.last_day != Some(day) {
            for t in &mut self.timers {
                t.reset_daily();
            }
            self.last_day = Some(day);
        }

        self.timers
            .iter_mut()
            .filter(|t| t.cheat == cheat_phase)
            .filter_map(|t| if t.check(dt) { Some(t.id) } else { None })
            .collect()
    }
}
