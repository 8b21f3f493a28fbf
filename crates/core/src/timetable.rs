//! The fixed weekly timetable grid.
//!
//! A [`Slot`] is one (day-of-week, period) cell. Five weekdays with six
//! periods each give 30 cells; a student occupies each cell with at most
//! one course.

use std::fmt;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Number of teaching days per week.
pub const DAYS_PER_WEEK: usize = 5;

/// Number of periods per teaching day.
pub const PERIODS_PER_DAY: u8 = 6;

/// Total number of cells in the weekly grid.
pub const SLOT_COUNT: usize = DAYS_PER_WEEK * PERIODS_PER_DAY as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; DAYS_PER_WEEK] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cell of the weekly grid. Periods are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Slot {
    pub day: DayOfWeek,
    pub period: u8,
}

impl Slot {
    /// Build a slot, returning `None` when the period is outside `1..=6`.
    pub fn new(day: DayOfWeek, period: u8) -> Option<Self> {
        (1..=PERIODS_PER_DAY)
            .contains(&period)
            .then_some(Self { day, period })
    }

    /// Map a dense index in `0..SLOT_COUNT` onto the grid.
    pub fn from_index(index: usize) -> Option<Self> {
        if index >= SLOT_COUNT {
            return None;
        }
        let per_day = PERIODS_PER_DAY as usize;
        Some(Self {
            day: DayOfWeek::ALL[index / per_day],
            period: (index % per_day) as u8 + 1,
        })
    }

    /// Dense index of this slot in `0..SLOT_COUNT`.
    pub fn index(self) -> usize {
        self.day.index() * PERIODS_PER_DAY as usize + (self.period as usize - 1)
    }

    /// Every slot of the week in grid order.
    pub fn all() -> impl Iterator<Item = Slot> {
        (0..SLOT_COUNT).filter_map(Slot::from_index)
    }

    /// Every slot of the week in a fresh random order.
    pub fn shuffled() -> Vec<Slot> {
        let mut slots: Vec<Slot> = Slot::all().collect();
        slots.shuffle(&mut rand::rng());
        slots
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.day, self.period)
    }
}
