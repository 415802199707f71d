//! Per-timeslot trade statistics over a pool snapshot.

pub mod calculator;

pub use calculator::{SlotStats, StatsError, statistic_data};
