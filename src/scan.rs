//! Locating the text that must be rescanned after an edit.
//!
//! The [`Walker`] steps through text one char at a time, [`expand`] widens a
//! range to whole words, and the [`RegionCollector`] turns a change-set into
//! non-overlapping [`TouchedRegion`]s.

mod expand;
mod regions;
mod walker;

pub use expand::expand;
pub use regions::{RegionCollector, TouchedRegion};
pub use walker::{Direction, Walker, word};
