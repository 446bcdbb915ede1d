use std::ops::RangeInclusive;

use super::slot::{Coordinate, DAY_COUNT};

pub const DEFAULT_PERIOD_COUNT: u32 = 8;

/// Visible grid dimensions. Days are fixed; the period count only decides
/// how many rows are drawn and never touches slot data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutConfig {
    period_count: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            period_count: DEFAULT_PERIOD_COUNT,
        }
    }
}

impl LayoutConfig {
    /// The larger of the configured default and the highest populated period.
    pub fn for_data(default_count: u32, max_period: Option<u32>) -> Self {
        let period_count = default_count.max(max_period.unwrap_or(0)).max(1);
        Self { period_count }
    }

    pub fn period_count(&self) -> u32 {
        self.period_count
    }

    pub fn increment(&mut self) -> u32 {
        self.period_count = self.period_count.saturating_add(1);
        self.period_count
    }

    pub fn decrement(&mut self) -> u32 {
        if self.period_count > 1 {
            self.period_count -= 1;
        }
        self.period_count
    }

    pub fn days(&self) -> impl Iterator<Item = u8> {
        0..DAY_COUNT
    }

    pub fn periods(&self) -> RangeInclusive<u32> {
        1..=self.period_count
    }

    pub fn is_visible(&self, at: Coordinate) -> bool {
        at.day_of_week < DAY_COUNT && self.periods().contains(&at.period_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grows_to_cover_seeded_data() {
        assert_eq!(LayoutConfig::for_data(8, None).period_count(), 8);
        assert_eq!(LayoutConfig::for_data(8, Some(5)).period_count(), 8);
        assert_eq!(LayoutConfig::for_data(8, Some(11)).period_count(), 11);
        assert_eq!(LayoutConfig::for_data(0, None).period_count(), 1);
    }

    #[test]
    fn decrement_floors_at_one() {
        let mut layout = LayoutConfig::for_data(2, None);
        assert_eq!(layout.decrement(), 1);
        assert_eq!(layout.decrement(), 1);
        assert_eq!(layout.increment(), 2);
    }

    #[test]
    fn visibility_tracks_period_count() {
        let mut layout = LayoutConfig::default();
        let p7 = Coordinate::new(0, 7).expect("coordinate");
        assert!(layout.is_visible(p7));
        for _ in 0..3 {
            layout.decrement();
        }
        assert_eq!(layout.period_count(), 5);
        assert!(!layout.is_visible(p7));
        for _ in 0..3 {
            layout.increment();
        }
        assert!(layout.is_visible(p7));
        assert_eq!(layout.days().count(), 6);
    }
}
