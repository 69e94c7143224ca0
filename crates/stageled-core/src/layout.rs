//! Physical LED layout and slider-driven segment groups.

use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Shape of the installation: `segments` strips of `per_segment` LEDs each
///
/// LED `i` belongs to segment `i / per_segment`, bar position `i % per_segment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedLayout {
    /// Number of independent strips
    pub segments: usize,
    /// LEDs per strip
    pub per_segment: usize,
}

impl Default for LedLayout {
    fn default() -> Self {
        Self {
            segments: 24,
            per_segment: 120,
        }
    }
}

impl LedLayout {
    /// Create a layout
    pub fn new(segments: usize, per_segment: usize) -> Self {
        Self {
            segments,
            per_segment,
        }
    }

    /// Total LED count, the length of every LED array
    pub fn led_count(&self) -> usize {
        self.segments * self.per_segment
    }

    /// Size in bytes of the serialized wire bitmap (3 bytes per LED)
    pub fn bitmap_len(&self) -> usize {
        self.led_count() * 3
    }

    /// Segment index of an LED
    pub fn segment_of(&self, led: usize) -> usize {
        led / self.per_segment
    }

    /// Position of an LED within its segment
    pub fn bar_of(&self, led: usize) -> usize {
        led % self.per_segment
    }

    /// LED index range covered by a segment
    pub fn segment_range(&self, segment: usize) -> Range<usize> {
        let start = segment * self.per_segment;
        start..start + self.per_segment
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.segments == 0 || self.per_segment == 0 {
            return Err(CoreError::InvalidConfig(format!(
                "LED layout must not be empty ({} x {})",
                self.segments, self.per_segment
            )));
        }
        Ok(())
    }
}

/// Segment groups attenuated together by one slider each
///
/// Group `n` is driven by slider `n`. Each group lists segment indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentGroups(pub Vec<Vec<usize>>);

impl Default for SegmentGroups {
    fn default() -> Self {
        // Three groups of eight consecutive strips
        Self((0..3).map(|g| (g * 8..g * 8 + 8).collect()).collect())
    }
}

impl SegmentGroups {
    /// Number of groups
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no group is configured
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// LED ranges of a group, resolved against a layout
    pub fn led_ranges<'a>(
        &'a self,
        group: usize,
        layout: &'a LedLayout,
    ) -> impl Iterator<Item = Range<usize>> + 'a {
        self.0
            .get(group)
            .into_iter()
            .flatten()
            .map(move |&segment| layout.segment_range(segment))
    }

    pub(crate) fn validate(&self, layout: &LedLayout, sliders: usize) -> Result<()> {
        if self.0.len() > sliders {
            return Err(CoreError::InvalidConfig(format!(
                "{} segment groups configured but only {} sliders available",
                self.0.len(),
                sliders
            )));
        }

        for (index, group) in self.0.iter().enumerate() {
            if let Some(bad) = group.iter().find(|&&s| s >= layout.segments) {
                return Err(CoreError::InvalidConfig(format!(
                    "Segment group {} references segment {} (layout has {})",
                    index, bad, layout.segments
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let layout = LedLayout::default();
        assert_eq!(layout.led_count(), 2880);
        assert_eq!(layout.bitmap_len(), 8640);
    }

    #[test]
    fn test_led_addressing() {
        let layout = LedLayout::default();
        assert_eq!(layout.segment_of(0), 0);
        assert_eq!(layout.segment_of(119), 0);
        assert_eq!(layout.segment_of(120), 1);
        assert_eq!(layout.bar_of(121), 1);
        assert_eq!(layout.segment_range(2), 240..360);
    }

    #[test]
    fn test_default_groups() {
        let layout = LedLayout::default();
        let groups = SegmentGroups::default();
        assert_eq!(groups.len(), 3);

        let ranges: Vec<_> = groups.led_ranges(1, &layout).collect();
        assert_eq!(ranges.len(), 8);
        assert_eq!(ranges[0], 960..1080);
        assert_eq!(ranges[7], 1800..1920);
    }

    #[test]
    fn test_group_validation() {
        let layout = LedLayout::new(4, 10);
        assert!(SegmentGroups(vec![vec![0, 1], vec![2, 3]])
            .validate(&layout, 8)
            .is_ok());
        assert!(SegmentGroups(vec![vec![4]]).validate(&layout, 8).is_err());
        assert!(SegmentGroups(vec![vec![0]; 9]).validate(&layout, 8).is_err());
    }
}
