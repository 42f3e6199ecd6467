//! Element and segment descriptors

use smallvec::SmallVec;

/// One slot of a segment
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SegmentElement {
    /// Segment index
    pub segment: usize,
    /// Position inside the segment
    pub local: usize,
    /// Position in the flat buffer
    pub global: usize,
    /// True for slots past the segment's logical size
    pub padding: bool,
}

/// A run of slots inside one BiEllpack group
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SegmentGroup {
    /// Flat position of the run's first slot
    pub begin: usize,
    /// Slots in the run
    pub width: usize,
    /// Distance between consecutive slots
    pub step: usize,
}

/// How a segment's local indices map to flat positions
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SegmentMapping {
    /// `global = begin + local * step`
    Strided {
        /// Position of local slot 0
        begin: usize,
        /// Distance between consecutive slots
        step: usize,
    },
    /// Consecutive runs; local indices fill them in order
    Grouped(SmallVec<[SegmentGroup; 6]>),
}

/// Geometry of one segment
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SegmentView {
    index: usize,
    size: usize,
    capacity: usize,
    mapping: SegmentMapping,
}

impl SegmentView {
    /// Descriptor for a strided segment
    pub fn strided(index: usize, size: usize, capacity: usize, begin: usize, step: usize) -> Self {
        debug_assert!(size <= capacity);
        Self {
            index,
            size,
            capacity,
            mapping: SegmentMapping::Strided { begin, step },
        }
    }

    /// Descriptor for a grouped segment; capacity is the sum of group widths
    pub fn grouped(index: usize, size: usize, groups: SmallVec<[SegmentGroup; 6]>) -> Self {
        let capacity = groups.iter().map(|g| g.width).sum();
        debug_assert!(size <= capacity);
        Self {
            index,
            size,
            capacity,
            mapping: SegmentMapping::Grouped(groups),
        }
    }

    /// Segment index
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Logical size
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots, padding included
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns true if the segment holds no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Local-to-global mapping
    pub fn mapping(&self) -> &SegmentMapping {
        &self.mapping
    }

    /// Flat position of slot `local`; valid for `local < capacity`
    pub fn global_index(&self, local: usize) -> usize {
        debug_assert!(local < self.capacity, "slot {local} >= {}", self.capacity);
        match &self.mapping {
            SegmentMapping::Strided { begin, step } => begin + local * step,
            SegmentMapping::Grouped(groups) => {
                let mut rest = local;
                for group in groups {
                    if rest < group.width {
                        return group.begin + rest * group.step;
                    }
                    rest -= group.width;
                }
                unreachable!("slot {local} beyond grouped capacity {}", self.capacity)
            }
        }
    }

    /// Elements with `local < size`
    pub fn iter(&self) -> SegmentSlots<'_> {
        SegmentSlots::new(self, self.size)
    }

    /// Every slot, padding included
    pub fn slots(&self) -> SegmentSlots<'_> {
        SegmentSlots::new(self, self.capacity)
    }
}

impl<'a> IntoIterator for &'a SegmentView {
    type Item = SegmentElement;
    type IntoIter = SegmentSlots<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a segment's slots in local order
#[derive(Clone, Debug)]
pub struct SegmentSlots<'a> {
    view: &'a SegmentView,
    local: usize,
    end: usize,
    group: usize,
    in_group: usize,
}

impl<'a> SegmentSlots<'a> {
    fn new(view: &'a SegmentView, end: usize) -> Self {
        Self {
            view,
            local: 0,
            end,
            group: 0,
            in_group: 0,
        }
    }
}

impl Iterator for SegmentSlots<'_> {
    type Item = SegmentElement;

    fn next(&mut self) -> Option<SegmentElement> {
        if self.local >= self.end {
            return None;
        }
        let global = match &self.view.mapping {
            SegmentMapping::Strided { begin, step } => begin + self.local * step,
            SegmentMapping::Grouped(groups) => {
                while self.in_group >= groups[self.group].width {
                    self.group += 1;
                    self.in_group = 0;
                }
                let group = &groups[self.group];
                let global = group.begin + self.in_group * group.step;
                self.in_group += 1;
                global
            }
        };
        let element = SegmentElement {
            segment: self.view.index,
            local: self.local,
            global,
            padding: self.local >= self.view.size,
        };
        self.local += 1;
        Some(element)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.end.saturating_sub(self.local);
        (rest, Some(rest))
    }
}

impl ExactSizeIterator for SegmentSlots<'_> {}
