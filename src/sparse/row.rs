//! Borrowed views of one matrix row

use crate::dtype::{Element, SegmentIndex};
use crate::error::{Error, Result};
use crate::segments::SegmentView;

/// Read access to the slots of one row
///
/// Slot `local` holds a column index and a value. Occupied slots come first;
/// the first free slot carries the padding marker.
#[derive(Clone, Debug)]
pub struct RowView<'a, T, I> {
    segment: SegmentView,
    column_indexes: &'a [I],
    values: &'a [T],
}

impl<'a, T: Element, I: SegmentIndex> RowView<'a, T, I> {
    pub(crate) fn new(segment: SegmentView, column_indexes: &'a [I], values: &'a [T]) -> Self {
        Self {
            segment,
            column_indexes,
            values,
        }
    }

    /// Row index
    pub fn index(&self) -> usize {
        self.segment.index()
    }

    /// Slots reserved for this row
    pub fn capacity(&self) -> usize {
        self.segment.size()
    }

    /// Column stored in slot `local`, `None` for free or missing slots
    pub fn column(&self, local: usize) -> Option<usize> {
        if local >= self.capacity() {
            return None;
        }
        let column = self.column_indexes[self.segment.global_index(local)];
        (!column.is_padding()).then(|| column.as_usize())
    }

    /// Value stored in slot `local`
    pub fn value(&self, local: usize) -> Option<T> {
        (local < self.capacity()).then(|| self.values[self.segment.global_index(local)])
    }

    /// Occupied `(column, value)` pairs in slot order
    pub fn iter(&self) -> impl Iterator<Item = (usize, T)> + '_ {
        self.segment.iter().map_while(|e| {
            let column = self.column_indexes[e.global];
            (!column.is_padding()).then(|| (column.as_usize(), self.values[e.global]))
        })
    }

    /// Number of occupied slots
    pub fn nonzeros(&self) -> usize {
        self.iter().count()
    }
}

/// Write access to the slots of one row
#[derive(Debug)]
pub struct RowViewMut<'a, T, I> {
    segment: SegmentView,
    columns: usize,
    column_indexes: &'a mut [I],
    values: &'a mut [T],
}

impl<'a, T: Element, I: SegmentIndex> RowViewMut<'a, T, I> {
    pub(crate) fn new(
        segment: SegmentView,
        columns: usize,
        column_indexes: &'a mut [I],
        values: &'a mut [T],
    ) -> Self {
        Self {
            segment,
            columns,
            column_indexes,
            values,
        }
    }

    /// Row index
    pub fn index(&self) -> usize {
        self.segment.index()
    }

    /// Slots reserved for this row
    pub fn capacity(&self) -> usize {
        self.segment.size()
    }

    /// Column stored in slot `local`
    pub fn column(&self, local: usize) -> Option<usize> {
        if local >= self.capacity() {
            return None;
        }
        let column = self.column_indexes[self.segment.global_index(local)];
        (!column.is_padding()).then(|| column.as_usize())
    }

    /// Occupied slot holding `column`
    fn slot_of(&self, column: usize) -> Option<usize> {
        self.segment
            .iter()
            .map(|e| self.column_indexes[e.global])
            .take_while(|c| !c.is_padding())
            .position(|c| c.as_usize() == column)
    }

    /// Mutable value of slot `local`
    pub fn value_mut(&mut self, local: usize) -> Option<&mut T> {
        if local >= self.capacity() {
            return None;
        }
        Some(&mut self.values[self.segment.global_index(local)])
    }

    /// Store `(column, value)` in slot `local`
    ///
    /// Rows are filled from slot 0, so `local` must be occupied already or
    /// be the first free slot.
    ///
    /// # Errors
    ///
    /// - `CapacityExceeded` if `local` is past the row's capacity
    /// - `IndexOutOfBounds` if `column` is past the matrix's columns
    /// - `InvalidArgument` if an earlier slot is still free or another slot
    ///   of the row already holds `column`
    pub fn set(&mut self, local: usize, column: usize, value: T) -> Result<()> {
        let size = self.capacity();
        if local >= size {
            return Err(Error::CapacityExceeded {
                segment: self.index(),
                local,
                size,
            });
        }
        if column >= self.columns {
            return Err(Error::IndexOutOfBounds {
                index: column,
                size: self.columns,
            });
        }
        if local > 0 && self.column(local - 1).is_none() {
            return Err(Error::invalid_argument(
                "local",
                format!("slot {} is free; rows are filled from slot 0", local - 1),
            ));
        }
        if let Some(other) = self.slot_of(column).filter(|&other| other != local) {
            return Err(Error::invalid_argument(
                "column",
                format!("column {column} is already stored in slot {other}"),
            ));
        }
        let global = self.segment.global_index(local);
        self.column_indexes[global] = I::try_from_usize(column, "column index")?;
        self.values[global] = value;
        Ok(())
    }
}
