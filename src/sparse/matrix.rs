//! Sparse matrix over a segment layout

use super::row::{RowView, RowViewMut};
use crate::dtype::index::to_index_vec;
use crate::dtype::{Element, SegmentIndex};
use crate::error::{Error, Result};
use crate::io::{Header, read_array, write_array};
use crate::runtime::helpers::DisjointSlice;
use crate::runtime::{ExecutionContext, Residency};
use crate::segments::kernels::{
    KernelKind, ReductionKernel, ScalarKernel, SegmentReduction, SegmentReductionKernel,
};
use crate::segments::{Csr, LayoutState, SegmentView, Segments, SegmentsView, for_slots};
use std::io::{Read, Write};
use std::ops::Range;

/// A sparse matrix whose rows are the segments of a layout `S`
///
/// Every slot of the layout holds a column index of type `I` and a value of
/// type `T`. Free slots hold the padding marker ([`SegmentIndex::padding`])
/// and zero. Rows are filled from slot 0 in insertion order, so the first
/// free slot of a row ends its occupied prefix.
///
/// # Lifecycle
///
/// `new` yields an `Uninitialized` matrix. [`SparseMatrix::set_row_capacities`]
/// sizes the layout (`Sized`) and allocates the slot buffers (`Ready`).
/// Element access and reductions require `Ready`.
///
/// # Example
///
/// ```rust,ignore
/// let mut m = SparseMatrix::<f64, i32>::with_row_capacities(2, 2, &[1, 2])?;
/// m.set_element(1, 0, 4.0)?;
/// m.add_element(1, 0, 1.0, 2.0)?; // 4 * 2 + 1
/// assert_eq!(m.element(1, 0)?, 9.0);
/// ```
#[derive(Clone, Debug)]
pub struct SparseMatrix<T: Element, I: SegmentIndex = i32, S: Segments<I> = Csr<I>> {
    rows: usize,
    columns: usize,
    segments: S,
    column_indexes: Vec<I>,
    values: Vec<T>,
    state: LayoutState,
}

/// One slot of a matrix
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MatrixElement<T> {
    /// Row index
    pub row: usize,
    /// Slot inside the row
    pub local: usize,
    /// Column, `None` for free and padding slots
    pub column: Option<usize>,
    /// Stored value (zero for free slots)
    pub value: T,
}

enum Slot {
    Occupied(usize),
    Free(usize),
    Full(usize),
}

impl<T: Element, I: SegmentIndex, S: Segments<I>> SparseMatrix<T, I, S> {
    /// Uninitialized `rows x columns` matrix with a default layout
    pub fn new(rows: usize, columns: usize) -> Self {
        Self::with_layout(rows, columns, S::default())
    }

    /// Uninitialized matrix over a configured layout
    ///
    /// The layout's parameters (organization, alignment, slice or strip
    /// size) are kept; its sizes are dropped and set again by
    /// [`SparseMatrix::set_row_capacities`].
    pub fn with_layout(rows: usize, columns: usize, mut layout: S) -> Self {
        layout.reset();
        Self {
            rows,
            columns,
            segments: layout,
            column_indexes: Vec::new(),
            values: Vec::new(),
            state: LayoutState::Uninitialized,
        }
    }

    /// Ready matrix with the given row capacities
    pub fn with_row_capacities(rows: usize, columns: usize, capacities: &[I]) -> Result<Self> {
        let mut matrix = Self::new(rows, columns);
        matrix.set_row_capacities(capacities)?;
        Ok(matrix)
    }

    /// Ready matrix holding `(row, column, value)` triplets
    ///
    /// Row capacities are the triplet counts per row. Repeated coordinates
    /// are summed.
    pub fn from_triplets(rows: usize, columns: usize, triplets: &[(usize, usize, T)]) -> Result<Self> {
        let mut counts = vec![0usize; rows];
        for &(row, column, _) in triplets {
            check_index(row, rows)?;
            check_index(column, columns)?;
            counts[row] += 1;
        }
        let capacities = to_index_vec::<I>(&counts, "row capacity")?;
        let mut matrix = Self::with_row_capacities(rows, columns, &capacities)?;
        for &(row, column, value) in triplets {
            matrix.add_element(row, column, value, T::one())?;
        }
        Ok(matrix)
    }

    /// Size the layout for `capacities` and allocate the slot buffers
    ///
    /// Previously stored elements are discarded.
    ///
    /// # Errors
    ///
    /// - `ShapeMismatch` if `capacities.len() != rows`
    /// - `InvalidArgument` or `IndexOverflow` from the layout; the matrix is
    ///   left unchanged
    /// - `Backend` if the slot buffers cannot be allocated. The layout has
    ///   already been resized at that point: the matrix stays `Sized` with
    ///   empty buffers and must be sized again before use.
    pub fn set_row_capacities(&mut self, capacities: &[I]) -> Result<()> {
        if capacities.len() != self.rows {
            return Err(Error::shape_mismatch(self.rows, capacities.len()));
        }
        // Every valid column must differ from the padding marker.
        I::try_from_usize(self.columns, "column count")?;

        self.segments.set_segments_sizes(capacities)?;
        self.column_indexes = Vec::new();
        self.values = Vec::new();
        self.state = LayoutState::Sized;

        let storage = self.segments.storage_size();
        self.column_indexes = allocate(storage, I::padding())?;
        self.values = allocate(storage, T::zero())?;
        self.state = LayoutState::Ready;

        tracing::debug!(
            rows = self.rows,
            columns = self.columns,
            storage,
            layout = %self.segments.kind(),
            "allocated sparse matrix"
        );
        Ok(())
    }

    /// Drop layout and elements
    pub fn reset(&mut self) {
        self.segments.reset();
        self.column_indexes = Vec::new();
        self.values = Vec::new();
        self.state = LayoutState::Uninitialized;
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Current state
    pub fn state(&self) -> LayoutState {
        self.state
    }

    /// The row layout
    pub fn segments(&self) -> &S {
        &self.segments
    }

    /// Column index of every slot, in storage order
    pub fn column_indexes(&self) -> &[I] {
        &self.column_indexes
    }

    /// Value of every slot, in storage order
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Mutable values in storage order; the sparsity pattern is fixed
    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.values
    }

    /// Where the element buffers live
    pub fn residency(&self) -> Residency {
        Residency::Host
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.state != LayoutState::Ready {
            return Err(Error::NotInitialized {
                what: "sparse matrix",
            });
        }
        Ok(())
    }

    fn find_slot(&self, row: usize, column: usize) -> Slot {
        let segment = self.segments.view().segment(row);
        for element in &segment {
            let stored = self.column_indexes[element.global];
            if stored.is_padding() {
                return Slot::Free(element.global);
            }
            if stored.as_usize() == column {
                return Slot::Occupied(element.global);
            }
        }
        Slot::Full(segment.size())
    }

    fn update_element(
        &mut self,
        row: usize,
        column: usize,
        update: impl FnOnce(Option<T>) -> T,
    ) -> Result<()> {
        self.ensure_ready()?;
        check_index(row, self.rows)?;
        check_index(column, self.columns)?;
        match self.find_slot(row, column) {
            Slot::Occupied(global) => self.values[global] = update(Some(self.values[global])),
            Slot::Free(global) => {
                self.column_indexes[global] = I::try_from_usize(column, "column index")?;
                self.values[global] = update(None);
            }
            Slot::Full(capacity) => {
                return Err(Error::RowCapacityExceeded {
                    row,
                    column,
                    capacity,
                });
            }
        }
        Ok(())
    }

    /// Store `value` at `(row, column)`, overwriting an existing entry
    ///
    /// # Errors
    ///
    /// - `IndexOutOfBounds` for a row or column outside the matrix
    /// - `RowCapacityExceeded` if the column is new and the row is full
    pub fn set_element(&mut self, row: usize, column: usize, value: T) -> Result<()> {
        self.update_element(row, column, |_| value)
    }

    /// Store `old * scale + value` at `(row, column)`, or `value` for a new
    /// entry
    pub fn add_element(&mut self, row: usize, column: usize, value: T, scale: T) -> Result<()> {
        self.update_element(row, column, |old| match old {
            Some(old) => old * scale + value,
            None => value,
        })
    }

    /// Value at `(row, column)`, zero if not stored
    pub fn element(&self, row: usize, column: usize) -> Result<T> {
        self.ensure_ready()?;
        check_index(row, self.rows)?;
        check_index(column, self.columns)?;
        Ok(match self.find_slot(row, column) {
            Slot::Occupied(global) => self.values[global],
            Slot::Free(_) | Slot::Full(_) => T::zero(),
        })
    }

    /// Slots reserved for `row`
    pub fn row_capacity(&self, row: usize) -> Result<usize> {
        self.ensure_ready()?;
        check_index(row, self.rows)?;
        Ok(self.segments.view().segment_size(row))
    }

    /// Read access to one row
    pub fn row(&self, row: usize) -> Result<RowView<'_, T, I>> {
        self.ensure_ready()?;
        check_index(row, self.rows)?;
        Ok(RowView::new(
            self.segments.view().segment(row),
            &self.column_indexes,
            &self.values,
        ))
    }

    /// Write access to one row
    pub fn row_mut(&mut self, row: usize) -> Result<RowViewMut<'_, T, I>> {
        self.ensure_ready()?;
        check_index(row, self.rows)?;
        Ok(RowViewMut::new(
            self.segments.view().segment(row),
            self.columns,
            &mut self.column_indexes,
            &mut self.values,
        ))
    }

    /// Number of occupied slots
    pub fn nonzeros(&self) -> usize {
        self.column_indexes.iter().filter(|c| !c.is_padding()).count()
    }

    /// Every slot of every row, padding included, in row order
    ///
    /// The iterator is lazy and borrows the matrix; call again to restart.
    /// An uninitialized matrix yields nothing.
    pub fn elements(&self) -> MatrixElements<'_, T, I, S::View<'_>> {
        let rows = if self.state == LayoutState::Ready {
            self.rows
        } else {
            0
        };
        MatrixElements {
            view: self.segments.view(),
            column_indexes: &self.column_indexes,
            values: &self.values,
            rows,
            row: 0,
            current: None,
            local: 0,
        }
    }

    /// Call `f(row, local, column, &mut value)` for every stored slot
    ///
    /// Padding slots are visited too, with `column == None`, so this sees
    /// the same slots as [`SparseMatrix::elements`]. Rows are distributed
    /// over `ctx`; the slots of one row are visited in order by one worker.
    pub fn for_all_elements<C, F>(&mut self, ctx: &C, f: F) -> Result<()>
    where
        C: ExecutionContext,
        F: Fn(usize, usize, Option<usize>, &mut T) + Sync + Send,
    {
        self.ensure_ready()?;
        let view = self.segments.view();
        let column_indexes = &self.column_indexes;
        let values = DisjointSlice::new(&mut self.values);
        for_slots(ctx, &view, 0..self.rows, |element| {
            let column = column_indexes[element.global];
            // SAFETY: each global index belongs to exactly one slot, and each
            // slot is visited once.
            let value = unsafe { values.get_mut(element.global) };
            f(
                element.segment,
                element.local,
                (!column.is_padding()).then(|| column.as_usize()),
                value,
            );
        })
    }

    /// Call `f` with a view of every row
    pub fn for_all_rows<C, F>(&self, ctx: &C, f: F) -> Result<()>
    where
        C: ExecutionContext,
        F: Fn(RowView<'_, T, I>) + Sync + Send,
    {
        self.ensure_ready()?;
        let view = self.segments.view();
        ctx.parallel_for(0..self.rows, |row| {
            f(RowView::new(view.segment(row), &self.column_indexes, &self.values))
        });
        ctx.synchronize()
    }

    /// Reduce the occupied entries of the rows in `range`
    ///
    /// `fetch(row, column, value)` runs for every occupied slot; free and
    /// padding slots contribute `identity`. `keep(row, result)` runs once
    /// per row.
    #[allow(clippy::too_many_arguments)]
    pub fn reduce_rows<C, K, R, Fetch, Reduce, Keep>(
        &self,
        ctx: &C,
        kernel: &K,
        range: Range<usize>,
        fetch: Fetch,
        reduce: Reduce,
        keep: Keep,
        identity: R,
    ) -> Result<()>
    where
        C: ExecutionContext,
        K: SegmentReductionKernel,
        R: Copy + Send + Sync,
        Fetch: Fn(usize, usize, T) -> R + Sync + Send,
        Reduce: Fn(R, R) -> R + Sync + Send,
        Keep: Fn(usize, R) + Sync + Send,
    {
        self.ensure_ready()?;
        let column_indexes = &self.column_indexes;
        let values = &self.values;
        kernel.reduce_segments(
            ctx,
            &self.segments.view(),
            range,
            |row, _, global, padding| {
                let column = column_indexes[global];
                if padding || column.is_padding() {
                    identity
                } else {
                    fetch(row, column.as_usize(), values[global])
                }
            },
            reduce,
            keep,
            identity,
        )
    }

    /// Kernel of `kind` initialized for this matrix's layout
    pub fn kernel_for(&self, kind: KernelKind) -> Result<ReductionKernel> {
        self.ensure_ready()?;
        ReductionKernel::for_view(kind, &self.segments.view())
    }

    /// Apply a built-in reduction to every row, writing `out[row]`
    ///
    /// `x` is only read when the reduction fetches from a vector.
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if `x` (when read) does not have `columns` entries or
    /// `out` does not have `rows` entries.
    pub fn row_reduce<C: ExecutionContext>(
        &self,
        ctx: &C,
        reduction: SegmentReduction,
        x: &[T],
        out: &mut [T],
        kernel: KernelKind,
    ) -> Result<()> {
        self.ensure_ready()?;
        if reduction.fetch.needs_vector() && x.len() != self.columns {
            return Err(Error::shape_mismatch(self.columns, x.len()));
        }
        if out.len() != self.rows {
            return Err(Error::shape_mismatch(self.rows, out.len()));
        }
        let kernel = self.kernel_for(kernel)?;
        let fetch = reduction.fetch;
        let op = reduction.op;
        let out = DisjointSlice::new(out);
        self.reduce_rows(
            ctx,
            &kernel,
            0..self.rows,
            |_, column, value| fetch.apply(value, column, x),
            |a, b| op.combine(a, b),
            // SAFETY: `keep` runs once per row.
            |row, result| unsafe { out.write(row, result) },
            op.identity(),
        )
    }

    /// `out = A x`
    pub fn vector_product<C: ExecutionContext>(
        &self,
        ctx: &C,
        x: &[T],
        out: &mut [T],
        kernel: KernelKind,
    ) -> Result<()> {
        self.row_reduce(ctx, SegmentReduction::dot(), x, out, kernel)
    }

    /// Sum of every row's entries
    pub fn row_sums<C: ExecutionContext>(&self, ctx: &C) -> Result<Vec<T>> {
        let mut out = vec![T::zero(); self.rows];
        self.row_reduce(ctx, SegmentReduction::sum(), &[], &mut out, KernelKind::default())?;
        Ok(out)
    }

    /// Sum of the diagonal entries
    pub fn trace<C: ExecutionContext>(&self, ctx: &C) -> Result<T> {
        let diagonal = self.rows.min(self.columns);
        let mut partials = vec![T::zero(); diagonal];
        {
            let slots = DisjointSlice::new(&mut partials);
            self.reduce_rows(
                ctx,
                &ScalarKernel,
                0..diagonal,
                |row, column, value| if row == column { value } else { T::zero() },
                |a, b| a + b,
                // SAFETY: `keep` runs once per row.
                |row, result| unsafe { slots.write(row, result) },
                T::zero(),
            )?;
        }
        Ok(partials.into_iter().fold(T::zero(), |a, b| a + b))
    }

    /// Serialize dimensions, layout and slot buffers
    ///
    /// # Errors
    ///
    /// `NotInitialized` unless the matrix is `Ready`.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.ensure_ready()?;
        Header::for_layout::<I, S>(&self.segments, Some(T::DTYPE)).write(writer)?;
        write_array(writer, &[self.rows as u64, self.columns as u64])?;
        self.segments.write_body(writer)?;
        write_array(writer, &self.column_indexes)?;
        write_array(writer, &self.values)
    }

    /// Deserialize a matrix written by [`SparseMatrix::save`]
    ///
    /// # Errors
    ///
    /// - `IncompatibleLayout` if the stream holds another layout,
    ///   organization, index type or value type
    /// - `InvalidArgument` if the stored arrays are inconsistent, including
    ///   rows with a repeated column or a column after a free slot
    pub fn load<R: Read>(reader: &mut R) -> Result<Self> {
        let header = Header::read(reader)?;
        header.expect_value(Some(T::DTYPE))?;

        let dims: Vec<u64> = read_array(reader)?;
        let [rows, columns] = <[u64; 2]>::try_from(dims.as_slice()).map_err(|_| {
            Error::invalid_argument("dimensions", format!("expected 2 entries, found {}", dims.len()))
        })?;
        let rows = usize::try_from(rows)
            .map_err(|_| Error::invalid_argument("rows", format!("{rows} exceeds usize")))?;
        let columns = usize::try_from(columns)
            .map_err(|_| Error::invalid_argument("columns", format!("{columns} exceeds usize")))?;

        let segments = S::read_body(&header, reader)?;
        if segments.segments_count() != rows {
            return Err(Error::invalid_argument(
                "rows",
                format!("layout has {} segments, matrix {rows} rows", segments.segments_count()),
            ));
        }

        let column_indexes: Vec<I> = read_array(reader)?;
        let values: Vec<T> = read_array(reader)?;
        let storage = segments.storage_size();
        if column_indexes.len() != storage {
            return Err(Error::shape_mismatch(storage, column_indexes.len()));
        }
        if values.len() != storage {
            return Err(Error::shape_mismatch(storage, values.len()));
        }
        if let Some(bad) = column_indexes
            .iter()
            .find(|c| !c.is_padding() && c.try_as_usize().is_none_or(|c| c >= columns))
        {
            return Err(Error::invalid_argument(
                "column_indexes",
                format!("column {bad} outside 0..{columns}"),
            ));
        }

        check_row_fill(&segments.view(), &column_indexes)?;

        Ok(Self {
            rows,
            columns,
            segments,
            column_indexes,
            values,
            state: LayoutState::Ready,
        })
    }
}

/// Every row must hold distinct columns packed from slot 0
fn check_row_fill<V: SegmentsView, I: SegmentIndex>(view: &V, column_indexes: &[I]) -> Result<()> {
    let mut seen = Vec::new();
    for row in 0..view.segments_count() {
        seen.clear();
        let mut free = false;
        for slot in view.segment(row).slots() {
            let column = column_indexes[slot.global];
            if column.is_padding() {
                free = true;
            } else if free || slot.padding {
                return Err(Error::invalid_argument(
                    "column_indexes",
                    format!("row {row} stores a column after a free slot"),
                ));
            } else {
                seen.push(column.as_usize());
            }
        }
        seen.sort_unstable();
        if let Some(pair) = seen.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(Error::invalid_argument(
                "column_indexes",
                format!("row {row} stores column {} twice", pair[0]),
            ));
        }
    }
    Ok(())
}

/// Iterator returned by [`SparseMatrix::elements`]
#[derive(Clone, Debug)]
pub struct MatrixElements<'a, T, I, V> {
    view: V,
    column_indexes: &'a [I],
    values: &'a [T],
    rows: usize,
    row: usize,
    current: Option<SegmentView>,
    local: usize,
}

impl<T: Element, I: SegmentIndex, V: SegmentsView> Iterator for MatrixElements<'_, T, I, V> {
    type Item = MatrixElement<T>;

    fn next(&mut self) -> Option<MatrixElement<T>> {
        loop {
            if self.current.is_none() {
                if self.row >= self.rows {
                    return None;
                }
                self.current = Some(self.view.segment(self.row));
                self.local = 0;
            }
            let segment = self.current.as_ref()?;
            if self.local < segment.capacity() {
                let global = segment.global_index(self.local);
                let column = self.column_indexes[global];
                let element = MatrixElement {
                    row: self.row,
                    local: self.local,
                    column: (!column.is_padding()).then(|| column.as_usize()),
                    value: self.values[global],
                };
                self.local += 1;
                return Some(element);
            }
            self.current = None;
            self.row += 1;
        }
    }
}

fn check_index(index: usize, size: usize) -> Result<()> {
    if index >= size {
        return Err(Error::IndexOutOfBounds { index, size });
    }
    Ok(())
}

fn allocate<V: Copy>(len: usize, fill: V) -> Result<Vec<V>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|e| Error::Backend(format!("allocating {len} slots: {e}")))?;
    buffer.resize(len, fill);
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::CpuClient;
    use crate::segments::{BiEllpack, ElementsOrganization, Ellpack};

    #[test]
    fn test_insertion_fills_first_free_slot() {
        let mut m = SparseMatrix::<f64, i32>::with_row_capacities(2, 4, &[2, 1]).unwrap();
        m.set_element(0, 3, 1.0).unwrap();
        m.set_element(0, 1, 2.0).unwrap();
        m.set_element(0, 3, 5.0).unwrap();
        let row: Vec<_> = m.row(0).unwrap().iter().collect();
        assert_eq!(row, vec![(3, 5.0), (1, 2.0)]);
        assert!(matches!(
            m.set_element(0, 0, 1.0),
            Err(Error::RowCapacityExceeded {
                row: 0,
                column: 0,
                capacity: 2
            })
        ));
        assert!(matches!(
            m.set_element(1, 4, 1.0),
            Err(Error::IndexOutOfBounds { index: 4, size: 4 })
        ));
        assert_eq!(m.nonzeros(), 2);
    }

    #[test]
    fn test_add_element_scales_existing() {
        let mut m = SparseMatrix::<f32, u32>::with_row_capacities(1, 1, &[1]).unwrap();
        m.add_element(0, 0, 3.0, 10.0).unwrap();
        assert_eq!(m.element(0, 0).unwrap(), 3.0);
        m.add_element(0, 0, 1.0, 2.0).unwrap();
        assert_eq!(m.element(0, 0).unwrap(), 7.0);
    }

    #[test]
    fn test_uninitialized_access_rejected() {
        let m = SparseMatrix::<f64, i64>::new(3, 3);
        assert!(matches!(m.element(0, 0), Err(Error::NotInitialized { .. })));
        assert_eq!(m.elements().count(), 0);
        let mut m = m;
        assert!(m.set_row_capacities(&[1, 1]).is_err());
        assert_eq!(m.state(), LayoutState::Uninitialized);
    }

    #[test]
    fn test_elements_include_padding() {
        let layout = Ellpack::<i32>::new(ElementsOrganization::ColumnMajor);
        let mut m = SparseMatrix::<f64, i32, Ellpack<i32>>::with_layout(2, 3, layout);
        m.set_row_capacities(&[1, 2]).unwrap();
        m.set_element(1, 2, 4.0).unwrap();
        let elements: Vec<_> = m.elements().collect();
        assert_eq!(elements.len(), 4);
        assert_eq!(
            elements[2],
            MatrixElement {
                row: 1,
                local: 0,
                column: Some(2),
                value: 4.0
            }
        );
        assert_eq!(elements[1].column, None);
        assert_eq!(m.elements().count(), 4);
    }

    #[test]
    fn test_for_all_elements_scales_values() {
        let mut m = SparseMatrix::<f64, i32, BiEllpack<i32>>::from_triplets(
            3,
            3,
            &[(0, 0, 1.0), (1, 1, 2.0), (1, 2, 3.0), (2, 0, 4.0)],
        )
        .unwrap();
        m.for_all_elements(&CpuClient::default(), |_, _, column, value| {
            if column.is_some() {
                *value *= 10.0;
            }
        })
        .unwrap();
        assert_eq!(m.element(1, 2).unwrap(), 30.0);
        assert_eq!(m.row_sums(&CpuClient::default()).unwrap(), vec![10.0, 50.0, 40.0]);
    }

    #[test]
    fn test_trace() {
        let m = SparseMatrix::<i64, i32>::from_triplets(
            2,
            3,
            &[(0, 0, 2), (0, 2, 9), (1, 1, 5), (1, 1, 1)],
        )
        .unwrap();
        assert_eq!(m.trace(&CpuClient::sequential()).unwrap(), 8);
    }

    #[test]
    fn test_row_mut_requires_contiguous_fill() {
        let mut m = SparseMatrix::<f64, i32>::with_row_capacities(1, 5, &[3]).unwrap();
        {
            let mut row = m.row_mut(0).unwrap();
            row.set(0, 4, 1.0).unwrap();
            assert!(row.set(2, 1, 1.0).is_err());
            row.set(1, 1, 2.0).unwrap();
            *row.value_mut(0).unwrap() += 1.0;
        }
        assert_eq!(m.element(0, 4).unwrap(), 2.0);
        assert_eq!(m.row(0).unwrap().nonzeros(), 2);
    }

    #[test]
    fn test_row_mut_rejects_repeated_column() {
        let mut m = SparseMatrix::<f64, i32>::with_row_capacities(1, 5, &[2]).unwrap();
        {
            let mut row = m.row_mut(0).unwrap();
            row.set(0, 4, 1.0).unwrap();
            assert!(matches!(
                row.set(1, 4, 2.0),
                Err(Error::InvalidArgument { arg: "column", .. })
            ));
            row.set(0, 4, 3.0).unwrap();
        }
        assert_eq!(m.row(0).unwrap().iter().collect::<Vec<_>>(), vec![(4, 3.0)]);
        let mut y = vec![0.0];
        m.vector_product(&CpuClient::default(), &[1.0; 5], &mut y, KernelKind::Scalar)
            .unwrap();
        assert_eq!(y, vec![3.0]);
    }

    #[test]
    fn test_for_all_elements_visits_padding() {
        let layout = Ellpack::<i32>::new(ElementsOrganization::RowMajor);
        let mut m = SparseMatrix::<f64, i32, Ellpack<i32>>::with_layout(2, 3, layout);
        m.set_row_capacities(&[1, 3]).unwrap();
        m.set_element(0, 1, 1.0).unwrap();
        m.set_element(1, 0, 2.0).unwrap();
        let visits = std::sync::Mutex::new(Vec::new());
        m.for_all_elements(&CpuClient::default(), |row, local, column, _| {
            visits.lock().unwrap().push((row, local, column))
        })
        .unwrap();
        let mut visits = visits.into_inner().unwrap();
        visits.sort_unstable();
        let expected: Vec<_> = m.elements().map(|e| (e.row, e.local, e.column)).collect();
        assert_eq!(visits.len(), m.segments().storage_size());
        assert_eq!(visits, expected);
    }

    #[test]
    fn test_load_rejects_malformed_rows() {
        let mut m = SparseMatrix::<f64, i32>::with_row_capacities(2, 4, &[2, 3]).unwrap();
        m.set_element(0, 1, 1.0).unwrap();
        m.set_element(0, 3, 2.0).unwrap();
        m.set_element(1, 0, 3.0).unwrap();

        let mut repeated = m.clone();
        repeated.column_indexes[1] = 1;
        let mut bytes = Vec::new();
        repeated.save(&mut bytes).unwrap();
        assert!(matches!(
            SparseMatrix::<f64, i32>::load(&mut bytes.as_slice()),
            Err(Error::InvalidArgument { arg: "column_indexes", .. })
        ));

        let mut gap = m.clone();
        gap.column_indexes[4] = 2;
        let mut bytes = Vec::new();
        gap.save(&mut bytes).unwrap();
        assert!(matches!(
            SparseMatrix::<f64, i32>::load(&mut bytes.as_slice()),
            Err(Error::InvalidArgument { arg: "column_indexes", .. })
        ));

        let mut bytes = Vec::new();
        m.save(&mut bytes).unwrap();
        let loaded = SparseMatrix::<f64, i32>::load(&mut bytes.as_slice()).unwrap();
        assert_eq!(loaded.element(0, 3).unwrap(), 2.0);
    }
}
