#![forbid(unsafe_code)]

use std::ops::Range;

use gf_array::{ArrayError, TypedArray};
use gf_index::{Index, IndexError, Key};
use gf_stats::Stats;
use gf_types::{Cell, DataType, TypeError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrameError {
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Array(#[from] ArrayError),
    #[error(transparent)]
    Type(#[from] TypeError),
    /// The first failure raised by a worker of a parallel traversal, in
    /// ordinal order of the reduction. Remaining work was abandoned.
    #[error("parallel traversal failed: {0}")]
    Aggregate(#[source] Box<FrameError>),
}

/// Execution mode for bulk operations on a view or frame.
///
/// Sequential visits elements in strict ordinal order. Parallel splits the
/// ordinal space into contiguous ranges across a worker pool; no two workers
/// share an ordinal, and ordered results are reduced back into ordinal order
/// before returning, so the two modes are observationally equivalent for
/// pure callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecMode {
    #[default]
    Sequential,
    Parallel,
}

/// Split `[0, len)` into at most `chunks` contiguous ranges of near-equal
/// size, in ascending order.
fn partition_ranges(len: usize, chunks: usize) -> Vec<Range<usize>> {
    if len == 0 || chunks == 0 {
        return Vec::new();
    }
    let chunks = chunks.min(len);
    let base = len / chunks;
    let extra = len % chunks;
    let mut ranges = Vec::with_capacity(chunks);
    let mut start = 0;
    for i in 0..chunks {
        let size = base + usize::from(i < extra);
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}

fn worker_count() -> usize {
    rayon::current_num_threads().max(1)
}

type WriteFn<T> = fn(&mut TypedArray, usize, T) -> Result<(), ArrayError>;

/// An in-memory, labeled, two-dimensional columnar container.
///
/// Owns one row [`Index`], one column [`Index`] and one [`TypedArray`] per
/// column (`data[j]` belongs to column ordinal `j`). Every column array's
/// length equals the row count at all times; any cell is addressable both by
/// key pair and by ordinal pair, and the two modes always agree.
///
/// Axis mutation takes `&mut self`, so the borrow checker statically rules
/// out mutating an axis while a view or cursor traversal is in flight.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(bound(serialize = "R: Serialize, C: Serialize"))]
pub struct Frame<R: Key, C: Key> {
    rows: Index<R>,
    cols: Index<C>,
    data: Vec<TypedArray>,
}

impl<'de, R, C> Deserialize<'de> for Frame<R, C>
where
    R: Key + Deserialize<'de>,
    C: Key + Deserialize<'de>,
{
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(bound(deserialize = "R: Deserialize<'de>, C: Deserialize<'de>"))]
        struct Raw<R: Key, C: Key> {
            rows: Index<R>,
            cols: Index<C>,
            data: Vec<TypedArray>,
        }
        let raw: Raw<R, C> = Raw::deserialize(deserializer)?;
        if raw.data.len() != raw.cols.len() {
            return Err(serde::de::Error::custom(format!(
                "{} column arrays for {} column keys",
                raw.data.len(),
                raw.cols.len()
            )));
        }
        for (ordinal, array) in raw.data.iter().enumerate() {
            if array.len() != raw.rows.len() {
                return Err(serde::de::Error::custom(format!(
                    "column {ordinal} has length {} in a frame of {} rows",
                    array.len(),
                    raw.rows.len()
                )));
            }
        }
        Ok(Self {
            rows: raw.rows,
            cols: raw.cols,
            data: raw.data,
        })
    }
}

impl<R: Key, C: Key> Frame<R, C> {
    /// A null-filled frame over the given row index and typed columns.
    pub fn new(
        rows: Index<R>,
        columns: impl IntoIterator<Item = (C, DataType)>,
    ) -> Result<Self, FrameError> {
        let mut cols = Index::new();
        let mut data = Vec::new();
        for (key, data_type) in columns {
            cols.add(key)?;
            data.push(TypedArray::with_length(data_type, rows.len()));
        }
        Ok(Self { rows, cols, data })
    }

    /// A double frame filled from a per-cell function of (row, col) ordinals.
    pub fn from_fn_doubles(
        row_keys: impl IntoIterator<Item = R>,
        col_keys: impl IntoIterator<Item = C>,
        f: impl Fn(usize, usize) -> f64,
    ) -> Result<Self, FrameError> {
        let rows = Index::from_keys(row_keys)?;
        let mut cols = Index::new();
        let mut data = Vec::new();
        for (col_ordinal, key) in col_keys.into_iter().enumerate() {
            cols.add(key)?;
            let column: Vec<f64> = (0..rows.len()).map(|row| f(row, col_ordinal)).collect();
            data.push(TypedArray::from_doubles(column));
        }
        Ok(Self { rows, cols, data })
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn col_count(&self) -> usize {
        self.cols.len()
    }

    #[must_use]
    pub fn row_index(&self) -> &Index<R> {
        &self.rows
    }

    #[must_use]
    pub fn col_index(&self) -> &Index<C> {
        &self.cols
    }

    /// Declared tag of a column.
    pub fn col_type(&self, key: &C) -> Result<DataType, FrameError> {
        let ordinal = self.col_ordinal(key)?;
        Ok(self.data[ordinal].data_type())
    }

    fn row_ordinal(&self, key: &R) -> Result<usize, FrameError> {
        Ok(self
            .rows
            .ordinal_of(key)
            .ok_or_else(|| IndexError::key_not_found(key))?)
    }

    fn col_ordinal(&self, key: &C) -> Result<usize, FrameError> {
        Ok(self
            .cols
            .ordinal_of(key)
            .ok_or_else(|| IndexError::key_not_found(key))?)
    }

    fn resolve(&self, row_key: &R, col_key: &C) -> Result<(usize, usize), FrameError> {
        Ok((self.row_ordinal(row_key)?, self.col_ordinal(col_key)?))
    }

    fn array_at(&self, col: usize) -> Result<&TypedArray, FrameError> {
        self.data.get(col).ok_or(FrameError::Index(IndexError::OutOfBounds {
            ordinal: col,
            len: self.data.len(),
        }))
    }

    fn array_at_mut(&mut self, col: usize) -> Result<&mut TypedArray, FrameError> {
        let len = self.data.len();
        self.data
            .get_mut(col)
            .ok_or(FrameError::Index(IndexError::OutOfBounds { ordinal: col, len }))
    }

    // ── Axis mutation (exclusive operations) ───────────────────────────

    /// Append a row; every column array gains one null slot.
    pub fn add_row(&mut self, key: R) -> Result<usize, FrameError> {
        let ordinal = self.rows.add(key)?;
        let new_len = self.rows.len();
        for array in &mut self.data {
            array.resize(new_len);
        }
        Ok(ordinal)
    }

    /// Append a fully-sized null column of the given tag.
    pub fn add_column(&mut self, key: C, data_type: DataType) -> Result<usize, FrameError> {
        let ordinal = self.cols.add(key)?;
        self.data
            .push(TypedArray::with_length(data_type, self.rows.len()));
        Ok(ordinal)
    }

    /// Remove a row; later row ordinals shift down by one in every column.
    /// O(rows × cols) by design, mirroring the index re-linearization cost.
    pub fn remove_row(&mut self, key: &R) -> Result<usize, FrameError> {
        let ordinal = self.rows.remove(key)?;
        for array in &mut self.data {
            array.remove(ordinal)?;
        }
        Ok(ordinal)
    }

    /// Remove a column and its array; later column ordinals shift down.
    pub fn remove_column(&mut self, key: &C) -> Result<usize, FrameError> {
        let ordinal = self.cols.remove(key)?;
        self.data.remove(ordinal);
        Ok(ordinal)
    }

    // ── Cell reads ─────────────────────────────────────────────────────

    pub fn get_bool(&self, row_key: &R, col_key: &C) -> Result<bool, FrameError> {
        let (row, col) = self.resolve(row_key, col_key)?;
        self.get_bool_at(row, col)
    }

    pub fn get_bool_at(&self, row: usize, col: usize) -> Result<bool, FrameError> {
        Ok(self.array_at(col)?.get_bool(row)?)
    }

    pub fn get_int(&self, row_key: &R, col_key: &C) -> Result<i32, FrameError> {
        let (row, col) = self.resolve(row_key, col_key)?;
        self.get_int_at(row, col)
    }

    pub fn get_int_at(&self, row: usize, col: usize) -> Result<i32, FrameError> {
        Ok(self.array_at(col)?.get_int(row)?)
    }

    pub fn get_long(&self, row_key: &R, col_key: &C) -> Result<i64, FrameError> {
        let (row, col) = self.resolve(row_key, col_key)?;
        self.get_long_at(row, col)
    }

    pub fn get_long_at(&self, row: usize, col: usize) -> Result<i64, FrameError> {
        Ok(self.array_at(col)?.get_long(row)?)
    }

    pub fn get_double(&self, row_key: &R, col_key: &C) -> Result<f64, FrameError> {
        let (row, col) = self.resolve(row_key, col_key)?;
        self.get_double_at(row, col)
    }

    pub fn get_double_at(&self, row: usize, col: usize) -> Result<f64, FrameError> {
        Ok(self.array_at(col)?.get_double(row)?)
    }

    pub fn get_utf8(&self, row_key: &R, col_key: &C) -> Result<&str, FrameError> {
        let (row, col) = self.resolve(row_key, col_key)?;
        self.get_utf8_at(row, col)
    }

    pub fn get_utf8_at(&self, row: usize, col: usize) -> Result<&str, FrameError> {
        Ok(self.array_at(col)?.get_utf8(row)?)
    }

    /// Untyped read; null slots surface as the column tag's sentinel.
    pub fn get_cell(&self, row_key: &R, col_key: &C) -> Result<Cell, FrameError> {
        let (row, col) = self.resolve(row_key, col_key)?;
        self.get_cell_at(row, col)
    }

    pub fn get_cell_at(&self, row: usize, col: usize) -> Result<Cell, FrameError> {
        Ok(self.array_at(col)?.get_cell(row)?)
    }

    pub fn is_null(&self, row_key: &R, col_key: &C) -> Result<bool, FrameError> {
        let (row, col) = self.resolve(row_key, col_key)?;
        self.is_null_at(row, col)
    }

    pub fn is_null_at(&self, row: usize, col: usize) -> Result<bool, FrameError> {
        Ok(self.array_at(col)?.is_null(row)?)
    }

    // ── Cell writes ────────────────────────────────────────────────────

    pub fn set_bool(&mut self, row_key: &R, col_key: &C, value: bool) -> Result<(), FrameError> {
        let (row, col) = self.resolve(row_key, col_key)?;
        self.set_bool_at(row, col, value)
    }

    pub fn set_bool_at(&mut self, row: usize, col: usize, value: bool) -> Result<(), FrameError> {
        Ok(self.array_at_mut(col)?.set_bool(row, value)?)
    }

    pub fn set_int(&mut self, row_key: &R, col_key: &C, value: i32) -> Result<(), FrameError> {
        let (row, col) = self.resolve(row_key, col_key)?;
        self.set_int_at(row, col, value)
    }

    pub fn set_int_at(&mut self, row: usize, col: usize, value: i32) -> Result<(), FrameError> {
        Ok(self.array_at_mut(col)?.set_int(row, value)?)
    }

    pub fn set_long(&mut self, row_key: &R, col_key: &C, value: i64) -> Result<(), FrameError> {
        let (row, col) = self.resolve(row_key, col_key)?;
        self.set_long_at(row, col, value)
    }

    pub fn set_long_at(&mut self, row: usize, col: usize, value: i64) -> Result<(), FrameError> {
        Ok(self.array_at_mut(col)?.set_long(row, value)?)
    }

    pub fn set_double(&mut self, row_key: &R, col_key: &C, value: f64) -> Result<(), FrameError> {
        let (row, col) = self.resolve(row_key, col_key)?;
        self.set_double_at(row, col, value)
    }

    pub fn set_double_at(&mut self, row: usize, col: usize, value: f64) -> Result<(), FrameError> {
        Ok(self.array_at_mut(col)?.set_double(row, value)?)
    }

    pub fn set_utf8(
        &mut self,
        row_key: &R,
        col_key: &C,
        value: impl Into<String>,
    ) -> Result<(), FrameError> {
        let (row, col) = self.resolve(row_key, col_key)?;
        self.set_utf8_at(row, col, value)
    }

    pub fn set_utf8_at(
        &mut self,
        row: usize,
        col: usize,
        value: impl Into<String>,
    ) -> Result<(), FrameError> {
        Ok(self.array_at_mut(col)?.set_utf8(row, value)?)
    }

    pub fn set_cell(&mut self, row_key: &R, col_key: &C, value: Cell) -> Result<(), FrameError> {
        let (row, col) = self.resolve(row_key, col_key)?;
        self.set_cell_at(row, col, value)
    }

    pub fn set_cell_at(&mut self, row: usize, col: usize, value: Cell) -> Result<(), FrameError> {
        Ok(self.array_at_mut(col)?.set_cell(row, value)?)
    }

    pub fn set_null(&mut self, row_key: &R, col_key: &C) -> Result<(), FrameError> {
        let (row, col) = self.resolve(row_key, col_key)?;
        self.set_null_at(row, col)
    }

    pub fn set_null_at(&mut self, row: usize, col: usize) -> Result<(), FrameError> {
        Ok(self.array_at_mut(col)?.set_null(row)?)
    }

    // ── Views and handles ──────────────────────────────────────────────

    #[must_use]
    pub fn rows(&self) -> RowsView<'_, R, C> {
        RowsView {
            frame: self,
            selected: None,
            mode: ExecMode::Sequential,
        }
    }

    #[must_use]
    pub fn cols(&self) -> ColsView<'_, R, C> {
        ColsView {
            frame: self,
            selected: None,
            mode: ExecMode::Sequential,
        }
    }

    pub fn row(&self, key: &R) -> Result<RowVector<'_, R, C>, FrameError> {
        let ordinal = self.row_ordinal(key)?;
        RowVector::new(self, ordinal)
    }

    pub fn col(&self, key: &C) -> Result<ColVector<'_, R, C>, FrameError> {
        let ordinal = self.col_ordinal(key)?;
        ColVector::new(self, ordinal)
    }

    /// A fresh cursor positioned at (0, 0).
    #[must_use]
    pub fn cursor(&self) -> Cursor<'_, R, C> {
        Cursor {
            frame: self,
            row: 0,
            col: 0,
        }
    }

    /// Flyweight handle on one cell.
    pub fn value_at(&self, row: usize, col: usize) -> Result<CellRef<'_, R, C>, FrameError> {
        let array = self.array_at(col)?;
        Ok(CellRef {
            row_key: self.rows.key_of(row)?,
            col_key: self.cols.key_of(col)?,
            row_ordinal: row,
            col_ordinal: col,
            array,
        })
    }

    // ── Materialization ────────────────────────────────────────────────

    /// A new frame holding the given rows (all columns), indexes rebuilt.
    pub fn select_rows(&self, ordinals: &[usize]) -> Result<Self, FrameError> {
        let mut row_keys = Vec::with_capacity(ordinals.len());
        for &ordinal in ordinals {
            row_keys.push(self.rows.key_of(ordinal)?.clone());
        }
        let rows = Index::from_keys(row_keys)?;
        let data = self
            .data
            .iter()
            .map(|array| array.take(ordinals))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            rows,
            cols: self.cols.clone(),
            data,
        })
    }

    /// A new frame holding the given columns (all rows), indexes rebuilt.
    pub fn select_cols(&self, ordinals: &[usize]) -> Result<Self, FrameError> {
        let mut col_keys = Vec::with_capacity(ordinals.len());
        let mut data = Vec::with_capacity(ordinals.len());
        for &ordinal in ordinals {
            col_keys.push(self.cols.key_of(ordinal)?.clone());
            data.push(self.array_at(ordinal)?.clone());
        }
        Ok(Self {
            rows: self.rows.clone(),
            cols: Index::from_keys(col_keys)?,
            data,
        })
    }

    /// Materialize one column as a single-column frame.
    pub fn col_to_frame(&self, key: &C) -> Result<Self, FrameError> {
        let ordinal = self.col_ordinal(key)?;
        self.select_cols(&[ordinal])
    }

    // ── Bulk rewrite ───────────────────────────────────────────────────

    /// Rewrite every cell from a per-cell function of (position, old value).
    ///
    /// Each cell is visited exactly once in either mode. Parallel mode
    /// assigns whole columns to workers (disjoint ordinal sets), evaluates
    /// concurrently, and is not transactional: columns finished before the
    /// first failure stay written, and the first failure in ordinal order
    /// surfaces as [`FrameError::Aggregate`].
    pub fn apply_doubles<F>(&mut self, mode: ExecMode, f: F) -> Result<(), FrameError>
    where
        F: Fn(&CellRef<'_, R, C>) -> f64 + Sync,
    {
        self.apply_internal(mode, f, TypedArray::set_double)
    }

    /// Untyped twin of [`Frame::apply_doubles`]; writes go through the same
    /// widening table as [`Frame::set_cell`].
    pub fn apply_cells<F>(&mut self, mode: ExecMode, f: F) -> Result<(), FrameError>
    where
        F: Fn(&CellRef<'_, R, C>) -> Cell + Sync,
    {
        self.apply_internal(mode, f, TypedArray::set_cell)
    }

    fn apply_internal<T, F>(
        &mut self,
        mode: ExecMode,
        f: F,
        write: WriteFn<T>,
    ) -> Result<(), FrameError>
    where
        F: Fn(&CellRef<'_, R, C>) -> T + Sync,
    {
        let rows = &self.rows;
        let cols = &self.cols;
        let data = &mut self.data;
        match mode {
            ExecMode::Sequential => {
                for (col_ordinal, array) in data.iter_mut().enumerate() {
                    let col_key = cols.key_of(col_ordinal)?;
                    Self::apply_column(rows, col_key, col_ordinal, array, &f, write)?;
                }
                Ok(())
            }
            ExecMode::Parallel => {
                let ranges = partition_ranges(data.len(), worker_count());
                let mut outcomes: Vec<Result<(), FrameError>> =
                    ranges.iter().map(|_| Ok(())).collect();
                rayon::scope(|s| {
                    let mut rest = data.as_mut_slice();
                    for (range, outcome) in ranges.iter().zip(outcomes.iter_mut()) {
                        let (chunk, tail) = rest.split_at_mut(range.len());
                        rest = tail;
                        let start = range.start;
                        let f = &f;
                        s.spawn(move |_| {
                            *outcome = Self::apply_chunk(rows, cols, start, chunk, f, write);
                        });
                    }
                });
                // Ordinal-ordered reduction: the first failing column wins.
                for outcome in outcomes {
                    outcome.map_err(|err| FrameError::Aggregate(Box::new(err)))?;
                }
                Ok(())
            }
        }
    }

    fn apply_chunk<T, F>(
        rows: &Index<R>,
        cols: &Index<C>,
        start: usize,
        chunk: &mut [TypedArray],
        f: &F,
        write: WriteFn<T>,
    ) -> Result<(), FrameError>
    where
        F: Fn(&CellRef<'_, R, C>) -> T,
    {
        for (offset, array) in chunk.iter_mut().enumerate() {
            let col_ordinal = start + offset;
            let col_key = cols.key_of(col_ordinal)?;
            Self::apply_column(rows, col_key, col_ordinal, array, f, write)?;
        }
        Ok(())
    }

    fn apply_column<T, F>(
        rows: &Index<R>,
        col_key: &C,
        col_ordinal: usize,
        array: &mut TypedArray,
        f: &F,
        write: WriteFn<T>,
    ) -> Result<(), FrameError>
    where
        F: Fn(&CellRef<'_, R, C>) -> T,
    {
        for row_ordinal in 0..array.len() {
            let value = {
                let cell = CellRef {
                    row_key: rows.key_of(row_ordinal)?,
                    col_key,
                    row_ordinal,
                    col_ordinal,
                    array,
                };
                f(&cell)
            };
            write(array, row_ordinal, value)?;
        }
        Ok(())
    }
}

/// A movable, allocation-free handle into one frame cell.
///
/// Holds only a borrow of the frame plus the current ordinal pair; it never
/// owns data and cannot outlive the frame. Repositioning is O(1) and returns
/// `&mut Self` for chaining.
#[derive(Debug)]
pub struct Cursor<'a, R: Key, C: Key> {
    frame: &'a Frame<R, C>,
    row: usize,
    col: usize,
}

impl<'a, R: Key, C: Key> Cursor<'a, R, C> {
    pub fn at_ordinals(&mut self, row: usize, col: usize) -> Result<&mut Self, FrameError> {
        if row >= self.frame.row_count() {
            return Err(IndexError::OutOfBounds {
                ordinal: row,
                len: self.frame.row_count(),
            }
            .into());
        }
        if col >= self.frame.col_count() {
            return Err(IndexError::OutOfBounds {
                ordinal: col,
                len: self.frame.col_count(),
            }
            .into());
        }
        self.row = row;
        self.col = col;
        Ok(self)
    }

    pub fn at_keys(&mut self, row_key: &R, col_key: &C) -> Result<&mut Self, FrameError> {
        let (row, col) = self.frame.resolve(row_key, col_key)?;
        self.row = row;
        self.col = col;
        Ok(self)
    }

    /// Reposition the row only, keeping the column.
    pub fn row_at(&mut self, row: usize) -> Result<&mut Self, FrameError> {
        let col = self.col;
        self.at_ordinals(row, col)
    }

    /// Reposition the column only, keeping the row.
    pub fn col_at(&mut self, col: usize) -> Result<&mut Self, FrameError> {
        let row = self.row;
        self.at_ordinals(row, col)
    }

    /// Reposition the row by key, keeping the column.
    pub fn row_key_at(&mut self, key: &R) -> Result<&mut Self, FrameError> {
        self.row = self.frame.row_ordinal(key)?;
        Ok(self)
    }

    /// Reposition the column by key, keeping the row.
    pub fn col_key_at(&mut self, key: &C) -> Result<&mut Self, FrameError> {
        self.col = self.frame.col_ordinal(key)?;
        Ok(self)
    }

    #[must_use]
    pub fn row_ordinal(&self) -> usize {
        self.row
    }

    #[must_use]
    pub fn col_ordinal(&self) -> usize {
        self.col
    }

    pub fn row_key(&self) -> Result<&'a R, FrameError> {
        Ok(self.frame.rows.key_of(self.row)?)
    }

    pub fn col_key(&self) -> Result<&'a C, FrameError> {
        Ok(self.frame.cols.key_of(self.col)?)
    }

    pub fn get_bool(&self) -> Result<bool, FrameError> {
        self.frame.get_bool_at(self.row, self.col)
    }

    pub fn get_int(&self) -> Result<i32, FrameError> {
        self.frame.get_int_at(self.row, self.col)
    }

    pub fn get_long(&self) -> Result<i64, FrameError> {
        self.frame.get_long_at(self.row, self.col)
    }

    pub fn get_double(&self) -> Result<f64, FrameError> {
        self.frame.get_double_at(self.row, self.col)
    }

    pub fn get_cell(&self) -> Result<Cell, FrameError> {
        self.frame.get_cell_at(self.row, self.col)
    }

    pub fn is_null(&self) -> Result<bool, FrameError> {
        self.frame.is_null_at(self.row, self.col)
    }

    /// The positioned flyweight value.
    pub fn value(&self) -> Result<CellRef<'a, R, C>, FrameError> {
        self.frame.value_at(self.row, self.col)
    }
}

/// Flyweight view of one cell: position plus a borrow of the backing array.
///
/// Handed to `apply_*` callbacks and produced by [`Cursor::value`]. Typed
/// getters fail with a type mismatch when the cell's array tag disagrees
/// (widening reads excepted).
#[derive(Debug)]
pub struct CellRef<'a, R: Key, C: Key> {
    row_key: &'a R,
    col_key: &'a C,
    row_ordinal: usize,
    col_ordinal: usize,
    array: &'a TypedArray,
}

impl<'a, R: Key, C: Key> CellRef<'a, R, C> {
    #[must_use]
    pub fn row_key(&self) -> &'a R {
        self.row_key
    }

    #[must_use]
    pub fn col_key(&self) -> &'a C {
        self.col_key
    }

    #[must_use]
    pub fn row_ordinal(&self) -> usize {
        self.row_ordinal
    }

    #[must_use]
    pub fn col_ordinal(&self) -> usize {
        self.col_ordinal
    }

    pub fn get_bool(&self) -> Result<bool, FrameError> {
        Ok(self.array.get_bool(self.row_ordinal)?)
    }

    pub fn get_int(&self) -> Result<i32, FrameError> {
        Ok(self.array.get_int(self.row_ordinal)?)
    }

    pub fn get_long(&self) -> Result<i64, FrameError> {
        Ok(self.array.get_long(self.row_ordinal)?)
    }

    pub fn get_double(&self) -> Result<f64, FrameError> {
        Ok(self.array.get_double(self.row_ordinal)?)
    }

    pub fn get_cell(&self) -> Result<Cell, FrameError> {
        Ok(self.array.get_cell(self.row_ordinal)?)
    }

    pub fn is_null(&self) -> Result<bool, FrameError> {
        Ok(self.array.is_null(self.row_ordinal)?)
    }
}

/// Flyweight view of one row across all columns.
#[derive(Debug, Clone, Copy)]
pub struct RowVector<'a, R: Key, C: Key> {
    frame: &'a Frame<R, C>,
    ordinal: usize,
    key: &'a R,
}

impl<'a, R: Key, C: Key> RowVector<'a, R, C> {
    fn new(frame: &'a Frame<R, C>, ordinal: usize) -> Result<Self, FrameError> {
        let key = frame.rows.key_of(ordinal)?;
        Ok(Self {
            frame,
            ordinal,
            key,
        })
    }

    #[must_use]
    pub fn key(&self) -> &'a R {
        self.key
    }

    #[must_use]
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frame.col_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_double(&self, col: usize) -> Result<f64, FrameError> {
        self.frame.get_double_at(self.ordinal, col)
    }

    pub fn get_cell(&self, col: usize) -> Result<Cell, FrameError> {
        self.frame.get_cell_at(self.ordinal, col)
    }

    pub fn is_null(&self, col: usize) -> Result<bool, FrameError> {
        self.frame.is_null_at(self.ordinal, col)
    }

    /// The row as doubles, widening numeric columns; fails on non-numeric
    /// columns.
    pub fn doubles(&self) -> Result<Vec<f64>, FrameError> {
        (0..self.len()).map(|col| self.get_double(col)).collect()
    }

    /// Univariate statistics over this row, nulls excluded.
    pub fn stats(&self) -> Result<Stats, FrameError> {
        Ok(Stats::from_iter(self.doubles()?))
    }
}

/// Flyweight view of one column across all rows.
#[derive(Debug, Clone, Copy)]
pub struct ColVector<'a, R: Key, C: Key> {
    frame: &'a Frame<R, C>,
    ordinal: usize,
    key: &'a C,
}

impl<'a, R: Key, C: Key> ColVector<'a, R, C> {
    fn new(frame: &'a Frame<R, C>, ordinal: usize) -> Result<Self, FrameError> {
        let key = frame.cols.key_of(ordinal)?;
        Ok(Self {
            frame,
            ordinal,
            key,
        })
    }

    #[must_use]
    pub fn key(&self) -> &'a C {
        self.key
    }

    #[must_use]
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frame.row_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.frame.data[self.ordinal].data_type()
    }

    pub fn get_double(&self, row: usize) -> Result<f64, FrameError> {
        self.frame.get_double_at(row, self.ordinal)
    }

    pub fn get_cell(&self, row: usize) -> Result<Cell, FrameError> {
        self.frame.get_cell_at(row, self.ordinal)
    }

    pub fn is_null(&self, row: usize) -> Result<bool, FrameError> {
        self.frame.is_null_at(row, self.ordinal)
    }

    pub fn doubles(&self) -> Result<Vec<f64>, FrameError> {
        (0..self.len()).map(|row| self.get_double(row)).collect()
    }

    /// Univariate statistics over this column, nulls excluded.
    pub fn stats(&self) -> Result<Stats, FrameError> {
        Ok(Stats::from_iter(self.doubles()?))
    }
}

/// Read-through projection over the row axis.
///
/// Holds no storage: only the frame borrow, an optional positional subset
/// and the execution mode for bulk operations on this view.
#[derive(Debug, Clone)]
pub struct RowsView<'a, R: Key, C: Key> {
    frame: &'a Frame<R, C>,
    selected: Option<Vec<usize>>,
    mode: ExecMode,
}

impl<'a, R: Key, C: Key> RowsView<'a, R, C> {
    fn frame_ordinal(&self, pos: usize) -> Option<usize> {
        match &self.selected {
            Some(subset) => subset.get(pos).copied(),
            None => (pos < self.frame.row_count()).then_some(pos),
        }
    }

    #[must_use]
    pub fn count(&self) -> usize {
        match &self.selected {
            Some(subset) => subset.len(),
            None => self.frame.row_count(),
        }
    }

    #[must_use]
    pub fn mode(&self) -> ExecMode {
        self.mode
    }

    /// Switch subsequent bulk operations on this view to sequential order.
    #[must_use]
    pub fn sequential(mut self) -> Self {
        self.mode = ExecMode::Sequential;
        self
    }

    /// Switch subsequent bulk operations on this view to the worker pool.
    #[must_use]
    pub fn parallel(mut self) -> Self {
        self.mode = ExecMode::Parallel;
        self
    }

    /// Key at a view position.
    pub fn key(&self, pos: usize) -> Result<&'a R, FrameError> {
        let ordinal = self.frame_ordinal(pos).ok_or(IndexError::OutOfBounds {
            ordinal: pos,
            len: self.count(),
        })?;
        Ok(self.frame.rows.key_of(ordinal)?)
    }

    /// View position of a key, if the key is in this view.
    #[must_use]
    pub fn ordinal(&self, key: &R) -> Option<usize> {
        let ordinal = self.frame.rows.ordinal_of(key)?;
        match &self.selected {
            Some(subset) => subset.iter().position(|&o| o == ordinal),
            None => Some(ordinal),
        }
    }

    #[must_use]
    pub fn contains(&self, key: &R) -> bool {
        self.ordinal(key).is_some()
    }

    /// Lazy, restartable iterator of row vectors in view order.
    pub fn iter(&self) -> impl Iterator<Item = RowVector<'a, R, C>> + '_ {
        (0..self.count()).filter_map(move |pos| {
            let ordinal = self.frame_ordinal(pos)?;
            RowVector::new(self.frame, ordinal).ok()
        })
    }

    /// First row matching the predicate, visiting strictly in ordinal order
    /// and returning on the match (short-circuit). Always sequential.
    pub fn first<P>(&self, pred: P) -> Option<RowVector<'a, R, C>>
    where
        P: Fn(&RowVector<'a, R, C>) -> bool,
    {
        self.iter().find(|vector| pred(vector))
    }

    /// Last match, visiting in reverse ordinal order with short-circuit.
    pub fn last<P>(&self, pred: P) -> Option<RowVector<'a, R, C>>
    where
        P: Fn(&RowVector<'a, R, C>) -> bool,
    {
        (0..self.count())
            .rev()
            .filter_map(|pos| {
                let ordinal = self.frame_ordinal(pos)?;
                RowVector::new(self.frame, ordinal).ok()
            })
            .find(|vector| pred(vector))
    }

    fn filtered_ordinals<P>(&self, pred: P) -> Vec<usize>
    where
        P: Fn(&RowVector<'a, R, C>) -> bool + Sync,
    {
        match self.mode {
            ExecMode::Sequential => self
                .iter()
                .filter(|vector| pred(vector))
                .map(|vector| vector.ordinal())
                .collect(),
            ExecMode::Parallel => {
                let ranges = partition_ranges(self.count(), worker_count());
                let mut buckets: Vec<Vec<usize>> = ranges.iter().map(|_| Vec::new()).collect();
                rayon::scope(|s| {
                    for (range, bucket) in ranges.iter().cloned().zip(buckets.iter_mut()) {
                        let pred = &pred;
                        s.spawn(move |_| {
                            for pos in range {
                                let Some(ordinal) = self.frame_ordinal(pos) else {
                                    continue;
                                };
                                let Ok(vector) = RowVector::new(self.frame, ordinal) else {
                                    continue;
                                };
                                if pred(&vector) {
                                    bucket.push(ordinal);
                                }
                            }
                        });
                    }
                });
                // Buckets are range-ordered, so the concatenation matches
                // the sequential visitation order.
                buckets.into_iter().flatten().collect()
            }
        }
    }

    /// Lazy positional subset of rows matching the predicate. The predicate
    /// may run concurrently under parallel mode, but the surviving ordinals
    /// always come back in sequential order.
    pub fn filter<P>(&self, pred: P) -> Self
    where
        P: Fn(&RowVector<'a, R, C>) -> bool + Sync,
    {
        Self {
            frame: self.frame,
            selected: Some(self.filtered_ordinals(pred)),
            mode: self.mode,
        }
    }

    /// Eager twin of [`RowsView::filter`]: materializes a new frame holding
    /// only the matching rows, with both indexes rebuilt.
    pub fn select<P>(&self, pred: P) -> Result<Frame<R, C>, FrameError>
    where
        P: Fn(&RowVector<'a, R, C>) -> bool + Sync,
    {
        self.frame.select_rows(&self.filtered_ordinals(pred))
    }

    /// Visit every row in this view. Sequential mode visits in strict
    /// ordinal order; parallel mode splits contiguous ranges across the
    /// pool with disjoint assignment — thread safety of captured state is
    /// the caller's obligation.
    pub fn for_each<F>(&self, f: F)
    where
        F: Fn(&RowVector<'a, R, C>) + Sync,
    {
        match self.mode {
            ExecMode::Sequential => {
                for vector in self.iter() {
                    f(&vector);
                }
            }
            ExecMode::Parallel => {
                let ranges = partition_ranges(self.count(), worker_count());
                rayon::scope(|s| {
                    for range in ranges {
                        let f = &f;
                        s.spawn(move |_| {
                            for pos in range {
                                let Some(ordinal) = self.frame_ordinal(pos) else {
                                    continue;
                                };
                                let Ok(vector) = RowVector::new(self.frame, ordinal) else {
                                    continue;
                                };
                                f(&vector);
                            }
                        });
                    }
                });
            }
        }
    }
}

/// Read-through projection over the column axis.
#[derive(Debug, Clone)]
pub struct ColsView<'a, R: Key, C: Key> {
    frame: &'a Frame<R, C>,
    selected: Option<Vec<usize>>,
    mode: ExecMode,
}

impl<'a, R: Key, C: Key> ColsView<'a, R, C> {
    fn frame_ordinal(&self, pos: usize) -> Option<usize> {
        match &self.selected {
            Some(subset) => subset.get(pos).copied(),
            None => (pos < self.frame.col_count()).then_some(pos),
        }
    }

    #[must_use]
    pub fn count(&self) -> usize {
        match &self.selected {
            Some(subset) => subset.len(),
            None => self.frame.col_count(),
        }
    }

    #[must_use]
    pub fn mode(&self) -> ExecMode {
        self.mode
    }

    #[must_use]
    pub fn sequential(mut self) -> Self {
        self.mode = ExecMode::Sequential;
        self
    }

    #[must_use]
    pub fn parallel(mut self) -> Self {
        self.mode = ExecMode::Parallel;
        self
    }

    pub fn key(&self, pos: usize) -> Result<&'a C, FrameError> {
        let ordinal = self.frame_ordinal(pos).ok_or(IndexError::OutOfBounds {
            ordinal: pos,
            len: self.count(),
        })?;
        Ok(self.frame.cols.key_of(ordinal)?)
    }

    #[must_use]
    pub fn ordinal(&self, key: &C) -> Option<usize> {
        let ordinal = self.frame.cols.ordinal_of(key)?;
        match &self.selected {
            Some(subset) => subset.iter().position(|&o| o == ordinal),
            None => Some(ordinal),
        }
    }

    #[must_use]
    pub fn contains(&self, key: &C) -> bool {
        self.ordinal(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = ColVector<'a, R, C>> + '_ {
        (0..self.count()).filter_map(move |pos| {
            let ordinal = self.frame_ordinal(pos)?;
            ColVector::new(self.frame, ordinal).ok()
        })
    }

    pub fn first<P>(&self, pred: P) -> Option<ColVector<'a, R, C>>
    where
        P: Fn(&ColVector<'a, R, C>) -> bool,
    {
        self.iter().find(|vector| pred(vector))
    }

    pub fn last<P>(&self, pred: P) -> Option<ColVector<'a, R, C>>
    where
        P: Fn(&ColVector<'a, R, C>) -> bool,
    {
        (0..self.count())
            .rev()
            .filter_map(|pos| {
                let ordinal = self.frame_ordinal(pos)?;
                ColVector::new(self.frame, ordinal).ok()
            })
            .find(|vector| pred(vector))
    }

    fn filtered_ordinals<P>(&self, pred: P) -> Vec<usize>
    where
        P: Fn(&ColVector<'a, R, C>) -> bool + Sync,
    {
        match self.mode {
            ExecMode::Sequential => self
                .iter()
                .filter(|vector| pred(vector))
                .map(|vector| vector.ordinal())
                .collect(),
            ExecMode::Parallel => {
                let ranges = partition_ranges(self.count(), worker_count());
                let mut buckets: Vec<Vec<usize>> = ranges.iter().map(|_| Vec::new()).collect();
                rayon::scope(|s| {
                    for (range, bucket) in ranges.iter().cloned().zip(buckets.iter_mut()) {
                        let pred = &pred;
                        s.spawn(move |_| {
                            for pos in range {
                                let Some(ordinal) = self.frame_ordinal(pos) else {
                                    continue;
                                };
                                let Ok(vector) = ColVector::new(self.frame, ordinal) else {
                                    continue;
                                };
                                if pred(&vector) {
                                    bucket.push(ordinal);
                                }
                            }
                        });
                    }
                });
                buckets.into_iter().flatten().collect()
            }
        }
    }

    pub fn filter<P>(&self, pred: P) -> Self
    where
        P: Fn(&ColVector<'a, R, C>) -> bool + Sync,
    {
        Self {
            frame: self.frame,
            selected: Some(self.filtered_ordinals(pred)),
            mode: self.mode,
        }
    }

    pub fn select<P>(&self, pred: P) -> Result<Frame<R, C>, FrameError>
    where
        P: Fn(&ColVector<'a, R, C>) -> bool + Sync,
    {
        self.frame.select_cols(&self.filtered_ordinals(pred))
    }

    pub fn for_each<F>(&self, f: F)
    where
        F: Fn(&ColVector<'a, R, C>) + Sync,
    {
        match self.mode {
            ExecMode::Sequential => {
                for vector in self.iter() {
                    f(&vector);
                }
            }
            ExecMode::Parallel => {
                let ranges = partition_ranges(self.count(), worker_count());
                rayon::scope(|s| {
                    for range in ranges {
                        let f = &f;
                        s.spawn(move |_| {
                            for pos in range {
                                let Some(ordinal) = self.frame_ordinal(pos) else {
                                    continue;
                                };
                                let Ok(vector) = ColVector::new(self.frame, ordinal) else {
                                    continue;
                                };
                                f(&vector);
                            }
                        });
                    }
                });
            }
        }
    }
}
