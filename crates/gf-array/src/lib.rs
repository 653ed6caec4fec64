#![forbid(unsafe_code)]

use gf_types::{Cell, DataType, TypeError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Word-packed validity bitmask: one bit per ordinal, set means non-null.
///
/// `Double` arrays do not consult the mask (NaN is their missing sentinel);
/// every other tag does. Invalid positions hold unspecified buffer values,
/// so callers must check validity before interpreting a typed read.
#[derive(Debug, Clone, Eq)]
pub struct ValidityMask {
    words: Vec<u64>,
    len: usize,
}

impl ValidityMask {
    #[must_use]
    pub fn all_valid(len: usize) -> Self {
        let word_count = len.div_ceil(64);
        let mut words = vec![u64::MAX; word_count];
        let remainder = len % 64;
        if remainder > 0 && !words.is_empty() {
            let last = words.len() - 1;
            words[last] = (1_u64 << remainder) - 1;
        }
        Self { words, len }
    }

    #[must_use]
    pub fn all_invalid(len: usize) -> Self {
        Self {
            words: vec![0_u64; len.div_ceil(64)],
            len,
        }
    }

    #[must_use]
    pub fn get(&self, idx: usize) -> bool {
        idx < self.len && (self.words[idx / 64] >> (idx % 64)) & 1 == 1
    }

    pub fn set(&mut self, idx: usize, valid: bool) {
        if idx >= self.len {
            return;
        }
        if valid {
            self.words[idx / 64] |= 1_u64 << (idx % 64);
        } else {
            self.words[idx / 64] &= !(1_u64 << (idx % 64));
        }
    }

    #[must_use]
    pub fn count_valid(&self) -> usize {
        self.bits().filter(|&b| b).count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Grow (new slots take `valid`) or shrink the mask, preserving existing bits.
    pub fn resize(&mut self, new_len: usize, valid: bool) {
        if new_len == self.len {
            return;
        }
        let mut bits: Vec<bool> = self.bits().collect();
        bits.resize(new_len, valid);
        *self = Self::from_bits(&bits);
    }

    /// Drop the bit at `idx`, shifting everything after it down by one.
    pub fn remove(&mut self, idx: usize) {
        if idx >= self.len {
            return;
        }
        let mut bits: Vec<bool> = self.bits().collect();
        bits.remove(idx);
        *self = Self::from_bits(&bits);
    }

    fn from_bits(bits: &[bool]) -> Self {
        let len = bits.len();
        let mut words = vec![0_u64; len.div_ceil(64)];
        for (idx, &valid) in bits.iter().enumerate() {
            if valid {
                words[idx / 64] |= 1_u64 << (idx % 64);
            }
        }
        Self { words, len }
    }

    pub fn bits(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |idx| self.get(idx))
    }
}

impl PartialEq for ValidityMask {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.bits().eq(other.bits())
    }
}

impl Serialize for ValidityMask {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let bits: Vec<bool> = self.bits().collect();
        let mut state = serializer.serialize_struct("ValidityMask", 1)?;
        state.serialize_field("bits", &bits)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for ValidityMask {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            bits: Vec<bool>,
        }
        let raw = Raw::deserialize(deserializer)?;
        Ok(Self::from_bits(&raw.bits))
    }
}

/// The tagged storage union: one contiguous homogeneous buffer per tag.
///
/// `Object` stores dynamic [`Cell`] values directly; its missing marker is
/// `Cell::Null` rather than the validity mask.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tag", content = "buffer", rename_all = "snake_case")]
enum ArrayData {
    Bool(Vec<bool>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Double(Vec<f64>),
    Utf8(Vec<String>),
    Object(Vec<Cell>),
}

impl ArrayData {
    fn with_length(data_type: DataType, len: usize) -> Self {
        match data_type {
            DataType::Bool => Self::Bool(vec![false; len]),
            DataType::Int => Self::Int(vec![0; len]),
            DataType::Long => Self::Long(vec![0; len]),
            DataType::Double => Self::Double(vec![f64::NAN; len]),
            DataType::Utf8 => Self::Utf8(vec![String::new(); len]),
            DataType::Object => Self::Object(vec![Cell::Null; len]),
        }
    }

    fn data_type(&self) -> DataType {
        match self {
            Self::Bool(_) => DataType::Bool,
            Self::Int(_) => DataType::Int,
            Self::Long(_) => DataType::Long,
            Self::Double(_) => DataType::Double,
            Self::Utf8(_) => DataType::Utf8,
            Self::Object(_) => DataType::Object,
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Bool(d) => d.len(),
            Self::Int(d) => d.len(),
            Self::Long(d) => d.len(),
            Self::Double(d) => d.len(),
            Self::Utf8(d) => d.len(),
            Self::Object(d) => d.len(),
        }
    }

    fn resize(&mut self, new_len: usize) {
        match self {
            Self::Bool(d) => d.resize(new_len, false),
            Self::Int(d) => d.resize(new_len, 0),
            Self::Long(d) => d.resize(new_len, 0),
            Self::Double(d) => d.resize(new_len, f64::NAN),
            Self::Utf8(d) => d.resize(new_len, String::new()),
            Self::Object(d) => d.resize(new_len, Cell::Null),
        }
    }

    fn remove(&mut self, ordinal: usize) {
        match self {
            Self::Bool(d) => {
                d.remove(ordinal);
            }
            Self::Int(d) => {
                d.remove(ordinal);
            }
            Self::Long(d) => {
                d.remove(ordinal);
            }
            Self::Double(d) => {
                d.remove(ordinal);
            }
            Self::Utf8(d) => {
                d.remove(ordinal);
            }
            Self::Object(d) => {
                d.remove(ordinal);
            }
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ArrayError {
    #[error("type mismatch: requested {requested:?} from a {actual:?} array")]
    TypeMismatch {
        requested: DataType,
        actual: DataType,
    },
    #[error("ordinal {ordinal} out of bounds for length {len}")]
    OutOfBounds { ordinal: usize, len: usize },
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Fixed-length homogeneous storage for one column of a frame.
///
/// The declared tag never changes after creation; length changes only via
/// [`TypedArray::resize`] and [`TypedArray::remove`], which preserve the
/// surviving values by ordinal. Typed accessors fail with
/// [`ArrayError::TypeMismatch`] on tag disagreement; the only silent
/// coercions are the documented numeric widenings (`int → long → double`).
#[derive(Debug, Clone, Serialize)]
pub struct TypedArray {
    data: ArrayData,
    validity: ValidityMask,
}

/// Semantic equality: same tag, same length, and every slot equal under
/// [`Cell::semantic_eq`], so missing == missing (NaN included) and stale
/// buffer values behind a cleared validity bit do not participate.
impl PartialEq for TypedArray {
    fn eq(&self, other: &Self) -> bool {
        if self.data_type() != other.data_type() || self.len() != other.len() {
            return false;
        }
        (0..self.len()).all(|ordinal| {
            match (self.get_cell(ordinal), other.get_cell(ordinal)) {
                (Ok(a), Ok(b)) => a.semantic_eq(&b),
                _ => false,
            }
        })
    }
}

impl<'de> Deserialize<'de> for TypedArray {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            data: ArrayData,
            validity: ValidityMask,
        }
        let raw = Raw::deserialize(deserializer)?;
        if raw.validity.len() != raw.data.len() {
            return Err(serde::de::Error::custom(format!(
                "validity mask length {} does not match buffer length {}",
                raw.validity.len(),
                raw.data.len()
            )));
        }
        Ok(Self {
            data: raw.data,
            validity: raw.validity,
        })
    }
}

impl TypedArray {
    /// A null-filled array of the given tag and length.
    #[must_use]
    pub fn with_length(data_type: DataType, len: usize) -> Self {
        let validity = match data_type {
            // NaN already marks missing doubles; the mask stays all-set.
            DataType::Double => ValidityMask::all_valid(len),
            _ => ValidityMask::all_invalid(len),
        };
        Self {
            data: ArrayData::with_length(data_type, len),
            validity,
        }
    }

    #[must_use]
    pub fn from_bools(values: Vec<bool>) -> Self {
        let validity = ValidityMask::all_valid(values.len());
        Self {
            data: ArrayData::Bool(values),
            validity,
        }
    }

    #[must_use]
    pub fn from_ints(values: Vec<i32>) -> Self {
        let validity = ValidityMask::all_valid(values.len());
        Self {
            data: ArrayData::Int(values),
            validity,
        }
    }

    #[must_use]
    pub fn from_longs(values: Vec<i64>) -> Self {
        let validity = ValidityMask::all_valid(values.len());
        Self {
            data: ArrayData::Long(values),
            validity,
        }
    }

    #[must_use]
    pub fn from_doubles(values: Vec<f64>) -> Self {
        let validity = ValidityMask::all_valid(values.len());
        Self {
            data: ArrayData::Double(values),
            validity,
        }
    }

    #[must_use]
    pub fn from_utf8(values: Vec<String>) -> Self {
        let validity = ValidityMask::all_valid(values.len());
        Self {
            data: ArrayData::Utf8(values),
            validity,
        }
    }

    #[must_use]
    pub fn from_cells(values: Vec<Cell>) -> Self {
        let validity = ValidityMask::all_valid(values.len());
        Self {
            data: ArrayData::Object(values),
            validity,
        }
    }

    /// Bulk construction from a per-ordinal function.
    pub fn from_fn(
        data_type: DataType,
        len: usize,
        f: impl Fn(usize) -> Cell,
    ) -> Result<Self, ArrayError> {
        let mut array = Self::with_length(data_type, len);
        for ordinal in 0..len {
            array.set_cell(ordinal, f(ordinal))?;
        }
        Ok(array)
    }

    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    fn check_bounds(&self, ordinal: usize) -> Result<(), ArrayError> {
        if ordinal >= self.len() {
            return Err(ArrayError::OutOfBounds {
                ordinal,
                len: self.len(),
            });
        }
        Ok(())
    }

    fn mismatch(&self, requested: DataType) -> ArrayError {
        ArrayError::TypeMismatch {
            requested,
            actual: self.data_type(),
        }
    }

    /// True when the slot holds the tag's missing sentinel.
    pub fn is_null(&self, ordinal: usize) -> Result<bool, ArrayError> {
        self.check_bounds(ordinal)?;
        Ok(match &self.data {
            ArrayData::Double(d) => d[ordinal].is_nan(),
            ArrayData::Object(d) => d[ordinal].is_null(),
            _ => !self.validity.get(ordinal),
        })
    }

    #[must_use]
    pub fn null_count(&self) -> usize {
        match &self.data {
            ArrayData::Double(d) => d.iter().filter(|v| v.is_nan()).count(),
            ArrayData::Object(d) => d.iter().filter(|v| v.is_null()).count(),
            _ => self.len() - self.validity.count_valid(),
        }
    }

    // ── Typed reads ────────────────────────────────────────────────────

    pub fn get_bool(&self, ordinal: usize) -> Result<bool, ArrayError> {
        self.check_bounds(ordinal)?;
        match &self.data {
            ArrayData::Bool(d) => Ok(d[ordinal]),
            ArrayData::Object(d) => match &d[ordinal] {
                Cell::Bool(v) => Ok(*v),
                _ => Err(self.mismatch(DataType::Bool)),
            },
            _ => Err(self.mismatch(DataType::Bool)),
        }
    }

    pub fn get_int(&self, ordinal: usize) -> Result<i32, ArrayError> {
        self.check_bounds(ordinal)?;
        match &self.data {
            ArrayData::Int(d) => Ok(d[ordinal]),
            ArrayData::Object(d) => match &d[ordinal] {
                Cell::Int(v) => Ok(*v),
                _ => Err(self.mismatch(DataType::Int)),
            },
            _ => Err(self.mismatch(DataType::Int)),
        }
    }

    /// Reads `Long` and widens `Int`.
    pub fn get_long(&self, ordinal: usize) -> Result<i64, ArrayError> {
        self.check_bounds(ordinal)?;
        match &self.data {
            ArrayData::Long(d) => Ok(d[ordinal]),
            ArrayData::Int(d) => Ok(i64::from(d[ordinal])),
            ArrayData::Object(d) => match &d[ordinal] {
                Cell::Long(v) => Ok(*v),
                _ => Err(self.mismatch(DataType::Long)),
            },
            _ => Err(self.mismatch(DataType::Long)),
        }
    }

    /// Reads `Double` and widens `Int`/`Long`. Null integer slots read as NaN.
    pub fn get_double(&self, ordinal: usize) -> Result<f64, ArrayError> {
        self.check_bounds(ordinal)?;
        match &self.data {
            ArrayData::Double(d) => Ok(d[ordinal]),
            ArrayData::Int(d) => {
                if self.validity.get(ordinal) {
                    Ok(f64::from(d[ordinal]))
                } else {
                    Ok(f64::NAN)
                }
            }
            ArrayData::Long(d) => {
                if self.validity.get(ordinal) {
                    Ok(d[ordinal] as f64)
                } else {
                    Ok(f64::NAN)
                }
            }
            ArrayData::Object(d) => match &d[ordinal] {
                Cell::Double(v) => Ok(*v),
                _ => Err(self.mismatch(DataType::Double)),
            },
            _ => Err(self.mismatch(DataType::Double)),
        }
    }

    pub fn get_utf8(&self, ordinal: usize) -> Result<&str, ArrayError> {
        self.check_bounds(ordinal)?;
        match &self.data {
            ArrayData::Utf8(d) => Ok(&d[ordinal]),
            ArrayData::Object(d) => match &d[ordinal] {
                Cell::Utf8(v) => Ok(v),
                _ => Err(self.mismatch(DataType::Utf8)),
            },
            _ => Err(self.mismatch(DataType::Utf8)),
        }
    }

    /// Untyped read: always succeeds in-bounds, null slots read as the sentinel.
    pub fn get_cell(&self, ordinal: usize) -> Result<Cell, ArrayError> {
        self.check_bounds(ordinal)?;
        Ok(match &self.data {
            ArrayData::Bool(d) => {
                if self.validity.get(ordinal) {
                    Cell::Bool(d[ordinal])
                } else {
                    Cell::Null
                }
            }
            ArrayData::Int(d) => {
                if self.validity.get(ordinal) {
                    Cell::Int(d[ordinal])
                } else {
                    Cell::Null
                }
            }
            ArrayData::Long(d) => {
                if self.validity.get(ordinal) {
                    Cell::Long(d[ordinal])
                } else {
                    Cell::Null
                }
            }
            ArrayData::Double(d) => Cell::Double(d[ordinal]),
            ArrayData::Utf8(d) => {
                if self.validity.get(ordinal) {
                    Cell::Utf8(d[ordinal].clone())
                } else {
                    Cell::Null
                }
            }
            ArrayData::Object(d) => d[ordinal].clone(),
        })
    }

    // ── Typed writes ───────────────────────────────────────────────────

    pub fn set_bool(&mut self, ordinal: usize, value: bool) -> Result<(), ArrayError> {
        self.check_bounds(ordinal)?;
        match &mut self.data {
            ArrayData::Bool(d) => {
                d[ordinal] = value;
                self.validity.set(ordinal, true);
                Ok(())
            }
            ArrayData::Object(d) => {
                d[ordinal] = Cell::Bool(value);
                Ok(())
            }
            _ => Err(self.mismatch(DataType::Bool)),
        }
    }

    /// Writes `Int`, widening into `Long`, `Double` and `Object` columns.
    pub fn set_int(&mut self, ordinal: usize, value: i32) -> Result<(), ArrayError> {
        self.check_bounds(ordinal)?;
        match &mut self.data {
            ArrayData::Int(d) => {
                d[ordinal] = value;
                self.validity.set(ordinal, true);
                Ok(())
            }
            ArrayData::Long(d) => {
                d[ordinal] = i64::from(value);
                self.validity.set(ordinal, true);
                Ok(())
            }
            ArrayData::Double(d) => {
                d[ordinal] = f64::from(value);
                Ok(())
            }
            ArrayData::Object(d) => {
                d[ordinal] = Cell::Int(value);
                Ok(())
            }
            _ => Err(self.mismatch(DataType::Int)),
        }
    }

    /// Writes `Long`, widening into `Double` and `Object` columns.
    pub fn set_long(&mut self, ordinal: usize, value: i64) -> Result<(), ArrayError> {
        self.check_bounds(ordinal)?;
        match &mut self.data {
            ArrayData::Long(d) => {
                d[ordinal] = value;
                self.validity.set(ordinal, true);
                Ok(())
            }
            ArrayData::Double(d) => {
                d[ordinal] = value as f64;
                Ok(())
            }
            ArrayData::Object(d) => {
                d[ordinal] = Cell::Long(value);
                Ok(())
            }
            _ => Err(self.mismatch(DataType::Long)),
        }
    }

    pub fn set_double(&mut self, ordinal: usize, value: f64) -> Result<(), ArrayError> {
        self.check_bounds(ordinal)?;
        match &mut self.data {
            ArrayData::Double(d) => {
                d[ordinal] = value;
                Ok(())
            }
            ArrayData::Object(d) => {
                d[ordinal] = Cell::Double(value);
                Ok(())
            }
            _ => Err(self.mismatch(DataType::Double)),
        }
    }

    pub fn set_utf8(&mut self, ordinal: usize, value: impl Into<String>) -> Result<(), ArrayError> {
        self.check_bounds(ordinal)?;
        match &mut self.data {
            ArrayData::Utf8(d) => {
                d[ordinal] = value.into();
                self.validity.set(ordinal, true);
                Ok(())
            }
            ArrayData::Object(d) => {
                d[ordinal] = Cell::Utf8(value.into());
                Ok(())
            }
            _ => Err(self.mismatch(DataType::Utf8)),
        }
    }

    pub fn set_null(&mut self, ordinal: usize) -> Result<(), ArrayError> {
        self.check_bounds(ordinal)?;
        match &mut self.data {
            ArrayData::Double(d) => d[ordinal] = f64::NAN,
            ArrayData::Object(d) => d[ordinal] = Cell::Null,
            _ => self.validity.set(ordinal, false),
        }
        Ok(())
    }

    /// Untyped write: dispatches through the typed setters, so the same
    /// widening table and mismatch failures apply.
    pub fn set_cell(&mut self, ordinal: usize, value: Cell) -> Result<(), ArrayError> {
        match value {
            Cell::Null => self.set_null(ordinal),
            Cell::Bool(v) => self.set_bool(ordinal, v),
            Cell::Int(v) => self.set_int(ordinal, v),
            Cell::Long(v) => self.set_long(ordinal, v),
            Cell::Double(v) => self.set_double(ordinal, v),
            Cell::Utf8(v) => self.set_utf8(ordinal, v),
        }
    }

    // ── Structural mutation ────────────────────────────────────────────

    /// Truncate or null-fill to `new_len`; existing values keep their ordinals.
    pub fn resize(&mut self, new_len: usize) {
        self.data.resize(new_len);
        let fill_valid = matches!(self.data, ArrayData::Double(_));
        self.validity.resize(new_len, fill_valid);
    }

    /// Drop the slot at `ordinal`, shifting later ordinals down by one.
    pub fn remove(&mut self, ordinal: usize) -> Result<(), ArrayError> {
        self.check_bounds(ordinal)?;
        self.data.remove(ordinal);
        self.validity.remove(ordinal);
        Ok(())
    }

    /// Iterate a numeric array as doubles, widening and surfacing nulls as
    /// NaN. Non-numeric tags are a mismatch.
    pub fn iter_doubles(&self) -> Result<impl Iterator<Item = f64> + '_, ArrayError> {
        if !self.data_type().is_numeric() {
            return Err(self.mismatch(DataType::Double));
        }
        Ok((0..self.len()).map(move |ordinal| self.get_double(ordinal).unwrap_or(f64::NAN)))
    }

    /// Gather a new array of the same tag from the given ordinals, in order.
    pub fn take(&self, ordinals: &[usize]) -> Result<Self, ArrayError> {
        let mut out = Self::with_length(self.data_type(), ordinals.len());
        for (slot, &ordinal) in ordinals.iter().enumerate() {
            self.check_bounds(ordinal)?;
            if !self.is_null(ordinal)? {
                out.set_cell(slot, self.get_cell(ordinal)?)?;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::{ArrayError, TypedArray, ValidityMask};
    use gf_types::{Cell, DataType};

    #[test]
    fn new_arrays_are_null_filled() {
        for tag in [
            DataType::Bool,
            DataType::Int,
            DataType::Long,
            DataType::Double,
            DataType::Utf8,
            DataType::Object,
        ] {
            let array = TypedArray::with_length(tag, 4);
            assert_eq!(array.len(), 4);
            assert_eq!(array.data_type(), tag);
            for ordinal in 0..4 {
                assert!(array.is_null(ordinal).unwrap(), "tag {tag:?}");
            }
            assert_eq!(array.null_count(), 4);
        }
    }

    #[test]
    fn typed_round_trip_per_tag() {
        let mut bools = TypedArray::with_length(DataType::Bool, 2);
        bools.set_bool(1, true).unwrap();
        assert!(bools.get_bool(1).unwrap());
        assert!(!bools.is_null(1).unwrap());
        assert!(bools.is_null(0).unwrap());

        let mut ints = TypedArray::with_length(DataType::Int, 2);
        ints.set_int(0, -5).unwrap();
        assert_eq!(ints.get_int(0).unwrap(), -5);

        let mut strings = TypedArray::with_length(DataType::Utf8, 2);
        strings.set_utf8(0, "hello").unwrap();
        assert_eq!(strings.get_utf8(0).unwrap(), "hello");
    }

    #[test]
    fn reads_widen_but_never_narrow() {
        let ints = TypedArray::from_ints(vec![7]);
        assert_eq!(ints.get_long(0).unwrap(), 7);
        assert_eq!(ints.get_double(0).unwrap(), 7.0);

        let longs = TypedArray::from_longs(vec![9]);
        assert_eq!(longs.get_double(0).unwrap(), 9.0);
        assert!(matches!(
            longs.get_int(0),
            Err(ArrayError::TypeMismatch { .. })
        ));

        let doubles = TypedArray::from_doubles(vec![1.5]);
        assert!(matches!(
            doubles.get_long(0),
            Err(ArrayError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn writes_widen_but_never_narrow() {
        let mut doubles = TypedArray::with_length(DataType::Double, 1);
        doubles.set_int(0, 3).unwrap();
        assert_eq!(doubles.get_double(0).unwrap(), 3.0);
        doubles.set_long(0, 4).unwrap();
        assert_eq!(doubles.get_double(0).unwrap(), 4.0);

        let mut longs = TypedArray::with_length(DataType::Long, 1);
        longs.set_int(0, 3).unwrap();
        assert_eq!(longs.get_long(0).unwrap(), 3);

        let mut ints = TypedArray::with_length(DataType::Int, 1);
        assert!(matches!(
            ints.set_long(0, 3),
            Err(ArrayError::TypeMismatch { .. })
        ));
        assert!(matches!(
            ints.set_double(0, 3.0),
            Err(ArrayError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn out_of_bounds_reports_ordinal_and_len() {
        let array = TypedArray::with_length(DataType::Int, 3);
        assert_eq!(
            array.get_int(3).unwrap_err(),
            ArrayError::OutOfBounds { ordinal: 3, len: 3 }
        );
    }

    #[test]
    fn null_integer_slots_read_as_nan_through_double() {
        let array = TypedArray::with_length(DataType::Int, 1);
        assert!(array.get_double(0).unwrap().is_nan());
    }

    #[test]
    fn get_cell_surfaces_sentinels() {
        let mut array = TypedArray::with_length(DataType::Int, 2);
        array.set_int(0, 42).unwrap();
        assert_eq!(array.get_cell(0).unwrap(), Cell::Int(42));
        assert_eq!(array.get_cell(1).unwrap(), Cell::Null);

        let doubles = TypedArray::with_length(DataType::Double, 1);
        assert!(matches!(doubles.get_cell(0).unwrap(), Cell::Double(v) if v.is_nan()));
    }

    #[test]
    fn object_arrays_hold_mixed_cells() {
        let mut array = TypedArray::with_length(DataType::Object, 3);
        array.set_cell(0, Cell::Int(1)).unwrap();
        array.set_cell(1, Cell::Utf8("x".into())).unwrap();
        assert_eq!(array.get_int(0).unwrap(), 1);
        assert_eq!(array.get_utf8(1).unwrap(), "x");
        assert!(array.is_null(2).unwrap());
        // Typed getters on an object array demand an exact variant match.
        assert!(matches!(
            array.get_utf8(0),
            Err(ArrayError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn resize_preserves_values_and_null_fills() {
        let mut array = TypedArray::from_ints(vec![1, 2, 3]);
        array.resize(5);
        assert_eq!(array.len(), 5);
        assert_eq!(array.get_int(2).unwrap(), 3);
        assert!(array.is_null(3).unwrap());
        assert!(array.is_null(4).unwrap());

        array.resize(2);
        assert_eq!(array.len(), 2);
        assert_eq!(array.get_int(1).unwrap(), 2);
    }

    #[test]
    fn remove_shifts_later_ordinals() {
        let mut array = TypedArray::from_doubles(vec![10.0, 20.0, 30.0]);
        array.remove(1).unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(array.get_double(0).unwrap(), 10.0);
        assert_eq!(array.get_double(1).unwrap(), 30.0);
    }

    #[test]
    fn take_gathers_in_requested_order() {
        let mut array = TypedArray::from_ints(vec![1, 2, 3, 4]);
        array.set_null(2).unwrap();
        let taken = array.take(&[3, 0, 2]).unwrap();
        assert_eq!(taken.get_int(0).unwrap(), 4);
        assert_eq!(taken.get_int(1).unwrap(), 1);
        assert!(taken.is_null(2).unwrap());
    }

    #[test]
    fn iter_doubles_widens_and_surfaces_nulls_as_nan() {
        let mut array = TypedArray::from_ints(vec![1, 2, 3]);
        array.set_null(1).unwrap();
        let collected: Vec<f64> = array.iter_doubles().unwrap().collect();
        assert_eq!(collected[0], 1.0);
        assert!(collected[1].is_nan());
        assert_eq!(collected[2], 3.0);

        let strings = TypedArray::from_utf8(vec!["x".to_owned()]);
        assert!(strings.iter_doubles().is_err());
    }

    #[test]
    fn from_fn_fills_every_ordinal() {
        let array =
            TypedArray::from_fn(DataType::Double, 4, |ordinal| Cell::Double(ordinal as f64 * 2.0))
                .unwrap();
        assert_eq!(array.get_double(3).unwrap(), 6.0);
    }

    // ── Equality ───────────────────────────────────────────────────────

    #[test]
    fn double_arrays_with_nan_slots_compare_equal() {
        let a = TypedArray::from_doubles(vec![1.0, f64::NAN, 3.0]);
        let b = TypedArray::from_doubles(vec![1.0, f64::NAN, 3.0]);
        assert_eq!(a, b);
        let c = TypedArray::from_doubles(vec![1.0, 2.0, 3.0]);
        assert_ne!(a, c);
    }

    #[test]
    fn object_arrays_with_nan_cells_compare_equal() {
        let mut a = TypedArray::with_length(DataType::Object, 2);
        a.set_cell(0, Cell::Double(f64::NAN)).unwrap();
        let mut b = TypedArray::with_length(DataType::Object, 2);
        b.set_cell(0, Cell::Double(f64::NAN)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn equality_ignores_stale_values_behind_the_mask() {
        let mut written = TypedArray::from_ints(vec![7, 8]);
        written.set_null(1).unwrap();
        let mut fresh = TypedArray::with_length(DataType::Int, 2);
        fresh.set_int(0, 7).unwrap();
        // The first buffer still holds an 8 behind its cleared bit.
        assert_eq!(written, fresh);
    }

    #[test]
    fn equality_distinguishes_tags_and_lengths() {
        let ints = TypedArray::from_ints(vec![1]);
        let longs = TypedArray::from_longs(vec![1]);
        assert_ne!(ints, longs);
        let shorter = TypedArray::from_ints(vec![1, 2]);
        assert_ne!(ints, shorter);
    }

    // ── Deserialization ────────────────────────────────────────────────

    #[test]
    fn deserialization_rejects_mask_length_mismatch() {
        let array = TypedArray::from_ints(vec![1, 2, 3]);
        let mut value = serde_json::to_value(&array).unwrap();
        value["validity"]["bits"].as_array_mut().unwrap().pop();
        let result: Result<TypedArray, _> = serde_json::from_value(value);
        assert!(result.is_err());
    }

    #[test]
    fn deserialization_round_trips_a_valid_array() {
        let mut array = TypedArray::from_longs(vec![5, 6, 7]);
        array.set_null(1).unwrap();
        let json = serde_json::to_string(&array).unwrap();
        let back: TypedArray = serde_json::from_str(&json).unwrap();
        assert_eq!(array, back);
        assert!(back.is_null(1).unwrap());
    }

    // ── Validity mask ──────────────────────────────────────────────────

    #[test]
    fn mask_resize_and_remove_preserve_bits() {
        let mut mask = ValidityMask::all_invalid(3);
        mask.set(1, true);
        mask.resize(5, false);
        assert!(mask.get(1));
        assert!(!mask.get(4));
        mask.remove(0);
        assert_eq!(mask.len(), 4);
        assert!(mask.get(0));
    }

    #[test]
    fn mask_boundary_word_is_exact() {
        let mask = ValidityMask::all_valid(65);
        assert_eq!(mask.count_valid(), 65);
        let mask = ValidityMask::all_valid(64);
        assert_eq!(mask.count_valid(), 64);
    }
}
