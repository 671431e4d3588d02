use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::error::ExtractError;

// ---------------------------------------------------------------------------
// Column – one named numeric series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

// ---------------------------------------------------------------------------
// Table – the parsed capture
// ---------------------------------------------------------------------------

/// A parsed capture: the time axis followed by the channel columns in file order.
///
/// All columns have the same length and names are unique; both are checked
/// on construction and preserved by every method that returns a `Table`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// Build a table, validating equal column lengths and unique names.
    pub fn new(columns: Vec<Column>) -> Result<Self, ExtractError> {
        let mut seen = BTreeSet::new();
        for col in &columns {
            if !seen.insert(col.name.as_str()) {
                return Err(ExtractError::DuplicateColumn(col.name.clone()));
            }
        }
        if let Some(first) = columns.first() {
            let expected = first.values.len();
            if let Some(bad) = columns.iter().find(|c| c.values.len() != expected) {
                return Err(ExtractError::ColumnLength {
                    name: bad.name.clone(),
                    expected,
                    found: bad.values.len(),
                });
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The time axis (first column).
    pub fn time(&self) -> Option<&Column> {
        self.columns.first()
    }

    /// Every column after the time axis.
    pub fn channels(&self) -> &[Column] {
        self.columns.get(1..).unwrap_or(&[])
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values of row `index` in column order.
    pub fn row(&self, index: usize) -> Option<Vec<f64>> {
        if index >= self.len() {
            return None;
        }
        Some(self.columns.iter().map(|c| c.values[index]).collect())
    }

    /// Rename columns via an old → new map. Unknown keys are ignored.
    ///
    /// Renames apply simultaneously, so swapping two names works. The table
    /// is left untouched if the result would contain a duplicate name.
    pub fn rename_columns(&mut self, names: &BTreeMap<String, String>) -> Result<(), ExtractError> {
        let renamed: Vec<String> = self
            .columns
            .iter()
            .map(|c| names.get(&c.name).unwrap_or(&c.name).clone())
            .collect();

        let mut seen = BTreeSet::new();
        for name in &renamed {
            if !seen.insert(name.as_str()) {
                return Err(ExtractError::DuplicateColumn(name.clone()));
            }
        }

        for (col, name) in self.columns.iter_mut().zip(renamed) {
            col.name = name;
        }
        Ok(())
    }

    /// Row slice `index` of `count` contiguous segments.
    ///
    /// Segment `i` covers rows `len*i/count .. len*(i+1)/count`, so the last
    /// segment absorbs the remainder. Returns `None` for `count == 0` or an
    /// out-of-range `index`.
    pub fn segment(&self, index: usize, count: usize) -> Option<Table> {
        if count == 0 || index >= count {
            return None;
        }
        // Widened so `len * (index + 1)` cannot overflow for any usize inputs.
        let bound = |i: usize| (self.len() as u128 * i as u128 / count as u128) as usize;
        let start = bound(index);
        let end = bound(index + 1);
        let columns = self
            .columns
            .iter()
            .map(|c| Column::new(c.name.clone(), c.values[start..end].to_vec()))
            .collect();
        Some(Table { columns })
    }

    /// Minimum and maximum over the named columns, ignoring NaN.
    ///
    /// Unknown names are skipped. `None` if nothing finite was found.
    pub fn value_range<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Option<(f64, f64)> {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for name in names {
            let Some(col) = self.column(name) else {
                continue;
            };
            for &v in col.values.iter().filter(|v| v.is_finite()) {
                lo = lo.min(v);
                hi = hi.max(v);
            }
        }
        (lo <= hi).then_some((lo, hi))
    }
}
