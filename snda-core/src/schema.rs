//! Array schema: ordered, named, typed columns
//!
//! A schema declares the column layout of an array. A subset of columns
//! are index (dimension) columns, which together form the multi-dimensional
//! addressing key of a cell; the rest are attribute columns. At least one
//! index column is required, and fixed-size index columns carry an
//! inclusive `[lower, upper]` domain.

use crate::datatype::DataType;
use crate::error::{Result, SndaError};
use crate::value::DimensionValue;

/// One declared column
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColumnSpec {
    /// Column name, unique within the schema
    pub name: String,
    /// Declared value type
    pub dtype: DataType,
    /// True if this column is part of the addressing key
    pub is_index: bool,
    /// Declared inclusive bounds; required for fixed-size index columns,
    /// absent for attribute and var-sized columns
    pub domain: Option<(DimensionValue, DimensionValue)>,
}

/// Ordered collection of column specs with index-column bookkeeping
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Schema {
    columns: Vec<ColumnSpec>,
}

impl Schema {
    /// Build a schema from column specs, validating the index-column rules
    pub fn new(columns: Vec<ColumnSpec>) -> Result<Self> {
        if columns.is_empty() {
            return Err(SndaError::Schema("schema has no columns".into()));
        }
        let mut seen: Vec<&str> = Vec::with_capacity(columns.len());
        let mut index_count = 0;
        for col in &columns {
            if seen.contains(&col.name.as_str()) {
                return Err(SndaError::Schema(format!(
                    "duplicate column name '{}'",
                    col.name
                )));
            }
            seen.push(&col.name);
            if col.is_index {
                index_count += 1;
                if !col.dtype.is_indexable() {
                    return Err(SndaError::Schema(format!(
                        "column '{}' of type {} cannot be an index column",
                        col.name, col.dtype
                    )));
                }
                match (&col.domain, col.dtype.is_var_sized()) {
                    (None, false) => {
                        return Err(SndaError::Schema(format!(
                            "index column '{}' is missing a declared domain",
                            col.name
                        )));
                    }
                    (Some((lower, upper)), false) => {
                        if lower.data_type() != col.dtype || upper.data_type() != col.dtype {
                            return Err(SndaError::Schema(format!(
                                "domain of index column '{}' does not match its type {}",
                                col.name, col.dtype
                            )));
                        }
                        if lower.cmp_same_type(upper) == Some(core::cmp::Ordering::Greater) {
                            return Err(SndaError::Schema(format!(
                                "domain of index column '{}' has lower > upper",
                                col.name
                            )));
                        }
                    }
                    (Some(_), true) => {
                        return Err(SndaError::Schema(format!(
                            "var-sized index column '{}' must not declare a numeric domain",
                            col.name
                        )));
                    }
                    (None, true) => {}
                }
            }
        }
        if index_count == 0 {
            return Err(SndaError::Schema(
                "at least one index column is required".into(),
            ));
        }
        Ok(Self { columns })
    }

    /// All columns in declaration order
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a column, failing with a schema error if absent
    pub fn require_column(&self, name: &str) -> Result<&ColumnSpec> {
        self.column(name)
            .ok_or_else(|| SndaError::Schema(format!("column '{name}' does not exist")))
    }

    /// Index (dimension) column names, in declaration order
    pub fn dim_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.is_index)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Attribute column names, in declaration order
    pub fn attr_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| !c.is_index)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Number of index columns
    pub fn ndim(&self) -> usize {
        self.columns.iter().filter(|c| c.is_index).count()
    }

    /// Declared domain of a fixed-size index column
    pub fn domain(&self, name: &str) -> Result<(DimensionValue, DimensionValue)> {
        let col = self.require_column(name)?;
        if !col.is_index {
            return Err(SndaError::Schema(format!(
                "column '{name}' is not an index column"
            )));
        }
        col.domain.clone().ok_or_else(|| {
            SndaError::Schema(format!(
                "index column '{name}' is var-sized and has no declared domain"
            ))
        })
    }
}

/// Builder for schemas
///
/// ```
/// use snda_core::{DataType, DimensionValue, SchemaBuilder};
///
/// let schema = SchemaBuilder::new()
///     .index_column(
///         "dim0",
///         DataType::Int64,
///         (DimensionValue::Int64(0), DimensionValue::Int64(99)),
///     )
///     .attr_column("attr0", DataType::Float32)
///     .build()
///     .unwrap();
/// assert_eq!(schema.ndim(), 1);
/// ```
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    columns: Vec<ColumnSpec>,
}

impl SchemaBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fixed-size index column with an inclusive domain
    pub fn index_column(
        mut self,
        name: &str,
        dtype: DataType,
        domain: (DimensionValue, DimensionValue),
    ) -> Self {
        self.columns.push(ColumnSpec {
            name: name.into(),
            dtype,
            is_index: true,
            domain: Some(domain),
        });
        self
    }

    /// Add a var-sized (string) index column; no numeric domain
    pub fn var_index_column(mut self, name: &str) -> Self {
        self.columns.push(ColumnSpec {
            name: name.into(),
            dtype: DataType::StringUtf8,
            is_index: true,
            domain: None,
        });
        self
    }

    /// Add an attribute column
    pub fn attr_column(mut self, name: &str, dtype: DataType) -> Self {
        self.columns.push(ColumnSpec {
            name: name.into(),
            dtype,
            is_index: false,
            domain: None,
        });
        self
    }

    /// Validate and build the schema
    pub fn build(self) -> Result<Schema> {
        Schema::new(self.columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_domain(lo: i64, hi: i64) -> (DimensionValue, DimensionValue) {
        (DimensionValue::Int64(lo), DimensionValue::Int64(hi))
    }

    #[test]
    fn test_requires_index_column() {
        let err = SchemaBuilder::new()
            .attr_column("attr0", DataType::Float32)
            .build()
            .unwrap_err();
        assert!(matches!(err, SndaError::Schema(_)));
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let err = SchemaBuilder::new()
            .index_column("dim0", DataType::Int64, int_domain(0, 9))
            .attr_column("dim0", DataType::Float32)
            .build()
            .unwrap_err();
        assert!(matches!(err, SndaError::Schema(_)));
    }

    #[test]
    fn test_rejects_inverted_domain() {
        let err = SchemaBuilder::new()
            .index_column("dim0", DataType::Int64, int_domain(10, 0))
            .build()
            .unwrap_err();
        assert!(matches!(err, SndaError::Schema(_)));
    }

    #[test]
    fn test_dim_and_attr_names() {
        let schema = SchemaBuilder::new()
            .index_column("dim0", DataType::Int64, int_domain(0, 99))
            .index_column("dim1", DataType::Int64, int_domain(0, 99))
            .attr_column("attr0", DataType::Float32)
            .build()
            .unwrap();
        assert_eq!(schema.dim_names(), vec!["dim0", "dim1"]);
        assert_eq!(schema.attr_names(), vec!["attr0"]);
        assert_eq!(schema.ndim(), 2);
    }
}
