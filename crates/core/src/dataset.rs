//! Column-oriented numeric data keyed by variable name.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::variable::Variable;

/// Named `f64` columns of equal length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    names: Vec<Variable>,
    columns: Vec<Vec<f64>>,
}

impl Dataset {
    /// An empty dataset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, values)` pairs.
    pub fn from_columns<I, N>(columns: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = (N, Vec<f64>)>,
        N: Into<Variable>,
    {
        let mut data = Self::new();
        for (name, values) in columns {
            data.push_column(name, values)?;
        }
        Ok(data)
    }

    /// Append a column. Its length must match the existing columns.
    pub fn push_column(
        &mut self,
        name: impl Into<Variable>,
        values: Vec<f64>,
    ) -> Result<(), CoreError> {
        let name = name.into();
        if self.contains(name.as_str()) {
            return Err(CoreError::DuplicateColumn {
                name: name.to_string(),
            });
        }
        if let Some(first) = self.columns.first() {
            if first.len() != values.len() {
                return Err(CoreError::RaggedColumns {
                    name: name.to_string(),
                    expected: first.len(),
                    got: values.len(),
                });
            }
        }
        self.names.push(name);
        self.columns.push(values);
        Ok(())
    }

    /// Number of rows (0 when there are no columns).
    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    /// Number of columns.
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Column names in insertion order.
    pub fn names(&self) -> &[Variable] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.as_str() == name)
    }

    /// Values of a column.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|n| n.as_str() == name)
            .map(|i| self.columns[i].as_slice())
    }

    /// Whether every value of a column is 0 or 1.
    pub fn is_binary(&self, name: &str) -> Option<bool> {
        self.column(name)
            .map(|col| col.iter().all(|&v| v == 0.0 || v == 1.0))
    }

    /// Mean of a column.
    pub fn mean(&self, name: &str) -> Option<f64> {
        self.column(name).and_then(|col| {
            if col.is_empty() {
                None
            } else {
                Some(col.iter().sum::<f64>() / col.len() as f64)
            }
        })
    }
}
