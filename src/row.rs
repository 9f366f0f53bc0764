//! Row contract shared by producers and consumers.
//!
//! A [`Row`] is a read-only record addressable by column name or by zero-based
//! position. Adapters usually don't implement [`Row`] by hand: they describe
//! their item type once with a [`ColumnMap`] (name → position, plus one
//! accessor per position) and wrap each item in a [`Record`].
//!
//! ```
//! use rowstream::{ColumnMap, Record, Row};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! struct Repo { name: String, stars: u64 }
//!
//! let columns = Arc::new(
//!     ColumnMap::<Repo>::builder()
//!         .column("name", |r| json!(r.name))
//!         .column("stars", |r| json!(r.stars))
//!         .build()
//!         .unwrap(),
//! );
//! let row = Record::new(Arc::clone(&columns), Repo { name: "rowstream".into(), stars: 7 });
//! assert_eq!(row.value("stars").unwrap(), json!(7));
//! assert_eq!(row.value_at(0).unwrap(), json!("rowstream"));
//! ```

use crate::error::RowError;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Column values are JSON values.
pub type Value = serde_json::Value;

/// A read-only record produced by a data source.
pub trait Row: Send + 'static {
    /// Number of columns.
    fn width(&self) -> usize;

    /// Name of the column at `index`.
    fn column_name(&self, index: usize) -> Option<&str>;

    /// Position of the column called `name`.
    fn position(&self, name: &str) -> Option<usize>;

    /// Value of the column at `index`.
    ///
    /// # Errors
    /// [`RowError::ColumnOutOfRange`] if `index >= width()`.
    fn value_at(&self, index: usize) -> Result<Value, RowError>;

    /// Value of the column called `name`.
    ///
    /// # Errors
    /// [`RowError::UnknownColumn`] if the row has no such column.
    fn value(&self, name: &str) -> Result<Value, RowError> {
        let index = self
            .position(name)
            .ok_or_else(|| RowError::UnknownColumn(name.to_string()))?;
        self.value_at(index)
    }

    /// The objects this row was built from. Composite rows expose one context
    /// per underlying row.
    fn contexts(&self) -> Vec<&dyn Any>;
}

type Accessor<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;

/// Name → position association and per-position accessors for item type `T`.
///
/// Built once per adapter type and shared by every [`Record`] it produces.
pub struct ColumnMap<T> {
    names: Vec<String>,
    positions: HashMap<String, usize>,
    accessors: Vec<Accessor<T>>,
}

impl<T> ColumnMap<T> {
    #[must_use]
    pub fn builder() -> ColumnMapBuilder<T> {
        ColumnMapBuilder {
            columns: Vec::new(),
        }
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// Evaluate the accessor at `index` against `item`.
    ///
    /// # Errors
    /// [`RowError::ColumnOutOfRange`] if there is no such column.
    pub fn get(&self, item: &T, index: usize) -> Result<Value, RowError> {
        let accessor = self.accessors.get(index).ok_or(RowError::ColumnOutOfRange {
            index,
            width: self.width(),
        })?;
        Ok(accessor(item))
    }
}

impl<T> fmt::Debug for ColumnMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnMap").field("names", &self.names).finish()
    }
}

/// Fluent builder for [`ColumnMap`].
pub struct ColumnMapBuilder<T> {
    columns: Vec<(String, Accessor<T>)>,
}

impl<T> ColumnMapBuilder<T> {
    #[must_use]
    pub fn column<F>(mut self, name: impl Into<String>, accessor: F) -> Self
    where
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        self.columns.push((name.into(), Arc::new(accessor)));
        self
    }

    /// Finish the map.
    ///
    /// # Errors
    /// [`RowError::DuplicateColumn`] if two columns share a name.
    pub fn build(self) -> Result<ColumnMap<T>, RowError> {
        let mut names = Vec::with_capacity(self.columns.len());
        let mut positions = HashMap::with_capacity(self.columns.len());
        let mut accessors = Vec::with_capacity(self.columns.len());
        for (i, (name, accessor)) in self.columns.into_iter().enumerate() {
            if positions.insert(name.clone(), i).is_some() {
                return Err(RowError::DuplicateColumn(name));
            }
            names.push(name);
            accessors.push(accessor);
        }
        Ok(ColumnMap {
            names,
            positions,
            accessors,
        })
    }
}

/// A [`Row`] over a single backing item.
pub struct Record<T> {
    columns: Arc<ColumnMap<T>>,
    item: T,
}

impl<T> Record<T> {
    pub fn new(columns: Arc<ColumnMap<T>>, item: T) -> Self {
        Self { columns, item }
    }

    pub fn item(&self) -> &T {
        &self.item
    }

    pub fn into_item(self) -> T {
        self.item
    }
}

impl<T: fmt::Debug> fmt::Debug for Record<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Record").field(&self.item).finish()
    }
}

impl<T: Send + Sync + 'static> Row for Record<T> {
    fn width(&self) -> usize {
        self.columns.width()
    }

    fn column_name(&self, index: usize) -> Option<&str> {
        self.columns.names.get(index).map(String::as_str)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.position(name)
    }

    fn value_at(&self, index: usize) -> Result<Value, RowError> {
        self.columns.get(&self.item, index)
    }

    fn contexts(&self) -> Vec<&dyn Any> {
        vec![&self.item as &dyn Any]
    }
}

/// Two rows side by side: columns of `left`, then columns of `right`.
///
/// When both sides have a column with the same name, lookup by name resolves
/// to the left one; the right one stays reachable by position.
#[derive(Debug)]
pub struct JoinedRow<L, R> {
    pub left: L,
    pub right: R,
}

impl<L: Row, R: Row> JoinedRow<L, R> {
    pub fn new(left: L, right: R) -> Self {
        Self { left, right }
    }
}

impl<L: Row, R: Row> Row for JoinedRow<L, R> {
    fn width(&self) -> usize {
        self.left.width() + self.right.width()
    }

    fn column_name(&self, index: usize) -> Option<&str> {
        let split = self.left.width();
        if index < split {
            self.left.column_name(index)
        } else {
            self.right.column_name(index - split)
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.left
            .position(name)
            .or_else(|| self.right.position(name).map(|p| p + self.left.width()))
    }

    fn value_at(&self, index: usize) -> Result<Value, RowError> {
        let split = self.left.width();
        if index < split {
            self.left.value_at(index)
        } else if index < self.width() {
            self.right.value_at(index - split)
        } else {
            Err(RowError::ColumnOutOfRange {
                index,
                width: self.width(),
            })
        }
    }

    fn contexts(&self) -> Vec<&dyn Any> {
        let mut out = self.left.contexts();
        out.extend(self.right.contexts());
        out
    }
}
