use std::fmt;

use pullexec_error::{DbError, Result};
use serde::{Deserialize, Serialize};

use crate::arrays::datatype::DataType;
use crate::arrays::scalar::ScalarValue;

/// Identifier for a tuple descriptor within a descriptor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TupleId(pub u32);

impl fmt::Display for TupleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Describes the slots of one tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TupleDescriptor {
    pub id: TupleId,
    pub slot_types: Vec<DataType>,
}

/// All tuple descriptors referenced by a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorTable {
    pub tuples: Vec<TupleDescriptor>,
}

impl DescriptorTable {
    pub fn new(tuples: impl IntoIterator<Item = TupleDescriptor>) -> Self {
        DescriptorTable {
            tuples: tuples.into_iter().collect(),
        }
    }

    pub fn get_tuple(&self, id: TupleId) -> Option<&TupleDescriptor> {
        self.tuples.iter().find(|t| t.id == id)
    }

    /// Resolve a row descriptor from the tuple ids making up a row.
    pub fn row_descriptor(&self, tuple_ids: &[TupleId]) -> Result<RowDescriptor> {
        let mut types = Vec::new();
        for &id in tuple_ids {
            let tuple = self.get_tuple(id).ok_or_else(|| {
                DbError::corrupt_plan("Missing tuple descriptor").with_field("tuple_id", id)
            })?;
            types.extend_from_slice(&tuple.slot_types);
        }

        Ok(RowDescriptor {
            tuple_ids: tuple_ids.to_vec(),
            types,
        })
    }
}

/// Shape of the rows produced by a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowDescriptor {
    pub tuple_ids: Vec<TupleId>,
    pub types: Vec<DataType>,
}

impl RowDescriptor {
    pub fn num_columns(&self) -> usize {
        self.types.len()
    }

    pub fn column_type(&self, idx: usize) -> Option<DataType> {
        self.types.get(idx).copied()
    }

    /// If rows described by `self` and `other` have the same layout.
    pub fn layout_equals(&self, other: &RowDescriptor) -> bool {
        self.types == other.types
    }

    /// Check that a row matches this descriptor.
    pub fn check_row(&self, row: &[ScalarValue]) -> Result<()> {
        if row.len() != self.types.len() {
            return Err(DbError::new("Row has unexpected number of columns")
                .with_field("expected", self.types.len())
                .with_field("got", row.len()));
        }

        for (idx, (value, datatype)) in row.iter().zip(&self.types).enumerate() {
            if !value.fits_type(*datatype) {
                return Err(DbError::new("Row value does not match column type")
                    .with_field("column", idx)
                    .with_field("expected", datatype)
                    .with_field("value", value));
            }
        }

        Ok(())
    }
}

impl fmt::Display for RowDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (idx, datatype) in self.types.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{datatype}")?;
        }
        write!(f, ")")
    }
}
