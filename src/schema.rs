// csv_indexer/src/schema.rs
// Resolution of the field names used to label each record.

use std::fmt;

use crate::error::Result;
use crate::source::{RecordSource, SourceRow};

/// Ordered field names. Uniqueness is assumed, not checked.
#[derive(Debug, Clone, PartialEq, Eq, Default,)]
pub struct Schema {
    fields: Vec<String,>,
}

impl Schema {
    pub fn new(fields: Vec<String,>,) -> Self {
        Self { fields, }
    }

    pub fn fields(&self,) -> &[String] {
        &self.fields
    }

    pub fn len(&self,) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self,) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result {
        write!(f, "[{}]", self.fields.join(" "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct Resolution {
    pub schema:           Schema,
    /// True when the names came from the first row of the source.
    pub inferred:         bool,
    /// True when that first row was itself malformed.
    pub malformed_header: bool,
}

pub struct SchemaResolver;

impl SchemaResolver {
    /// Uses `explicit_fields` verbatim when given. Otherwise consumes exactly
    /// one row from `source` and takes its values as the field names, even if
    /// the row was malformed.
    pub fn resolve(
        explicit_fields: Option<Vec<String,>,>,
        source: &mut impl RecordSource,
    ) -> Result<Resolution,> {
        if let Some(fields,) = explicit_fields {
            return Ok(Resolution {
                schema:           Schema::new(fields,),
                inferred:         false,
                malformed_header: false,
            },);
        }

        let (fields, malformed_header,) = match source.next_row()? {
            SourceRow::Record(values,) => (values, false,),
            SourceRow::Malformed { values, .. } => (values, true,),
            SourceRow::End => (Vec::new(), false,),
        };

        Ok(Resolution {
            schema: Schema::new(fields,),
            inferred: true,
            malformed_header,
        },)
    }
}

/// Splits a comma-separated field list. An empty string means "infer from
/// the first row" and yields `None`.
pub fn parse_fields(raw: &str,) -> Option<Vec<String,>,> {
    if raw.is_empty() {
        return None;
    }
    Some(raw.split(',',).map(str::to_string,).collect(),)
}
