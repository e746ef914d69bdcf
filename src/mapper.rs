// csv_indexer/src/mapper.rs
// Turns raw rows into named-field documents.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::schema::Schema;
use crate::source::RawRecord;

/// Field name to value, serialized as a flat JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize,)]
#[serde(transparent)]
pub struct Document(BTreeMap<String, String,>,);

impl Document {
    pub fn get(&self, field: &str,) -> Option<&str,> {
        self.0.get(field,).map(String::as_str,)
    }

    pub fn len(&self,) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self,) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String,>, V: Into<String,>,> FromIterator<(K, V,),> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V,),>,>(iter: I,) -> Self {
        Document(iter.into_iter().map(|(k, v,)| (k.into(), v.into(),),).collect(),)
    }
}

pub struct RecordMapper<'a,> {
    schema: &'a Schema,
}

impl<'a,> RecordMapper<'a,> {
    pub fn new(schema: &'a Schema,) -> Self {
        Self { schema, }
    }

    /// Pairs `schema[i]` with `raw[i]`. Rows whose width differs from the
    /// schema yield `None`. Values are taken as-is.
    pub fn map(&self, raw: RawRecord,) -> Option<Document,> {
        if raw.len() != self.schema.len() {
            return None;
        }
        Some(self.schema.fields().iter().cloned().zip(raw,).collect(),)
    }
}
