//! Domain records built by item extractors.
//!
//! Consumers of the engine describe their domain objects with a
//! [`RecordSpec`]: the named fields an object carries, which of them are
//! mandatory, and which one (if any) identifies the object for
//! deduplication. An item extractor builds one [`Record`] per candidate
//! node, assigning field values one at a time.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::error::{ExtractError, Result};
use crate::value::Value;

/// One declared field of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name.
    pub name: String,
    /// Mandatory fields always propagate extraction errors, even when
    /// field-error tolerance is enabled on the extractor.
    pub mandatory: bool,
}

/// Declaration of a domain object: its fields and identity.
#[derive(Debug, Clone)]
pub struct RecordSpec {
    name: String,
    fields: Vec<FieldSpec>,
    identity: Option<String>,
}

impl RecordSpec {
    /// Start declaring a record type.
    pub fn builder(name: impl Into<String>) -> RecordSpecBuilder {
        RecordSpecBuilder {
            name: name.into(),
            fields: Vec::new(),
            identity: None,
        }
    }

    /// Record type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared fields, in declaration order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Look up one field declaration.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Name of the identity field, if one was declared.
    pub fn identity_field(&self) -> Option<&str> {
        self.identity.as_deref()
    }
}

/// Builder for [`RecordSpec`].
#[derive(Debug, Clone)]
pub struct RecordSpecBuilder {
    name: String,
    fields: Vec<FieldSpec>,
    identity: Option<String>,
}

impl RecordSpecBuilder {
    /// Declare an optional field.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            mandatory: false,
        });
        self
    }

    /// Declare a mandatory field.
    pub fn mandatory_field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            mandatory: true,
        });
        self
    }

    /// Designate the identity field used for deduplication. Declares the
    /// field (as mandatory) if it was not declared before.
    pub fn identity(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.fields.iter().any(|f| f.name == name) {
            self.fields.push(FieldSpec {
                name: name.clone(),
                mandatory: true,
            });
        }
        self.identity = Some(name);
        self
    }

    /// Finish the declaration. Specs are shared between extractors and
    /// every record they build, hence the `Arc`.
    pub fn build(self) -> Arc<RecordSpec> {
        Arc::new(RecordSpec {
            name: self.name,
            fields: self.fields,
            identity: self.identity,
        })
    }
}

/// One domain object under construction or fully built.
#[derive(Debug, Clone)]
pub struct Record {
    spec: Arc<RecordSpec>,
    values: IndexMap<String, Value>,
}

impl Record {
    /// Fresh record with no field set.
    pub fn new(spec: Arc<RecordSpec>) -> Self {
        Record {
            spec,
            values: IndexMap::new(),
        }
    }

    /// The declaration this record was built from.
    pub fn spec(&self) -> &RecordSpec {
        &self.spec
    }

    /// Assign one field. Assigning an undeclared field is a hard error:
    /// it indicates a mismatch between the extractor and the record
    /// declaration.
    pub fn set(&mut self, field: &str, value: Value) -> Result<()> {
        if self.spec.field(field).is_none() {
            return Err(ExtractError::UnknownField {
                record: self.spec.name().to_string(),
                field: field.to_string(),
            });
        }
        self.values.insert(field.to_string(), value);
        Ok(())
    }

    /// Read one field back, if it was assigned.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// The record's identity: the identity field's value rendered as
    /// text, when it is set and non-empty.
    pub fn identity(&self) -> Option<String> {
        let field = self.spec.identity_field()?;
        let text = self.values.get(field)?.to_text()?;
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Export the assigned fields as a JSON object, in assignment order.
    pub fn to_json(&self) -> Json {
        Json::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Record) -> bool {
        self.spec.name() == other.spec.name() && self.values == other.values
    }
}
