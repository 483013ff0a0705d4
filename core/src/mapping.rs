//! Renaming of wire-level response fields to the names the client state uses.
//!
//! # Design
//! The table is loaded once and read-only afterwards. Mapping consumes the
//! raw response and returns a new one; error payloads are never touched.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::client::ApiResponse;

/// API field name to internal field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    fields: HashMap<String, String>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, api_name: &str, internal_name: &str) -> &mut Self {
        self.fields
            .insert(api_name.to_string(), internal_name.to_string());
        self
    }

    pub fn get(&self, api_name: &str) -> Option<&str> {
        self.fields.get(api_name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Rename the fields of a successful response body.
    ///
    /// Top-level keys and the keys of every object in `results` are renamed;
    /// everything else is carried over unchanged.
    pub fn map_body(&self, body: Value) -> Value {
        let Value::Object(object) = body else {
            return body;
        };
        let mut object = self.rename_keys(object);
        let results_key = self.get("results").unwrap_or("results").to_string();
        if let Some(Value::Array(results)) = object.remove(&results_key) {
            let results = results
                .into_iter()
                .map(|result| match result {
                    Value::Object(fields) => Value::Object(self.rename_keys(fields)),
                    other => other,
                })
                .collect();
            object.insert(results_key, Value::Array(results));
        }
        Value::Object(object)
    }

    /// A renamed field replaces an unrenamed field that already carries the
    /// internal name, whatever order the keys arrive in.
    fn rename_keys(&self, object: Map<String, Value>) -> Map<String, Value> {
        let (renamed, kept): (Vec<_>, Vec<_>) = object
            .into_iter()
            .partition(|(key, _)| self.fields.contains_key(key));
        let mut out: Map<String, Value> = kept.into_iter().collect();
        for (key, value) in renamed {
            let internal = &self.fields[&key];
            if out.insert(internal.clone(), value).is_some() {
                tracing::debug!(field = %key, internal = %internal, "mapped field replaced existing value");
            }
        }
        out
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for MappingTable {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut table = MappingTable::new();
        for (api_name, internal_name) in iter {
            table.insert(api_name, internal_name);
        }
        table
    }
}

/// Rename the fields of a successful search response. Error payloads are
/// returned as they are.
pub fn map_search_response(response: ApiResponse<Value>, mappings: &MappingTable) -> ApiResponse<Value> {
    match response {
        ApiResponse::Success(body) if !mappings.is_empty() => {
            ApiResponse::Success(mappings.map_body(body))
        }
        other => other,
    }
}
