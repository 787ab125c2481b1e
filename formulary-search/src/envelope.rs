//! Upstream payloads, and the response shape of merged searches.

use serde::Serialize;
use serde_json::{json, Value};

/// A single upstream result. Its contents are opaque to Formulary, except
/// for the natural key used to deduplicate aggregated searches.
pub type Record = Value;

/// A list of records and the number of records the search matched.
///
/// This is the shape Formulary builds itself, for merged searches and for
/// upstream "not found" answers. Single-field searches forward the upstream
/// payload without converting it to this type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    /// The matched records.
    pub results: Vec<Record>,

    /// Metadata about the search.
    pub meta: Meta,
}

/// The `meta` object of an [`Envelope`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Meta {
    /// Counts for the search.
    pub results: ResultsMeta,
}

/// The `meta.results` object of an [`Envelope`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultsMeta {
    /// The number of records the search matched. This may be larger than
    /// the number of records returned.
    pub total: u64,
}

impl Envelope {
    /// An envelope with `results` and the given total.
    pub fn new(results: Vec<Record>, total: u64) -> Self {
        Self {
            results,
            meta: Meta {
                results: ResultsMeta { total },
            },
        }
    }

    /// The shape returned when nothing matched: `{results: [], meta: {results: {total: 0}}}`.
    pub fn empty() -> Self {
        Self::new(Vec::new(), 0)
    }

    /// [`Envelope::empty`] as a payload, for searchers that answer with raw
    /// upstream JSON.
    pub fn empty_payload() -> Value {
        json!({"results": [], "meta": {"results": {"total": 0}}})
    }

    /// The number of records the search matched.
    pub fn total(&self) -> u64 {
        self.meta.results.total
    }
}

/// Take the records out of an upstream payload.
///
/// Only `results` is read. A payload without a `results` array has no
/// records, and the rest of the payload is not checked.
pub fn records_of(payload: Value) -> Vec<Record> {
    match payload {
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(records)) => records,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}
