//! The upstream collections that can be searched, and the static data that
//! describes how to search each of them.

use serde_json::Value;
use std::{fmt, str::FromStr};
use thiserror::Error;

use crate::envelope::Record;

/// One of the upstream data collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Approved drug applications (`drugsfda`).
    DrugsFda,
    /// The national drug code directory.
    Ndc,
    /// Structured product labels.
    Label,
}

impl Resource {
    /// Every resource, in a stable order.
    pub const ALL: [Resource; 3] = [Resource::DrugsFda, Resource::Ndc, Resource::Label];

    /// The name used for this resource in caller-facing URLs.
    pub fn slug(self) -> &'static str {
        match self {
            Resource::DrugsFda => "drugsfda",
            Resource::Ndc => "ndc",
            Resource::Label => "label",
        }
    }

    /// The path of this resource on the upstream host.
    pub fn path(self) -> &'static str {
        match self {
            Resource::DrugsFda => "/drug/drugsfda.json",
            Resource::Ndc => "/drug/ndc.json",
            Resource::Label => "/drug/label.json",
        }
    }

    /// The fields probed, in priority order, when searching all fields of
    /// this resource.
    pub fn field_table(self) -> &'static [&'static str] {
        match self {
            Resource::DrugsFda => &[
                "openfda.brand_name",
                "openfda.generic_name",
                "openfda.manufacturer_name",
                "openfda.substance_name",
                "application_number",
            ],
            Resource::Ndc => &[
                "brand_name",
                "generic_name",
                "openfda.manufacturer_name",
                "product_ndc",
                "dosage_form",
                "route",
            ],
            Resource::Label => &[
                "openfda.brand_name",
                "openfda.generic_name",
                "indications_and_usage",
                "warnings",
            ],
        }
    }

    /// The record attribute that identifies a record of this resource.
    pub fn key_field(self) -> &'static str {
        match self {
            Resource::DrugsFda => "application_number",
            Resource::Ndc => "product_id",
            Resource::Label => "set_id",
        }
    }

    /// Extract the natural key of `record`.
    ///
    /// Strings count when they are non-empty, and numbers count too. Anything
    /// else, including a missing attribute or a record that is not an object,
    /// has no key.
    pub fn natural_key(self, record: &Record) -> Option<NaturalKey> {
        match record.get(self.key_field())? {
            Value::String(key) if !key.is_empty() => Some(NaturalKey::Text(key.clone())),
            Value::Number(key) => Some(NaturalKey::Number(key.to_string())),
            _ => None,
        }
    }
}

/// The identity of a record within one resource.
///
/// A number and a string with the same digits are different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NaturalKey {
    /// A string key, such as an application number.
    Text(String),
    /// A numeric key, in its JSON rendering.
    Number(String),
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// A resource slug did not name any known resource.
#[derive(Debug, Error, PartialEq)]
#[error("unknown resource `{0}`")]
pub struct UnknownResource(pub String);

impl FromStr for Resource {
    type Err = UnknownResource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resource::ALL
            .into_iter()
            .find(|resource| resource.slug() == s)
            .ok_or_else(|| UnknownResource(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{NaturalKey, Resource, UnknownResource};
    use serde_json::json;

    #[test]
    fn slugs_round_trip() {
        for resource in Resource::ALL {
            assert_eq!(resource.slug().parse(), Ok(resource));
        }
        assert_eq!(
            "devices".parse::<Resource>(),
            Err(UnknownResource("devices".to_string()))
        );
    }

    #[test]
    fn field_tables_are_not_empty() {
        for resource in Resource::ALL {
            let fields = resource.field_table();
            assert!((4..=7).contains(&fields.len()), "{} fields", resource);
        }
    }

    #[test]
    fn natural_key_reads_the_resource_key_field() {
        let r = json!({"application_number": "NDA012345", "set_id": "abc"});
        assert_eq!(
            Resource::DrugsFda.natural_key(&r),
            Some(NaturalKey::Text("NDA012345".to_string()))
        );
        assert_eq!(
            Resource::Label.natural_key(&r),
            Some(NaturalKey::Text("abc".to_string()))
        );
        assert_eq!(Resource::Ndc.natural_key(&r), None);
    }

    #[test]
    fn natural_key_ignores_empty_and_structured_values() {
        assert_eq!(
            Resource::Ndc.natural_key(&json!({"product_id": ""})),
            None
        );
        assert_eq!(
            Resource::Ndc.natural_key(&json!({"product_id": ["a"]})),
            None
        );
        assert_eq!(
            Resource::Ndc.natural_key(&json!({"product_id": null})),
            None
        );
        assert_eq!(
            Resource::Ndc.natural_key(&json!("a bare string")),
            None
        );
    }

    #[test]
    fn numeric_and_string_keys_are_distinct() {
        let number = Resource::Ndc.natural_key(&json!({"product_id": 42}));
        let text = Resource::Ndc.natural_key(&json!({"product_id": "42"}));
        assert_eq!(number, Some(NaturalKey::Number("42".to_string())));
        assert_eq!(text, Some(NaturalKey::Text("42".to_string())));
        assert_ne!(number, text);
    }
}
