//! The table of single-field search endpoints.
//!
//! Each entry ties a caller-facing URL (`/api/{resource}/{slug}`) to the
//! upstream clause it produces. Handlers look entries up here instead of
//! being written out one per endpoint.

use std::collections::HashMap;
use thiserror::Error;

use crate::{Clause, Resource};

/// How an endpoint turns query parameters into a [`Clause`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// Match the parameter `param` against a fixed `field`.
    Match {
        /// The query parameter carrying the term.
        param: &'static str,
        /// The upstream attribute to match.
        field: &'static str,
    },
    /// Require that `field` is present. Takes no parameters.
    Exists {
        /// The upstream attribute that must be present.
        field: &'static str,
    },
    /// Match values of `field` between two parameters, inclusive.
    Range {
        /// The upstream attribute to compare.
        field: &'static str,
        /// The query parameter with the lower bound.
        start_param: &'static str,
        /// The query parameter with the upper bound.
        end_param: &'static str,
    },
    /// Match the parameter `param` against a field picked by a selector
    /// parameter from a fixed list.
    Choice {
        /// The query parameter carrying the term.
        param: &'static str,
        /// The query parameter choosing the field.
        selector: &'static str,
        /// Selector values and the fields they choose. Selectors are compared
        /// case-insensitively.
        choices: &'static [(&'static str, &'static str)],
        /// The field used when the selector is missing or unrecognized.
        default: &'static str,
    },
    /// Match the parameter `param` against any field the caller names.
    AnyField {
        /// The query parameter carrying the term.
        param: &'static str,
        /// The query parameter naming the field.
        field_param: &'static str,
        /// The field used when the caller names none.
        default: &'static str,
    },
}

/// A caller-facing single-field search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    /// The collection the endpoint searches.
    pub resource: Resource,
    /// The last path segment of the endpoint's URL.
    pub slug: &'static str,
    /// How to build the clause.
    pub kind: EndpointKind,
}

/// A required query parameter was not supplied.
#[derive(Debug, Error, PartialEq)]
#[error("missing query parameter `{0}`")]
pub struct MissingParameter(pub &'static str);

impl Endpoint {
    /// Build the clause for this endpoint from the request's query parameters.
    ///
    /// # Errors
    /// If a parameter the endpoint needs is absent.
    pub fn clause(&self, params: &HashMap<String, String>) -> Result<Clause, MissingParameter> {
        let required = |name: &'static str| {
            params
                .get(name)
                .map(String::as_str)
                .ok_or(MissingParameter(name))
        };

        let clause = match self.kind {
            EndpointKind::Match { param, field } => Clause::matching(field, required(param)?),
            EndpointKind::Exists { field } => Clause::Exists {
                field: field.to_string(),
            },
            EndpointKind::Range {
                field,
                start_param,
                end_param,
            } => Clause::Range {
                field: field.to_string(),
                start: required(start_param)?.to_string(),
                end: required(end_param)?.to_string(),
            },
            EndpointKind::Choice {
                param,
                selector,
                choices,
                default,
            } => {
                let term = required(param)?;
                let field = params
                    .get(selector)
                    .and_then(|wanted| {
                        choices
                            .iter()
                            .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
                    })
                    .map_or(default, |(_, field)| *field);
                Clause::matching(field, term)
            }
            EndpointKind::AnyField {
                param,
                field_param,
                default,
            } => {
                let term = required(param)?;
                let field = params.get(field_param).map_or(default, String::as_str);
                Clause::matching(field, term)
            }
        };

        Ok(clause)
    }
}

/// Find the endpoint for `slug` on `resource`.
pub fn find(resource: Resource, slug: &str) -> Option<&'static Endpoint> {
    ENDPOINTS
        .iter()
        .find(|endpoint| endpoint.resource == resource && endpoint.slug == slug)
}

/// Shorthand for the common case of one parameter matched against one field.
const fn matching(
    resource: Resource,
    slug: &'static str,
    param: &'static str,
    field: &'static str,
) -> Endpoint {
    Endpoint {
        resource,
        slug,
        kind: EndpointKind::Match { param, field },
    }
}

/// Shorthand for a label section searched by free text in `query`.
const fn label_section(slug: &'static str, field: &'static str) -> Endpoint {
    matching(Resource::Label, slug, "query", field)
}

/// Shorthand for a label endpoint that only requires a section to exist.
const fn label_exists(slug: &'static str, field: &'static str) -> Endpoint {
    Endpoint {
        resource: Resource::Label,
        slug,
        kind: EndpointKind::Exists { field },
    }
}

/// Every single-field search endpoint.
pub static ENDPOINTS: &[Endpoint] = &[
    // Applications
    Endpoint {
        resource: Resource::DrugsFda,
        slug: "search",
        kind: EndpointKind::AnyField {
            param: "query",
            field_param: "field",
            default: "openfda.brand_name",
        },
    },
    // National drug codes
    matching(Resource::Ndc, "brand-name", "name", "brand_name"),
    matching(Resource::Ndc, "generic-name", "name", "generic_name"),
    matching(Resource::Ndc, "product-ndc", "ndc", "product_ndc"),
    matching(Resource::Ndc, "package-ndc", "ndc", "packaging.package_ndc"),
    matching(Resource::Ndc, "dosage-form", "form", "dosage_form"),
    matching(Resource::Ndc, "route", "route", "route"),
    matching(Resource::Ndc, "manufacturer", "name", "openfda.manufacturer_name"),
    matching(Resource::Ndc, "product-type", "type", "product_type"),
    matching(Resource::Ndc, "finished", "finished", "finished"),
    matching(Resource::Ndc, "marketing-category", "category", "marketing_category"),
    matching(Resource::Ndc, "application-number", "number", "application_number"),
    matching(Resource::Ndc, "dea-schedule", "schedule", "dea_schedule"),
    Endpoint {
        resource: Resource::Ndc,
        slug: "pharm-class",
        kind: EndpointKind::Choice {
            param: "class_name",
            selector: "class_type",
            choices: &[
                ("epc", "openfda.pharm_class_epc"),
                ("pe", "openfda.pharm_class_pe"),
                ("moa", "openfda.pharm_class_moa"),
                ("cs", "openfda.pharm_class_cs"),
            ],
            default: "openfda.pharm_class_epc",
        },
    },
    matching(Resource::Ndc, "active-ingredient", "name", "active_ingredients.name"),
    matching(Resource::Ndc, "rxcui", "rxcui", "openfda.rxcui"),
    matching(Resource::Ndc, "unii", "unii", "openfda.unii"),
    matching(Resource::Ndc, "spl-id", "spl_id", "spl_id"),
    matching(Resource::Ndc, "spl-set-id", "spl_set_id", "openfda.spl_set_id"),
    matching(Resource::Ndc, "upc", "upc", "openfda.upc"),
    matching(
        Resource::Ndc,
        "original-packager",
        "is_original",
        "openfda.is_original_packager",
    ),
    // Product labels: identification
    matching(Resource::Label, "brand-name", "name", "openfda.brand_name"),
    matching(Resource::Label, "generic-name", "name", "openfda.generic_name"),
    matching(Resource::Label, "manufacturer", "name", "openfda.manufacturer_name"),
    matching(Resource::Label, "substance-name", "name", "openfda.substance_name"),
    matching(Resource::Label, "route", "route", "openfda.route"),
    matching(Resource::Label, "product-type", "type", "openfda.product_type"),
    // Abuse and overdosage
    label_section("abuse", "abuse"),
    label_section("controlled-substance", "controlled_substance"),
    label_section("dependence", "dependence"),
    label_section("overdosage", "overdosage"),
    // Adverse effects and interactions
    label_section("adverse-reactions", "adverse_reactions"),
    label_section("drug-interactions", "drug_interactions"),
    label_section(
        "laboratory-test-interactions",
        "drug_and_or_laboratory_test_interactions",
    ),
    // Clinical pharmacology
    label_section("clinical-pharmacology", "clinical_pharmacology"),
    label_section("mechanism-of-action", "mechanism_of_action"),
    label_section("pharmacodynamics", "pharmacodynamics"),
    label_section("pharmacokinetics", "pharmacokinetics"),
    // Indications, usage, and dosage
    label_section("indications-and-usage", "indications_and_usage"),
    label_section("contraindications", "contraindications"),
    label_section("description", "description"),
    label_section("dosage-and-administration", "dosage_and_administration"),
    label_section("dosage-forms-and-strengths", "dosage_forms_and_strengths"),
    label_section("active-ingredient", "active_ingredient"),
    label_section("inactive-ingredient", "inactive_ingredient"),
    label_section("purpose", "purpose"),
    // Nonclinical toxicology
    label_section(
        "animal-pharmacology-toxicology",
        "animal_pharmacology_and_or_toxicology",
    ),
    label_section(
        "carcinogenesis-mutagenesis-fertility",
        "carcinogenesis_and_mutagenesis_and_impairment_of_fertility",
    ),
    label_section("nonclinical-toxicology", "nonclinical_toxicology"),
    // Patient information
    label_section("ask-doctor", "ask_doctor"),
    label_section("do-not-use", "do_not_use"),
    label_section("information-for-patients", "information_for_patients"),
    label_section("instructions-for-use", "instructions_for_use"),
    label_section("keep-out-of-reach", "keep_out_of_reach_of_children"),
    label_section("stop-use", "stop_use"),
    label_section("when-using", "when_using"),
    // References
    label_section("clinical-studies", "clinical_studies"),
    label_section("references", "references"),
    // Special populations
    label_exists("geriatric-use", "geriatric_use"),
    label_section("labor-and-delivery", "labor_and_delivery"),
    label_section("nursing-mothers", "nursing_mothers"),
    label_exists("pediatric-use", "pediatric_use"),
    label_exists("pregnancy", "pregnancy"),
    label_section("teratogenic-effects", "teratogenic_effects"),
    // Supply, storage, and handling
    label_section("how-supplied", "how_supplied"),
    label_section("storage-and-handling", "storage_and_handling"),
    // Warnings and precautions
    label_exists("boxed-warning", "boxed_warning"),
    label_section("warnings", "warnings"),
    label_section("precautions", "precautions"),
    label_section("user-safety-warnings", "user_safety_warnings"),
    // Dates
    Endpoint {
        resource: Resource::Label,
        slug: "date-range",
        kind: EndpointKind::Range {
            field: "effective_time",
            start_param: "start_date",
            end_param: "end_date",
        },
    },
];

#[cfg(test)]
mod tests {
    use super::{find, MissingParameter, ENDPOINTS};
    use crate::{Clause, Resource};
    use std::collections::{HashMap, HashSet};

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn slugs_are_unique_per_resource() {
        let mut seen = HashSet::new();
        for endpoint in ENDPOINTS {
            assert!(
                seen.insert((endpoint.resource, endpoint.slug)),
                "duplicate endpoint {}/{}",
                endpoint.resource,
                endpoint.slug
            );
        }
    }

    #[test]
    fn lookup_is_scoped_to_the_resource() {
        let ndc = find(Resource::Ndc, "brand-name").expect("ndc brand-name exists");
        let label = find(Resource::Label, "brand-name").expect("label brand-name exists");
        let params = params(&[("name", "advil")]);
        assert_eq!(ndc.clause(&params), Ok(Clause::matching("brand_name", "advil")));
        assert_eq!(
            label.clause(&params),
            Ok(Clause::matching("openfda.brand_name", "advil"))
        );
        assert!(find(Resource::DrugsFda, "brand-name").is_none());
    }

    #[test]
    fn missing_parameters_are_named() {
        let endpoint = find(Resource::Ndc, "product-ndc").unwrap();
        assert_eq!(endpoint.clause(&params(&[])), Err(MissingParameter("ndc")));

        let endpoint = find(Resource::Label, "date-range").unwrap();
        assert_eq!(
            endpoint.clause(&params(&[("start_date", "20200101")])),
            Err(MissingParameter("end_date"))
        );
    }

    #[test]
    fn exists_endpoints_take_no_parameters() {
        let endpoint = find(Resource::Label, "boxed-warning").unwrap();
        assert_eq!(
            endpoint.clause(&params(&[])),
            Ok(Clause::Exists {
                field: "boxed_warning".to_string()
            })
        );
    }

    #[test]
    fn pharm_class_selects_the_field() {
        let endpoint = find(Resource::Ndc, "pharm-class").unwrap();
        assert_eq!(
            endpoint.clause(&params(&[("class_name", "Opioid Agonist"), ("class_type", "MOA")])),
            Ok(Clause::matching("openfda.pharm_class_moa", "Opioid Agonist"))
        );
        assert_eq!(
            endpoint.clause(&params(&[("class_name", "x"), ("class_type", "bogus")])),
            Ok(Clause::matching("openfda.pharm_class_epc", "x"))
        );
        assert_eq!(
            endpoint.clause(&params(&[("class_name", "x")])),
            Ok(Clause::matching("openfda.pharm_class_epc", "x"))
        );
    }

    #[test]
    fn drugsfda_search_takes_any_field() {
        let endpoint = find(Resource::DrugsFda, "search").unwrap();
        assert_eq!(
            endpoint.clause(&params(&[("query", "pfizer"), ("field", "sponsor_name")])),
            Ok(Clause::matching("sponsor_name", "pfizer"))
        );
        assert_eq!(
            endpoint.clause(&params(&[("query", "lipitor")])),
            Ok(Clause::matching("openfda.brand_name", "lipitor"))
        );
    }

    #[test]
    fn date_range_builds_a_range() {
        let endpoint = find(Resource::Label, "date-range").unwrap();
        assert_eq!(
            endpoint.clause(&params(&[("start_date", "20200101"), ("end_date", "20201231")])),
            Ok(Clause::Range {
                field: "effective_time".to_string(),
                start: "20200101".to_string(),
                end: "20201231".to_string(),
            })
        );
    }
}
