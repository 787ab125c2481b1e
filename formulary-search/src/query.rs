//! Field-scoped upstream queries and their rendering into the upstream's
//! `search` syntax.

use crate::Resource;

/// The most records the upstream will return for one request.
pub const UPSTREAM_MAX_LIMIT: u32 = 99;

/// The condition a query places on a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// `field:term`
    Match {
        /// The upstream attribute path, such as `openfda.brand_name`.
        field: String,
        /// The caller's search term.
        term: String,
    },
    /// `field:[start TO end]`
    Range {
        /// The upstream attribute path, such as `effective_time`.
        field: String,
        /// The inclusive lower bound.
        start: String,
        /// The inclusive upper bound.
        end: String,
    },
    /// `_exists_:field`
    Exists {
        /// The upstream attribute path that must be present.
        field: String,
    },
}

impl Clause {
    /// A clause matching `term` against `field`.
    pub fn matching(field: impl Into<String>, term: impl Into<String>) -> Self {
        Self::Match {
            field: field.into(),
            term: term.into(),
        }
    }

    /// The upstream attribute this clause applies to.
    pub fn field(&self) -> &str {
        match self {
            Self::Match { field, .. } | Self::Range { field, .. } | Self::Exists { field } => {
                field
            }
        }
    }

    /// Render the clause as an upstream `search` expression.
    ///
    /// `escape` applies to match terms. When it is false, the term is
    /// interpolated verbatim, so it can carry its own query syntax. Range
    /// bounds are always interpolated verbatim.
    pub fn to_search_expression(&self, escape: bool) -> String {
        match self {
            Self::Match { field, term } if escape => format!("{}:{}", field, escape_term(term)),
            Self::Match { field, term } => format!("{}:{}", field, term),
            // The space is form-encoded as `+`, giving the upstream's
            // `[start+TO+end]` form on the wire.
            Self::Range { field, start, end } => format!("{}:[{} TO {}]", field, start, end),
            Self::Exists { field } => format!("_exists_:{}", field),
        }
    }
}

/// Make `term` safe to place after a `field:` prefix.
///
/// Terms made only of alphanumerics and `-_./,` are returned unchanged. Any
/// other term is wrapped in double quotes, with `"` and `\` backslash-escaped,
/// so whitespace, colons, brackets and boolean operators are searched for
/// literally.
pub fn escape_term(term: &str) -> String {
    let is_plain = !term.is_empty()
        && term
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ','));
    if is_plain {
        return term.to_string();
    }

    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('"');
    for c in term.chars() {
        if matches!(c, '"' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('"');
    escaped
}

/// One query against one upstream resource. Built per request and never
/// modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldQuery {
    /// The collection to search.
    resource: Resource,
    /// The condition to search for.
    clause: Clause,
    /// The number of records to request, already clamped.
    limit: u32,
}

impl FieldQuery {
    /// A query for `clause` on `resource`. `limit` is clamped to
    /// [`UPSTREAM_MAX_LIMIT`].
    pub fn new(resource: Resource, clause: Clause, limit: u32) -> Self {
        Self {
            resource,
            clause,
            limit: limit.min(UPSTREAM_MAX_LIMIT),
        }
    }

    /// A query matching `term` against `field` of `resource`.
    pub fn matching(resource: Resource, field: &str, term: &str, limit: u32) -> Self {
        Self::new(resource, Clause::matching(field, term), limit)
    }

    /// The collection to search.
    pub fn resource(&self) -> Resource {
        self.resource
    }

    /// The condition to search for.
    pub fn clause(&self) -> &Clause {
        &self.clause
    }

    /// The number of records to request.
    pub fn limit(&self) -> u32 {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::{escape_term, Clause, FieldQuery, UPSTREAM_MAX_LIMIT};
    use crate::Resource;

    #[test]
    fn limit_is_clamped_to_the_upstream_maximum() {
        let query = FieldQuery::matching(Resource::Ndc, "brand_name", "advil", 500);
        assert_eq!(query.limit(), UPSTREAM_MAX_LIMIT);

        let query = FieldQuery::matching(Resource::Ndc, "brand_name", "advil", 5);
        assert_eq!(query.limit(), 5);
    }

    #[test]
    fn match_clause_renders_field_and_term() {
        let clause = Clause::matching("openfda.brand_name", "aspirin");
        assert_eq!(clause.to_search_expression(true), "openfda.brand_name:aspirin");
        assert_eq!(clause.to_search_expression(false), "openfda.brand_name:aspirin");
    }

    #[test]
    fn range_clause_renders_bounds() {
        let clause = Clause::Range {
            field: "effective_time".to_string(),
            start: "20200101".to_string(),
            end: "20201231".to_string(),
        };
        assert_eq!(
            clause.to_search_expression(true),
            "effective_time:[20200101 TO 20201231]"
        );
    }

    #[test]
    fn range_bounds_are_never_quoted() {
        let clause = Clause::Range {
            field: "effective_time".to_string(),
            start: "2020-01-01 00".to_string(),
            end: "2020-12-31 23".to_string(),
        };
        assert_eq!(
            clause.to_search_expression(true),
            "effective_time:[2020-01-01 00 TO 2020-12-31 23]"
        );
        assert_eq!(
            clause.to_search_expression(true),
            clause.to_search_expression(false)
        );
    }

    #[test]
    fn exists_clause_has_no_term() {
        let clause = Clause::Exists {
            field: "boxed_warning".to_string(),
        };
        assert_eq!(clause.to_search_expression(true), "_exists_:boxed_warning");
        assert_eq!(clause.field(), "boxed_warning");
    }

    #[test]
    fn plain_terms_are_not_quoted() {
        for term in ["aspirin", "0002-3227", "NDA020702", "tablet,film", "5mg/ml"] {
            assert_eq!(escape_term(term), term);
        }
    }

    #[test]
    fn query_syntax_is_quoted() {
        assert_eq!(escape_term("advil pm"), r#""advil pm""#);
        assert_eq!(
            escape_term("x OR brand_name:y"),
            r#""x OR brand_name:y""#
        );
        assert_eq!(escape_term("[a TO b]"), r#""[a TO b]""#);
        assert_eq!(escape_term(r#"say "hi"\"#), r#""say \"hi\"\\""#);
        assert_eq!(escape_term(""), r#""""#);
    }

    #[test]
    fn verbatim_terms_can_inject_clauses() {
        let clause = Clause::matching("brand_name", "x+AND+route:oral");
        assert_eq!(
            clause.to_search_expression(false),
            "brand_name:x+AND+route:oral"
        );
    }
}
