//! Searching every field of a resource at once, and merging the results.

use std::{collections::HashSet, sync::Arc};

use cadence::{CountedExt, StatsdClient};
use formulary_settings::SearchSettings;
use futures::future::join_all;
use serde_json::Value;

use crate::{records_of, Envelope, FieldQuery, FieldSearcher, Resource, SearchError};

/// Fans one term out to every field in a resource's field table and merges
/// what comes back.
pub struct Aggregator {
    /// Runs the per-field queries.
    searcher: Arc<dyn FieldSearcher>,

    /// The limit sent with each per-field query.
    per_field_limit: u32,

    /// Where to report skipped fields.
    metrics_client: StatsdClient,
}

impl Aggregator {
    /// Create an aggregator that sends its per-field queries to `searcher`.
    pub fn new(
        searcher: Arc<dyn FieldSearcher>,
        settings: &SearchSettings,
        metrics_client: StatsdClient,
    ) -> Self {
        Self {
            searcher,
            per_field_limit: settings.per_field_limit,
            metrics_client,
        }
    }

    /// The searcher used for per-field queries.
    pub fn searcher(&self) -> &Arc<dyn FieldSearcher> {
        &self.searcher
    }

    /// Search every field of `resource` for `term` concurrently, and merge the
    /// results.
    ///
    /// This never fails. Fields whose query fails are logged and left out of
    /// the merge, so if every field fails the result is empty.
    pub async fn aggregate(&self, resource: Resource, term: &str, limit: usize) -> Envelope {
        let fields = resource.field_table();

        let outcomes = join_all(fields.iter().map(|field| {
            self.searcher.search(FieldQuery::matching(
                resource,
                field,
                term,
                self.per_field_limit,
            ))
        }))
        .await;

        let successes: Vec<Value> = fields
            .iter()
            .zip(outcomes)
            .filter_map(|(field, outcome)| match outcome {
                Ok(payload) => Some(payload),
                Err(error) => {
                    self.skip_field(resource, field, &error);
                    None
                }
            })
            .collect();

        merge(resource, successes, limit)
    }

    /// Record that `field` was left out of an aggregation.
    fn skip_field(&self, resource: Resource, field: &str, error: &SearchError) {
        tracing::warn!(
            r#type = "search.aggregate.field-error",
            %resource,
            field,
            error_kind = error.kind(),
            ?error,
            "Skipping field that failed during aggregation"
        );
        self.metrics_client
            .incr_with_tags("search.aggregate.field_error")
            .with_tag("resource", resource.slug())
            .with_tag("kind", error.kind())
            .send();
    }
}

/// Merge per-field upstream payloads, given in field-table order, into one
/// envelope.
///
/// Only the `results` of each payload are read. Records are deduplicated by
/// the resource's natural key, keeping the first one seen. Records without a
/// key are always kept. At most `limit` records are returned, but the total
/// counts every record that survived deduplication.
pub fn merge<I>(resource: Resource, payloads: I, limit: usize) -> Envelope
where
    I: IntoIterator<Item = Value>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for record in payloads.into_iter().flat_map(records_of) {
        match resource.natural_key(&record) {
            Some(key) => {
                if seen.insert(key) {
                    merged.push(record);
                }
            }
            None => merged.push(record),
        }
    }

    let total = merged.len() as u64;
    merged.truncate(limit);
    Envelope::new(merged, total)
}

#[cfg(test)]
mod tests {
    use super::{merge, Aggregator};
    use crate::{Envelope, FieldQuery, FieldSearcher, Record, Resource, SearchError};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use cadence::{SpyMetricSink, StatsdClient};
    use fake::{faker::lorem::en::Word, Fake};
    use formulary_settings::Settings;
    use http::StatusCode;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
        time::Duration,
    };

    type Outcome = Box<dyn Fn() -> Result<Value, SearchError> + Send + Sync>;

    /// Answers each field from a script, and remembers what it was asked.
    #[derive(Default)]
    struct ScriptedSearcher {
        outcomes: HashMap<&'static str, Outcome>,
        seen: Mutex<Vec<FieldQuery>>,
    }

    impl ScriptedSearcher {
        fn with(mut self, field: &'static str, outcome: Outcome) -> Self {
            self.outcomes.insert(field, outcome);
            self
        }
    }

    #[async_trait]
    impl FieldSearcher for ScriptedSearcher {
        fn name(&self) -> String {
            "scripted".to_string()
        }

        async fn search(&self, query: FieldQuery) -> Result<Value, SearchError> {
            self.seen.lock().unwrap().push(query.clone());
            match self.outcomes.get(query.clause().field()) {
                Some(outcome) => outcome(),
                None => Ok(Envelope::empty_payload()),
            }
        }
    }

    fn records(key_field: &str, keys: &[&str], from: &str) -> Vec<Record> {
        keys.iter()
            .map(|key| json!({ key_field: key, "from": from }))
            .collect()
    }

    /// An upstream payload holding `results`, claiming `total` matches.
    fn payload(results: Vec<Record>, total: u64) -> Value {
        json!({"meta": {"results": {"total": total}}, "results": results})
    }

    fn found(key_field: &'static str, keys: &'static [&'static str], from: &'static str) -> Outcome {
        Box::new(move || {
            let results = records(key_field, keys, from);
            let total = results.len() as u64;
            Ok(payload(results, total))
        })
    }

    fn timed_out() -> Outcome {
        Box::new(|| Err(SearchError::Internal(anyhow!("upstream request timed out"))))
    }

    fn aggregator(searcher: impl FieldSearcher + 'static) -> Aggregator {
        let settings = Settings::load_for_tests();
        let metrics_client = StatsdClient::from_sink("formulary-test", SpyMetricSink::new().1);
        Aggregator::new(Arc::new(searcher), &settings.search, metrics_client)
    }

    fn keys(envelope: &Envelope, key_field: &str) -> Vec<String> {
        envelope
            .results
            .iter()
            .map(|r| r[key_field].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn duplicate_keys_collapse_to_the_first_field() {
        let searcher = ScriptedSearcher::default()
            .with(
                "openfda.brand_name",
                found("application_number", &["A1", "A2", "A3"], "brand"),
            )
            .with(
                "openfda.generic_name",
                found("application_number", &["A2", "A4"], "generic"),
            );

        let envelope = aggregator(searcher)
            .aggregate(Resource::DrugsFda, "aspirin", 20)
            .await;

        assert_eq!(keys(&envelope, "application_number"), vec!["A1", "A2", "A3", "A4"]);
        assert_eq!(envelope.results[1]["from"], json!("brand"));
        assert_eq!(envelope.total(), 4);
    }

    #[tokio::test]
    async fn every_field_is_queried_in_table_order_with_the_sub_limit() {
        let searcher = Arc::new(ScriptedSearcher::default());
        let settings = Settings::load_for_tests();
        let metrics_client = StatsdClient::from_sink("formulary-test", SpyMetricSink::new().1);
        let aggregator = Aggregator::new(searcher.clone(), &settings.search, metrics_client);

        aggregator.aggregate(Resource::Ndc, "ibuprofen", 50).await;

        let seen = searcher.seen.lock().unwrap();
        let fields: Vec<&str> = seen.iter().map(|q| q.clause().field()).collect();
        assert_eq!(fields, Resource::Ndc.field_table());
        assert!(seen.iter().all(|q| q.limit() == 10));
        assert!(seen.iter().all(|q| q.resource() == Resource::Ndc));
    }

    #[tokio::test]
    async fn failed_fields_are_skipped() {
        let searcher = ScriptedSearcher::default()
            .with("openfda.brand_name", timed_out())
            .with(
                "openfda.generic_name",
                Box::new(|| {
                    Err(SearchError::Upstream {
                        status: StatusCode::INTERNAL_SERVER_ERROR,
                        message: "boom".to_string(),
                    })
                }),
            )
            .with("indications_and_usage", found("set_id", &["S1"], "indications"));

        let envelope = aggregator(searcher)
            .aggregate(Resource::Label, "headache", 20)
            .await;

        assert_eq!(keys(&envelope, "set_id"), vec!["S1"]);
        assert_eq!(envelope.total(), 1);
    }

    #[tokio::test]
    async fn all_fields_failing_is_an_empty_envelope() {
        let mut searcher = ScriptedSearcher::default();
        for field in Resource::DrugsFda.field_table() {
            searcher = searcher.with(field, timed_out());
        }

        let envelope = aggregator(searcher)
            .aggregate(Resource::DrugsFda, "aspirin", 20)
            .await;

        assert_eq!(envelope, Envelope::empty());
    }

    #[tokio::test]
    async fn skipped_fields_are_counted() {
        let (rx, sink) = SpyMetricSink::new();
        let settings = Settings::load_for_tests();
        let searcher = ScriptedSearcher::default().with("warnings", timed_out());
        let aggregator = Aggregator::new(
            Arc::new(searcher),
            &settings.search,
            StatsdClient::from_sink("formulary-test", sink),
        );

        aggregator.aggregate(Resource::Label, "drowsiness", 20).await;

        let lines: Vec<String> = rx
            .try_iter()
            .map(|bytes| String::from_utf8(bytes).unwrap())
            .collect();
        assert_eq!(
            lines,
            vec!["formulary-test.search.aggregate.field_error:1|c|#resource:label,kind:internal"]
        );
    }

    #[tokio::test]
    async fn limit_truncates_but_total_counts_everything() {
        let searcher = ScriptedSearcher::default()
            .with(
                "openfda.brand_name",
                found("application_number", &["A1", "A2", "A3"], "brand"),
            )
            .with(
                "openfda.generic_name",
                found("application_number", &["A2", "A4"], "generic"),
            );

        let envelope = aggregator(searcher)
            .aggregate(Resource::DrugsFda, "aspirin", 2)
            .await;

        assert_eq!(keys(&envelope, "application_number"), vec!["A1", "A2"]);
        assert_eq!(envelope.total(), 4);
    }

    #[tokio::test]
    async fn fields_are_searched_concurrently() {
        // Every search waits until all of them have started. Run sequentially,
        // the first search would wait forever.
        struct BarrierSearcher(tokio::sync::Barrier);

        #[async_trait]
        impl FieldSearcher for BarrierSearcher {
            fn name(&self) -> String {
                "barrier".to_string()
            }

            async fn search(&self, _query: FieldQuery) -> Result<Value, SearchError> {
                self.0.wait().await;
                Ok(Envelope::empty_payload())
            }
        }

        let fields = Resource::Ndc.field_table().len();
        let aggregator = aggregator(BarrierSearcher(tokio::sync::Barrier::new(fields)));

        let envelope = tokio::time::timeout(
            Duration::from_secs(5),
            aggregator.aggregate(Resource::Ndc, "advil", 20),
        )
        .await
        .expect("field searches did not run concurrently");
        assert_eq!(envelope, Envelope::empty());
    }

    #[test]
    fn keyless_records_are_never_merged() {
        let keyless = |word: String| payload(vec![json!({ "description": word })], 1);
        let payloads = vec![
            keyless(Word().fake()),
            keyless(Word().fake()),
            keyless(Word().fake()),
            payload(records("product_id", &["P1", "P1"], "route"), 2),
        ];

        let merged = merge(Resource::Ndc, payloads, 20);

        assert_eq!(merged.results.len(), 4);
        assert_eq!(merged.total(), 4);
    }

    #[test]
    fn merge_respects_truncation_law() {
        let payloads = || {
            vec![
                payload(records("set_id", &["a", "b", "c"], "x"), 3),
                payload(records("set_id", &["c", "d", "e"], "y"), 3),
            ]
        };

        for limit in 0..8 {
            let merged = merge(Resource::Label, payloads(), limit);
            assert_eq!(merged.results.len(), limit.min(5));
            assert_eq!(merged.total(), 5);
        }
    }

    #[test]
    fn merge_ignores_upstream_totals() {
        let merged = merge(
            Resource::DrugsFda,
            vec![payload(records("application_number", &["A1"], "x"), 9000)],
            20,
        );
        assert_eq!(merged.total(), 1);
    }

    #[test]
    fn merge_reads_only_results() {
        let merged = merge(
            Resource::DrugsFda,
            vec![
                json!({"results": [{"application_number": "A1"}]}),
                json!({"results": [{"application_number": "A2"}, "not a record"], "meta": "odd"}),
                json!({"error": {"message": "no results key"}}),
            ],
            20,
        );

        assert_eq!(
            merged.results,
            vec![
                json!({"application_number": "A1"}),
                json!({"application_number": "A2"}),
                json!("not a record"),
            ]
        );
        assert_eq!(merged.total(), 3);
    }

    #[test]
    fn numeric_keys_do_not_collide_with_string_keys() {
        let merged = merge(
            Resource::Ndc,
            vec![json!({"results": [{"product_id": 42}, {"product_id": "42"}]})],
            20,
        );
        assert_eq!(merged.total(), 2);
    }

    #[tokio::test]
    async fn fields_answered_without_metadata_still_count() {
        let searcher = ScriptedSearcher::default().with(
            "openfda.brand_name",
            Box::new(|| Ok(json!({"results": [{"application_number": "A1"}]}))),
        );

        let envelope = aggregator(searcher)
            .aggregate(Resource::DrugsFda, "aspirin", 20)
            .await;

        assert_eq!(keys(&envelope, "application_number"), vec!["A1"]);
        assert_eq!(envelope.total(), 1);
    }
}
