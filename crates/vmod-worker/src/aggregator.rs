//! Result aggregation.
//!
//! In-process mode merges results the worker already holds. Consolidation
//! mode gathers the per-frame records fan-out units left in storage and
//! removes them as it goes, so running it twice yields nothing the second
//! time.

use std::sync::Arc;

use tracing::{debug, info};

use vmod_models::layout::image_key_for_record;
use vmod_models::{FrameLayout, FrameResult, RECORD_EXTENSION};
use vmod_storage::ObjectStore;

use crate::error::{WorkerError, WorkerResult};

/// Drop empty results and sort ascending by timestamp.
///
/// The sort is stable: results sharing a timestamp keep their input order.
pub fn aggregate(results: impl IntoIterator<Item = FrameResult>) -> Vec<FrameResult> {
    let mut kept: Vec<FrameResult> = results.into_iter().filter(|r| r.is_flagged()).collect();
    kept.sort_by(|a, b| a.timestamp_ms.total_cmp(&b.timestamp_ms));
    kept
}

/// Out-of-band aggregation over a job's frame folder.
#[derive(Clone)]
pub struct ResultAggregator {
    store: Arc<dyn ObjectStore>,
}

impl ResultAggregator {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Read every record under `layout`, then delete the records and their
    /// paired frame images.
    ///
    /// A record that does not parse fails the whole consolidation before
    /// anything is deleted.
    pub async fn consolidate(&self, layout: &FrameLayout) -> WorkerResult<Vec<FrameResult>> {
        let prefix = layout.prefix();
        let records: Vec<String> = self
            .store
            .list(&layout.bucket, &prefix)
            .await?
            .into_iter()
            .map(|o| o.key)
            .filter(|k| k.ends_with(RECORD_EXTENSION))
            .collect();

        debug!("Consolidating {} records under {}", records.len(), prefix);

        let mut results = Vec::with_capacity(records.len());
        for key in &records {
            let bytes = self.store.get_bytes(&layout.bucket, key).await?;
            let result: FrameResult = serde_json::from_slice(&bytes)
                .map_err(|e| WorkerError::consolidation_parse(key.as_str(), e.to_string()))?;
            results.push(result);
        }

        let mut consumed = Vec::with_capacity(records.len() * 2);
        for key in &records {
            consumed.push(key.clone());
            if let Some(image) = image_key_for_record(key) {
                consumed.push(image);
            }
        }
        self.store.delete_many(&layout.bucket, &consumed).await?;

        let results = aggregate(results);
        info!(
            "Consolidated {} records into {} flagged frames",
            records.len(),
            results.len()
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmod_models::ModerationLabel;
    use vmod_storage::MemoryStore;

    fn flagged(ts: f64, name: &str) -> FrameResult {
        FrameResult::new(ts, vec![ModerationLabel::new(name, "", 90.0)])
    }

    #[test]
    fn test_aggregate_drops_empty_and_sorts() {
        let out = aggregate(vec![
            flagged(3000.0, "c"),
            FrameResult::empty(0.0),
            flagged(1000.0, "a"),
            FrameResult::empty(2000.0),
        ]);
        let ts: Vec<f64> = out.iter().map(|r| r.timestamp_ms).collect();
        assert_eq!(ts, vec![1000.0, 3000.0]);
    }

    #[test]
    fn test_aggregate_is_stable() {
        let out = aggregate(vec![
            flagged(1000.0, "first"),
            flagged(500.0, "early"),
            flagged(1000.0, "second"),
        ]);
        let names: Vec<&str> = out.iter().map(|r| r.labels[0].name.as_str()).collect();
        assert_eq!(names, vec!["early", "first", "second"]);
    }

    #[test]
    fn test_aggregate_empty() {
        assert!(aggregate(Vec::new()).is_empty());
    }

    fn seed_record(store: &MemoryStore, layout: &FrameLayout, result: &FrameResult) {
        store.insert(
            &layout.bucket,
            &layout.record_key(result.timestamp_ms),
            serde_json::to_vec(result).unwrap(),
        );
        store.insert(&layout.bucket, &layout.image_key(result.timestamp_ms), b"png".to_vec());
    }

    #[tokio::test]
    async fn test_consolidate_reads_and_deletes_records() {
        let store = MemoryStore::new();
        let layout = FrameLayout::new("b", "f", "vid.mp4");

        seed_record(&store, &layout, &flagged(4000.0, "late"));
        seed_record(&store, &layout, &flagged(500.0, "early"));
        // Another job's folder
        store.insert("b", "f/other.mp4/0.json", b"not ours".to_vec());

        let aggregator = ResultAggregator::new(Arc::new(store.clone()));
        let results = aggregator.consolidate(&layout).await.unwrap();

        let ts: Vec<f64> = results.iter().map(|r| r.timestamp_ms).collect();
        assert_eq!(ts, vec![500.0, 4000.0]);
        assert_eq!(store.keys("b"), vec!["f/other.mp4/0.json"]);

        let again = aggregator.consolidate(&layout).await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_consolidate_parse_error_is_fatal() {
        let store = MemoryStore::new();
        let layout = FrameLayout::new("b", "f", "vid.mp4");
        seed_record(&store, &layout, &flagged(0.0, "ok"));
        store.insert("b", &layout.record_key(1000.0), b"{broken".to_vec());

        let aggregator = ResultAggregator::new(Arc::new(store.clone()));
        let err = aggregator.consolidate(&layout).await.unwrap_err();

        assert!(matches!(err, WorkerError::ConsolidationParse { .. }));
        assert!(!err.is_retryable());
        // Nothing consumed
        assert!(store.contains("b", &layout.record_key(0.0)));
    }
}
