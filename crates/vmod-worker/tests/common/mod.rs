//! Fakes shared by the pipeline scenarios.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use vmod_classifier::{ClassifierError, ClassifierResult, ModerationClassifier, RawLabel};
use vmod_media::{frame_file_name, FrameDecoder, MediaResult};
use vmod_notify::RecordingSink;
use vmod_storage::MemoryStore;
use vmod_worker::{PipelineContext, WorkerConfig};

pub const BUCKET: &str = "bucket";
pub const VIDEO_KEY: &str = "vid.mp4";
pub const FRAME_PREFIX: &str = "screenshot/vid.mp4/";
pub const TOPIC: &str = "reports";

/// Writes a fixed set of frame files and reports a fixed duration.
pub struct ScriptedDecoder {
    pub sequences: Vec<u64>,
    pub duration: f64,
}

impl ScriptedDecoder {
    pub fn frames(count: u64) -> Self {
        Self {
            sequences: (1..=count).collect(),
            duration: count as f64,
        }
    }
}

#[async_trait]
impl FrameDecoder for ScriptedDecoder {
    async fn decode(&self, _video: &Path, _fps: f64, output_dir: &Path) -> MediaResult<()> {
        for seq in &self.sequences {
            tokio::fs::write(output_dir.join(frame_file_name(*seq)), b"png").await?;
        }
        Ok(())
    }

    async fn duration_secs(&self, _video: &Path) -> MediaResult<f64> {
        Ok(self.duration)
    }
}

/// Answers by frame file name, e.g. `1000.png`.
#[derive(Default)]
pub struct ScriptedClassifier {
    labels: HashMap<String, Vec<RawLabel>>,
    delay: Option<Duration>,
    /// Calls that fail with a transient error before answers start
    transient_failures: AtomicU32,
    always_fail: bool,
    calls: AtomicU32,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, file_name: &str, label: RawLabel) -> Self {
        self.labels
            .entry(file_name.to_string())
            .or_default()
            .push(label);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_transient_failures(self, count: u32) -> Self {
        self.transient_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn always_failing(mut self) -> Self {
        self.always_fail = true;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModerationClassifier for ScriptedClassifier {
    async fn detect_labels(
        &self,
        _bucket: &str,
        key: &str,
        _min_confidence: f64,
    ) -> ClassifierResult<Vec<RawLabel>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.always_fail {
            return Err(ClassifierError::ServiceUnavailable("503".into()));
        }

        let throttled = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if throttled {
            return Err(ClassifierError::ServiceUnavailable("throttled".into()));
        }

        let file_name = key.rsplit('/').next().unwrap_or(key);
        Ok(self.labels.get(file_name).cloned().unwrap_or_default())
    }
}

/// One pipeline's collaborators plus handles to inspect them.
pub struct Harness {
    pub store: MemoryStore,
    pub sink: RecordingSink,
    pub classifier: Arc<ScriptedClassifier>,
    pub decoder: Arc<ScriptedDecoder>,
    pub work_dir: TempDir,
    pub config: WorkerConfig,
}

impl Harness {
    pub fn new(decoder: ScriptedDecoder, classifier: ScriptedClassifier) -> Self {
        let work_dir = TempDir::new().unwrap();
        let config = WorkerConfig {
            work_dir: work_dir.path().to_path_buf(),
            job_timeout: Duration::from_secs(10),
            max_fanout: 3,
            retry_base_delay: Duration::from_millis(1),
            ..WorkerConfig::default()
        };

        let store = MemoryStore::new();
        store.insert(BUCKET, VIDEO_KEY, b"video".to_vec());

        Self {
            store,
            sink: RecordingSink::new(),
            classifier: Arc::new(classifier),
            decoder: Arc::new(decoder),
            work_dir,
            config,
        }
    }

    pub fn with_sink(mut self, sink: RecordingSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn context(&self) -> PipelineContext {
        PipelineContext::new(
            self.config.clone(),
            Arc::new(self.store.clone()),
            self.decoder.clone(),
            self.classifier.clone(),
            Arc::new(self.sink.clone()),
        )
    }

    /// Keys left under the job's frame folder.
    pub fn frame_keys(&self) -> Vec<String> {
        self.store
            .keys(BUCKET)
            .into_iter()
            .filter(|k| k.starts_with(FRAME_PREFIX))
            .collect()
    }

    /// Scratch directories still on disk.
    pub fn scratch_dirs(&self) -> usize {
        std::fs::read_dir(self.work_dir.path()).unwrap().count()
    }
}

pub fn label(name: &str, parent: Option<&str>, confidence: f64) -> RawLabel {
    RawLabel::new(name, parent, confidence)
}
