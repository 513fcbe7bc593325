//! Dataset manifest generation.
//!
//! Each stored raw object is a JSON record exported by an annotation tool.
//! The manifest builder reads every record under the source directory,
//! reshapes it into training form, and writes the aggregated array to the
//! dataset file inside the version-controlled checkout.

use serde_json::Value;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::sync::ManifestBuilder;

/// Reshapes one raw exported record into its training form.
pub trait RecordTransform: Send + Sync {
    fn transform(&self, record: Value) -> anyhow::Result<Value>;
}

/// Transform for annotation-export records of the shape
/// `{"task": {...}, ...annotation fields...}`.
///
/// The task object is lifted to the top level and the remaining annotation
/// fields are nested under its `annotations` array, matching the layout the
/// training pipeline consumes.
pub struct TaskLiftTransform;

impl RecordTransform for TaskLiftTransform {
    fn transform(&self, record: Value) -> anyhow::Result<Value> {
        let Value::Object(mut annotation) = record else {
            anyhow::bail!("record is not a JSON object");
        };
        let Some(task) = annotation.remove("task") else {
            anyhow::bail!("record has no task field");
        };
        let Value::Object(mut task) = task else {
            anyhow::bail!("task field is not a JSON object");
        };
        task.insert(
            "annotations".to_string(),
            Value::Array(vec![Value::Object(annotation)]),
        );
        Ok(Value::Object(task))
    }
}

/// [`ManifestBuilder`] writing `<git_folder>/<dataset>` as a JSON array of
/// transformed records.
pub struct DatasetManifestBuilder {
    git_folder: PathBuf,
    dataset: String,
    transform: Arc<dyn RecordTransform>,
}

impl DatasetManifestBuilder {
    pub fn new(git_folder: PathBuf, dataset: String, transform: Arc<dyn RecordTransform>) -> Self {
        Self {
            git_folder,
            dataset,
            transform,
        }
    }

    fn build_records(&self, source_dir: &Path) -> anyhow::Result<Vec<Value>> {
        let mut names = Vec::new();
        if source_dir.is_dir() {
            for entry in std::fs::read_dir(source_dir)? {
                let entry = entry?;
                if entry.file_type()?.is_file() {
                    names.push(entry.path());
                }
            }
        }
        // Stable ordering keeps the manifest deterministic across rebuilds.
        names.sort();

        let mut records = Vec::with_capacity(names.len());
        for path in names {
            let contents = std::fs::read_to_string(&path)?;
            let raw: Value = match serde_json::from_str(&contents) {
                Ok(v) => v,
                Err(e) => {
                    warn!("skipping {}: not valid JSON: {e}", path.display());
                    continue;
                }
            };
            match self.transform.transform(raw) {
                Ok(v) => records.push(v),
                Err(e) => warn!("skipping {}: {e}", path.display()),
            }
        }
        Ok(records)
    }
}

impl ManifestBuilder for DatasetManifestBuilder {
    fn build(
        &self,
        source_dir: &Path,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<PathBuf>> + Send + '_>> {
        let source_dir = source_dir.to_path_buf();
        Box::pin(async move {
            let records = self.build_records(&source_dir)?;
            debug!(
                "assembled {} records from {}",
                records.len(),
                source_dir.display()
            );

            let target = self.git_folder.join(&self.dataset);
            let body = serde_json::to_vec_pretty(&Value::Array(records))?;

            // Atomic replace so a concurrent DVC commit never sees a
            // half-written manifest.
            let tmp = target.with_extension("json.tmp");
            std::fs::write(&tmp, &body)?;
            std::fs::rename(&tmp, &target)?;

            Ok(target)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_lift_reshapes_record() {
        let record = json!({
            "task": {"id": 7, "data": {"text": "hi"}},
            "result": [{"value": "label"}],
            "completed_by": 3
        });
        let out = TaskLiftTransform.transform(record).unwrap();
        assert_eq!(out["id"], 7);
        assert_eq!(out["data"]["text"], "hi");
        let annotations = out["annotations"].as_array().unwrap();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0]["completed_by"], 3);
        assert!(annotations[0].get("task").is_none());
    }

    #[test]
    fn task_lift_rejects_taskless_record() {
        assert!(TaskLiftTransform.transform(json!({"result": []})).is_err());
        assert!(TaskLiftTransform.transform(json!([1, 2])).is_err());
    }

    #[tokio::test]
    async fn build_writes_sorted_array() {
        let source = tempfile::tempdir().unwrap();
        let git = tempfile::tempdir().unwrap();

        std::fs::write(
            source.path().join("b.json"),
            json!({"task": {"id": 2}, "result": []}).to_string(),
        )
        .unwrap();
        std::fs::write(
            source.path().join("a.json"),
            json!({"task": {"id": 1}, "result": []}).to_string(),
        )
        .unwrap();

        let builder = DatasetManifestBuilder::new(
            git.path().to_path_buf(),
            "dataset.json".into(),
            Arc::new(TaskLiftTransform),
        );
        let path = builder.build(source.path()).await.unwrap();
        assert_eq!(path, git.path().join("dataset.json"));

        let manifest: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let records = manifest.as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["id"], 1);
        assert_eq!(records[1]["id"], 2);
    }

    #[tokio::test]
    async fn build_skips_invalid_records() {
        let source = tempfile::tempdir().unwrap();
        let git = tempfile::tempdir().unwrap();

        std::fs::write(source.path().join("bad.json"), "not json").unwrap();
        std::fs::write(
            source.path().join("good.json"),
            json!({"task": {"id": 9}, "result": []}).to_string(),
        )
        .unwrap();

        let builder = DatasetManifestBuilder::new(
            git.path().to_path_buf(),
            "dataset.json".into(),
            Arc::new(TaskLiftTransform),
        );
        let path = builder.build(source.path()).await.unwrap();

        let manifest: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(manifest.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn build_on_missing_source_writes_empty_array() {
        let git = tempfile::tempdir().unwrap();
        let builder = DatasetManifestBuilder::new(
            git.path().to_path_buf(),
            "dataset.json".into(),
            Arc::new(TaskLiftTransform),
        );
        let path = builder
            .build(Path::new("/nonexistent/source"))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "[]");
    }
}
