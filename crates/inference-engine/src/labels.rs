//! Label map loading

use std::path::Path;
use tracing::debug;

use crate::InferenceError;

/// Class index to label lookup, one label per line
#[derive(Debug, Clone, Default)]
pub struct LabelMap {
    labels: Vec<String>,
}

impl LabelMap {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, InferenceError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| InferenceError::ModelLoad(format!("{}: {}", path.display(), e)))?;
        Ok(Self::parse(&text))
    }

    pub fn parse(text: &str) -> Self {
        let mut labels: Vec<String> = text.lines().map(|l| l.trim().to_string()).collect();

        // COCO starter models ship a placeholder for background at index 0
        if labels.first().map(|l| l == "???").unwrap_or(false) {
            debug!("Dropping '???' placeholder from label map");
            labels.remove(0);
        }

        Self { labels }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
