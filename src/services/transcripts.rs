//! Transcript persistence as JSON files

use crate::runtime::traits::TranscriptSink;
use crate::runtime::CallTranscript;
use crate::services::ServiceError;
use async_trait::async_trait;
use std::path::PathBuf;

/// Writes one pretty-printed JSON file per call into a directory
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_name(transcript: &CallTranscript) -> String {
        let short_id: String = transcript.call_id.chars().take(8).collect();
        format!(
            "transcript_{}_{short_id}.json",
            transcript.started_at.format("%Y%m%d_%H%M%S")
        )
    }
}

#[async_trait]
impl TranscriptSink for JsonFileSink {
    async fn save_transcript(&self, transcript: &CallTranscript) -> Result<PathBuf, ServiceError> {
        let body = serde_json::to_vec_pretty(transcript)
            .map_err(|e| ServiceError::persistence(format!("Failed to encode transcript: {e}")))?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            ServiceError::persistence(format!("Failed to create {}: {e}", self.dir.display()))
        })?;

        let path = self.dir.join(Self::file_name(transcript));
        tokio::fs::write(&path, body).await.map_err(|e| {
            ServiceError::persistence(format!("Failed to write {}: {e}", path.display()))
        })?;

        tracing::info!(call_id = %transcript.call_id, path = %path.display(), "Transcript saved");
        Ok(path)
    }
}
