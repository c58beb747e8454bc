use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::app::ports::{BatchLoader, LoadReceipt};
use crate::types::CanonicalAggregate;

/// Writes the batch as one JSON document. The file is written under a temporary
/// name and renamed into place, so readers see the whole batch or nothing.
pub struct JsonFileLoader {
    output_dir: PathBuf,
}

impl JsonFileLoader {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait]
impl BatchLoader for JsonFileLoader {
    async fn commit(&self, batch: &[CanonicalAggregate]) -> Result<LoadReceipt, String> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| format!("Failed to create {}: {e}", self.output_dir.display()))?;

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let final_path = self.output_dir.join(format!("meteorites_{timestamp}.json"));
        let tmp_path = final_path.with_extension("json.tmp");

        let json = serde_json::to_vec_pretty(batch).map_err(|e| e.to_string())?;
        if let Err(e) = tokio::fs::write(&tmp_path, &json).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(format!("Failed to write {}: {e}", tmp_path.display()));
        }
        tokio::fs::rename(&tmp_path, &final_path)
            .await
            .map_err(|e| format!("Failed to move batch into {}: {e}", final_path.display()))?;

        info!("💾 Saved {} aggregates to {}", batch.len(), final_path.display());
        Ok(LoadReceipt {
            rows: batch.len(),
            target: final_path.to_string_lossy().to_string(),
        })
    }
}
