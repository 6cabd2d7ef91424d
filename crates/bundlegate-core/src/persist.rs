//! Writing in-memory artifacts to disk.

use crate::engine::EmittedAsset;
use crate::error::{BundleError, Result};

/// Write every in-memory asset to its declared path, creating parent
/// directories as needed. Assets the engine already wrote are skipped.
///
/// Stops at the first failure; a compile is only deliverable once all of its
/// artifacts are on disk.
pub async fn persist_assets(assets: &[EmittedAsset]) -> Result<usize> {
    let mut written = 0;

    for asset in assets {
        let Some(contents) = &asset.contents else {
            continue;
        };

        let persist_error = |e: std::io::Error| BundleError::AssetPersist {
            asset: asset.path.clone(),
            message: e.to_string(),
        };

        if let Some(parent) = asset.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(persist_error)?;
        }
        tokio::fs::write(&asset.path, contents)
            .await
            .map_err(persist_error)?;
        written += 1;
    }

    tracing::debug!(written, "persisted in-memory assets");
    Ok(written)
}
