//! The success payload shared by every caller of one build.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::{BundleError, Result};
use crate::identity::BundleIdentity;

#[derive(Serialize)]
struct Payload<'a> {
    config: &'a Value,
    stats: &'a Value,
    path_to_config: &'a Path,
    watch_config: bool,
    watch_source: bool,
    generated_at: DateTime<Utc>,
}

/// A completed build, serialised once.
///
/// The body is shared so that every caller flushed with this output observes
/// exactly the same bytes.
#[derive(Debug, Clone)]
pub struct BundleOutput {
    body: Arc<str>,
    generated_at: DateTime<Utc>,
}

impl BundleOutput {
    pub fn new(identity: &BundleIdentity, config: &Value, stats: &Value) -> Result<Self> {
        let generated_at = Utc::now();
        let payload = Payload {
            config,
            stats,
            path_to_config: &identity.config_path,
            watch_config: identity.watch_config,
            watch_source: identity.watch_source,
            generated_at,
        };
        let body = serde_json::to_string(&payload)
            .map_err(|e| BundleError::build(&identity.config_path, e))?;
        Ok(Self {
            body: body.into(),
            generated_at,
        })
    }

    pub fn body(&self) -> Arc<str> {
        Arc::clone(&self.body)
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }
}
