//! Shared test utilities for bundlegate-cli tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use bundlegate_cli::engine::ProcessEngine;
use bundlegate_cli::server;
use bundlegate_config::EngineSettings;
use bundlegate_core::Coordinator;
use serde_json::Value;
use tower::ServiceExt;

/// Router backed by a process engine running `script` through `sh -c`.
pub fn router_with_script(script: &str, cwd: &Path) -> Router {
    let engine = ProcessEngine::new(EngineSettings {
        command: vec![
            "sh".to_string(),
            "-c".to_string(),
            script.to_string(),
            "{config}".to_string(),
        ],
        ..EngineSettings::default()
    });
    let coordinator = Coordinator::builder(Arc::new(engine))
        .cwd(cwd.to_path_buf())
        .spawn();
    server::router(coordinator)
}

pub fn write_config(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

pub struct Reply {
    pub status: StatusCode,
    pub content_type: String,
    pub body: String,
}

impl Reply {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

pub async fn send(router: &Router, method: &str, uri: &str, body: impl Into<Body>) -> Reply {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

    Reply {
        status,
        content_type,
        body: String::from_utf8(bytes.to_vec()).unwrap(),
    }
}
