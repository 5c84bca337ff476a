#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use dropzone::config::UploadConfig;
use dropzone::{AppState, create_app};
use http_body_util::BodyExt;
use serde_json::Value;
use std::path::Path;
use tower::ServiceExt;

pub const TOKEN: &str = "test-upload-token";
pub const BOUNDARY: &str = "---------------------------123456789012345678901234567";

/// Scenario config: 1 KiB limit, `.txt` only, no overwrite.
pub fn test_config(dir: &Path) -> UploadConfig {
    let mut config = UploadConfig::development(dir);
    config.upload_token = Some(TOKEN.to_string());
    config.max_upload_bytes = 1024;
    config.allowed_extensions = vec![".txt".to_string()];
    config.allow_overwrite = false;
    config
}

pub fn app(config: UploadConfig) -> Router {
    create_app(AppState::new(config))
}

pub fn multipart_body(parts: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (filename, data) in parts {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\n\
                Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
                Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload_request(token: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(token) = token {
        builder = builder.header("X-Upload-Token", token);
    }
    builder.body(Body::from(body)).unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

pub async fn upload(app: &Router, parts: &[(&str, &[u8])]) -> (StatusCode, Value) {
    send(app, upload_request(Some(TOKEN), multipart_body(parts))).await
}

pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
