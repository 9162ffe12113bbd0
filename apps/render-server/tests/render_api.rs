//! End-to-end render requests against a shell stand-in for ffmpeg.

#![cfg(unix)]

mod common;

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use axum::http::{header, StatusCode};

use nevis_common::config::AppConfig;
use nevis_server::{app_router, AppState, OUTPUT_FILENAME};

use common::*;

/// Copies the `-i` input to the last argument, prefixed with the filter graph,
/// so tests can see what the engine was asked to do.
const COPY_ENGINE: &str = r#"#!/bin/sh
if [ "$1" = "-version" ]; then echo "ffmpeg version stand-in"; exit 0; fi
prev=""
input=""
graph=""
for arg in "$@"; do
  if [ "$prev" = "-i" ]; then input="$arg"; fi
  if [ "$prev" = "-filter_complex" ]; then graph="$arg"; fi
  prev="$arg"
done
if [ "$(head -c 7 "$input")" = "CORRUPT" ]; then
  echo "$input: Invalid data found when processing input" >&2
  exit 1
fi
printf '%s\n' "$graph" > "$prev"
cat "$input" >> "$prev"
"#;

fn copy_engine() -> &'static Path {
    static ENGINE: OnceLock<(tempfile::TempDir, PathBuf)> = OnceLock::new();
    let (_, path) = ENGINE.get_or_init(|| {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ffmpeg");
        std::fs::write(&path, COPY_ENGINE).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        (dir, path)
    });
    path
}

struct Server {
    app: axum::Router,
    temp: tempfile::TempDir,
}

fn server_with_binary(binary: PathBuf) -> Server {
    nevis_common::logging::init_test_logging();
    let temp = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.server.temp_dir = Some(temp.path().to_path_buf());
    config.engine.binary = binary;
    Server {
        app: app_router(AppState::new(config)),
        temp,
    }
}

fn server() -> Server {
    server_with_binary(copy_engine().to_path_buf())
}

#[tokio::test]
async fn render_returns_mp4_attachment() {
    let s = server();
    let response = send(
        s.app,
        render_request(&[
            video_part(b"MOVIE-BYTES"),
            settings_part(r#"{"video":{"flip":true,"brightness":150,"grayscale":0}}"#),
        ]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains(OUTPUT_FILENAME), "{disposition}");

    let body = String::from_utf8(body_bytes(response).await).unwrap();
    let (graph, payload) = body.split_once('\n').unwrap();
    assert_eq!(
        graph,
        "[0:v]hflip,eq=brightness=0.5[vid];\
         [0:a]showwaves=s=1280x200:mode=cline:colors=white[vis];\
         [vid][vis]overlay=0:H-h[out]"
    );
    assert_eq!(payload, "MOVIE-BYTES");
    assert!(dir_entries(s.temp.path()).is_empty());
}

#[tokio::test]
async fn render_without_settings_uses_defaults() {
    let s = server();
    let response = send(s.app, render_request(&[video_part(b"clip")])).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(
        body.starts_with("[0:v]null,eq=brightness=0.0[vid];"),
        "{body}"
    );
    assert!(dir_entries(s.temp.path()).is_empty());
}

#[tokio::test]
async fn grayscale_adds_desaturation() {
    let s = server();
    let response = send(
        s.app,
        render_request(&[
            video_part(b"clip"),
            settings_part(r#"{"video":{"grayscale":100,"brightness":50}}"#),
        ]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(
        body.starts_with("[0:v]eq=brightness=-0.5,hue=s=0[vid];"),
        "{body}"
    );
}

#[tokio::test]
async fn grayscale_only_counts_as_number_100() {
    for (settings, desaturated) in [
        (r#"{"video":{"grayscale":100.0}}"#, true),
        (r#"{"video":{"grayscale":"100"}}"#, false),
        (r#"{"video":{"grayscale":true}}"#, false),
        (r#"{"video":{"grayscale":50.5}}"#, false),
    ] {
        let s = server();
        let response = send(
            s.app,
            render_request(&[video_part(b"clip"), settings_part(settings)]),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK, "{settings}");
        let body = String::from_utf8(body_bytes(response).await).unwrap();
        assert_eq!(body.contains("hue=s=0"), desaturated, "{settings}: {body}");
    }
}

#[tokio::test]
async fn configured_visualizer_reaches_engine() {
    nevis_common::logging::init_test_logging();
    let temp = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.server.temp_dir = Some(temp.path().to_path_buf());
    config.engine.binary = copy_engine().to_path_buf();
    config.visualizer.height = 150;
    config.visualizer.mode = nevis_common::config::WaveMode::P2p;
    config.visualizer.color = "0xff8800".to_string();

    let response = send(
        app_router(AppState::new(config)),
        render_request(&[video_part(b"clip")]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(
        body.contains("[0:a]showwaves=s=1280x150:mode=p2p:colors=0xff8800[vis]"),
        "{body}"
    );
}

#[tokio::test]
async fn engine_failure_is_generic_500() {
    let s = server();
    let response = send(
        s.app,
        render_request(&[video_part(b"CORRUPT data"), settings_part("{}")]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_bytes(response).await;
    assert_eq!(
        serde_json::from_slice::<serde_json::Value>(&body).unwrap(),
        serde_json::json!({"error": "Failed to process video"})
    );
    assert!(!String::from_utf8_lossy(&body).contains("Invalid data"));
    assert!(dir_entries(s.temp.path()).is_empty());
}

#[tokio::test]
async fn missing_engine_is_internal_error() {
    let s = server_with_binary(PathBuf::from("/nonexistent/nevis-ffmpeg"));
    let response = send(s.app, render_request(&[video_part(b"clip")])).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({"error": "Internal server error"})
    );
    assert!(dir_entries(s.temp.path()).is_empty());
}

#[tokio::test]
async fn concurrent_requests_do_not_share_files() {
    let s = server();
    let first = send(
        s.app.clone(),
        render_request(&[video_part(b"first upload")]),
    );
    let second = send(
        s.app.clone(),
        render_request(&[
            video_part(b"second upload"),
            settings_part(r#"{"video":{"flip":1}}"#),
        ]),
    );
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);
    let first = String::from_utf8(body_bytes(first).await).unwrap();
    let second = String::from_utf8(body_bytes(second).await).unwrap();
    assert!(first.ends_with("\nfirst upload"), "{first}");
    assert!(second.ends_with("\nsecond upload"), "{second}");
    assert!(second.starts_with("[0:v]hflip,"), "{second}");
    assert!(dir_entries(s.temp.path()).is_empty());
}

#[tokio::test]
async fn same_request_twice_gives_same_output() {
    let s = server();
    let parts = || {
        render_request(&[
            video_part(b"repeatable"),
            settings_part(r#"{"video":{"brightness":120}}"#),
        ])
    };

    let a = body_bytes(send(s.app.clone(), parts()).await).await;
    let b = body_bytes(send(s.app.clone(), parts()).await).await;
    assert_eq!(a, b);
    assert!(dir_entries(s.temp.path()).is_empty());
}

#[tokio::test]
async fn health_finds_engine() {
    let s = server();
    let request = axum::http::Request::builder()
        .uri("/api/health")
        .body(axum::body::Body::empty())
        .unwrap();

    let json = body_json(send(s.app, request).await).await;
    assert_eq!(json["engine"], "ffmpeg");
    assert_eq!(json["engine_available"], true);
}
