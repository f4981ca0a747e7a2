#![allow(dead_code)]

use image::{ImageOutputFormat, Rgb, RgbImage};
use plant_report_service::config::{
    GeminiSettings, ReportServiceConfig, ReportSettings, ServerSettings,
};
use plant_report_service::services::init_metrics;
use plant_report_service::startup::Application;
use secrecy::Secret;
use serde_json::json;
use service_core::config::Config as CoreConfig;
use std::io::Cursor;
use std::path::PathBuf;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_MODEL: &str = "gemini-2.5-flash";
pub const TEST_API_KEY: &str = "test-gemini-key";
pub const TEST_ANALYSIS: &str =
    "Species: Monstera deliciosa\n\nHealth: Leaves are glossy with no sign of pests.";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub gemini: MockServer,
    pub reports_dir: PathBuf,
}

impl TestApp {
    /// Spawn the service against a mock Gemini API that answers every
    /// analysis with [`TEST_ANALYSIS`].
    pub async fn spawn() -> Self {
        let gemini = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(format!("/models/{}:generateContent", TEST_MODEL)))
            .and(header("x-goog-api-key", TEST_API_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(TEST_ANALYSIS)))
            .mount(&gemini)
            .await;

        Mock::given(method("GET"))
            .and(path("/models"))
            .and(header("x-goog-api-key", TEST_API_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": [] })))
            .mount(&gemini)
            .await;

        Self::spawn_with(gemini).await
    }

    /// Spawn the service against a mock server the caller has already
    /// configured.
    pub async fn spawn_with(gemini: MockServer) -> Self {
        init_metrics();

        let reports_dir = PathBuf::from(format!("target/test-reports-{}", Uuid::new_v4()));

        let config = ReportServiceConfig {
            common: CoreConfig { port: 0 },
            gemini: GeminiSettings {
                api_key: Secret::new(TEST_API_KEY.to_string()),
                model: TEST_MODEL.to_string(),
                api_base_url: gemini.uri(),
                timeout_secs: 10,
            },
            reports: ReportSettings {
                dir: reports_dir.clone(),
            },
            server: ServerSettings {
                public_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("public"),
                max_upload_bytes: 1024 * 1024,
                otlp_endpoint: None,
            },
        };

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped(std::future::pending()).await.ok();
        });

        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            gemini,
            reports_dir,
        }
    }

    pub async fn post_image(&self, bytes: Vec<u8>, mime: &str) -> reqwest::Response {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name("plant.png")
            .mime_str(mime)
            .expect("Invalid mime type");
        let form = reqwest::multipart::Form::new().part("image", part);

        reqwest::Client::new()
            .post(format!("{}/analyze", self.address))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post_download(&self, body: &serde_json::Value) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("{}/download", self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Files currently left in the reports directory.
    pub fn report_files(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.reports_dir) {
            Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Wait for the reports directory to drain. The file is removed once the
    /// response body is dropped, which can trail the client by a moment.
    pub async fn wait_for_empty_reports_dir(&self) -> Vec<PathBuf> {
        let mut files = self.report_files();
        for _ in 0..40 {
            if files.is_empty() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(25)).await;
            files = self.report_files();
        }
        files
    }

    pub async fn cleanup(&self) {
        let _ = tokio::fs::remove_dir_all(&self.reports_dir).await;
    }
}

/// A minimal successful `generateContent` reply.
pub fn gemini_reply(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }],
        "usageMetadata": { "promptTokenCount": 258, "candidatesTokenCount": 42 }
    })
}

pub fn png_bytes() -> Vec<u8> {
    let img = RgbImage::from_pixel(16, 16, Rgb([46, 125, 50]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageOutputFormat::Png)
        .expect("Failed to encode PNG");
    buf.into_inner()
}
