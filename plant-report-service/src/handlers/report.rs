use crate::dtos::ReportRequest;
use crate::services::metrics::{self, Outcome};
use crate::services::{decode_image_payload, ReportContent, ReportFile};
use crate::startup::AppState;
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Local;
use service_core::error::AppError;
use std::time::Instant;

const REPORT_FAILED: &str = "An error occurred while generating the PDF report";

pub async fn download_report(
    State(state): State<AppState>,
    payload: Result<Json<ReportRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload.map_err(|e| {
        metrics::record_report(Outcome::ClientError);
        report_request_error(e)
    })?;

    match build_report(&state, request).await {
        Ok(response) => {
            metrics::record_report(Outcome::Success);
            Ok(response)
        }
        Err(e) => {
            metrics::record_report(Outcome::Failure);
            Err(AppError::operation_failed(REPORT_FAILED, e))
        }
    }
}

fn report_request_error(e: JsonRejection) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Report request is too large".to_string())
    } else {
        AppError::BadRequest(anyhow::anyhow!("Invalid report request: {}", e.body_text()))
    }
}

/// Decode, render to a temporary file and hand the file to the response
/// body. Any early return drops the [`ReportFile`] and deletes it.
async fn build_report(state: &AppState, request: ReportRequest) -> anyhow::Result<Response> {
    let image = request
        .image_payload()
        .map(decode_image_payload)
        .transpose()
        .map_err(|e| anyhow::anyhow!("Malformed image data: {}", e))?;

    let content = ReportContent {
        analysis: request.result,
        image,
        generated_on: Local::now().date_naive(),
    };

    let report = ReportFile::create(&state.config.reports.dir).await?;
    let renderer = state.renderer;

    let started = Instant::now();
    // The blocking task owns the file until it hands it back
    let (pages, report) =
        tokio::task::spawn_blocking(move || renderer.render_into(&content, report)).await??;
    metrics::record_render_duration(started.elapsed());

    let download_name = report.download_name().to_string();
    let (len, stream) = report.into_stream().await?;

    tracing::info!(
        file = %download_name,
        pages,
        size = len,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "PDF report generated"
    );

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", download_name),
            ),
            (header::CONTENT_LENGTH, len.to_string()),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}
