use crate::dtos::AnalysisResponse;
use crate::services::metrics::{self, Outcome};
use crate::services::providers::InlineImage;
use crate::services::DataUri;
use crate::startup::AppState;
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use std::time::Instant;

/// Multipart field carrying the plant photo.
pub const IMAGE_FIELD: &str = "image";

/// Instruction sent alongside every image.
pub const ANALYSIS_PROMPT: &str = "Analyze this plant image and provide detailed analysis of its species, health, and care recommendations, its characteristics, care instructions, and any interesting facts. Please provide the response in plain text without using any markdown formatting.";

const ANALYSIS_FAILED: &str = "An error occurred while analyzing the image";

/// The uploaded image, held in memory for the length of the request.
#[derive(Debug)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub mime_type: String,
    pub data: Vec<u8>,
}

pub async fn analyze_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisResponse>, AppError> {
    let upload = match read_image_upload(multipart).await {
        Ok(upload) => upload,
        Err(e) => {
            metrics::record_analysis(Outcome::ClientError);
            return Err(e);
        }
    };

    tracing::info!(
        filename = upload.file_name.as_deref().unwrap_or("unnamed"),
        mime_type = %upload.mime_type,
        size = upload.data.len(),
        "Plant analysis started"
    );

    let images = [InlineImage {
        mime_type: upload.mime_type,
        data: upload.data,
    }];

    let started = Instant::now();
    let generation = state
        .provider
        .generate(ANALYSIS_PROMPT, &images)
        .await
        .map_err(|e| {
            metrics::record_analysis(Outcome::Failure);
            AppError::operation_failed(ANALYSIS_FAILED, e)
        })?;

    metrics::record_genai_call(&state.config.gemini.model, started.elapsed(), generation.usage);
    metrics::record_analysis(Outcome::Success);

    tracing::info!(
        model = %state.config.gemini.model,
        elapsed_ms = started.elapsed().as_millis() as u64,
        input_tokens = generation.usage.input,
        output_tokens = generation.usage.output,
        stop_reason = ?generation.stop_reason,
        "Plant analysis completed"
    );

    let [image] = images;
    Ok(Json(AnalysisResponse {
        result: generation.text,
        image: DataUri::new(image.mime_type, image.data).to_string(),
    }))
}

/// Pull exactly one image out of the multipart body. Other fields are
/// ignored.
async fn read_image_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ImageUpload, AppError> {
    let no_file = || AppError::BadRequest(anyhow::anyhow!("No image file uploaded"));

    let mut multipart = multipart.map_err(|e| {
        tracing::debug!(error = %e, "Request is not a readable multipart form");
        no_file()
    })?;

    let mut upload: Option<ImageUpload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Failed to read multipart field", e))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        if upload.is_some() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Only one image file may be uploaded"
            )));
        }

        let file_name = field.file_name().map(str::to_string);
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error("Failed to read file bytes", e))?
            .to_vec();

        upload = Some(ImageUpload {
            file_name,
            mime_type,
            data,
        });
    }

    let upload = upload.ok_or_else(no_file)?;

    if upload.data.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Uploaded image is empty"
        )));
    }

    if !upload.mime_type.starts_with("image/") {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Unsupported file type {}, expected an image",
            upload.mime_type
        )));
    }

    Ok(upload)
}

fn multipart_error(context: &str, e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Uploaded image is too large".to_string())
    } else {
        AppError::BadRequest(anyhow::anyhow!("{}: {}", context, e))
    }
}
