use serde::{Deserialize, Serialize};

/// Body of `POST /download`, normally the round-tripped [`AnalysisResponse`].
///
/// [`AnalysisResponse`]: super::AnalysisResponse
#[derive(Debug, Serialize, Deserialize)]
pub struct ReportRequest {
    pub result: String,
    /// Data URI or bare base64. The report is rendered without an image when
    /// this is missing or empty.
    #[serde(default)]
    pub image: Option<String>,
}

impl ReportRequest {
    /// Image payload, treating an empty string like a missing one.
    pub fn image_payload(&self) -> Option<&str> {
        self.image.as_deref().filter(|s| !s.trim().is_empty())
    }
}
