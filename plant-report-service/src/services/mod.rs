pub mod data_uri;
pub mod metrics;
pub mod providers;
pub mod report;

pub use data_uri::{decode_image_payload, DataUri, DataUriError};
pub use self::metrics::{get_metrics, init_metrics};
pub use report::{ReportContent, ReportFile, ReportRenderer};
