use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::describe::DescriptionClient;
use crate::error::ReportError;
use crate::report::ReportTemplate;
use crate::staging::Staging;

/* ---------- App state ---------- */
#[derive(Clone)]
pub struct AppState {
    pub describer: DescriptionClient,
    pub staging: Staging,
    pub template: ReportTemplate,
    pub config: Config,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let describer = DescriptionClient::new(
            config.description_api_url.clone(),
            config.api_key.clone(),
            config.description_model.clone(),
            config.description_timeout(),
        );
        let staging = Staging::new(config.static_dir.clone());
        let template = ReportTemplate {
            logo_path: Some(config.logo_path.clone()),
            defaults: config.report.clone(),
        };
        Self {
            describer,
            staging,
            template,
            config,
        }
    }
}

/* ---------- Answers ---------- */

/// The six answers the description service gives about one image.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct AnswerSet {
    pub speed: String,
    pub time: String,
    pub num_people: String,
    pub degree: String,
    pub incident: String,
    pub full_description: String,
}

pub const Q_SPEED: &str = "What is the speed of the vehicle in the image?";
pub const Q_TIME: &str = "What is the time shown in the image?";
pub const Q_NUM_PEOPLE: &str = "How many people are in the image?";
pub const Q_DEGREE: &str = "What is the degree of the vehicle in the image?";
pub const Q_INCIDENT: &str = "Describe the incident shown in the image.";
pub const Q_FULL_DESCRIPTION: &str = "Describe the content of the image in detail.";

impl AnswerSet {
    /// Compact JSON used when answers travel back through the caller.
    #[must_use]
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// # Errors
    ///
    /// Returns `MalformedPayload` if `raw` is not a JSON object carrying all six
    /// string fields.
    pub fn decode(index: usize, raw: &str) -> Result<Self, ReportError> {
        serde_json::from_str(raw).map_err(|e| ReportError::MalformedPayload {
            index,
            reason: e.to_string(),
        })
    }
}

/// One element of the upload response.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AnalyzedImage {
    pub details: AnswerSet,
    pub image_path: String,
}

/// A file received by the upload route, before staging.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}
