use axum::{
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::io::Write;

use crate::error::{AppResult, ReportError};
use crate::models::{AnswerSet, AppState};
use crate::report::{DOWNLOAD_NAME, pair_entries, render};

/// Decode the review form: repeated `details_list` fields (encoded answer
/// sets) and repeated `image_paths` fields, in submission order.
///
/// # Errors
///
/// `MalformedPayload` for the first `details_list` entry that doesn't decode.
pub fn parse_report_form(body: &[u8]) -> Result<(Vec<AnswerSet>, Vec<String>), ReportError> {
    let mut answers = Vec::new();
    let mut images = Vec::new();

    for (key, value) in url::form_urlencoded::parse(body) {
        match key.as_ref() {
            "details_list" => answers.push(AnswerSet::decode(answers.len(), &value)?),
            "image_paths" => images.push(value.into_owned()),
            _ => {}
        }
    }

    Ok((answers, images))
}

/// `POST /download_report`: regenerate the PDF from reviewed answers and
/// send it as an attachment.
///
/// # Errors
///
/// 400 on an undecodable answer set, 500 if rendering fails.
pub async fn download_report(State(state): State<AppState>, body: Bytes) -> AppResult<Response> {
    let (answers, images) = parse_report_form(&body)?;
    let entries = pair_entries(answers, images);
    let template = state.template.clone();
    let staging = state.staging.clone();

    let pdf = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, ReportError> {
        let bytes = render(&entries, &template, &staging)?;

        // Temp file is removed when `tmp` drops.
        let mut tmp = tempfile::Builder::new()
            .prefix("incident_report")
            .suffix(".pdf")
            .tempfile()?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
        Ok(std::fs::read(tmp.path())?)
    })
    .await??;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{DOWNLOAD_NAME}\""),
            ),
        ],
        pdf,
    )
        .into_response())
}
