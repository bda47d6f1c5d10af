use crate::describe::{DescriptionClient, EncodedImage};
use crate::error::ReportError;
use crate::models::{
    AnalyzedImage, AnswerSet, Q_DEGREE, Q_FULL_DESCRIPTION, Q_INCIDENT, Q_NUM_PEOPLE, Q_SPEED,
    Q_TIME, UploadedFile,
};
use crate::staging::Staging;

const FALLBACK_MIME: &str = "image/png";

/// Ask the six fixed questions about one image.
///
/// The questions are independent, so they are sent concurrently; the first
/// failure cancels the rest.
///
/// # Errors
///
/// Propagates the first `Service` / `EmptyResponse` error.
pub async fn describe_image(
    client: &DescriptionClient,
    image: &EncodedImage,
) -> Result<AnswerSet, ReportError> {
    let (speed, time, num_people, degree, incident, full_description) = tokio::try_join!(
        client.ask(image, Q_SPEED),
        client.ask(image, Q_TIME),
        client.ask(image, Q_NUM_PEOPLE),
        client.ask(image, Q_DEGREE),
        client.ask(image, Q_INCIDENT),
        client.ask(image, Q_FULL_DESCRIPTION),
    )?;

    Ok(AnswerSet {
        speed,
        time,
        num_people,
        degree,
        incident,
        full_description,
    })
}

/// Stage every uploaded file and describe it, preserving upload order.
///
/// Files with an empty name are skipped. A failure on any image aborts the
/// whole batch.
///
/// # Errors
///
/// `Io` if staging fails, otherwise whatever the description client returns.
pub async fn analyze_uploads(
    client: &DescriptionClient,
    staging: &Staging,
    files: Vec<UploadedFile>,
) -> Result<Vec<AnalyzedImage>, ReportError> {
    let mut out = Vec::with_capacity(files.len());

    for file in files {
        if Staging::clean_filename(&file.filename).is_none() {
            tracing::debug!(filename = %file.filename, "skipping upload without a filename");
            continue;
        }

        let staged = staging.store(&file.filename, &file.bytes).await?;
        let mime = guess_mime(&staged.filename, file.content_type.as_deref());
        let image = EncodedImage::new(mime, &file.bytes);

        tracing::info!(filename = %staged.filename, size = file.bytes.len(), "describing image");
        let details = describe_image(client, &image).await?;

        out.push(AnalyzedImage {
            details,
            image_path: staged.filename,
        });
    }

    Ok(out)
}

/// Filename extension first, then the part's declared type, then PNG.
#[must_use]
pub fn guess_mime(filename: &str, declared: Option<&str>) -> String {
    mime_guess::from_path(filename)
        .first()
        .filter(|m| m.type_() == mime_guess::mime::IMAGE)
        .map(|m| m.essence_str().to_string())
        .or_else(|| {
            declared
                .filter(|ct| ct.starts_with("image/"))
                .map(ToString::to_string)
        })
        .unwrap_or_else(|| FALLBACK_MIME.to_string())
}
