use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use axum::{
    Json, Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
    routing::post,
};
use serde_json::{Value, json};
use std::{
    io::Cursor,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::sync::Mutex;
use tower::ServiceExt;
use tracing_subscriber::util::SubscriberInitExt;

use clap::Parser;
use incident_report::{
    build_app,
    config::Config,
    models::{
        AnalyzedImage, AnswerSet, AppState, Q_DEGREE, Q_FULL_DESCRIPTION, Q_INCIDENT,
        Q_NUM_PEOPLE, Q_SPEED, Q_TIME,
    },
};

const API_KEY: &str = "test-key";

fn scenario_answers() -> AnswerSet {
    AnswerSet {
        speed: "20 km/h".into(),
        time: "14:32".into(),
        num_people: "2".into(),
        degree: "45".into(),
        incident: "collision".into(),
        full_description: "two vehicles collided".into(),
    }
}

fn answer_for(question: &str) -> &'static str {
    match question {
        Q_SPEED => "20 km/h",
        Q_TIME => "14:32",
        Q_NUM_PEOPLE => "2",
        Q_DEGREE => "45",
        Q_INCIDENT => "collision",
        Q_FULL_DESCRIPTION => "two vehicles collided",
        _ => "unexpected question",
    }
}

/// Short fingerprint of the base64 image data the mock receives.
fn image_tag(data: &str) -> String {
    let hash = data.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |h, b| {
        (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    });
    format!("{hash:016x}")
}

/// What the mock answers for one particular image.
fn answers_for(image: &[u8]) -> AnswerSet {
    let tag = image_tag(&B64.encode(image));
    let a = scenario_answers();
    let tagged = |s: String| format!("{s} #{tag}");
    AnswerSet {
        speed: tagged(a.speed),
        time: tagged(a.time),
        num_people: tagged(a.num_people),
        degree: tagged(a.degree),
        incident: tagged(a.incident),
        full_description: tagged(a.full_description),
    }
}

#[derive(Debug, Clone)]
struct SeenCall {
    api_key: String,
    mime: String,
    path: String,
}

/// Stand-in for the description service. Answers the fixed questions with the
/// scenario values tagged with a fingerprint of the image (padded with
/// whitespace) and can fail the n-th call.
struct MockDescriber {
    port: u16,
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<SeenCall>>>,
}

impl MockDescriber {
    async fn start(fail_on: Option<usize>) -> Self {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen: Arc<Mutex<Vec<SeenCall>>> = Arc::new(Mutex::new(Vec::new()));
        let counter = calls.clone();
        let store = seen.clone();

        let app = Router::new().route(
            "/{*path}",
            post(
                move |axum::extract::Path(path): axum::extract::Path<String>,
                      headers: HeaderMap,
                      Json(body): Json<Value>| {
                    let counter = counter.clone();
                    let store = store.clone();
                    async move {
                        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                        store.lock().await.push(SeenCall {
                            api_key: headers
                                .get("x-goog-api-key")
                                .and_then(|v| v.to_str().ok())
                                .unwrap_or_default()
                                .to_string(),
                            mime: body
                                .pointer("/contents/0/parts/1/inline_data/mime_type")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            path,
                        });

                        if fail_on == Some(n) {
                            return (
                                StatusCode::INTERNAL_SERVER_ERROR,
                                Json(json!({"error": {"message": "backend exploded"}})),
                            );
                        }

                        let question = body
                            .pointer("/contents/0/parts/0/text")
                            .and_then(Value::as_str)
                            .unwrap_or_default();
                        let data = body
                            .pointer("/contents/0/parts/1/inline_data/data")
                            .and_then(Value::as_str)
                            .unwrap_or_default();
                        let text = format!("  {} #{}\n", answer_for(question), image_tag(data));
                        (
                            StatusCode::OK,
                            Json(json!({
                                "candidates": [{ "content": { "parts": [{ "text": text }] } }]
                            })),
                        )
                    }
                },
            ),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock describer");
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(axum::serve(listener, app).into_future());

        Self { port, calls, seen }
    }

    fn url(&self) -> String {
        format!("http://127.0.0.1:{}/v1beta", self.port)
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

struct TestCtx {
    _tmp: tempfile::TempDir,
    static_dir: PathBuf,
    app: Router,
    mock: MockDescriber,
}

async fn make_ctx(fail_on: Option<usize>) -> anyhow::Result<TestCtx> {
    let tmp = tempfile::tempdir()?;
    let static_dir = tmp.path().join("static");
    let mock = MockDescriber::start(fail_on).await;

    let config = Config::try_parse_from([
        "incident-report".to_string(),
        "--api-key".into(),
        API_KEY.into(),
        "--description-api-url".into(),
        mock.url(),
        "--static-dir".into(),
        static_dir.to_string_lossy().to_string(),
        "--logo-path".into(),
        tmp.path().join("logo.jpg").to_string_lossy().to_string(),
        "--log-file".into(),
        tmp.path().join("test.log").to_string_lossy().to_string(),
    ])?;

    let app = build_app(AppState::new(config));
    Ok(TestCtx {
        _tmp: tmp,
        static_dir,
        app,
        mock,
    })
}

fn png_bytes() -> Vec<u8> {
    png_of(8, [200, 30, 30])
}

fn png_of(side: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(side, side, image::Rgb(rgb));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

const BOUNDARY: &str = "----incident-report-test";

fn multipart_request(files: &[(&str, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files[]\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::post("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn report_form(details: &[String], images: &[&str]) -> Request<Body> {
    let mut form = url::form_urlencoded::Serializer::new(String::new());
    for d in details {
        form.append_pair("details_list", d);
    }
    for i in images {
        form.append_pair("image_paths", i);
    }
    Request::post("/download_report")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.finish()))
        .unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let headers = res.headers().clone();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, bytes.to_vec())
}

async fn upload(app: &Router, files: &[(&str, &[u8])]) -> (StatusCode, Vec<u8>) {
    let (status, _, body) = send(app, multipart_request(files)).await;
    (status, body)
}

#[tokio::test]
async fn healthz_ok() -> anyhow::Result<()> {
    let ctx = make_ctx(None).await?;
    let (st, _, body) = send(
        &ctx.app,
        Request::get("/healthz").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(st, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Value>(&body)?, json!("ok"));
    Ok(())
}

#[tokio::test]
async fn upload_single_image_maps_every_answer() -> anyhow::Result<()> {
    let ctx = make_ctx(None).await?;
    let png = png_bytes();

    let (st, body) = upload(&ctx.app, &[("crash.png", png.as_slice())]).await;
    assert_eq!(st, StatusCode::OK, "{}", String::from_utf8_lossy(&body));

    let analyzed: Vec<AnalyzedImage> = serde_json::from_slice(&body)?;
    assert_eq!(
        analyzed,
        vec![AnalyzedImage {
            details: answers_for(&png),
            image_path: "crash.png".into(),
        }]
    );

    // staged under its original name
    assert_eq!(std::fs::read(ctx.static_dir.join("crash.png"))?, png);

    assert_eq!(ctx.mock.calls(), 6);
    let seen = ctx.mock.seen.lock().await.clone();
    assert!(seen.iter().all(|c| c.api_key == API_KEY));
    assert!(seen.iter().all(|c| c.mime == "image/png"));
    assert!(
        seen.iter()
            .all(|c| c.path.ends_with("models/gemini-1.5-flash:generateContent"))
    );
    Ok(())
}

#[tokio::test]
async fn upload_preserves_order_and_skips_empty_names() -> anyhow::Result<()> {
    let ctx = make_ctx(None).await?;
    let second = png_of(8, [200, 30, 30]);
    let skipped = png_of(12, [0, 0, 0]);
    let first = png_of(16, [30, 30, 200]);

    let (st, body) = upload(
        &ctx.app,
        &[
            ("second.png", second.as_slice()),
            ("", skipped.as_slice()),
            ("first.jpg", first.as_slice()),
        ],
    )
    .await;
    assert_eq!(st, StatusCode::OK);

    let analyzed: Vec<AnalyzedImage> = serde_json::from_slice(&body)?;
    let names: Vec<&str> = analyzed.iter().map(|a| a.image_path.as_str()).collect();
    assert_eq!(names, vec!["second.png", "first.jpg"]);

    // Each image carries the answers given about that image.
    assert_ne!(answers_for(&second), answers_for(&first));
    assert_eq!(analyzed[0].details, answers_for(&second));
    assert_eq!(analyzed[1].details, answers_for(&first));
    assert_eq!(ctx.mock.calls(), 12);

    let seen = ctx.mock.seen.lock().await.clone();
    assert!(seen.iter().any(|c| c.mime == "image/jpeg"));
    Ok(())
}

#[tokio::test]
async fn upload_without_selection_returns_empty_list() -> anyhow::Result<()> {
    let ctx = make_ctx(None).await?;

    let (st, body) = upload(&ctx.app, &[("", b"".as_slice())]).await;
    assert_eq!(st, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Value>(&body)?, json!([]));
    assert_eq!(ctx.mock.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn upload_without_file_part_is_bad_request() -> anyhow::Result<()> {
    let ctx = make_ctx(None).await?;

    let (st, _) = upload(&ctx.app, &[]).await;
    assert_eq!(st, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn upload_fails_when_one_question_fails() -> anyhow::Result<()> {
    let ctx = make_ctx(Some(3)).await?;
    let png = png_bytes();

    let (st, body) = upload(&ctx.app, &[("crash.png", png.as_slice())]).await;
    assert_eq!(st, StatusCode::BAD_GATEWAY);
    let msg = String::from_utf8_lossy(&body);
    assert!(msg.contains("description service failed"), "got: {msg}");
    Ok(())
}

#[tokio::test]
async fn upload_strips_directories_from_filenames() -> anyhow::Result<()> {
    let ctx = make_ctx(None).await?;
    let png = png_bytes();

    let (st, body) = upload(&ctx.app, &[("../../outside.png", png.as_slice())]).await;
    assert_eq!(st, StatusCode::OK);

    let analyzed: Vec<AnalyzedImage> = serde_json::from_slice(&body)?;
    assert_eq!(analyzed[0].image_path, "outside.png");
    assert!(ctx.static_dir.join("outside.png").exists());
    Ok(())
}

#[tokio::test]
async fn staged_images_are_served() -> anyhow::Result<()> {
    let ctx = make_ctx(None).await?;
    let png = png_bytes();
    upload(&ctx.app, &[("crash.png", png.as_slice())]).await;

    let (st, headers, body) = send(
        &ctx.app,
        Request::get("/static/crash.png").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(st, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/png");
    assert_eq!(body, png);
    Ok(())
}

#[tokio::test]
async fn download_report_returns_pdf_attachment() -> anyhow::Result<()> {
    let ctx = make_ctx(None).await?;
    std::fs::create_dir_all(&ctx.static_dir)?;
    std::fs::write(ctx.static_dir.join("crash.png"), png_bytes())?;

    let (st, headers, body) = send(
        &ctx.app,
        report_form(&[scenario_answers().encode()], &["crash.png"]),
    )
    .await;

    assert_eq!(st, StatusCode::OK, "{}", String::from_utf8_lossy(&body));
    assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
    let disposition = headers[header::CONTENT_DISPOSITION].to_str()?;
    assert!(disposition.starts_with("attachment"));
    assert!(disposition.contains("incident_report.pdf"));
    assert!(body.starts_with(b"%PDF"));
    Ok(())
}

#[tokio::test]
async fn download_report_with_missing_image_still_renders() -> anyhow::Result<()> {
    let ctx = make_ctx(None).await?;

    let (st, _, body) = send(
        &ctx.app,
        report_form(&[scenario_answers().encode()], &["never-uploaded.png"]),
    )
    .await;

    assert_eq!(st, StatusCode::OK);
    assert!(body.starts_with(b"%PDF"));
    Ok(())
}

#[tokio::test]
async fn download_report_without_entries_renders_title_only_document() -> anyhow::Result<()> {
    let ctx = make_ctx(None).await?;

    let (st, _, body) = send(&ctx.app, report_form(&[], &[])).await;
    assert_eq!(st, StatusCode::OK);
    assert!(body.starts_with(b"%PDF"));
    Ok(())
}

#[tokio::test]
async fn download_report_rejects_malformed_details() -> anyhow::Result<()> {
    let ctx = make_ctx(None).await?;

    let (st, _, body) = send(
        &ctx.app,
        report_form(
            &[scenario_answers().encode(), r#"{"speed": "fast"}"#.to_string()],
            &["a.png", "b.png"],
        ),
    )
    .await;

    assert_eq!(st, StatusCode::BAD_REQUEST);
    let msg = String::from_utf8_lossy(&body);
    assert!(msg.contains("entry 1"), "got: {msg}");
    Ok(())
}

#[tokio::test]
async fn debug_payload_logging_keeps_bodies_intact() -> anyhow::Result<()> {
    let _log = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .finish()
        .set_default();
    let ctx = make_ctx(None).await?;

    // Larger than any body the logger previews.
    let clip: Vec<u8> = (0..300 * 1024).map(|i| (i % 251) as u8).collect();
    std::fs::create_dir_all(&ctx.static_dir)?;
    std::fs::write(ctx.static_dir.join("clip.mp4"), &clip)?;

    let (st, headers, body) = send(
        &ctx.app,
        Request::get("/static/clip.mp4").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(st, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(body, clip);

    let (st, _, body) = send(
        &ctx.app,
        Request::get("/healthz").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(st, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Value>(&body)?, json!("ok"));

    let png = png_bytes();
    let (st, body) = upload(&ctx.app, &[("crash.png", png.as_slice())]).await;
    assert_eq!(st, StatusCode::OK);
    let analyzed: Vec<AnalyzedImage> = serde_json::from_slice(&body)?;
    assert_eq!(analyzed[0].details, answers_for(&png));

    let (st, _, body) = send(
        &ctx.app,
        report_form(&[scenario_answers().encode()], &["crash.png"]),
    )
    .await;
    assert_eq!(st, StatusCode::OK);
    assert!(body.starts_with(b"%PDF"));
    Ok(())
}
