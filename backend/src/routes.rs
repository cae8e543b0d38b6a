use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::{web, Error, HttpResponse};
use futures::{StreamExt, TryStreamExt};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::HistoryError;
use crate::inference::{probe_health, InferenceClient, InferenceError};
use crate::notify::{NotificationLog, PresetConfirmation};
use crate::pipeline::{AnalyzeError, Orchestrator, ValidationError};
use crate::state::gallery::{GalleryError, GalleryState};
use crate::state::history::HistoryState;
use crate::state::session::SelectedFile;
use crate::storage::{StorageError, UploadFile};

const UPLOAD_FIELD: &str = "file";

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

fn error_response(status: StatusCode, kind: &str, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(ErrorResponse {
        error: kind.to_string(),
        message: message.into(),
    })
}

fn storage_status(err: &StorageError) -> StatusCode {
    match err {
        StorageError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        StorageError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_GATEWAY,
    }
}

fn inference_status(err: &InferenceError) -> StatusCode {
    match err {
        InferenceError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        InferenceError::DependencyMissing { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_GATEWAY,
    }
}

fn analyze_failure(err: &AnalyzeError) -> HttpResponse {
    let status = match err {
        AnalyzeError::Validation(_) => StatusCode::BAD_REQUEST,
        AnalyzeError::Storage(e) => storage_status(e),
        AnalyzeError::Inference(e) => inference_status(e),
    };
    error_response(status, err.stage(), err.user_message())
}

fn gallery_failure(err: &GalleryError) -> HttpResponse {
    match err {
        GalleryError::Storage(e) => error_response(storage_status(e), "storage", e.to_string()),
        GalleryError::NothingResolved(_) => {
            error_response(StatusCode::BAD_GATEWAY, "storage", err.to_string())
        }
        GalleryError::NothingSelected | GalleryError::SelectionChanged => {
            error_response(StatusCode::CONFLICT, "selection", err.to_string())
        }
    }
}

fn history_failure(err: &HistoryError) -> HttpResponse {
    let status = match err {
        HistoryError::NotFound(_) => StatusCode::NOT_FOUND,
        HistoryError::DeleteUnsupported => StatusCode::NOT_IMPLEMENTED,
        HistoryError::Backend(_) | HistoryError::InvalidData(_) => StatusCode::BAD_GATEWAY,
    };
    error_response(status, "history", err.to_string())
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, static_dir: Option<String>) {
    cfg.service(
        web::scope("/api")
            .service(web::resource("/analyze").route(web::post().to(analyze)))
            .service(web::resource("/analyze/url").route(web::post().to(analyze_url)))
            .service(web::resource("/session").route(web::get().to(get_session)))
            .service(web::resource("/session/reset").route(web::post().to(reset_session)))
            .service(web::resource("/session/select").route(web::post().to(select_file)))
            .service(web::resource("/gallery").route(web::get().to(get_gallery)))
            .service(web::resource("/gallery/refresh").route(web::post().to(refresh_gallery)))
            .service(web::resource("/gallery/{key:.+}").route(web::delete().to(delete_asset)))
            .service(
                web::resource("/carousel/current").route(web::delete().to(delete_current_asset)),
            )
            .service(web::resource("/carousel").route(web::get().to(get_carousel)))
            .service(web::resource("/carousel/open/{index}").route(web::post().to(open_carousel)))
            .service(web::resource("/carousel/next").route(web::post().to(next_image)))
            .service(web::resource("/carousel/prev").route(web::post().to(prev_image)))
            .service(web::resource("/carousel/close").route(web::post().to(close_carousel)))
            .service(web::resource("/history").route(web::get().to(get_history)))
            .service(web::resource("/history/{id}").route(web::delete().to(delete_history)))
            .service(web::resource("/health").route(web::get().to(health)))
            .service(web::resource("/notifications").route(web::get().to(notifications))),
    );

    if let Some(dir) = static_dir {
        cfg.service(Files::new("/", dir).index_file("index.html"));
    }
}

/// The `file` field as far as it was read.
enum Upload {
    Received(Option<UploadFile>),
    /// Reading stopped as soon as the field passed the limit.
    TooLarge(SelectedFile, ValidationError),
}

/// Collects the `file` field, giving up once it holds more than `max_bytes`.
/// Other fields are drained and ignored.
async fn read_upload(mut payload: Multipart, max_bytes: usize) -> Result<Upload, Error> {
    let mut upload = None;
    while let Some(mut field) = payload.try_next().await? {
        if field.name() != Some(UPLOAD_FIELD) || upload.is_some() {
            while field.next().await.is_some() {}
            continue;
        }

        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .unwrap_or("upload")
            .to_string();
        let content_type = field
            .content_type()
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_default();

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            bytes.extend_from_slice(&chunk?);
            if bytes.len() > max_bytes {
                let size = bytes.len();
                let selected = SelectedFile {
                    name,
                    content_type,
                    size,
                };
                return Ok(Upload::TooLarge(
                    selected,
                    ValidationError::FileTooLarge {
                        size,
                        limit: max_bytes,
                    },
                ));
            }
        }
        upload = Some(UploadFile {
            name,
            content_type,
            bytes,
        });
    }
    Ok(Upload::Received(upload))
}

async fn analyze(
    orchestrator: web::Data<Orchestrator>,
    payload: Multipart,
) -> Result<HttpResponse, Error> {
    let file = match read_upload(payload, orchestrator.max_upload_bytes()).await? {
        Upload::Received(file) => file,
        Upload::TooLarge(selected, err) => {
            return Ok(analyze_failure(
                &orchestrator.reject_upload(Some(selected), err),
            ));
        }
    };
    Ok(match orchestrator.analyze(file).await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(e) => analyze_failure(&e),
    })
}

#[derive(Deserialize)]
struct AnalyzeUrlRequest {
    url: String,
}

async fn analyze_url(
    orchestrator: web::Data<Orchestrator>,
    body: web::Json<AnalyzeUrlRequest>,
) -> HttpResponse {
    match orchestrator.analyze_url(&body.url).await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(e) => analyze_failure(&e),
    }
}

async fn get_session(orchestrator: web::Data<Orchestrator>) -> HttpResponse {
    HttpResponse::Ok().json(orchestrator.session().snapshot())
}

async fn reset_session(orchestrator: web::Data<Orchestrator>) -> HttpResponse {
    if orchestrator.session().reset() {
        HttpResponse::Ok().json(orchestrator.session().snapshot())
    } else {
        error_response(
            StatusCode::CONFLICT,
            "session",
            "An analysis is still running",
        )
    }
}

async fn select_file(
    orchestrator: web::Data<Orchestrator>,
    body: web::Json<SelectedFile>,
) -> HttpResponse {
    orchestrator.session().select(body.into_inner());
    HttpResponse::Ok().json(orchestrator.session().snapshot())
}

async fn get_gallery(gallery: web::Data<GalleryState>) -> HttpResponse {
    HttpResponse::Ok().json(gallery.snapshot())
}

async fn refresh_gallery(gallery: web::Data<GalleryState>) -> HttpResponse {
    match gallery.refresh().await {
        Ok(report) => {
            let failed: Vec<_> = report
                .failed
                .iter()
                .map(|(key, e)| json!({ "storageKey": key, "message": e.to_string() }))
                .collect();
            HttpResponse::Ok().json(json!({
                "resolved": report.resolved,
                "published": report.published,
                "failed": failed,
                "gallery": gallery.snapshot(),
            }))
        }
        Err(e) => gallery_failure(&e),
    }
}

async fn delete_asset(gallery: web::Data<GalleryState>, path: web::Path<String>) -> HttpResponse {
    let key = path.into_inner();
    match gallery.remove(&key).await {
        Ok(outcome) => {
            info!("Removed {} from the gallery ({:?})", key, outcome);
            HttpResponse::Ok().json(json!({ "outcome": outcome, "gallery": gallery.snapshot() }))
        }
        Err(e) => gallery_failure(&e),
    }
}

#[derive(Deserialize)]
struct DeleteQuery {
    confirmed: Option<bool>,
}

async fn delete_current_asset(
    gallery: web::Data<GalleryState>,
    query: web::Query<DeleteQuery>,
) -> HttpResponse {
    let confirmation = PresetConfirmation(query.confirmed.unwrap_or(false));
    match gallery.delete_current(&confirmation).await {
        Ok(outcome) => {
            HttpResponse::Ok().json(json!({ "outcome": outcome, "gallery": gallery.snapshot() }))
        }
        Err(e) => gallery_failure(&e),
    }
}

async fn get_carousel(gallery: web::Data<GalleryState>) -> HttpResponse {
    HttpResponse::Ok().json(gallery.carousel())
}

async fn open_carousel(gallery: web::Data<GalleryState>, path: web::Path<usize>) -> HttpResponse {
    let index = path.into_inner();
    if gallery.open(index) {
        HttpResponse::Ok().json(gallery.carousel())
    } else {
        error_response(
            StatusCode::NOT_FOUND,
            "selection",
            format!("No image at index {}", index),
        )
    }
}

async fn next_image(gallery: web::Data<GalleryState>) -> HttpResponse {
    HttpResponse::Ok().json(gallery.next())
}

async fn prev_image(gallery: web::Data<GalleryState>) -> HttpResponse {
    HttpResponse::Ok().json(gallery.prev())
}

async fn close_carousel(gallery: web::Data<GalleryState>) -> HttpResponse {
    HttpResponse::Ok().json(gallery.close())
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

/// Serves the cached list when the backend cannot be reached.
async fn get_history(
    history: web::Data<HistoryState>,
    query: web::Query<HistoryQuery>,
) -> HttpResponse {
    let refreshed = match query.limit {
        Some(limit) if limit > 0 => history.refresh(limit).await,
        _ => history.refresh_current().await,
    };
    if let Err(e) = refreshed {
        warn!("Serving cached history: {}", e);
    }
    HttpResponse::Ok().json(history.snapshot())
}

async fn delete_history(history: web::Data<HistoryState>, path: web::Path<String>) -> HttpResponse {
    match history.remove(&path.into_inner()).await {
        Ok(removal) => {
            HttpResponse::Ok().json(json!({ "outcome": removal, "history": history.snapshot() }))
        }
        Err(e) => history_failure(&e),
    }
}

async fn health(inference: web::Data<dyn InferenceClient>) -> HttpResponse {
    HttpResponse::Ok().json(probe_health(inference.get_ref()).await)
}

async fn notifications(log: web::Data<NotificationLog>) -> HttpResponse {
    HttpResponse::Ok().json(log.recent())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use std::time::Duration;

    use actix_web::error::PayloadError;
    use actix_web::http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
    use actix_web::{test, App};
    use serde_json::Value;
    use shared::UploadPhase;

    use super::*;
    use crate::state::session::SessionState;
    use crate::test_support::{record_at, upload, FakeAssetStore, FakeHistory, FakeInference, PREFIX};

    const BOUNDARY: &str = "tagger-test-boundary";

    struct Deps {
        store: Arc<FakeAssetStore>,
        inference: Arc<FakeInference>,
        history_repo: Arc<FakeHistory>,
        orchestrator: web::Data<Orchestrator>,
        gallery: web::Data<GalleryState>,
        history: web::Data<HistoryState>,
        log: web::Data<NotificationLog>,
    }

    impl Deps {
        fn new() -> Self {
            let store = Arc::new(FakeAssetStore::new());
            let inference = Arc::new(FakeInference::labelling(&[("cat", 0.92), ("dog", 0.05)]));
            let history_repo = Arc::new(FakeHistory::new());
            let gallery = Arc::new(GalleryState::new(store.clone(), PREFIX));
            let history = Arc::new(
                HistoryState::new(history_repo.clone(), 20).with_asset_store(store.clone()),
            );
            let log = Arc::new(NotificationLog::new(10));
            let orchestrator = Orchestrator::new(
                store.clone(),
                inference.clone(),
                history_repo.clone(),
                gallery.clone(),
                history.clone(),
                Arc::new(SessionState::new()),
                log.clone(),
            )
            .with_max_upload_bytes(1024);

            Self {
                store,
                inference,
                history_repo,
                orchestrator: web::Data::new(orchestrator),
                gallery: web::Data::from(gallery),
                history: web::Data::from(history),
                log: web::Data::from(log),
            }
        }

        fn install(&self, cfg: &mut web::ServiceConfig) {
            let inference: Arc<dyn InferenceClient> = self.inference.clone();
            cfg.app_data(self.orchestrator.clone())
                .app_data(self.gallery.clone())
                .app_data(self.history.clone())
                .app_data(self.log.clone())
                .app_data(web::Data::from(inference));
            configure_routes(cfg, None);
        }
    }

    fn multipart(field: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n",
            b = BOUNDARY
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload_request(body: Vec<u8>) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/analyze")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(body)
    }

    #[actix_web::test]
    async fn upload_is_analysed_and_listed() {
        let deps = Deps::new();
        let app = test::init_service(App::new().configure(|cfg| deps.install(cfg))).await;

        let req = upload_request(multipart("file", "cat.jpg", "image/jpeg", &[0xFF; 512]));
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["labels"][0]["name"], "cat");
        assert_eq!(body["modelName"], "fake-vit");

        deps.orchestrator.settle().await;
        let req = test::TestRequest::get().uri("/api/gallery").to_request();
        let gallery: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(gallery["assets"].as_array().unwrap().len(), 1);
        assert_eq!(gallery["assets"][0]["displayName"], "cat.jpg");

        let req = test::TestRequest::get().uri("/api/session").to_request();
        let session: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(session["phase"], UploadPhase::Done.as_ref());
    }

    #[actix_web::test]
    async fn oversized_upload_is_a_bad_request() {
        let deps = Deps::new();
        let app = test::init_service(App::new().configure(|cfg| deps.install(cfg))).await;

        let req = upload_request(multipart("file", "big.jpg", "image/jpeg", &[0xFF; 2048]));
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "validation");
        assert!(body["message"].as_str().unwrap().contains("the limit is 1024 bytes"));
        assert_eq!(deps.store.put_calls(), 0);

        let session = deps.orchestrator.session().snapshot();
        assert_eq!(session.phase, UploadPhase::Idle);
        assert_eq!(session.selected_file.unwrap().name, "big.jpg");
        assert!(session.last_error.is_some());
    }

    #[actix_web::test]
    async fn reading_stops_once_the_file_passes_the_limit() {
        let mut head = multipart("file", "big.jpg", "image/jpeg", &[0xFF; 600]);
        // Leave the part open: the client is still sending.
        head.truncate(head.len() - (BOUNDARY.len() + 8));
        let chunks: Vec<Result<web::Bytes, PayloadError>> = vec![
            Ok(web::Bytes::from(head)),
            Ok(web::Bytes::from(vec![0xFF; 600])),
            Ok(web::Bytes::from(vec![0xFF; 600])),
        ];
        let endless = futures::stream::iter(chunks).chain(futures::stream::pending());

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(&format!("multipart/form-data; boundary={}", BOUNDARY)).unwrap(),
        );
        let payload = Multipart::new(&headers, endless);

        let read = actix_web::rt::time::timeout(Duration::from_secs(5), read_upload(payload, 1024))
            .await
            .expect("read_upload waited for the rest of the body");
        match read.unwrap() {
            Upload::TooLarge(file, ValidationError::FileTooLarge { size, limit }) => {
                assert_eq!(file.name, "big.jpg");
                assert_eq!(limit, 1024);
                assert!(size > 1024);
            }
            _ => panic!("upload past the limit was not cut off"),
        }
    }

    #[actix_web::test]
    async fn upload_without_file_field_is_rejected() {
        let deps = Deps::new();
        let app = test::init_service(App::new().configure(|cfg| deps.install(cfg))).await;

        let req = upload_request(multipart("other", "cat.jpg", "image/jpeg", &[1, 2, 3]));
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn inference_errors_map_to_gateway_statuses() {
        let deps = Deps::new();
        let app = test::init_service(App::new().configure(|cfg| deps.install(cfg))).await;

        deps.inference.fail_with(InferenceError::DependencyMissing {
            message: "torch missing".into(),
            solution: None,
        });
        let req = test::TestRequest::post()
            .uri("/api/analyze/url")
            .set_json(json!({ "url": "https://example.test/cat.jpg" }))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );

        deps.inference.fail_with(InferenceError::Timeout(60_000));
        let req = test::TestRequest::post()
            .uri("/api/analyze/url")
            .set_json(json!({ "url": "https://example.test/cat.jpg" }))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[actix_web::test]
    async fn carousel_walks_the_gallery() {
        let deps = Deps::new();
        for name in ["a.jpg", "b.jpg"] {
            crate::storage::AssetStore::put(deps.store.as_ref(), &upload(name, 10))
                .await
                .unwrap();
        }
        deps.gallery.refresh().await.unwrap();
        let app = test::init_service(App::new().configure(|cfg| deps.install(cfg))).await;

        let req = test::TestRequest::post().uri("/api/carousel/open/5").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::post().uri("/api/carousel/open/1").to_request();
        let view: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(view["position"], "2 / 2");

        let req = test::TestRequest::post().uri("/api/carousel/next").to_request();
        let view: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(view["currentIndex"], 0);
        assert_eq!(view["asset"]["displayName"], "a.jpg");

        let req = test::TestRequest::delete()
            .uri("/api/carousel/current?confirmed=true")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["outcome"], "deleted");
        assert_eq!(body["gallery"]["assets"].as_array().unwrap().len(), 1);

        let req = test::TestRequest::post().uri("/api/carousel/close").to_request();
        let view: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(view["isOpen"], false);
    }

    #[actix_web::test]
    async fn gallery_keys_with_slashes_can_be_deleted() {
        let deps = Deps::new();
        let asset = crate::storage::AssetStore::put(deps.store.as_ref(), &upload("a.jpg", 10))
            .await
            .unwrap();
        let app = test::init_service(App::new().configure(|cfg| deps.install(cfg))).await;

        let req = test::TestRequest::delete()
            .uri(&format!("/api/gallery/{}", asset.storage_key))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["outcome"], "deleted");
        assert!(deps.store.listed_keys().is_empty());
    }

    #[actix_web::test]
    async fn history_routes_distinguish_missing_and_unsupported() {
        let deps = Deps::new();
        for i in 0..3 {
            crate::db::HistoryRepository::append(
                deps.history_repo.as_ref(),
                &record_at(&format!("r{}", i), i),
            )
            .await
            .unwrap();
        }
        let app = test::init_service(App::new().configure(|cfg| deps.install(cfg))).await;

        let req = test::TestRequest::get().uri("/api/history?limit=2").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["records"].as_array().unwrap().len(), 2);
        assert_eq!(body["records"][0]["id"], "r2");

        let req = test::TestRequest::delete().uri("/api/history/ghost").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["outcome"], "already_absent");

        deps.history_repo.disable_delete();
        let req = test::TestRequest::delete().uri("/api/history/r1").to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::NOT_IMPLEMENTED
        );
    }

    #[actix_web::test]
    async fn health_and_notifications_are_exposed() {
        let deps = Deps::new();
        let app = test::init_service(App::new().configure(|cfg| deps.install(cfg))).await;

        let req = test::TestRequest::get().uri("/api/health").to_request();
        let status: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(status["status"], "healthy");

        deps.inference.fail_health_with(InferenceError::Unreachable("refused".into()));
        let req = test::TestRequest::get().uri("/api/health").to_request();
        let status: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(status["status"], "unreachable");

        let req = test::TestRequest::post()
            .uri("/api/analyze/url")
            .set_json(json!({ "url": "ftp://nope" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/api/notifications").to_request();
        let notes: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(notes[0]["severity"], "warning");
    }

    #[actix_web::test]
    async fn reset_is_refused_only_while_running() {
        let deps = Deps::new();
        let app = test::init_service(App::new().configure(|cfg| deps.install(cfg))).await;

        let req = test::TestRequest::post()
            .uri("/api/session/select")
            .set_json(json!({ "name": "cat.jpg", "contentType": "image/jpeg", "size": 10 }))
            .to_request();
        let session: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(session["selectedFile"]["name"], "cat.jpg");

        let release = deps.inference.hold_next();
        let running = deps.orchestrator.analyze_url("https://example.test/cat.jpg");
        let check = async {
            let req = test::TestRequest::post().uri("/api/session/reset").to_request();
            let status = test::call_service(&app, req).await.status();
            let _ = release.send(());
            status
        };
        let (result, status) = futures::future::join(running, check).await;
        assert!(result.is_ok());
        assert_eq!(status, StatusCode::CONFLICT);

        let req = test::TestRequest::post().uri("/api/session/reset").to_request();
        let session: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(session["phase"], "idle");
        assert!(session["selectedFile"].is_null());
    }
}
