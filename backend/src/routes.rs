use std::path::Path;

use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{Either, HttpRequest, HttpResponse, web};
use futures::TryStreamExt;
use log::{info, warn};
use serde::Deserialize;
use shared::{DeleteResponse, PredictResponse};

use crate::error::ApiError;
use crate::inference::InferenceService;
use crate::pages;
use crate::storage::UploadStore;
use crate::storage::upload_store::UPLOAD_URL_PREFIX;
use crate::stream::{self, StreamAnnotator};

const IMAGE_FIELD: &str = "image";
const IMAGE_PATH_FIELD: &str = "image_path";
const MAX_FORM_FIELD_BYTES: usize = 4096;

pub fn configure_routes(cfg: &mut web::ServiceConfig, static_dir: &Path, upload_dir: &Path) {
    cfg.service(web::resource("/").route(web::get().to(index)))
        .service(web::resource("/video_feed").route(web::get().to(video_feed)))
        .service(web::resource("/predict").route(web::post().to(predict)))
        .service(web::resource("/delete").route(web::post().to(delete_image)))
        .service(Files::new(UPLOAD_URL_PREFIX, upload_dir))
        .service(Files::new("/static", static_dir));
}

async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(pages::index(None))
}

async fn video_feed(annotator: web::Data<StreamAnnotator>) -> HttpResponse {
    info!("Opening video feed");
    HttpResponse::Ok()
        .content_type(stream::content_type())
        .streaming(annotator.byte_stream())
}

struct Upload {
    file_name: String,
    data: Vec<u8>,
}

/// Finds the first `image` file field. Fields without a filename are not files.
async fn read_image_field(
    payload: &mut Multipart,
    store: &UploadStore,
) -> Result<Option<Upload>, ApiError> {
    let mut upload: Option<Upload> = None;

    while let Some(mut field) = payload.try_next().await? {
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_owned);
        let wanted = upload.is_none() && field.name() == Some(IMAGE_FIELD);

        match file_name {
            Some(file_name) if wanted => {
                let mut data = Vec::new();
                while let Some(chunk) = field.try_next().await? {
                    data.extend_from_slice(&chunk);
                    store.validate_size(data.len())?;
                }
                upload = Some(Upload { file_name, data });
            }
            _ => {
                while field.try_next().await?.is_some() {}
            }
        }
    }

    Ok(upload)
}

fn is_multipart(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"))
}

fn wants_json(req: &HttpRequest) -> bool {
    req.headers()
        .get("X-Requested-With")
        .and_then(|v| v.to_str().ok())
        == Some("XMLHttpRequest")
}

async fn predict(
    req: HttpRequest,
    service: web::Data<InferenceService>,
    store: web::Data<UploadStore>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    // Bodies that are not multipart cannot carry a file field.
    if !is_multipart(&req) {
        return Err(ApiError::MissingImage);
    }
    let upload = read_image_field(&mut payload, &store)
        .await?
        .ok_or(ApiError::MissingImage)?;
    if upload.file_name.is_empty() {
        return Err(ApiError::EmptyFilename);
    }

    let stored = store.save(&upload.file_name, &upload.data).await?;

    let data = upload.data;
    let classifier = service.clone();
    let prediction = web::block(move || classifier.classify_upload(&data))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    info!(
        "Predicted {} ({:.2}%) for {}",
        prediction.label, prediction.confidence, stored.file_name
    );

    let response = PredictResponse {
        prediction: prediction.label.display_name(),
        confidence: prediction.confidence,
        description: prediction.description.to_string(),
        image_path: stored.url,
    };

    if wants_json(&req) {
        Ok(HttpResponse::Ok().json(response))
    } else {
        Ok(HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(pages::index(Some(&response))))
    }
}

#[derive(Debug, Deserialize)]
struct DeleteForm {
    image_path: Option<String>,
}

async fn read_text_field(payload: &mut Multipart, name: &str) -> Result<Option<String>, ApiError> {
    let mut value: Option<String> = None;
    while let Some(mut field) = payload.try_next().await? {
        let wanted = value.is_none() && field.name() == Some(name);
        let mut data = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            if wanted && data.len() + chunk.len() <= MAX_FORM_FIELD_BYTES {
                data.extend_from_slice(&chunk);
            }
        }
        if wanted {
            value = Some(String::from_utf8_lossy(&data).into_owned());
        }
    }
    Ok(value)
}

/// Always answers `deleted`; missing fields, foreign paths and absent files are no-ops.
async fn delete_image(
    store: web::Data<UploadStore>,
    form: Option<Either<web::Form<DeleteForm>, Multipart>>,
) -> HttpResponse {
    let image_path = match form {
        Some(Either::Left(form)) => form.into_inner().image_path,
        Some(Either::Right(mut payload)) => read_text_field(&mut payload, IMAGE_PATH_FIELD)
            .await
            .unwrap_or_else(|e| {
                warn!("Unreadable delete form: {}", e);
                None
            }),
        None => None,
    };

    if let Some(image_path) = image_path.filter(|p| !p.is_empty()) {
        match store.delete(&image_path).await {
            Ok(true) => info!("Deleted {}", image_path),
            Ok(false) => info!("Nothing to delete at {}", image_path),
            Err(e) => warn!("Failed to delete {}: {}", image_path, e),
        }
    }

    HttpResponse::Ok().json(DeleteResponse::deleted())
}
