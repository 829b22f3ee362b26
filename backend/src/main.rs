use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use backend::camera;
use backend::config::AppConfig;
use backend::inference::InferenceService;
use backend::model;
use backend::routes::configure_routes;
use backend::storage::UploadStore;
use backend::stream::{Overlay, StreamAnnotator};
use std::env;
use std::sync::Arc;

fn startup_error(message: String) -> std::io::Error {
    log::error!("{}", message);
    std::io::Error::other(message)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config =
        AppConfig::load().map_err(|e| startup_error(format!("Invalid configuration: {}", e)))?;

    // The service is useless without a model, so a load failure ends the process.
    let model = model::load_model(&config.model.path, config.model.input_size)
        .map_err(|e| startup_error(format!("Model loading failed: {}", e)))?;
    let service = InferenceService::from_config(Arc::from(model), &config);
    log::info!(
        "Cutoffs: upload {}%, stream {}%",
        config.thresholds.upload_cutoff,
        config.thresholds.stream_cutoff
    );

    let store = UploadStore::new(&config.server.upload_dir, config.server.max_upload_bytes);
    store
        .ensure_dir()
        .await
        .map_err(|e| startup_error(format!("Upload directory unusable: {}", e)))?;

    let camera: Arc<dyn camera::Camera> = camera::from_source(&config.camera.source)
        .map(Arc::from)
        .map_err(|e| startup_error(format!("Camera unavailable: {}", e)))?;
    let overlay = Overlay::load(config.camera.font_path.as_deref(), config.camera.font_scale)
        .map_err(|e| startup_error(format!("Overlay font unusable: {}", e)))?;
    let annotator = StreamAnnotator::new(
        camera,
        service.clone(),
        overlay,
        config.camera.jpeg_quality,
    );

    let service = web::Data::new(service);
    let store = web::Data::new(store);
    let annotator = web::Data::new(annotator);
    let static_dir = config.server.static_dir.clone();
    let upload_dir = config.server.upload_dir.clone();

    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .allowed_header("X-Requested-With")
                    .max_age(3600),
            )
            .app_data(service.clone())
            .app_data(store.clone())
            .app_data(annotator.clone())
            .configure(|cfg| configure_routes(cfg, &static_dir, &upload_dir))
    })
    .bind(&bind_address)?
    .run()
    .await
}
