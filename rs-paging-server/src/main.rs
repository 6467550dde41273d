use std::path::PathBuf;
use std::sync::Mutex;

use actix_cors::Cors;
use actix_web::{App, HttpResponse, HttpServer, Responder, get, put, web};
use clap::Parser;
use log::{info, warn};
use serde::Deserialize;

use rs_paging_core::config::{DEFAULT_STEPS, ModelConfig, ZeroRowPolicy};
use rs_paging_core::error::ChainError;
use rs_paging_core::io::{list_files, normalize_folder};
use rs_paging_core::model::paging_model::PagingModel;
use rs_paging_core::model::prediction_input::PredictionInput;

/// Extension of the transition logs served from the data directory.
const LOG_EXTENSION: &str = "log";

#[derive(Debug, Parser)]
#[command(name = "rs-paging-server", about = "HTTP front end for page access predictions", version)]
struct ServerArgs {
	/// Address to listen on.
	#[arg(long, default_value = "127.0.0.1:5000")]
	bind: String,

	/// Directory holding the `.log` transition logs.
	#[arg(long, default_value = "./data")]
	data_dir: String,
}

/// Query parameters for the `/v1/predict` endpoint
#[derive(Deserialize)]
struct PredictParams {
	start: Option<i64>,
	steps: Option<i64>,
}

/// Query parameters for the `/v1/load_log` endpoint
#[derive(Deserialize)]
struct LoadParams {
	name: Option<String>,
	pages: Option<usize>,
	zero_row: Option<ZeroRowPolicy>,
	require_transitions: Option<bool>,
}

/// Directory holding the transition logs; fixed at startup.
struct LogDirectory(PathBuf);

/// Model currently served, replaced wholesale by `PUT /v1/load_log`.
type SharedModel = Mutex<Option<PagingModel>>;

impl LoadParams {
	/// Model settings for this request; the count cache is always used.
	fn config(&self) -> ModelConfig {
		let defaults = ModelConfig::default();
		ModelConfig {
			pages: self.pages.unwrap_or(defaults.pages),
			zero_row_policy: self.zero_row.unwrap_or(defaults.zero_row_policy),
			require_transitions: self.require_transitions.unwrap_or(defaults.require_transitions),
			use_cache: true,
			parallel: defaults.parallel,
		}
	}
}

/// Maps a core error to the response a client should see.
fn error_response(error: ChainError) -> HttpResponse {
	match error {
		ChainError::Io(_) | ChainError::Cache(_) | ChainError::Allocation { .. } => {
			warn!("request failed: {error}");
			HttpResponse::InternalServerError().body(error.to_string())
		}
		_ => HttpResponse::BadRequest().body(error.to_string()),
	}
}

/// HTTP GET endpoint `/v1/predict`
///
/// Returns the distribution of the page accessed `steps` accesses after
/// `start` as JSON.
#[get("/v1/predict")]
async fn get_prediction(model: web::Data<SharedModel>, query: web::Query<PredictParams>) -> impl Responder {
	let input = match PredictionInput::new(query.start.unwrap_or(0), query.steps.unwrap_or(DEFAULT_STEPS)) {
		Ok(input) => input,
		Err(e) => return error_response(e),
	};

	let loaded = match model.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	let Some(model) = loaded.as_ref() else {
		return HttpResponse::Conflict().body("No model loaded");
	};

	match model.predict(&input) {
		Ok(prediction) => HttpResponse::Ok().json(prediction),
		Err(e) => error_response(e),
	}
}

#[get("/v1/logs")]
async fn get_logs(logs: web::Data<LogDirectory>) -> impl Responder {
	match list_files(&logs.0, LOG_EXTENSION) {
		Ok(files) => HttpResponse::Ok().body(files.join("\n").replace(".log", "")),
		Err(_) => HttpResponse::InternalServerError().body("Failed to list logs"),
	}
}

#[get("/v1/loaded_model")]
async fn get_loaded_model(model: web::Data<SharedModel>) -> impl Responder {
	let loaded = match model.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	match loaded.as_ref() {
		Some(model) => HttpResponse::Ok().json(model.summary()),
		None => HttpResponse::Conflict().body("No model loaded"),
	}
}

#[put("/v1/load_log")]
async fn put_log(
	model: web::Data<SharedModel>,
	logs: web::Data<LogDirectory>,
	query: web::Query<LoadParams>,
) -> impl Responder {
	let name = match &query.name {
		Some(s) if !s.trim().is_empty() => s.trim(),
		_ => return HttpResponse::BadRequest().body("Missing or empty log name"),
	};
	if name.contains(['/', '\\']) || name.starts_with('.') {
		return HttpResponse::BadRequest().body("Log name must be a plain file name");
	}

	// Built without the lock: predictions keep using the previous model meanwhile.
	let log_path = logs.0.join(format!("{name}.{LOG_EXTENSION}"));
	let loaded = match PagingModel::from_log(&log_path, &query.config()) {
		Ok(loaded) => loaded,
		Err(e) => return error_response(e),
	};
	info!("loaded model '{}' from {}", loaded.name(), log_path.display());
	let summary = loaded.summary();

	match model.lock() {
		Ok(mut current) => {
			*current = Some(loaded);
			HttpResponse::Ok().json(summary)
		}
		Err(_) => HttpResponse::InternalServerError().body("Model lock failed"),
	}
}

/// Main entry point for the server.
///
/// Starts with no model loaded; clients pick a log with `PUT /v1/load_log`.
/// The shared model sits behind a `Mutex`; the log directory is shared
/// read-only next to it.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
	env_logger::init();
	let args = ServerArgs::parse();

	let logs = web::Data::new(LogDirectory(normalize_folder(&args.data_dir)));
	info!("serving logs from {} on {}", logs.0.display(), args.bind);
	let shared_model: web::Data<SharedModel> = web::Data::new(Mutex::new(None));

	HttpServer::new(move || {
		let cors = Cors::default().allow_any_origin().allowed_methods(vec!["GET", "PUT"]);
		App::new()
			.wrap(cors)
			.app_data(shared_model.clone())
			.app_data(logs.clone())
			.service(get_prediction)
			.service(get_logs)
			.service(put_log)
			.service(get_loaded_model)
	})
	.bind(args.bind.as_str())?
	.run()
	.await
}
