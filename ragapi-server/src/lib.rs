//! `ragapi-server` exposes the ragapi pipeline over HTTP.
//! Documents are ingested with `POST /data` and questions answered with
//! `GET /search/{query}`.

pub mod error;
pub mod server;
pub mod settings;
pub mod telemetry;

pub use error::ApiError;
pub use server::{AppState, app_router, build_pipeline, run_server};
pub use settings::{Args, HeaderList, LogFormat, Settings};
