//! Upload routes
//!
//! POST /uploads streams a CSV body through the ingestion pipeline for the
//! calling user. GET /uploads/progress is an SSE feed of the progress
//! events published while a load runs; events are best-effort and are not
//! replayed for late subscribers.

use axum::{
    body::Body,
    extract::{Query, State},
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Router,
};
use futures::{Stream, StreamExt, TryStreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

use super::super::FeatureState;
use crate::api::ApiResponse;
use crate::error::{ApiResult, AppError};
use crate::ingest::{run_upload, UploadOutcome};
use crate::progress::ProgressEvent;

const SSE_KEEP_ALIVE_SECS: u64 = 30;

/// Create upload routes
pub fn uploads_routes() -> Router<FeatureState> {
    Router::new()
        .route("/", post(upload))
        .route("/progress", get(progress))
}

#[derive(Debug, Deserialize)]
struct UploadParams {
    filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProgressParams {
    channel: Option<String>,
}

/// Ingest a CSV upload
///
/// POST /uploads?filename=products.csv
///
/// The caller is identified by the `x-user-id` header; the request body is
/// the raw CSV. The response reports the final row counts once the load
/// has finished.
async fn upload(
    State(state): State<FeatureState>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Body,
) -> ApiResult<ApiResponse<UploadOutcome>> {
    let owner = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest("missing x-user-id header".to_string()))?
        .to_string();

    let filename = params.filename.unwrap_or_else(|| "upload.csv".to_string());

    let stream = body.into_data_stream().map_err(std::io::Error::other);
    let reader = StreamReader::new(stream);

    let outcome = run_upload(
        reader,
        &owner,
        &filename,
        state.store.as_ref(),
        &state.publisher,
        &state.ingest,
        &CancellationToken::new(),
    )
    .await?;

    Ok(ApiResponse::success(outcome))
}

/// Subscribe to upload progress events
///
/// GET /uploads/progress?channel=uploadprogress
///
/// Streams events published after the subscription was opened. A lagged
/// subscriber skips the lost events and keeps receiving.
async fn progress(
    State(state): State<FeatureState>,
    Query(params): Query<ProgressParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let channel = params
        .channel
        .unwrap_or_else(|| state.ingest.progress_channel.clone());
    let receiver = state.publisher.subscribe(&channel);
    tracing::debug!(channel = %channel, "SSE progress subscriber connected");

    let stream = BroadcastStream::new(receiver).filter_map(|result| async move {
        match result {
            Ok(event) => Some(Ok(to_sse_event(&event))),
            Err(BroadcastStreamRecvError::Lagged(n)) => {
                tracing::warn!(lagged = n, "Progress subscriber lagged, events skipped");
                None
            },
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::default().interval(Duration::from_secs(SSE_KEEP_ALIVE_SECS)),
    )
}

fn to_sse_event(event: &ProgressEvent) -> Event {
    Event::default()
        .event(&event.event_type)
        .json_data(&event.payload)
        .unwrap_or_else(|_| Event::default().comment("serialization error"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestConfig;
    use crate::progress::ProgressPublisher;
    use crate::store::PgRecordStore;
    use axum::http::{header, Request, StatusCode};
    use serde_json::json;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> FeatureState {
        // Lazy pool: no connection is made until a query runs
        let pool = PgPoolOptions::new()
            .connect_lazy("postgresql://localhost/pcp_test")
            .unwrap();
        FeatureState {
            db: pool.clone(),
            store: Arc::new(PgRecordStore::new(pool)),
            publisher: Arc::new(ProgressPublisher::new()),
            ingest: IngestConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_progress_route_responds_with_event_stream() {
        let app = uploads_routes().with_state(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/progress")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert!(content_type.starts_with("text/event-stream"));
    }

    #[tokio::test]
    async fn test_upload_without_user_header_is_bad_request() {
        let app = uploads_routes().with_state(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .body(Body::from("name,sku,description\n"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_progress_event_converts_to_sse() {
        let event = ProgressEvent {
            channel: "uploadprogress".to_string(),
            event_type: "message".to_string(),
            payload: json!({"percent": 50.0}),
        };
        // json_data succeeds for plain JSON payloads
        let _sse = to_sse_event(&event);
    }
}
