//! HTTP surface of the generation service.

use std::convert::Infallible;
use std::sync::Arc;

use futures::TryStreamExt;
use warp::http::StatusCode;
use warp::hyper::body::Buf;
use warp::multipart::{FormData, Part};
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::backend::{ErrorResponse, SynthesizeRequest};

use super::{GenerationService, ServiceError};

/// Largest accepted JSON request body.
pub const MAX_JSON_BYTES: u64 = 64 * 1024;

/// Largest accepted reference-audio upload.
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// All endpoints, with rejections turned into JSON error bodies.
pub fn routes(
    service: Arc<GenerationService>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let health = warp::path!("health")
        .and(warp::get())
        .and(with_service(service.clone()))
        .map(health_reply);

    let clone = warp::path!("v1" / "clone")
        .and(warp::post())
        .and(with_service(service.clone()))
        .and(warp::multipart::form().max_length(MAX_UPLOAD_BYTES))
        .and_then(clone_voice);

    let tts = warp::path!("v1" / "tts")
        .and(warp::post())
        .and(with_service(service.clone()))
        .and(warp::body::content_length_limit(MAX_JSON_BYTES))
        .and(warp::body::json())
        .and_then(synthesize);

    let voices = warp::path!("v1" / "voices")
        .and(warp::get())
        .and(with_service(service))
        .map(voices_reply);

    health
        .or(clone)
        .or(tts)
        .or(voices)
        .recover(handle_rejection)
        .with(warp::trace::request())
}

fn with_service(
    service: Arc<GenerationService>,
) -> impl Filter<Extract = (Arc<GenerationService>,), Error = Infallible> + Clone {
    warp::any().map(move || service.clone())
}

fn health_reply(service: Arc<GenerationService>) -> Response {
    let health = service.health();
    let status = if health.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    warp::reply::with_status(warp::reply::json(&health), status).into_response()
}

fn voices_reply(service: Arc<GenerationService>) -> Response {
    warp::reply::json(&service.list_voices()).into_response()
}

async fn clone_voice(service: Arc<GenerationService>, form: FormData) -> Result<Response, Rejection> {
    let fields = match read_form(form).await {
        Ok(fields) => fields,
        Err(e) => return Ok(error_reply(&e)),
    };

    let mut name = None;
    let mut audio = None;
    for (field, data) in fields {
        match field.as_str() {
            "audio" => audio = Some(data),
            "name" => {
                let value = String::from_utf8_lossy(&data).trim().to_string();
                name = Some(value).filter(|n| !n.is_empty());
            }
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    let result = tokio::task::spawn_blocking(move || service.clone_voice(name, audio.as_deref()))
        .await
        .unwrap_or_else(|e| Err(ServiceError::RuntimeFailure(e.to_string())));

    Ok(match result {
        Ok(cloned) => warp::reply::json(&cloned).into_response(),
        Err(e) => error_reply(&e),
    })
}

async fn synthesize(
    service: Arc<GenerationService>,
    request: SynthesizeRequest,
) -> Result<Response, Rejection> {
    let result = tokio::task::spawn_blocking(move || service.synthesize(&request))
        .await
        .unwrap_or_else(|e| Err(ServiceError::RuntimeFailure(e.to_string())));

    Ok(match result {
        Ok(synthesis) => {
            let duration = format!("{:.2}", synthesis.duration_secs);
            let reply = warp::reply::with_header(synthesis.wav, "content-type", "audio/wav");
            warp::reply::with_header(reply, "x-audio-duration", duration).into_response()
        }
        Err(e) => error_reply(&e),
    })
}

/// Collect every multipart field as `(name, bytes)`.
async fn read_form(form: FormData) -> Result<Vec<(String, Vec<u8>)>, ServiceError> {
    form.and_then(|part: Part| async move {
        let field = part.name().to_string();
        let data = part
            .stream()
            .try_fold(Vec::new(), |mut acc, mut chunk| async move {
                let remaining = chunk.remaining();
                acc.extend_from_slice(&chunk.copy_to_bytes(remaining));
                Ok(acc)
            })
            .await?;
        Ok((field, data))
    })
    .try_collect::<Vec<_>>()
    .await
    .map_err(|e| ServiceError::TransportFailure(format!("Could not read upload: {e}")))
}

fn error_reply(err: &ServiceError) -> Response {
    let status = err.status();
    if status.is_server_error() {
        tracing::error!(%status, error = %err, "Request failed");
    } else {
        tracing::warn!(%status, error = %err, "Request rejected");
    }

    json_error(status, err.to_string())
}

fn json_error(status: StatusCode, message: String) -> Response {
    warp::reply::with_status(warp::reply::json(&ErrorResponse { error: message }), status)
        .into_response()
}

/// Map filter rejections to the same JSON error shape handlers use.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid request body: {e}"))
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large".to_string())
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "Content-Length required".to_string())
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (StatusCode::UNSUPPORTED_MEDIA_TYPE, "Unsupported media type".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        tracing::debug!(rejection = ?err, "Unhandled rejection");
        (StatusCode::BAD_REQUEST, "Bad request".to_string())
    };

    Ok(json_error(status, message))
}
