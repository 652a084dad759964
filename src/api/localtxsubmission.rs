use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use tracing::{instrument, warn};

use super::{AppState, ErrorBody};
use crate::error::GatewayError;
use crate::node::NodeConnector;
use crate::submit;
use crate::with_session;

const CBOR: &str = "application/cbor";

pub fn routes<C: NodeConnector>() -> Router<AppState<C>> {
    Router::new().route("/tx", post(submit_tx::<C>))
}

fn is_cbor(headers: &HeaderMap, name: axum::http::HeaderName) -> bool {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(CBOR))
}

/// Submits a serialized transaction. Answers 202 with the transaction hash.
#[instrument(skip_all, fields(len = body.len()))]
async fn submit_tx<C: NodeConnector>(
    State(state): State<AppState<C>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    if !is_cbor(&headers, CONTENT_TYPE) {
        warn!("invalid request body, should be application/cbor");
        return Ok((
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Json(ErrorBody::new("invalid request body, should be application/cbor")),
        )
            .into_response());
    }

    let submitted = with_session!(state.connector, |session| submit::submit_tx(
        &mut session,
        body.to_vec()
    ));

    match submitted {
        Ok(hash) => Ok((StatusCode::ACCEPTED, Json(hash.to_string())).into_response()),
        Err(GatewayError::Rejected { reason }) if is_cbor(&headers, ACCEPT) => {
            Ok((StatusCode::BAD_REQUEST, [(CONTENT_TYPE, CBOR)], reason).into_response())
        }
        Err(e) => Err(e),
    }
}
