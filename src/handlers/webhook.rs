use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};

use crate::error::AppError;
use crate::services::funding::NotificationAck;
use crate::AppState;

pub const SIGNATURE_HEADER: &str = "x-gateway-signature";

/// Gateway payment notification. Acknowledged with 200 whenever the payload
/// parses, whether or not it changed anything.
#[utoipa::path(
    post,
    path = "/api/v1/transactions/notification",
    request_body(content = String, description = "Raw gateway notification JSON"),
    responses(
        (status = 200, description = "Notification acknowledged", body = NotificationAck),
        (status = 400, description = "Unparseable payload or bad signature"),
        (status = 500, description = "Storage failure, gateway should redeliver")
    ),
    tag = "Gateway"
)]
pub async fn notification(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<NotificationAck>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok());

    let ack = state
        .funding
        .handle_gateway_notification(&body, signature)
        .await?;

    Ok(Json(ack))
}
