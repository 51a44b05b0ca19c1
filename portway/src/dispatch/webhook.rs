//! `POST /{env}/webhook/<id>` (`spec.md` §6): a thin pass-through that
//! forwards the raw body to the environment's configured sink and relays
//! the sink's status code back to the caller.

use actix_web::HttpRequest;
use bytes::Bytes;
use portway_common::PortwayError;

pub async fn forward(
    client: &reqwest::Client,
    sink_url: &str,
    id: &str,
    req: &HttpRequest,
    body: Bytes,
) -> Result<u16, PortwayError> {
    let content_type = req
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_owned();

    let response = client
        .post(sink_url)
        .header("content-type", content_type)
        .header("x-webhook-id", id)
        .body(body)
        .send()
        .await
        .map_err(|e| PortwayError::bad_gateway(e.to_string()))?;

    Ok(response.status().as_u16())
}
