//! The stdio line protocol: one JSON object in, one JSON object out.

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::batch;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::FileGateway;
use crate::request::Request;

/// The only shape ever written to the output stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WireResponse {
    Success { result: Value },
    Error { error: String },
}

impl From<GatewayResult<Value>> for WireResponse {
    fn from(res: GatewayResult<Value>) -> Self {
        match res {
            Ok(result) => Self::Success { result },
            Err(err) => Self::Error {
                error: err.to_string(),
            },
        }
    }
}

pub struct Dispatcher {
    gateway: FileGateway,
}

impl Dispatcher {
    pub fn new(gateway: FileGateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &FileGateway {
        &self.gateway
    }

    /// Parse, route and execute one input line.
    pub async fn handle_line(&self, line: &str) -> WireResponse {
        let outcome = match parse_line(line) {
            Ok(request) => self.route(request).await,
            Err(err) => Err(err),
        };
        if let Err(err) = &outcome {
            debug!(kind = err.kind(), "request failed: {err}");
        }
        outcome.into()
    }

    async fn route(&self, mut request: Map<String, Value>) -> GatewayResult<Value> {
        if batch::is_batch(&request) {
            let out = batch::run_batch(&self.gateway, &request).await;
            return serde_json::to_value(out).map_err(|e| GatewayError::External(e.into()));
        }

        let command = match request.remove("command") {
            Some(Value::String(command)) => command,
            Some(other) => {
                return Err(GatewayError::MalformedRequest(format!(
                    "'command' must be a string, got {other}"
                )));
            }
            None => {
                return Err(GatewayError::MalformedRequest(
                    "missing 'command' field".to_string(),
                ));
            }
        };
        let request = Request::from_params(&command, request)?;
        debug!(command = %request.kind(), "dispatching request");
        self.gateway.execute(request).await
    }

    /// Serve requests until `input` reaches EOF. Lines are handled strictly
    /// in order and each response is flushed before the next line is read.
    pub async fn serve<R, W>(&self, mut input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if input.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            let response = match std::str::from_utf8(&buf) {
                Ok(line) => {
                    let line = line.trim_end_matches(['\n', '\r']);
                    if line.trim().is_empty() {
                        continue;
                    }
                    self.handle_line(line).await
                }
                Err(err) => {
                    debug!("rejecting line with invalid UTF-8: {err}");
                    WireResponse::from(Err(GatewayError::MalformedRequest(
                        "line is not valid UTF-8".to_string(),
                    )))
                }
            };
            let mut encoded = serde_json::to_string(&response).unwrap_or_else(|err| {
                warn!("failed to encode response: {err}");
                r#"{"status":"error","error":"Failed to encode response"}"#.to_string()
            });
            encoded.push('\n');
            output.write_all(encoded.as_bytes()).await?;
            output.flush().await?;
        }
        info!("input closed");
        Ok(())
    }
}

fn parse_line(line: &str) -> GatewayResult<Map<String, Value>> {
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(GatewayError::MalformedRequest(
            "expected a JSON object".to_string(),
        )),
        Err(err) => Err(GatewayError::MalformedRequest(err.to_string())),
    }
}
