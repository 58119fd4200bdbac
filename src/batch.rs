//! Legacy indexed batch requests: `command1`, `filePath1`, `command2`, ...
//!
//! Sub-commands run one after another. Reads feed a shared multimodal content
//! list; mutations only leave a line in the summary.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{GatewayError, GatewayResult};
use crate::extract::{ContentPart, ExtractedContent};
use crate::gateway::{FileGateway, ReadOutput};
use crate::request::{CommandKind, Request};

#[derive(Debug, Clone, Serialize)]
pub struct BatchOutput {
    pub message: String,
    pub succeeded: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ContentPart>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// True when the request uses the indexed batch shape.
pub fn is_batch(request: &Map<String, Value>) -> bool {
    request.contains_key("command1")
}

/// Collect the parameters for sub-command `index`, with the suffix stripped.
///
/// A key belongs to `index` only when what remains after removing the suffix
/// does not itself end in a digit, so `filePath12` is never read as
/// `filePath1` + `2`.
pub fn params_for_index(request: &Map<String, Value>, index: usize) -> Map<String, Value> {
    let suffix = index.to_string();
    let command_key = format!("command{index}");
    request
        .iter()
        .filter(|(key, _)| **key != command_key)
        .filter_map(|(key, value)| {
            let name = key.strip_suffix(suffix.as_str())?;
            let last = name.chars().last()?;
            (!last.is_ascii_digit()).then(|| (name.to_string(), value.clone()))
        })
        .collect()
}

#[derive(Default)]
struct Aggregate {
    content: Vec<ContentPart>,
    summary: Vec<String>,
    succeeded: usize,
    failed: usize,
}

pub async fn run_batch(gateway: &FileGateway, request: &Map<String, Value>) -> BatchOutput {
    let mut agg = Aggregate::default();

    for index in 1.. {
        let Some(command) = request
            .get(&format!("command{index}"))
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
        else {
            break;
        };
        let params = params_for_index(request, index);
        debug!(index, command, ?params, "running batch sub-command");

        match run_one(gateway, command, params, &mut agg.content).await {
            Ok(message) => {
                agg.succeeded += 1;
                if let Some(message) = message {
                    agg.summary.push(message);
                }
            }
            Err(err) => {
                debug!(index, command, kind = err.kind(), "batch sub-command failed: {err}");
                agg.failed += 1;
                agg.summary.push(format!("Error executing {command}: {err}"));
            }
        }
    }

    let message = format!(
        "Batch processing complete. Succeeded: {}, Failed: {}.",
        agg.succeeded, agg.failed
    );

    if agg.content.is_empty() {
        return BatchOutput {
            message,
            succeeded: agg.succeeded,
            failed: agg.failed,
            content: None,
            details: Some(agg.summary.join("\n")),
        };
    }

    let mut content = Vec::with_capacity(agg.content.len() + 1);
    if !agg.summary.is_empty() {
        content.push(ContentPart::text(format!(
            "Batch Operations Summary:\n- {}",
            agg.summary.join("\n- ")
        )));
    }
    content.extend(agg.content);

    BatchOutput {
        message,
        succeeded: agg.succeeded,
        failed: agg.failed,
        content: Some(content),
        details: None,
    }
}

/// Run a single sub-command. Reads append to `content` and return `None`;
/// mutations return their success message.
async fn run_one(
    gateway: &FileGateway,
    command: &str,
    params: Map<String, Value>,
    content: &mut Vec<ContentPart>,
) -> GatewayResult<Option<String>> {
    let supported = matches!(
        CommandKind::from_name(command),
        Some(
            CommandKind::ReadFile
                | CommandKind::WebReadFile
                | CommandKind::CopyFile
                | CommandKind::MoveFile
                | CommandKind::RenameFile
                | CommandKind::DeleteFile
        )
    );
    if !supported {
        return Err(GatewayError::external(format!(
            "Unsupported batch command: {command}"
        )));
    }

    match Request::from_params(command, params)? {
        Request::ReadFile(args) => {
            append_read(content, gateway.read_file(args).await?);
            Ok(None)
        }
        Request::WebReadFile(args) => {
            append_read(content, gateway.web_read_file(args).await?);
            Ok(None)
        }
        request => {
            let data = gateway.execute(request).await?;
            Ok(Some(
                data.get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Operation completed")
                    .to_string(),
            ))
        }
    }
}

fn append_read(content: &mut Vec<ContentPart>, out: ReadOutput) {
    content.push(ContentPart::text(format!("--- Content of {} ---", out.file_name)));
    match out.content {
        ExtractedContent::Text(text) => content.push(ContentPart::text(text)),
        ExtractedContent::Parts(parts) => content.extend(parts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::Sandbox;
    use serde_json::json;

    fn map(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn suffix_parsing_does_not_confuse_multi_digit_indices() {
        let req = map(json!({
            "command1": "ReadFile",
            "filePath1": "/a",
            "command2": "ReadFile",
            "filePath2": "/b",
            "command12": "ReadFile",
            "filePath12": "/l",
        }));
        let p1 = params_for_index(&req, 1);
        assert_eq!(p1.len(), 1);
        assert_eq!(p1["filePath"], "/a");
        let p2 = params_for_index(&req, 2);
        assert_eq!(p2.len(), 1);
        assert_eq!(p2["filePath"], "/b");
        let p12 = params_for_index(&req, 12);
        assert_eq!(p12["filePath"], "/l");
    }

    #[tokio::test]
    async fn reads_are_aggregated_behind_a_summary() {
        let sb = Sandbox::new();
        std::fs::write(sb.root.join("a.txt"), "alpha").unwrap();
        std::fs::write(sb.root.join("b.txt"), "beta").unwrap();

        let req = map(json!({
            "command1": "ReadFile",
            "filePath1": sb.p("a.txt"),
            "command2": "CopyFile",
            "sourcePath2": sb.p("b.txt"),
            "destinationPath2": sb.p("c.txt"),
            "command3": "ReadFile",
            "filePath3": sb.p("missing.txt"),
            "command4": "ReadFile",
            "filePath4": sb.p("b.txt"),
        }));
        let out = run_batch(&sb.gateway, &req).await;

        assert_eq!(out.succeeded, 3);
        assert_eq!(out.failed, 1);
        assert_eq!(out.message, "Batch processing complete. Succeeded: 3, Failed: 1.");
        let content = out.content.unwrap();
        let ContentPart::Text { text: summary } = &content[0] else { panic!() };
        assert!(summary.starts_with("Batch Operations Summary:\n- File copied successfully"));
        assert!(summary.contains("Error executing ReadFile:"));
        assert_eq!(
            &content[1..],
            &[
                ContentPart::text("--- Content of a.txt ---"),
                ContentPart::text("alpha"),
                ContentPart::text("--- Content of b.txt ---"),
                ContentPart::text("beta"),
            ]
        );
        assert!(sb.root.join("c.txt").exists());
    }

    #[tokio::test]
    async fn mutations_only_yield_details() {
        let sb = Sandbox::new();
        std::fs::write(sb.root.join("x.txt"), "x").unwrap();

        let req = map(json!({
            "command1": "RenameFile",
            "sourcePath1": sb.p("x.txt"),
            "destinationPath1": sb.p("y.txt"),
            "command2": "WriteFile",
            "filePath2": sb.p("z.txt"),
            "content2": "nope",
        }));
        let out = run_batch(&sb.gateway, &req).await;

        assert_eq!((out.succeeded, out.failed), (1, 1));
        assert!(out.content.is_none());
        assert_eq!(
            out.details.as_deref(),
            Some("File renamed successfully\nError executing WriteFile: Unsupported batch command: WriteFile")
        );
        assert!(!sb.root.join("z.txt").exists());
    }

    #[tokio::test]
    async fn stops_at_first_missing_index() {
        let sb = Sandbox::new();
        std::fs::write(sb.root.join("a.txt"), "a").unwrap();
        let req = map(json!({
            "command1": "ReadFile",
            "filePath1": sb.p("a.txt"),
            "command3": "DeleteFile",
            "filePath3": sb.p("a.txt"),
        }));
        let out = run_batch(&sb.gateway, &req).await;
        assert_eq!((out.succeeded, out.failed), (1, 0));
        assert!(sb.root.join("a.txt").exists());
        let value = serde_json::to_value(&out).unwrap();
        assert!(value.get("details").is_none());
        assert_eq!(value["content"][0]["text"], "--- Content of a.txt ---");
    }
}
