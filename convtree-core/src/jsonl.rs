use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ConvtreeError, Result};
use crate::model::{Content, ContentBlock, Message, MessageKind};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLogEntry {
    uuid: Option<String>,
    #[serde(alias = "parentId")]
    parent_uuid: Option<String>,
    timestamp: Option<String>,
    #[serde(rename = "type")]
    entry_type: String,
    message: Option<RawMessageBody>,
    content: Option<Value>,
    summary: Option<String>,
    tool_use: Option<Value>,
    tool_use_result: Option<Value>,
    is_sidechain: Option<bool>,
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawMessageBody {
    content: Option<Value>,
}

pub fn parse_session(path: &Path, raw_jsonl: &str) -> Result<Vec<Message>> {
    let mut messages = Vec::new();

    for (line_idx, line) in raw_jsonl.lines().enumerate() {
        let line_no = line_idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let value = serde_json::from_str::<Value>(trimmed).map_err(|source| {
            ConvtreeError::InvalidJsonLine {
                path: path.to_path_buf(),
                line: line_no,
                source,
            }
        })?;

        let entry = match serde_json::from_value::<RawLogEntry>(value) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::debug!("Skipping non-entry line {} in {}: {}", line_no, path.display(), err);
                continue;
            }
        };

        let Some(kind) = parse_kind(&entry.entry_type) else {
            tracing::debug!(
                "Skipping entry of unknown type {:?} at line {}",
                entry.entry_type,
                line_no
            );
            continue;
        };

        messages.push(entry_to_message(entry, kind, line_no));
    }

    Ok(messages)
}

fn parse_kind(entry_type: &str) -> Option<MessageKind> {
    match entry_type {
        "user" => Some(MessageKind::User),
        "assistant" => Some(MessageKind::Assistant),
        "system" => Some(MessageKind::System),
        "summary" => Some(MessageKind::Summary),
        "file-history-snapshot" => Some(MessageKind::FileHistorySnapshot),
        "progress" => Some(MessageKind::Progress),
        "queue-operation" => Some(MessageKind::QueueOperation),
        _ => None,
    }
}

fn entry_to_message(entry: RawLogEntry, kind: MessageKind, line_no: usize) -> Message {
    let content = match kind {
        MessageKind::User | MessageKind::Assistant => entry
            .message
            .and_then(|message| message.content)
            .and_then(to_content),
        MessageKind::System | MessageKind::QueueOperation => entry.content.and_then(to_content),
        MessageKind::Summary => entry.summary.map(Content::Text),
        MessageKind::FileHistorySnapshot | MessageKind::Progress => None,
    };

    Message {
        uuid: entry
            .uuid
            .filter(|uuid| !uuid.is_empty())
            .unwrap_or_else(|| format!("{}-line-{line_no}", entry.entry_type)),
        parent_uuid: entry.parent_uuid,
        timestamp: entry.timestamp.unwrap_or_default(),
        kind,
        content,
        tool_use: entry
            .tool_use
            .and_then(|value| serde_json::from_value(value).ok()),
        tool_use_result: entry
            .tool_use_result
            .and_then(|value| serde_json::from_value(value).ok()),
        is_sidechain: entry.is_sidechain,
        data: entry
            .data
            .filter(Value::is_object)
            .and_then(|value| serde_json::from_value(value).ok()),
    }
}

fn to_content(value: Value) -> Option<Content> {
    match value {
        Value::String(text) => Some(Content::Text(text)),
        Value::Array(items) => Some(Content::Blocks(
            items
                .into_iter()
                .filter_map(|item| serde_json::from_value::<ContentBlock>(item).ok())
                .collect(),
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use crate::jsonl::parse_session;
    use crate::model::{Content, ContentBlock, MessageKind, ToolResult};

    #[test]
    fn parses_conversation_entries() {
        let raw = r#"{"uuid":"u1","parentUuid":null,"sessionId":"s","timestamp":"2026-02-23T00:00:00Z","type":"user","message":{"role":"user","content":"hello"}}
{"uuid":"a1","parentUuid":"u1","timestamp":"2026-02-23T00:00:01Z","type":"assistant","message":{"role":"assistant","content":[{"type":"text","text":"hi"},{"type":"tool_use","id":"t1","name":"Task","input":{"prompt":"go"}},{"type":"server_tool_use"}]}}
{"uuid":"u2","parentUuid":"a1","timestamp":"2026-02-23T00:00:02Z","type":"user","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"t1","content":"ok"}]},"toolUseResult":{"isAsync":true,"agentId":"ag-1","description":"scan"}}"#;

        let messages = parse_session(Path::new("/tmp/mock"), raw).expect("parse");

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content, Some(Content::Text("hello".to_string())));
        assert_eq!(messages[1].parent_uuid.as_deref(), Some("u1"));
        let Some(Content::Blocks(blocks)) = &messages[1].content else {
            panic!("expected blocks");
        };
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[2], ContentBlock::Other);
        let fields = messages[2]
            .tool_use_result
            .as_ref()
            .and_then(ToolResult::fields)
            .expect("structured result");
        assert_eq!(fields.agent_id.as_deref(), Some("ag-1"));
    }

    #[test]
    fn parses_side_entries() {
        let raw = r#"{"type":"summary","summary":"Fixing the build","leafUuid":"a1"}
{"type":"queue-operation","operation":"enqueue","timestamp":"2026-02-23T00:00:03Z","content":"<task-id>ag-1</task-id>"}
{"uuid":"p1","parentId":"a1","timestamp":"2026-02-23T00:00:04Z","type":"progress","data":{"type":"agent_progress","agentId":"ag-1","message":{"text":"working"}}}
{"uuid":"s1","timestamp":"2026-02-23T00:00:05Z","type":"system","subtype":"compact_boundary","content":"Conversation compacted"}
{"type":"file-history-snapshot","messageId":"a1","snapshot":{}}"#;

        let messages = parse_session(Path::new("/tmp/mock"), raw).expect("parse");

        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0].uuid, "summary-line-1");
        assert_eq!(messages[0].kind, MessageKind::Summary);
        assert_eq!(
            messages[0].content,
            Some(Content::Text("Fixing the build".to_string()))
        );
        assert_eq!(messages[1].kind, MessageKind::QueueOperation);
        assert_eq!(messages[1].uuid, "queue-operation-line-2");
        assert_eq!(messages[2].parent_uuid.as_deref(), Some("a1"));
        let data = messages[2].data.as_ref().expect("progress payload");
        assert_eq!(data.kind, "agent_progress");
        assert_eq!(data.agent_id.as_deref(), Some("ag-1"));
        assert!(data.extra.contains_key("message"));
        assert_eq!(messages[3].kind, MessageKind::System);
        assert_eq!(messages[4].timestamp, "");
    }

    #[test]
    fn unknown_types_are_skipped() {
        let raw = r#"{"type":"custom-title","customTitle":"x"}
{"noType":true}
{"uuid":"u1","type":"user","message":{"role":"user","content":"hello"}}"#;

        let messages = parse_session(Path::new("/tmp/mock"), raw).expect("parse");

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].uuid, "u1");
    }

    #[test]
    fn invalid_json_line_reports_line_number() {
        let raw = "{\"uuid\":\"u1\",\"type\":\"user\"}\n\nnot json\n";

        let err = parse_session(Path::new("/tmp/mock"), raw).expect_err("must fail");
        assert!(format!("{err}").contains("at line 3"));
    }
}
