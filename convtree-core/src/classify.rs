use std::borrow::Cow;

use chrono::DateTime;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{Content, ContentBlock, Message, MessageKind, ToolResult, ToolResultFields};

const COMMAND_NAME_TAG: &str = "<command-name>";
const AGENT_PROGRESS_KIND: &str = "agent_progress";

static OPEN_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([A-Za-z][A-Za-z0-9_-]*)>").expect("valid regex"));
static TASK_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<task-id>\s*([^<]*?)\s*</task-id>").expect("valid regex"));
static STATUS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<status>\s*([^<]*?)\s*</status>").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReference {
    pub task_id: String,
    pub status: Option<String>,
}

pub fn get_parent_id(message: &Message) -> Option<&str> {
    message
        .parent_uuid
        .as_deref()
        .filter(|parent| !parent.is_empty())
}

// Missing or unparseable timestamps sort as 0.
pub fn timestamp_millis(timestamp: &str) -> i64 {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.timestamp_millis())
        .unwrap_or(0)
}

pub fn has_tool_use(message: &Message) -> bool {
    message.tool_use.is_some()
}

pub fn has_tool_result(message: &Message) -> bool {
    message.tool_use_result.is_some()
}

pub fn get_agent_id_from_progress(message: &Message) -> Option<&str> {
    if message.kind != MessageKind::Progress {
        return None;
    }

    let data = message.data.as_ref()?;
    if data.kind != AGENT_PROGRESS_KIND {
        return None;
    }
    data.agent_id.as_deref()
}

pub fn message_text(message: &Message) -> Option<Cow<'_, str>> {
    match message.content.as_ref()? {
        Content::Text(text) => Some(Cow::Borrowed(text.as_str())),
        Content::Blocks(blocks) => {
            let texts = blocks
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    ContentBlock::Thinking { .. }
                    | ContentBlock::ToolUse { .. }
                    | ContentBlock::ToolResult { .. }
                    | ContentBlock::Image { .. }
                    | ContentBlock::Other => None,
                })
                .collect::<Vec<_>>();
            if texts.is_empty() {
                None
            } else {
                Some(Cow::Owned(texts.join("\n")))
            }
        }
    }
}

pub fn has_command_name(text: &str) -> bool {
    text.contains(COMMAND_NAME_TAG)
}

pub fn is_empty_renderable(message: &Message) -> bool {
    if has_tool_use(message) || has_tool_result(message) {
        return false;
    }
    if message.data.as_ref().is_some_and(|data| !data.is_empty()) {
        return false;
    }
    if let Some(Content::Blocks(blocks)) = &message.content
        && !blocks.is_empty()
    {
        return false;
    }

    let Some(text) = message_text(message) else {
        return true;
    };
    if has_command_name(&text) {
        return false;
    }

    strip_system_tags(&text).trim().is_empty()
}

pub fn strip_system_tags(text: &str) -> String {
    strip_tags_where(text, is_system_tag)
}

fn is_system_tag(name: &str) -> bool {
    name == "local-command-caveat"
        || name.contains("stdout")
        || name.contains("output")
        || name.contains("stderr")
        || name.contains("error")
}

fn strip_tags_where(text: &str, should_strip: impl Fn(&str) -> bool) -> String {
    let mut output = String::with_capacity(text.len());
    let mut cursor = 0;

    while let Some(caps) = OPEN_TAG_RE.captures_at(text, cursor) {
        let (Some(open), Some(name)) = (caps.get(0), caps.get(1)) else {
            break;
        };

        let close = format!("</{}>", name.as_str());
        let close_offset = if should_strip(name.as_str()) {
            text[open.end()..].find(&close)
        } else {
            None
        };

        match close_offset {
            Some(offset) => {
                output.push_str(&text[cursor..open.start()]);
                cursor = open.end() + offset + close.len();
            }
            None => {
                output.push_str(&text[cursor..open.end()]);
                cursor = open.end();
            }
        }
    }

    output.push_str(&text[cursor..]);
    output
}

pub fn extract_task_ids(text: &str) -> Vec<TaskReference> {
    let spans = TASK_ID_RE
        .captures_iter(text)
        .filter_map(|caps| Some((caps.get(0)?, caps.get(1)?)))
        .collect::<Vec<_>>();

    spans
        .iter()
        .enumerate()
        .filter(|(_, (_, id))| !id.as_str().is_empty())
        .map(|(idx, (whole, id))| {
            let segment_end = spans
                .get(idx + 1)
                .map_or(text.len(), |(next, _)| next.start());
            let status = STATUS_RE
                .captures(&text[whole.end()..segment_end])
                .and_then(|caps| caps.get(1))
                .map(|status| status.as_str().to_string())
                .filter(|status| !status.is_empty());
            TaskReference {
                task_id: id.as_str().to_string(),
                status,
            }
        })
        .collect()
}

pub(crate) fn tool_result_fields(message: &Message) -> Option<&ToolResultFields> {
    message.tool_use_result.as_ref().and_then(ToolResult::fields)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::classify::{
        extract_task_ids, get_agent_id_from_progress, get_parent_id, is_empty_renderable,
        message_text, strip_system_tags, timestamp_millis,
    };
    use crate::model::{ContentBlock, Message, MessageKind, ProgressPayload, ToolResult};

    fn user(uuid: &str) -> Message {
        Message::new(uuid, None, "2026-02-23T00:00:00Z", MessageKind::User)
    }

    #[test]
    fn timestamps_parse_to_millis_or_zero() {
        assert_eq!(timestamp_millis("1970-01-01T00:00:01.500Z"), 1500);
        assert_eq!(timestamp_millis("1970-01-01T01:00:00+01:00"), 0);
        assert_eq!(timestamp_millis(""), 0);
        assert_eq!(timestamp_millis("yesterday"), 0);
    }

    #[test]
    fn message_without_content_is_empty() {
        assert!(is_empty_renderable(&user("a")));
    }

    #[test]
    fn command_name_always_renders() {
        let message = user("a").with_text("<command-name>/clear</command-name>");
        assert!(!is_empty_renderable(&message));
    }

    #[test]
    fn system_only_tags_are_empty() {
        let message = user("a").with_text(
            "<local-command-caveat>Caveat: generated</local-command-caveat>\n<local-command-stdout></local-command-stdout>\n<bash-stderr>boom</bash-stderr>",
        );
        assert!(is_empty_renderable(&message));
    }

    #[test]
    fn text_around_system_tags_renders() {
        let message = user("a").with_text("<bash-stdout>ok</bash-stdout> see above");
        assert!(!is_empty_renderable(&message));
    }

    #[test]
    fn unrelated_tags_are_kept() {
        assert_eq!(
            strip_system_tags("<system-reminder>hi</system-reminder><tool-output>x</tool-output>"),
            "<system-reminder>hi</system-reminder>"
        );
    }

    #[test]
    fn unclosed_system_tag_is_left_in_place() {
        assert_eq!(strip_system_tags("<stdout>dangling"), "<stdout>dangling");
    }

    #[test]
    fn blocks_and_tool_results_render() {
        let blocks = user("a").with_blocks(vec![ContentBlock::Thinking {
            thinking: String::new(),
        }]);
        assert!(!is_empty_renderable(&blocks));

        let empty_blocks = user("b").with_blocks(Vec::new());
        assert!(is_empty_renderable(&empty_blocks));

        let tool = user("c").with_tool_result(ToolResult::Text(String::new()));
        assert!(!is_empty_renderable(&tool));
    }

    #[test]
    fn progress_payload_renders_unless_empty() {
        let progress = Message::new("p", None, "", MessageKind::Progress)
            .with_progress(ProgressPayload {
                kind: "bash_progress".to_string(),
                ..ProgressPayload::default()
            });
        assert!(!is_empty_renderable(&progress));

        let empty = Message::new("q", None, "", MessageKind::Progress)
            .with_progress(ProgressPayload::default());
        assert!(is_empty_renderable(&empty));
    }

    #[test]
    fn agent_id_requires_agent_progress_kind() {
        let payload = ProgressPayload {
            kind: "agent_progress".to_string(),
            agent_id: Some("agent-1".to_string()),
            ..ProgressPayload::default()
        };
        let progress = Message::new("p", None, "", MessageKind::Progress)
            .with_progress(payload.clone());
        assert_eq!(get_agent_id_from_progress(&progress), Some("agent-1"));

        let wrong_kind = Message::new("u", None, "", MessageKind::User).with_progress(payload);
        assert_eq!(get_agent_id_from_progress(&wrong_kind), None);

        let bash = Message::new("b", None, "", MessageKind::Progress).with_progress(
            ProgressPayload {
                kind: "bash_progress".to_string(),
                agent_id: Some("agent-1".to_string()),
                ..ProgressPayload::default()
            },
        );
        assert_eq!(get_agent_id_from_progress(&bash), None);
    }

    #[test]
    fn parent_id_accepts_legacy_field() {
        let message: Message = serde_json::from_value(json!({
            "uuid": "b",
            "parentId": "a",
            "timestamp": "2026-02-23T00:00:00Z",
            "type": "assistant"
        }))
        .expect("deserialize");
        assert_eq!(get_parent_id(&message), Some("a"));

        let mut empty_parent = user("c");
        empty_parent.parent_uuid = Some(String::new());
        assert_eq!(get_parent_id(&empty_parent), None);
    }

    #[test]
    fn text_of_block_content_joins_text_blocks() {
        let message = user("a").with_blocks(vec![
            ContentBlock::Text {
                text: "one".to_string(),
            },
            ContentBlock::ToolUse {
                id: None,
                name: "Read".to_string(),
                input: json!({}),
            },
            ContentBlock::Text {
                text: "two".to_string(),
            },
        ]);
        assert_eq!(message_text(&message).as_deref(), Some("one\ntwo"));
    }

    #[test]
    fn task_ids_pair_with_following_status() {
        let text = "<task-notification><task-id>a1</task-id><status>completed</status></task-notification>\n<task-notification><task-id> b2 </task-id><status>error</status></task-notification>\n<task-id>c3</task-id>";
        let refs = extract_task_ids(text);
        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0].task_id, "a1");
        assert_eq!(refs[0].status.as_deref(), Some("completed"));
        assert_eq!(refs[1].task_id, "b2");
        assert_eq!(refs[1].status.as_deref(), Some("error"));
        assert_eq!(refs[2].status, None);
    }

    #[test]
    fn structured_tool_result_fields_are_exposed() {
        let result: ToolResult = serde_json::from_value(json!({
            "isAsync": true,
            "agentId": "agent-1",
            "description": "scan repo",
            "extraField": 3
        }))
        .expect("deserialize");
        let fields = result.fields().expect("structured");
        assert_eq!(fields.is_async, Some(true));
        assert_eq!(fields.agent_id.as_deref(), Some("agent-1"));
        assert_eq!(fields.extra.get("extraField"), Some(&json!(3)));
    }
}
