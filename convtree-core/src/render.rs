use std::collections::HashMap;

use crate::classify::{is_empty_renderable, message_text, strip_system_tags};
use crate::flatten::{build_uuid_to_index_map, find_group_leader_index};
use crate::model::{
    AgentTask, Content, ContentBlock, FlattenedItem, FlattenedMessage, HiddenRun, Message,
    MessageKind, ProgressPayload, ThreadView, ToolResult,
};

const EMPTY_PLACEHOLDER: &str = "_No renderable content._";

pub fn render_markdown(view: &ThreadView) -> String {
    let mut output = String::new();
    output.push_str("# Thread\n\n");
    output.push_str(&format!("- Source: `{}`\n", view.source));
    output.push_str(&format!("- Items: `{}`\n", view.items.len()));
    for warning in &view.warnings {
        output.push_str(&format!("- Warning: {warning}\n"));
    }
    output.push('\n');

    if view.items.is_empty() {
        output.push_str("_No messages found._\n");
        return output;
    }

    let index = build_uuid_to_index_map(&view.items);
    for (idx, item) in view.items.iter().enumerate() {
        match item {
            FlattenedItem::Message(entry) => render_message(&mut output, idx, entry, view, &index),
            FlattenedItem::HiddenPlaceholder(run) => render_hidden(&mut output, idx, run),
        }
    }

    output
}

fn render_hidden(output: &mut String, idx: usize, run: &HiddenRun) {
    output.push_str(&format!("## {}. Hidden\n\n", idx + 1));
    let noun = if run.hidden_count == 1 {
        "message"
    } else {
        "messages"
    };
    output.push_str(&format!("_{} hidden {noun}_\n\n", run.hidden_count));
}

fn render_message(
    output: &mut String,
    idx: usize,
    entry: &FlattenedMessage,
    view: &ThreadView,
    index: &HashMap<String, usize>,
) {
    output.push_str(&format!(
        "## {}. {}\n\n",
        idx + 1,
        title(entry.message.kind)
    ));
    if entry.depth > 0 {
        output.push_str(&format!("- Depth: `{}`\n\n", entry.depth));
    }

    if entry.is_group_member || entry.is_progress_group_member {
        let uuid = entry.message.uuid.as_str();
        match find_group_leader_index(uuid, &view.items, &view.task_groups, &view.progress_groups)
        {
            Some(leader) => output.push_str(&format!("_Grouped under item {}._\n\n", leader + 1)),
            None => output.push_str("_Grouped with an earlier message._\n\n"),
        }
        return;
    }

    if is_empty_renderable(&entry.message) {
        output.push_str(EMPTY_PLACEHOLDER);
    } else {
        output.push_str(&body_text(&entry.message));
    }
    output.push_str("\n\n");

    if let Some(tasks) = &entry.agent_task_group {
        render_tasks(output, tasks);
    }
    if let Some(progress) = &entry.agent_progress_group {
        let last = progress
            .entries
            .last()
            .and_then(|last| index.get(&last.uuid))
            .map_or_else(String::new, |position| format!(", last at item {}", position + 1));
        output.push_str(&format!(
            "- Agent `{}` progress: {} updates{last}\n\n",
            progress.agent_id,
            progress.entries.len()
        ));
    }
}

fn render_tasks(output: &mut String, tasks: &[AgentTask]) {
    output.push_str("Agent tasks:\n\n");
    for task in tasks {
        output.push_str(&format!(
            "- `{}` {} ({})\n",
            task.agent_id, task.description, task.status
        ));
    }
    output.push('\n');
}

fn title(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::User => "User",
        MessageKind::Assistant => "Assistant",
        MessageKind::System => "System",
        MessageKind::Summary => "Summary",
        MessageKind::FileHistorySnapshot => "File Snapshot",
        MessageKind::Progress => "Progress",
        MessageKind::QueueOperation => "Queue",
    }
}

fn body_text(message: &Message) -> String {
    if let Some(text) = message_text(message) {
        let stripped = strip_system_tags(&text);
        if !stripped.trim().is_empty() {
            return stripped.trim().to_string();
        }
    }

    let mut lines = match &message.content {
        Some(Content::Blocks(blocks)) => blocks.iter().filter_map(block_summary).collect(),
        Some(Content::Text(_)) | None => Vec::new(),
    };
    if lines.is_empty()
        && let Some(tool_use) = &message.tool_use
    {
        lines.push(format!("Tool call: `{}`", tool_use.name));
    }
    if lines.is_empty()
        && let Some(result) = &message.tool_use_result
    {
        lines.push(tool_result_summary(result));
    }
    if lines.is_empty()
        && let Some(data) = message.data.as_ref().filter(|data| !data.is_empty())
    {
        lines.push(progress_summary(data));
    }

    if lines.is_empty() {
        return "_Non-text content._".to_string();
    }
    lines.join("\n")
}

fn block_summary(block: &ContentBlock) -> Option<String> {
    match block {
        ContentBlock::ToolUse { name, .. } => Some(format!("Tool call: `{name}`")),
        ContentBlock::ToolResult { .. } => Some("Tool result".to_string()),
        ContentBlock::Thinking { thinking } if !thinking.trim().is_empty() => {
            Some(thinking.trim().to_string())
        }
        ContentBlock::Image { .. } => Some("Image attachment".to_string()),
        ContentBlock::Text { .. } | ContentBlock::Thinking { .. } | ContentBlock::Other => None,
    }
}

fn tool_result_summary(result: &ToolResult) -> String {
    let detail = match result {
        ToolResult::Text(text) => text.lines().next().map(str::trim),
        ToolResult::Structured(fields) => fields
            .description
            .as_deref()
            .or(fields.status.as_deref()),
        ToolResult::Other(_) => None,
    };

    match detail.filter(|detail| !detail.is_empty()) {
        Some(detail) => format!("Tool result: {detail}"),
        None => "Tool result".to_string(),
    }
}

fn progress_summary(data: &ProgressPayload) -> String {
    let kind = if data.kind.is_empty() {
        "update"
    } else {
        data.kind.as_str()
    };
    match &data.agent_id {
        Some(agent_id) => format!("Progress: `{kind}` from `{agent_id}`"),
        None => format!("Progress: `{kind}`"),
    }
}
