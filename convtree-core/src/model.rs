use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    User,
    Assistant,
    System,
    Summary,
    FileHistorySnapshot,
    Progress,
    QueueOperation,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
            Self::Summary => write!(f, "summary"),
            Self::FileHistorySnapshot => write!(f, "file-history-snapshot"),
            Self::Progress => write!(f, "progress"),
            Self::QueueOperation => write!(f, "queue-operation"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    ToolUse {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_use_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
    Image {
        #[serde(default)]
        source: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    #[serde(default)]
    pub input: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_async: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResult {
    Text(String),
    Structured(ToolResultFields),
    Other(Value),
}

impl ToolResult {
    pub fn fields(&self) -> Option<&ToolResultFields> {
        match self {
            Self::Structured(fields) => Some(fields),
            Self::Text(_) | Self::Other(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPayload {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProgressPayload {
    pub fn is_empty(&self) -> bool {
        self.kind.is_empty() && self.agent_id.is_none() && self.extra.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub uuid: String,
    // Older logs use `parentId`.
    #[serde(default, alias = "parentId", skip_serializing_if = "Option::is_none")]
    pub parent_uuid: Option<String>,
    #[serde(default)]
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use: Option<ToolInvocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use_result: Option<ToolResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_sidechain: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ProgressPayload>,
}

impl Message {
    pub fn new(
        uuid: impl Into<String>,
        parent_uuid: Option<&str>,
        timestamp: impl Into<String>,
        kind: MessageKind,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            parent_uuid: parent_uuid.map(ToString::to_string),
            timestamp: timestamp.into(),
            kind,
            content: None,
            tool_use: None,
            tool_use_result: None,
            is_sidechain: None,
            data: None,
        }
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.content = Some(Content::Text(text.into()));
        self
    }

    #[must_use]
    pub fn with_blocks(mut self, blocks: Vec<ContentBlock>) -> Self {
        self.content = Some(Content::Blocks(blocks));
        self
    }

    #[must_use]
    pub fn with_tool_result(mut self, result: ToolResult) -> Self {
        self.tool_use_result = Some(result);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, data: ProgressPayload) -> Self {
        self.data = Some(data);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentTaskStatus {
    AsyncLaunched,
    Completed,
    Error,
}

impl fmt::Display for AgentTaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AsyncLaunched => write!(f, "async_launched"),
            Self::Completed => write!(f, "completed"),
            Self::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentTask {
    pub agent_id: String,
    pub description: String,
    pub status: AgentTaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentTaskGroup {
    pub leader_id: String,
    pub tasks: Vec<AgentTask>,
    pub member_ids: BTreeSet<String>,
}

pub type AgentTaskGroups = BTreeMap<String, AgentTaskGroup>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentProgressEntry {
    pub data: ProgressPayload,
    pub timestamp: String,
    pub uuid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentProgressGroup {
    pub leader_id: String,
    pub agent_id: String,
    pub entries: Vec<AgentProgressEntry>,
    pub member_ids: BTreeSet<String>,
}

pub type AgentProgressGroups = BTreeMap<String, AgentProgressGroup>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentProgressSummary {
    pub entries: Vec<AgentProgressEntry>,
    pub agent_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlattenedMessage {
    pub message: Message,
    pub depth: usize,
    pub original_index: usize,
    pub is_group_leader: bool,
    pub is_group_member: bool,
    pub is_progress_group_leader: bool,
    pub is_progress_group_member: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_task_group: Option<Vec<AgentTask>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_progress_group: Option<AgentProgressSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HiddenRun {
    pub hidden_count: usize,
    pub hidden_uuids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FlattenedItem {
    Message(FlattenedMessage),
    HiddenPlaceholder(HiddenRun),
}

impl FlattenedItem {
    pub fn uuid(&self) -> Option<&str> {
        match self {
            Self::Message(item) => Some(item.message.uuid.as_str()),
            Self::HiddenPlaceholder(_) => None,
        }
    }

    pub fn as_message(&self) -> Option<&FlattenedMessage> {
        match self {
            Self::Message(item) => Some(item),
            Self::HiddenPlaceholder(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionMeta {
    pub source: String,
    pub candidate_count: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedThread {
    pub session_id: String,
    pub path: PathBuf,
    pub metadata: ResolutionMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadView {
    pub source: String,
    pub items: Vec<FlattenedItem>,
    pub task_groups: AgentTaskGroups,
    pub progress_groups: AgentProgressGroups,
    #[serde(skip_serializing)]
    pub warnings: Vec<String>,
}
