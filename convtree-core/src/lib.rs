pub mod classify;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod flatten;
pub mod group;
pub mod jsonl;
pub mod merge;
pub mod model;
pub mod provider;
pub mod render;
pub mod service;
pub mod tree;
pub mod uri;

pub use config::FlattenOptions;
pub use diagnostics::{Diagnostic, DiagnosticSink, NoopSink};
pub use error::{ConvtreeError, Result};
pub use flatten::{
    FlattenedConversation, build_uuid_to_index_map, compress_hidden_runs, find_group_leader_index,
    flatten_conversation,
};
pub use group::{group_agent_progress, group_agent_tasks};
pub use merge::{dedupe_messages, merge_command_outputs};
pub use model::{
    AgentProgressGroup, AgentProgressGroups, AgentTask, AgentTaskGroup, AgentTaskGroups,
    AgentTaskStatus, FlattenedItem, FlattenedMessage, HiddenRun, Message, MessageKind,
    ResolutionMeta, ResolvedThread, ThreadView,
};
pub use provider::ProviderRoots;
pub use service::{
    build_thread_view, load_thread_view, read_thread_raw, render_thread_markdown, resolve_thread,
    resolve_thread_view, thread_view_to_raw_json,
};
pub use tree::{OrderedMessage, reconstruct_tree};
pub use uri::{ThreadTarget, ThreadUri};
