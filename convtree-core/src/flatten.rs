use std::collections::{HashMap, HashSet};
use std::mem;

use crate::config::FlattenOptions;
use crate::diagnostics::DiagnosticSink;
use crate::group::{group_agent_progress, group_agent_tasks};
use crate::merge::{dedupe_messages, merge_command_outputs};
use crate::model::{
    AgentProgressGroups, AgentProgressSummary, AgentTaskGroups, FlattenedItem, FlattenedMessage,
    HiddenRun, Message,
};
use crate::tree::{OrderedMessage, reconstruct_tree};

#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedConversation {
    pub items: Vec<FlattenedItem>,
    pub task_groups: AgentTaskGroups,
    pub progress_groups: AgentProgressGroups,
}

pub fn flatten_conversation(
    messages: &[Message],
    hidden_ids: &HashSet<String>,
    options: &FlattenOptions,
    sink: &mut dyn DiagnosticSink,
) -> FlattenedConversation {
    let merged = merge_command_outputs(dedupe_messages(messages, sink));
    let task_groups = group_agent_tasks(&merged, options.task_window_ms);
    let progress_groups = group_agent_progress(&merged);
    let ordered = reconstruct_tree(&merged, options.orphan_recovery_ratio, sink);
    let items = compress_hidden_runs(&ordered, hidden_ids, &task_groups, &progress_groups);

    FlattenedConversation {
        items,
        task_groups,
        progress_groups,
    }
}

pub fn compress_hidden_runs(
    ordered: &[OrderedMessage<'_>],
    hidden_ids: &HashSet<String>,
    task_groups: &AgentTaskGroups,
    progress_groups: &AgentProgressGroups,
) -> Vec<FlattenedItem> {
    let task_members = task_groups
        .values()
        .flat_map(|group| group.member_ids.iter().map(String::as_str))
        .collect::<HashSet<_>>();
    let progress_members = progress_groups
        .values()
        .flat_map(|group| group.member_ids.iter().map(String::as_str))
        .collect::<HashSet<_>>();

    let mut items = Vec::with_capacity(ordered.len());
    let mut hidden_run = Vec::<String>::new();
    let mut original_index = 0;

    for entry in ordered {
        let uuid = entry.message.uuid.as_str();
        if hidden_ids.contains(uuid) {
            hidden_run.push(uuid.to_string());
            continue;
        }
        flush_hidden_run(&mut items, &mut hidden_run);

        let task_group = task_groups.get(uuid);
        let progress_group = progress_groups.get(uuid);
        items.push(FlattenedItem::Message(FlattenedMessage {
            message: entry.message.clone(),
            depth: entry.depth,
            original_index,
            is_group_leader: task_group.is_some(),
            is_group_member: task_group.is_none() && task_members.contains(uuid),
            is_progress_group_leader: progress_group.is_some(),
            is_progress_group_member: progress_group.is_none() && progress_members.contains(uuid),
            agent_task_group: task_group.map(|group| group.tasks.clone()),
            agent_progress_group: progress_group.map(|group| AgentProgressSummary {
                entries: group.entries.clone(),
                agent_id: group.agent_id.clone(),
            }),
        }));
        original_index += 1;
    }
    flush_hidden_run(&mut items, &mut hidden_run);

    items
}

fn flush_hidden_run(items: &mut Vec<FlattenedItem>, hidden_run: &mut Vec<String>) {
    if hidden_run.is_empty() {
        return;
    }

    let hidden_uuids = mem::take(hidden_run);
    items.push(FlattenedItem::HiddenPlaceholder(HiddenRun {
        hidden_count: hidden_uuids.len(),
        hidden_uuids,
    }));
}

pub fn build_uuid_to_index_map(items: &[FlattenedItem]) -> HashMap<String, usize> {
    items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| Some((item.uuid()?.to_string(), idx)))
        .collect()
}

pub fn find_group_leader_index(
    uuid: &str,
    items: &[FlattenedItem],
    task_groups: &AgentTaskGroups,
    progress_groups: &AgentProgressGroups,
) -> Option<usize> {
    let leader_id = task_groups
        .values()
        .find(|group| group.member_ids.contains(uuid))
        .map(|group| group.leader_id.as_str())
        .or_else(|| {
            progress_groups
                .values()
                .find(|group| group.member_ids.contains(uuid))
                .map(|group| group.leader_id.as_str())
        })?;

    items
        .iter()
        .position(|item| item.uuid() == Some(leader_id))
}
