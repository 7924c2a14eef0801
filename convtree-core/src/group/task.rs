use std::collections::{BTreeSet, HashMap};

use crate::classify::{extract_task_ids, message_text, timestamp_millis, tool_result_fields};
use crate::model::{
    AgentTask, AgentTaskGroup, AgentTaskGroups, AgentTaskStatus, Message, MessageKind,
};

const STATUS_COMPLETED: &str = "completed";
const STATUS_ERROR: &str = "error";

// The window is measured from the group's first launch and never slides.
pub fn group_agent_tasks(messages: &[Message], window_ms: i64) -> AgentTaskGroups {
    let mut launches = messages
        .iter()
        .filter_map(|message| {
            let task = launched_task(message)?;
            Some((message, task, timestamp_millis(&message.timestamp)))
        })
        .collect::<Vec<_>>();
    launches.sort_by_key(|(_, _, millis)| *millis);

    let mut groups = AgentTaskGroups::new();
    let mut leader_by_agent = HashMap::<String, String>::new();
    let mut anchor = None::<(i64, String)>;

    for (message, task, millis) in launches {
        let joins_anchor = anchor
            .as_ref()
            .is_some_and(|(anchor_millis, _)| millis - anchor_millis <= window_ms);
        if !joins_anchor {
            anchor = Some((millis, message.uuid.clone()));
        }
        let Some((_, leader_id)) = &anchor else {
            continue;
        };

        leader_by_agent.insert(task.agent_id.clone(), leader_id.clone());
        let group = groups
            .entry(leader_id.clone())
            .or_insert_with(|| AgentTaskGroup {
                leader_id: leader_id.clone(),
                tasks: Vec::new(),
                member_ids: BTreeSet::new(),
            });
        group.member_ids.insert(message.uuid.clone());
        group.tasks.push(task);
    }

    if groups.is_empty() {
        return groups;
    }

    for message in messages {
        for (agent_id, status) in completion_refs(message) {
            let Some(group) = leader_by_agent
                .get(&agent_id)
                .and_then(|leader_id| groups.get_mut(leader_id))
            else {
                continue;
            };

            group.member_ids.insert(message.uuid.clone());
            if let Some(task) = group
                .tasks
                .iter_mut()
                .find(|task| task.agent_id == agent_id)
            {
                task.status = status;
            }
        }
    }

    groups
}

fn launched_task(message: &Message) -> Option<AgentTask> {
    let fields = tool_result_fields(message)?;
    if fields.is_async != Some(true) {
        return None;
    }

    Some(AgentTask {
        agent_id: fields.agent_id.clone()?,
        description: fields.description.clone().unwrap_or_default(),
        status: AgentTaskStatus::AsyncLaunched,
        output_file: fields.output_file.clone(),
        prompt: fields.prompt.clone(),
    })
}

fn completion_refs(message: &Message) -> Vec<(String, AgentTaskStatus)> {
    if let Some(fields) = tool_result_fields(message)
        && let Some(agent_id) = fields.agent_id.as_deref()
    {
        let status = fields.status.as_deref();
        let reports = match fields.is_async {
            Some(false) => true,
            None => matches!(status, Some(STATUS_COMPLETED | STATUS_ERROR)),
            Some(true) => false,
        };
        if reports {
            return vec![(agent_id.to_string(), status_from(status))];
        }
    }

    match message.kind {
        MessageKind::User | MessageKind::QueueOperation => message_text(message)
            .map(|text| {
                extract_task_ids(&text)
                    .into_iter()
                    .map(|reference| {
                        let status = status_from(reference.status.as_deref());
                        (reference.task_id, status)
                    })
                    .collect()
            })
            .unwrap_or_default(),
        MessageKind::Assistant
        | MessageKind::System
        | MessageKind::Summary
        | MessageKind::FileHistorySnapshot
        | MessageKind::Progress => Vec::new(),
    }
}

fn status_from(status: Option<&str>) -> AgentTaskStatus {
    if status == Some(STATUS_ERROR) {
        AgentTaskStatus::Error
    } else {
        AgentTaskStatus::Completed
    }
}
