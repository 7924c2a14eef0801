use std::collections::BTreeSet;

use crate::classify::get_agent_id_from_progress;
use crate::model::{AgentProgressEntry, AgentProgressGroup, AgentProgressGroups, Message};

#[derive(Debug, Clone, PartialEq, Eq)]
enum ProgressScan {
    Idle,
    InRun { agent_id: String, leader_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ScanAction {
    Skip,
    Open,
    Append { leader_id: String },
}

impl ProgressScan {
    fn step(&self, message: &Message) -> (Self, ScanAction) {
        let Some(agent_id) = get_agent_id_from_progress(message) else {
            return (Self::Idle, ScanAction::Skip);
        };

        match self {
            Self::InRun {
                agent_id: current,
                leader_id,
            } if current == agent_id => (
                self.clone(),
                ScanAction::Append {
                    leader_id: leader_id.clone(),
                },
            ),
            Self::InRun { .. } | Self::Idle => (
                Self::InRun {
                    agent_id: agent_id.to_string(),
                    leader_id: message.uuid.clone(),
                },
                ScanAction::Open,
            ),
        }
    }
}

pub fn group_agent_progress(messages: &[Message]) -> AgentProgressGroups {
    let mut groups = AgentProgressGroups::new();
    let mut state = ProgressScan::Idle;

    for message in messages {
        let (next, action) = state.step(message);
        match action {
            ScanAction::Skip => {}
            ScanAction::Open => {
                if let ProgressScan::InRun { agent_id, leader_id } = &next {
                    groups.insert(
                        leader_id.clone(),
                        AgentProgressGroup {
                            leader_id: leader_id.clone(),
                            agent_id: agent_id.clone(),
                            entries: vec![progress_entry(message)],
                            member_ids: BTreeSet::from([message.uuid.clone()]),
                        },
                    );
                }
            }
            ScanAction::Append { leader_id } => {
                if let Some(group) = groups.get_mut(&leader_id) {
                    group.entries.push(progress_entry(message));
                    group.member_ids.insert(message.uuid.clone());
                }
            }
        }
        state = next;
    }

    groups
}

fn progress_entry(message: &Message) -> AgentProgressEntry {
    AgentProgressEntry {
        data: message.data.clone().unwrap_or_default(),
        timestamp: message.timestamp.clone(),
        uuid: message.uuid.clone(),
    }
}
