use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::classify::{get_parent_id, has_command_name, message_text};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::model::{Content, ContentBlock, Message};

static STDOUT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<local-command-stdout>([\s\S]*?)</local-command-stdout>").expect("valid regex")
});
static CAVEAT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<local-command-caveat>[\s\S]*?</local-command-caveat>").expect("valid regex")
});

// Last value wins, kept at the position of the first occurrence.
pub fn dedupe_messages(messages: &[Message], sink: &mut dyn DiagnosticSink) -> Vec<Message> {
    let mut positions = HashMap::<&str, usize>::with_capacity(messages.len());
    let mut deduped = Vec::<Message>::with_capacity(messages.len());

    for message in messages {
        if let Some(&idx) = positions.get(message.uuid.as_str()) {
            sink.record(Diagnostic::DuplicateId {
                uuid: message.uuid.clone(),
            });
            deduped[idx] = message.clone();
            continue;
        }

        positions.insert(message.uuid.as_str(), deduped.len());
        deduped.push(message.clone());
    }

    deduped
}

pub fn merge_command_outputs(messages: Vec<Message>) -> Vec<Message> {
    let plan = {
        let positions = messages
            .iter()
            .enumerate()
            .map(|(idx, message)| (message.uuid.as_str(), idx))
            .collect::<HashMap<_, _>>();

        messages
            .iter()
            .enumerate()
            .filter_map(|(idx, message)| {
                let text = message_text(message)?;
                if !is_output_only(&text) {
                    return None;
                }
                let parent_idx = *positions.get(get_parent_id(message)?)?;
                let parent_text = message_text(&messages[parent_idx])?;
                if !has_command_name(&parent_text) {
                    return None;
                }
                Some((idx, parent_idx, text.into_owned()))
            })
            .collect::<Vec<_>>()
    };

    if plan.is_empty() {
        return messages;
    }

    let mut messages = messages;
    let mut removed = HashSet::<usize>::with_capacity(plan.len());
    let mut redirects = HashMap::<String, String>::with_capacity(plan.len());

    for (idx, parent_idx, raw) in plan {
        append_output(&mut messages[parent_idx], &raw);
        removed.insert(idx);
        redirects.insert(
            messages[idx].uuid.clone(),
            messages[parent_idx].uuid.clone(),
        );
    }

    messages
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| !removed.contains(idx))
        .map(|(_, mut message)| {
            if let Some(target) = get_parent_id(&message).and_then(|parent| redirects.get(parent))
            {
                message.parent_uuid = Some(target.clone());
            }
            message
        })
        .collect()
}

fn is_output_only(text: &str) -> bool {
    let without_stdout = STDOUT_RE.replace_all(text, "");
    let remainder = CAVEAT_RE.replace_all(&without_stdout, "");
    if !remainder.trim().is_empty() {
        return false;
    }

    STDOUT_RE.captures_iter(text).any(|caps| {
        caps.get(1)
            .is_some_and(|output| !output.as_str().trim().is_empty())
    })
}

fn append_output(parent: &mut Message, raw: &str) {
    if parent.content.is_none() {
        parent.content = Some(Content::Text(raw.to_string()));
        return;
    }

    match &mut parent.content {
        Some(Content::Text(text)) => {
            text.push('\n');
            text.push_str(raw);
        }
        Some(Content::Blocks(blocks)) => {
            let first_text = blocks.iter_mut().find_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                _ => None,
            });
            match first_text {
                Some(text) => {
                    text.push('\n');
                    text.push_str(raw);
                }
                None => blocks.push(ContentBlock::Text {
                    text: raw.to_string(),
                }),
            }
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use crate::diagnostics::Diagnostic;
    use crate::merge::{dedupe_messages, merge_command_outputs};
    use crate::model::{Content, ContentBlock, Message, MessageKind};

    const COMMAND: &str = "<command-name>/cost</command-name>";
    const OUTPUT: &str = "<local-command-stdout>42 tokens</local-command-stdout>";

    fn user(uuid: &str, parent: Option<&str>, ts: &str) -> Message {
        Message::new(uuid, parent, ts, MessageKind::User)
    }

    #[test]
    fn dedupe_keeps_first_position_and_last_value() {
        let messages = vec![
            user("a", None, "2026-02-23T00:00:00Z").with_text("old"),
            user("b", Some("a"), "2026-02-23T00:00:01Z"),
            user("a", None, "2026-02-23T00:00:00Z").with_text("new"),
        ];
        let mut diagnostics = Vec::new();

        let deduped = dedupe_messages(&messages, &mut diagnostics);

        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].uuid, "a");
        assert_eq!(deduped[0].content, Some(Content::Text("new".to_string())));
        assert_eq!(deduped[1].uuid, "b");
        assert_eq!(
            diagnostics,
            vec![Diagnostic::DuplicateId {
                uuid: "a".to_string()
            }]
        );
    }

    #[test]
    fn stdout_folds_into_string_command() {
        let merged = merge_command_outputs(vec![
            user("a", None, "2026-02-23T00:00:00Z").with_text(COMMAND),
            user("b", Some("a"), "2026-02-23T00:00:01Z").with_text(OUTPUT),
        ]);

        assert_eq!(merged.len(), 1);
        assert_eq!(
            merged[0].content,
            Some(Content::Text(format!("{COMMAND}\n{OUTPUT}")))
        );
    }

    #[test]
    fn stdout_with_caveat_still_folds() {
        let merged = merge_command_outputs(vec![
            user("a", None, "2026-02-23T00:00:00Z").with_text(COMMAND),
            user("b", Some("a"), "2026-02-23T00:00:01Z").with_text(format!(
                "<local-command-caveat>Caveat</local-command-caveat>\n{OUTPUT}"
            )),
        ]);

        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn stdout_folds_into_first_text_block() {
        let merged = merge_command_outputs(vec![
            user("a", None, "2026-02-23T00:00:00Z").with_blocks(vec![
                ContentBlock::Text {
                    text: COMMAND.to_string(),
                },
                ContentBlock::Text {
                    text: "second".to_string(),
                },
            ]),
            user("b", Some("a"), "2026-02-23T00:00:01Z").with_text(OUTPUT),
        ]);

        let Some(Content::Blocks(blocks)) = &merged[0].content else {
            panic!("expected block content");
        };
        assert_eq!(
            blocks[0],
            ContentBlock::Text {
                text: format!("{COMMAND}\n{OUTPUT}")
            }
        );
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn empty_or_unrelated_output_is_left_alone() {
        let messages = vec![
            user("a", None, "2026-02-23T00:00:00Z").with_text(COMMAND),
            user("b", Some("a"), "2026-02-23T00:00:01Z")
                .with_text("<local-command-stdout>  </local-command-stdout>"),
            user("c", Some("b"), "2026-02-23T00:00:02Z").with_text(format!("{OUTPUT} and more")),
            user("d", Some("c"), "2026-02-23T00:00:03Z").with_text("plain"),
            user("e", Some("d"), "2026-02-23T00:00:04Z").with_text(OUTPUT),
            user("f", Some("missing"), "2026-02-23T00:00:05Z").with_text(OUTPUT),
        ];

        let merged = merge_command_outputs(messages.clone());
        assert_eq!(merged, messages);
    }

    #[test]
    fn followers_of_folded_output_are_reparented() {
        let merged = merge_command_outputs(vec![
            user("a", None, "2026-02-23T00:00:00Z").with_text(COMMAND),
            user("b", Some("a"), "2026-02-23T00:00:01Z").with_text(OUTPUT),
            Message::new("c", Some("b"), "2026-02-23T00:00:02Z", MessageKind::Assistant)
                .with_text("next"),
        ]);

        let uuids = merged
            .iter()
            .map(|message| message.uuid.as_str())
            .collect::<Vec<_>>();
        assert_eq!(uuids, vec!["a", "c"]);
        assert_eq!(merged[1].parent_uuid.as_deref(), Some("a"));
    }
}
