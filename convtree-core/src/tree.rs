use std::collections::{HashMap, HashSet};

use crate::classify::{get_parent_id, timestamp_millis};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::model::Message;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderedMessage<'a> {
    pub message: &'a Message,
    pub depth: usize,
}

#[allow(clippy::cast_precision_loss)]
pub fn reconstruct_tree<'a>(
    messages: &'a [Message],
    orphan_recovery_ratio: f64,
    sink: &mut dyn DiagnosticSink,
) -> Vec<OrderedMessage<'a>> {
    let millis = messages
        .iter()
        .map(|message| timestamp_millis(&message.timestamp))
        .collect::<Vec<_>>();

    let mut children = HashMap::<Option<&str>, Vec<usize>>::new();
    for (idx, message) in messages.iter().enumerate() {
        children
            .entry(get_parent_id(message))
            .or_default()
            .push(idx);
    }
    for siblings in children.values_mut() {
        siblings.sort_by_key(|&idx| millis[idx]);
    }

    let Some(roots) = children.get(&None) else {
        record_cycles(messages, 0..messages.len(), sink);
        if !messages.is_empty() {
            sink.record(Diagnostic::RootMissing {
                count: messages.len(),
            });
        }
        return messages
            .iter()
            .map(|message| OrderedMessage { message, depth: 0 })
            .collect();
    };

    let mut ordered = Vec::with_capacity(messages.len());
    let mut visited = HashSet::<usize>::with_capacity(messages.len());
    let mut stack = roots.iter().rev().map(|&idx| (idx, 0)).collect::<Vec<_>>();

    while let Some((idx, depth)) = stack.pop() {
        // Only reachable twice when the input still carries duplicate ids.
        if !visited.insert(idx) {
            continue;
        }

        let message = &messages[idx];
        ordered.push(OrderedMessage { message, depth });

        if let Some(replies) = children.get(&Some(message.uuid.as_str())) {
            stack.extend(replies.iter().rev().map(|&child| (child, depth + 1)));
        }
    }

    let unvisited = messages.len() - visited.len();
    if unvisited == 0 {
        return ordered;
    }

    let mut orphans = (0..messages.len())
        .filter(|idx| !visited.contains(idx))
        .collect::<Vec<_>>();
    record_cycles(messages, orphans.iter().copied(), sink);

    if (visited.len() as f64) < orphan_recovery_ratio * messages.len() as f64 {
        orphans.sort_by_key(|&idx| millis[idx]);
        ordered.extend(orphans.into_iter().map(|idx| OrderedMessage {
            message: &messages[idx],
            depth: 0,
        }));
        sink.record(Diagnostic::OrphansRecovered { count: unvisited });
    } else {
        sink.record(Diagnostic::UnreachableSkipped { count: unvisited });
    }

    ordered
}

// Follows parent links from each start and reports every cycle once, naming
// the first message of the cycle the walk runs into.
fn record_cycles(
    messages: &[Message],
    starts: impl Iterator<Item = usize>,
    sink: &mut dyn DiagnosticSink,
) {
    let positions = messages
        .iter()
        .enumerate()
        .map(|(idx, message)| (message.uuid.as_str(), idx))
        .collect::<HashMap<_, _>>();
    let mut settled = HashSet::<usize>::new();

    for start in starts {
        let mut path = HashSet::<usize>::new();
        let mut current = Some(start);

        while let Some(idx) = current {
            if settled.contains(&idx) {
                break;
            }
            if !path.insert(idx) {
                sink.record(Diagnostic::CycleDetected {
                    uuid: messages[idx].uuid.clone(),
                });
                break;
            }
            current = get_parent_id(&messages[idx])
                .and_then(|parent| positions.get(parent).copied());
        }

        settled.extend(path);
    }
}
