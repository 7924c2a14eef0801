use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::config::FlattenOptions;
use crate::diagnostics::Diagnostic;
use crate::error::{ConvtreeError, Result};
use crate::flatten::flatten_conversation;
use crate::jsonl;
use crate::model::{Message, ResolvedThread, ThreadView};
use crate::provider::{ClaudeProvider, ProviderRoots};
use crate::render;
use crate::uri::{ThreadTarget, ThreadUri};

pub fn resolve_thread(uri: &ThreadUri, roots: &ProviderRoots) -> Result<ResolvedThread> {
    ClaudeProvider::new(&roots.claude_root).resolve(&uri.session_id)
}

pub fn read_thread_raw(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|source| ConvtreeError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if bytes.is_empty() {
        return Err(ConvtreeError::EmptyThreadFile {
            path: path.to_path_buf(),
        });
    }

    String::from_utf8(bytes).map_err(|_| ConvtreeError::NonUtf8ThreadFile {
        path: path.to_path_buf(),
    })
}

pub fn build_thread_view(
    source: impl Into<String>,
    messages: &[Message],
    hidden_ids: &HashSet<String>,
    options: &FlattenOptions,
) -> ThreadView {
    let mut diagnostics = Vec::<Diagnostic>::new();
    let flattened = flatten_conversation(messages, hidden_ids, options, &mut diagnostics);

    let warnings = diagnostics
        .iter()
        .map(|diagnostic| {
            match diagnostic {
                Diagnostic::DuplicateId { .. } => tracing::debug!("{diagnostic}"),
                Diagnostic::CycleDetected { .. }
                | Diagnostic::RootMissing { .. }
                | Diagnostic::OrphansRecovered { .. }
                | Diagnostic::UnreachableSkipped { .. } => tracing::warn!("{diagnostic}"),
            }
            diagnostic.to_string()
        })
        .collect();

    ThreadView {
        source: source.into(),
        items: flattened.items,
        task_groups: flattened.task_groups,
        progress_groups: flattened.progress_groups,
        warnings,
    }
}

pub fn resolve_thread_view(
    target: &ThreadTarget,
    roots: &ProviderRoots,
    hidden_ids: &HashSet<String>,
    options: &FlattenOptions,
) -> Result<ThreadView> {
    let uri = match target {
        ThreadTarget::Uri(uri) => uri,
        ThreadTarget::Path(path) => return load_thread_view(path, hidden_ids, options),
    };

    let resolved = resolve_thread(uri, roots)?;
    let mut warnings = resolved.metadata.warnings;
    for warning in &warnings {
        tracing::warn!("{warning}");
    }

    let mut view = load_thread_view(&resolved.path, hidden_ids, options)?;
    warnings.append(&mut view.warnings);
    view.warnings = warnings;
    Ok(view)
}

pub fn load_thread_view(
    path: &Path,
    hidden_ids: &HashSet<String>,
    options: &FlattenOptions,
) -> Result<ThreadView> {
    let raw = read_thread_raw(path)?;
    let messages = jsonl::parse_session(path, &raw)?;
    tracing::debug!("loaded {} messages from {}", messages.len(), path.display());

    Ok(build_thread_view(
        path.display().to_string(),
        &messages,
        hidden_ids,
        options,
    ))
}

pub fn thread_view_to_raw_json(view: &ThreadView) -> Result<String> {
    serde_json::to_string_pretty(view).map_err(|err| ConvtreeError::Serialization(err.to_string()))
}

pub fn render_thread_markdown(view: &ThreadView) -> String {
    render::render_markdown(view)
}
