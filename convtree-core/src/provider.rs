use std::env;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use dirs::home_dir;
use serde::Deserialize;
use serde_json::Value;
use walkdir::WalkDir;

use crate::error::{ConvtreeError, Result};
use crate::model::{ResolutionMeta, ResolvedThread};

const HEADER_SCAN_LINES: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRoots {
    pub claude_root: PathBuf,
}

impl ProviderRoots {
    pub fn from_env_or_home() -> Result<Self> {
        // Precedence:
        // 1) CLAUDE_CONFIG_DIR (official Claude Code config/data root env)
        // 2) ~/.claude (Claude default)
        let claude_root = match env::var_os("CLAUDE_CONFIG_DIR").filter(|path| !path.is_empty()) {
            Some(path) => PathBuf::from(path),
            None => home_dir()
                .ok_or(ConvtreeError::HomeDirectoryNotFound)?
                .join(".claude"),
        };

        Ok(Self { claude_root })
    }
}

#[derive(Debug, Deserialize)]
struct SessionsIndex {
    #[serde(default)]
    entries: Vec<SessionIndexEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionIndexEntry {
    session_id: String,
    full_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LookupSource {
    SessionsIndex,
    Filename,
    HeaderScan,
}

impl LookupSource {
    const ORDER: [Self; 3] = [Self::SessionsIndex, Self::Filename, Self::HeaderScan];

    fn label(self) -> &'static str {
        match self {
            Self::SessionsIndex => "claude:sessions-index",
            Self::Filename => "claude:filename",
            Self::HeaderScan => "claude:header-scan",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClaudeProvider {
    root: PathBuf,
}

impl ClaudeProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, session_id: &str) -> Result<ResolvedThread> {
        let projects = self.root.join("projects");
        let files = list_files(&projects);

        for source in LookupSource::ORDER {
            let hits = match source {
                LookupSource::SessionsIndex => index_hits(&files, session_id),
                LookupSource::Filename => filename_hits(&files, session_id),
                LookupSource::HeaderScan => header_hits(&files, session_id),
            };
            let count = hits.len();
            let Some(selected) = latest(hits) else {
                continue;
            };

            tracing::debug!(
                "resolved session {} via {} ({} candidates)",
                session_id,
                source.label(),
                count
            );
            let mut metadata = ResolutionMeta {
                source: source.label().to_string(),
                candidate_count: count,
                warnings: Vec::new(),
            };
            if count > 1 {
                metadata.warnings.push(format!(
                    "multiple matches found ({count}) for session_id={session_id}; selected latest: {}",
                    selected.display()
                ));
            }

            return Ok(ResolvedThread {
                session_id: session_id.to_string(),
                path: selected,
                metadata,
            });
        }

        Err(ConvtreeError::ThreadNotFound {
            session_id: session_id.to_string(),
            searched_roots: vec![projects],
        })
    }
}

fn list_files(root: &Path) -> Vec<PathBuf> {
    if !root.exists() {
        return Vec::new();
    }

    WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .collect()
}

fn has_file_name(path: &Path, expected: &str) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name == expected)
}

fn index_hits(files: &[PathBuf], session_id: &str) -> Vec<PathBuf> {
    files
        .iter()
        .filter(|path| has_file_name(path, "sessions-index.json"))
        .filter_map(|path| fs::read_to_string(path).ok())
        .filter_map(|content| serde_json::from_str::<SessionsIndex>(&content).ok())
        .flat_map(|index| index.entries)
        .filter(|entry| entry.session_id == session_id)
        .filter_map(|entry| entry.full_path)
        .filter(|path| path.exists())
        .collect()
}

fn filename_hits(files: &[PathBuf], session_id: &str) -> Vec<PathBuf> {
    let needle = format!("{session_id}.jsonl");
    files
        .iter()
        .filter(|path| has_file_name(path, &needle))
        .cloned()
        .collect()
}

fn header_hits(files: &[PathBuf], session_id: &str) -> Vec<PathBuf> {
    files
        .iter()
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == "jsonl")
        })
        .filter(|path| header_mentions_session(path, session_id))
        .cloned()
        .collect()
}

fn header_mentions_session(path: &Path, session_id: &str) -> bool {
    let Ok(file) = fs::File::open(path) else {
        return false;
    };

    BufReader::new(file)
        .lines()
        .take(HEADER_SCAN_LINES)
        .map_while(std::result::Result::ok)
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str::<Value>(&line).ok())
        .any(|value| value.get("sessionId").and_then(Value::as_str) == Some(session_id))
}

fn latest(paths: Vec<PathBuf>) -> Option<PathBuf> {
    paths.into_iter().max_by_key(|path| {
        fs::metadata(path)
            .and_then(|meta| meta.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH)
    })
}
