use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ConvtreeError, Result};

static SESSION_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadUri {
    pub session_id: String,
}

impl ThreadUri {
    pub fn parse(input: &str) -> Result<Self> {
        input.parse()
    }
}

impl fmt::Display for ThreadUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "claude://{}", self.session_id)
    }
}

impl FromStr for ThreadUri {
    type Err = ConvtreeError;

    fn from_str(input: &str) -> Result<Self> {
        let (scheme, target) = input
            .split_once("://")
            .ok_or_else(|| ConvtreeError::InvalidUri(input.to_string()))?;

        if scheme != "claude" {
            return Err(ConvtreeError::UnsupportedScheme(scheme.to_string()));
        }
        if target.is_empty() || target.contains('/') {
            return Err(ConvtreeError::InvalidUri(input.to_string()));
        }
        if !SESSION_ID_RE.is_match(target) {
            return Err(ConvtreeError::InvalidSessionId(target.to_string()));
        }

        Ok(Self {
            session_id: target.to_ascii_lowercase(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadTarget {
    Uri(ThreadUri),
    Path(PathBuf),
}

impl ThreadTarget {
    pub fn parse(input: &str) -> Result<Self> {
        if input.contains("://") {
            ThreadUri::parse(input).map(Self::Uri)
        } else {
            Ok(Self::Path(PathBuf::from(input)))
        }
    }
}

impl fmt::Display for ThreadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uri(uri) => write!(f, "{uri}"),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}
