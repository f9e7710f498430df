use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors produced when parsing or extending a [`RemotePath`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("parent directory traversal not allowed: {0}")]
    ParentTraversal(String),

    #[error("empty path segment")]
    EmptySegment,
}

/// Absolute, slash-separated path on the remote store.
///
/// Always starts with `/`, never ends with `/` unless it is the root, and
/// never contains empty, `.` or `..` segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemotePath(String);

impl RemotePath {
    /// The store root, `/`.
    pub fn root() -> Self {
        Self("/".into())
    }

    /// Parses and normalizes a raw path.
    ///
    /// A missing leading slash is added, repeated slashes and `.` segments
    /// are dropped, and `..` is rejected. An empty string yields the root.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let segments = split_segments(raw)?;
        Ok(Self::from_segments(&segments))
    }

    fn from_segments(segments: &[&str]) -> Self {
        if segments.is_empty() {
            return Self::root();
        }
        let mut s = String::with_capacity(segments.iter().map(|seg| seg.len() + 1).sum());
        for seg in segments {
            s.push('/');
            s.push_str(seg);
        }
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Returns the containing directory, or `None` for the root.
    pub fn parent(&self) -> Option<RemotePath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) | None => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
        }
    }

    /// Last segment, or `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.0.rsplit('/').next()
    }

    /// Appends a relative path (one or more segments) to this path.
    pub fn join(&self, rel: &str) -> Result<RemotePath, PathError> {
        let extra = split_segments(rel)?;
        if extra.is_empty() {
            return Err(PathError::EmptySegment);
        }
        let mut segments: Vec<&str> = self.segments().collect();
        segments.extend(extra);
        Ok(Self::from_segments(&segments))
    }

    /// Iterates the path segments, outermost first. Empty for the root.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Number of segments below the root.
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// All ancestors including `self`, root first.
    pub fn ancestors(&self) -> Vec<RemotePath> {
        let segments: Vec<&str> = self.segments().collect();
        (0..=segments.len())
            .map(|n| Self::from_segments(&segments[..n]))
            .collect()
    }
}

fn split_segments(raw: &str) -> Result<Vec<&str>, PathError> {
    let mut segments = Vec::new();
    for seg in raw.split('/') {
        match seg {
            "" | "." => {}
            ".." => return Err(PathError::ParentTraversal(raw.to_string())),
            s => segments.push(s),
        }
    }
    Ok(segments)
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RemotePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RemotePath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RemotePath> for String {
    fn from(path: RemotePath) -> Self {
        path.0
    }
}

impl AsRef<str> for RemotePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
