//! Slash-separated paths into the change-feed tree.

use std::fmt;

/// A typed path into the feed tree, e.g. `conversations/u1:u2/messages`.
///
/// Segments never contain `/`. The empty path is the tree root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeedPath {
    segments: Vec<String>,
}

impl FeedPath {
    /// The tree root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from segments. Slashes inside a segment split it.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut path = Self::root();
        for segment in segments {
            for part in segment.as_ref().split('/') {
                if !part.is_empty() {
                    path.segments.push(part.to_string());
                }
            }
        }
        path
    }

    /// Append one segment.
    pub fn child(&self, segment: impl AsRef<str>) -> Self {
        let mut path = self.clone();
        for part in segment.as_ref().split('/') {
            if !part.is_empty() {
                path.segments.push(part.to_string());
            }
        }
        path
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment, if any.
    pub fn key(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// True when `self` is `prefix` or lies underneath it.
    pub fn starts_with(&self, prefix: &FeedPath) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// True when a change at `changed` affects the subtree rooted at `self`.
    /// That is the case when one path is a prefix of the other.
    pub fn overlaps(&self, changed: &FeedPath) -> bool {
        self.starts_with(changed) || changed.starts_with(self)
    }
}

impl fmt::Display for FeedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        write!(f, "{}", self.segments.join("/"))
    }
}

impl From<&str> for FeedPath {
    fn from(raw: &str) -> Self {
        Self::new([raw])
    }
}
