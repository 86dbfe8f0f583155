//! # Subject
//! ## Token syntax
//! <token>(.<token>)*
//!
//! Subscriptions may use wildcards: `*` matches exactly one token, `>` matches
//! one or more trailing tokens and is only allowed as the last token.
use std::{borrow::Borrow, convert::Infallible, fmt::Display, str::FromStr};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// subject is always a valid utf8 string, every constructor takes `str` or `String`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subject(pub(crate) Bytes);

impl Subject {
    pub fn new<S: Into<String>>(subject: S) -> Self {
        Self(Bytes::from(subject.into()))
    }
    pub const fn const_new(subject: &'static str) -> Self {
        Self(Bytes::from_static(subject.as_bytes()))
    }
    pub fn as_str(&self) -> &str {
        // SAFETY: constructed from `str`/`String` only
        unsafe { std::str::from_utf8_unchecked(self.0.as_ref()) }
    }
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_ref()
    }
    pub fn tokens(&self) -> impl Iterator<Item = &str> + Clone {
        self.as_str().split('.')
    }
    pub fn segments(&self) -> impl Iterator<Item = SubjectSegment<'_>> + Clone {
        self.tokens().map(|token| match token {
            "*" => SubjectSegment::Any,
            ">" => SubjectSegment::Tail,
            specific => SubjectSegment::Specific(specific),
        })
    }
    pub fn is_wildcard(&self) -> bool {
        self.segments()
            .any(|seg| !matches!(seg, SubjectSegment::Specific(_)))
    }
    fn has_valid_tokens(&self) -> bool {
        !self.0.is_empty()
            && self
                .tokens()
                .all(|token| !token.is_empty() && !token.contains(char::is_whitespace))
    }
    /// a subject that can be published to: no empty token, no whitespace, no wildcard
    pub fn is_valid_publish(&self) -> bool {
        self.has_valid_tokens() && !self.is_wildcard()
    }
    /// a subject that can be subscribed to, `>` must be the last token
    pub fn is_valid_subscribe(&self) -> bool {
        if !self.has_valid_tokens() {
            return false;
        }
        let mut segments = self.segments().peekable();
        while let Some(seg) = segments.next() {
            if matches!(seg, SubjectSegment::Tail) && segments.peek().is_some() {
                return false;
            }
        }
        true
    }
    /// check if the concrete subject `subject` is matched by this (possibly wildcard) subject
    pub fn matches(&self, subject: &Subject) -> bool {
        let mut pattern = self.segments();
        let mut tokens = subject.tokens();
        loop {
            match (pattern.next(), tokens.next()) {
                (Some(SubjectSegment::Tail), Some(_)) => return true,
                (Some(SubjectSegment::Any), Some(_)) => continue,
                (Some(SubjectSegment::Specific(expect)), Some(token)) if expect == token => {
                    continue
                }
                (None, None) => return true,
                _ => return false,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectSegment<'a> {
    Specific(&'a str),
    Any,
    Tail,
}

impl From<&'_ str> for Subject {
    fn from(val: &'_ str) -> Self {
        Subject::new(val)
    }
}

impl From<String> for Subject {
    fn from(val: String) -> Self {
        Subject::new(val)
    }
}

impl FromStr for Subject {
    type Err = Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Subject::new(s))
    }
}

impl Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for Subject {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Borrow<[u8]> for Subject {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Subject {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Subject {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let string = String::deserialize(deserializer)?;
        Ok(Subject::new(string))
    }
}

/// Subscribers sharing a queue group on a matching subject receive each message once, as a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueGroup(pub(crate) Bytes);

impl QueueGroup {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(Bytes::from(name.into()))
    }
    pub const fn const_new(name: &'static str) -> Self {
        Self(Bytes::from_static(name.as_bytes()))
    }
    pub fn as_str(&self) -> &str {
        // SAFETY: constructed from `str`/`String` only
        unsafe { std::str::from_utf8_unchecked(self.0.as_ref()) }
    }
}

impl From<&'_ str> for QueueGroup {
    fn from(val: &'_ str) -> Self {
        QueueGroup::new(val)
    }
}

impl Display for QueueGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(pub u64);

impl Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sid-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let pattern = Subject::const_new("protobuf_test");
        assert!(pattern.matches(&Subject::const_new("protobuf_test")));
        assert!(!pattern.matches(&Subject::const_new("protobuf_test.more")));
        assert!(!pattern.matches(&Subject::const_new("protobuf")));
    }

    #[test]
    fn test_wildcard_match() {
        let any = Subject::const_new("event.*.created");
        assert!(any.matches(&Subject::const_new("event.user.created")));
        assert!(!any.matches(&Subject::const_new("event.user.deleted")));
        assert!(!any.matches(&Subject::const_new("event.created")));

        let tail = Subject::const_new("event.>");
        assert!(tail.matches(&Subject::const_new("event.user")));
        assert!(tail.matches(&Subject::const_new("event.user.created")));
        assert!(!tail.matches(&Subject::const_new("event")));
    }

    #[test]
    fn test_validity() {
        assert!(Subject::const_new("a.b.c").is_valid_publish());
        assert!(!Subject::const_new("a.*.c").is_valid_publish());
        assert!(!Subject::const_new("a..c").is_valid_publish());
        assert!(!Subject::const_new("").is_valid_publish());
        assert!(!Subject::const_new("a b").is_valid_publish());

        assert!(Subject::const_new("a.*.>").is_valid_subscribe());
        assert!(!Subject::const_new("a.>.c").is_valid_subscribe());
    }
}
