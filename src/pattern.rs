//! Compiled dynamic-path matcher.
//!
//! A pattern is split once at registration into ordered segment
//! descriptors; matching is an anchored, segment-by-segment walk. No regex,
//! no backtracking — the capture rules live in one place
//! ([`is_capture_segment`]) where they can be tested on their own.
//!
//! A `:name` segment captures one or more characters from
//! `[A-Za-z0-9_]`, `-`, `.` and `~`. Literal segments must match verbatim.

use std::collections::HashMap;

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A route pattern compiled into segment descriptors.
#[derive(Debug, Clone)]
pub(crate) struct CompiledPattern {
    raw: String,
    segments: Vec<Segment>,
}

/// True when `path` contains at least one `:name` segment.
pub(crate) fn is_dynamic(path: &str) -> bool {
    path.split('/').any(|seg| seg.starts_with(':'))
}

impl CompiledPattern {
    pub(crate) fn compile(pattern: &str) -> Result<Self, Error> {
        let mut segments = Vec::new();
        for seg in pattern.split('/') {
            match seg.strip_prefix(':') {
                Some("") => {
                    return Err(Error::InvalidPattern {
                        pattern: pattern.to_owned(),
                        reason: "empty parameter name".to_owned(),
                    });
                }
                Some(name) => segments.push(Segment::Param(name.to_owned())),
                None => segments.push(Segment::Literal(seg.to_owned())),
            }
        }
        Ok(Self { raw: pattern.to_owned(), segments })
    }

    /// The pattern as registered, for duplicate detection.
    pub(crate) fn raw(&self) -> &str {
        &self.raw
    }

    /// Anchored match: every segment must pair up, captures bound by name.
    pub(crate) fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let mut params = HashMap::new();
        let mut segments = self.segments.iter();
        let mut parts = path.split('/');
        loop {
            match (segments.next(), parts.next()) {
                (Some(Segment::Literal(lit)), Some(part)) if lit == part => {}
                (Some(Segment::Param(name)), Some(part)) if is_capture_segment(part) => {
                    params.insert(name.clone(), part.to_owned());
                }
                (None, None) => return Some(params),
                _ => return None,
            }
        }
    }
}

fn is_capture_segment(part: &str) -> bool {
    !part.is_empty()
        && part
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b'~'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_segments_match_verbatim() {
        let p = CompiledPattern::compile("/users/all").unwrap();
        assert!(p.matches("/users/all").is_some());
        assert!(p.matches("/users/one").is_none());
        assert!(p.matches("/Users/all").is_none());
    }

    #[test]
    fn captures_bind_by_name() {
        let p = CompiledPattern::compile("/users/:id/posts/:post_id").unwrap();
        let params = p.matches("/users/42/posts/a-1.2~x").unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params["id"], "42");
        assert_eq!(params["post_id"], "a-1.2~x");
    }

    #[test]
    fn match_is_anchored() {
        let p = CompiledPattern::compile("/users/:id").unwrap();
        assert!(p.matches("/users/42/extra").is_none());
        assert!(p.matches("/users").is_none());
        assert!(p.matches("/prefix/users/42").is_none());
    }

    #[test]
    fn capture_charset_is_restricted() {
        let p = CompiledPattern::compile("/files/:name").unwrap();
        assert!(p.matches("/files/report.v2~final").is_some());
        assert!(p.matches("/files/a%20b").is_none());
        assert!(p.matches("/files/a+b").is_none());
        // one-or-more: an empty segment never captures
        assert!(p.matches("/files/").is_none());
    }

    #[test]
    fn empty_parameter_name_is_rejected() {
        let err = CompiledPattern::compile("/users/:").unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));
    }

    #[test]
    fn dynamic_detection() {
        assert!(is_dynamic("/users/:id"));
        assert!(!is_dynamic("/users/all"));
        assert!(!is_dynamic("/odd:colon/inside"));
    }
}
