//! Pure functions mapping (prefix, module/route) to broker topic strings
//! (§4.B), plus the `#` wildcard match rule shared by every engine.
//!
//! Grounded in the teacher's topic-tree matching in
//! `mqtt-proto/src/server/subscription.rs`, simplified from a full
//! multi-level trie to plain string operations since our grammar only ever
//! has a `#` at the tail of a subscription, never mid-filter wildcards.

use std::borrow::Cow;

/// Right-pads a non-empty prefix with `/` if it lacks one. An empty prefix
/// stays empty.
pub fn normalize_prefix(prefix: &str) -> Cow<'_, str> {
    if prefix.is_empty() || prefix.ends_with('/') {
        Cow::Borrowed(prefix)
    } else {
        Cow::Owned(format!("{prefix}/"))
    }
}

pub fn req_topic(prefix: &str, module: &str) -> String {
    format!("{}Request/{}", normalize_prefix(prefix), module)
}

pub fn resp_topic(prefix: &str, module: &str) -> String {
    format!("{}Response/{}", normalize_prefix(prefix), module)
}

pub fn notice_topic(prefix: &str, route: &str) -> String {
    format!("{}Notice/{}", normalize_prefix(prefix), route)
}

pub fn retain_notice_topic(prefix: &str, route: &str) -> String {
    format!("{}RetainNotice/{}", normalize_prefix(prefix), route)
}

pub fn log_topic(prefix: &str) -> String {
    format!("{}Log", normalize_prefix(prefix))
}

/// A topic is internal if it has exactly one `/` separator — one namespace
/// segment (§4.B). The proxy uses this to decide whether a request target
/// is local to a side's world.
pub fn is_internal(topic: &str) -> bool {
    topic.matches('/').count() == 1
}

/// Does a publish on `published` match a registration on `subscribed`?
///
/// `subscribed` may end in `/#`, meaning "this prefix and all children", or
/// be the bare `#`, meaning "everything". Anything else requires an exact
/// match.
pub fn topic_matches(subscribed: &str, published: &str) -> bool {
    if subscribed == "#" {
        return true;
    }

    if let Some(stem) = subscribed.strip_suffix("/#") {
        return published == stem || published.starts_with(stem) && published[stem.len()..].starts_with('/');
    }

    subscribed == published
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_prefix_with_trailing_slash() {
        assert_eq!(req_topic("A", "M1"), "A/Request/M1");
        assert_eq!(req_topic("A/", "M1"), "A/Request/M1");
        assert_eq!(req_topic("", "M1"), "Request/M1");
    }

    #[test]
    fn builds_every_topic_kind() {
        assert_eq!(resp_topic("A/", "M1"), "A/Response/M1");
        assert_eq!(notice_topic("A/", "alerts"), "A/Notice/alerts");
        assert_eq!(retain_notice_topic("A/", "state"), "A/RetainNotice/state");
        assert_eq!(log_topic("A/"), "A/Log");
    }

    #[test]
    fn classifies_internal_vs_external_topics() {
        assert!(is_internal("Request/M1"));
        assert!(!is_internal("A/Request/M1"));
        assert!(!is_internal("Request/M1/extra"));
    }

    #[test]
    fn matches_exact_topics() {
        assert!(topic_matches("Notice/alerts", "Notice/alerts"));
        assert!(!topic_matches("Notice/alerts", "Notice/other"));
    }

    #[test]
    fn matches_tail_wildcards() {
        assert!(topic_matches("Notice/#", "Notice/alerts"));
        assert!(topic_matches("Notice/#", "Notice/alerts/sub"));
        assert!(topic_matches("Notice/#", "Notice"));
        assert!(!topic_matches("Notice/#", "Noticeboard"));
    }

    #[test]
    fn bare_hash_matches_everything() {
        assert!(topic_matches("#", "Request/M1"));
        assert!(topic_matches("#", "Log"));
    }
}
