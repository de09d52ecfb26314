//! Pub/Sub topic naming.
//!
//! Every namespace gossips on its own topic, `"{prefix}:{namespace}"`.

/// Default topic prefix
pub const DEFAULT_TOPIC_PREFIX: &str = "beacon:gossip";

/// Maps namespaces to topic names and back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicNamer {
    prefix: String,
}

impl TopicNamer {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Topic carrying announcements for `namespace`
    #[must_use]
    pub fn topic(&self, namespace: &str) -> String {
        format!("{}:{namespace}", self.prefix)
    }

    /// Namespace a topic belongs to, if it was named by this namer
    #[must_use]
    pub fn namespace_of<'a>(&self, topic: &'a str) -> Option<&'a str> {
        topic
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix(':'))
            .filter(|namespace| !namespace.is_empty())
    }
}

impl Default for TopicNamer {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_names() {
        let namer = TopicNamer::default();
        assert_eq!(namer.topic("app-1"), "beacon:gossip:app-1");
        assert_eq!(namer.namespace_of("beacon:gossip:app-1"), Some("app-1"));
    }

    #[test]
    fn test_foreign_topics() {
        let namer = TopicNamer::new("cluster-a");
        assert_eq!(namer.namespace_of("cluster-b:app-1"), None);
        assert_eq!(namer.namespace_of("cluster-a:"), None);
        assert_eq!(namer.namespace_of("cluster-ab:app"), None);
    }
}
