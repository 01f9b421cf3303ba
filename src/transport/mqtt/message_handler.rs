//! Topic routing for inbound MQTT messages
//!
//! A flat list of (topic, handler) registrations scanned linearly on every
//! message. Topics match exactly; there is no wildcard support.

use std::borrow::Cow;
use std::fmt;

/// Callback invoked with `(topic, payload)` for each matching message
pub type MessageHandler = Box<dyn FnMut(&str, &str)>;

/// A topic bound to a handler, kept for the life of the process
pub struct Subscription {
    topic: String,
    handler: MessageHandler,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

/// Exact-match dispatcher over registered subscriptions
#[derive(Debug, Default)]
pub struct TopicRouter {
    subscriptions: Vec<Subscription>,
}

impl TopicRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subscription; duplicates of an existing topic are allowed
    pub fn register<F>(&mut self, topic: impl Into<String>, handler: F)
    where
        F: FnMut(&str, &str) + 'static,
    {
        self.subscriptions.push(Subscription {
            topic: topic.into(),
            handler: Box::new(handler),
        });
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    /// Non-empty topics in first-registration order, each listed once
    pub fn distinct_topics(&self) -> Vec<&str> {
        let mut topics: Vec<&str> = Vec::new();
        for subscription in &self.subscriptions {
            let topic = subscription.topic.as_str();
            if !topic.is_empty() && !topics.contains(&topic) {
                topics.push(topic);
            }
        }
        topics
    }

    /// Invoke every handler registered for exactly `topic`, in registration
    /// order, and return how many ran
    ///
    /// The payload is handed over as text. Valid UTF-8 passes through
    /// unchanged; invalid sequences become U+FFFD.
    pub fn dispatch(&mut self, topic: &str, payload: &[u8]) -> usize {
        let text: Cow<'_, str> = String::from_utf8_lossy(payload);
        let mut fired = 0;
        for subscription in self
            .subscriptions
            .iter_mut()
            .filter(|subscription| subscription.topic == topic)
        {
            (subscription.handler)(topic, &text);
            fired += 1;
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    fn recorder(log: &Log, name: &'static str) -> impl FnMut(&str, &str) + 'static {
        let log = log.clone();
        move |topic, payload| log.borrow_mut().push(format!("{name}:{topic}:{payload}"))
    }

    #[test]
    fn test_exact_match_only() {
        let log = Log::default();
        let mut router = TopicRouter::new();
        router.register("home/light", recorder(&log, "light"));
        router.register("home/#", recorder(&log, "wildcard"));

        assert_eq!(router.dispatch("home/light", b"on"), 1);
        assert_eq!(router.dispatch("home/light/set", b"on"), 0);
        assert_eq!(*log.borrow(), vec!["light:home/light:on"]);
    }

    #[test]
    fn test_duplicates_fire_in_registration_order() {
        let log = Log::default();
        let mut router = TopicRouter::new();
        router.register("a/b", recorder(&log, "first"));
        router.register("c/d", recorder(&log, "other"));
        router.register("a/b", recorder(&log, "second"));

        assert_eq!(router.dispatch("a/b", b"x"), 2);
        assert_eq!(*log.borrow(), vec!["first:a/b:x", "second:a/b:x"]);
    }

    #[test]
    fn test_payload_bytes_preserved() {
        let log = Log::default();
        let mut router = TopicRouter::new();
        router.register("t", recorder(&log, "h"));

        router.dispatch("t", "{\"temp\": 21.5, \"unit\": \"°C\"}".as_bytes());
        router.dispatch("t", b"");
        assert_eq!(
            *log.borrow(),
            vec!["h:t:{\"temp\": 21.5, \"unit\": \"°C\"}", "h:t:"]
        );
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let log = Log::default();
        let mut router = TopicRouter::new();
        router.register("t", recorder(&log, "h"));

        router.dispatch("t", &[b'o', 0xff, b'k']);
        assert_eq!(*log.borrow(), vec!["h:t:o\u{fffd}k"]);
    }

    #[test]
    fn test_distinct_topics_keeps_first_seen_order() {
        let mut router = TopicRouter::new();
        router.register("c/d", |_, _| {});
        router.register("a/b", |_, _| {});
        router.register("c/d", |_, _| {});
        router.register("", |_, _| {});

        assert_eq!(router.len(), 4);
        assert_eq!(router.distinct_topics(), vec!["c/d", "a/b"]);
    }

    #[test]
    fn test_empty_router() {
        let mut router = TopicRouter::new();
        assert!(router.is_empty());
        assert!(router.distinct_topics().is_empty());
        assert_eq!(router.dispatch("any", b"payload"), 0);
    }
}
