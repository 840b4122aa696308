//! Rules deciding which requests produce no log line

use crate::event::{display_value, Event};
use std::fmt;
use std::sync::Arc;

/// Predicate over a request event; `true` suppresses the log line.
pub type IgnorePredicate = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// OR-combined list of ignore predicates
#[derive(Clone, Default)]
pub struct IgnoreRules {
    tests: Vec<IgnorePredicate>,
}

impl IgnoreRules {
    /// Create a rule set that ignores nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predicate
    pub fn ignore<F>(&mut self, predicate: F) -> &mut Self
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.tests.push(Arc::new(predicate));
        self
    }

    /// Add a predicate if one is given
    pub fn ignore_predicate(&mut self, predicate: Option<IgnorePredicate>) -> &mut Self {
        if let Some(predicate) = predicate {
            self.tests.push(predicate);
        }
        self
    }

    /// Ignore requests whose `Controller#action` is in `actions`
    ///
    /// An empty list adds nothing.
    pub fn ignore_actions<I, S>(&mut self, actions: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let actions: Vec<String> = actions.into_iter().map(Into::into).collect();
        if !actions.is_empty() {
            self.ignore(move |event| {
                let current = controller_action(event);
                actions.iter().any(|action| *action == current)
            });
        }
        self
    }

    /// Remove every predicate
    pub fn ignore_nothing(&mut self) -> &mut Self {
        self.tests.clear();
        self
    }

    /// Whether any predicate matches `event`
    pub fn matches(&self, event: &Event) -> bool {
        self.tests.iter().any(|test| test(event))
    }

    /// Number of predicates
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    /// Whether no predicate is registered
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

impl fmt::Debug for IgnoreRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IgnoreRules")
            .field("predicates", &self.tests.len())
            .finish()
    }
}

/// The `Controller#action` pair declared by an event payload
pub fn controller_action(event: &Event) -> String {
    let payload = event.payload();
    let part = |key: &str| payload.get(key).map(display_value).unwrap_or_default();
    format!("{}#{}", part("controller"), part("action"))
}
