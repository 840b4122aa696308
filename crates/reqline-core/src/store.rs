//! Request-scoped state
//!
//! Secondary events fire before the primary event is logged, so their
//! fragments have to wait somewhere. Every request gets its own
//! [`RequestStore`], reachable only through the [`RequestContext`] handle the
//! interceptor creates for it. Nothing here is global, so one request can
//! never observe another's pending values.

use crate::event::Event;
use std::sync::{Arc, Mutex, PoisonError};

/// Pending values for a single request
#[derive(Debug, Default)]
pub struct RequestStore {
    location: Option<String>,
    unpermitted_params: Option<Vec<String>>,
    primary_event: Option<Event>,
}

impl RequestStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pending redirect location, replacing any earlier one
    pub fn set_location(&mut self, location: Option<String>) {
        self.location = location;
    }

    /// Pending redirect location
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Read and clear the pending redirect location
    pub fn take_location(&mut self) -> Option<String> {
        self.location.take()
    }

    /// Append rejected parameter names, keeping earlier ones
    pub fn append_unpermitted_params<I, S>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unpermitted_params
            .get_or_insert_with(Vec::new)
            .extend(keys.into_iter().map(Into::into));
    }

    /// Pending rejected parameter names
    pub fn unpermitted_params(&self) -> Option<&[String]> {
        self.unpermitted_params.as_deref()
    }

    /// Forget the pending rejected parameter names
    pub fn clear_unpermitted_params(&mut self) {
        self.unpermitted_params = None;
    }

    /// Read and clear the pending rejected parameter names
    pub fn take_unpermitted_params(&mut self) -> Option<Vec<String>> {
        self.unpermitted_params.take()
    }

    /// Remember the primary event for the interceptor
    pub fn set_primary_event(&mut self, event: Event) {
        self.primary_event = Some(event);
    }

    /// The captured primary event
    pub fn primary_event(&self) -> Option<&Event> {
        self.primary_event.as_ref()
    }

    /// Read and clear the captured primary event
    pub fn take_primary_event(&mut self) -> Option<Event> {
        self.primary_event.take()
    }

    /// Drop every pending value
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.location.is_none() && self.unpermitted_params.is_none() && self.primary_event.is_none()
    }
}

/// Handle to the store of one request.
///
/// Clones share the same store. A new context is created per request and
/// dropped with it.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    store: Arc<Mutex<RequestStore>>,
}

impl RequestContext {
    /// Create a context with an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with exclusive access to the store
    pub fn with<R>(&self, f: impl FnOnce(&mut RequestStore) -> R) -> R {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *store)
    }

    /// Set the pending redirect location
    pub fn set_location(&self, location: Option<String>) {
        self.with(|store| store.set_location(location));
    }

    /// Append rejected parameter names
    pub fn append_unpermitted_params<I, S>(&self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with(|store| store.append_unpermitted_params(keys));
    }

    /// Drain the pending redirect location
    pub fn take_location(&self) -> Option<String> {
        self.with(RequestStore::take_location)
    }

    /// Drain the pending rejected parameter names
    pub fn take_unpermitted_params(&self) -> Option<Vec<String>> {
        self.with(RequestStore::take_unpermitted_params)
    }

    /// Remember the primary event
    pub fn set_primary_event(&self, event: Event) {
        self.with(|store| store.set_primary_event(event));
    }

    /// Drain the captured primary event
    pub fn take_primary_event(&self) -> Option<Event> {
        self.with(RequestStore::take_primary_event)
    }

    /// Whether two handles point at the same store
    pub fn same_request(&self, other: &RequestContext) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{names, Payload};

    #[test]
    fn test_absent_keys_read_empty() {
        let store = RequestStore::new();
        assert_eq!(store.location(), None);
        assert_eq!(store.unpermitted_params(), None);
        assert!(store.primary_event().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_location_overwrites() {
        let mut store = RequestStore::new();
        store.set_location(Some("http://a.example".to_string()));
        store.set_location(Some("http://b.example".to_string()));
        assert_eq!(store.location(), Some("http://b.example"));

        assert_eq!(store.take_location().as_deref(), Some("http://b.example"));
        assert_eq!(store.take_location(), None);
    }

    #[test]
    fn test_unpermitted_params_accumulate() {
        let mut store = RequestStore::new();
        store.append_unpermitted_params(["a"]);
        store.append_unpermitted_params(["b", "c"]);
        assert_eq!(
            store.unpermitted_params(),
            Some(&["a".to_string(), "b".to_string(), "c".to_string()][..])
        );

        store.clear_unpermitted_params();
        assert_eq!(store.unpermitted_params(), None);
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut store = RequestStore::new();
        store.set_location(Some("/next".to_string()));
        store.append_unpermitted_params(["x"]);
        store.set_primary_event(Event::instant(names::PROCESS_ACTION, Payload::new()));
        assert!(!store.is_empty());

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_context_clones_share_store() {
        let ctx = RequestContext::new();
        let clone = ctx.clone();
        clone.set_location(Some("/there".to_string()));

        assert!(ctx.same_request(&clone));
        assert_eq!(ctx.take_location().as_deref(), Some("/there"));
        assert_eq!(clone.take_location(), None);
    }

    #[test]
    fn test_contexts_are_isolated() {
        let first = RequestContext::new();
        let second = RequestContext::new();
        first.append_unpermitted_params(["secret"]);

        assert!(!first.same_request(&second));
        assert_eq!(second.take_unpermitted_params(), None);
        assert_eq!(
            first.take_unpermitted_params(),
            Some(vec!["secret".to_string()])
        );
    }

    #[test]
    fn test_contexts_isolated_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                std::thread::spawn(move || {
                    let ctx = RequestContext::new();
                    ctx.set_location(Some(format!("/r/{}", i)));
                    ctx.take_location()
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), Some(format!("/r/{}", i)));
        }
    }
}
