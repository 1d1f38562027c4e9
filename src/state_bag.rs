//! State-bag change notifications and the last-known value store.
//!
//! A change is announced to every matching handler before it is committed,
//! so [`StateBags::get`] still answers with the previous value while the
//! handlers run. Handlers observe; they cannot veto.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::codec::Value;
use crate::error::DispatchError;
use crate::events::DispatchOutcome;
use crate::handle::Handle;
use crate::subscription::{matches_filter, Cookie, CookieJar};

/// Bag shared by the whole server.
pub const GLOBAL_BAG: &str = "global";

pub fn entity_bag(entity: Handle) -> String {
    format!("entity:{}", entity.raw())
}

pub fn player_bag(player: Handle) -> String {
    format!("player:{}", player.raw())
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateBagChange {
    pub bag_name: String,
    pub key: String,
    pub value: Value,
    pub replicated: bool,
}

pub type StateBagHandler = Rc<dyn Fn(&StateBags, &StateBagChange) -> anyhow::Result<()>>;

pub fn handler<F>(f: F) -> StateBagHandler
where
    F: Fn(&StateBags, &StateBagChange) -> anyhow::Result<()> + 'static,
{
    Rc::new(f)
}

struct Registration {
    cookie: Cookie,
    key_filter: String,
    bag_filter: String,
    handler: StateBagHandler,
}

#[derive(Default)]
pub struct StateBags {
    handlers: RefCell<Vec<Registration>>,
    values: RefCell<HashMap<(String, String), Value>>,
    /// Newest in-flight write per slot; an older write does not commit over it.
    writes: RefCell<HashMap<(String, String), u64>>,
    revision: Cell<u64>,
    cookies: CookieJar,
}

impl StateBags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for changes whose key matches `key_filter` and whose
    /// bag matches `bag_filter`. Empty filters match anything.
    pub fn add_change_handler(
        &self,
        key_filter: &str,
        bag_filter: &str,
        handler: StateBagHandler,
    ) -> Cookie {
        let cookie = {
            let handlers = self.handlers.borrow();
            self.cookies.next(|c| handlers.iter().any(|r| r.cookie == c))
        };
        tracing::debug!("[state_bag] handler {cookie} key='{key_filter}' bag='{bag_filter}'");
        self.handlers.borrow_mut().push(Registration {
            cookie,
            key_filter: key_filter.to_string(),
            bag_filter: bag_filter.to_string(),
            handler,
        });
        cookie
    }

    /// Unknown cookies are ignored.
    pub fn remove_change_handler(&self, cookie: Cookie) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let before = handlers.len();
        handlers.retain(|r| r.cookie != cookie);
        before != handlers.len()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.borrow().len()
    }

    pub fn get(&self, bag: &str, key: &str) -> Option<Value> {
        self.values
            .borrow()
            .get(&(bag.to_string(), key.to_string()))
            .cloned()
    }

    /// Keys currently set on `bag`, sorted.
    pub fn keys(&self, bag: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .values
            .borrow()
            .keys()
            .filter(|(b, _)| b == bag)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    fn still_registered(&self, cookie: Cookie) -> Option<StateBagHandler> {
        self.handlers
            .borrow()
            .iter()
            .find(|r| r.cookie == cookie)
            .map(|r| Rc::clone(&r.handler))
    }

    /// Notify matching handlers, then commit the value. A `Nil` value clears
    /// the key. The value is committed even when handlers fail. A write made
    /// by a handler to the same slot supersedes the one being dispatched.
    pub fn apply(&self, change: StateBagChange) -> Result<DispatchOutcome, DispatchError> {
        let slot = (change.bag_name.clone(), change.key.clone());
        let revision = self.revision.get() + 1;
        self.revision.set(revision);
        self.writes.borrow_mut().insert(slot.clone(), revision);

        let matching: Vec<Cookie> = self
            .handlers
            .borrow()
            .iter()
            .filter(|r| {
                matches_filter(&r.key_filter, &change.key)
                    && matches_filter(&r.bag_filter, &change.bag_name)
            })
            .map(|r| r.cookie)
            .collect();

        let mut outcome = DispatchOutcome::default();
        let mut failures = Vec::new();
        for cookie in matching {
            let Some(handler) = self.still_registered(cookie) else {
                continue;
            };
            outcome.handlers_run += 1;
            if let Err(e) = handler(self, &change) {
                tracing::warn!(
                    "[state_bag] handler {cookie} failed on {}.{}: {e:#}",
                    change.bag_name,
                    change.key
                );
                failures.push(e);
            }
        }

        let channel = format!("{}.{}", change.bag_name, change.key);
        let current = {
            let mut writes = self.writes.borrow_mut();
            let current = writes.get(&slot) == Some(&revision);
            if current {
                writes.remove(&slot);
            }
            current
        };
        if current {
            let mut values = self.values.borrow_mut();
            if change.value.is_nil() {
                values.remove(&slot);
            } else {
                values.insert(slot, change.value);
            }
        } else {
            tracing::debug!("[state_bag] {channel} superseded by a nested write");
        }

        if failures.is_empty() {
            Ok(outcome)
        } else {
            Err(DispatchError {
                channel,
                outcome,
                failures,
            })
        }
    }

    /// Drop every handler. Stored values are kept.
    pub fn clear_handlers(&self) {
        self.handlers.borrow_mut().clear();
    }
}
