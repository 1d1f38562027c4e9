//! Event registry: named subscriptions, synchronous dispatch, cancellation.
//!
//! Two scopes share one registry. `Local` events are raised with
//! [`EventRegistry::emit`] inside this process; `Client` events arrive from
//! remote peers through [`EventRegistry::dispatch_client`] and carry the
//! sending player as their source.
//!
//! Dispatch iterates a snapshot of the subscription list, so handlers may
//! subscribe, unsubscribe or emit while running:
//! - a subscription removed during the dispatch is not invoked afterwards,
//! - a subscription added during the dispatch waits for the next one,
//! - a one-shot subscription is consumed just before it runs, so a nested
//!   emit of the same key cannot run it twice.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::codec::Value;
use crate::error::{DispatchError, PreconditionError};
use crate::handle::Handle;

/// Event callback. Identity (for [`EventRegistry::off`]) is the `Rc` allocation.
pub type EventHandler = Rc<dyn Fn(&EventContext<'_>, &[Value]) -> anyhow::Result<()>>;

/// Wrap a closure as an [`EventHandler`].
pub fn handler<F>(f: F) -> EventHandler
where
    F: Fn(&EventContext<'_>, &[Value]) -> anyhow::Result<()> + 'static,
{
    Rc::new(f)
}

fn same_handler(a: &EventHandler, b: &EventHandler) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Local,
    Client,
}

/// How a dispatch went. Cancellation is advisory: every handler still ran,
/// and the code that raised the event decides what to do about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
    pub handlers_run: usize,
    pub canceled: bool,
}

struct Subscription {
    id: u64,
    handler: EventHandler,
    once: bool,
}

#[derive(Debug)]
struct DispatchFrame {
    key: String,
    scope: Scope,
    source: Option<Handle>,
    canceled: Cell<bool>,
}

/// What a handler can see of the dispatch it is running in.
pub struct EventContext<'a> {
    registry: &'a EventRegistry,
    frame: Rc<DispatchFrame>,
}

impl<'a> EventContext<'a> {
    pub fn key(&self) -> &str {
        &self.frame.key
    }

    pub fn scope(&self) -> Scope {
        self.frame.scope
    }

    /// Sending player for client events, `None` for local ones.
    pub fn source(&self) -> Option<Handle> {
        self.frame.source
    }

    pub fn cancel(&self) {
        self.frame.canceled.set(true);
    }

    pub fn was_canceled(&self) -> bool {
        self.frame.canceled.get()
    }

    pub fn registry(&self) -> &'a EventRegistry {
        self.registry
    }
}

struct FrameGuard<'a> {
    stack: &'a RefCell<Vec<Rc<DispatchFrame>>>,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.stack.borrow_mut().pop();
    }
}

#[derive(Default)]
pub struct EventRegistry {
    subscriptions: RefCell<HashMap<(Scope, String), Vec<Subscription>>>,
    dispatching: RefCell<Vec<Rc<DispatchFrame>>>,
    next_id: Cell<u64>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn subscribe(&self, scope: Scope, key: &str, handler: EventHandler, once: bool) {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        tracing::debug!("[events] subscribe {scope:?} '{key}' (once={once})");
        self.subscriptions
            .borrow_mut()
            .entry((scope, key.to_string()))
            .or_default()
            .push(Subscription { id, handler, once });
    }

    fn unsubscribe(&self, scope: Scope, key: &str, handler: &EventHandler) -> bool {
        let mut subs = self.subscriptions.borrow_mut();
        let map_key = (scope, key.to_string());
        let Some(list) = subs.get_mut(&map_key) else {
            return false;
        };
        // the most recent registration of this handler goes first
        let Some(pos) = list.iter().rposition(|s| same_handler(&s.handler, handler)) else {
            return false;
        };
        list.remove(pos);
        if list.is_empty() {
            subs.remove(&map_key);
        }
        tracing::debug!("[events] unsubscribe {scope:?} '{key}'");
        true
    }

    pub fn on(&self, key: &str, handler: EventHandler) {
        self.subscribe(Scope::Local, key, handler, false);
    }

    pub fn once(&self, key: &str, handler: EventHandler) {
        self.subscribe(Scope::Local, key, handler, true);
    }

    /// Remove `handler` from `key`. Returns `false` when the pair was not
    /// subscribed, which is not an error.
    pub fn off(&self, key: &str, handler: &EventHandler) -> bool {
        self.unsubscribe(Scope::Local, key, handler)
    }

    pub fn on_client(&self, key: &str, handler: EventHandler) {
        self.subscribe(Scope::Client, key, handler, false);
    }

    pub fn once_client(&self, key: &str, handler: EventHandler) {
        self.subscribe(Scope::Client, key, handler, true);
    }

    pub fn off_client(&self, key: &str, handler: &EventHandler) -> bool {
        self.unsubscribe(Scope::Client, key, handler)
    }

    /// Drop every subscription for `key` in both scopes, or everything when
    /// `key` is `None`.
    pub fn remove_all_listeners(&self, key: Option<&str>) {
        let mut subs = self.subscriptions.borrow_mut();
        match key {
            Some(key) => {
                subs.remove(&(Scope::Local, key.to_string()));
                subs.remove(&(Scope::Client, key.to_string()));
                tracing::debug!("[events] removed all listeners for '{key}'");
            }
            None => {
                subs.clear();
                tracing::debug!("[events] removed all listeners");
            }
        }
    }

    pub fn listener_count(&self, scope: Scope, key: &str) -> usize {
        self.subscriptions
            .borrow()
            .get(&(scope, key.to_string()))
            .map_or(0, Vec::len)
    }

    /// Raise a local event. Handlers run synchronously in subscription order
    /// and receive `args` unmodified.
    pub fn emit(&self, key: &str, args: &[Value]) -> Result<DispatchOutcome, DispatchError> {
        self.dispatch(Scope::Local, key, None, args)
    }

    /// Deliver a client event sent by `source`.
    pub fn dispatch_client(
        &self,
        key: &str,
        source: Handle,
        args: &[Value],
    ) -> Result<DispatchOutcome, DispatchError> {
        self.dispatch(Scope::Client, key, Some(source), args)
    }

    /// Take the still-subscribed entry `id`, consuming it when it is one-shot.
    fn claim(&self, scope: Scope, key: &str, id: u64) -> Option<EventHandler> {
        let mut subs = self.subscriptions.borrow_mut();
        let map_key = (scope, key.to_string());
        let list = subs.get_mut(&map_key)?;
        let pos = list.iter().position(|s| s.id == id)?;
        let handler = Rc::clone(&list[pos].handler);
        if list[pos].once {
            list.remove(pos);
            if list.is_empty() {
                subs.remove(&map_key);
            }
        }
        Some(handler)
    }

    fn dispatch(
        &self,
        scope: Scope,
        key: &str,
        source: Option<Handle>,
        args: &[Value],
    ) -> Result<DispatchOutcome, DispatchError> {
        let snapshot: Vec<u64> = self
            .subscriptions
            .borrow()
            .get(&(scope, key.to_string()))
            .map(|list| list.iter().map(|s| s.id).collect())
            .unwrap_or_default();

        let frame = Rc::new(DispatchFrame {
            key: key.to_string(),
            scope,
            source,
            canceled: Cell::new(false),
        });
        self.dispatching.borrow_mut().push(Rc::clone(&frame));
        let _guard = FrameGuard {
            stack: &self.dispatching,
        };

        let ctx = EventContext {
            registry: self,
            frame: Rc::clone(&frame),
        };
        let mut outcome = DispatchOutcome::default();
        let mut failures = Vec::new();

        for id in snapshot {
            let Some(handler) = self.claim(scope, key, id) else {
                continue;
            };
            outcome.handlers_run += 1;
            if let Err(e) = handler(&ctx, args) {
                tracing::warn!("[events] handler for '{key}' failed: {e:#}");
                failures.push(e);
            }
        }
        outcome.canceled = frame.canceled.get();

        if failures.is_empty() {
            Ok(outcome)
        } else {
            Err(DispatchError {
                channel: key.to_string(),
                outcome,
                failures,
            })
        }
    }

    fn innermost(&self, op: &'static str) -> Result<Rc<DispatchFrame>, PreconditionError> {
        self.dispatching
            .borrow()
            .last()
            .cloned()
            .ok_or(PreconditionError::NoActiveDispatch { op })
    }

    /// Flag the event currently being dispatched as canceled.
    pub fn cancel_event(&self) -> Result<(), PreconditionError> {
        self.innermost("cancel_event")?.canceled.set(true);
        Ok(())
    }

    pub fn was_event_canceled(&self) -> Result<bool, PreconditionError> {
        Ok(self.innermost("was_event_canceled")?.canceled.get())
    }

    /// Source of the event currently being dispatched.
    pub fn event_source(&self) -> Result<Option<Handle>, PreconditionError> {
        Ok(self.innermost("event_source")?.source)
    }

    pub fn is_dispatching(&self) -> bool {
        !self.dispatching.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Rc<Cell<usize>>, EventHandler) {
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        (
            hits,
            handler(move |_, _| {
                h.set(h.get() + 1);
                Ok(())
            }),
        )
    }

    #[test]
    fn test_on_receives_arguments_unmodified() {
        let reg = EventRegistry::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        reg.on(
            "tick",
            handler(move |_, args| {
                sink.borrow_mut().push(args.to_vec());
                Ok(())
            }),
        );
        let outcome = reg.emit("tick", &[Value::Int(1), Value::from("a")]).unwrap();
        assert_eq!(outcome.handlers_run, 1);
        assert_eq!(*seen.borrow(), vec![vec![Value::Int(1), Value::from("a")]]);
    }

    #[test]
    fn test_once_fires_exactly_once() {
        let reg = EventRegistry::new();
        let (hits, h) = counter();
        reg.once("join", h);
        reg.emit("join", &[]).unwrap();
        reg.emit("join", &[]).unwrap();
        assert_eq!(hits.get(), 1);
        assert_eq!(reg.listener_count(Scope::Local, "join"), 0);
    }

    #[test]
    fn test_insertion_order_regardless_of_shot_count() {
        let reg = EventRegistry::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for (name, once) in [("a", false), ("b", true), ("c", false)] {
            let order = Rc::clone(&order);
            let h = handler(move |_, _| {
                order.borrow_mut().push(name);
                Ok(())
            });
            if once {
                reg.once("e", h);
            } else {
                reg.on("e", h);
            }
        }
        reg.emit("e", &[]).unwrap();
        reg.emit("e", &[]).unwrap();
        assert_eq!(*order.borrow(), vec!["a", "b", "c", "a", "c"]);
    }

    #[test]
    fn test_off_removes_only_the_match() {
        let reg = EventRegistry::new();
        let (hits_a, a) = counter();
        let (hits_b, b) = counter();
        reg.on("k", a.clone());
        reg.on("k", b.clone());
        reg.on("other", a.clone());

        assert!(reg.off("k", &a));
        assert!(!reg.off("k", &a));
        assert!(!reg.off("missing", &b));

        reg.emit("k", &[]).unwrap();
        reg.emit("other", &[]).unwrap();
        assert_eq!(hits_a.get(), 1);
        assert_eq!(hits_b.get(), 1);
    }

    #[test]
    fn test_remove_all_listeners() {
        let reg = EventRegistry::new();
        let (_, h) = counter();
        reg.on("a", h.clone());
        reg.on("b", h.clone());
        reg.on_client("a", h.clone());

        reg.remove_all_listeners(Some("a"));
        assert_eq!(reg.listener_count(Scope::Local, "a"), 0);
        assert_eq!(reg.listener_count(Scope::Client, "a"), 0);
        assert_eq!(reg.listener_count(Scope::Local, "b"), 1);

        reg.remove_all_listeners(None);
        assert_eq!(reg.listener_count(Scope::Local, "b"), 0);
    }

    #[test]
    fn test_cancel_is_scoped_to_one_dispatch() {
        let reg = EventRegistry::new();
        let observed = Rc::new(RefCell::new(Vec::new()));

        reg.on(
            "damage",
            handler(|ctx, args| {
                if args.first() == Some(&Value::Bool(true)) {
                    ctx.registry().cancel_event()?;
                }
                Ok(())
            }),
        );
        let seen = Rc::clone(&observed);
        reg.on(
            "damage",
            handler(move |ctx, _| {
                // later handlers still run and see the flag
                seen.borrow_mut().push(ctx.registry().was_event_canceled()?);
                Ok(())
            }),
        );

        assert!(reg.emit("damage", &[Value::Bool(true)]).unwrap().canceled);
        assert!(!reg.emit("damage", &[Value::Bool(false)]).unwrap().canceled);
        assert_eq!(*observed.borrow(), vec![true, false]);
    }

    #[test]
    fn test_nested_dispatch_does_not_cross_talk() {
        let reg = EventRegistry::new();
        reg.on(
            "inner",
            handler(|ctx, _| {
                ctx.cancel();
                Ok(())
            }),
        );
        let outer_flag = Rc::new(Cell::new(true));
        let flag = Rc::clone(&outer_flag);
        reg.on(
            "outer",
            handler(move |ctx, _| {
                let inner = ctx.registry().emit("inner", &[])?;
                assert!(inner.canceled);
                flag.set(ctx.registry().was_event_canceled()?);
                Ok(())
            }),
        );
        let outcome = reg.emit("outer", &[]).unwrap();
        assert!(!outcome.canceled);
        assert!(!outer_flag.get());
    }

    #[test]
    fn test_cancel_outside_dispatch_is_a_precondition_error() {
        let reg = EventRegistry::new();
        assert_eq!(
            reg.cancel_event(),
            Err(PreconditionError::NoActiveDispatch { op: "cancel_event" })
        );
        assert!(reg.was_event_canceled().is_err());
        assert!(reg.event_source().is_err());
    }

    #[test]
    fn test_failures_are_collected_after_all_handlers_ran() {
        let reg = EventRegistry::new();
        let (hits, ok) = counter();
        reg.on("e", handler(|_, _| anyhow::bail!("first")));
        reg.on("e", ok);
        reg.on("e", handler(|_, _| anyhow::bail!("second")));

        let err = reg.emit("e", &[]).unwrap_err();
        assert_eq!(hits.get(), 1);
        assert_eq!(err.outcome.handlers_run, 3);
        assert_eq!(err.failures.len(), 2);
        assert_eq!(err.to_string(), "2 handler(s) failed while dispatching 'e'");
        // registry is intact afterwards
        assert_eq!(reg.listener_count(Scope::Local, "e"), 3);
        assert!(!reg.is_dispatching());
    }

    #[test]
    fn test_removal_during_dispatch() {
        let reg = Rc::new(EventRegistry::new());
        let (hits_b, b) = counter();
        let b_for_a = b.clone();
        reg.on(
            "e",
            handler(move |ctx, _| {
                ctx.registry().off("e", &b_for_a);
                Ok(())
            }),
        );
        reg.on("e", b);
        let (hits_c, c) = counter();
        reg.on("e", c);

        let outcome = reg.emit("e", &[]).unwrap();
        assert_eq!(outcome.handlers_run, 2);
        assert_eq!(hits_b.get(), 0);
        assert_eq!(hits_c.get(), 1);
    }

    #[test]
    fn test_additions_wait_for_next_dispatch() {
        let reg = EventRegistry::new();
        let (hits, late) = counter();
        reg.once(
            "e",
            handler(move |ctx, _| {
                ctx.registry().on("e", late.clone());
                Ok(())
            }),
        );
        reg.emit("e", &[]).unwrap();
        assert_eq!(hits.get(), 0);
        reg.emit("e", &[]).unwrap();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_once_is_not_rerun_by_nested_emit() {
        let reg = EventRegistry::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        reg.once(
            "e",
            handler(move |ctx, _| {
                h.set(h.get() + 1);
                ctx.registry().emit("e", &[])?;
                Ok(())
            }),
        );
        reg.emit("e", &[]).unwrap();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_client_events_carry_their_source() {
        let reg = EventRegistry::new();
        let source = Rc::new(Cell::new(None));
        let s = Rc::clone(&source);
        reg.on_client(
            "chat:message",
            handler(move |ctx, _| {
                s.set(ctx.registry().event_source()?);
                Ok(())
            }),
        );
        // local emit does not reach client subscriptions
        assert_eq!(reg.emit("chat:message", &[]).unwrap().handlers_run, 0);
        reg.dispatch_client("chat:message", Handle(3), &[]).unwrap();
        assert_eq!(source.get(), Some(Handle(3)));
    }
}
