//! Convar change listeners.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::DispatchError;
use crate::events::DispatchOutcome;
use crate::subscription::{matches_filter, Cookie, CookieJar};

/// Called with the name of the convar that changed.
pub type ConvarHandler = Rc<dyn Fn(&str) -> anyhow::Result<()>>;

pub fn listener<F>(f: F) -> ConvarHandler
where
    F: Fn(&str) -> anyhow::Result<()> + 'static,
{
    Rc::new(f)
}

struct Listener {
    cookie: Cookie,
    filter: String,
    handler: ConvarHandler,
}

#[derive(Default)]
pub struct ConvarListeners {
    listeners: RefCell<Vec<Listener>>,
    cookies: CookieJar,
}

impl ConvarListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// `filter` may use `*`; empty listens to every convar.
    pub fn add(&self, filter: &str, handler: ConvarHandler) -> Cookie {
        let cookie = {
            let listeners = self.listeners.borrow();
            self.cookies.next(|c| listeners.iter().any(|l| l.cookie == c))
        };
        tracing::debug!("[convar] listener {cookie} filter='{filter}'");
        self.listeners.borrow_mut().push(Listener {
            cookie,
            filter: filter.to_string(),
            handler,
        });
        cookie
    }

    pub fn remove(&self, cookie: Cookie) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|l| l.cookie != cookie);
        before != listeners.len()
    }

    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }

    pub fn notify(&self, name: &str) -> Result<DispatchOutcome, DispatchError> {
        let matching: Vec<(Cookie, ConvarHandler)> = self
            .listeners
            .borrow()
            .iter()
            .filter(|l| matches_filter(&l.filter, name))
            .map(|l| (l.cookie, Rc::clone(&l.handler)))
            .collect();

        let mut outcome = DispatchOutcome::default();
        let mut failures = Vec::new();
        for (cookie, handler) in matching {
            if !self.listeners.borrow().iter().any(|l| l.cookie == cookie) {
                continue;
            }
            outcome.handlers_run += 1;
            if let Err(e) = handler(name) {
                tracing::warn!("[convar] listener {cookie} failed on '{name}': {e:#}");
                failures.push(e);
            }
        }

        if failures.is_empty() {
            Ok(outcome)
        } else {
            Err(DispatchError {
                channel: name.to_string(),
                outcome,
                failures,
            })
        }
    }

    pub fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }
}
