//! One scripting resource's view of the bridge.
//!
//! A [`Resource`] owns the invoker for its engine host together with its
//! event registry, state-bag notifier, convar listeners and HTTP slot. All of
//! it lives on the resource's thread; handlers receive shared references and
//! may call back into the resource while they run.

use std::rc::Rc;
use std::cell::RefCell;

use crate::codec::{msgpack, Value};
use crate::config::ResourceConfig;
use crate::convar::{ConvarHandler, ConvarListeners};
use crate::error::{BridgeError, DispatchError, InvocationError, Result};
use crate::events::{DispatchOutcome, EventRegistry};
use crate::handle::{resolve, Handle, HandleBearing};
use crate::http::{HttpHandler, HttpIngress, HttpRequest, HttpRequestOptions, ResponseSink};
use crate::invoker::{HostNotification, Invoker, NativeHost};
use crate::natives;
use crate::state_bag::{StateBagChange, StateBags};
use crate::subscription::Cookie;

/// What a [`Resource::pump`] pass did.
#[derive(Debug, Default)]
pub struct PumpReport {
    /// Notifications routed, including those whose handlers failed.
    pub delivered: usize,
    pub failures: Vec<BridgeError>,
}

pub struct Resource<H: NativeHost> {
    name: String,
    invoker: RefCell<Invoker<H>>,
    events: EventRegistry,
    state_bags: StateBags,
    convars: ConvarListeners,
    http: HttpIngress,
}

impl<H: NativeHost> Resource<H> {
    pub fn new(name: impl Into<String>, host: H) -> Self {
        Self::from_invoker(name, Invoker::new(host))
    }

    pub fn with_config(config: &ResourceConfig, host: H) -> Self {
        Self::from_invoker(config.resource_name.clone(), Invoker::with_config(host, config))
    }

    fn from_invoker(name: impl Into<String>, invoker: Invoker<H>) -> Self {
        let name = name.into();
        tracing::info!("[resource] {name} created");
        Self {
            name,
            invoker: RefCell::new(invoker),
            events: EventRegistry::new(),
            state_bags: StateBags::new(),
            convars: ConvarListeners::new(),
            http: HttpIngress::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn events(&self) -> &EventRegistry {
        &self.events
    }

    pub fn state_bags(&self) -> &StateBags {
        &self.state_bags
    }

    pub fn convars(&self) -> &ConvarListeners {
        &self.convars
    }

    pub fn http(&self) -> &HttpIngress {
        &self.http
    }

    /// Run `f` with exclusive use of the invoker.
    ///
    /// Fails with [`InvocationError::Reentrant`] if called from inside another
    /// `call` on the same resource; event handlers run outside of it.
    pub fn call<T>(&self, f: impl FnOnce(&mut Invoker<H>) -> Result<T>) -> Result<T> {
        let mut invoker = self
            .invoker
            .try_borrow_mut()
            .map_err(|_| InvocationError::Reentrant)?;
        f(&mut invoker)
    }

    /// Direct access to the engine host.
    pub fn with_host<T>(&self, f: impl FnOnce(&mut H) -> T) -> Result<T> {
        self.call(|inv| Ok(f(inv.host_mut())))
    }

    // ============================================
    // Events
    // ============================================

    pub fn emit(&self, key: &str, args: &[Value]) -> Result<DispatchOutcome> {
        Ok(self.events.emit(key, args)?)
    }

    /// Serialize `args` and send them to `target` (a player, or
    /// [`crate::handle::ALL_CLIENTS`]). Fire-and-forget: nothing comes back.
    pub fn emit_client(&self, key: &str, target: impl HandleBearing, args: &[Value]) -> Result<()> {
        let target = resolve(&target)?;
        let payload = msgpack::pack(args);
        tracing::debug!(
            "[resource] emit_client '{key}' -> {target} ({} bytes)",
            payload.len()
        );
        self.call(|inv| {
            natives::event::trigger_client_event_internal(inv, key, &target.raw().to_string(), &payload)
        })
    }

    /// Route an inbound client event to `on_client` subscribers.
    pub fn deliver_net_event(&self, name: &str, source: Handle, payload: &[u8]) -> Result<DispatchOutcome> {
        let args = msgpack::unpack(payload)?;
        Ok(self.events.dispatch_client(name, source, &args)?)
    }

    // ============================================
    // State bags
    // ============================================

    /// Ask the engine to set `key` on `bag`. Local handlers hear about it
    /// when the engine reports the change back (see [`Resource::pump`]).
    pub fn set_state_bag_value(&self, bag: &str, key: &str, value: &Value, replicated: bool) -> Result<()> {
        let payload = msgpack::pack_one(value);
        self.call(|inv| natives::state_bag::set_state_bag_value(inv, bag, key, &payload, replicated))
    }

    /// Last value reported for (`bag`, `key`).
    pub fn state_bag_value(&self, bag: &str, key: &str) -> Option<Value> {
        self.state_bags.get(bag, key)
    }

    pub fn deliver_state_bag_change(
        &self,
        bag: &str,
        key: &str,
        payload: &[u8],
        replicated: bool,
    ) -> Result<DispatchOutcome> {
        let value = if payload.is_empty() {
            Value::Nil
        } else {
            msgpack::unpack_one(payload)?
        };
        Ok(self.state_bags.apply(StateBagChange {
            bag_name: bag.to_string(),
            key: key.to_string(),
            value,
            replicated,
        })?)
    }

    // ============================================
    // Convars
    // ============================================

    pub fn get_convar(&self, name: &str, default: &str) -> Result<String> {
        self.call(|inv| natives::convar::get_convar(inv, name, default))
    }

    pub fn get_convar_int(&self, name: &str, default: i32) -> Result<i32> {
        self.call(|inv| natives::convar::get_convar_int(inv, name, default))
    }

    pub fn get_convar_float(&self, name: &str, default: f32) -> Result<f32> {
        self.call(|inv| natives::convar::get_convar_float(inv, name, default))
    }

    pub fn get_convar_bool(&self, name: &str, default: bool) -> Result<bool> {
        self.call(|inv| natives::convar::get_convar_bool(inv, name, default))
    }

    pub fn set_convar(&self, name: &str, value: &str) -> Result<()> {
        self.call(|inv| natives::convar::set_convar(inv, name, value))
    }

    pub fn set_convar_replicated(&self, name: &str, value: &str) -> Result<()> {
        self.call(|inv| natives::convar::set_convar_replicated(inv, name, value))
    }

    pub fn set_convar_server_info(&self, name: &str, value: &str) -> Result<()> {
        self.call(|inv| natives::convar::set_convar_server_info(inv, name, value))
    }

    pub fn add_convar_change_listener(&self, filter: &str, handler: ConvarHandler) -> Cookie {
        self.convars.add(filter, handler)
    }

    pub fn remove_convar_change_listener(&self, cookie: Cookie) -> bool {
        self.convars.remove(cookie)
    }

    pub fn deliver_convar_change(&self, name: &str) -> Result<DispatchOutcome> {
        Ok(self.convars.notify(name)?)
    }

    // ============================================
    // HTTP
    // ============================================

    pub fn set_http_handler(&self, handler: HttpHandler) {
        self.http.set(handler);
    }

    pub fn dispatch_http(
        &self,
        request: Rc<HttpRequest>,
        body: Option<Vec<u8>>,
        sink: Box<dyn ResponseSink>,
    ) -> Result<()> {
        let channel = format!("{} {}", request.method, request.path);
        self.http.dispatch(request, body, sink).map_err(|e| {
            match e.downcast::<crate::error::HttpError>() {
                Ok(http) => BridgeError::Http(http),
                Err(e) => DispatchError {
                    channel,
                    outcome: DispatchOutcome {
                        handlers_run: 1,
                        canceled: false,
                    },
                    failures: vec![e],
                }
                .into(),
            }
        })
    }

    /// Start an outbound request. Returns the engine's request token.
    pub fn perform_http_request(&self, options: &HttpRequestOptions) -> Result<i32> {
        let payload = msgpack::to_payload(options)?;
        self.call(|inv| natives::http::perform_http_request_internal(inv, &payload))
    }

    // ============================================
    // Lifecycle
    // ============================================

    /// Route every notification pending at the start of the pass. Anything
    /// the handlers cause the engine to report waits for the next pass. A
    /// failing notification is recorded and the pass continues.
    pub fn pump(&self) -> Result<PumpReport> {
        let pending: Vec<HostNotification> = self.call(|inv| {
            Ok(std::iter::from_fn(|| inv.poll_notification()).collect())
        })?;

        let mut report = PumpReport::default();
        for notification in pending {
            report.delivered += 1;
            let routed = match notification {
                HostNotification::NetEvent { name, source, payload } => {
                    self.deliver_net_event(&name, source, &payload).map(drop)
                }
                HostNotification::StateBagChanged {
                    bag,
                    key,
                    payload,
                    replicated,
                } => self
                    .deliver_state_bag_change(&bag, &key, &payload, replicated)
                    .map(drop),
                HostNotification::ConvarChanged { name } => self.deliver_convar_change(&name).map(drop),
            };
            if let Err(e) = routed {
                tracing::warn!("[resource] {}: notification failed: {e}", self.name);
                report.failures.push(e);
            }
        }
        Ok(report)
    }

    /// Tear down every subscription, cookie and the HTTP handler.
    pub fn stop(&self) {
        self.events.remove_all_listeners(None);
        self.state_bags.clear_handlers();
        self.convars.clear();
        self.http.clear();
        tracing::info!("[resource] {} stopped", self.name);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::codec::Vector3;
    use crate::events::handler;
    use crate::handle::ALL_CLIENTS;
    use crate::invoker::memory::MemoryHost;

    fn resource() -> Resource<MemoryHost> {
        Resource::new("test", MemoryHost::new("test"))
    }

    #[test]
    fn test_emit_client_serializes_arguments() {
        let res = resource();
        res.emit_client("hud:update", ALL_CLIENTS, &[Value::Int(5), Value::from("x")])
            .unwrap();
        let sent = res.with_host(|h| h.sent_client_events().to_vec()).unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].name, "hud:update");
        assert_eq!(sent[0].target, "-1");
        assert_eq!(sent[0].args, vec![Value::Int(5), Value::from("x")]);
    }

    #[test]
    fn test_reentrant_call_is_rejected() {
        let res = resource();
        let err = res
            .call(|_| res.get_convar("x", "y").map(drop))
            .unwrap_err();
        assert!(matches!(err, BridgeError::Invocation(InvocationError::Reentrant)));
    }

    #[test]
    fn test_state_bag_write_round_trips_through_pump() {
        let res = resource();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        res.state_bags().add_change_handler(
            "fuel",
            "",
            crate::state_bag::handler(move |bags, change| {
                assert_eq!(bags.get(&change.bag_name, &change.key), None);
                h.set(h.get() + 1);
                Ok(())
            }),
        );
        res.set_state_bag_value("entity:1", "fuel", &Value::Float(0.75), true)
            .unwrap();
        // nothing yet: the change arrives through the host
        assert_eq!(hits.get(), 0);
        let report = res.pump().unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(hits.get(), 1);
        assert_eq!(res.state_bag_value("entity:1", "fuel"), Some(Value::Float(0.75)));
    }

    #[test]
    fn test_handlers_may_call_natives() {
        let res = Rc::new(resource());
        let car = res
            .with_host(|h| h.spawn_vehicle(Vector3::new(1.0, 1.0, 1.0)))
            .unwrap();
        let r = Rc::clone(&res);
        res.events().on(
            "paint",
            handler(move |_, args| {
                let colour = args.first().and_then(Value::as_i64).unwrap_or(0) as i32;
                r.call(|inv| natives::vehicle::set_vehicle_colours(inv, car, colour, colour))?;
                Ok(())
            }),
        );
        res.emit("paint", &[Value::Int(12)]).unwrap();
        let colours = res
            .call(|inv| natives::vehicle::get_vehicle_colours(inv, car))
            .unwrap();
        assert_eq!(colours, (12, 12));
    }

    #[test]
    fn test_pump_continues_after_failures() {
        let res = resource();
        res.events()
            .on_client("bad", handler(|_, _| anyhow::bail!("handler exploded")));
        let seen = Rc::new(Cell::new(false));
        let s = Rc::clone(&seen);
        res.events().on_client(
            "good",
            handler(move |_, _| {
                s.set(true);
                Ok(())
            }),
        );
        res.with_host(|h| {
            h.queue_net_event("bad", Handle(1), &[]);
            h.queue_net_event("good", Handle(1), &[]);
        })
        .unwrap();

        let report = res.pump().unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failures.len(), 1);
        assert!(seen.get());
    }

    #[test]
    fn test_stop_tears_everything_down() {
        let res = resource();
        res.events().on("a", handler(|_, _| Ok(())));
        res.state_bags()
            .add_change_handler("", "", crate::state_bag::handler(|_, _| Ok(())));
        res.add_convar_change_listener("", crate::convar::listener(|_| Ok(())));
        res.set_http_handler(crate::http::http_handler(|_, mut r| {
            r.send(None)?;
            Ok(())
        }));

        res.stop();

        assert_eq!(res.emit("a", &[]).unwrap().handlers_run, 0);
        assert_eq!(res.state_bags().handler_count(), 0);
        assert!(res.convars().is_empty());
        assert!(!res.http().is_set());
    }

    #[test]
    fn test_perform_http_request_serializes_options() {
        let res = resource();
        let token = res
            .perform_http_request(&HttpRequestOptions::get("http://localhost/status"))
            .unwrap();
        assert_eq!(token, 1);
        let sent = res.with_host(|h| h.http_requests().to_vec()).unwrap();
        let opts: HttpRequestOptions = msgpack::from_payload(&sent[0]).unwrap();
        assert_eq!(opts.url, "http://localhost/status");
    }
}
