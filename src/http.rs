//! HTTP ingress: one handler per resource, plus outbound request options.
//!
//! The handler receives the request descriptor and a response controller.
//! The body is delivered afterwards to whichever data handler the request
//! handler installed, so a handler that ignores the body never pays for
//! decoding it.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::HttpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataMode {
    Text,
    Binary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Text(String),
    Binary(Vec<u8>),
}

type DataHandler = Box<dyn FnOnce(RequestBody) -> anyhow::Result<()>>;
type CancelHandler = Box<dyn FnOnce()>;

pub struct HttpRequest {
    pub address: String,
    /// In arrival order; names keep their original case.
    pub headers: Vec<(String, String)>,
    pub method: String,
    pub path: String,
    data: RefCell<Option<(DataMode, DataHandler)>>,
    cancel: RefCell<Option<CancelHandler>>,
}

impl HttpRequest {
    pub fn new(
        address: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
        headers: Vec<(String, String)>,
    ) -> Self {
        Self {
            address: address.into(),
            headers,
            method: method.into(),
            path: path.into(),
            data: RefCell::new(None),
            cancel: RefCell::new(None),
        }
    }

    /// Case-insensitive header lookup; the first occurrence wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Install the body callback. A later call replaces an earlier one.
    pub fn set_data_handler<F>(&self, mode: DataMode, f: F)
    where
        F: FnOnce(RequestBody) -> anyhow::Result<()> + 'static,
    {
        *self.data.borrow_mut() = Some((mode, Box::new(f)));
    }

    pub fn set_cancel_handler<F>(&self, f: F)
    where
        F: FnOnce() + 'static,
    {
        *self.cancel.borrow_mut() = Some(Box::new(f));
    }

    /// Hand the complete body to the data handler. Returns `false` when no
    /// data handler was installed.
    pub fn deliver_body(&self, body: Vec<u8>) -> anyhow::Result<bool> {
        let Some((mode, f)) = self.data.borrow_mut().take() else {
            return Ok(false);
        };
        let body = match mode {
            DataMode::Binary => RequestBody::Binary(body),
            DataMode::Text => RequestBody::Text(String::from_utf8(body).map_err(|_| HttpError::BodyNotText)?),
        };
        f(body)?;
        Ok(true)
    }

    /// The client went away. Runs the cancel handler at most once.
    pub fn cancel(&self) -> bool {
        let Some(f) = self.cancel.borrow_mut().take() else {
            return false;
        };
        f();
        true
    }
}

/// Where a response ends up.
pub trait ResponseSink {
    fn write_head(&mut self, status: u16, headers: &[(String, String)]);
    fn write(&mut self, chunk: &[u8]);
    fn finish(&mut self);
}

/// Response controller: `write_head` at most once, `write` any number of
/// times, `send` exactly once.
pub struct HttpResponse {
    sink: Box<dyn ResponseSink>,
    head_written: bool,
    sent: bool,
}

impl HttpResponse {
    pub fn new(sink: Box<dyn ResponseSink>) -> Self {
        Self {
            sink,
            head_written: false,
            sent: false,
        }
    }

    pub fn write_head(&mut self, status: u16, headers: &[(String, String)]) -> Result<(), HttpError> {
        if self.sent {
            return Err(HttpError::AlreadySent);
        }
        if self.head_written {
            return Err(HttpError::HeadAlreadyWritten);
        }
        self.sink.write_head(status, headers);
        self.head_written = true;
        Ok(())
    }

    fn ensure_head(&mut self) {
        if !self.head_written {
            self.sink.write_head(200, &[]);
            self.head_written = true;
        }
    }

    /// Writes a `200` head first if none was written.
    pub fn write(&mut self, chunk: &[u8]) -> Result<(), HttpError> {
        if self.sent {
            return Err(HttpError::AlreadySent);
        }
        self.ensure_head();
        self.sink.write(chunk);
        Ok(())
    }

    pub fn send(&mut self, body: Option<&[u8]>) -> Result<(), HttpError> {
        if self.sent {
            return Err(HttpError::AlreadySent);
        }
        self.ensure_head();
        if let Some(body) = body {
            self.sink.write(body);
        }
        self.sink.finish();
        self.sent = true;
        Ok(())
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }
}

impl Drop for HttpResponse {
    fn drop(&mut self) {
        if !self.sent {
            tracing::warn!("[http] response dropped without send()");
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BufferedState {
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub finished: bool,
}

/// Collects the response in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct BufferedResponse {
    inner: Rc<RefCell<BufferedState>>,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> BufferedState {
        self.inner.borrow().clone()
    }
}

impl ResponseSink for BufferedResponse {
    fn write_head(&mut self, status: u16, headers: &[(String, String)]) {
        let mut inner = self.inner.borrow_mut();
        inner.status = Some(status);
        inner.headers = headers.to_vec();
    }

    fn write(&mut self, chunk: &[u8]) {
        self.inner.borrow_mut().body.extend_from_slice(chunk);
    }

    fn finish(&mut self) {
        self.inner.borrow_mut().finished = true;
    }
}

pub type HttpHandler = Rc<dyn Fn(Rc<HttpRequest>, HttpResponse) -> anyhow::Result<()>>;

pub fn http_handler<F>(f: F) -> HttpHandler
where
    F: Fn(Rc<HttpRequest>, HttpResponse) -> anyhow::Result<()> + 'static,
{
    Rc::new(f)
}

/// The single HTTP handler slot of a resource.
#[derive(Default)]
pub struct HttpIngress {
    handler: RefCell<Option<HttpHandler>>,
    requests: Cell<u64>,
}

impl HttpIngress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handler`, replacing any previous one.
    pub fn set(&self, handler: HttpHandler) {
        if self.handler.borrow_mut().replace(handler).is_some() {
            tracing::info!("[http] handler replaced");
        } else {
            tracing::debug!("[http] handler registered");
        }
    }

    pub fn clear(&self) {
        self.handler.borrow_mut().take();
    }

    pub fn is_set(&self) -> bool {
        self.handler.borrow().is_some()
    }

    /// Requests dispatched so far.
    pub fn request_count(&self) -> u64 {
        self.requests.get()
    }

    /// Run the handler, then deliver `body` (if any) to the data handler it
    /// installed.
    pub fn dispatch(
        &self,
        request: Rc<HttpRequest>,
        body: Option<Vec<u8>>,
        sink: Box<dyn ResponseSink>,
    ) -> anyhow::Result<()> {
        let handler = self.handler.borrow().clone().ok_or(HttpError::NoHandler)?;
        self.requests.set(self.requests.get() + 1);
        tracing::debug!("[http] {} {} from {}", request.method, request.path, request.address);
        handler(Rc::clone(&request), HttpResponse::new(sink))?;
        if let Some(body) = body {
            request.deliver_body(body)?;
        }
        Ok(())
    }
}

/// Outbound request, serialized into `PERFORM_HTTP_REQUEST_INTERNAL`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestOptions {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_follow")]
    pub follow_location: bool,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_follow() -> bool {
    true
}

impl HttpRequestOptions {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: default_method(),
            data: String::new(),
            headers: BTreeMap::new(),
            follow_location: true,
        }
    }
}
