use chub_search::remote::transport::{ProxyMethod, TransportError};
use chub_search::remote::{ProxyRequest, ProxyResponse, ProxyTransport};
use std::sync::{Arc, Mutex};

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: Arc<Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Assert that the captured log output contains the provided substring.
    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

struct TestWriter(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[allow(dead_code)]
pub struct EnvGuard {
    key: String,
    prev: Option<String>,
}

#[allow(dead_code)]
impl EnvGuard {
    pub fn set(key: &str, val: impl AsRef<str>) -> Self {
        let prev = std::env::var(key).ok();
        unsafe { std::env::set_var(key, val.as_ref()) };
        Self {
            key: key.to_string(),
            prev,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.prev {
            Some(v) => unsafe { std::env::set_var(&self.key, v) },
            None => unsafe { std::env::remove_var(&self.key) },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Verb {
    Get,
    Post,
}

#[derive(Clone, Debug)]
enum Reply {
    Respond(ProxyResponse),
    Fail,
}

#[derive(Clone, Debug)]
struct Route {
    verb: Verb,
    prefix: String,
    reply: Reply,
}

/// Scripted in-memory transport. Routes match on method and target prefix,
/// first match wins; anything unrouted answers 404. Clones share state.
#[allow(dead_code)]
#[derive(Clone, Debug, Default)]
pub struct FakeTransport {
    routes: Arc<Mutex<Vec<Route>>>,
    requests: Arc<Mutex<Vec<ProxyRequest>>>,
}

#[allow(dead_code)]
impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn route(self, verb: Verb, prefix: &str, reply: Reply) -> Self {
        self.routes.lock().unwrap().push(Route {
            verb,
            prefix: prefix.to_string(),
            reply,
        });
        self
    }

    pub fn on_get(self, prefix: &str, status: u16, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        let response = ProxyResponse {
            status,
            content_type: content_type.to_string(),
            body: body.into(),
        };
        self.route(Verb::Get, prefix, Reply::Respond(response))
    }

    pub fn on_post(self, prefix: &str, status: u16, body: impl Into<Vec<u8>>) -> Self {
        let response = ProxyResponse {
            status,
            content_type: "application/json".to_string(),
            body: body.into(),
        };
        self.route(Verb::Post, prefix, Reply::Respond(response))
    }

    /// The request never reaches the target.
    pub fn fail_get(self, prefix: &str) -> Self {
        self.route(Verb::Get, prefix, Reply::Fail)
    }

    pub fn requests(&self) -> Vec<ProxyRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn targets(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.target).collect()
    }
}

impl ProxyTransport for FakeTransport {
    async fn fetch(&self, request: ProxyRequest) -> Result<ProxyResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let verb = match request.method {
            ProxyMethod::Get => Verb::Get,
            ProxyMethod::Post(_) => Verb::Post,
        };
        let reply = self
            .routes
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.verb == verb && request.target.starts_with(&r.prefix))
            .map(|r| r.reply.clone());
        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail) => Err(TransportError::InvalidProxy {
                url: request.target,
                reason: "connection refused".to_string(),
            }),
            None => Ok(ProxyResponse {
                status: 404,
                content_type: "text/plain".to_string(),
                body: Vec::new(),
            }),
        }
    }
}
