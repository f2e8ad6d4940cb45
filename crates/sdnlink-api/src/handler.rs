// Request handler: one outbound HTTP call against an ordered set of
// controller endpoints.
//
// Failover is linear and transport-level only: a connection that
// cannot be established moves on to the next configured address, while
// any HTTP response at all (including 4xx/5xx) ends the attempt loop
// and is handed back to the caller as data. Session continuity is a
// single opaque cookie owned here and nowhere else.

use std::time::Duration;

use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::codec::{self, Format, Payload};
use crate::error::Error;

/// Sentinel status returned when every configured controller fails at
/// the transport level. Mirrors HTTP 408 but is produced locally.
pub const TIMEOUT_STATUS: u16 = 408;

/// Literal body accompanying [`TIMEOUT_STATUS`].
pub const UNREACHABLE_BODY: &str = "could not reach any configured controller";

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// The ordered set of controller endpoints.
///
/// The host list keeps its configured order for the lifetime of the
/// handler; only the notion of the *current* host shifts at runtime.
#[derive(Debug, Clone)]
pub struct Endpoints {
    hosts: Vec<String>,
    port: u16,
    base_url: String,
    scheme: &'static str,
}

impl Endpoints {
    /// Build an endpoint set. At least one host is required.
    pub fn new(hosts: Vec<String>, port: u16, base_url: impl Into<String>) -> Result<Self, Error> {
        if hosts.is_empty() {
            return Err(Error::NoEndpoints);
        }
        Ok(Self {
            hosts,
            port,
            base_url: base_url.into(),
            // Controllers only speak TLS, with self-signed certificates.
            scheme: "https",
        })
    }

    /// Override the URL scheme (plain HTTP for mock controllers).
    pub fn with_scheme(mut self, scheme: &'static str) -> Self {
        self.scheme = scheme;
        self
    }

    /// The configured hosts, in their original order.
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// First configured host; the handler starts here.
    pub(crate) fn first(&self) -> &str {
        &self.hosts[0]
    }

    /// Full request URL for one host.
    ///
    /// A host may carry its own `:port`, which wins over the shared
    /// configured port.
    fn url(&self, host: &str, path: &str) -> Result<Url, Error> {
        let authority = if host.contains(':') {
            host.to_owned()
        } else {
            format!("{host}:{}", self.port)
        };
        let base = match self.base_url.trim_matches('/') {
            "" => String::from("/"),
            trimmed => format!("/{trimmed}/"),
        };
        let root = Url::parse(&format!("{}://{authority}{base}", self.scheme))?;
        Ok(root.join(path.trim_start_matches('/'))?)
    }

    /// The hosts to try for one call, in order.
    ///
    /// When the current host is not the configured default it is tried
    /// first, followed by the full configured list. This duplicates the
    /// current host's slot in the sequence on purpose: a previously
    /// failed-over controller gets first shot, but the canonical order
    /// is still exhausted behind it.
    fn attempt_order(&self, current: &str) -> Vec<String> {
        let mut order = Vec::with_capacity(self.hosts.len() + 1);
        if current != self.first() {
            order.push(current.to_owned());
        }
        order.extend(self.hosts.iter().cloned());
        order
    }
}

/// Basic-auth credential pair for the controller.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub userid: String,
    pub password: SecretString,
}

/// Everything the handler needs at construction time.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    pub endpoints: Endpoints,
    pub credentials: Option<Credentials>,
    pub timeout: Duration,
    pub format: Format,
}

/// Mutable per-process session state, guarded by the handler's lock.
struct Session {
    cookie: Option<String>,
    current: String,
    changed: bool,
}

/// Issues HTTP calls against the controller set with linear failover.
///
/// One handler is shared across all call sites; the session lock
/// serializes controller I/O process-wide, so at most one outbound
/// request (including its failover sequence) is in flight at a time.
pub struct RequestHandler {
    http: reqwest::Client,
    endpoints: Endpoints,
    credentials: Option<Credentials>,
    format: Format,
    session: Mutex<Session>,
}

impl RequestHandler {
    pub fn new(config: HandlerConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))?;

        let current = config.endpoints.first().to_owned();
        info!(controllers = ?config.endpoints.hosts(), "available SDN controllers");
        info!(controller = %current, "active SDN controller");

        Ok(Self {
            http,
            endpoints: config.endpoints,
            credentials: config.credentials,
            format: config.format,
            session: Mutex::new(Session {
                cookie: None,
                current,
                changed: false,
            }),
        })
    }

    /// The negotiated wire format.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Issue one request, failing over across controllers as needed.
    ///
    /// Returns `(status, decoded_body)` for the first controller that
    /// produces *any* HTTP response; an application-level error status
    /// is data, not failure. Exhausting every endpoint at the transport
    /// level yields [`TIMEOUT_STATUS`] with [`UNREACHABLE_BODY`]. The
    /// only `Err` paths are a request body that cannot be encoded and
    /// a host that does not form a valid URL.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Map<String, Value>>,
        params: Option<&[(String, String)]>,
    ) -> Result<(u16, Payload), Error> {
        let encoded = match body {
            Some(attrs) => Some(codec::encode(attrs, self.format)?),
            None => None,
        };

        // Single-flight across the whole failover sequence: the cookie
        // and the current-controller marker must not be observed
        // half-updated by a concurrent caller.
        let mut session = self.session.lock().await;

        for host in self.endpoints.attempt_order(&session.current) {
            let url = self.endpoints.url(&host, path)?;
            debug!(%method, %url, body = ?encoded, "sending request to controller");

            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .header(CONTENT_TYPE, self.format.content_type());
            if let Some(cookie) = &session.cookie {
                request = request.header(COOKIE, cookie);
            }
            if let Some(creds) = &self.credentials {
                request = request.basic_auth(&creds.userid, Some(creds.password.expose_secret()));
            }
            if let Some(params) = params {
                request = request.query(params);
            }
            if let Some(encoded) = &encoded {
                request = request.body(encoded.clone());
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    error!(%url, error = %e, "could not reach controller");
                    session.cookie = None;
                    continue;
                }
            };

            let status = response.status().as_u16();
            let set_cookie = response
                .headers()
                .get(SET_COOKIE)
                .and_then(|v| v.to_str().ok())
                .map(String::from);

            let text = match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    error!(%url, error = %e, "connection lost while reading response");
                    session.cookie = None;
                    continue;
                }
            };

            if (200..300).contains(&status) {
                debug!(status, "received response from controller");
            } else {
                debug!(status, body = %text, "controller returned error status");
            }

            if let Some(cookie) = set_cookie {
                session.cookie = Some(cookie);
            }

            let decoded = codec::decode(&text, status, self.format);
            debug!(body = %decoded, "decoded response body");

            if host != session.current {
                info!(controller = %host, "failed over to new controller");
                session.changed = true;
                session.current = host;
            }

            return Ok((status, decoded));
        }

        warn!("all configured controllers unreachable");
        Ok((TIMEOUT_STATUS, Payload::Raw(UNREACHABLE_BODY.into())))
    }

    /// The new current controller, reported exactly once per failover.
    ///
    /// Callers that broadcast controller changes poll this; the flag
    /// resets on read.
    pub async fn controller_if_changed(&self) -> Option<String> {
        let mut session = self.session.lock().await;
        if session.changed {
            session.changed = false;
            Some(session.current.clone())
        } else {
            None
        }
    }
}
