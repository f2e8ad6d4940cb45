// Resource client: logical resource kinds mapped onto the controller's
// REST paths, with CRUD verbs built on the request handler.
//
// Application-level error statuses pass through unchanged; deciding
// whether a non-acceptable status is fatal belongs to the driver, not
// here. The one policy this layer owns is the acceptable-status set
// used for tenant resolution.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::codec::{Format, Payload};
use crate::error::Error;
use crate::fake::FakeClient;
use crate::handler::{HandlerConfig, RequestHandler};

/// Controller-side marker for overlay tenants.
const CONTROLLER_OVERLAY_TYPE: &str = "DOVE";

/// Logical resource kinds managed through the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ResourceKind {
    Network,
    Subnet,
    Port,
    Router,
    FloatingIp,
    Tenant,
}

impl ResourceKind {
    /// URL path segment for this resource's collection.
    pub fn path(self) -> &'static str {
        match self {
            Self::Network => "networks",
            Self::Subnet => "subnets",
            Self::Port => "ports",
            Self::Router => "routers",
            Self::FloatingIp => "floatingips",
            Self::Tenant => "tenants",
        }
    }
}

/// The set of HTTP statuses treated as success.
///
/// Injectable rather than hardcoded: callers differentiate fatal from
/// best-effort handling based on membership in this set.
#[derive(Debug, Clone)]
pub struct AcceptablePolicy {
    codes: Vec<u16>,
}

impl Default for AcceptablePolicy {
    fn default() -> Self {
        Self {
            codes: vec![200, 201, 202, 204],
        }
    }
}

impl AcceptablePolicy {
    pub fn new(codes: Vec<u16>) -> Self {
        Self { codes }
    }

    pub fn is_acceptable(&self, status: u16) -> bool {
        self.codes.contains(&status)
    }
}

/// Local tenant classification, mapped from the controller's type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantType {
    Of,
    Overlay,
    /// Any controller-reported type that is not a recognized literal
    /// passes through untouched.
    Other(String),
}

/// Result of a controller-side tenant lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTenant {
    /// Controller-reported tenant id, when the response carried one.
    pub id: Option<String>,
    /// `None` when the response carried no type; an absent type passes
    /// through rather than defaulting.
    pub tenant_type: Option<TenantType>,
}

/// Capability interface over the controller: CRUD verbs plus tenant
/// resolution. Two implementations exist -- the real [`SdnClient`] and
/// the no-op [`FakeClient`] -- selected at construction time.
#[async_trait]
pub trait ControllerClient: Send + Sync {
    async fn list(
        &self,
        kind: ResourceKind,
        params: &[(String, String)],
    ) -> Result<(u16, Payload), Error>;

    async fn show(
        &self,
        kind: ResourceKind,
        id: &str,
        params: &[(String, String)],
    ) -> Result<(u16, Payload), Error>;

    async fn create(
        &self,
        kind: ResourceKind,
        body: &Map<String, Value>,
    ) -> Result<(u16, Payload), Error>;

    /// Update a resource. `target` is normally an id but may carry a
    /// sub-action suffix (`{id}/add_router_interface`).
    async fn update(
        &self,
        kind: ResourceKind,
        target: &str,
        body: &Map<String, Value>,
    ) -> Result<(u16, Payload), Error>;

    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<(u16, Payload), Error>;

    /// Look up a tenant on the controller and map its reported type to
    /// the local classification. `None` when the lookup did not return
    /// an acceptable status.
    async fn resolve_tenant(&self, tenant_id: &str) -> Result<Option<ResolvedTenant>, Error>;

    /// The new active controller, reported exactly once after failover.
    async fn changed_controller(&self) -> Option<String>;
}

/// Minimal update body: only the keys of `current` whose value differs
/// from `original`. Keys absent from `original` count as changed; equal
/// keys are dropped.
pub fn diff(current: &Map<String, Value>, original: &Map<String, Value>) -> Map<String, Value> {
    let changed: Map<String, Value> = current
        .iter()
        .filter(|(key, value)| original.get(key.as_str()) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    debug!(full = ?current, minimal = ?changed, "computed update diff");
    changed
}

/// Attribute-name normalization applied to outbound JSON bodies:
/// `:` becomes `_` in top-level keys, and unset (null) attributes are
/// dropped entirely.
fn normalize(body: &Map<String, Value>, format: Format) -> Map<String, Value> {
    if format != Format::Json {
        return body.clone();
    }
    body.iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.replace(':', "_"), value.clone()))
        .collect()
}

/// REST client for a live SDN controller.
pub struct SdnClient {
    handler: RequestHandler,
    acceptable: AcceptablePolicy,
}

impl SdnClient {
    pub fn new(config: HandlerConfig, acceptable: AcceptablePolicy) -> Result<Self, Error> {
        Ok(Self {
            handler: RequestHandler::new(config)?,
            acceptable,
        })
    }
}

#[async_trait]
impl ControllerClient for SdnClient {
    async fn list(
        &self,
        kind: ResourceKind,
        params: &[(String, String)],
    ) -> Result<(u16, Payload), Error> {
        self.handler
            .execute(Method::GET, kind.path(), None, Some(params))
            .await
    }

    async fn show(
        &self,
        kind: ResourceKind,
        id: &str,
        params: &[(String, String)],
    ) -> Result<(u16, Payload), Error> {
        let path = format!("{}/{id}", kind.path());
        self.handler
            .execute(Method::GET, &path, None, Some(params))
            .await
    }

    async fn create(
        &self,
        kind: ResourceKind,
        body: &Map<String, Value>,
    ) -> Result<(u16, Payload), Error> {
        let body = normalize(body, self.handler.format());
        self.handler
            .execute(Method::POST, kind.path(), Some(&body), None)
            .await
    }

    async fn update(
        &self,
        kind: ResourceKind,
        target: &str,
        body: &Map<String, Value>,
    ) -> Result<(u16, Payload), Error> {
        let body = normalize(body, self.handler.format());
        let path = format!("{}/{target}", kind.path());
        self.handler
            .execute(Method::PUT, &path, Some(&body), None)
            .await
    }

    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<(u16, Payload), Error> {
        let path = format!("{}/{id}", kind.path());
        self.handler.execute(Method::DELETE, &path, None, None).await
    }

    async fn resolve_tenant(&self, tenant_id: &str) -> Result<Option<ResolvedTenant>, Error> {
        let (status, payload) = self.show(ResourceKind::Tenant, tenant_id, &[]).await?;
        if !self.acceptable.is_acceptable(status) {
            return Ok(None);
        }

        let id = payload
            .get("id")
            .and_then(Value::as_str)
            .map(String::from);
        let tenant_type = payload
            .get("network_type")
            .and_then(Value::as_str)
            .map(|reported| match reported {
                CONTROLLER_OVERLAY_TYPE => TenantType::Overlay,
                "OF" => TenantType::Of,
                other => TenantType::Other(other.to_owned()),
            });
        Ok(Some(ResolvedTenant { id, tenant_type }))
    }

    async fn changed_controller(&self) -> Option<String> {
        self.handler.controller_if_changed().await
    }
}

/// Select the real or the no-op client from configuration.
pub fn build_client(
    config: HandlerConfig,
    acceptable: AcceptablePolicy,
    use_fake: bool,
) -> Result<Arc<dyn ControllerClient>, Error> {
    if use_fake {
        info!("fake SDN controller in use");
        Ok(Arc::new(FakeClient::default()))
    } else {
        Ok(Arc::new(SdnClient::new(config, acceptable)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test bodies are objects"),
        }
    }

    #[test]
    fn diff_keeps_only_changed_keys() {
        let current = map(json!({"name": "net-b", "shared": true, "mtu": 1500}));
        let original = map(json!({"name": "net-a", "shared": true, "mtu": 1500}));
        assert_eq!(diff(&current, &original), map(json!({"name": "net-b"})));
    }

    #[test]
    fn diff_treats_missing_original_key_as_changed() {
        let current = map(json!({"name": "net-a", "description": "added"}));
        let original = map(json!({"name": "net-a"}));
        assert_eq!(diff(&current, &original), map(json!({"description": "added"})));
    }

    #[test]
    fn diff_of_identical_maps_is_empty() {
        let attrs = map(json!({"name": "net-a", "pools": [{"start": "10.0.0.2"}]}));
        assert!(diff(&attrs, &attrs).is_empty());
    }

    #[test]
    fn normalize_renames_colon_keys_and_drops_unset() {
        let body = map(json!({
            "router:external": true,
            "name": "ext-net",
            "description": null,
        }));
        let normalized = normalize(&body, Format::Json);
        assert_eq!(
            normalized,
            map(json!({"router_external": true, "name": "ext-net"}))
        );
    }

    #[test]
    fn normalize_is_identity_for_xml() {
        let body = map(json!({"router:external": true, "description": null}));
        assert_eq!(normalize(&body, Format::Xml), body);
    }

    #[test]
    fn resource_paths() {
        assert_eq!(ResourceKind::Network.path(), "networks");
        assert_eq!(ResourceKind::FloatingIp.path(), "floatingips");
        assert_eq!(ResourceKind::Tenant.path(), "tenants");
    }

    #[test]
    fn default_acceptable_statuses() {
        let policy = AcceptablePolicy::default();
        for status in [200, 201, 202, 204] {
            assert!(policy.is_acceptable(status));
        }
        assert!(!policy.is_acceptable(404));
        assert!(!policy.is_acceptable(500));
    }
}
