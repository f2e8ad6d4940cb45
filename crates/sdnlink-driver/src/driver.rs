// Lifecycle event translator for networks, subnets, and ports.
//
// Every operation follows the same three-phase shape: a pre-phase that
// validates and defaults attributes without touching the network, an
// apply-phase that issues exactly one controller call, and a
// post-phase that decides severity. Create and update failures abort
// the caller's transaction; delete failures are logged only, because
// the local record is already gone.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, error};

use sdnlink_api::{AcceptablePolicy, ControllerClient, Payload, ResourceKind, diff};

use crate::error::DriverError;
use crate::overlap;
use crate::store::NetworkStore;

/// Port attributes the controller manages itself; never sent on update.
const PORT_UPDATE_STRIP: &[&str] = &["security_groups", "status", "fixed_ips", "admin_state_up"];

/// Attributes rejected when present in an update diff. The controller
/// currently restricts nothing, but the pre-update hook stays wired.
const NETWORK_UPDATE_RESTRICTED: &[&str] = &[];
const SUBNET_UPDATE_RESTRICTED: &[&str] = &[];

/// One lifecycle event as handed down by the orchestration framework:
/// the resource's current attributes, its pre-event snapshot, and a
/// read handle into the framework's persistent store.
pub struct EventContext<'a> {
    pub current: &'a Map<String, Value>,
    pub original: &'a Map<String, Value>,
    pub store: &'a dyn NetworkStore,
}

/// Wrap an attribute map under its resource-kind key, the body shape
/// the controller expects (`{"network": {...}}`).
pub(crate) fn wrap(kind_key: &str, attrs: Map<String, Value>) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert(kind_key.to_owned(), Value::Object(attrs));
    body
}

/// Translates orchestration lifecycle events into controller calls.
pub struct SdnDriver {
    pub(crate) client: Arc<dyn ControllerClient>,
    pub(crate) acceptable: AcceptablePolicy,
}

impl SdnDriver {
    pub fn new(client: Arc<dyn ControllerClient>, acceptable: AcceptablePolicy) -> Self {
        Self { client, acceptable }
    }

    /// Fatal post-check for creates and updates.
    pub(crate) fn expect_acceptable(
        &self,
        operation: &'static str,
        status: u16,
        data: &Payload,
    ) -> Result<(), DriverError> {
        if self.acceptable.is_acceptable(status) {
            Ok(())
        } else {
            Err(DriverError::OperationFailed {
                operation,
                status,
                message: data.to_string(),
            })
        }
    }

    /// Best-effort post-check for deletes and rollback compensations.
    pub(crate) fn log_unacceptable(&self, operation: &str, status: u16, data: &Payload) {
        if !self.acceptable.is_acceptable(status) {
            error!(operation, status, body = %data, "best-effort controller operation failed");
        }
    }

    /// Reject an update diff that touches a restricted attribute.
    fn check_restricted(
        diffed: &Map<String, Value>,
        restricted: &[&str],
    ) -> Result<(), DriverError> {
        for key in diffed.keys() {
            if restricted.contains(&key.as_str()) {
                return Err(DriverError::InvalidInput {
                    message: format!("update of {key} is not supported by the SDN controller"),
                });
            }
        }
        Ok(())
    }

    /// Default an empty tenant attribution.
    ///
    /// Ports inherit the owning network's tenant; any resource may fall
    /// back to the `"HA <kind> tenant <id>"` naming convention, taking
    /// the token after the last space. A tenant that stays empty is a
    /// validation failure.
    async fn ensure_tenant(
        &self,
        ctx: &EventContext<'_>,
        resource: &mut Map<String, Value>,
        kind: ResourceKind,
    ) -> Result<(), DriverError> {
        let already_set = resource
            .get("tenant_id")
            .and_then(Value::as_str)
            .is_some_and(|tenant| !tenant.is_empty());
        if already_set {
            return Ok(());
        }

        let mut tenant_id = String::new();
        if kind == ResourceKind::Port {
            if let Some(network_id) = resource.get("network_id").and_then(Value::as_str) {
                if let Some(network) = ctx.store.network(network_id).await? {
                    if let Some(owner) = network.tenant_id.filter(|t| !t.is_empty()) {
                        tenant_id = owner;
                    }
                }
            }
        }

        if tenant_id.is_empty() {
            let token = format!("HA {kind} tenant");
            if let Some(name) = resource.get("name").and_then(Value::as_str) {
                if name.contains(&token) {
                    if let Some((_, id)) = name.rsplit_once(' ') {
                        tenant_id = id.to_owned();
                    }
                }
            }
        }

        if tenant_id.is_empty() {
            return Err(DriverError::InvalidInput {
                message: "tenant cannot be empty".into(),
            });
        }
        debug!(%kind, tenant = %tenant_id, "defaulted empty tenant attribution");
        resource.insert("tenant_id".into(), Value::String(tenant_id));
        Ok(())
    }

    fn resource_id(attrs: &Map<String, Value>) -> Result<&str, DriverError> {
        attrs
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::InvalidInput {
                message: "resource is missing its id".into(),
            })
    }

    // ── Networks ─────────────────────────────────────────────────────

    pub async fn create_network(&self, ctx: EventContext<'_>) -> Result<(), DriverError> {
        let mut network = ctx.current.clone();
        self.ensure_tenant(&ctx, &mut network, ResourceKind::Network)
            .await?;
        debug!(network = ?network, "create network in progress");

        let (status, data) = self
            .client
            .create(ResourceKind::Network, &wrap("network", network))
            .await?;
        self.expect_acceptable("create network", status, &data)
    }

    pub async fn update_network(&self, ctx: EventContext<'_>) -> Result<(), DriverError> {
        let changed = diff(ctx.current, ctx.original);
        Self::check_restricted(&changed, NETWORK_UPDATE_RESTRICTED)?;
        if changed.is_empty() {
            debug!("network update carries no changed fields; skipping call");
            return Ok(());
        }
        let id = Self::resource_id(ctx.current)?;

        let (status, data) = self
            .client
            .update(ResourceKind::Network, id, &wrap("network", changed))
            .await?;
        self.expect_acceptable("update network", status, &data)
    }

    pub async fn delete_network(&self, ctx: EventContext<'_>) -> Result<(), DriverError> {
        let id = Self::resource_id(ctx.current)?;
        debug!(id, "delete network in progress");

        let (status, data) = self.client.delete(ResourceKind::Network, id).await?;
        self.log_unacceptable("delete network", status, &data);
        Ok(())
    }

    // ── Subnets ──────────────────────────────────────────────────────

    pub async fn create_subnet(&self, ctx: EventContext<'_>) -> Result<(), DriverError> {
        let mut subnet = ctx.current.clone();
        self.ensure_tenant(&ctx, &mut subnet, ResourceKind::Subnet)
            .await?;

        if let Some(id) = overlap::pool_overlap(ctx.store, &subnet).await? {
            return Err(DriverError::InvalidInput {
                message: format!("create subnet failed: IP pool overlap with subnet {id}"),
            });
        }
        if let Some(id) = overlap::cidr_overlap(ctx.store, &subnet).await? {
            return Err(DriverError::InvalidInput {
                message: format!("create subnet failed: CIDR overlap with subnet {id}"),
            });
        }

        // The controller wants an absent gateway spelled out.
        if matches!(subnet.get("gateway_ip"), None | Some(Value::Null)) {
            subnet.insert("gateway_ip".into(), Value::String("null".into()));
        }
        debug!(subnet = ?subnet, "create subnet in progress");

        let (status, data) = self
            .client
            .create(ResourceKind::Subnet, &wrap("subnet", subnet))
            .await?;
        self.expect_acceptable("create subnet", status, &data)
    }

    pub async fn update_subnet(&self, ctx: EventContext<'_>) -> Result<(), DriverError> {
        let mut changed = diff(ctx.current, ctx.original);
        Self::check_restricted(&changed, SUBNET_UPDATE_RESTRICTED)?;
        if changed.is_empty() {
            debug!("subnet update carries no changed fields; skipping call");
            return Ok(());
        }
        if matches!(changed.get("gateway_ip"), Some(Value::Null)) {
            changed.insert("gateway_ip".into(), Value::String("null".into()));
        }
        let id = Self::resource_id(ctx.current)?;

        let (status, data) = self
            .client
            .update(ResourceKind::Subnet, id, &wrap("subnet", changed))
            .await?;
        self.expect_acceptable("update subnet", status, &data)
    }

    pub async fn delete_subnet(&self, ctx: EventContext<'_>) -> Result<(), DriverError> {
        let id = Self::resource_id(ctx.current)?;
        debug!(id, "delete subnet in progress");

        let (status, data) = self.client.delete(ResourceKind::Subnet, id).await?;
        self.log_unacceptable("delete subnet", status, &data);
        Ok(())
    }

    // ── Ports ────────────────────────────────────────────────────────

    pub async fn create_port(&self, ctx: EventContext<'_>) -> Result<(), DriverError> {
        let mut port = ctx.current.clone();
        // An unbound port confuses the controller's scheduler; a single
        // space stands in for "no host".
        let host_unset = port
            .get("binding:host_id")
            .and_then(Value::as_str)
            .is_none_or(str::is_empty);
        if host_unset {
            port.insert("binding:host_id".into(), Value::String(" ".into()));
        }
        self.ensure_tenant(&ctx, &mut port, ResourceKind::Port)
            .await?;
        debug!(port = ?port, "create port in progress");

        let (status, data) = self
            .client
            .create(ResourceKind::Port, &wrap("port", port))
            .await?;
        self.expect_acceptable("create port", status, &data)
    }

    pub async fn update_port(&self, ctx: EventContext<'_>) -> Result<(), DriverError> {
        let mut changed = diff(ctx.current, ctx.original);
        for key in PORT_UPDATE_STRIP {
            changed.remove(*key);
        }
        if changed.is_empty() {
            debug!("port update carries no changed fields; skipping call");
            return Ok(());
        }
        let id = Self::resource_id(ctx.current)?;

        let (status, data) = self
            .client
            .update(ResourceKind::Port, id, &wrap("port", changed))
            .await?;
        self.expect_acceptable("update port", status, &data)
    }

    /// Pre-delete phase: disassociate every floating IP still bound to
    /// the port. Best-effort -- a failed disassociation is logged and
    /// the delete proceeds.
    pub async fn pre_delete_port(&self, ctx: EventContext<'_>) -> Result<(), DriverError> {
        let port_id = Self::resource_id(ctx.current)?;
        for floating_ip in ctx.store.floating_ips_for_port(port_id).await? {
            debug!(floating_ip = %floating_ip.id, "disassociating floating IP before port delete");
            let (status, data) = self
                .client
                .update(
                    ResourceKind::FloatingIp,
                    &floating_ip.id,
                    &wrap("floatingip", Map::new()),
                )
                .await?;
            self.log_unacceptable("disassociate floating ip", status, &data);
        }
        Ok(())
    }

    pub async fn delete_port(&self, ctx: EventContext<'_>) -> Result<(), DriverError> {
        let id = Self::resource_id(ctx.current)?;
        debug!(id, "delete port in progress");

        let (status, data) = self.client.delete(ResourceKind::Port, id).await?;
        self.log_unacceptable("delete port", status, &data);
        Ok(())
    }
}
