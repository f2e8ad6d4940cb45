// L3 operations: routers, router interfaces, floating IPs.
//
// Same three-phase discipline as the L2 driver, with two controller
// quirks handled here: a router created without a gateway still needs
// an explicit empty network id, and clearing a gateway must send a
// null network id rather than an empty mapping.

use serde_json::{Map, Value, json};
use tracing::{debug, error};

use sdnlink_api::{ResourceKind, diff};

use crate::driver::{SdnDriver, wrap};
use crate::error::DriverError;

/// Floating-IP attributes the controller derives itself on create.
const FLOATINGIP_CREATE_STRIP: &[&str] = &["status", "port_id", "router_id", "fixed_ip_address"];

impl SdnDriver {
    // ── Routers ──────────────────────────────────────────────────────

    pub async fn create_router(&self, router: &Map<String, Value>) -> Result<(), DriverError> {
        let mut router = router.clone();
        if matches!(router.get("external_gateway_info"), None | Some(Value::Null)) {
            router.insert("external_gateway_info".into(), json!({"network_id": ""}));
        }
        debug!(router = ?router, "create router in progress");

        let (status, data) = self
            .client
            .create(ResourceKind::Router, &wrap("router", router))
            .await?;
        self.expect_acceptable("create router", status, &data)
    }

    pub async fn update_router(
        &self,
        id: &str,
        current: &Map<String, Value>,
        original: &Map<String, Value>,
    ) -> Result<(), DriverError> {
        let mut changed = diff(current, original);
        if changed.is_empty() {
            debug!(id, "router update carries no changed fields; skipping call");
            return Ok(());
        }
        // Clearing the gateway arrives as an empty mapping; the
        // controller only understands an explicit null network id.
        if changed.get("external_gateway_info") == Some(&json!({})) {
            changed.insert("external_gateway_info".into(), json!({"network_id": null}));
        }

        let (status, data) = self
            .client
            .update(ResourceKind::Router, id, &wrap("router", changed))
            .await?;
        self.expect_acceptable("update router", status, &data)
    }

    pub async fn delete_router(&self, id: &str) -> Result<(), DriverError> {
        debug!(id, "delete router in progress");
        let (status, data) = self.client.delete(ResourceKind::Router, id).await?;
        self.log_unacceptable("delete router", status, &data);
        Ok(())
    }

    // ── Router interfaces ────────────────────────────────────────────

    pub async fn add_router_interface(
        &self,
        router_id: &str,
        interface_info: &Map<String, Value>,
    ) -> Result<(), DriverError> {
        let target = format!("{router_id}/add_router_interface");
        let (status, data) = self
            .client
            .update(ResourceKind::Router, &target, interface_info)
            .await?;
        self.expect_acceptable("add router interface", status, &data)
    }

    /// Rollback half of a failed interface removal: re-add the
    /// interface, but only when a port id identifies it, and never
    /// fail the caller over it.
    pub async fn add_router_interface_rollback(
        &self,
        router_id: &str,
        interface_info: &Map<String, Value>,
    ) -> Result<(), DriverError> {
        if interface_info.get("port_id").and_then(Value::as_str).is_none() {
            return Ok(());
        }
        let target = format!("{router_id}/add_router_interface");
        let (status, data) = self
            .client
            .update(ResourceKind::Router, &target, interface_info)
            .await?;
        if !self.acceptable.is_acceptable(status) {
            error!(router_id, status, body = %data,
                "failed to re-add interface while rolling back a remove");
        }
        Ok(())
    }

    pub async fn remove_router_interface(
        &self,
        router_id: &str,
        interface_info: &Map<String, Value>,
    ) -> Result<(), DriverError> {
        let target = format!("{router_id}/remove_router_interface");
        let (status, data) = self
            .client
            .update(ResourceKind::Router, &target, interface_info)
            .await?;
        self.log_unacceptable("remove router interface", status, &data);
        Ok(())
    }

    // ── Floating IPs ─────────────────────────────────────────────────

    pub async fn create_floatingip(
        &self,
        floatingip: &Map<String, Value>,
    ) -> Result<(), DriverError> {
        let mut floatingip = floatingip.clone();
        for key in FLOATINGIP_CREATE_STRIP {
            floatingip.remove(*key);
        }
        debug!(floatingip = ?floatingip, "create floating ip in progress");

        let (status, data) = self
            .client
            .create(ResourceKind::FloatingIp, &wrap("floatingip", floatingip))
            .await?;
        self.expect_acceptable("create floating ip", status, &data)
    }

    pub async fn update_floatingip(
        &self,
        id: &str,
        current: &Map<String, Value>,
        original: &Map<String, Value>,
    ) -> Result<(), DriverError> {
        let mut changed = diff(current, original);
        if changed.is_empty() {
            debug!(id, "floating ip update carries no changed fields; skipping call");
            return Ok(());
        }
        // An update that does not (re)associate a port is a
        // disassociation as far as the controller is concerned.
        if matches!(changed.get("port_id"), None | Some(Value::Null)) {
            changed = Map::new();
        } else {
            // Only a set address is dropped; a blank one is forwarded.
            let address_set = changed
                .get("fixed_ip_address")
                .and_then(Value::as_str)
                .is_some_and(|ip| !ip.is_empty());
            if address_set {
                changed.remove("fixed_ip_address");
            }
        }

        let (status, data) = self
            .client
            .update(ResourceKind::FloatingIp, id, &wrap("floatingip", changed))
            .await?;
        self.expect_acceptable("update floating ip", status, &data)
    }

    pub async fn delete_floatingip(&self, id: &str) -> Result<(), DriverError> {
        let (status, data) = self.client.delete(ResourceKind::FloatingIp, id).await?;
        self.expect_acceptable("delete floating ip", status, &data)
    }
}
