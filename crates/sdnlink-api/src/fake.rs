// Null-object controller client.
//
// Substituted for the real client when no controller is configured
// (`use_fake_controller`); every operation logs and reports success so
// the orchestration layer can run without a backend.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::info;

use crate::client::{ControllerClient, ResolvedTenant, ResourceKind, TenantType};
use crate::codec::Payload;
use crate::error::Error;

const HTTP_OK: u16 = 200;

/// No-op stand-in for [`crate::SdnClient`]; always reports success.
#[derive(Debug, Default)]
pub struct FakeClient;

fn ok() -> Result<(u16, Payload), Error> {
    Ok((HTTP_OK, Payload::Raw(String::new())))
}

#[async_trait]
impl ControllerClient for FakeClient {
    async fn list(
        &self,
        kind: ResourceKind,
        _params: &[(String, String)],
    ) -> Result<(u16, Payload), Error> {
        info!(%kind, "fake SDN controller: list");
        ok()
    }

    async fn show(
        &self,
        kind: ResourceKind,
        _id: &str,
        _params: &[(String, String)],
    ) -> Result<(u16, Payload), Error> {
        info!(%kind, "fake SDN controller: show");
        ok()
    }

    async fn create(
        &self,
        kind: ResourceKind,
        _body: &Map<String, Value>,
    ) -> Result<(u16, Payload), Error> {
        info!(%kind, "fake SDN controller: create");
        ok()
    }

    async fn update(
        &self,
        kind: ResourceKind,
        _target: &str,
        _body: &Map<String, Value>,
    ) -> Result<(u16, Payload), Error> {
        info!(%kind, "fake SDN controller: update");
        ok()
    }

    async fn delete(&self, kind: ResourceKind, _id: &str) -> Result<(u16, Payload), Error> {
        info!(%kind, "fake SDN controller: delete");
        ok()
    }

    async fn resolve_tenant(&self, tenant_id: &str) -> Result<Option<ResolvedTenant>, Error> {
        info!("fake SDN controller: tenant lookup");
        Ok(Some(ResolvedTenant {
            id: Some(tenant_id.to_owned()),
            tenant_type: Some(TenantType::Of),
        }))
    }

    async fn changed_controller(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_verb_reports_success() {
        let client = FakeClient;
        let body = Map::new();

        let (status, _) = client.list(ResourceKind::Network, &[]).await.expect("list");
        assert_eq!(status, HTTP_OK);
        let (status, _) = client
            .create(ResourceKind::Subnet, &body)
            .await
            .expect("create");
        assert_eq!(status, HTTP_OK);
        let (status, _) = client
            .update(ResourceKind::Port, "p-1", &body)
            .await
            .expect("update");
        assert_eq!(status, HTTP_OK);
        let (status, _) = client
            .delete(ResourceKind::Router, "r-1")
            .await
            .expect("delete");
        assert_eq!(status, HTTP_OK);

        let tenant = client.resolve_tenant("t-1").await.expect("tenant");
        assert_eq!(
            tenant,
            Some(ResolvedTenant {
                id: Some("t-1".into()),
                tenant_type: Some(TenantType::Of)
            })
        );
        assert_eq!(client.changed_controller().await, None);
    }
}
