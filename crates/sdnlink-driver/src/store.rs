// Backing-store seam.
//
// The orchestration framework owns the persistent network state; the
// driver only reads it during validation (overlap checks, tenant
// defaulting, floating-IP cleanup). This trait is the capability
// surface the driver needs -- nothing more of the framework's schema
// leaks through it.

use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;
use ipnet::IpNet;
use thiserror::Error;

/// Failure reading the framework's backing store.
#[derive(Debug, Error)]
#[error("backing store error: {0}")]
pub struct StoreError(pub String);

/// The slice of a network record the driver cares about.
#[derive(Debug, Clone)]
pub struct NetworkRecord {
    pub id: String,
    pub tenant_id: Option<String>,
    pub shared: bool,
    pub router_external: bool,
}

impl NetworkRecord {
    /// Shared with tenants but not a router-external network.
    pub fn is_shared_internal(&self) -> bool {
        self.shared && !self.router_external
    }
}

#[derive(Debug, Clone)]
pub struct SubnetRecord {
    pub id: String,
    pub network_id: String,
    pub cidr: IpNet,
}

/// One allocation-pool range, inclusive on both ends.
#[derive(Debug, Clone, Copy)]
pub struct PoolRecord {
    pub first: IpAddr,
    pub last: IpAddr,
}

#[derive(Debug, Clone)]
pub struct FloatingIpRecord {
    pub id: String,
}

/// Read-only view of the orchestration framework's persistent store.
#[async_trait]
pub trait NetworkStore: Send + Sync {
    async fn network(&self, id: &str) -> Result<Option<NetworkRecord>, StoreError>;

    /// Every subnet in the system, in whatever order the store keeps
    /// them; overlap reporting follows this order.
    async fn all_subnets(&self) -> Result<Vec<SubnetRecord>, StoreError>;

    async fn allocation_pools(&self, subnet_id: &str) -> Result<Vec<PoolRecord>, StoreError>;

    async fn floating_ips_for_port(&self, port_id: &str)
    -> Result<Vec<FloatingIpRecord>, StoreError>;
}

/// In-memory store used by the test suite and by deployments running
/// against the fake controller.
#[derive(Debug, Default)]
pub struct MemStore {
    networks: HashMap<String, NetworkRecord>,
    subnets: Vec<SubnetRecord>,
    pools: HashMap<String, Vec<PoolRecord>>,
    floating_ips: HashMap<String, Vec<FloatingIpRecord>>,
}

impl MemStore {
    pub fn add_network(&mut self, network: NetworkRecord) -> &mut Self {
        self.networks.insert(network.id.clone(), network);
        self
    }

    pub fn add_subnet(&mut self, subnet: SubnetRecord, pools: Vec<PoolRecord>) -> &mut Self {
        self.pools.insert(subnet.id.clone(), pools);
        self.subnets.push(subnet);
        self
    }

    pub fn add_floating_ip(&mut self, port_id: &str, floating_ip: FloatingIpRecord) -> &mut Self {
        self.floating_ips
            .entry(port_id.to_owned())
            .or_default()
            .push(floating_ip);
        self
    }
}

#[async_trait]
impl NetworkStore for MemStore {
    async fn network(&self, id: &str) -> Result<Option<NetworkRecord>, StoreError> {
        Ok(self.networks.get(id).cloned())
    }

    async fn all_subnets(&self) -> Result<Vec<SubnetRecord>, StoreError> {
        Ok(self.subnets.clone())
    }

    async fn allocation_pools(&self, subnet_id: &str) -> Result<Vec<PoolRecord>, StoreError> {
        Ok(self.pools.get(subnet_id).cloned().unwrap_or_default())
    }

    async fn floating_ips_for_port(
        &self,
        port_id: &str,
    ) -> Result<Vec<FloatingIpRecord>, StoreError> {
        Ok(self.floating_ips.get(port_id).cloned().unwrap_or_default())
    }
}
