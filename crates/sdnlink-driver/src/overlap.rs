// Subnet overlap detection, run before a subnet create is sent to the
// controller.
//
// Two independent checks: allocation-pool ranges across the
// shared-internal/external trust boundary, and CIDR collisions between
// shared networks. Both scan every existing subnet on each call; the
// whole subnet set is assumed to fit in memory and no index is kept.

use std::net::IpAddr;

use ipnet::IpNet;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::DriverError;
use crate::store::{NetworkRecord, NetworkStore, PoolRecord};

/// An inclusive IP range, held as integers for cheap intersection.
/// v4 and v6 live in disjoint spaces and never intersect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IpRange {
    v6: bool,
    start: u128,
    end: u128,
}

fn ip_value(ip: IpAddr) -> (bool, u128) {
    match ip {
        IpAddr::V4(v4) => (false, u128::from(u32::from(v4))),
        IpAddr::V6(v6) => (true, u128::from(v6)),
    }
}

impl IpRange {
    fn from_pool(pool: &PoolRecord) -> Self {
        let (v6, start) = ip_value(pool.first);
        let (_, end) = ip_value(pool.last);
        Self { v6, start, end }
    }

    fn from_cidr(cidr: &IpNet) -> Self {
        let (v6, start) = ip_value(cidr.network());
        let (_, end) = ip_value(cidr.broadcast());
        Self { v6, start, end }
    }

    fn intersects(&self, other: &Self) -> bool {
        self.v6 == other.v6 && self.start <= other.end && other.start <= self.end
    }
}

fn required_str<'a>(attrs: &'a Map<String, Value>, key: &str) -> Result<&'a str, DriverError> {
    attrs
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| DriverError::InvalidInput {
            message: format!("subnet is missing required attribute '{key}'"),
        })
}

async fn owning_network(
    store: &dyn NetworkStore,
    network_id: &str,
) -> Result<NetworkRecord, DriverError> {
    store
        .network(network_id)
        .await?
        .ok_or_else(|| DriverError::InvalidInput {
            message: format!("network {network_id} not found in backing store"),
        })
}

/// Allocation-pool overlap check.
///
/// Only meaningful when the new subnet's network is shared-internal or
/// external; the new subnet's pools are compared against every subnet
/// owned by a network in the *complementary* category. Returns the id
/// of the first colliding subnet, in store order.
pub async fn pool_overlap(
    store: &dyn NetworkStore,
    subnet: &Map<String, Value>,
) -> Result<Option<String>, DriverError> {
    let new_network = owning_network(store, required_str(subnet, "network_id")?).await?;
    let new_shared_internal = new_network.is_shared_internal();
    let new_external = new_network.router_external;
    if !new_shared_internal && !new_external {
        return Ok(None);
    }

    let subnet_id = required_str(subnet, "id")?;
    let allocations: Vec<IpRange> = store
        .allocation_pools(subnet_id)
        .await?
        .iter()
        .map(IpRange::from_pool)
        .collect();
    debug!(subnet = subnet_id, pools = allocations.len(), "checking allocation pool overlap");

    for other in store.all_subnets().await? {
        let network = owning_network(store, &other.network_id).await?;
        if network.id == new_network.id {
            continue;
        }
        let crosses_boundary = (new_shared_internal && network.router_external)
            || (new_external && network.is_shared_internal());
        if !crosses_boundary {
            continue;
        }
        for pool in store.allocation_pools(&other.id).await? {
            let range = IpRange::from_pool(&pool);
            if allocations.iter().any(|a| a.intersects(&range)) {
                info!(subnet = %other.id, "allocation pool overlap detected");
                return Ok(Some(other.id));
            }
        }
    }
    Ok(None)
}

/// CIDR overlap check between shared networks.
///
/// The new subnet's CIDR collides with an existing subnet's CIDR when
/// both networks are shared, when the new network is shared and the
/// other is not external, or when the other is shared and the new one
/// is not external. Subnets of the same network are skipped.
pub async fn cidr_overlap(
    store: &dyn NetworkStore,
    subnet: &Map<String, Value>,
) -> Result<Option<String>, DriverError> {
    let new_network = owning_network(store, required_str(subnet, "network_id")?).await?;
    let cidr: IpNet =
        required_str(subnet, "cidr")?
            .parse()
            .map_err(|e| DriverError::InvalidInput {
                message: format!("invalid subnet CIDR: {e}"),
            })?;
    let new_range = IpRange::from_cidr(&cidr);

    for other in store.all_subnets().await? {
        let network = owning_network(store, &other.network_id).await?;
        if network.id == new_network.id {
            continue;
        }
        let rules_apply = (new_network.shared && network.shared)
            || (new_network.shared && !network.router_external)
            || (network.shared && !new_network.router_external);
        if rules_apply && IpRange::from_cidr(&other.cidr).intersects(&new_range) {
            info!(subnet = %other.id, "CIDR overlap detected");
            return Ok(Some(other.id));
        }
    }
    Ok(None)
}
