// sdnlink-api: Async REST client for the SDN controller (failover,
// session continuity, resource CRUD).

pub mod client;
pub mod codec;
pub mod error;
pub mod fake;
pub mod handler;

pub use client::{
    AcceptablePolicy, ControllerClient, ResolvedTenant, ResourceKind, SdnClient, TenantType,
    build_client, diff,
};
pub use codec::{Format, Payload};
pub use error::Error;
pub use fake::FakeClient;
pub use handler::{
    Credentials, DEFAULT_TIMEOUT, Endpoints, HandlerConfig, RequestHandler, TIMEOUT_STATUS,
    UNREACHABLE_BODY,
};
