// sdnlink-driver: translates orchestration-framework lifecycle events
// into SDN controller calls, with pre-create validation (tenant
// attribution, subnet overlap detection) and deliberate fatal vs.
// best-effort severity handling.

pub mod driver;
pub mod error;
mod l3;
pub mod overlap;
pub mod store;

pub use driver::{EventContext, SdnDriver};
pub use error::DriverError;
