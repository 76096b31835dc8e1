//! Protobuf contracts for the two subscription services.
//!
//! Messages are declared with `prost` derives and the clients are written
//! against `tonic::client::Grpc` the same way `tonic-build` would emit them,
//! so the crate builds without `protoc`. Only the `Subscribe` RPC of each
//! service is declared.
//!
//! - [`tipb`]: Top SQL records published by TiDB (`tipb.TopSQLPubSub`).
//! - [`resource_usage_agent`]: resource metering records published by TiKV
//!   (`resource_usage_agent.ResourceMeteringPubSub`).

pub mod resource_usage_agent;
pub mod tipb;
