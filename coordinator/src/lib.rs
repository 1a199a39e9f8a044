//! LedgerLink Coordinator
//!
//! Drives the two-phase transaction protocol against a channel: proposals are
//! fanned out to endorsing peers, the responses are checked against the
//! endorsement policy, and accepted transactions are forwarded to the
//! ordering service.

pub mod channel;
pub mod config;
pub mod coordinator;
pub mod metrics;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod policy;
pub mod state;
pub mod transport;

pub use channel::{ChannelHandle, ChannelTopology, EndpointSpec};
pub use config::CoordinatorConfig;
pub use coordinator::TransactionCoordinator;
pub use metrics::{CoordinatorMetrics, MetricsSnapshot};
pub use policy::Verdict;
pub use state::OperationState;
pub use transport::{BroadcastAck, BroadcastStatus, ChannelConnector, EndorsingPeer, OrderingService};
