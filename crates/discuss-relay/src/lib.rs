//! Message-relay core: channel policy, multipart dedup and the
//! inbound → completion → outbound orchestration.

pub mod dedup;
pub mod notice;
pub mod policy;
pub mod relay;

pub use dedup::{CacheError, DedupCache, DedupKey, MemoryDedupCache};
pub use policy::ChannelPolicy;
pub use relay::{DispatchStatus, MessageRelay, RejectReason, RelayFailure, RelayOutcome, RelayReport};
