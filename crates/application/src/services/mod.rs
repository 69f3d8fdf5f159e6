mod block_service;
mod chat_service;
mod identity_service;
mod match_service;
mod repair_service;

#[cfg(test)]
mod support;

#[cfg(test)]
mod match_service_tests;
#[cfg(test)]
mod repair_service_tests;

pub use block_service::{BlockService, BlockServiceDependencies};
pub use chat_service::{ChatService, ChatServiceDependencies, SendMessageRequest};
pub use identity_service::IdentityService;
pub use match_service::{
    MatchService, MatchServiceDependencies, ResolveInterestRequest, SendInterestRequest,
};
pub use repair_service::{MatchRepairDependencies, MatchRepairService, RepairReport};
