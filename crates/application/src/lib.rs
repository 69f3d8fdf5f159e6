//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务：兴趣与匹配、聊天与屏蔽、实时中继，
//! 以及对存储和消息广播的抽象。

pub mod broadcaster;
pub mod clock;
pub mod dto;
pub mod error;
pub mod idempotency;
pub mod local_broadcast;
pub mod memory;
pub mod realtime;
pub mod repository;
pub mod services;

pub use broadcaster::{BroadcastError, ChatBroadcast, MessageBroadcaster};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::ApplicationError;
pub use idempotency::IdempotencyCache;
pub use local_broadcast::LocalMessageBroadcaster;
pub use memory::MemoryStore;
pub use realtime::{RealtimeService, RealtimeSession, RelayOutcome, SessionId};
pub use repository::{
    ChatRepository, InterestRepository, MatchPlacement, MatchRepository, PetRepository,
    Repositories, Resolution, ResolveOutcome, UserRepository,
};
pub use services::{
    BlockService, BlockServiceDependencies, ChatService, ChatServiceDependencies,
    IdentityService, MatchRepairDependencies, MatchRepairService, MatchService,
    MatchServiceDependencies, RepairReport, ResolveInterestRequest, SendInterestRequest,
    SendMessageRequest,
};
