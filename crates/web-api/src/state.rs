use std::sync::Arc;

use application::{
    BlockService, BlockServiceDependencies, ChatService, ChatServiceDependencies, Clock,
    IdentityService, LocalMessageBroadcaster, MatchService, MatchServiceDependencies,
    RealtimeService, Repositories,
};
use config::AppConfig;

use crate::JwtService;

#[derive(Clone)]
pub struct AppState {
    pub match_service: Arc<MatchService>,
    pub chat_service: Arc<ChatService>,
    pub block_service: Arc<BlockService>,
    pub identity_service: Arc<IdentityService>,
    pub realtime: Arc<RealtimeService>,
    pub jwt_service: Arc<JwtService>,
}

impl AppState {
    /// 用同一组仓储装配所有用例服务
    pub fn build(repositories: Repositories, config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        let block_service = Arc::new(BlockService::new(BlockServiceDependencies {
            user_repository: repositories.users.clone(),
        }));

        let match_service = MatchService::new(MatchServiceDependencies {
            pet_repository: repositories.pets.clone(),
            interest_repository: repositories.interests.clone(),
            match_repository: repositories.matches.clone(),
            chat_repository: repositories.chats.clone(),
            clock: clock.clone(),
        });

        let chat_service = ChatService::new(ChatServiceDependencies {
            chat_repository: repositories.chats.clone(),
            user_repository: repositories.users.clone(),
            block_service: block_service.clone(),
            clock,
            idempotency_ttl: config.realtime.send_dedup_ttl(),
        });

        let broadcaster = Arc::new(LocalMessageBroadcaster::new(
            config.realtime.broadcast_capacity,
        ));
        let realtime = RealtimeService::new(
            repositories.chats.clone(),
            block_service.clone(),
            broadcaster,
            config.realtime.relay_dedup_ttl(),
        );

        Self {
            match_service: Arc::new(match_service),
            chat_service: Arc::new(chat_service),
            block_service,
            identity_service: Arc::new(IdentityService::new(repositories.users)),
            realtime: Arc::new(realtime),
            jwt_service: Arc::new(JwtService::new(&config.jwt)),
        }
    }
}
