use std::sync::Arc;

use domain::{
    Chat, ChatId, DomainError, Interest, InterestDecision, InterestId, Match, MatchId, Pet, PetId,
    UserId,
};
use uuid::Uuid;

use crate::{
    clock::Clock,
    dto::{InterestDto, InterestResolutionDto, MatchDto},
    error::ApplicationError,
    repository::{
        ChatRepository, InterestRepository, MatchPlacement, MatchRepository, PetRepository,
        Resolution, ResolveOutcome,
    },
};

#[derive(Debug, Clone)]
pub struct SendInterestRequest {
    pub acting_user: Uuid, // 从JWT获取
    pub from_pet_id: Uuid,
    pub target_pet_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct ResolveInterestRequest {
    pub acting_user: Uuid, // 从JWT获取
    pub target_pet_id: Uuid,
    pub interest_id: Uuid,
    pub action: InterestDecision,
}

pub struct MatchServiceDependencies {
    pub pet_repository: Arc<dyn PetRepository>,
    pub interest_repository: Arc<dyn InterestRepository>,
    pub match_repository: Arc<dyn MatchRepository>,
    pub chat_repository: Arc<dyn ChatRepository>,
    pub clock: Arc<dyn Clock>,
}

/// 兴趣与匹配用例：发送兴趣、处理兴趣、在接受时生成匹配和聊天
pub struct MatchService {
    deps: MatchServiceDependencies,
}

impl MatchService {
    pub fn new(deps: MatchServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn send_interest(
        &self,
        request: SendInterestRequest,
    ) -> Result<InterestDto, ApplicationError> {
        let acting_user = UserId::from(request.acting_user);
        let from_pet_id = PetId::from(request.from_pet_id);
        let target_pet_id = PetId::from(request.target_pet_id);

        // 来源宠物不存在与不属于当前用户一样处理
        let from_pet = self
            .deps
            .pet_repository
            .find_by_id(from_pet_id)
            .await?
            .filter(|pet| pet.is_owned_by(acting_user))
            .ok_or(DomainError::PetNotOwned)?;

        let target_pet = self
            .deps
            .pet_repository
            .find_by_id(target_pet_id)
            .await?
            .ok_or(DomainError::PetNotFound)?;

        if !target_pet.is_active {
            return Err(DomainError::PetInactive.into());
        }
        if target_pet.is_owned_by(acting_user) {
            return Err(DomainError::SelfInterest.into());
        }

        let interest = Interest::new(InterestId::generate(), from_pet.id, self.deps.clock.now());
        let inserted = self
            .deps
            .interest_repository
            .insert_if_absent(target_pet.id, interest.clone())
            .await?;
        if !inserted {
            return Err(DomainError::InterestAlreadySent.into());
        }

        tracing::info!(
            interest_id = %interest.id,
            from_pet = %from_pet.id,
            target_pet = %target_pet.id,
            "interest sent"
        );
        Ok(InterestDto::from(&interest))
    }

    pub async fn resolve_interest(
        &self,
        request: ResolveInterestRequest,
    ) -> Result<InterestResolutionDto, ApplicationError> {
        let acting_user = UserId::from(request.acting_user);
        let interest_id = InterestId::from(request.interest_id);

        let pet = self.owned_pet(acting_user, PetId::from(request.target_pet_id)).await?;
        let interest = pet
            .interest(interest_id)
            .ok_or(DomainError::InterestNotFound)?;
        if !interest.status.is_pending() {
            return Err(DomainError::InterestAlreadyProcessed.into());
        }

        let resolution = match request.action {
            InterestDecision::Rejected => Resolution::Reject,
            InterestDecision::Accepted => Resolution::Accept {
                candidate: Match::new(
                    MatchId::generate(),
                    interest.from,
                    pet.id,
                    self.deps.clock.now(),
                )?,
            },
        };

        let outcome = self
            .deps
            .interest_repository
            .resolve(pet.id, interest_id, resolution)
            .await?;

        match outcome {
            ResolveOutcome::Missing => Err(DomainError::InterestNotFound.into()),
            // 并发处理中另一方先完成了转换
            ResolveOutcome::AlreadyProcessed(_) => {
                Err(DomainError::InterestAlreadyProcessed.into())
            }
            ResolveOutcome::Rejected(interest) => {
                tracing::info!(interest_id = %interest.id, pet_id = %pet.id, "interest rejected");
                Ok(InterestResolutionDto {
                    interest: (&interest).into(),
                    match_id: None,
                    chat_id: None,
                })
            }
            ResolveOutcome::Accepted {
                interest,
                placement: MatchPlacement::Existing(existing),
            } => {
                tracing::info!(
                    interest_id = %interest.id,
                    match_id = %existing.id,
                    "interest accepted; pet pair already matched"
                );
                Ok(InterestResolutionDto {
                    interest: (&interest).into(),
                    match_id: Some(Uuid::from(existing.id)),
                    chat_id: existing.chat_id.map(Uuid::from),
                })
            }
            ResolveOutcome::Accepted {
                interest,
                placement: MatchPlacement::Created(matched),
            } => {
                tracing::info!(
                    interest_id = %interest.id,
                    match_id = %matched.id,
                    pet1 = %matched.pet1,
                    pet2 = %matched.pet2,
                    "match created"
                );
                let chat = provision_chat(
                    self.deps.pet_repository.as_ref(),
                    self.deps.chat_repository.as_ref(),
                    self.deps.match_repository.as_ref(),
                    self.deps.clock.as_ref(),
                    &matched,
                )
                .await
                .inspect_err(|err| {
                    tracing::error!(
                        match_id = %matched.id,
                        pet1 = %matched.pet1,
                        pet2 = %matched.pet2,
                        error = %err,
                        "match persisted without chat; awaiting repair"
                    );
                })?;

                Ok(InterestResolutionDto {
                    interest: (&interest).into(),
                    match_id: Some(Uuid::from(matched.id)),
                    chat_id: Some(Uuid::from(chat.id)),
                })
            }
        }
    }

    /// 当前用户所有宠物参与的匹配
    pub async fn list_matches(&self, acting_user: Uuid) -> Result<Vec<MatchDto>, ApplicationError> {
        let pets = self
            .deps
            .pet_repository
            .list_by_owner(UserId::from(acting_user))
            .await?;
        if pets.is_empty() {
            return Ok(Vec::new());
        }

        let pet_ids = pets.iter().map(|pet| pet.id).collect();
        let matches = self.deps.match_repository.list_for_pets(pet_ids).await?;
        Ok(matches.iter().map(MatchDto::from).collect())
    }

    /// 自己宠物收到的兴趣
    pub async fn list_incoming_interests(
        &self,
        acting_user: Uuid,
        pet_id: Uuid,
    ) -> Result<Vec<InterestDto>, ApplicationError> {
        let pet = self
            .owned_pet(UserId::from(acting_user), PetId::from(pet_id))
            .await?;
        Ok(pet.interests.iter().map(InterestDto::from).collect())
    }

    async fn owned_pet(&self, owner: UserId, pet_id: PetId) -> Result<Pet, ApplicationError> {
        let pet = self
            .deps
            .pet_repository
            .find_by_id(pet_id)
            .await?
            .ok_or(DomainError::PetNotFound)?;
        if !pet.is_owned_by(owner) {
            return Err(DomainError::PetNotOwned.into());
        }
        Ok(pet)
    }
}

/// 为匹配创建聊天并回填 chat_id。
///
/// 聊天以 match_id 为唯一键，重复调用会复用已有聊天，因此修复任务可以安全重试。
pub(crate) async fn provision_chat(
    pets: &dyn PetRepository,
    chats: &dyn ChatRepository,
    matches: &dyn MatchRepository,
    clock: &dyn Clock,
    matched: &Match,
) -> Result<Chat, ApplicationError> {
    let owner_of = |pet: Option<Pet>| pet.map(|pet| pet.owner_id).ok_or(DomainError::PetNotFound);
    let sender_owner = owner_of(pets.find_by_id(matched.pet1).await?)?;
    let receiver_owner = owner_of(pets.find_by_id(matched.pet2).await?)?;

    let now = clock.now();
    let chat = Chat::for_match(
        ChatId::generate(),
        matched.id,
        receiver_owner,
        sender_owner,
        now,
    )?;
    let chat = chats.create_for_match(chat).await?;
    matches.attach_chat(matched.id, chat.id, now).await?;

    tracing::info!(match_id = %matched.id, chat_id = %chat.id, "chat linked to match");
    Ok(chat)
}
