use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use application::repository::{
    ChatRepository, InterestRepository, MatchPlacement, MatchRepository, PetRepository,
    Repositories, Resolution, ResolveOutcome, UserRepository,
};
use async_trait::async_trait;
use domain::{
    BlockStatus, Chat, ChatId, Interest, InterestId, InterestStatus, LastMessage, Match, MatchId,
    MatchStatus, MeetupDetails, Message, MessageId, MessageType, NewMessage, Pet, PetId, PetPair,
    RepositoryError, Timestamp, User, UserId,
};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use uuid::Uuid;

pub(crate) fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Conflict,
        // 引用的宠物或用户不存在
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => RepositoryError::NotFound,
        _ => RepositoryError::storage(err.to_string()),
    }
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

const MATCH_COLUMNS: &str = "id, pet1_id, pet2_id, status, chat_id, meetup_location, \
     meetup_date, meetup_notes, created_at, updated_at";

const CHAT_COLUMNS: &str = "id, match_id, participant_a, participant_b, message_count, \
     last_message_content, last_message_sender, last_message_at, created_at";

#[derive(Debug, FromRow)]
struct UserRecord {
    id: Uuid,
    name: String,
    is_banned: bool,
    deleted_at: Option<Timestamp>,
    created_at: Timestamp,
}

impl UserRecord {
    fn into_user(self, blocked: Vec<Uuid>) -> User {
        User {
            id: UserId::from(self.id),
            name: self.name,
            blocked_users: blocked.into_iter().map(UserId::from).collect(),
            is_banned: self.is_banned,
            deleted_at: self.deleted_at,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct PetRecord {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    species: String,
    is_active: bool,
    created_at: Timestamp,
}

impl PetRecord {
    fn into_pet(self, interests: Vec<Interest>) -> Pet {
        Pet {
            id: PetId::from(self.id),
            owner_id: UserId::from(self.owner_id),
            name: self.name,
            species: self.species,
            is_active: self.is_active,
            interests,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct InterestRecord {
    id: Uuid,
    target_pet_id: Uuid,
    from_pet_id: Uuid,
    status: String,
    created_at: Timestamp,
}

impl TryFrom<InterestRecord> for Interest {
    type Error = RepositoryError;

    fn try_from(value: InterestRecord) -> Result<Self, Self::Error> {
        let status: InterestStatus = value
            .status
            .parse()
            .map_err(|err: domain::DomainError| invalid_data(err.to_string()))?;
        Ok(Interest {
            id: InterestId::from(value.id),
            from: PetId::from(value.from_pet_id),
            status,
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct MatchRecord {
    id: Uuid,
    pet1_id: Uuid,
    pet2_id: Uuid,
    status: String,
    chat_id: Option<Uuid>,
    meetup_location: Option<String>,
    meetup_date: Option<Timestamp>,
    meetup_notes: Option<String>,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl TryFrom<MatchRecord> for Match {
    type Error = RepositoryError;

    fn try_from(value: MatchRecord) -> Result<Self, Self::Error> {
        let status: MatchStatus = value
            .status
            .parse()
            .map_err(|err: domain::DomainError| invalid_data(err.to_string()))?;
        let meetup = match (&value.meetup_location, &value.meetup_date, &value.meetup_notes) {
            (None, None, None) => None,
            _ => Some(MeetupDetails {
                location: value.meetup_location,
                date: value.meetup_date,
                notes: value.meetup_notes,
            }),
        };
        Ok(Match {
            id: MatchId::from(value.id),
            pet1: PetId::from(value.pet1_id),
            pet2: PetId::from(value.pet2_id),
            status,
            chat_id: value.chat_id.map(ChatId::from),
            meetup,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ChatRecord {
    id: Uuid,
    match_id: Option<Uuid>,
    participant_a: Uuid,
    participant_b: Uuid,
    message_count: i64,
    last_message_content: Option<String>,
    last_message_sender: Option<Uuid>,
    last_message_at: Option<Timestamp>,
    created_at: Timestamp,
}

impl From<ChatRecord> for Chat {
    fn from(value: ChatRecord) -> Self {
        let last_message = match (
            value.last_message_content,
            value.last_message_sender,
            value.last_message_at,
        ) {
            (Some(content), Some(sender), Some(timestamp)) => Some(LastMessage {
                content,
                sender_id: UserId::from(sender),
                timestamp,
            }),
            _ => None,
        };
        Chat {
            id: ChatId::from(value.id),
            participants: [
                UserId::from(value.participant_a),
                UserId::from(value.participant_b),
            ],
            match_id: value.match_id.map(MatchId::from),
            last_message,
            message_count: value.message_count,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: Uuid,
    chat_id: Uuid,
    seq: i64,
    sender_id: Uuid,
    content: String,
    message_type: String,
    created_at: Timestamp,
}

impl TryFrom<MessageRecord> for Message {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let message_type: MessageType = value
            .message_type
            .parse()
            .map_err(|err: domain::DomainError| invalid_data(err.to_string()))?;
        Ok(Message {
            id: MessageId::from(value.id),
            chat_id: ChatId::from(value.chat_id),
            seq: value.seq,
            sender_id: UserId::from(value.sender_id),
            content: value.content,
            message_type,
            created_at: value.created_at,
        })
    }
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 写入资料库中的用户行，供资料服务与测试使用
    pub async fn insert(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, is_banned, deleted_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::from(user.id))
        .bind(&user.name)
        .bind(user.is_banned)
        .bind(user.deleted_at)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, name, is_banned, deleted_at, created_at FROM users WHERE id = $1",
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        let Some(record) = record else {
            return Ok(None);
        };

        let blocked = sqlx::query_scalar::<_, Uuid>(
            "SELECT blocked_id FROM user_blocks WHERE blocker_id = $1",
        )
        .bind(record.id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(Some(record.into_user(blocked)))
    }

    async fn add_block(&self, blocker: UserId, target: UserId) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO user_blocks (blocker_id, blocked_id)
            VALUES ($1, $2)
            ON CONFLICT (blocker_id, blocked_id) DO NOTHING
            "#,
        )
        .bind(Uuid::from(blocker))
        .bind(Uuid::from(target))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn remove_block(&self, blocker: UserId, target: UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM user_blocks WHERE blocker_id = $1 AND blocked_id = $2")
            .bind(Uuid::from(blocker))
            .bind(Uuid::from(target))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn block_status(
        &self,
        viewer: UserId,
        other: UserId,
    ) -> Result<BlockStatus, RepositoryError> {
        let (blocked_by_viewer, blocked_by_other) = sqlx::query_as::<_, (bool, bool)>(
            r#"
            SELECT
                EXISTS (SELECT 1 FROM user_blocks WHERE blocker_id = $1 AND blocked_id = $2),
                EXISTS (SELECT 1 FROM user_blocks WHERE blocker_id = $2 AND blocked_id = $1)
            "#,
        )
        .bind(Uuid::from(viewer))
        .bind(Uuid::from(other))
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(BlockStatus {
            blocked_by_viewer,
            blocked_by_other,
        })
    }
}

#[derive(Clone)]
pub struct PgPetRepository {
    pool: PgPool,
}

impl PgPetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, pet: &Pet) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO pets (id, owner_id, name, species, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::from(pet.id))
        .bind(Uuid::from(pet.owner_id))
        .bind(&pet.name)
        .bind(&pet.species)
        .bind(pet.is_active)
        .bind(pet.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn interests_for(
        &self,
        pet_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Interest>>, RepositoryError> {
        let records = sqlx::query_as::<_, InterestRecord>(
            r#"
            SELECT id, target_pet_id, from_pet_id, status, created_at
            FROM pet_interests
            WHERE target_pet_id = ANY($1)
            ORDER BY created_at, id
            "#,
        )
        .bind(pet_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        let mut grouped: HashMap<Uuid, Vec<Interest>> = HashMap::new();
        for record in records {
            let target = record.target_pet_id;
            grouped
                .entry(target)
                .or_default()
                .push(Interest::try_from(record)?);
        }
        Ok(grouped)
    }
}

#[async_trait]
impl PetRepository for PgPetRepository {
    async fn find_by_id(&self, id: PetId) -> Result<Option<Pet>, RepositoryError> {
        let record = sqlx::query_as::<_, PetRecord>(
            "SELECT id, owner_id, name, species, is_active, created_at FROM pets WHERE id = $1",
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        let Some(record) = record else {
            return Ok(None);
        };
        let mut interests = self.interests_for(&[record.id]).await?;
        let own = interests.remove(&record.id).unwrap_or_default();
        Ok(Some(record.into_pet(own)))
    }

    async fn list_by_owner(&self, owner: UserId) -> Result<Vec<Pet>, RepositoryError> {
        let records = sqlx::query_as::<_, PetRecord>(
            r#"
            SELECT id, owner_id, name, species, is_active, created_at
            FROM pets
            WHERE owner_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(Uuid::from(owner))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        let ids: Vec<Uuid> = records.iter().map(|record| record.id).collect();
        let mut interests = self.interests_for(&ids).await?;
        Ok(records
            .into_iter()
            .map(|record| {
                let own = interests.remove(&record.id).unwrap_or_default();
                record.into_pet(own)
            })
            .collect())
    }
}

#[derive(Clone)]
pub struct PgInterestRepository {
    pool: PgPool,
}

impl PgInterestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InterestRepository for PgInterestRepository {
    async fn insert_if_absent(
        &self,
        target: PetId,
        interest: Interest,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO pet_interests (id, target_pet_id, from_pet_id, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (target_pet_id, from_pet_id) DO NOTHING
            "#,
        )
        .bind(Uuid::from(interest.id))
        .bind(Uuid::from(target))
        .bind(Uuid::from(interest.from))
        .bind(interest.status.as_str())
        .bind(interest.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn resolve(
        &self,
        target: PetId,
        interest_id: InterestId,
        resolution: Resolution,
    ) -> Result<ResolveOutcome, RepositoryError> {
        let next_status = match &resolution {
            Resolution::Reject => InterestStatus::Rejected,
            Resolution::Accept { .. } => InterestStatus::Accepted,
        };

        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        // 条件更新：并发的两个处理请求中只有一个能看到 pending
        let updated = sqlx::query_as::<_, InterestRecord>(
            r#"
            UPDATE pet_interests
            SET status = $3
            WHERE id = $1 AND target_pet_id = $2 AND status = 'pending'
            RETURNING id, target_pet_id, from_pet_id, status, created_at
            "#,
        )
        .bind(Uuid::from(interest_id))
        .bind(Uuid::from(target))
        .bind(next_status.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        let Some(record) = updated else {
            let current = sqlx::query_scalar::<_, String>(
                "SELECT status FROM pet_interests WHERE id = $1 AND target_pet_id = $2",
            )
            .bind(Uuid::from(interest_id))
            .bind(Uuid::from(target))
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;
            tx.rollback().await.map_err(map_sqlx_err)?;

            return match current {
                None => Ok(ResolveOutcome::Missing),
                Some(status) => {
                    let status: InterestStatus = status
                        .parse()
                        .map_err(|err: domain::DomainError| invalid_data(err.to_string()))?;
                    Ok(ResolveOutcome::AlreadyProcessed(status))
                }
            };
        };
        let interest = Interest::try_from(record)?;

        let outcome = match resolution {
            Resolution::Reject => ResolveOutcome::Rejected(interest),
            Resolution::Accept { candidate } => {
                let pair = candidate.pair();
                let inserted = sqlx::query_as::<_, MatchRecord>(&format!(
                    r#"
                    INSERT INTO matches
                        (id, pet1_id, pet2_id, pair_low, pair_high, status, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    ON CONFLICT (pair_low, pair_high) DO NOTHING
                    RETURNING {MATCH_COLUMNS}
                    "#
                ))
                .bind(Uuid::from(candidate.id))
                .bind(Uuid::from(candidate.pet1))
                .bind(Uuid::from(candidate.pet2))
                .bind(Uuid::from(pair.low()))
                .bind(Uuid::from(pair.high()))
                .bind(candidate.status.as_str())
                .bind(candidate.created_at)
                .bind(candidate.updated_at)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_err)?;

                let placement = match inserted {
                    Some(record) => MatchPlacement::Created(Match::try_from(record)?),
                    None => {
                        let record = sqlx::query_as::<_, MatchRecord>(&format!(
                            "SELECT {MATCH_COLUMNS} FROM matches WHERE pair_low = $1 AND pair_high = $2"
                        ))
                        .bind(Uuid::from(pair.low()))
                        .bind(Uuid::from(pair.high()))
                        .fetch_one(&mut *tx)
                        .await
                        .map_err(map_sqlx_err)?;
                        MatchPlacement::Existing(Match::try_from(record)?)
                    }
                };
                ResolveOutcome::Accepted {
                    interest,
                    placement,
                }
            }
        };

        tx.commit().await.map_err(map_sqlx_err)?;
        Ok(outcome)
    }
}

#[derive(Clone)]
pub struct PgMatchRepository {
    pool: PgPool,
}

impl PgMatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MatchRepository for PgMatchRepository {
    async fn find_by_id(&self, id: MatchId) -> Result<Option<Match>, RepositoryError> {
        let record = sqlx::query_as::<_, MatchRecord>(&format!(
            "SELECT {MATCH_COLUMNS} FROM matches WHERE id = $1"
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        record.map(Match::try_from).transpose()
    }

    async fn find_by_pair(&self, pair: PetPair) -> Result<Option<Match>, RepositoryError> {
        let record = sqlx::query_as::<_, MatchRecord>(&format!(
            "SELECT {MATCH_COLUMNS} FROM matches WHERE pair_low = $1 AND pair_high = $2"
        ))
        .bind(Uuid::from(pair.low()))
        .bind(Uuid::from(pair.high()))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        record.map(Match::try_from).transpose()
    }

    async fn list_for_pets(&self, pets: Vec<PetId>) -> Result<Vec<Match>, RepositoryError> {
        let ids: Vec<Uuid> = pets.into_iter().map(Uuid::from).collect();
        let records = sqlx::query_as::<_, MatchRecord>(&format!(
            r#"
            SELECT {MATCH_COLUMNS}
            FROM matches
            WHERE pet1_id = ANY($1) OR pet2_id = ANY($1)
            ORDER BY created_at DESC
            "#
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        records.into_iter().map(Match::try_from).collect()
    }

    async fn attach_chat(
        &self,
        match_id: MatchId,
        chat_id: ChatId,
        at: Timestamp,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE matches SET chat_id = $2, updated_at = $3 WHERE id = $1")
            .bind(Uuid::from(match_id))
            .bind(Uuid::from(chat_id))
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list_without_chat(
        &self,
        created_before: Timestamp,
    ) -> Result<Vec<Match>, RepositoryError> {
        let records = sqlx::query_as::<_, MatchRecord>(&format!(
            r#"
            SELECT {MATCH_COLUMNS}
            FROM matches
            WHERE chat_id IS NULL AND status = 'matched' AND created_at <= $1
            ORDER BY created_at
            "#
        ))
        .bind(created_before)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        records.into_iter().map(Match::try_from).collect()
    }

    async fn update_status(
        &self,
        match_id: MatchId,
        status: MatchStatus,
        at: Timestamp,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE matches SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(Uuid::from(match_id))
            .bind(status.as_str())
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgChatRepository {
    pool: PgPool,
}

impl PgChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatRepository for PgChatRepository {
    async fn create_for_match(&self, chat: Chat) -> Result<Chat, RepositoryError> {
        let [participant_a, participant_b] = chat.participants;
        let inserted = sqlx::query_as::<_, ChatRecord>(&format!(
            r#"
            INSERT INTO chats (id, match_id, participant_a, participant_b, message_count, created_at)
            VALUES ($1, $2, $3, $4, 0, $5)
            ON CONFLICT (match_id) DO NOTHING
            RETURNING {CHAT_COLUMNS}
            "#
        ))
        .bind(Uuid::from(chat.id))
        .bind(chat.match_id.map(Uuid::from))
        .bind(Uuid::from(participant_a))
        .bind(Uuid::from(participant_b))
        .bind(chat.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        if let Some(record) = inserted {
            return Ok(Chat::from(record));
        }

        // 该匹配已有聊天
        let record = sqlx::query_as::<_, ChatRecord>(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats WHERE match_id = $1"
        ))
        .bind(chat.match_id.map(Uuid::from))
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(Chat::from(record))
    }

    async fn find_by_id(&self, id: ChatId) -> Result<Option<Chat>, RepositoryError> {
        let record = sqlx::query_as::<_, ChatRecord>(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats WHERE id = $1"
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(record.map(Chat::from))
    }

    async fn list_for_user(&self, user: UserId) -> Result<Vec<Chat>, RepositoryError> {
        let records = sqlx::query_as::<_, ChatRecord>(&format!(
            r#"
            SELECT {CHAT_COLUMNS}
            FROM chats
            WHERE participant_a = $1 OR participant_b = $1
            ORDER BY COALESCE(last_message_at, created_at) DESC
            "#
        ))
        .bind(Uuid::from(user))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(records.into_iter().map(Chat::from).collect())
    }

    async fn append_message(
        &self,
        chat_id: ChatId,
        id: MessageId,
        message: NewMessage,
        at: Timestamp,
    ) -> Result<Message, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        // 行锁串行化同一聊天的并发追加，序号因此连续
        let seq = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE chats
            SET message_count = message_count + 1,
                last_message_content = $2,
                last_message_sender = $3,
                last_message_at = $4
            WHERE id = $1
            RETURNING message_count
            "#,
        )
        .bind(Uuid::from(chat_id))
        .bind(message.preview())
        .bind(Uuid::from(message.sender_id))
        .bind(at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_err)?
        .ok_or(RepositoryError::NotFound)?;

        let record = sqlx::query_as::<_, MessageRecord>(
            r#"
            INSERT INTO chat_messages (id, chat_id, seq, sender_id, content, message_type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, chat_id, seq, sender_id, content, message_type, created_at
            "#,
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(chat_id))
        .bind(seq)
        .bind(Uuid::from(message.sender_id))
        .bind(&message.content)
        .bind(message.message_type.as_str())
        .bind(at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        tx.commit().await.map_err(map_sqlx_err)?;
        Message::try_from(record)
    }

    async fn list_messages(&self, chat_id: ChatId) -> Result<Vec<Message>, RepositoryError> {
        let records = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT id, chat_id, seq, sender_id, content, message_type, created_at
            FROM chat_messages
            WHERE chat_id = $1
            ORDER BY seq
            "#,
        )
        .bind(Uuid::from(chat_id))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        records.into_iter().map(Message::try_from).collect()
    }

    async fn find_message(
        &self,
        chat_id: ChatId,
        id: MessageId,
    ) -> Result<Option<Message>, RepositoryError> {
        let record = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT id, chat_id, seq, sender_id, content, message_type, created_at
            FROM chat_messages
            WHERE chat_id = $1 AND id = $2
            "#,
        )
        .bind(Uuid::from(chat_id))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        record.map(Message::try_from).transpose()
    }
}

#[derive(Clone)]
pub struct PgStorage {
    pub pool: PgPool,
    pub user_repository: Arc<PgUserRepository>,
    pub pet_repository: Arc<PgPetRepository>,
    pub interest_repository: Arc<PgInterestRepository>,
    pub match_repository: Arc<PgMatchRepository>,
    pub chat_repository: Arc<PgChatRepository>,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            user_repository: Arc::new(PgUserRepository::new(pool.clone())),
            pet_repository: Arc::new(PgPetRepository::new(pool.clone())),
            interest_repository: Arc::new(PgInterestRepository::new(pool.clone())),
            match_repository: Arc::new(PgMatchRepository::new(pool.clone())),
            chat_repository: Arc::new(PgChatRepository::new(pool.clone())),
            pool,
        }
    }

    pub fn repositories(&self) -> Repositories {
        Repositories {
            users: self.user_repository.clone(),
            pets: self.pet_repository.clone(),
            interests: self.interest_repository.clone(),
            matches: self.match_repository.clone(),
            chats: self.chat_repository.clone(),
        }
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await
}
