//! 匹配实体
//!
//! 一个匹配对应一个无序宠物对；同一宠物对最多存在一个匹配。

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::{ChatId, MatchId, PetId, Timestamp};

/// 规范化的无序宠物对，`low <= high`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PetPair {
    low: PetId,
    high: PetId,
}

impl PetPair {
    pub fn new(a: PetId, b: PetId) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn low(&self) -> PetId {
        self.low
    }

    pub fn high(&self) -> PetId {
        self.high
    }

    pub fn contains(&self, pet: PetId) -> bool {
        self.low == pet || self.high == pet
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Matched,
    Completed,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Matched => "matched",
            MatchStatus::Completed => "completed",
            MatchStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "matched" => Ok(MatchStatus::Matched),
            "completed" => Ok(MatchStatus::Completed),
            "cancelled" => Ok(MatchStatus::Cancelled),
            other => Err(DomainError::validation_error(
                "status",
                format!("unknown match status `{other}`"),
            )),
        }
    }
}

/// 线下见面安排，所有字段可选
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetupDetails {
    pub location: Option<String>,
    pub date: Option<Timestamp>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    /// 发出兴趣的宠物
    pub pet1: PetId,
    /// 接受兴趣的宠物
    pub pet2: PetId,
    pub status: MatchStatus,
    pub chat_id: Option<ChatId>,
    pub meetup: Option<MeetupDetails>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Match {
    pub fn new(id: MatchId, pet1: PetId, pet2: PetId, now: Timestamp) -> DomainResult<Self> {
        if pet1 == pet2 {
            return Err(DomainError::SelfInterest);
        }
        Ok(Self {
            id,
            pet1,
            pet2,
            status: MatchStatus::Matched,
            chat_id: None,
            meetup: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn pair(&self) -> PetPair {
        PetPair::new(self.pet1, self.pet2)
    }

    pub fn involves(&self, pet: PetId) -> bool {
        self.pet1 == pet || self.pet2 == pet
    }

    pub fn attach_chat(&mut self, chat_id: ChatId, now: Timestamp) {
        self.chat_id = Some(chat_id);
        self.updated_at = now;
    }

    pub fn set_status(&mut self, status: MatchStatus, now: Timestamp) {
        self.status = status;
        self.updated_at = now;
    }

    /// 仍处于 matched 状态、却在阈值之后还没有聊天的匹配
    pub fn is_orphaned(&self, now: Timestamp, threshold: Duration) -> bool {
        self.status == MatchStatus::Matched
            && self.chat_id.is_none()
            && now - self.created_at >= threshold
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn pair_is_order_independent() {
        let a = PetId::generate();
        let b = PetId::generate();
        assert_eq!(PetPair::new(a, b), PetPair::new(b, a));
        assert!(PetPair::new(a, b).contains(a));
    }

    #[test]
    fn match_requires_two_distinct_pets() {
        let pet = PetId::generate();
        assert_eq!(
            Match::new(MatchId::generate(), pet, pet, Utc::now()),
            Err(DomainError::SelfInterest)
        );
    }

    #[test]
    fn orphan_detection_respects_threshold_and_status() {
        let created = Utc::now();
        let mut matched =
            Match::new(MatchId::generate(), PetId::generate(), PetId::generate(), created).unwrap();
        let threshold = Duration::seconds(60);

        assert!(!matched.is_orphaned(created + Duration::seconds(10), threshold));
        assert!(matched.is_orphaned(created + Duration::seconds(61), threshold));

        matched.attach_chat(ChatId::generate(), created);
        assert!(!matched.is_orphaned(created + Duration::seconds(61), threshold));

        let mut cancelled =
            Match::new(MatchId::generate(), PetId::generate(), PetId::generate(), created).unwrap();
        cancelled.set_status(MatchStatus::Cancelled, created);
        assert!(!cancelled.is_orphaned(created + Duration::seconds(61), threshold));
    }
}
