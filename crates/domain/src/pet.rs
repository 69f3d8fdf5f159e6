use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::{InterestId, PetId, Timestamp, UserId};

/// 兴趣状态：pending 只能向一个终态转换一次
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl InterestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterestStatus::Pending => "pending",
            InterestStatus::Accepted => "accepted",
            InterestStatus::Rejected => "rejected",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, InterestStatus::Pending)
    }
}

impl fmt::Display for InterestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterestStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(InterestStatus::Pending),
            "accepted" => Ok(InterestStatus::Accepted),
            "rejected" => Ok(InterestStatus::Rejected),
            other => Err(DomainError::validation_error(
                "status",
                format!("unknown interest status `{other}`"),
            )),
        }
    }
}

/// 目标宠物主人对兴趣的处理决定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterestDecision {
    #[serde(alias = "accept")]
    Accepted,
    #[serde(alias = "reject")]
    Rejected,
}

impl From<InterestDecision> for InterestStatus {
    fn from(value: InterestDecision) -> Self {
        match value {
            InterestDecision::Accepted => InterestStatus::Accepted,
            InterestDecision::Rejected => InterestStatus::Rejected,
        }
    }
}

/// 某只宠物收到的兴趣，内嵌在目标宠物上
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interest {
    pub id: InterestId,
    /// 发出兴趣的宠物
    pub from: PetId,
    pub status: InterestStatus,
    pub created_at: Timestamp,
}

impl Interest {
    pub fn new(id: InterestId, from: PetId, now: Timestamp) -> Self {
        Self {
            id,
            from,
            status: InterestStatus::Pending,
            created_at: now,
        }
    }

    /// 将 pending 兴趣转换到终态；已处理过的兴趣不可再次处理
    pub fn resolve(&mut self, decision: InterestDecision) -> DomainResult<()> {
        if !self.status.is_pending() {
            return Err(DomainError::InterestAlreadyProcessed);
        }
        self.status = decision.into();
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pet {
    pub id: PetId,
    pub owner_id: UserId,
    pub name: String,
    pub species: String,
    pub is_active: bool,
    pub interests: Vec<Interest>,
    pub created_at: Timestamp,
}

impl Pet {
    pub fn new(
        id: PetId,
        owner_id: UserId,
        name: impl Into<String>,
        species: impl Into<String>,
        now: Timestamp,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation_error("name", "pet name is required"));
        }
        Ok(Self {
            id,
            owner_id,
            name,
            species: species.into(),
            is_active: true,
            interests: Vec::new(),
            created_at: now,
        })
    }

    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner_id == user
    }

    pub fn interest(&self, id: InterestId) -> Option<&Interest> {
        self.interests.iter().find(|interest| interest.id == id)
    }

    pub fn interest_mut(&mut self, id: InterestId) -> Option<&mut Interest> {
        self.interests.iter_mut().find(|interest| interest.id == id)
    }

    /// 来自某只宠物的兴趣（无论状态）
    pub fn interest_from(&self, from: PetId) -> Option<&Interest> {
        self.interests.iter().find(|interest| interest.from == from)
    }

    /// 记录一条新兴趣。每只来源宠物最多一条记录，终态记录同样占位。
    pub fn receive_interest(&mut self, interest: Interest) -> DomainResult<()> {
        if !self.is_active {
            return Err(DomainError::PetInactive);
        }
        if interest.from == self.id {
            return Err(DomainError::SelfInterest);
        }
        if self.interest_from(interest.from).is_some() {
            return Err(DomainError::InterestAlreadySent);
        }
        self.interests.push(interest);
        Ok(())
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}
