//! PetMate 核心领域模型
//!
//! 包含用户、宠物、兴趣、匹配与聊天等实体，以及它们自身能够校验的业务规则。

pub mod chat;
pub mod errors;
pub mod matching;
pub mod pet;
pub mod user;
pub mod value_objects;

// 重新导出常用类型
pub use chat::*;
pub use errors::*;
pub use matching::*;
pub use pet::*;
pub use user::*;
pub use value_objects::*;
