//! Post entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use social_common::Version;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "posts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    /// Author user ID
    #[sea_orm(indexed)]
    pub user_id: i64,

    pub tags: Vec<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,

    /// Optimistic-concurrency counter, bumped by every successful update
    pub version: i32,
}

impl Model {
    /// Current version as a typed value.
    #[must_use]
    pub const fn version(&self) -> Version {
        Version::new(self.version)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,

    #[sea_orm(has_many = "super::comment::Entity")]
    Comment,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
