//! `SeaORM` Entity for reprocessing_history table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "reprocessing_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub client_id: Uuid,
    pub closure_id: Uuid,
    pub upload_id: Uuid,
    pub previous_upload_id: Uuid,
    pub iteration: i32,
    pub previous_incidences: i32,
    pub current_incidences: i32,
    pub new_incidences: i32,
    pub resolved_incidences: i32,
    pub worsened_incidences: i32,
    pub movements_corrected: i32,
    pub duration_ms: i64,
    #[sea_orm(column_type = "Text")]
    pub reason: String,
    pub actor: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub diff: Json,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::uploads::Entity",
        from = "Column::UploadId",
        to = "super::uploads::Column::Id"
    )]
    Uploads,
}

impl Related<super::uploads::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Uploads.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
