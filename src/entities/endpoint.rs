use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "endpoints")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub scan_id: i32,
    #[sea_orm(unique)]
    pub uid: String,
    pub subdomain: String,
    #[sea_orm(column_type = "Text")]
    pub url: String,
    pub status_code: Option<i32>,
    pub content_type: Option<String>,
    pub server: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub alert_refs: String, // JSON array of alert uids, append-only
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::scan::Entity",
        from = "Column::ScanId",
        to = "super::scan::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Scan,
    #[sea_orm(has_many = "super::alert::Entity")]
    Alert,
}

impl Related<super::scan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Scan.def()
    }
}

impl Related<super::alert::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Alert.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
