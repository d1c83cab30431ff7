use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "images")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub pod_id: i64,
    #[sea_orm(unique)]
    pub filename: String,
    pub upload_time: DateTimeUtc,
    pub description: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::pod::Entity",
        from = "Column::PodId",
        to = "super::pod::Column::Id",
        on_delete = "Cascade"
    )]
    Pod,
}

impl Related<super::pod::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Pod.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
