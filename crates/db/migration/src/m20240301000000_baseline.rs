use sea_orm_migration::{prelude::*, sea_orm::DatabaseBackend};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Pods::Table)
                    .col(pk_id_col(manager, Pods::Id))
                    .col(ColumnDef::new(Pods::Name).string().not_null())
                    .col(ColumnDef::new(Pods::Type).string().not_null())
                    .col(ColumnDef::new(Pods::PlantingDate).date().not_null())
                    .col(ColumnDef::new(Pods::Description).text())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Images::Table)
                    .col(pk_id_col(manager, Images::Id))
                    .col(fk_id_col(manager, Images::PodId))
                    .col(ColumnDef::new(Images::Filename).string().not_null())
                    .col(timestamp_col(Images::UploadTime))
                    .col(ColumnDef::new(Images::Description).text())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_images_pod_id")
                            .from(Images::Table, Images::PodId)
                            .to(Pods::Table, Pods::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_images_filename")
                    .table(Images::Table)
                    .col(Images::Filename)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_images_pod_id")
                    .table(Images::Table)
                    .col(Images::PodId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_images_pod_id")
                    .table(Images::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_images_filename")
                    .table(Images::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Images::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Pods::Table).to_owned())
            .await?;

        Ok(())
    }
}

fn pk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().auto_increment().primary_key().to_owned()
}

fn fk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().to_owned()
}

fn timestamp_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

#[derive(Iden)]
enum Pods {
    Table,
    Id,
    Name,
    Type,
    PlantingDate,
    Description,
}

#[derive(Iden)]
enum Images {
    Table,
    Id,
    PodId,
    Filename,
    UploadTime,
    Description,
}
