use sea_orm_migration::cli;

// Reads DATABASE_URL; `up` creates the pods and images tables.
#[tokio::main]
async fn main() {
    cli::run_cli(db_migration::Migrator).await;
}
