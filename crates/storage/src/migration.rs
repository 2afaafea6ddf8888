use sea_orm::sea_query::{ColumnDef, Expr, Index, Table, TableCreateStatement};
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection};

use crate::entity::{tenant_credits, tenants, watched_wallets};
use walletwatch_domain::storage::{StorageError, StorageResult};

pub async fn run_migrations(db: &DatabaseConnection) -> StorageResult<()> {
    let backend = db.get_database_backend();

    let tenants_table = Table::create()
        .if_not_exists()
        .table(tenants::Entity)
        .col(
            ColumnDef::new(tenants::Column::TenantId)
                .string_len(64)
                .not_null()
                .primary_key(),
        )
        .col(
            ColumnDef::new(tenants::Column::Plan)
                .tiny_integer()
                .not_null()
                .default(0),
        )
        .col(
            ColumnDef::new(tenants::Column::AlertDestination)
                .string()
                .null(),
        )
        .col(
            ColumnDef::new(tenants::Column::CreatedAt)
                .date_time()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .to_owned();
    create_table(db, backend, tenants_table).await?;

    let wallets_table = Table::create()
        .if_not_exists()
        .table(watched_wallets::Entity)
        .col(
            ColumnDef::new(watched_wallets::Column::TenantId)
                .string_len(64)
                .not_null(),
        )
        .col(
            ColumnDef::new(watched_wallets::Column::Address)
                .string_len(64)
                .not_null(),
        )
        .col(
            ColumnDef::new(watched_wallets::Column::CreatedAt)
                .date_time()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .primary_key(
            Index::create()
                .col(watched_wallets::Column::TenantId)
                .col(watched_wallets::Column::Address),
        )
        .to_owned();
    create_table(db, backend, wallets_table).await?;

    let credits_table = Table::create()
        .if_not_exists()
        .table(tenant_credits::Entity)
        .col(
            ColumnDef::new(tenant_credits::Column::TenantId)
                .string_len(64)
                .not_null(),
        )
        .col(
            ColumnDef::new(tenant_credits::Column::UserId)
                .string_len(64)
                .not_null(),
        )
        .col(
            ColumnDef::new(tenant_credits::Column::Credits)
                .big_integer()
                .not_null()
                .default(0),
        )
        .primary_key(
            Index::create()
                .col(tenant_credits::Column::TenantId)
                .col(tenant_credits::Column::UserId),
        )
        .to_owned();
    create_table(db, backend, credits_table).await?;

    Ok(())
}

async fn create_table(
    db: &DatabaseConnection,
    backend: DatabaseBackend,
    mut statement: TableCreateStatement,
) -> StorageResult<()> {
    statement.if_not_exists();
    db.execute(backend.build(&statement))
        .await
        .map_err(StorageError::from_source)?;
    Ok(())
}
