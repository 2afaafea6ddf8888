use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveEnum, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use tracing::info;
use walletwatch_domain::model::{Destination, PlanTier, TenantId, WalletAddress};
use walletwatch_domain::storage::{
    StorageError, StorageResult, TenantAdmin, TenantDirectory,
};

use crate::entity::tenants::{self, PlanDb};
use crate::entity::{tenant_credits, watched_wallets};
use crate::SeaOrmStorage;

impl SeaOrmStorage {
    async fn find_tenant(&self, tenant: &TenantId) -> StorageResult<Option<tenants::Model>> {
        tenants::Entity::find_by_id(tenant.as_str().to_owned())
            .one(self.connection())
            .await
            .map_err(StorageError::from_source)
    }
}

#[async_trait::async_trait]
impl TenantDirectory for SeaOrmStorage {
    async fn list_tenants(&self) -> StorageResult<Vec<TenantId>> {
        let rows = tenants::Entity::find()
            .order_by_asc(tenants::Column::TenantId)
            .all(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(rows
            .into_iter()
            .map(|row| TenantId::new(row.tenant_id))
            .collect())
    }

    async fn list_watched_addresses(&self, tenant: &TenantId) -> StorageResult<Vec<String>> {
        let rows = watched_wallets::Entity::find()
            .filter(watched_wallets::Column::TenantId.eq(tenant.as_str()))
            .order_by_asc(watched_wallets::Column::CreatedAt)
            .order_by_asc(watched_wallets::Column::Address)
            .all(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(rows.into_iter().map(|row| row.address).collect())
    }

    async fn resolve_destination(&self, tenant: &TenantId) -> StorageResult<Option<Destination>> {
        Ok(self
            .find_tenant(tenant)
            .await?
            .and_then(|row| row.alert_destination)
            .map(Destination::new))
    }
}

#[async_trait::async_trait]
impl TenantAdmin for SeaOrmStorage {
    async fn ensure_tenant(&self, tenant: &TenantId) -> StorageResult<()> {
        let model = tenants::ActiveModel {
            tenant_id: Set(tenant.as_str().to_owned()),
            plan: Set(PlanDb::Free),
            alert_destination: Set(None),
            created_at: Set(Utc::now()),
        };
        tenants::Entity::insert(model)
            .on_conflict(
                OnConflict::column(tenants::Column::TenantId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(())
    }

    async fn add_wallet(&self, tenant: &TenantId, address: &WalletAddress) -> StorageResult<bool> {
        self.ensure_tenant(tenant).await?;

        let existing = watched_wallets::Entity::find_by_id((
            tenant.as_str().to_owned(),
            address.as_str().to_owned(),
        ))
        .one(self.connection())
        .await
        .map_err(StorageError::from_source)?;
        if existing.is_some() {
            return Ok(false);
        }

        let plan = self.plan(tenant).await?;
        let watched = watched_wallets::Entity::find()
            .filter(watched_wallets::Column::TenantId.eq(tenant.as_str()))
            .count(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        let limit = plan.max_wallets();
        if watched as usize >= limit {
            return Err(StorageError::QuotaExceeded { plan, limit });
        }

        let model = watched_wallets::ActiveModel {
            tenant_id: Set(tenant.as_str().to_owned()),
            address: Set(address.as_str().to_owned()),
            created_at: Set(Utc::now()),
        };
        watched_wallets::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    watched_wallets::Column::TenantId,
                    watched_wallets::Column::Address,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        info!(tenant = %tenant, address = %address, "wallet added to watch-list");
        Ok(true)
    }

    async fn remove_wallet(&self, tenant: &TenantId, address: &str) -> StorageResult<bool> {
        let result = watched_wallets::Entity::delete_many()
            .filter(watched_wallets::Column::TenantId.eq(tenant.as_str()))
            .filter(watched_wallets::Column::Address.eq(address.trim()))
            .exec(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(result.rows_affected > 0)
    }

    async fn set_alert_destination(
        &self,
        tenant: &TenantId,
        destination: Destination,
    ) -> StorageResult<()> {
        self.ensure_tenant(tenant).await?;
        tenants::Entity::update_many()
            .col_expr(
                tenants::Column::AlertDestination,
                Expr::value(destination.into_inner()),
            )
            .filter(tenants::Column::TenantId.eq(tenant.as_str()))
            .exec(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(())
    }

    async fn plan(&self, tenant: &TenantId) -> StorageResult<PlanTier> {
        Ok(self
            .find_tenant(tenant)
            .await?
            .map(|row| PlanTier::from(row.plan))
            .unwrap_or_default())
    }

    async fn set_plan(&self, tenant: &TenantId, plan: PlanTier) -> StorageResult<()> {
        self.ensure_tenant(tenant).await?;
        tenants::Entity::update_many()
            .col_expr(
                tenants::Column::Plan,
                Expr::value(PlanDb::from(plan).to_value()),
            )
            .filter(tenants::Column::TenantId.eq(tenant.as_str()))
            .exec(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        info!(tenant = %tenant, %plan, "plan updated");
        Ok(())
    }

    async fn credits(&self, tenant: &TenantId, user: &str) -> StorageResult<i64> {
        let row = tenant_credits::Entity::find_by_id((
            tenant.as_str().to_owned(),
            user.to_owned(),
        ))
        .one(self.connection())
        .await
        .map_err(StorageError::from_source)?;
        Ok(row.map(|row| row.credits).unwrap_or(0))
    }

    async fn add_credits(&self, tenant: &TenantId, user: &str, amount: i64) -> StorageResult<i64> {
        self.ensure_tenant(tenant).await?;
        let balance = self.credits(tenant, user).await?.saturating_add(amount);

        let model = tenant_credits::ActiveModel {
            tenant_id: Set(tenant.as_str().to_owned()),
            user_id: Set(user.to_owned()),
            credits: Set(balance),
        };
        tenant_credits::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    tenant_credits::Column::TenantId,
                    tenant_credits::Column::UserId,
                ])
                .update_column(tenant_credits::Column::Credits)
                .to_owned(),
            )
            .exec_without_returning(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(balance)
    }
}
