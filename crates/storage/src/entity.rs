pub mod tenants {
    use sea_orm::entity::prelude::*;
    use sea_orm::sea_query::Expr;
    use walletwatch_domain::model::PlanTier;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "tenants")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub tenant_id: String,
        pub plan: PlanDb,
        pub alert_destination: Option<String>,
        #[sea_orm(default_expr = "Expr::current_timestamp()")]
        pub created_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
    #[sea_orm(rs_type = "i8", db_type = "TinyInteger")]
    pub enum PlanDb {
        #[sea_orm(num_value = 0)]
        Free,
        #[sea_orm(num_value = 1)]
        Pro,
        #[sea_orm(num_value = 2)]
        Elite,
    }

    impl From<PlanTier> for PlanDb {
        fn from(value: PlanTier) -> Self {
            match value {
                PlanTier::Free => PlanDb::Free,
                PlanTier::Pro => PlanDb::Pro,
                PlanTier::Elite => PlanDb::Elite,
            }
        }
    }

    impl From<PlanDb> for PlanTier {
        fn from(value: PlanDb) -> Self {
            match value {
                PlanDb::Free => PlanTier::Free,
                PlanDb::Pro => PlanTier::Pro,
                PlanDb::Elite => PlanTier::Elite,
            }
        }
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod watched_wallets {
    use sea_orm::entity::prelude::*;
    use sea_orm::sea_query::Expr;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "watched_wallets")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub tenant_id: String,
        #[sea_orm(primary_key, auto_increment = false)]
        pub address: String,
        #[sea_orm(default_expr = "Expr::current_timestamp()")]
        pub created_at: DateTimeUtc,
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod tenant_credits {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "tenant_credits")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub tenant_id: String,
        #[sea_orm(primary_key, auto_increment = false)]
        pub user_id: String,
        pub credits: i64,
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}
