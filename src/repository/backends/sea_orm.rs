use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, Index};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ActiveValue::Set, ColumnTrait, ConnectOptions,
    ConnectionTrait, Database, DatabaseConnection, EntityTrait, IsolationLevel, QueryFilter,
    QueryOrder, Schema, SqlErr,
};
use tracing::{info, warn};

use super::entity::links;
use crate::errors::{LinkvaultError, Result};
use crate::repository::tx::within_tx;
use crate::repository::{CreateOutcome, Repository};
use crate::structs::{BackendInfo, Link};

#[derive(Clone)]
pub struct SeaOrmRepository {
    db: DatabaseConnection,
    backend_name: String,
}

impl SeaOrmRepository {
    pub async fn new(database_url: &str, backend_name: &str) -> Result<Self> {
        if database_url.is_empty() {
            return Err(LinkvaultError::database_config("DATABASE_URL is not set"));
        }

        // 根据不同数据库类型配置连接选项
        let db = if backend_name == "sqlite" {
            Self::connect_sqlite(database_url).await?
        } else {
            Self::connect_generic(database_url, backend_name).await?
        };

        let repository = SeaOrmRepository {
            db,
            backend_name: backend_name.to_string(),
        };

        repository.ensure_schema().await?;

        warn!(
            "{} Repository initialized.",
            repository.backend_name.to_uppercase()
        );
        Ok(repository)
    }

    /// 连接 SQLite 数据库（带自动创建和性能优化）
    async fn connect_sqlite(database_url: &str) -> Result<DatabaseConnection> {
        use sea_orm::SqlxSqliteConnector;
        use sea_orm::sqlx::SqlitePool;
        use sea_orm::sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
        use std::str::FromStr;

        let opt = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| {
                LinkvaultError::database_config(format!("Failed to parse SQLite URL: {}", e))
            })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePool::connect_with(opt).await.map_err(|e| {
            LinkvaultError::database_connection(format!("Failed to connect to SQLite: {}", e))
        })?;

        Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
    }

    /// 连接通用数据库（MySQL/PostgreSQL）
    async fn connect_generic(database_url: &str, backend_name: &str) -> Result<DatabaseConnection> {
        let mut opt = ConnectOptions::new(database_url.to_owned());
        opt.max_connections(100)
            .min_connections(5)
            .connect_timeout(std::time::Duration::from_secs(8))
            .acquire_timeout(std::time::Duration::from_secs(8))
            .idle_timeout(std::time::Duration::from_secs(8))
            .sqlx_logging(false);

        Database::connect(opt).await.map_err(|e| {
            LinkvaultError::database_connection(format!(
                "Failed to connect to {}: {}",
                backend_name.to_uppercase(),
                e
            ))
        })
    }

    /// 初始化表结构和索引
    async fn ensure_schema(&self) -> Result<()> {
        let builder = self.db.get_database_backend();
        let schema = Schema::new(builder);

        let mut table = schema.create_table_from_entity(links::Entity);
        table.if_not_exists();
        self.db.execute(builder.build(&table)).await.map_err(|e| {
            LinkvaultError::database_operation(format!("Failed to create links table: {}", e))
        })?;

        // 内容查重走 (owner_id, original_url)，非唯一索引即可，
        // 软删除行保留在表里不能参与唯一约束
        let index = Index::create()
            .name("idx_links_owner_url")
            .table(links::Entity)
            .col(links::Column::OwnerId)
            .col(links::Column::OriginalUrl)
            .if_not_exists()
            .to_owned();
        self.db.execute(builder.build(&index)).await.map_err(|e| {
            LinkvaultError::database_operation(format!("Failed to create owner/url index: {}", e))
        })?;

        info!("Database schema ensured");
        Ok(())
    }

    /// Underlying connection, for callers composing their own transaction
    /// scopes via [`within_tx`].
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// 事务隔离级别：SQLite 事务本身就是串行化的，传 None
    fn isolation(&self) -> Option<IsolationLevel> {
        if self.backend_name == "sqlite" {
            None
        } else {
            Some(IsolationLevel::Serializable)
        }
    }

    fn model_to_link(model: links::Model) -> Link {
        Link {
            id: model.id,
            original_url: model.original_url,
            short_code: model.short_code,
            owner_id: model.owner_id,
            created_at: model.created_at,
            deleted_at: model.deleted_at,
        }
    }

    fn link_to_active_model(link: &Link) -> links::ActiveModel {
        links::ActiveModel {
            id: NotSet,
            original_url: Set(link.original_url.clone()),
            short_code: Set(link.short_code.clone()),
            owner_id: Set(link.owner_id),
            created_at: Set(link.created_at),
            deleted_at: Set(link.deleted_at),
        }
    }

    fn is_unique_violation(err: &sea_orm::DbErr) -> bool {
        matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
    }

    async fn find_live_by_owner_and_url<C: ConnectionTrait>(
        conn: &C,
        owner_id: i64,
        url: &str,
    ) -> Result<Option<Link>> {
        let model = links::Entity::find()
            .filter(links::Column::OwnerId.eq(owner_id))
            .filter(links::Column::OriginalUrl.eq(url))
            .filter(links::Column::DeletedAt.is_null())
            .one(conn)
            .await
            .map_err(|e| {
                LinkvaultError::database_operation(format!("Failed to query link by url: {}", e))
            })?;

        Ok(model.map(Self::model_to_link))
    }

    async fn insert_link<C: ConnectionTrait>(conn: &C, link: &Link) -> Result<CreateOutcome> {
        match Self::link_to_active_model(link).insert(conn).await {
            Ok(model) => Ok(CreateOutcome::Created(Self::model_to_link(model))),
            Err(e) if Self::is_unique_violation(&e) => Err(LinkvaultError::code_conflict(format!(
                "Short code already taken: {}",
                link.short_code
            ))),
            Err(e) => Err(LinkvaultError::database_operation(format!(
                "Failed to insert link: {}",
                e
            ))),
        }
    }
}

#[async_trait]
impl Repository for SeaOrmRepository {
    async fn create(&self, link: Link) -> Result<CreateOutcome> {
        // 内容查重先行；短码唯一性交给唯一索引，
        // 并发竞争时只有一个写入者胜出
        if let Some(existing) =
            Self::find_live_by_owner_and_url(&self.db, link.owner_id, &link.original_url).await?
        {
            return Ok(CreateOutcome::DuplicateUrl(existing));
        }

        Self::insert_link(&self.db, &link).await
    }

    async fn get_by_code(&self, code: &str) -> Result<Link> {
        let model = links::Entity::find()
            .filter(links::Column::ShortCode.eq(code))
            .one(&self.db)
            .await
            .map_err(|e| {
                LinkvaultError::database_operation(format!("Failed to query link: {}", e))
            })?;

        model
            .map(Self::model_to_link)
            .ok_or_else(|| LinkvaultError::not_found(format!("Link not found: {}", code)))
    }

    async fn get_by_owner_and_url(&self, owner_id: i64, url: &str) -> Result<Link> {
        Self::find_live_by_owner_and_url(&self.db, owner_id, url)
            .await?
            .ok_or_else(|| {
                LinkvaultError::not_found(format!("No link for owner {} and url {}", owner_id, url))
            })
    }

    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Link>> {
        let models = links::Entity::find()
            .filter(links::Column::OwnerId.eq(owner_id))
            .filter(links::Column::DeletedAt.is_null())
            .order_by_asc(links::Column::Id)
            .all(&self.db)
            .await
            .map_err(|e| {
                LinkvaultError::database_operation(format!("Failed to list links: {}", e))
            })?;

        Ok(models.into_iter().map(Self::model_to_link).collect())
    }

    async fn batch_exists(&self, urls: &[String]) -> Result<Vec<Link>> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }

        let models = links::Entity::find()
            .filter(links::Column::OriginalUrl.is_in(urls.iter().cloned()))
            .filter(links::Column::DeletedAt.is_null())
            .all(&self.db)
            .await
            .map_err(|e| {
                LinkvaultError::database_operation(format!("Failed to batch check urls: {}", e))
            })?;

        Ok(models.into_iter().map(Self::model_to_link).collect())
    }

    /// Transactional: a short-code collision rolls back the whole batch;
    /// rows whose `(owner_id, original_url)` already exists are skipped.
    async fn batch_create(&self, links_to_insert: Vec<Link>) -> Result<Vec<Link>> {
        if links_to_insert.is_empty() {
            return Ok(Vec::new());
        }

        within_tx(&self.db, self.isolation(), move |txn| {
            Box::pin(async move {
                let mut created = Vec::with_capacity(links_to_insert.len());
                for link in &links_to_insert {
                    if Self::find_live_by_owner_and_url(txn, link.owner_id, &link.original_url)
                        .await?
                        .is_some()
                    {
                        continue;
                    }
                    match Self::insert_link(txn, link).await? {
                        CreateOutcome::Created(saved) => created.push(saved),
                        CreateOutcome::DuplicateUrl(_) => {}
                    }
                }
                Ok(created)
            })
        })
        .await
    }

    async fn soft_delete(&self, owner_id: i64, codes: &[String]) -> Result<u64> {
        if codes.is_empty() {
            return Ok(0);
        }

        let result = links::Entity::update_many()
            .col_expr(links::Column::DeletedAt, Expr::value(Some(Utc::now())))
            .filter(links::Column::OwnerId.eq(owner_id))
            .filter(links::Column::ShortCode.is_in(codes.iter().cloned()))
            .filter(links::Column::DeletedAt.is_null())
            .exec(&self.db)
            .await
            .map_err(|e| {
                LinkvaultError::database_operation(format!("Failed to soft delete links: {}", e))
            })?;

        Ok(result.rows_affected)
    }

    async fn ping(&self) -> Result<()> {
        self.db.ping().await.map_err(|e| {
            LinkvaultError::database_connection(format!("Database ping failed: {}", e))
        })
    }

    async fn backend_info(&self) -> BackendInfo {
        BackendInfo {
            backend_type: self.backend_name.clone(),
            supports_transactions: true,
        }
    }
}
