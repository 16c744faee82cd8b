//! 社区统计设置 Repository（表 server_stats_configs）

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::{Result, ServerError};
use crate::model::CommunitySettings;
use crate::repository::SettingsStore;

pub struct PgSettingsStore {
    pool: PgPool,
}

impl PgSettingsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for PgSettingsStore {
    async fn get(&self, community_id: i64) -> Result<CommunitySettings> {
        #[derive(sqlx::FromRow)]
        struct Row {
            public: bool,
            ignore_channels: String,
            updated_at: DateTime<Utc>,
        }

        let row = sqlx::query_as::<_, Row>(
            r#"
            SELECT public, ignore_channels, updated_at
            FROM server_stats_configs
            WHERE guild_id = $1
            "#,
        )
        .bind(community_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ServerError::Database(format!("get_stats_config: {}", e)))?;

        Ok(match row {
            Some(r) => CommunitySettings {
                community_id,
                public: r.public,
                ignored_channels: CommunitySettings::parse_ignored_channels(&r.ignore_channels),
                updated_at: Some(r.updated_at),
            },
            None => CommunitySettings::new(community_id),
        })
    }

    async fn upsert(&self, settings: &CommunitySettings) -> Result<()> {
        let now = settings.updated_at.unwrap_or_else(Utc::now);
        sqlx::query(
            r#"
            INSERT INTO server_stats_configs (guild_id, public, ignore_channels, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (guild_id)
            DO UPDATE SET public = $2, ignore_channels = $3, updated_at = $4
            "#,
        )
        .bind(settings.community_id)
        .bind(settings.public)
        .bind(settings.ignored_channels_csv())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| ServerError::Database(format!("upsert_stats_config: {}", e)))?;

        Ok(())
    }
}
