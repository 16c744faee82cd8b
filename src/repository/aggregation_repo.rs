//! 每日统计 Repository（表 server_stats_member_periods / server_stats_message_periods）

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::debug;

use crate::error::{Result, ServerError};
use crate::model::{
    ChannelMessageCount, ChannelStats, DailyStats, MemberChartDataPeriod, MessageChartDataPeriod,
};
use crate::repository::AggregationStore;

/// 社区设置中被忽略的频道（逗号分隔）转成数组，供 `<> ALL(...)` 使用
const IGNORED_CHANNELS_SQL: &str = r#"
    COALESCE(
        (SELECT string_to_array(NULLIF(ignore_channels, ''), ',')::BIGINT[]
         FROM server_stats_configs WHERE guild_id = $1),
        '{}'::BIGINT[]
    )
"#;

/// 逐日序列 `days(t)`：截止今天共 `$2` 天；`$2 < 0` 时从该社区最早一天开始。
/// 成员与消息序列都以它为基准，没有数据的日期补 0，两条序列按日对齐。
const DAY_SERIES_SQL: &str = r#"
    WITH bounds AS (
        SELECT CASE
            WHEN $2::INT < 0 THEN COALESCE(
                LEAST(
                    (SELECT MIN(t) FROM server_stats_member_periods WHERE guild_id = $1),
                    (SELECT MIN(t) FROM server_stats_message_periods WHERE guild_id = $1)
                ),
                CURRENT_DATE
            )
            ELSE CURRENT_DATE - ($2::INT - 1)
        END AS first_day
    ),
    days AS (
        SELECT d::DATE AS t
        FROM bounds, generate_series(bounds.first_day, CURRENT_DATE, INTERVAL '1 day') AS d
    )
"#;

/// PostgreSQL 每日统计存储
pub struct PgAggregationStore {
    pool: PgPool,
}

impl PgAggregationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// 按日期（降序）聚合的单频道消息数；`channel_name` 为空表示当天没有消息
#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    t: NaiveDate,
    channel_name: Option<String>,
    count: i64,
}

/// 行按 t 降序排列，相同日期的行相邻
fn fold_message_rows(rows: Vec<MessageRow>) -> Vec<MessageChartDataPeriod> {
    let mut periods: Vec<MessageChartDataPeriod> = Vec::new();
    for row in rows {
        if periods.last().map(|p| p.t) != Some(row.t) {
            periods.push(MessageChartDataPeriod {
                t: row.t,
                num_messages: 0,
                channels: Vec::new(),
            });
        }
        let Some(period) = periods.last_mut() else {
            continue;
        };
        if let Some(channel) = row.channel_name {
            period.num_messages += row.count;
            period.channels.push(ChannelMessageCount {
                channel,
                count: row.count,
            });
        }
    }
    periods
}

#[async_trait]
impl AggregationStore for PgAggregationStore {
    async fn retrieve_member_series(
        &self,
        community_id: i64,
        days: i32,
    ) -> Result<Vec<MemberChartDataPeriod>> {
        #[derive(sqlx::FromRow)]
        struct Row {
            t: NaiveDate,
            joins: i64,
            leaves: i64,
            num_members: i64,
            max_online: i64,
        }

        let sql = format!(
            r#"
            {}
            SELECT days.t,
                   COALESCE(p.joins, 0)::BIGINT AS joins,
                   COALESCE(p.leaves, 0)::BIGINT AS leaves,
                   COALESCE(p.num_members, 0)::BIGINT AS num_members,
                   COALESCE(p.max_online, 0)::BIGINT AS max_online
            FROM days
            LEFT JOIN server_stats_member_periods p
              ON p.guild_id = $1 AND p.t = days.t
            ORDER BY days.t DESC
            "#,
            DAY_SERIES_SQL
        );

        let rows = sqlx::query_as::<_, Row>(&sql)
            .bind(community_id)
            .bind(days)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ServerError::Database(format!("retrieve_member_series: {}", e)))?;

        debug!(
            "成员序列: community_id={}, days={}, rows={}",
            community_id,
            days,
            rows.len()
        );

        Ok(rows
            .into_iter()
            .map(|r| MemberChartDataPeriod {
                t: r.t,
                joins: r.joins,
                leaves: r.leaves,
                num_members: r.num_members,
                max_online: r.max_online,
            })
            .collect())
    }

    async fn retrieve_message_series(
        &self,
        community_id: i64,
        days: i32,
    ) -> Result<Vec<MessageChartDataPeriod>> {
        let sql = format!(
            r#"
            {}
            SELECT days.t, m.channel_name, COALESCE(SUM(m.count), 0)::BIGINT AS count
            FROM days
            LEFT JOIN server_stats_message_periods m
              ON m.guild_id = $1
             AND m.t = days.t
             AND m.channel_id <> ALL({})
            GROUP BY days.t, m.channel_name
            ORDER BY days.t DESC, m.channel_name
            "#,
            DAY_SERIES_SQL, IGNORED_CHANNELS_SQL
        );

        let rows = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(community_id)
            .bind(days)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ServerError::Database(format!("retrieve_message_series: {}", e)))?;

        Ok(fold_message_rows(rows))
    }

    async fn retrieve_daily_stats(&self, community_id: i64) -> Result<DailyStats> {
        #[derive(sqlx::FromRow)]
        struct ChannelRow {
            name: String,
            count: i64,
        }

        #[derive(sqlx::FromRow)]
        struct MemberRow {
            joins: i64,
            leaves: i64,
            num_members: i64,
            max_online: i64,
        }

        let sql = format!(
            r#"
            SELECT channel_name AS name, SUM(count)::BIGINT AS count
            FROM server_stats_message_periods
            WHERE guild_id = $1
              AND t = CURRENT_DATE
              AND channel_id <> ALL({})
            GROUP BY channel_name
            ORDER BY count DESC
            "#,
            IGNORED_CHANNELS_SQL
        );

        let channels = sqlx::query_as::<_, ChannelRow>(&sql)
            .bind(community_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ServerError::Database(format!("retrieve_daily_channels: {}", e)))?;

        let latest = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT joins, leaves, num_members, max_online
            FROM server_stats_member_periods
            WHERE guild_id = $1
            ORDER BY t DESC
            LIMIT 1
            "#,
        )
        .bind(community_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ServerError::Database(format!("retrieve_daily_members: {}", e)))?;

        let mut stats = DailyStats {
            channel_messages: channels
                .into_iter()
                .map(|c| ChannelStats {
                    name: c.name,
                    count: c.count,
                })
                .collect(),
            ..DailyStats::default()
        };

        if let Some(m) = latest {
            stats.joined_day = m.joins;
            stats.left_day = m.leaves;
            stats.total_members_now = m.num_members;
            stats.online_now = m.max_online;
        }

        Ok(stats)
    }
}
