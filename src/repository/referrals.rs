use crate::domain::{
    errors::DatabaseError,
    fields::ReportFilter,
    model::{RecentReferral, ReferralEdgeRow, ReferralTotals, ReferredGroupRow, TopReferrer},
};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::{push_window, RECENT_REFERRALS_LIMIT, TOP_REFERRERS_LIMIT};

/// The whole `referred_by` adjacency list; the forest is walked in memory.
pub async fn fetch_referral_edges(pool: &PgPool) -> Result<Vec<ReferralEdgeRow>, DatabaseError> {
    sqlx::query_as::<_, ReferralEdgeRow>("select id, referred_by from users")
        .fetch_all(pool)
        .await
        .map_err(|e| {
            tracing::error!("fetch referral edges failed >>> {}", e);
            DatabaseError::ServerError
        })
}

pub async fn fetch_referral_totals(pool: &PgPool) -> Result<ReferralTotals, DatabaseError> {
    sqlx::query_as::<_, ReferralTotals>(
        "select count(*) as total_users, count(referred_by) as referred_users, \
         count(distinct referred_by) as referrers from users",
    )
    .fetch_one(pool)
    .await
    .map_err(|e| {
        tracing::error!("fetch referral totals failed >>> {}", e);
        DatabaseError::ServerError
    })
}

/// Referrers ranked by direct referrals, then by what their referrals gave
/// inside the report window.
pub fn top_referrers_query(filter: &ReportFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(
        "select r.id as user_id, r.name, count(distinct u.id) as direct_referrals, \
         coalesce(sum(c.amount), 0) as referred_total \
         from users as r \
         join users as u on u.referred_by = r.id \
         left join contributions as c on c.user_id = u.id",
    );
    push_window(&mut builder, "and", filter);
    builder.push(
        " group by r.id, r.name order by direct_referrals desc, referred_total desc, r.id limit ",
    );
    builder.push_bind(TOP_REFERRERS_LIMIT);
    builder
}

pub async fn fetch_top_referrers(
    pool: &PgPool,
    filter: &ReportFilter,
) -> Result<Vec<TopReferrer>, DatabaseError> {
    top_referrers_query(filter)
        .build_query_as::<TopReferrer>()
        .fetch_all(pool)
        .await
        .map_err(|e| {
            tracing::error!("fetch top referrers failed >>> {}", e);
            DatabaseError::ServerError
        })
}

pub fn referred_comparison_query(filter: &ReportFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(
        "select (u.referred_by is not null) as referred, count(c.id) as contributions, \
         coalesce(sum(c.amount), 0) as total, round(avg(c.amount), 2) as average \
         from contributions as c join users as u on u.id = c.user_id",
    );
    push_window(&mut builder, "where", filter);
    builder.push(" group by 1");
    builder
}

pub async fn fetch_referred_comparison(
    pool: &PgPool,
    filter: &ReportFilter,
) -> Result<Vec<ReferredGroupRow>, DatabaseError> {
    referred_comparison_query(filter)
        .build_query_as::<ReferredGroupRow>()
        .fetch_all(pool)
        .await
        .map_err(|e| {
            tracing::error!("fetch referred comparison failed >>> {}", e);
            DatabaseError::ServerError
        })
}

pub async fn fetch_recent_referrals(pool: &PgPool) -> Result<Vec<RecentReferral>, DatabaseError> {
    sqlx::query_as::<_, RecentReferral>(
        "select u.id as user_id, u.name, r.id as referrer_id, r.name as referrer_name, \
         u.created_at as joined_at \
         from users as u join users as r on r.id = u.referred_by \
         order by u.created_at desc, u.id desc limit $1",
    )
    .bind(RECENT_REFERRALS_LIMIT)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!("fetch recent referrals failed >>> {}", e);
        DatabaseError::ServerError
    })
}
