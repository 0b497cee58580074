use crate::domain::{
    errors::DatabaseError,
    fields::ReportFilter,
    model::{
        BucketRow, DbProject, PeriodRow, RecentContribution, SummaryRow, TopContributor,
        WeekdayRow,
    },
    report::SizeBucket,
};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::{push_window, RECENT_CONTRIBUTIONS_LIMIT, TOP_CONTRIBUTORS_LIMIT};

pub fn summary_query(filter: &ReportFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(
        "select coalesce(sum(c.amount), 0) as total, round(avg(c.amount), 2) as average, \
         count(*) as contributions, max(c.amount) as largest, min(c.amount) as smallest \
         from contributions as c",
    );
    push_window(&mut builder, "where", filter);
    builder
}

pub fn monthly_query(filter: &ReportFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(
        "select to_char(date_trunc('month', c.contributed_at at time zone 'UTC'), 'YYYY-MM') as period, \
         sum(c.amount) as total, count(*) as contributions, round(avg(c.amount), 2) as average \
         from contributions as c",
    );
    push_window(&mut builder, "where", filter);
    builder.push(" group by 1 order by 1");
    builder
}

pub fn weekday_query(filter: &ReportFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(
        "select extract(dow from c.contributed_at at time zone 'UTC')::int4 as day_of_week, \
         sum(c.amount) as total, count(*) as contributions, round(avg(c.amount), 2) as average \
         from contributions as c",
    );
    push_window(&mut builder, "where", filter);
    builder.push(" group by 1 order by 1");
    builder
}

pub fn top_contributors_query(filter: &ReportFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(
        "select u.id as user_id, u.name, u.email, sum(c.amount) as total, \
         count(c.id) as contributions, max(c.contributed_at) as last_contributed_at \
         from contributions as c join users as u on u.id = c.user_id",
    );
    push_window(&mut builder, "where", filter);
    builder.push(" group by u.id, u.name, u.email order by total desc, u.id limit ");
    builder.push_bind(TOP_CONTRIBUTORS_LIMIT);
    builder
}

pub fn bucket_query(filter: &ReportFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "select ({})::int4 as bucket, count(*) as contributions, sum(c.amount) as total \
         from contributions as c",
        SizeBucket::sql_case("c.amount")
    ));
    push_window(&mut builder, "where", filter);
    builder.push(" group by 1 order by 1");
    builder
}

pub fn recent_contributions_query(filter: &ReportFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(
        "select c.id, c.user_id, u.name as contributor, c.amount, c.contributed_at, \
         c.payment_method, p.name as project \
         from contributions as c \
         join users as u on u.id = c.user_id \
         join projects as p on p.id = c.project_id",
    );
    push_window(&mut builder, "where", filter);
    builder.push(" order by c.contributed_at desc, c.id desc limit ");
    builder.push_bind(RECENT_CONTRIBUTIONS_LIMIT);
    builder
}

pub async fn fetch_summary(pool: &PgPool, filter: &ReportFilter) -> Result<SummaryRow, DatabaseError> {
    summary_query(filter)
        .build_query_as::<SummaryRow>()
        .fetch_one(pool)
        .await
        .map_err(|e| {
            tracing::error!("fetch contribution summary failed >>> {}", e);
            DatabaseError::ServerError
        })
}

pub async fn fetch_monthly(pool: &PgPool, filter: &ReportFilter) -> Result<Vec<PeriodRow>, DatabaseError> {
    monthly_query(filter)
        .build_query_as::<PeriodRow>()
        .fetch_all(pool)
        .await
        .map_err(|e| {
            tracing::error!("fetch monthly trend failed >>> {}", e);
            DatabaseError::ServerError
        })
}

pub async fn fetch_weekdays(pool: &PgPool, filter: &ReportFilter) -> Result<Vec<WeekdayRow>, DatabaseError> {
    weekday_query(filter)
        .build_query_as::<WeekdayRow>()
        .fetch_all(pool)
        .await
        .map_err(|e| {
            tracing::error!("fetch day of week totals failed >>> {}", e);
            DatabaseError::ServerError
        })
}

pub async fn fetch_top_contributors(
    pool: &PgPool,
    filter: &ReportFilter,
) -> Result<Vec<TopContributor>, DatabaseError> {
    top_contributors_query(filter)
        .build_query_as::<TopContributor>()
        .fetch_all(pool)
        .await
        .map_err(|e| {
            tracing::error!("fetch top contributors failed >>> {}", e);
            DatabaseError::ServerError
        })
}

pub async fn fetch_buckets(pool: &PgPool, filter: &ReportFilter) -> Result<Vec<BucketRow>, DatabaseError> {
    bucket_query(filter)
        .build_query_as::<BucketRow>()
        .fetch_all(pool)
        .await
        .map_err(|e| {
            tracing::error!("fetch size buckets failed >>> {}", e);
            DatabaseError::ServerError
        })
}

pub async fn fetch_recent_contributions(
    pool: &PgPool,
    filter: &ReportFilter,
) -> Result<Vec<RecentContribution>, DatabaseError> {
    recent_contributions_query(filter)
        .build_query_as::<RecentContribution>()
        .fetch_all(pool)
        .await
        .map_err(|e| {
            tracing::error!("fetch recent contributions failed >>> {}", e);
            DatabaseError::ServerError
        })
}

pub async fn fetch_projects(pool: &PgPool) -> Result<Vec<DbProject>, DatabaseError> {
    sqlx::query_as::<_, DbProject>("select id, name from projects order by name, id")
        .fetch_all(pool)
        .await
        .map_err(|e| {
            tracing::error!("fetch projects failed >>> {}", e);
            DatabaseError::ServerError
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fields::ProjectFilter;
    use time::macros::date;

    fn filter() -> ReportFilter {
        ReportFilter {
            start_date: date!(2024 - 01 - 01),
            end_date: date!(2024 - 03 - 31),
            project: ProjectFilter::Only(3),
        }
    }

    #[test]
    fn limits_are_bound_after_the_window() {
        let top = top_contributors_query(&filter());
        assert!(top.sql().ends_with("order by total desc, u.id limit $4"));

        let recent = recent_contributions_query(&filter());
        assert!(recent.sql().ends_with("order by c.contributed_at desc, c.id desc limit $4"));
    }

    #[test]
    fn grouped_reports_order_by_their_key() {
        for builder in [monthly_query(&filter()), weekday_query(&filter()), bucket_query(&filter())] {
            assert!(builder.sql().ends_with("c.project_id = $3 group by 1 order by 1"));
        }
    }
}
