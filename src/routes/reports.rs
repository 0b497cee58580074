use std::sync::Arc;

use crate::{
    app::AppState,
    domain::{
        errors::ApiError,
        fields::{AuthContext, ReportFilter, ReportParams},
        model::{RecentContribution, TopContributor},
        referral::{ReferralForest, ReferralReport},
        report::{
            bucket_distribution, monthly_trend, weekday_totals, BucketTotal, MonthlyTotal,
            ReferredComparison, Report, Summary, WeekdayTotal,
        },
    },
    repository::{
        fetch_buckets, fetch_monthly, fetch_recent_contributions, fetch_recent_referrals,
        fetch_referral_edges, fetch_referral_totals, fetch_referred_comparison, fetch_summary,
        fetch_top_contributors, fetch_top_referrers, fetch_weekdays,
    },
};
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use sqlx::PgPool;
use time::OffsetDateTime;

fn report_filter(params: &ReportParams) -> Result<ReportFilter, ApiError> {
    ReportFilter::from_params(params, OffsetDateTime::now_utc().date())
}

pub async fn build_referral_report(
    pool: &PgPool,
    filter: &ReportFilter,
) -> Result<ReferralReport, ApiError> {
    let totals = fetch_referral_totals(pool).await?;
    let top_referrers = fetch_top_referrers(pool, filter).await?;
    let forest = ReferralForest::from(fetch_referral_edges(pool).await?).stats();
    let comparison = ReferredComparison::from(fetch_referred_comparison(pool, filter).await?);
    let recent_referrals = fetch_recent_referrals(pool).await?;

    Ok(ReferralReport {
        totals,
        top_referrers,
        forest,
        comparison,
        recent_referrals,
    })
}

pub async fn get_report(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReportParams>,
    Extension(principal): Extension<AuthContext>,
) -> Result<Json<Report>, ApiError> {
    let filter = report_filter(&params)?;
    tracing::info!(
        "building report for {} >>> {} to {}",
        principal.user_id,
        filter.start_date,
        filter.end_date
    );
    let pool = state.get_pool();

    let summary = Summary::from(fetch_summary(&pool, &filter).await?);
    let monthly = monthly_trend(fetch_monthly(&pool, &filter).await?);
    let weekdays = weekday_totals(fetch_weekdays(&pool, &filter).await?);
    let top_contributors = fetch_top_contributors(&pool, &filter).await?;
    let buckets = bucket_distribution(fetch_buckets(&pool, &filter).await?);
    let recent = fetch_recent_contributions(&pool, &filter).await?;
    let referrals = build_referral_report(&pool, &filter).await?;

    Ok(Json(Report {
        filter,
        summary,
        monthly,
        weekdays,
        top_contributors,
        buckets,
        recent,
        referrals,
    }))
}

pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReportParams>,
) -> Result<Json<Summary>, ApiError> {
    let filter = report_filter(&params)?;
    let row = fetch_summary(&state.get_pool(), &filter).await?;
    Ok(Json(row.into()))
}

pub async fn get_monthly(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReportParams>,
) -> Result<Json<Vec<MonthlyTotal>>, ApiError> {
    let filter = report_filter(&params)?;
    let rows = fetch_monthly(&state.get_pool(), &filter).await?;
    Ok(Json(monthly_trend(rows)))
}

pub async fn get_weekdays(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReportParams>,
) -> Result<Json<Vec<WeekdayTotal>>, ApiError> {
    let filter = report_filter(&params)?;
    let rows = fetch_weekdays(&state.get_pool(), &filter).await?;
    Ok(Json(weekday_totals(rows)))
}

pub async fn get_top_contributors(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReportParams>,
) -> Result<Json<Vec<TopContributor>>, ApiError> {
    let filter = report_filter(&params)?;
    Ok(Json(fetch_top_contributors(&state.get_pool(), &filter).await?))
}

pub async fn get_buckets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReportParams>,
) -> Result<Json<Vec<BucketTotal>>, ApiError> {
    let filter = report_filter(&params)?;
    let rows = fetch_buckets(&state.get_pool(), &filter).await?;
    Ok(Json(bucket_distribution(rows)))
}

pub async fn get_recent(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReportParams>,
) -> Result<Json<Vec<RecentContribution>>, ApiError> {
    let filter = report_filter(&params)?;
    Ok(Json(
        fetch_recent_contributions(&state.get_pool(), &filter).await?,
    ))
}

pub async fn get_referrals(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReportParams>,
) -> Result<Json<ReferralReport>, ApiError> {
    let filter = report_filter(&params)?;
    Ok(Json(build_referral_report(&state.get_pool(), &filter).await?))
}
