use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Serialize, Deserialize, FromRow)]
pub struct DbUser {
    pub id: i64,
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) is_admin: bool,
    pub(crate) referred_by: Option<i64>,
    pub(crate) referrals: Option<i64>,
    pub(crate) contributed: Option<Decimal>,
    pub(crate) created_on: OffsetDateTime,
}

#[derive(Serialize, FromRow, Debug, Clone, PartialEq)]
pub struct DbProject {
    pub id: i64,
    pub name: String,
}

#[derive(FromRow, Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub total: Decimal,
    pub average: Option<Decimal>,
    pub contributions: i64,
    pub largest: Option<Decimal>,
    pub smallest: Option<Decimal>,
}

#[derive(FromRow, Debug, Clone, PartialEq)]
pub struct PeriodRow {
    pub period: String,
    pub total: Decimal,
    pub contributions: i64,
    pub average: Decimal,
}

/// `day_of_week` is Postgres' `extract(dow ...)`: 0 is Sunday.
#[derive(FromRow, Debug, Clone, PartialEq)]
pub struct WeekdayRow {
    pub day_of_week: i32,
    pub total: Decimal,
    pub contributions: i64,
    pub average: Decimal,
}

#[derive(FromRow, Debug, Clone, PartialEq)]
pub struct BucketRow {
    pub bucket: i32,
    pub contributions: i64,
    pub total: Decimal,
}

#[derive(Serialize, FromRow, Debug, Clone, PartialEq)]
pub struct TopContributor {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub total: Decimal,
    pub contributions: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub last_contributed_at: OffsetDateTime,
}

#[derive(Serialize, FromRow, Debug, Clone, PartialEq)]
pub struct RecentContribution {
    pub id: i64,
    pub user_id: i64,
    pub contributor: String,
    pub amount: Decimal,
    #[serde(with = "time::serde::rfc3339")]
    pub contributed_at: OffsetDateTime,
    pub payment_method: Option<String>,
    pub project: String,
}

#[derive(FromRow, Debug, Clone, Copy, PartialEq)]
pub struct ReferralEdgeRow {
    pub id: i64,
    pub referred_by: Option<i64>,
}

#[derive(Serialize, FromRow, Debug, Clone, Copy, PartialEq)]
pub struct ReferralTotals {
    pub total_users: i64,
    pub referred_users: i64,
    pub referrers: i64,
}

#[derive(Serialize, FromRow, Debug, Clone, PartialEq)]
pub struct TopReferrer {
    pub user_id: i64,
    pub name: String,
    pub direct_referrals: i64,
    pub referred_total: Decimal,
}

#[derive(FromRow, Debug, Clone, PartialEq)]
pub struct ReferredGroupRow {
    pub referred: bool,
    pub contributions: i64,
    pub total: Decimal,
    pub average: Option<Decimal>,
}

#[derive(Serialize, FromRow, Debug, Clone, PartialEq)]
pub struct RecentReferral {
    pub user_id: i64,
    pub name: String,
    pub referrer_id: i64,
    pub referrer_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
}
