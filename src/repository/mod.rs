use crate::domain::fields::ReportFilter;
use sqlx::{Postgres, QueryBuilder};

pub mod referrals;
pub mod reports;
pub mod users;

pub use referrals::*;
pub use reports::*;
pub use users::*;

pub const TOP_CONTRIBUTORS_LIMIT: i64 = 10;
pub const RECENT_CONTRIBUTIONS_LIMIT: i64 = 20;
pub const TOP_REFERRERS_LIMIT: i64 = 10;
pub const RECENT_REFERRALS_LIMIT: i64 = 10;

/// Appends the report window (and project, when filtered) as bound predicates
/// on the contributions alias `c`. `lead` is the keyword joining them to the
/// statement so far, `where` or `and`.
fn push_window<'a>(builder: &mut QueryBuilder<'a, Postgres>, lead: &str, filter: &ReportFilter) {
    builder.push(format!(" {} c.contributed_at >= ", lead));
    builder.push_bind(filter.starts_at());
    builder.push(" and c.contributed_at < ");
    builder.push_bind(filter.ends_before());

    if let Some(project_id) = filter.project.project_id() {
        builder.push(" and c.project_id = ");
        builder.push_bind(project_id);
    }
}
