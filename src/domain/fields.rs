use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use time::{macros::format_description, Date, Month, OffsetDateTime, PrimitiveDateTime};

use super::{errors::ApiError, model::DbUser};

/// How far back the report window reaches when no `start_date` is given.
pub const DEFAULT_WINDOW_MONTHS: u8 = 6;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    pub fn inner(&self) -> i64 {
        self.0
    }
}

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub referred_by: Option<UserId>,
    pub referrals: i64,
    pub contributed: Decimal,
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
}

impl From<DbUser> for User {
    fn from(value: DbUser) -> Self {
        Self {
            id: value.id.into(),
            name: value.name,
            email: value.email,
            is_admin: value.is_admin,
            referred_by: value.referred_by.map(UserId::from),
            referrals: value.referrals.unwrap_or(0),
            contributed: value.contributed.unwrap_or(Decimal::ZERO),
            joined_at: value.created_on,
        }
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum ProjectFilter {
    All,
    Only(i64),
}

impl ProjectFilter {
    /// `None`, empty and `all` mean no filter.
    pub fn parse(raw: Option<&str>) -> Result<Self, ApiError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Self::All),
            Some(value) if value.eq_ignore_ascii_case("all") => Ok(Self::All),
            Some(value) => match value.parse::<i64>() {
                Ok(id) if id > 0 => Ok(Self::Only(id)),
                _ => Err(ApiError::ValidationError(format!(
                    "Invalid project_id: {}",
                    value
                ))),
            },
        }
    }

    pub fn project_id(&self) -> Option<i64> {
        match self {
            Self::All => None,
            Self::Only(id) => Some(*id),
        }
    }
}

/// Raw report query string, as sent by the admin UI.
#[derive(Deserialize, Default, Debug)]
pub struct ReportParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub project_id: Option<String>,
}

/// Validated report window. Both bounds are inclusive calendar days (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ReportFilter {
    pub start_date: Date,
    pub end_date: Date,
    #[serde(rename = "project_id")]
    pub project: ProjectFilter,
}

impl ReportFilter {
    pub fn from_params(params: &ReportParams, today: Date) -> Result<Self, ApiError> {
        let end_date = match non_empty(&params.end_date) {
            Some(raw) => parse_date("end_date", raw)?,
            None => today,
        };
        let start_date = match non_empty(&params.start_date) {
            Some(raw) => parse_date("start_date", raw)?,
            None => months_before(today, DEFAULT_WINDOW_MONTHS),
        };

        if start_date > end_date {
            return Err(ApiError::ValidationError(
                "start_date must not be after end_date".to_string(),
            ));
        }

        Ok(Self {
            start_date,
            end_date,
            project: ProjectFilter::parse(params.project_id.as_deref())?,
        })
    }

    /// First instant of `start_date`.
    pub fn starts_at(&self) -> OffsetDateTime {
        self.start_date.midnight().assume_utc()
    }

    /// First instant after `end_date`; the window is `[starts_at, ends_before)`.
    pub fn ends_before(&self) -> OffsetDateTime {
        match self.end_date.next_day() {
            Some(next) => next.midnight().assume_utc(),
            None => PrimitiveDateTime::MAX.assume_utc(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_date(field: &str, raw: &str) -> Result<Date, ApiError> {
    Date::parse(raw, format_description!("[year]-[month]-[day]")).map_err(|_| {
        ApiError::ValidationError(format!("{} must be a YYYY-MM-DD date, got {}", field, raw))
    })
}

/// Same day `months` calendar months earlier, clamped to the length of the target month.
pub fn months_before(date: Date, months: u8) -> Date {
    let mut year = date.year();
    let mut month = date.month();
    for _ in 0..months {
        if month == Month::January {
            year -= 1;
        }
        month = month.previous();
    }
    let day = date.day().min(time::util::days_in_year_month(year, month));

    Date::from_calendar_date(year, month, day).unwrap_or(date)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> Result<UserId, ApiError> {
        self.sub
            .parse::<i64>()
            .map(UserId::from)
            .map_err(|_| ApiError::AuthenticationError)
    }
}

/// The authenticated principal a request acts on behalf of, as currently
/// stored in `users`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl AuthContext {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}
