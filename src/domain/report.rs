use rust_decimal::Decimal;
use serde::Serialize;
use time::Weekday;

use super::{
    fields::ReportFilter,
    model::{
        BucketRow, PeriodRow, RecentContribution, ReferredGroupRow, SummaryRow, TopContributor,
        WeekdayRow,
    },
    referral::ReferralReport,
};

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Summary {
    pub total: Decimal,
    pub average: Decimal,
    pub contributions: i64,
    pub largest: Option<Decimal>,
    pub smallest: Option<Decimal>,
}

impl From<SummaryRow> for Summary {
    fn from(row: SummaryRow) -> Self {
        Self {
            total: row.total,
            average: row.average.unwrap_or(Decimal::ZERO),
            contributions: row.contributions,
            largest: row.largest,
            smallest: row.smallest,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MonthlyTotal {
    /// `YYYY-MM`
    pub month: String,
    pub total: Decimal,
    pub contributions: i64,
    pub average: Decimal,
}

/// Keeps months with at least one contribution, ascending. Rows arrive one
/// per month from `group by`.
pub fn monthly_trend(rows: Vec<PeriodRow>) -> Vec<MonthlyTotal> {
    let mut months: Vec<MonthlyTotal> = rows
        .into_iter()
        .filter(|row| row.contributions > 0)
        .map(|row| MonthlyTotal {
            month: row.period,
            total: row.total,
            contributions: row.contributions,
            average: row.average,
        })
        .collect();
    months.sort_by(|a, b| a.month.cmp(&b.month));
    months
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct WeekdayTotal {
    pub weekday: String,
    pub total: Decimal,
    pub contributions: i64,
    pub average: Decimal,
}

fn weekday_from_dow(day_of_week: i32) -> Option<Weekday> {
    u8::try_from(day_of_week)
        .ok()
        .filter(|dow| *dow < 7)
        .map(|dow| Weekday::Sunday.nth_next(dow))
}

/// Orders weekday rows Sunday to Saturday regardless of how the rows arrived.
pub fn weekday_totals(rows: Vec<WeekdayRow>) -> Vec<WeekdayTotal> {
    let mut days: Vec<(Weekday, WeekdayRow)> = rows
        .into_iter()
        .filter_map(|row| weekday_from_dow(row.day_of_week).map(|day| (day, row)))
        .collect();
    days.sort_by_key(|(day, _)| day.number_days_from_sunday());

    days.into_iter()
        .map(|(day, row)| WeekdayTotal {
            weekday: day.to_string(),
            total: row.total,
            contributions: row.contributions,
            average: row.average,
        })
        .collect()
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SizeBucket {
    #[serde(rename = "<50")]
    UnderFifty,
    #[serde(rename = "50-99")]
    FiftyToNinetyNine,
    #[serde(rename = "100-249")]
    HundredToTwoFortyNine,
    #[serde(rename = "250-499")]
    TwoFiftyToFourNinetyNine,
    #[serde(rename = "500-999")]
    FiveHundredToNineNinetyNine,
    #[serde(rename = "1000+")]
    ThousandAndUp,
}

impl SizeBucket {
    pub const ALL: [SizeBucket; 6] = [
        SizeBucket::UnderFifty,
        SizeBucket::FiftyToNinetyNine,
        SizeBucket::HundredToTwoFortyNine,
        SizeBucket::TwoFiftyToFourNinetyNine,
        SizeBucket::FiveHundredToNineNinetyNine,
        SizeBucket::ThousandAndUp,
    ];

    pub fn lower_bound(&self) -> i64 {
        match self {
            SizeBucket::UnderFifty => 0,
            SizeBucket::FiftyToNinetyNine => 50,
            SizeBucket::HundredToTwoFortyNine => 100,
            SizeBucket::TwoFiftyToFourNinetyNine => 250,
            SizeBucket::FiveHundredToNineNinetyNine => 500,
            SizeBucket::ThousandAndUp => 1000,
        }
    }

    pub fn index(&self) -> i32 {
        *self as i32
    }

    pub fn from_index(index: i32) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// SQL `case` expression mapping `column` to a bucket index. Only the
    /// fixed bucket bounds are written into the statement.
    pub fn sql_case(column: &str) -> String {
        let mut case = String::from("case");
        for bucket in Self::ALL.iter().skip(1).rev() {
            case.push_str(&format!(
                " when {} >= {} then {}",
                column,
                bucket.lower_bound(),
                bucket.index()
            ));
        }
        case.push_str(&format!(" else {} end", SizeBucket::UnderFifty.index()));
        case
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct BucketTotal {
    pub bucket: SizeBucket,
    pub contributions: i64,
    pub total: Decimal,
}

/// All six buckets in lower-bound order, zero-filled where no rows fell in.
pub fn bucket_distribution(rows: Vec<BucketRow>) -> Vec<BucketTotal> {
    let mut buckets: Vec<BucketTotal> = SizeBucket::ALL
        .iter()
        .map(|bucket| BucketTotal {
            bucket: *bucket,
            contributions: 0,
            total: Decimal::ZERO,
        })
        .collect();

    for row in rows {
        match SizeBucket::from_index(row.bucket) {
            Some(bucket) => {
                let slot = &mut buckets[bucket.index() as usize];
                slot.contributions += row.contributions;
                slot.total += row.total;
            }
            None => tracing::warn!("ignoring unknown size bucket >>> {}", row.bucket),
        }
    }

    buckets
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GroupTotals {
    pub contributions: i64,
    pub total: Decimal,
    pub average: Decimal,
}

impl GroupTotals {
    fn empty() -> Self {
        Self {
            contributions: 0,
            total: Decimal::ZERO,
            average: Decimal::ZERO,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ReferredComparison {
    pub referred: GroupTotals,
    pub not_referred: GroupTotals,
}

impl From<Vec<ReferredGroupRow>> for ReferredComparison {
    fn from(rows: Vec<ReferredGroupRow>) -> Self {
        let mut comparison = Self {
            referred: GroupTotals::empty(),
            not_referred: GroupTotals::empty(),
        };
        for row in rows {
            let group = GroupTotals {
                contributions: row.contributions,
                total: row.total,
                average: row.average.unwrap_or(Decimal::ZERO),
            };
            if row.referred {
                comparison.referred = group;
            } else {
                comparison.not_referred = group;
            }
        }
        comparison
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Report {
    pub filter: ReportFilter,
    pub summary: Summary,
    pub monthly: Vec<MonthlyTotal>,
    pub weekdays: Vec<WeekdayTotal>,
    pub top_contributors: Vec<TopContributor>,
    pub buckets: Vec<BucketTotal>,
    pub recent: Vec<RecentContribution>,
    pub referrals: ReferralReport,
}
