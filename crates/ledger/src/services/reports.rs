//! Periodic summaries over the transaction history.
//!
//! All windows are computed in the user's local timezone and translated to
//! UTC bounds before querying, so a transaction booked at 23:30 Jakarta time
//! lands in the right local day.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use sea_orm::{
    DatabaseConnection, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, prelude::*,
};

use crate::{Money, ResultLedger, TransactionKind, categories, transactions, wallets};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub income: Money,
    pub expense: Money,
    pub transaction_count: i64,
}

impl DailyReport {
    #[must_use]
    pub fn net(&self) -> Money {
        self.income - self.expense
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct WeeklyReport {
    /// Monday of the reported week.
    pub week_start: NaiveDate,
    pub income: Money,
    pub expense: Money,
    pub previous_expense: Money,
    /// Week-over-week spending change; `None` when last week had none.
    pub expense_change_percent: Option<f64>,
}

impl WeeklyReport {
    #[must_use]
    pub fn net(&self) -> Money {
        self.income - self.expense
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MonthlyReport {
    /// First day of the reported month.
    pub month_start: NaiveDate,
    pub income: Money,
    pub expense: Money,
    pub previous_expense: Money,
    /// Month-over-month spending change; `None` when last month had none.
    pub expense_change_percent: Option<f64>,
    /// Top spending categories, largest first.
    pub top_categories: Vec<CategorySpend>,
}

impl MonthlyReport {
    #[must_use]
    pub fn net(&self) -> Money {
        self.income - self.expense
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategorySpend {
    pub name: String,
    pub icon: Option<String>,
    pub total: Money,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrendPoint {
    pub month_start: NaiveDate,
    pub expense: Money,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WalletBreakdown {
    pub wallet: wallets::Model,
    pub share_percent: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecentTransaction {
    pub transaction: transactions::Model,
    pub category_name: Option<String>,
}

/// Categories shown in the monthly breakdown.
const TOP_CATEGORY_LIMIT: usize = 10;

#[derive(Clone)]
pub struct ReportService {
    db: DatabaseConnection,
}

impl ReportService {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn daily(&self, user_id: i32, date: NaiveDate, tz: Tz) -> ResultLedger<DailyReport> {
        let start = local_day_start(date, tz);
        let end = local_day_start(date + Days::new(1), tz);
        let income = self
            .sum_between(user_id, TransactionKind::Income, start, end)
            .await?;
        let expense = self
            .sum_between(user_id, TransactionKind::Expense, start, end)
            .await?;
        let transaction_count = self.count_between(user_id, start, end).await?;
        Ok(DailyReport {
            date,
            income,
            expense,
            transaction_count,
        })
    }

    /// Week runs Monday through Sunday; `date` may be any day inside it.
    pub async fn weekly(
        &self,
        user_id: i32,
        date: NaiveDate,
        tz: Tz,
    ) -> ResultLedger<WeeklyReport> {
        let week_start = date.week(Weekday::Mon).first_day();
        let start = local_day_start(week_start, tz);
        let end = local_day_start(week_start + Days::new(7), tz);
        let prev_start = local_day_start(week_start - Days::new(7), tz);

        let income = self
            .sum_between(user_id, TransactionKind::Income, start, end)
            .await?;
        let expense = self
            .sum_between(user_id, TransactionKind::Expense, start, end)
            .await?;
        let previous_expense = self
            .sum_between(user_id, TransactionKind::Expense, prev_start, start)
            .await?;

        Ok(WeeklyReport {
            week_start,
            income,
            expense,
            previous_expense,
            expense_change_percent: change_percent(previous_expense, expense),
        })
    }

    pub async fn monthly(
        &self,
        user_id: i32,
        date: NaiveDate,
        tz: Tz,
    ) -> ResultLedger<MonthlyReport> {
        let month_start = first_of_month(date);
        let start = local_day_start(month_start, tz);
        let end = local_day_start(month_start + Months::new(1), tz);
        let prev_start = local_day_start(month_start - Months::new(1), tz);

        let income = self
            .sum_between(user_id, TransactionKind::Income, start, end)
            .await?;
        let expense = self
            .sum_between(user_id, TransactionKind::Expense, start, end)
            .await?;
        let previous_expense = self
            .sum_between(user_id, TransactionKind::Expense, prev_start, start)
            .await?;
        let top_categories = self.category_breakdown(user_id, start, end).await?;

        Ok(MonthlyReport {
            month_start,
            income,
            expense,
            previous_expense,
            expense_change_percent: change_percent(previous_expense, expense),
            top_categories,
        })
    }

    /// Monthly spending totals for the last `months` months, oldest first.
    pub async fn spending_trend(
        &self,
        user_id: i32,
        date: NaiveDate,
        months: u32,
        tz: Tz,
    ) -> ResultLedger<Vec<TrendPoint>> {
        let mut points = Vec::with_capacity(months as usize);
        let current = first_of_month(date);
        for back in (0..months).rev() {
            let month_start = current - Months::new(back);
            let start = local_day_start(month_start, tz);
            let end = local_day_start(month_start + Months::new(1), tz);
            let expense = self
                .sum_between(user_id, TransactionKind::Expense, start, end)
                .await?;
            points.push(TrendPoint {
                month_start,
                expense,
            });
        }
        Ok(points)
    }

    /// Active wallets with their share of the total balance. Negative and
    /// zero totals report a zero share for every wallet.
    pub async fn wallet_breakdown(&self, user_id: i32) -> ResultLedger<Vec<WalletBreakdown>> {
        let rows = wallets::Entity::find()
            .filter(wallets::Column::UserId.eq(user_id))
            .filter(wallets::Column::IsActive.eq(true))
            .order_by_desc(wallets::Column::Balance)
            .all(&self.db)
            .await?;
        let total: i64 = rows.iter().map(|w| w.balance).sum();
        Ok(rows
            .into_iter()
            .map(|wallet| {
                let share_percent = if total > 0 && wallet.balance > 0 {
                    wallet.balance * 100 / total
                } else {
                    0
                };
                WalletBreakdown {
                    wallet,
                    share_percent,
                }
            })
            .collect())
    }

    pub async fn recent_with_categories(
        &self,
        user_id: i32,
        limit: u64,
    ) -> ResultLedger<Vec<RecentTransaction>> {
        let rows = transactions::Entity::find()
            .filter(transactions::Column::UserId.eq(user_id))
            .order_by_desc(transactions::Column::OccurredAt)
            .order_by_desc(transactions::Column::Id)
            .limit(limit)
            .find_also_related(categories::Entity)
            .all(&self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(transaction, category)| RecentTransaction {
                transaction,
                category_name: category.map(|c| c.name),
            })
            .collect())
    }

    async fn sum_between(
        &self,
        user_id: i32,
        kind: TransactionKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ResultLedger<Money> {
        let total: Option<Option<i64>> = transactions::Entity::find()
            .select_only()
            .column_as(transactions::Column::Amount.sum(), "total")
            .filter(transactions::Column::UserId.eq(user_id))
            .filter(transactions::Column::Kind.eq(kind.as_str()))
            .filter(transactions::Column::OccurredAt.gte(start))
            .filter(transactions::Column::OccurredAt.lt(end))
            .into_tuple()
            .one(&self.db)
            .await?;
        Ok(Money::new(total.flatten().unwrap_or(0)))
    }

    async fn count_between(
        &self,
        user_id: i32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ResultLedger<i64> {
        let count = transactions::Entity::find()
            .filter(transactions::Column::UserId.eq(user_id))
            .filter(transactions::Column::OccurredAt.gte(start))
            .filter(transactions::Column::OccurredAt.lt(end))
            .count(&self.db)
            .await?;
        Ok(count as i64)
    }

    async fn category_breakdown(
        &self,
        user_id: i32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ResultLedger<Vec<CategorySpend>> {
        let rows: Vec<(Option<i32>, Option<i64>)> = transactions::Entity::find()
            .select_only()
            .column(transactions::Column::CategoryId)
            .column_as(transactions::Column::Amount.sum(), "total")
            .filter(transactions::Column::UserId.eq(user_id))
            .filter(transactions::Column::Kind.eq(TransactionKind::Expense.as_str()))
            .filter(transactions::Column::OccurredAt.gte(start))
            .filter(transactions::Column::OccurredAt.lt(end))
            .group_by(transactions::Column::CategoryId)
            .into_tuple()
            .all(&self.db)
            .await?;

        let mut spends = Vec::with_capacity(rows.len());
        for (category_id, total) in rows {
            let total = Money::new(total.unwrap_or(0));
            if total.is_zero() {
                continue;
            }
            let (name, icon) = match category_id {
                Some(id) => match categories::Entity::find_by_id(id).one(&self.db).await? {
                    Some(category) => (category.name, category.icon),
                    None => ("Lainnya".to_string(), None),
                },
                None => ("Lainnya".to_string(), None),
            };
            spends.push(CategorySpend { name, icon, total });
        }
        spends.sort_by(|a, b| b.total.cmp(&a.total));
        spends.truncate(TOP_CATEGORY_LIMIT);
        Ok(spends)
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Local midnight translated to UTC. Ambiguous or skipped local times fall
/// back to reading the naive timestamp as UTC.
fn local_day_start(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .map_or_else(|| Utc.from_utc_datetime(&naive), |d| d.with_timezone(&Utc))
}

fn change_percent(previous: Money, current: Money) -> Option<f64> {
    if !previous.is_positive() {
        return None;
    }
    Some((current.minor() - previous.minor()) as f64 / previous.minor() as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_percent_needs_a_baseline() {
        assert_eq!(change_percent(Money::ZERO, Money::new(5000)), None);
        let up = change_percent(Money::new(100), Money::new(150));
        assert_eq!(up, Some(50.0));
        let down = change_percent(Money::new(200), Money::new(100));
        assert_eq!(down, Some(-50.0));
    }

    #[test]
    fn jakarta_midnight_is_previous_day_utc() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let start = local_day_start(date, chrono_tz::Asia::Jakarta);
        assert_eq!(start.to_rfc3339(), "2025-03-09T17:00:00+00:00");
    }
}
