//! Background jobs: scheduled report delivery and periodic price sync.
//!
//! A single loop ticks once a minute. The decision of what fires is kept in
//! a pure function over the local clock so it can be tested without waiting.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use teloxide::{Bot, prelude::*, types::ChatId};
use tokio::time::{Duration, interval};
use tracing::{error, info};

use crate::{ConfigParameters, ui};

const TICK: Duration = Duration::from_secs(60);
const PRICE_SYNC_EVERY: chrono::Duration = chrono::Duration::minutes(30);

/// Which jobs a tick should run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Firing {
    pub daily: bool,
    pub weekly: bool,
    pub price_sync: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct ScheduleState {
    pub last_daily: Option<NaiveDate>,
    pub last_weekly: Option<NaiveDate>,
    pub last_price_sync: Option<DateTime<Utc>>,
}

/// Decides what is due. Reports fire at most once per local day, at or after
/// `report_time`; the weekly report additionally only fires on Mondays.
pub(crate) fn due(
    state: &ScheduleState,
    now_local: chrono::DateTime<chrono_tz::Tz>,
    now_utc: DateTime<Utc>,
    report_time: NaiveTime,
) -> Firing {
    let today = now_local.date_naive();
    let at_or_past = now_local.time() >= report_time;

    Firing {
        daily: at_or_past && state.last_daily != Some(today),
        weekly: at_or_past
            && now_local.weekday() == Weekday::Mon
            && state.last_weekly != Some(today),
        price_sync: state
            .last_price_sync
            .is_none_or(|last| now_utc - last >= PRICE_SYNC_EVERY),
    }
}

pub(crate) async fn run(bot: Bot, cfg: ConfigParameters) {
    let mut state = ScheduleState::default();
    let mut tick = interval(TICK);
    info!(
        report_time = %cfg.report_time,
        reports_enabled = cfg.reports_enabled,
        "scheduler started"
    );

    loop {
        tick.tick().await;
        let now_utc = Utc::now();
        let now_local = now_utc.with_timezone(&cfg.timezone);
        let firing = due(&state, now_local, now_utc, cfg.report_time);

        if firing.price_sync {
            state.last_price_sync = Some(now_utc);
            sync_prices(&cfg).await;
        }
        if firing.daily {
            state.last_daily = Some(now_local.date_naive());
            if cfg.reports_enabled {
                send_daily_reports(&bot, &cfg, now_local.date_naive()).await;
            }
        }
        if firing.weekly {
            state.last_weekly = Some(now_local.date_naive());
            if cfg.reports_enabled {
                send_weekly_reports(&bot, &cfg, now_local.date_naive()).await;
            }
        }
    }
}

async fn sync_prices(cfg: &ConfigParameters) {
    let users = match cfg.users.active_users().await {
        Ok(users) => users,
        Err(err) => {
            error!(%err, "price sync: listing users failed");
            return;
        }
    };
    for user in users {
        match cfg.prices.sync_user(&cfg.assets, user.id).await {
            Ok(0) => {}
            Ok(updated) => info!(user_id = user.id, updated, "prices refreshed"),
            Err(err) => error!(user_id = user.id, %err, "price sync failed"),
        }
    }
}

async fn send_daily_reports(bot: &Bot, cfg: &ConfigParameters, date: NaiveDate) {
    let users = match cfg.users.active_users().await {
        Ok(users) => users,
        Err(err) => {
            error!(%err, "daily report: listing users failed");
            return;
        }
    };
    for user in users {
        let report = match cfg.reports.daily(user.id, date, cfg.timezone).await {
            Ok(report) => report,
            Err(err) => {
                error!(user_id = user.id, %err, "daily report failed");
                continue;
            }
        };
        if report.transaction_count == 0 {
            continue;
        }
        let text = ui::render_daily_report(&report);
        if let Err(err) = bot.send_message(ChatId(user.telegram_id), text).await {
            error!(user_id = user.id, %err, "daily report delivery failed");
        }
    }
}

async fn send_weekly_reports(bot: &Bot, cfg: &ConfigParameters, date: NaiveDate) {
    let users = match cfg.users.active_users().await {
        Ok(users) => users,
        Err(err) => {
            error!(%err, "weekly report: listing users failed");
            return;
        }
    };
    for user in users {
        let report = match cfg.reports.weekly(user.id, date, cfg.timezone).await {
            Ok(report) => report,
            Err(err) => {
                error!(user_id = user.id, %err, "weekly report failed");
                continue;
            }
        };
        let text = ui::render_weekly_report(&report);
        if let Err(err) = bot.send_message(ChatId(user.telegram_id), text).await {
            error!(user_id = user.id, %err, "weekly report delivery failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Asia::Jakarta;

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> chrono::DateTime<chrono_tz::Tz> {
        Jakarta.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn report_time() -> NaiveTime {
        NaiveTime::from_hms_opt(8, 0, 0).unwrap()
    }

    #[test]
    fn daily_fires_once_after_report_time() {
        let mut state = ScheduleState {
            last_price_sync: Some(Utc::now()),
            ..Default::default()
        };

        // 2025-06-10 is a Tuesday.
        let before = local(2025, 6, 10, 7, 59);
        assert!(!due(&state, before, before.to_utc(), report_time()).daily);

        let after = local(2025, 6, 10, 8, 0);
        let firing = due(&state, after, after.to_utc(), report_time());
        assert!(firing.daily);
        assert!(!firing.weekly);

        state.last_daily = Some(after.date_naive());
        let later = local(2025, 6, 10, 12, 0);
        assert!(!due(&state, later, later.to_utc(), report_time()).daily);

        let next_day = local(2025, 6, 11, 8, 5);
        assert!(due(&state, next_day, next_day.to_utc(), report_time()).daily);
    }

    #[test]
    fn weekly_fires_only_on_monday() {
        let state = ScheduleState {
            last_price_sync: Some(Utc::now()),
            ..Default::default()
        };

        // 2025-06-09 is a Monday.
        let monday = local(2025, 6, 9, 8, 30);
        assert!(due(&state, monday, monday.to_utc(), report_time()).weekly);

        let tuesday = local(2025, 6, 10, 8, 30);
        assert!(!due(&state, tuesday, tuesday.to_utc(), report_time()).weekly);
    }

    #[test]
    fn price_sync_respects_interval() {
        let now = local(2025, 6, 10, 9, 0);
        let mut state = ScheduleState {
            last_daily: Some(now.date_naive()),
            ..Default::default()
        };
        assert!(due(&state, now, now.to_utc(), report_time()).price_sync);

        state.last_price_sync = Some(now.to_utc() - chrono::Duration::minutes(10));
        assert!(!due(&state, now, now.to_utc(), report_time()).price_sync);

        state.last_price_sync = Some(now.to_utc() - chrono::Duration::minutes(31));
        assert!(due(&state, now, now.to_utc(), report_time()).price_sync);
    }
}
