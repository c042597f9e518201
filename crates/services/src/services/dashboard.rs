use chrono::{Datelike, NaiveDate};
use db::{
    DBService,
    models::dashboard::{DashboardStats, DashboardWindow},
};
use utils::dates::{add_days, format_date, today};

/// How far ahead the dashboard looks for pay terms coming due.
pub const UPCOMING_DAYS: i64 = 30;

pub fn window_for(today: NaiveDate) -> DashboardWindow {
    let month_start = today.with_day(1).unwrap_or(today);
    DashboardWindow {
        today: format_date(today),
        month_start: format_date(month_start),
        horizon_end: format_date(add_days(today, UPCOMING_DAYS)),
    }
}

pub async fn load(db: &DBService) -> Result<DashboardStats, sqlx::Error> {
    DashboardStats::load(&db.pool, &window_for(today())).await
}
