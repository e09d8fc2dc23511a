//! Read-only dashboard and analytics figures. Nothing is cached: every call
//! recomputes from the tables inside one read transaction, so a report never
//! mixes rows from before and after a concurrent write.

use chrono::{Days, Local, NaiveDate};
use rusqlite::{params, Connection};

use crate::db::{self, Database, APPLICATION_COLUMNS};
use crate::error::Result;
use crate::models::{
    Analytics, Application, ApplicationStatus, CompanyCount, DailyCount, DashboardStats,
    StatusCount,
};

pub const RECENT_LIMIT: usize = 10;
pub const TOP_COMPANIES_LIMIT: usize = 10;
pub const WEEK_WINDOW_DAYS: u64 = 7;
pub const DAILY_WINDOW_DAYS: u64 = 30;

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn days_before(today: NaiveDate, days: u64) -> NaiveDate {
    today.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN)
}

impl Database {
    pub fn dashboard_stats(&self) -> Result<DashboardStats> {
        self.dashboard_stats_on(today())
    }

    pub fn dashboard_stats_on(&self, today: NaiveDate) -> Result<DashboardStats> {
        let tx = self.conn().unchecked_transaction()?;
        let stats = DashboardStats {
            total_apps: count_all(&tx)?,
            pending_apps: count_pending(&tx)?,
            status_counts: status_counts(&tx)?,
            recent_apps: recent_applications(&tx, RECENT_LIMIT)?,
            this_week_count: count_applied_since(&tx, days_before(today, WEEK_WINDOW_DAYS))?,
        };
        tx.commit()?;

        trace!(
            "dashboard: {} total, {} pending, {} this week",
            stats.total_apps,
            stats.pending_apps,
            stats.this_week_count
        );
        Ok(stats)
    }

    pub fn analytics(&self) -> Result<Analytics> {
        self.analytics_on(today())
    }

    pub fn analytics_on(&self, today: NaiveDate) -> Result<Analytics> {
        let tx = self.conn().unchecked_transaction()?;
        let analytics = Analytics {
            status_counts: status_counts(&tx)?,
            daily_series: daily_series(&tx, days_before(today, DAILY_WINDOW_DAYS), today)?,
            top_companies: top_companies(&tx, TOP_COMPANIES_LIMIT)?,
        };
        tx.commit()?;

        trace!(
            "analytics: {} active day(s), {} compan(ies)",
            analytics.daily_series.len(),
            analytics.top_companies.len()
        );
        Ok(analytics)
    }

    pub fn company_application_count(&self, company_id: i64) -> Result<i64> {
        db::count_company_applications(self.conn(), company_id)
    }
}

fn count_all(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM applications", [], |row| row.get(0))?)
}

fn count_pending(conn: &Connection) -> Result<i64> {
    let [first, second] = ApplicationStatus::PENDING;
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM applications WHERE status IN (?1, ?2)",
        params![first, second],
        |row| row.get(0),
    )?)
}

/// Only statuses that occur; absent statuses are not zero-filled.
fn status_counts(conn: &Connection) -> Result<Vec<StatusCount>> {
    let mut stmt = conn.prepare(
        "SELECT status, COUNT(*) FROM applications GROUP BY status ORDER BY status",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(StatusCount {
            status: row.get(0)?,
            count: row.get(1)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn recent_applications(conn: &Connection, limit: usize) -> Result<Vec<Application>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPLICATION_COLUMNS} FROM applications
         ORDER BY date_applied DESC, id DESC LIMIT ?1"
    ))?;
    let rows = stmt.query_map([limit as i64], db::row_to_application)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn count_applied_since(conn: &Connection, since: NaiveDate) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM applications WHERE date_applied >= ?1",
        params![since],
        |row| row.get(0),
    )?)
}

/// Sparse per-day counts in `[from, through]`, oldest first.
fn daily_series(conn: &Connection, from: NaiveDate, through: NaiveDate) -> Result<Vec<DailyCount>> {
    let mut stmt = conn.prepare(
        "SELECT date_applied, COUNT(*) FROM applications
         WHERE date_applied >= ?1 AND date_applied <= ?2
         GROUP BY date_applied ORDER BY date_applied",
    )?;
    let rows = stmt.query_map(params![from, through], |row| {
        Ok(DailyCount {
            date: row.get(0)?,
            count: row.get(1)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Grouped by the denormalized `company_name`, so renamed companies keep
/// their old name here for applications written before the rename.
fn top_companies(conn: &Connection, limit: usize) -> Result<Vec<CompanyCount>> {
    let mut stmt = conn.prepare(
        "SELECT company_name, COUNT(*) AS n FROM applications
         GROUP BY company_name ORDER BY n DESC, company_name LIMIT ?1",
    )?;
    let rows = stmt.query_map([limit as i64], |row| {
        Ok(CompanyCount {
            company: row.get(0)?,
            count: row.get(1)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
