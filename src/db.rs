use rusqlite::{params, Connection, OptionalExtension, ToSql, Transaction, TransactionBehavior};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, TrackerError};
use crate::models::{Application, ApplicationFilter, Company};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS companies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    industry TEXT,
    location TEXT,
    website TEXT,
    notes TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS applications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    position TEXT NOT NULL,
    company_id INTEGER NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    company_name TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'Applied' CHECK (status IN (
        'Applied', 'Interview Scheduled', 'Interviewed', 'Offer', 'Rejected', 'Withdrawn'
    )),
    job_link TEXT,
    salary_range TEXT,
    date_applied TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    notes TEXT,
    priority TEXT NOT NULL DEFAULT 'Medium' CHECK (priority IN ('High', 'Medium', 'Low'))
);

CREATE INDEX IF NOT EXISTS idx_applications_company ON applications(company_id);
CREATE INDEX IF NOT EXISTS idx_applications_status ON applications(status);
CREATE INDEX IF NOT EXISTS idx_applications_date ON applications(date_applied);
CREATE INDEX IF NOT EXISTS idx_applications_company_name ON applications(company_name);
"#;

pub(crate) const COMPANY_COLUMNS: &str =
    "id, name, industry, location, website, notes, created_at";

pub(crate) const APPLICATION_COLUMNS: &str = "id, position, company_id, company_name, status, \
     job_link, salary_range, date_applied, updated_at, notes, priority";

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreCheck {
    pub path: PathBuf,
    pub companies: i64,
    pub applications: i64,
}

impl Database {
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::configure(&conn)?;
        trace!("opened database at {}", path.display());
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    fn configure(conn: &Connection) -> Result<()> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(())
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// `BEGIN IMMEDIATE`: the write lock is taken before any read, so a
    /// competing writer is waited on through the busy timeout.
    pub(crate) fn write_transaction(&self) -> Result<Transaction<'_>> {
        Ok(Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?)
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE type='table' AND name IN ('companies', 'applications')",
            [],
            |row| row.get(0),
        )?;
        if tables < 2 {
            return Err(TrackerError::NotInitialized);
        }
        Ok(())
    }

    /// Connectivity self-test: a trivial query plus row counts.
    pub fn check(&self) -> Result<StoreCheck> {
        self.conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        let companies = self
            .conn
            .query_row("SELECT COUNT(*) FROM companies", [], |row| row.get(0))?;
        let applications = self
            .conn
            .query_row("SELECT COUNT(*) FROM applications", [], |row| row.get(0))?;
        Ok(StoreCheck {
            path: self.path.clone(),
            companies,
            applications,
        })
    }

    // --- Company reads ---

    pub fn get_company(&self, id: i64) -> Result<Company> {
        fetch_company(&self.conn, id)
    }

    pub fn get_company_by_name(&self, name: &str) -> Result<Option<Company>> {
        find_company_by_name(&self.conn, name)
    }

    pub fn list_companies(&self) -> Result<Vec<Company>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMPANY_COLUMNS} FROM companies ORDER BY name"
        ))?;
        let rows = stmt.query_map([], row_to_company)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // --- Application reads ---

    pub fn get_application(&self, id: i64) -> Result<Application> {
        fetch_application(&self.conn, id)
    }

    /// Applications matching `filter`, newest date applied first.
    pub fn list_applications(&self, filter: &ApplicationFilter) -> Result<Vec<Application>> {
        let mut sql = format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE 1=1");
        let mut params: Vec<&dyn ToSql> = vec![];

        if let Some(status) = &filter.status {
            params.push(status);
            sql.push_str(&format!(" AND status = ?{}", params.len()));
        }

        if let Some(company) = &filter.company_contains {
            params.push(company);
            sql.push_str(&format!(
                " AND instr(LOWER(company_name), LOWER(?{})) > 0",
                params.len()
            ));
        }

        if let Some(company_id) = &filter.company_id {
            params.push(company_id);
            sql.push_str(&format!(" AND company_id = ?{}", params.len()));
        }

        sql.push_str(" ORDER BY date_applied DESC, id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params.as_slice(), row_to_application)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

// --- Statement helpers shared with the lifecycle and stats layers. They take a
// plain `Connection` so they run equally inside a `Transaction`. ---

pub(crate) fn fetch_company(conn: &Connection, id: i64) -> Result<Company> {
    conn.query_row(
        &format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE id = ?1"),
        [id],
        row_to_company,
    )
    .optional()?
    .ok_or_else(|| TrackerError::company_not_found(id))
}

pub(crate) fn find_company_by_name(conn: &Connection, name: &str) -> Result<Option<Company>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE name = ?1"),
            [name],
            row_to_company,
        )
        .optional()?)
}

pub(crate) fn fetch_application(conn: &Connection, id: i64) -> Result<Application> {
    conn.query_row(
        &format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = ?1"),
        [id],
        row_to_application,
    )
    .optional()?
    .ok_or_else(|| TrackerError::application_not_found(id))
}

pub(crate) fn count_company_applications(conn: &Connection, company_id: i64) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM applications WHERE company_id = ?1",
        params![company_id],
        |row| row.get(0),
    )?)
}

pub(crate) fn row_to_company(row: &rusqlite::Row) -> rusqlite::Result<Company> {
    Ok(Company {
        id: row.get(0)?,
        name: row.get(1)?,
        industry: row.get(2)?,
        location: row.get(3)?,
        website: row.get(4)?,
        notes: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub(crate) fn row_to_application(row: &rusqlite::Row) -> rusqlite::Result<Application> {
    Ok(Application {
        id: row.get(0)?,
        position: row.get(1)?,
        company_id: row.get(2)?,
        company_name: row.get(3)?,
        status: row.get(4)?,
        job_link: row.get(5)?,
        salary_range: row.get(6)?,
        date_applied: row.get(7)?,
        updated_at: row.get(8)?,
        notes: row.get(9)?,
        priority: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApplicationStatus, NewApplication};
    use chrono::NaiveDate;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        db
    }

    fn app(position: &str, company: &str, status: &str, date: &str) -> NewApplication {
        NewApplication {
            position: Some(position.to_string()),
            company_name: Some(company.to_string()),
            status: Some(status.to_string()),
            date_applied: Some(date.parse().unwrap()),
            ..Default::default()
        }
    }

    #[test]
    fn test_init_is_idempotent() {
        let db = test_db();
        db.init().unwrap();
        db.ensure_initialized().unwrap();
    }

    #[test]
    fn test_ensure_initialized_fails_on_empty_database() {
        let db = Database::open_in_memory().unwrap();
        let err = db.ensure_initialized().unwrap_err();
        assert!(err.to_string().contains("jobtrack init"));
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let db = test_db();
        let enabled: i64 = db
            .conn()
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn test_check_constraint_rejects_unknown_status() {
        let db = test_db();
        let company = db.add_company(&crate::models::NewCompany::named("Acme")).unwrap();
        let result = db.conn().execute(
            "INSERT INTO applications (position, company_id, company_name, status, date_applied, updated_at)
             VALUES ('Engineer', ?1, 'Acme', 'Ghosted', '2024-01-01', '2024-01-01 00:00:00+00:00')",
            [company.id],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_check_constraint_rejects_unknown_priority() {
        let db = test_db();
        let company = db.add_company(&crate::models::NewCompany::named("Acme")).unwrap();
        let result = db.conn().execute(
            "INSERT INTO applications (position, company_id, company_name, status, date_applied, updated_at, priority)
             VALUES ('Engineer', ?1, 'Acme', 'Applied', '2024-01-01', '2024-01-01 00:00:00+00:00', 'Urgent')",
            [company.id],
        );
        assert!(result.is_err());
        assert!(db.list_applications(&ApplicationFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn test_get_missing_records_is_not_found() {
        let db = test_db();
        assert!(matches!(
            db.get_application(42),
            Err(TrackerError::NotFound { entity: "Application", id: 42 })
        ));
        assert!(matches!(
            db.get_company(7),
            Err(TrackerError::NotFound { entity: "Company", id: 7 })
        ));
    }

    #[test]
    fn test_list_applications_orders_newest_first() {
        let db = test_db();
        db.add_application(&app("A", "Acme", "Applied", "2024-01-01")).unwrap();
        db.add_application(&app("B", "Acme", "Applied", "2024-03-01")).unwrap();
        db.add_application(&app("C", "Globex", "Offer", "2024-02-01")).unwrap();

        let positions: Vec<String> = db
            .list_applications(&ApplicationFilter::default())
            .unwrap()
            .into_iter()
            .map(|a| a.position)
            .collect();
        assert_eq!(positions, vec!["B", "C", "A"]);
    }

    #[test]
    fn test_list_applications_filters() {
        let db = test_db();
        db.add_application(&app("A", "Acme Corp", "Applied", "2024-01-01")).unwrap();
        db.add_application(&app("B", "Acme Labs", "Offer", "2024-01-02")).unwrap();
        db.add_application(&app("C", "Globex", "Offer", "2024-01-03")).unwrap();

        let offers = db
            .list_applications(&ApplicationFilter {
                status: Some(ApplicationStatus::Offer),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(offers.len(), 2);

        let acme = db
            .list_applications(&ApplicationFilter {
                company_contains: Some("acme".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(acme.len(), 2);

        let acme_offers = db
            .list_applications(&ApplicationFilter {
                status: Some(ApplicationStatus::Offer),
                company_contains: Some("Acme".to_string()),
                company_id: None,
            })
            .unwrap();
        assert_eq!(acme_offers.len(), 1);
        assert_eq!(acme_offers[0].position, "B");

        let globex = db.get_company_by_name("Globex").unwrap().unwrap();
        let by_id = db
            .list_applications(&ApplicationFilter {
                company_id: Some(globex.id),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0].position, "C");
    }

    #[test]
    fn test_company_filter_treats_wildcards_literally() {
        let db = test_db();
        db.add_application(&app("A", "Acme", "Applied", "2024-01-01")).unwrap();
        let matches = db
            .list_applications(&ApplicationFilter {
                company_contains: Some("%".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_list_companies_alphabetical() {
        let db = test_db();
        for name in ["Zeta", "Acme", "Mango"] {
            db.add_company(&crate::models::NewCompany::named(name)).unwrap();
        }
        let names: Vec<String> = db.list_companies().unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Acme", "Mango", "Zeta"]);
    }

    #[test]
    fn test_check_reports_counts() {
        let db = test_db();
        db.add_application(&app("A", "Acme", "Applied", "2024-01-01")).unwrap();
        db.add_application(&app("B", "Globex", "Applied", "2024-01-01")).unwrap();
        let check = db.check().unwrap();
        assert_eq!(check.companies, 2);
        assert_eq!(check.applications, 2);
    }

    #[test]
    fn test_persists_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("jobtrack.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.init().unwrap();
            db.add_application(&app("Engineer", "Acme", "Applied", "2024-01-01")).unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        db.ensure_initialized().unwrap();
        let apps = db.list_applications(&ApplicationFilter::default()).unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].company_name, "Acme");
        assert_eq!(apps[0].date_applied, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_add_application_waits_for_concurrent_writer() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("jobtrack.db");
        let db = Database::open_at(&path).unwrap();
        db.init().unwrap();

        let other = Connection::open(&path).unwrap();
        other
            .execute_batch(
                "BEGIN IMMEDIATE;
                 INSERT INTO companies (name, created_at) VALUES ('Acme', '2024-01-01 00:00:00+00:00');",
            )
            .unwrap();
        let writer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(300));
            other.execute_batch("COMMIT;").unwrap();
        });

        let created = db
            .add_application(&app("Engineer", "Acme", "Applied", "2024-01-01"))
            .unwrap();
        writer.join().unwrap();

        let companies = db.list_companies().unwrap();
        assert_eq!(companies.len(), 1);
        assert_eq!(created.company_id, companies[0].id);
        assert_eq!(db.list_applications(&ApplicationFilter::default()).unwrap().len(), 1);
    }
}
