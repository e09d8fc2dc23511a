//! Write-side rules: validation at every write boundary, implicit company
//! creation, cascade deletes and the denormalized `company_name` copy.
//!
//! Every operation here runs in its own transaction. Returning early with an
//! error drops the uncommitted transaction, which rolls it back.

use chrono::{NaiveDate, Utc};
use regex::Regex;
use rusqlite::{params, Connection, ErrorCode};
use std::sync::LazyLock;

use crate::db::{self, Database};
use crate::error::{Result, TrackerError};
use crate::models::{
    Application, ApplicationStatus, Company, CompanyDeletion, NewApplication, NewCompany, Priority,
};

pub const MAX_NAME_LEN: usize = 120;
pub const MAX_SALARY_LEN: usize = 100;
pub const MAX_DETAIL_LEN: usize = 100;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https?://(?:localhost(?::\d+)?|[^\s/?#]+\.[^\s/?#]+)(?:[/?#]\S*)?$")
        .expect("static URL pattern")
});

/// Application fields after validation, ready to write.
#[derive(Debug, Clone)]
struct ValidApplication {
    position: String,
    company_name: String,
    status: ApplicationStatus,
    job_link: Option<String>,
    salary_range: Option<String>,
    date_applied: NaiveDate,
    priority: Priority,
    notes: Option<String>,
}

#[derive(Debug, Clone)]
struct ValidCompany {
    name: String,
    industry: Option<String>,
    location: Option<String>,
    website: Option<String>,
    notes: Option<String>,
}

/// Stored as given; whitespace only counts as missing.
fn required(value: Option<&str>, field: &str, max: usize) -> Result<String> {
    let value = value.unwrap_or_default();
    if value.trim().is_empty() {
        return Err(TrackerError::validation(format!("{} is required", field)));
    }
    if value.chars().count() > max {
        return Err(TrackerError::validation(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(value.to_string())
}

fn optional(value: Option<&str>, field: &str, max: Option<usize>) -> Result<Option<String>> {
    let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };
    if let Some(max) = max {
        if value.chars().count() > max {
            return Err(TrackerError::validation(format!(
                "{} must be at most {} characters",
                field, max
            )));
        }
    }
    Ok(Some(value.to_string()))
}

fn optional_url(value: Option<&str>, field: &str) -> Result<Option<String>> {
    let url = optional(value, field, None)?;
    if let Some(url) = &url {
        if !URL_RE.is_match(url) {
            return Err(TrackerError::validation(format!(
                "{} must be an http(s) URL, got '{}'",
                field, url
            )));
        }
    }
    Ok(url)
}

fn validate_application(fields: &NewApplication) -> Result<ValidApplication> {
    let position = required(fields.position.as_deref(), "position", MAX_NAME_LEN)?;
    let company_name = required(fields.company_name.as_deref(), "company name", MAX_NAME_LEN)?;
    let status = fields
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| TrackerError::validation("status is required"))?
        .parse::<ApplicationStatus>()?;
    let date_applied = fields
        .date_applied
        .ok_or_else(|| TrackerError::validation("date applied is required"))?;
    let priority = match fields.priority.as_deref() {
        Some(p) if !p.trim().is_empty() => p.parse()?,
        _ => Priority::default(),
    };

    Ok(ValidApplication {
        position,
        company_name,
        status,
        job_link: optional_url(fields.job_link.as_deref(), "job link")?,
        salary_range: optional(fields.salary_range.as_deref(), "salary range", Some(MAX_SALARY_LEN))?,
        date_applied,
        priority,
        notes: optional(fields.notes.as_deref(), "notes", None)?,
    })
}

fn validate_company(fields: &NewCompany) -> Result<ValidCompany> {
    Ok(ValidCompany {
        name: required(fields.name.as_deref(), "company name", MAX_NAME_LEN)?,
        industry: optional(fields.industry.as_deref(), "industry", Some(MAX_DETAIL_LEN))?,
        location: optional(fields.location.as_deref(), "location", Some(MAX_DETAIL_LEN))?,
        website: optional_url(fields.website.as_deref(), "website")?,
        notes: optional(fields.notes.as_deref(), "notes", None)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn name_conflict(name: &str) -> TrackerError {
    TrackerError::Conflict(format!("company '{}' already exists", name))
}

fn insert_company(conn: &Connection, company: &ValidCompany) -> Result<i64> {
    conn.execute(
        "INSERT INTO companies (name, industry, location, website, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            company.name,
            company.industry,
            company.location,
            company.website,
            company.notes,
            Utc::now()
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            name_conflict(&company.name)
        } else {
            e.into()
        }
    })?;
    Ok(conn.last_insert_rowid())
}

impl Database {
    // --- Application operations ---

    pub fn add_application(&self, fields: &NewApplication) -> Result<Application> {
        let app = validate_application(fields)?;
        let tx = self.write_transaction()?;

        let company = match db::find_company_by_name(&tx, &app.company_name)? {
            Some(company) => company,
            None => {
                let company = ValidCompany {
                    name: app.company_name.clone(),
                    industry: None,
                    location: None,
                    website: None,
                    notes: None,
                };
                let id = insert_company(&tx, &company)?;
                trace!("created company #{} '{}' implicitly", id, company.name);
                db::fetch_company(&tx, id)?
            }
        };

        tx.execute(
            "INSERT INTO applications (position, company_id, company_name, status, job_link,
                 salary_range, date_applied, updated_at, notes, priority)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                app.position,
                company.id,
                company.name,
                app.status,
                app.job_link,
                app.salary_range,
                app.date_applied,
                Utc::now(),
                app.notes,
                app.priority
            ],
        )?;
        let id = tx.last_insert_rowid();
        let created = db::fetch_application(&tx, id)?;
        tx.commit()?;

        trace!(
            "added application #{} '{}' at '{}' ({})",
            created.id,
            created.position,
            created.company_name,
            created.status
        );
        Ok(created)
    }

    /// Overwrites every mutable field. `company_id` stays bound to the company
    /// the application was created under; only the `company_name` text changes.
    pub fn edit_application(&self, id: i64, fields: &NewApplication) -> Result<Application> {
        let tx = self.write_transaction()?;
        db::fetch_application(&tx, id)?;
        let app = validate_application(fields)?;

        tx.execute(
            "UPDATE applications
             SET position = ?1, company_name = ?2, status = ?3, job_link = ?4, salary_range = ?5,
                 date_applied = ?6, priority = ?7, notes = ?8, updated_at = ?9
             WHERE id = ?10",
            params![
                app.position,
                app.company_name,
                app.status,
                app.job_link,
                app.salary_range,
                app.date_applied,
                app.priority,
                app.notes,
                Utc::now(),
                id
            ],
        )?;
        let updated = db::fetch_application(&tx, id)?;
        tx.commit()?;

        trace!("edited application #{}", id);
        Ok(updated)
    }

    pub fn delete_application(&self, id: i64) -> Result<()> {
        let removed = self
            .conn()
            .execute("DELETE FROM applications WHERE id = ?1", [id])?;
        if removed == 0 {
            return Err(TrackerError::application_not_found(id));
        }
        trace!("deleted application #{}", id);
        Ok(())
    }

    pub fn update_status(&self, id: i64, status: &str) -> Result<Application> {
        let tx = self.write_transaction()?;
        db::fetch_application(&tx, id)?;
        let status: ApplicationStatus = status.parse()?;

        tx.execute(
            "UPDATE applications SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status, Utc::now(), id],
        )?;
        let updated = db::fetch_application(&tx, id)?;
        tx.commit()?;

        trace!("application #{} status -> {}", id, status);
        Ok(updated)
    }

    // --- Company operations ---

    pub fn add_company(&self, fields: &NewCompany) -> Result<Company> {
        let company = validate_company(fields)?;
        let tx = self.write_transaction()?;

        if db::find_company_by_name(&tx, &company.name)?.is_some() {
            return Err(name_conflict(&company.name));
        }
        let id = insert_company(&tx, &company)?;
        let created = db::fetch_company(&tx, id)?;
        tx.commit()?;

        trace!("added company #{} '{}'", created.id, created.name);
        Ok(created)
    }

    /// Existing applications keep their `company_name` text after a rename.
    pub fn edit_company(&self, id: i64, fields: &NewCompany) -> Result<Company> {
        let tx = self.write_transaction()?;
        db::fetch_company(&tx, id)?;
        let company = validate_company(fields)?;

        if let Some(existing) = db::find_company_by_name(&tx, &company.name)? {
            if existing.id != id {
                return Err(name_conflict(&company.name));
            }
        }

        tx.execute(
            "UPDATE companies SET name = ?1, industry = ?2, location = ?3, website = ?4, notes = ?5
             WHERE id = ?6",
            params![
                company.name,
                company.industry,
                company.location,
                company.website,
                company.notes,
                id
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                name_conflict(&company.name)
            } else {
                e.into()
            }
        })?;
        let updated = db::fetch_company(&tx, id)?;
        tx.commit()?;

        trace!("edited company #{}", id);
        Ok(updated)
    }

    /// Removes the company and, through `ON DELETE CASCADE`, its applications.
    pub fn delete_company(&self, id: i64) -> Result<CompanyDeletion> {
        let tx = self.write_transaction()?;
        let company = db::fetch_company(&tx, id)?;
        let owned = db::count_company_applications(&tx, id)?;

        tx.execute("DELETE FROM companies WHERE id = ?1", [id])?;
        tx.commit()?;

        trace!(
            "deleted company #{} '{}' with {} application(s)",
            id,
            company.name,
            owned
        );
        Ok(CompanyDeletion {
            company,
            deleted_applications: owned as usize,
        })
    }
}
