#[macro_use]
mod trace;

mod config;
mod db;
mod error;
mod lifecycle;
mod models;
mod stats;
mod tui;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use config::Config;
use db::Database;
use error::TrackerError;
use models::{
    Analytics, Application, ApplicationFilter, ApplicationStatus, Company, DashboardStats,
    NewApplication, NewCompany,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "jobtrack")]
#[command(about = "Track job applications and the companies behind them")]
struct Cli {
    /// Path to the SQLite database file
    #[arg(long, global = true, env = "JOBTRACK_DB")]
    db: Option<PathBuf>,

    /// Trace operations to stderr (same as JOBTRACK_TRACE=1)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Check database connectivity and show record counts
    Check,

    /// Add a job application (creates the company if it is new)
    Add {
        /// Position title
        position: String,

        /// Company name
        #[arg(short, long)]
        company: String,

        /// Status (Applied, "Interview Scheduled", Interviewed, Offer, Rejected, Withdrawn)
        #[arg(short, long, default_value = "Applied")]
        status: String,

        /// Date applied (YYYY-MM-DD, defaults to today)
        #[arg(short, long)]
        date: Option<String>,

        /// Priority (High, Medium, Low)
        #[arg(short, long, default_value = "Medium")]
        priority: String,

        /// Link to the job posting
        #[arg(short, long)]
        link: Option<String>,

        /// Salary range, free text
        #[arg(long)]
        salary: Option<String>,

        /// Notes
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Edit an application; omitted flags keep their current value
    Edit {
        /// Application ID
        id: i64,

        #[arg(long)]
        position: Option<String>,

        /// Company name text (the application stays linked to its original company)
        #[arg(short, long)]
        company: Option<String>,

        #[arg(short, long)]
        status: Option<String>,

        /// Date applied (YYYY-MM-DD)
        #[arg(short, long)]
        date: Option<String>,

        #[arg(short, long)]
        priority: Option<String>,

        #[arg(short, long)]
        link: Option<String>,

        #[arg(long)]
        salary: Option<String>,

        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Delete an application
    Delete {
        /// Application ID
        id: i64,
    },

    /// Show application details
    Show {
        /// Application ID
        id: i64,
    },

    /// Quickly change an application's status
    Status {
        /// Application ID
        id: i64,

        /// New status
        status: String,
    },

    /// List applications, newest first
    List {
        /// Filter by status
        #[arg(short, long)]
        status: Option<String>,

        /// Filter by company name (substring)
        #[arg(short, long)]
        company: Option<String>,
    },

    /// Manage companies
    Company {
        #[command(subcommand)]
        command: CompanyCommands,
    },

    /// Show dashboard statistics
    Dashboard {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show analytics: status breakdown, last 30 days, top companies
    Analytics {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Browse applications interactively
    Browse {
        /// Filter by status
        #[arg(short, long)]
        status: Option<String>,

        /// Filter by company name (substring)
        #[arg(short, long)]
        company: Option<String>,
    },
}

#[derive(Subcommand)]
enum CompanyCommands {
    /// List all companies
    List,

    /// Add a company
    Add {
        /// Company name
        name: String,

        #[arg(short, long)]
        industry: Option<String>,

        #[arg(short, long)]
        location: Option<String>,

        #[arg(short, long)]
        website: Option<String>,

        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Edit a company; omitted flags keep their current value
    Edit {
        /// Company ID
        id: i64,

        #[arg(long)]
        name: Option<String>,

        #[arg(short, long)]
        industry: Option<String>,

        #[arg(short, long)]
        location: Option<String>,

        #[arg(short, long)]
        website: Option<String>,

        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Delete a company and all of its applications
    Delete {
        /// Company ID
        id: i64,
    },

    /// Show company details and its applications
    Show {
        /// Company name or ID
        name: String,
    },
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", value))
}

fn parse_filter(status: Option<String>, company: Option<String>) -> Result<ApplicationFilter> {
    let status = match status {
        Some(s) => Some(s.parse::<ApplicationStatus>()?),
        None => None,
    };
    Ok(ApplicationFilter {
        status,
        company_contains: company,
        company_id: None,
    })
}

/// Numeric keys try the id first, then fall back to an exact name match.
fn lookup_company(db: &Database, key: &str) -> Result<Company> {
    if let Ok(id) = key.parse::<i64>() {
        match db.get_company(id) {
            Ok(company) => return Ok(company),
            Err(TrackerError::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }
    db.get_company_by_name(key)?
        .ok_or_else(|| anyhow!("Company '{}' not found", key))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::resolve(cli.db, cli.verbose)?;
    trace::set_enabled(config.trace);
    let db = Database::open_at(&config.db_path)?;

    match cli.command {
        Commands::Init => {
            db.init()?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Check => {
            db.ensure_initialized()?;
            let check = db.check()?;
            println!("Database: {}", check.path.display());
            println!("Connection OK");
            println!("  Companies:    {}", check.companies);
            println!("  Applications: {}", check.applications);
        }

        Commands::Add {
            position,
            company,
            status,
            date,
            priority,
            link,
            salary,
            notes,
        } => {
            db.ensure_initialized()?;
            let date_applied = match date {
                Some(d) => parse_date(&d)?,
                None => stats::today(),
            };
            let app = db.add_application(&NewApplication {
                position: Some(position),
                company_name: Some(company),
                status: Some(status),
                job_link: link,
                salary_range: salary,
                date_applied: Some(date_applied),
                priority: Some(priority),
                notes,
            })?;
            println!(
                "Added application #{} for {} at {}",
                app.id, app.position, app.company_name
            );
        }

        Commands::Edit {
            id,
            position,
            company,
            status,
            date,
            priority,
            link,
            salary,
            notes,
        } => {
            db.ensure_initialized()?;
            let current = db.get_application(id)?;
            let mut fields = NewApplication::from_application(&current);
            if position.is_some() {
                fields.position = position;
            }
            if company.is_some() {
                fields.company_name = company;
            }
            if status.is_some() {
                fields.status = status;
            }
            if let Some(d) = date {
                fields.date_applied = Some(parse_date(&d)?);
            }
            if priority.is_some() {
                fields.priority = priority;
            }
            if link.is_some() {
                fields.job_link = link;
            }
            if salary.is_some() {
                fields.salary_range = salary;
            }
            if notes.is_some() {
                fields.notes = notes;
            }
            let app = db.edit_application(id, &fields)?;
            println!("Updated application #{}.", app.id);
        }

        Commands::Delete { id } => {
            db.ensure_initialized()?;
            db.delete_application(id)?;
            println!("Deleted application #{}.", id);
        }

        Commands::Show { id } => {
            db.ensure_initialized()?;
            let app = db.get_application(id)?;
            print_application(&app);
        }

        Commands::Status { id, status } => {
            db.ensure_initialized()?;
            let app = db.update_status(id, &status)?;
            println!("Application #{} is now {}.", app.id, app.status);
        }

        Commands::List { status, company } => {
            db.ensure_initialized()?;
            let apps = db.list_applications(&parse_filter(status, company)?)?;
            print_applications(&apps);
        }

        Commands::Company { command } => {
            db.ensure_initialized()?;
            match command {
                CompanyCommands::List => {
                    let companies = db.list_companies()?;
                    if companies.is_empty() {
                        println!("No companies found.");
                    } else {
                        println!(
                            "{:<6} {:<28} {:<18} {:<18} {:>5}",
                            "ID", "NAME", "INDUSTRY", "LOCATION", "APPS"
                        );
                        println!("{}", "-".repeat(79));
                        for company in companies {
                            let count = db.company_application_count(company.id)?;
                            println!(
                                "{:<6} {:<28} {:<18} {:<18} {:>5}",
                                company.id,
                                truncate(&company.name, 26),
                                truncate(&company.industry.unwrap_or_default(), 16),
                                truncate(&company.location.unwrap_or_default(), 16),
                                count
                            );
                        }
                    }
                }

                CompanyCommands::Add {
                    name,
                    industry,
                    location,
                    website,
                    notes,
                } => {
                    let company = db.add_company(&NewCompany {
                        name: Some(name),
                        industry,
                        location,
                        website,
                        notes,
                    })?;
                    println!("Added company '{}' (ID: {})", company.name, company.id);
                }

                CompanyCommands::Edit {
                    id,
                    name,
                    industry,
                    location,
                    website,
                    notes,
                } => {
                    let current = db.get_company(id)?;
                    let mut fields = NewCompany::from_company(&current);
                    if name.is_some() {
                        fields.name = name;
                    }
                    if industry.is_some() {
                        fields.industry = industry;
                    }
                    if location.is_some() {
                        fields.location = location;
                    }
                    if website.is_some() {
                        fields.website = website;
                    }
                    if notes.is_some() {
                        fields.notes = notes;
                    }
                    let company = db.edit_company(id, &fields)?;
                    println!("Updated company '{}' (ID: {})", company.name, company.id);
                    if company.name != current.name {
                        println!(
                            "Note: existing applications still show '{}' as their company name.",
                            current.name
                        );
                    }
                }

                CompanyCommands::Delete { id } => {
                    let deletion = db.delete_company(id)?;
                    if deletion.deleted_applications > 0 {
                        println!(
                            "Company \"{}\" and {} associated application(s) deleted.",
                            deletion.company.name, deletion.deleted_applications
                        );
                    } else {
                        println!("Company \"{}\" deleted.", deletion.company.name);
                    }
                }

                CompanyCommands::Show { name } => {
                    let company = lookup_company(&db, &name)?;
                    println!("Company #{}", company.id);
                    println!("Name: {}", company.name);
                    if let Some(industry) = &company.industry {
                        println!("Industry: {}", industry);
                    }
                    if let Some(location) = &company.location {
                        println!("Location: {}", location);
                    }
                    if let Some(website) = &company.website {
                        println!("Website: {}", website);
                    }
                    if let Some(notes) = &company.notes {
                        println!("Notes:\n{}", textwrap::indent(&textwrap::fill(notes, 76), "  "));
                    }
                    println!("Created: {}", company.created_at.format("%Y-%m-%d %H:%M"));
                    let apps = db.list_applications(&ApplicationFilter {
                        company_id: Some(company.id),
                        ..Default::default()
                    })?;
                    if !apps.is_empty() {
                        println!("\nApplications ({}):", apps.len());
                        for app in apps {
                            println!(
                                "  #{} - {} ({}, {})",
                                app.id, app.position, app.status, app.date_applied
                            );
                        }
                    }
                }
            }
        }

        Commands::Dashboard { json } => {
            db.ensure_initialized()?;
            let stats = db.dashboard_stats()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_dashboard(&stats);
            }
        }

        Commands::Analytics { json } => {
            db.ensure_initialized()?;
            let analytics = db.analytics()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&analytics)?);
            } else {
                print_analytics(&analytics);
            }
        }

        Commands::Browse { status, company } => {
            db.ensure_initialized()?;
            tui::run_browse(&db, &parse_filter(status, company)?)?;
        }
    }

    Ok(())
}

fn print_applications(apps: &[Application]) {
    if apps.is_empty() {
        println!("No applications found.");
        return;
    }
    println!(
        "{:<6} {:<20} {:<28} {:<20} {:<8} {:<10}",
        "ID", "STATUS", "POSITION", "COMPANY", "PRIORITY", "APPLIED"
    );
    println!("{}", "-".repeat(97));
    for app in apps {
        println!(
            "{:<6} {:<20} {:<28} {:<20} {:<8} {:<10}",
            app.id,
            app.status,
            truncate(&app.position, 26),
            truncate(&app.company_name, 18),
            app.priority,
            app.date_applied
        );
    }
}

fn print_application(app: &Application) {
    println!("Application #{}", app.id);
    println!("Position: {}", app.position);
    println!("Company: {} (company #{})", app.company_name, app.company_id);
    println!("Status: {} [{}]", app.status, app.status.color());
    println!("Priority: {}", app.priority);
    println!("Applied: {}", app.date_applied);
    if let Some(link) = &app.job_link {
        println!("Link: {}", link);
    }
    if let Some(salary) = &app.salary_range {
        println!("Salary: {}", salary);
    }
    println!("Updated: {}", app.updated_at.format("%Y-%m-%d %H:%M"));
    if let Some(notes) = &app.notes {
        println!("\n--- Notes ---\n{}", textwrap::fill(notes, 78));
    }
}

fn print_dashboard(stats: &DashboardStats) {
    println!("Total applications: {}", stats.total_apps);
    println!("Pending:            {}", stats.pending_apps);
    println!("This week:          {}", stats.this_week_count);

    if !stats.status_counts.is_empty() {
        println!("\n{:<20} {:>6}", "STATUS", "COUNT");
        println!("{}", "-".repeat(27));
        for count in &stats.status_counts {
            let marker = if count.status.is_pending() { "*" } else { "" };
            println!("{:<20} {:>6}{}", count.status, count.count, marker);
        }
        println!("(* counted as pending)");
    }

    if !stats.recent_apps.is_empty() {
        println!("\nRecent applications:");
        print_applications(&stats.recent_apps);
    }
}

fn print_analytics(analytics: &Analytics) {
    if analytics.status_counts.is_empty() {
        println!("No applications yet.");
        return;
    }

    println!("{:<20} {:>6}", "STATUS", "COUNT");
    println!("{}", "-".repeat(27));
    for count in &analytics.status_counts {
        println!("{:<20} {:>6}", count.status, count.count);
    }

    println!("\nLast {} days:", stats::DAILY_WINDOW_DAYS);
    if analytics.daily_series.is_empty() {
        println!("  (no applications)");
    }
    for day in &analytics.daily_series {
        println!("  {}  {:>3} {}", day.date, day.count, "#".repeat(day.count.min(40) as usize));
    }

    println!("\nTop companies:");
    println!("{:<5} {:<30} {:>6}", "RANK", "COMPANY", "COUNT");
    println!("{}", "-".repeat(43));
    for (i, company) in analytics.top_companies.iter().enumerate() {
        println!(
            "{:<5} {:<30} {:>6}",
            i + 1,
            truncate(&company.company, 28),
            company.count
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
