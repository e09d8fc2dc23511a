use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;

use crate::db::Database;
use crate::models::{status_color, Application, ApplicationFilter, ApplicationStatus, DashboardStats};

struct AppState {
    apps: Vec<Application>,
    selected: usize,
    scroll_offset: u16,
    stats: Option<DashboardStats>,
    message: Option<String>,
}

impl AppState {
    fn new(apps: Vec<Application>) -> Self {
        Self {
            apps,
            selected: 0,
            scroll_offset: 0,
            stats: None,
            message: None,
        }
    }

    fn current_app(&self) -> Option<&Application> {
        self.apps.get(self.selected)
    }

    fn refresh_stats(&mut self, db: &Database) {
        match db.dashboard_stats() {
            Ok(stats) => self.stats = Some(stats),
            Err(e) => self.message = Some(format!("Dashboard failed: {}", e)),
        }
    }

    fn set_status(&mut self, db: &Database, status: ApplicationStatus) {
        let Some(app) = self.current_app() else { return };
        match db.update_status(app.id, status.as_str()) {
            Ok(updated) => {
                self.message = Some(format!("#{} -> {}", updated.id, updated.status));
                self.apps[self.selected] = updated;
                self.refresh_stats(db);
            }
            Err(e) => self.message = Some(format!("Status update failed: {}", e)),
        }
    }

    fn next(&mut self) {
        if !self.apps.is_empty() && self.selected < self.apps.len() - 1 {
            self.selected += 1;
            self.scroll_offset = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }
}

pub fn run_browse(db: &Database, filter: &ApplicationFilter) -> Result<()> {
    let apps = db.list_applications(filter)?;
    if apps.is_empty() {
        println!("No applications found.");
        return Ok(());
    }

    let mut state = AppState::new(apps);
    state.refresh_stats(db);

    let _screen = ScreenGuard::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    run_loop(&mut terminal, &mut state, db)
}

/// Raw mode plus alternate screen; both are undone on drop, even when the
/// browse loop returns an error.
struct ScreenGuard;

impl ScreenGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        let guard = ScreenGuard;
        stdout().execute(EnterAlternateScreen)?;
        Ok(guard)
    }
}

impl Drop for ScreenGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = stdout().execute(LeaveAlternateScreen);
    }
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    db: &Database,
) -> Result<()> {
    let mut list_state = ListState::default();
    list_state.select(Some(0));

    loop {
        terminal.draw(|frame| draw(frame, state, &mut list_state))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let prev_selected = state.selected;
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Down | KeyCode::Char('j') => state.next(),
                KeyCode::Up | KeyCode::Char('k') => state.prev(),
                KeyCode::Char('J') | KeyCode::PageDown => state.scroll_down(),
                KeyCode::Char('K') | KeyCode::PageUp => state.scroll_up(),
                KeyCode::Char(c @ '1'..='6') => {
                    let index = c as usize - '1' as usize;
                    state.set_status(db, ApplicationStatus::ALL[index]);
                }
                _ => {}
            }
            if state.selected != prev_selected {
                list_state.select(Some(state.selected));
                state.message = None;
            }
        }
    }
    Ok(())
}

fn status_style(status: &str) -> Style {
    let color = match status_color(status) {
        "primary" => Color::Blue,
        "info" => Color::Cyan,
        "warning" => Color::Yellow,
        "success" => Color::Green,
        "danger" => Color::Red,
        _ => Color::DarkGray,
    };
    Style::default().fg(color)
}

fn draw(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(rows[0]);

    // Left panel: application list
    let items: Vec<ListItem> = state
        .apps
        .iter()
        .map(|app| {
            let position = if app.position.chars().count() > 30 {
                format!("{}...", app.position.chars().take(27).collect::<String>())
            } else {
                app.position.clone()
            };
            ListItem::new(Line::from(vec![
                Span::styled("● ", status_style(app.status.as_str())),
                Span::raw(format!(
                    "#{:<4} {} | {}",
                    app.id, position, app.company_name
                )),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(format!(
            " Applications ({}) ",
            state.apps.len()
        )))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[0], list_state);

    // Right panel: detail over dashboard
    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(9)])
        .split(chunks[1]);

    let detail_widget = Paragraph::new(build_detail(state))
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));
    frame.render_widget(detail_widget, right[0]);

    let dashboard_widget = Paragraph::new(build_dashboard(state))
        .block(Block::default().borders(Borders::ALL).title(" Dashboard "));
    frame.render_widget(dashboard_widget, right[1]);

    // Footer: last action or key help
    let footer = state.message.clone().unwrap_or_else(|| {
        " j/k:navigate  J/K:scroll  1:applied 2:scheduled 3:interviewed 4:offer 5:rejected 6:withdrawn  q:quit"
            .to_string()
    });
    let help = Paragraph::new(footer).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, rows[1]);
}

fn build_detail(state: &AppState) -> Text<'_> {
    let Some(app) = state.current_app() else {
        return Text::raw("No application selected");
    };

    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(Span::styled(
        &app.position,
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(format!("at {}", app.company_name)));
    lines.push(Line::from(Span::styled(
        format!("Status: {}", app.status),
        status_style(app.status.as_str()),
    )));
    lines.push(Line::from(format!("Priority: {}", app.priority)));
    lines.push(Line::from(format!("Applied: {}", app.date_applied)));

    if let Some(link) = &app.job_link {
        lines.push(Line::from(format!("Link: {}", link)));
    }
    if let Some(salary) = &app.salary_range {
        lines.push(Line::from(format!("Salary: {}", salary)));
    }
    lines.push(Line::from(Span::styled(
        format!("Updated: {}", app.updated_at.format("%Y-%m-%d %H:%M")),
        Style::default().fg(Color::DarkGray),
    )));

    lines.push(Line::from(""));

    if let Some(notes) = &app.notes {
        lines.push(Line::from(Span::styled(
            "Notes",
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for line in textwrap::fill(notes, 70).lines() {
            lines.push(Line::from(format!("  {}", line)));
        }
    } else {
        lines.push(Line::from(Span::styled(
            "(No notes)",
            Style::default().fg(Color::DarkGray),
        )));
    }

    Text::from(lines)
}

fn build_dashboard(state: &AppState) -> Text<'_> {
    let Some(stats) = &state.stats else {
        return Text::raw("No statistics");
    };

    let mut lines = vec![Line::from(format!(
        "Total: {}   Pending: {}   This week: {}",
        stats.total_apps, stats.pending_apps, stats.this_week_count
    ))];
    lines.push(Line::from(""));
    for count in &stats.status_counts {
        lines.push(Line::from(vec![
            Span::styled(format!("  {:<20}", count.status), status_style(count.status.as_str())),
            Span::raw(format!("{:>4}", count.count)),
        ]));
    }

    Text::from(lines)
}
