use chrono::Local;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Gauge, List, ListItem, Paragraph, Row, Table, Wrap},
    Frame,
};

use crate::cli::input::LineEdit;
use crate::cli::state::{App, AuthField, Screen};
use crate::cli::theme::CategoryVisual;
use crate::cli::util::{fmt_date, fmt_money, fmt_percent};
use crate::stats::{self, BudgetHealth, BudgetSummary};
use crate::sync::{AuthState, DataStore, IdentityProvider, VerificationKind};

pub fn draw<P: IdentityProvider + 'static, S: DataStore>(f: &mut Frame, app: &mut App<P, S>) {
    let size = f.size();

    // header | main content | status bar
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(10), Constraint::Length(1)])
        .split(size);

    draw_header(f, root[0], app);

    match app.screen {
        Screen::Loading => draw_loading(f, root[1]),
        Screen::Auth => draw_auth(f, root[1], app),
        Screen::Projects | Screen::ProjectForm if app.current.is_none() => {
            draw_projects(f, root[1], app)
        }
        Screen::Detail | Screen::ProjectForm => draw_detail(f, root[1], app),
        Screen::Projects => draw_projects(f, root[1], app),
        Screen::AddCost => draw_add_cost(f, root[1], app),
        Screen::Account => draw_account(f, root[1], app),
        Screen::Help => draw_help(f, root[1]),
    }

    if app.screen == Screen::ProjectForm {
        let area = center_rect(root[1], 60, 12);
        f.render_widget(Clear, area);
        draw_project_form(f, area, app);
    }
    if app.confirm_delete.is_some() {
        let area = center_rect(root[1], 52, 5);
        f.render_widget(Clear, area);
        let p = Paragraph::new(app.status.clone())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Confirm delete")
                    .border_style(Style::default().fg(Color::Red)),
            );
        f.render_widget(p, area);
    }

    let status = Paragraph::new(app.status.clone()).style(Style::default().fg(Color::DarkGray));
    f.render_widget(status, root[2]);
}

fn draw_header<P: IdentityProvider + 'static, S: DataStore>(f: &mut Frame, area: Rect, app: &App<P, S>) {
    let who = match app.session.state() {
        AuthState::SignedIn(session) => session.user.label().to_string(),
        AuthState::SignedOut => "signed out".into(),
        AuthState::Initializing => "…".into(),
    };
    let line = Line::from(vec![
        Span::styled("Construction Cost Tracker", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("   "),
        Span::styled(who, Style::default().fg(Color::Cyan)),
    ]);
    f.render_widget(Paragraph::new(line).block(Block::default().borders(Borders::ALL)), area);
}

fn draw_loading(f: &mut Frame, area: Rect) {
    let area = center_rect(area, 40, 3);
    let p = Paragraph::new("Restoring session…")
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(p, area);
}

fn health_color(health: BudgetHealth) -> Color {
    match health {
        BudgetHealth::Healthy => Color::Green,
        BudgetHealth::Warning => Color::Yellow,
        BudgetHealth::Over => Color::Red,
    }
}

fn field_line(label: &str, field: &LineEdit, focused: bool) -> Line<'static> {
    let marker = if focused { "▸ " } else { "  " };
    let style = if focused {
        Style::default().add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let mut spans = vec![
        Span::raw(marker.to_string()),
        Span::styled(format!("{label:<14}"), style),
        Span::raw(field.rendered()),
    ];
    if focused {
        spans.push(Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)));
    }
    Line::from(spans)
}

fn message_lines(error: Option<&String>, notice: Option<&String>) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if let Some(err) = error {
        lines.push(Line::from(Span::styled(err.clone(), Style::default().fg(Color::Red))));
    }
    if let Some(notice) = notice {
        lines.push(Line::from(Span::styled(notice.clone(), Style::default().fg(Color::Green))));
    }
    lines
}

// Authentication

fn draw_auth<P: IdentityProvider + 'static, S: DataStore>(f: &mut Frame, area: Rect, app: &App<P, S>) {
    let form = &app.auth;
    let area = center_rect(area, 70, 16);

    let mut lines = Vec::new();
    for (i, field) in form.mode.fields().iter().enumerate() {
        let label = match field {
            AuthField::DisplayName => "Display name",
            AuthField::Email => "Email",
            AuthField::Password => "Password",
            AuthField::Confirm => "Confirm",
            AuthField::Token => "Token",
        };
        lines.push(field_line(label, form.field(*field), i == form.focus));
    }
    if form.mode.fields().contains(&AuthField::Token) {
        let kind = match form.token_kind {
            VerificationKind::Signup => "confirm sign-up",
            VerificationKind::Recovery => "password recovery",
        };
        lines.push(Line::from(format!("  Token kind    {kind}  (F7 toggles)")));
    }
    lines.push(Line::from(""));
    lines.extend(message_lines(form.error.as_ref(), form.notice.as_ref()));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Enter submit | Tab next field | F2 sign in | F3 sign up | F4 reset | F5 token | F6 resend | Esc back",
        Style::default().fg(Color::DarkGray),
    )));

    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(form.mode.title()));
    f.render_widget(p, area);
}

// Projects Page

fn draw_projects<P: IdentityProvider + 'static, S: DataStore>(f: &mut Frame, area: Rect, app: &mut App<P, S>) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    let items: Vec<ListItem> = app
        .projects
        .projects()
        .iter()
        .map(|p| {
            let summary = app.summary(p);
            let color = health_color(summary.health());
            ListItem::new(vec![
                Line::from(Span::styled(p.name.clone(), Style::default().add_modifier(Modifier::BOLD))),
                Line::from(vec![
                    Span::raw(format!("  {} / {}  ", fmt_money(&summary.spent), fmt_money(&summary.budget))),
                    Span::styled(fmt_percent(&summary.usage_percent), Style::default().fg(color)),
                ]),
            ])
        })
        .collect();

    let title = if app.projects.snapshot().is_loading() {
        "Projects (loading…)".to_string()
    } else if let Some(err) = app.projects.snapshot().error() {
        format!("Projects (error: {err})")
    } else {
        format!("Projects ({})  Enter open | n new | e edit | d delete | r refresh | a account", items.len())
    };
    let empty = items.is_empty();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    f.render_stateful_widget(list, cols[0], &mut app.project_sel);

    if empty {
        let hint = Paragraph::new("No projects yet. Press n to create one.")
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("Details"));
        f.render_widget(hint, cols[1]);
        return;
    }

    match app.selected_project().cloned() {
        Some(project) => {
            let summary = app.summary(&project);
            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(6), Constraint::Length(3)])
                .split(cols[1]);
            let lines = vec![
                Line::from(format!("Name       {}", project.name)),
                Line::from(format!("About      {}", project.description.as_deref().unwrap_or("-"))),
                Line::from(format!("Created    {}", fmt_date(&project.created_at.with_timezone(&Local)))),
                Line::from(""),
                Line::from(format!("Budget     {}", fmt_money(&summary.budget))),
                Line::from(format!("Spent      {}", fmt_money(&summary.spent))),
                remaining_line(&summary),
            ];
            let details = Paragraph::new(lines)
                .wrap(Wrap { trim: true })
                .block(Block::default().borders(Borders::ALL).title("Details"));
            f.render_widget(details, rows[0]);
            f.render_widget(budget_gauge(&summary), rows[1]);
        }
        None => {
            let p = Paragraph::new("No project selected")
                .block(Block::default().borders(Borders::ALL).title("Details"));
            f.render_widget(p, cols[1]);
        }
    }
}

fn remaining_line(summary: &BudgetSummary) -> Line<'static> {
    let color = health_color(summary.health());
    let label = if summary.is_over_budget() { "Over by    " } else { "Remaining  " };
    Line::from(vec![
        Span::raw(label),
        Span::styled(fmt_money(&summary.remaining.abs()), Style::default().fg(color)),
    ])
}

fn budget_gauge(summary: &BudgetSummary) -> Gauge<'static> {
    Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Budget used"))
        .gauge_style(Style::default().fg(health_color(summary.health())))
        .ratio(summary.bar_ratio())
        .label(fmt_percent(&summary.usage_percent))
}

fn draw_project_form<P: IdentityProvider + 'static, S: DataStore>(f: &mut Frame, area: Rect, app: &App<P, S>) {
    let form = &app.project_form;
    let mut lines = vec![
        field_line("Name", &form.name, form.focus == 0),
        field_line("Description", &form.description, form.focus == 1),
        field_line("Budget", &form.budget, form.focus == 2),
        Line::from(""),
    ];
    lines.extend(message_lines(form.error.as_ref(), None));
    lines.push(Line::from(Span::styled(
        "Tab switch field | Enter save | Esc cancel",
        Style::default().fg(Color::DarkGray),
    )));
    let title = if form.editing.is_some() { "Edit Project" } else { "New Project" };
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(p, area);
}

// Project detail

fn draw_detail<P: IdentityProvider + 'static, S: DataStore>(f: &mut Frame, area: Rect, app: &mut App<P, S>) {
    let Some(project) = app.current_project().cloned() else {
        let p = Paragraph::new("Project not found. Press Esc to go back.")
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(p, area);
        return;
    };
    let summary = app.summary(&project);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Length(3), Constraint::Min(6)])
        .split(area);

    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(rows[0]);
    let card = |title: &'static str, value: String, color: Color| {
        Paragraph::new(Span::styled(value, Style::default().fg(color).add_modifier(Modifier::BOLD)))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(title))
    };
    let health = health_color(summary.health());
    f.render_widget(card("Budget", fmt_money(&summary.budget), Color::White), cards[0]);
    f.render_widget(card("Spent", fmt_money(&summary.spent), Color::White), cards[1]);
    let remaining_title = if summary.is_over_budget() { "Over budget" } else { "Remaining" };
    f.render_widget(card(remaining_title, fmt_money(&summary.remaining.abs()), health), cards[2]);
    f.render_widget(budget_gauge(&summary), rows[1]);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(rows[2]);

    let entries = stats::project_entries(app.costs.costs(), project.id);
    let breakdown: Vec<ListItem> = stats::category_breakdown(&entries, app.categories())
        .into_iter()
        .map(|share| {
            let visual = CategoryVisual::from_id(&share.category.id);
            ListItem::new(Line::from(vec![
                Span::styled(format!("{} ", visual.glyph()), Style::default().fg(visual.color())),
                Span::raw(format!("{:<14}", share.category.name)),
                Span::raw(format!("{:>14}  ", fmt_money(&share.total))),
                Span::styled(fmt_percent(&share.percent), Style::default().fg(Color::DarkGray)),
            ]))
        })
        .collect();
    let breakdown = List::new(breakdown).block(Block::default().borders(Borders::ALL).title("By category"));
    f.render_widget(breakdown, cols[0]);

    let header = Row::new(vec!["Date", "Category", "Description", "Amount"])
        .style(Style::default().add_modifier(Modifier::BOLD))
        .height(1);
    let body: Vec<Row> = app
        .costs
        .costs()
        .iter()
        .map(|c| {
            let category = c.category_id.as_deref().and_then(|id| app.costs.category(id));
            let visual = CategoryVisual::from_id(c.category_id.as_deref().unwrap_or_default());
            let category_cell = match category {
                Some(cat) => Cell::from(Span::styled(
                    format!("{} {}", visual.glyph(), cat.name),
                    Style::default().fg(visual.color()),
                )),
                None => Cell::from("-"),
            };
            Row::new(vec![
                Cell::from(fmt_date(&c.date.with_timezone(&Local))),
                category_cell,
                Cell::from(c.description.clone()),
                Cell::from(fmt_money(&c.amount)),
            ])
        })
        .collect();
    let widths = [
        Constraint::Length(12),
        Constraint::Length(18),
        Constraint::Percentage(50),
        Constraint::Length(16),
    ];
    let title = if app.costs.snapshot().is_loading() {
        format!("{} (loading…)", project.name)
    } else {
        format!("{}  a add | x delete | e edit | d delete project | Esc back", project.name)
    };
    let table = Table::new(body, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    f.render_stateful_widget(table, cols[1], &mut app.cost_sel);
}

// Add cost

fn draw_add_cost<P: IdentityProvider + 'static, S: DataStore>(f: &mut Frame, area: Rect, app: &mut App<P, S>) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    let project = app
        .current_project()
        .map(|p| p.name.clone())
        .unwrap_or_else(|| "-".into());
    let category = app
        .selected_category()
        .map(|c| c.name.clone())
        .unwrap_or_else(|| "<none>".into());
    let form = &app.cost_form;
    let category_line = Line::from(vec![
        Span::raw(if form.focus == 0 { "▸ " } else { "  " }),
        Span::raw(format!("{:<14}", "Category")),
        Span::raw(category),
        Span::styled(
            if form.focus == 0 { "  (↑/↓ to choose)" } else { "" },
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    let mut lines = vec![
        Line::from(format!("  {:<14}{}", "Project", project)),
        category_line,
        field_line("Amount", &form.amount, form.focus == 1),
        field_line("Description", &form.description, form.focus == 2),
        Line::from(""),
    ];
    lines.extend(message_lines(form.error.as_ref(), None));
    lines.push(Line::from(Span::styled(
        "Tab switch field | Enter save | Esc back",
        Style::default().fg(Color::DarkGray),
    )));
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Add Cost"));
    f.render_widget(p, cols[0]);

    let items: Vec<ListItem> = app
        .categories()
        .iter()
        .map(|c| {
            let visual = CategoryVisual::from_id(&c.id);
            ListItem::new(Line::from(vec![
                Span::styled(format!("{} ", visual.glyph()), Style::default().fg(visual.color())),
                Span::raw(c.name.clone()),
            ]))
        })
        .collect();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Categories"))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    f.render_stateful_widget(list, cols[1], &mut app.cost_form.cat_sel);
}

// Account

fn draw_account<P: IdentityProvider + 'static, S: DataStore>(f: &mut Frame, area: Rect, app: &App<P, S>) {
    let area = center_rect(area, 70, 16);
    let form = &app.account;
    let mut lines = Vec::new();
    if let Some(session) = app.session.current_session() {
        let confirmed = match session.user.email_confirmed_at {
            Some(at) => format!("confirmed {}", fmt_date(&at.with_timezone(&Local))),
            None => "not confirmed (F2 resends the token)".into(),
        };
        lines.push(Line::from(format!("  {:<14}{}", "Email", session.user.email)));
        lines.push(Line::from(format!("  {:<14}{}", "Status", confirmed)));
        lines.push(Line::from(format!("  {:<14}{}", "Role", session.user.role)));
        lines.push(Line::from(""));
    }
    lines.push(field_line("Display name", &form.display_name, form.focus == 0));
    lines.push(field_line("New password", &form.password, form.focus == 1));
    lines.push(field_line("Confirm", &form.confirm, form.focus == 2));
    lines.push(Line::from(""));
    lines.extend(message_lines(form.error.as_ref(), form.notice.as_ref()));
    lines.push(Line::from(Span::styled(
        "Enter save focused | Tab next | F2 resend confirmation | F3 sign out | Esc back",
        Style::default().fg(Color::DarkGray),
    )));
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Account"));
    f.render_widget(p, area);
}

fn draw_help(f: &mut Frame, area: Rect) {
    let help_text = [
        "Global Keys:",
        "  Ctrl+C   : Quit",
        "  ?        : Toggle this help",
        "",
        "Projects:",
        "  Up/Down  : Navigate list",
        "  Enter    : Open project",
        "  n / e    : New / edit project",
        "  d / Del  : Delete project and its costs (asks y/n)",
        "  a        : Account",
        "  r        : Refresh",
        "  q        : Quit",
        "",
        "Project detail:",
        "  Up/Down  : Navigate costs",
        "  a        : Add cost",
        "  x / Del  : Delete selected cost",
        "  e / d    : Edit / delete project",
        "  Esc / b  : Back to projects",
        "",
        "Forms:",
        "  Tab      : Next field (Shift+Tab back)",
        "  Enter    : Submit",
        "  Esc      : Cancel",
    ]
    .join("\n");

    let p = Paragraph::new(help_text)
        .block(Block::default().borders(Borders::ALL).title("Help & Keybindings"));
    f.render_widget(p, area);
}

fn center_rect(rect: Rect, w: u16, h: u16) -> Rect {
    let x = rect.x + rect.width.saturating_sub(w) / 2;
    let y = rect.y + rect.height.saturating_sub(h) / 2;
    Rect { x, y, width: w.min(rect.width), height: h.min(rect.height) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::{categories, FakeIdentity, MemoryStore};
    use crate::sync::SessionConfig;
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::Arc;

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer.get(x, y).symbol());
            }
            text.push('\n');
        }
        text
    }

    #[test]
    fn center_rect_never_exceeds_the_parent() {
        let parent = Rect::new(0, 0, 40, 10);
        let inner = center_rect(parent, 60, 12);
        assert_eq!(inner, parent);

        let inner = center_rect(parent, 20, 4);
        assert_eq!(inner, Rect::new(10, 3, 20, 4));
    }

    #[tokio::test]
    async fn sign_in_screen_renders_for_a_fresh_start() {
        let provider = Arc::new(FakeIdentity::new());
        let store = Arc::new(MemoryStore::new().with_categories(&categories()));
        let mut app = App::new(provider, store, SessionConfig::default());
        app.start().await;

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| draw(f, &mut app)).unwrap();
        let text = buffer_text(&terminal);

        assert!(text.contains("Sign in"));
        assert!(text.contains("signed out"));
    }
}
