use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use partnership_ledger::{
    controller::STATUS_SAVE_FAILED, export_file_name, format_amount, format_signed, parse_amount, Clipboard,
    Controller, LoginGate, Osc52Clipboard, Session, Storage, FIRM_NAME,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, List, ListItem, ListState, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

pub type UiController = Controller<Box<dyn Storage + Send>>;

/// Status messages ("Saved", "Data loaded") disappear after this long
const STATUS_TTL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    Partner,
    Password,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Partners,
    Form,
    History,
}

impl Focus {
    pub fn next(&self) -> Self {
        match self {
            Focus::Partners => Focus::Form,
            Focus::Form => Focus::History,
            Focus::History => Focus::Partners,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Focus::Partners => Focus::History,
            Focus::Form => Focus::Partners,
            Focus::History => Focus::Form,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Date,
    TotalValue,
    Notes,
}

impl FormField {
    fn next(&self) -> Self {
        match self {
            FormField::Date => FormField::TotalValue,
            FormField::TotalValue => FormField::Notes,
            FormField::Notes => FormField::Date,
        }
    }

    fn previous(&self) -> Self {
        match self {
            FormField::Date => FormField::Notes,
            FormField::TotalValue => FormField::Date,
            FormField::Notes => FormField::TotalValue,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            FormField::Date => "Date",
            FormField::TotalValue => "Total Account Value",
            FormField::Notes => "Notes (Optional)",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditTarget {
    Contribution(u32),
    Draft(FormField),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Editing {
    pub target: EditTarget,
    pub buffer: String,
}

pub struct App {
    pub controller: UiController,
    pub gate: LoginGate,
    pub session: Option<Session>,
    pub clipboard: Box<dyn Clipboard>,
    pub export_dir: PathBuf,

    // Login screen
    pub login_list: ListState,
    pub login_field: LoginField,
    pub password: String,
    pub login_error: Option<String>,

    // Tracker screen
    pub focus: Focus,
    pub partner_table: TableState,
    pub period_table: TableState,
    pub form_field: FormField,
    pub editing: Option<Editing>,
    pub message: Option<String>,
    pub show_csv: bool,
    pub copied: bool,
    pub csv_scroll: u16,
    status_since: Instant,
    pub should_quit: bool,
}

impl App {
    pub fn new(controller: UiController, gate: LoginGate) -> Self {
        Self::with_clipboard(controller, gate, Box::new(Osc52Clipboard::new(io::stdout())))
    }

    pub fn with_clipboard(controller: UiController, gate: LoginGate, clipboard: Box<dyn Clipboard>) -> Self {
        let mut partner_table = TableState::default();
        partner_table.select(Some(0));

        let mut period_table = TableState::default();
        if !controller.state().periods.is_empty() {
            period_table.select(Some(controller.state().periods.len() - 1));
        }

        Self {
            controller,
            gate,
            session: None,
            clipboard,
            export_dir: PathBuf::from("."),
            login_list: ListState::default(),
            login_field: LoginField::Partner,
            password: String::new(),
            login_error: None,
            focus: Focus::Partners,
            partner_table,
            period_table,
            form_field: FormField::TotalValue,
            editing: None,
            message: None,
            show_csv: false,
            copied: false,
            csv_scroll: 0,
            status_since: Instant::now(),
            should_quit: false,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.is_some()
    }

    /// Drop expired status messages
    pub fn tick(&mut self) {
        // A failed save stays on screen until the next successful one
        if self.controller.status() == Some(STATUS_SAVE_FAILED) {
            return;
        }
        if self.status_since.elapsed() >= STATUS_TTL {
            self.controller.clear_status();
            self.copied = false;
        }
    }

    fn touch_status(&mut self) {
        self.status_since = Instant::now();
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if self.is_logged_in() {
            self.handle_tracker_key(key);
        } else {
            self.handle_login_key(key);
        }
    }

    // ========================================================================
    // LOGIN SCREEN
    // ========================================================================

    fn handle_login_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab | KeyCode::BackTab => {
                self.login_field = match self.login_field {
                    LoginField::Partner => LoginField::Password,
                    LoginField::Password => LoginField::Partner,
                };
            }
            KeyCode::Enter => self.attempt_login(),
            KeyCode::Up if self.login_field == LoginField::Partner => self.move_login_selection(-1),
            KeyCode::Down if self.login_field == LoginField::Partner => self.move_login_selection(1),
            KeyCode::Char('q') if self.login_field == LoginField::Partner => self.should_quit = true,
            KeyCode::Backspace if self.login_field == LoginField::Password => {
                self.password.pop();
                self.login_error = None;
            }
            KeyCode::Char(c) if self.login_field == LoginField::Password => {
                self.password.push(c);
                self.login_error = None;
            }
            _ => {}
        }
    }

    fn move_login_selection(&mut self, delta: i32) {
        let len = self.gate.partners().len();
        if len == 0 {
            return;
        }
        let i = match self.login_list.selected() {
            Some(i) => (i as i32 + delta).rem_euclid(len as i32) as usize,
            None => 0,
        };
        self.login_list.select(Some(i));
        self.login_error = None;
    }

    pub fn attempt_login(&mut self) {
        let selected = self
            .login_list
            .selected()
            .and_then(|i| self.gate.partners().get(i))
            .cloned()
            .unwrap_or_default();

        match self.gate.login(&selected, &self.password) {
            Ok(session) => {
                self.controller.set_actor(session.partner.clone());
                self.session = Some(session);
                self.password.clear();
                self.login_error = None;
                self.touch_status();
            }
            Err(e) => {
                self.login_error = Some(e.to_string());
                if self.login_field == LoginField::Partner && !selected.is_empty() {
                    self.login_field = LoginField::Password;
                }
            }
        }
    }

    pub fn logout(&mut self) {
        if let Some(session) = self.session.take() {
            log::info!("{} logged out", session.partner);
        }
        self.controller.set_actor("system");
        self.password.clear();
        self.login_field = LoginField::Partner;
        self.editing = None;
        self.message = None;
        self.show_csv = false;
    }

    // ========================================================================
    // TRACKER SCREEN
    // ========================================================================

    fn handle_tracker_key(&mut self, key: KeyEvent) {
        if self.editing.is_some() {
            self.handle_edit_key(key);
            return;
        }

        self.message = None;

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('L') => self.logout(),
            KeyCode::Tab => self.focus = self.focus.next(),
            KeyCode::BackTab => self.focus = self.focus.previous(),
            KeyCode::Char('r') => self.record_period(),
            KeyCode::Char('v') => {
                self.show_csv = !self.show_csv;
                self.csv_scroll = 0;
            }
            KeyCode::Char('y') => self.copy_csv(),
            KeyCode::Char('e') => self.export_csv(),
            KeyCode::Char('d') if self.focus == Focus::History => self.delete_selected_period(),
            KeyCode::PageDown if self.show_csv => self.csv_scroll = self.csv_scroll.saturating_add(10),
            KeyCode::PageUp if self.show_csv => self.csv_scroll = self.csv_scroll.saturating_sub(10),
            KeyCode::Enter => self.start_editing(),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            _ => {}
        }
    }

    fn move_selection(&mut self, delta: i32) {
        match self.focus {
            Focus::Partners => {
                let len = self.controller.state().partners.len();
                step(&mut self.partner_table, len, delta);
            }
            Focus::Form => {
                self.form_field = if delta > 0 {
                    self.form_field.next()
                } else {
                    self.form_field.previous()
                };
            }
            Focus::History => {
                let len = self.controller.state().periods.len();
                step(&mut self.period_table, len, delta);
            }
        }
    }

    fn start_editing(&mut self) {
        let draft = &self.controller.state().draft;

        self.editing = match self.focus {
            Focus::Partners => self
                .partner_table
                .selected()
                .and_then(|i| self.controller.state().partners.get(i))
                .map(|p| Editing {
                    target: EditTarget::Contribution(p.id),
                    buffer: if p.contribution.is_zero() {
                        String::new()
                    } else {
                        p.contribution.to_string()
                    },
                }),
            Focus::Form => Some(Editing {
                target: EditTarget::Draft(self.form_field),
                buffer: match self.form_field {
                    FormField::Date => draft.date.format("%Y-%m-%d").to_string(),
                    FormField::TotalValue => draft.total_value.clone(),
                    FormField::Notes => draft.notes.clone(),
                },
            }),
            Focus::History => None,
        };
    }

    fn handle_edit_key(&mut self, key: KeyEvent) {
        let Some(editing) = self.editing.as_mut() else {
            return;
        };

        match key.code {
            KeyCode::Esc => self.editing = None,
            KeyCode::Enter => self.commit_edit(),
            KeyCode::Backspace => {
                editing.buffer.pop();
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => editing.buffer.clear(),
            KeyCode::Char(c) => editing.buffer.push(c),
            _ => {}
        }
    }

    pub fn commit_edit(&mut self) {
        let Some(editing) = self.editing.take() else {
            return;
        };

        let result = match editing.target {
            EditTarget::Contribution(id) => parse_amount(&editing.buffer)
                .and_then(|amount| self.controller.update_contribution(id, amount)),
            EditTarget::Draft(FormField::Date) => self.controller.set_draft_date(&editing.buffer),
            EditTarget::Draft(FormField::TotalValue) => {
                self.controller.set_draft_value(editing.buffer);
                Ok(())
            }
            EditTarget::Draft(FormField::Notes) => {
                self.controller.set_draft_notes(editing.buffer);
                Ok(())
            }
        };

        match result {
            Ok(()) => self.touch_status(),
            Err(e) => self.message = Some(e.to_string()),
        }
    }

    pub fn record_period(&mut self) {
        match self.controller.record_draft() {
            Ok(_) => {
                let len = self.controller.state().periods.len();
                self.period_table.select(Some(len - 1));
                self.touch_status();
            }
            Err(e) => self.message = Some(e.to_string()),
        }
    }

    pub fn delete_selected_period(&mut self) {
        let Some(id) = self
            .period_table
            .selected()
            .and_then(|i| self.controller.state().periods.get(i))
            .map(|p| p.id)
        else {
            return;
        };

        match self.controller.delete_period(id) {
            Ok(()) => {
                let len = self.controller.state().periods.len();
                let selected = self.period_table.selected().unwrap_or(0);
                self.period_table
                    .select(if len == 0 { None } else { Some(selected.min(len - 1)) });
                self.touch_status();
            }
            Err(e) => self.message = Some(e.to_string()),
        }
    }

    /// Copy to the terminal clipboard; on failure show the CSV for manual copying
    pub fn copy_csv(&mut self) {
        let result = self
            .controller
            .export_csv()
            .and_then(|csv| self.clipboard.copy(&csv));

        match result {
            Ok(()) => {
                self.copied = true;
                self.touch_status();
            }
            Err(e) => {
                log::error!("Failed to copy: {}", e);
                self.show_csv = true;
                self.message = Some("Copy failed - select the CSV text below and copy it manually".to_string());
            }
        }
    }

    pub fn export_csv(&mut self) {
        let path = self
            .export_dir
            .join(export_file_name(chrono::Utc::now().date_naive()));

        match partnership_ledger::write_csv_file(&path, &self.controller.state().periods) {
            Ok(_) => self.message = Some(format!("Exported to {}", path.display())),
            Err(e) => {
                log::error!("Export failed: {}", e);
                self.message = Some(e.to_string());
            }
        }
    }
}

fn step(state: &mut TableState, len: usize, delta: i32) {
    if len == 0 {
        state.select(None);
        return;
    }
    let i = match state.selected() {
        Some(i) => (i as i32 + delta).clamp(0, len as i32 - 1) as usize,
        None => 0,
    };
    state.select(Some(i));
}

fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Leave raw mode before the panic message is printed
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = restore_terminal();
        default_hook(info);
    }));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if event::poll(Duration::from_millis(250))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
        app.tick();
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    if app.is_logged_in() {
        render_tracker(f, app);
    } else {
        render_login(f, app);
    }
}

// ============================================================================
// LOGIN RENDERING
// ============================================================================

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn render_login(f: &mut Frame, app: &mut App) {
    let area = centered(f.size(), 50, 18);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(7),    // Partner list
            Constraint::Length(3), // Password
            Constraint::Length(2), // Error
        ])
        .split(area);

    let title = Paragraph::new(vec![
        Line::from(Span::styled(FIRM_NAME, Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))),
        Line::from(Span::styled("Partner Portal", Style::default().fg(Color::DarkGray))),
    ])
    .alignment(Alignment::Center);
    f.render_widget(title, chunks[0]);

    let active = |field: LoginField| {
        if app.login_field == field {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::White)
        }
    };

    let items: Vec<ListItem> = app
        .gate
        .partners()
        .iter()
        .map(|name| ListItem::new(name.clone()))
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(active(LoginField::Partner))
                .title(" Select Partner "),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("→ ");
    f.render_stateful_widget(list, chunks[1], &mut app.login_list);

    let masked = "•".repeat(app.password.chars().count());
    let password = Paragraph::new(masked).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(active(LoginField::Password))
            .title(" Password "),
    );
    f.render_widget(password, chunks[2]);

    let footer = match &app.login_error {
        Some(err) => Line::from(Span::styled(err.clone(), Style::default().fg(Color::Red))),
        None => Line::from(vec![
            Span::styled("↑/↓", Style::default().fg(Color::Yellow)),
            Span::raw(" Select | "),
            Span::styled("Tab", Style::default().fg(Color::Yellow)),
            Span::raw(" Field | "),
            Span::styled("Enter", Style::default().fg(Color::Yellow)),
            Span::raw(" Sign In | "),
            Span::styled("Esc", Style::default().fg(Color::Red)),
            Span::raw(" Quit"),
        ]),
    };
    f.render_widget(Paragraph::new(footer).alignment(Alignment::Center), chunks[3]);
}

// ============================================================================
// TRACKER RENDERING
// ============================================================================

fn render_tracker(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(4), // Summary cards
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);
    render_cards(f, chunks[1], app);

    let content = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(chunks[2]);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(7)])
        .split(content[0]);

    render_partners(f, left[0], app);
    render_form(f, left[1], app);

    if app.show_csv {
        render_csv(f, content[1], app);
    } else {
        render_history(f, content[1], app);
    }

    render_status_bar(f, chunks[3], app);
}

fn focus_style(app: &App, focus: Focus) -> Style {
    if app.focus == focus {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::White)
    }
}

fn pl_color(value: rust_decimal::Decimal) -> Color {
    if value.is_sign_negative() && !value.is_zero() {
        Color::Red
    } else {
        Color::Green
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![
        Span::styled(FIRM_NAME, Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
        Span::raw("  Partnership Tracking & P&L Calculator"),
    ];

    if let Some(session) = &app.session {
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(session.greeting(), Style::default().fg(Color::White)));
    }

    if let Some(status) = app.controller.status() {
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(format!("💾 {}", status), Style::default().fg(Color::Green)));
    }

    if app.copied {
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled("✓ Copied!", Style::default().fg(Color::Green)));
    }

    let header = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_cards(f: &mut Frame, area: Rect, app: &App) {
    let summary = match app.controller.summary() {
        Ok(summary) => summary,
        Err(e) => {
            let error = Paragraph::new(Span::styled(e.to_string(), Style::default().fg(Color::Red)))
                .block(Block::default().borders(Borders::ALL).title(" Summary "));
            f.render_widget(error, area);
            return;
        }
    };

    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(33),
            Constraint::Percentage(33),
            Constraint::Percentage(34),
        ])
        .split(area);

    let card = |title: &'static str, value: String, color: Color| {
        Paragraph::new(Line::from(Span::styled(
            value,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )))
        .block(Block::default().borders(Borders::ALL).title(format!(" {} ", title)))
    };

    f.render_widget(
        card("Total Capital", format!("${}", format_amount(summary.total_capital)), Color::White),
        cards[0],
    );
    f.render_widget(
        card("Active Partners", summary.active_partners.to_string(), Color::White),
        cards[1],
    );

    let (pl_text, color) = match summary.latest_profit_loss {
        Some(pl) => (format_signed(pl), pl_color(pl)),
        None => ("$0.00".to_string(), Color::White),
    };
    f.render_widget(card("Total P&L", pl_text, color), cards[2]);
}

fn render_partners(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["Partner", "Capital Contribution", "Ownership %"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let editing_id = match &app.editing {
        Some(Editing {
            target: EditTarget::Contribution(id),
            buffer,
        }) => Some((*id, buffer.clone())),
        _ => None,
    };

    let rows: Vec<Row> = app
        .controller
        .state()
        .partners
        .iter()
        .map(|p| {
            let contribution = match &editing_id {
                Some((id, buffer)) if *id == p.id => {
                    Cell::from(format!("${}▏", buffer)).style(Style::default().fg(Color::Yellow))
                }
                _ => Cell::from(format!("${}", format_amount(p.contribution))),
            };

            Row::new(vec![
                Cell::from(p.name.clone()),
                contribution,
                Cell::from(format!("{}%", format_amount(app.controller.ownership_of(p.id)))),
            ])
            .height(1)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(20),
            Constraint::Length(22),
            Constraint::Length(12),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(focus_style(app, Focus::Partners))
            .title(" Partner Contributions "),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.partner_table);
}

fn render_form(f: &mut Frame, area: Rect, app: &App) {
    let draft = &app.controller.state().draft;

    let lines: Vec<Line> = [FormField::Date, FormField::TotalValue, FormField::Notes]
        .iter()
        .map(|field| {
            let value = match &app.editing {
                Some(Editing {
                    target: EditTarget::Draft(editing_field),
                    buffer,
                }) if editing_field == field => format!("{}▏", buffer),
                _ => match field {
                    FormField::Date => draft.date.format("%Y-%m-%d").to_string(),
                    FormField::TotalValue if draft.total_value.is_empty() => "0.00".to_string(),
                    FormField::TotalValue => format!("${}", draft.total_value),
                    FormField::Notes if draft.notes.is_empty() => "Market conditions, notable trades...".to_string(),
                    FormField::Notes => draft.notes.clone(),
                },
            };

            let selected = app.focus == Focus::Form && app.form_field == *field;
            let marker = if selected { "→ " } else { "  " };
            let label_style = if selected {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };

            Line::from(vec![
                Span::raw(marker),
                Span::styled(format!("{:<20}", field.label()), label_style),
                Span::raw(value),
            ])
        })
        .chain(std::iter::once(Line::from(vec![
            Span::styled("  r", Style::default().fg(Color::Yellow)),
            Span::raw(" Record Period"),
        ])))
        .collect();

    let form = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(focus_style(app, Focus::Form))
            .title(" Record New Period (Monthly/Quarterly) "),
    );

    f.render_widget(form, area);
}

fn render_history(f: &mut Frame, area: Rect, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(area);

    let header_cells = ["#", "Date", "Account Value", "Mgmt Fee", "Net Value", "Total P&L", "Return %"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows: Vec<Row> = app
        .controller
        .state()
        .periods
        .iter()
        .enumerate()
        .map(|(idx, period)| {
            let color = pl_color(period.profit_loss);
            Row::new(vec![
                Cell::from((idx + 1).to_string()),
                Cell::from(period.date.format("%Y-%m-%d").to_string()),
                Cell::from(format!("${}", format_amount(period.total_value))),
                Cell::from(format!("-${}", format_amount(period.management_fee))),
                Cell::from(format!("${}", format_amount(period.net_value))),
                Cell::from(format_signed(period.profit_loss)).style(Style::default().fg(color)),
                Cell::from(format!("{}%", format_amount(period.return_pct()))).style(Style::default().fg(color)),
            ])
            .height(1)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(3),
            Constraint::Length(11),
            Constraint::Length(14),
            Constraint::Length(10),
            Constraint::Length(14),
            Constraint::Length(13),
            Constraint::Length(9),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(focus_style(app, Focus::History))
            .title(" Historical Performance "),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, chunks[0], &mut app.period_table);

    render_period_detail(f, chunks[1], app);
}

fn render_period_detail(f: &mut Frame, area: Rect, app: &App) {
    let selected = app
        .period_table
        .selected()
        .and_then(|i| app.controller.state().periods.get(i).map(|p| (i, p)));

    let Some((idx, period)) = selected else {
        let empty = Paragraph::new("No periods recorded yet.")
            .block(Block::default().borders(Borders::ALL).title(" Period Detail "));
        f.render_widget(empty, area);
        return;
    };

    let header_cells = ["Partner", "Ownership", "P&L Allocation", "Account Balance"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));

    let rows: Vec<Row> = period
        .partners
        .iter()
        .map(|p| {
            Row::new(vec![
                Cell::from(p.name.clone()),
                Cell::from(format!("{}%", format_amount(p.ownership))),
                Cell::from(format_signed(p.allocation)).style(Style::default().fg(pl_color(p.allocation))),
                Cell::from(format!("${}", format_amount(p.balance))),
            ])
        })
        .collect();

    let mut title = format!(" Period {} - {} ", idx + 1, period.date.format("%m/%d/%Y"));
    if !period.notes.is_empty() {
        title.push_str(&format!("· {} ", period.notes));
    }

    let table = Table::new(
        rows,
        [
            Constraint::Length(20),
            Constraint::Length(11),
            Constraint::Length(16),
            Constraint::Length(16),
        ],
    )
    .header(Row::new(header_cells).style(Style::default().bg(Color::DarkGray)))
    .block(Block::default().borders(Borders::ALL).title(title));

    f.render_widget(table, area);
}

fn render_csv(f: &mut Frame, area: Rect, app: &App) {
    let text = app
        .controller
        .export_csv()
        .unwrap_or_else(|e| format!("CSV unavailable: {}", e));

    let csv = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .scroll((app.csv_scroll, 0))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" CSV Data - select and copy into Excel or Google Sheets "),
        );

    f.render_widget(csv, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![];

    if let Some(message) = &app.message {
        spans.push(Span::styled(format!(" {} ", message), Style::default().fg(Color::Red)));
        spans.push(Span::raw(" | "));
    }

    if app.editing.is_some() {
        spans.push(Span::styled("Enter", Style::default().fg(Color::Yellow)));
        spans.push(Span::raw(" Save | "));
        spans.push(Span::styled("Esc", Style::default().fg(Color::Yellow)));
        spans.push(Span::raw(" Cancel"));
    } else {
        for (key, label) in [
            ("Tab", " Panel | "),
            ("Enter", " Edit | "),
            ("r", " Record | "),
            ("d", " Delete | "),
            ("v", " CSV | "),
            ("y", " Copy | "),
            ("e", " Export | "),
            ("L", " Logout | "),
        ] {
            spans.push(Span::styled(key, Style::default().fg(Color::Yellow)));
            spans.push(Span::raw(label));
        }
        spans.push(Span::styled("q", Style::default().fg(Color::Red)));
        spans.push(Span::raw(" Quit"));
    }

    let status_bar = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use partnership_ledger::{password_digest, AllocationEngine, LedgerError, MemoryStorage};

    struct FailingClipboard;

    impl Clipboard for FailingClipboard {
        fn copy(&mut self, _text: &str) -> partnership_ledger::Result<()> {
            Err(LedgerError::Clipboard("permission denied".to_string()))
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
    }

    fn create_app() -> App {
        let storage: Box<dyn Storage + Send> = Box::new(MemoryStorage::new());
        let controller = Controller::load(
            storage,
            AllocationEngine::default(),
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
        );
        let gate = LoginGate::new(
            controller.state().partners.iter().map(|p| p.name.clone()).collect(),
            password_digest("wheaton"),
        );
        App::with_clipboard(controller, gate, Box::new(FailingClipboard))
    }

    fn logged_in_app() -> App {
        let mut app = create_app();
        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Tab));
        type_text(&mut app, "wheaton");
        app.handle_key(key(KeyCode::Enter));
        app
    }

    #[test]
    fn test_login_requires_selection() {
        let mut app = create_app();
        app.handle_key(key(KeyCode::Enter));

        assert!(!app.is_logged_in());
        assert_eq!(app.login_error.as_deref(), Some("Please select your name"));
    }

    #[test]
    fn test_login_wrong_password() {
        let mut app = create_app();
        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Tab));
        type_text(&mut app, "nope");
        app.handle_key(key(KeyCode::Enter));

        assert!(!app.is_logged_in());
        assert_eq!(app.login_error.as_deref(), Some("Incorrect password. Please try again."));
    }

    #[test]
    fn test_login_and_logout() {
        let mut app = logged_in_app();
        assert_eq!(app.session.as_ref().unwrap().partner, "George Bierwirth");
        assert!(app.password.is_empty());

        app.handle_key(key(KeyCode::Char('L')));
        assert!(!app.is_logged_in());
    }

    #[test]
    fn test_edit_contribution_and_record() {
        let mut app = logged_in_app();

        app.handle_key(key(KeyCode::Enter));
        type_text(&mut app, "1000");
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(
            app.controller.state().partners[0].contribution,
            rust_decimal::Decimal::from(1000)
        );

        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.focus, Focus::Form);
        app.handle_key(key(KeyCode::Enter));
        type_text(&mut app, "1100");
        app.handle_key(key(KeyCode::Enter));
        app.handle_key(key(KeyCode::Char('r')));

        assert_eq!(app.controller.state().periods.len(), 1);
        assert_eq!(app.period_table.selected(), Some(0));
        assert!(app.message.is_none());
    }

    #[test]
    fn test_record_without_inputs_shows_message() {
        let mut app = logged_in_app();
        app.handle_key(key(KeyCode::Char('r')));

        assert!(app.controller.state().periods.is_empty());
        assert_eq!(
            app.message.as_deref(),
            Some("Please enter partner contributions and total account value")
        );
    }

    #[test]
    fn test_copy_failure_shows_csv_panel() {
        let mut app = logged_in_app();
        app.handle_key(key(KeyCode::Char('y')));

        assert!(app.show_csv);
        assert!(!app.copied);
    }

    fn expire_status(app: &mut App) {
        app.status_since = Instant::now().checked_sub(STATUS_TTL * 2).unwrap();
        app.tick();
    }

    #[test]
    fn test_saved_status_expires() {
        let mut app = logged_in_app();
        app.handle_key(key(KeyCode::Enter));
        type_text(&mut app, "1000");
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.controller.status(), Some("Saved"));

        expire_status(&mut app);
        assert_eq!(app.controller.status(), None);
    }

    #[test]
    fn test_save_failed_status_stays() {
        let mut storage = MemoryStorage::new();
        storage.set_fail_writes(true);
        let storage: Box<dyn Storage + Send> = Box::new(storage);
        let controller = Controller::load(
            storage,
            AllocationEngine::default(),
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
        );
        let gate = LoginGate::new(vec!["Byron Smith".to_string()], password_digest("wheaton"));
        let mut app = App::with_clipboard(controller, gate, Box::new(FailingClipboard));
        app.session = app.gate.login("Byron Smith", "wheaton").ok();

        app.handle_key(key(KeyCode::Enter));
        type_text(&mut app, "1000");
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.controller.status(), Some(STATUS_SAVE_FAILED));

        expire_status(&mut app);
        assert_eq!(app.controller.status(), Some(STATUS_SAVE_FAILED));
    }

    #[test]
    fn test_oversized_contribution_shows_message() {
        let mut app = logged_in_app();
        app.handle_key(key(KeyCode::Enter));
        type_text(&mut app, "50000000000000000000000000000");
        app.handle_key(key(KeyCode::Enter));
        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Enter));
        type_text(&mut app, "50000000000000000000000000000");
        app.handle_key(key(KeyCode::Enter));

        assert_eq!(app.message.as_deref(), Some("Amount is too large"));
        assert!(app.controller.state().partners[1].contribution.is_zero());
    }

    #[test]
    fn test_escape_cancels_edit() {
        let mut app = logged_in_app();
        app.handle_key(key(KeyCode::Enter));
        type_text(&mut app, "999");
        app.handle_key(key(KeyCode::Esc));

        assert!(app.editing.is_none());
        assert!(app.controller.state().partners[0].contribution.is_zero());
        assert!(!app.should_quit);
    }
}
