use anyhow::Result;
use chrono::{Local, Utc};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use expense_tracker::display::{
    expense_count_label, format_amount, format_date, truncate,
};
use expense_tracker::importer::{parse_amount, parse_date, ImportStatus};
use expense_tracker::{summarize, Expense, ExpenseStore, NewExpense, Period, Summary};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Expenses,
    Summary,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Expenses => Page::Summary,
            Page::Summary => Page::Expenses,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Expenses => "Expenses",
            Page::Summary => "Summary",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Adding,
    Importing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    None,
    Info(String),
    Error(String),
}

pub struct App {
    pub store: ExpenseStore,
    pub period: Period,
    pub current_page: Page,
    pub state: TableState,
    pub show_detail: bool,
    pub input_mode: InputMode,
    pub input: String,
    pub status: Status,
    /// Filtered copy of the store for `period`, rebuilt when the store revision changes
    pub visible: Vec<Expense>,
    pub summary: Summary,
    view_key: Option<(u64, Period)>,
}

impl App {
    pub fn new(store: ExpenseStore) -> Self {
        let mut app = Self {
            store,
            period: Period::All,
            current_page: Page::Expenses,
            state: TableState::default(),
            show_detail: false,
            input_mode: InputMode::Normal,
            input: String::new(),
            status: Status::None,
            visible: Vec::new(),
            summary: Summary::default(),
            view_key: None,
        };
        app.refresh();
        app
    }

    /// Recompute the filtered view only when the store or the period changed
    pub fn refresh(&mut self) {
        let key = (self.store.revision(), self.period);
        if self.view_key == Some(key) {
            return;
        }

        self.visible = self.store.filtered(self.period).into_iter().cloned().collect();
        self.summary = summarize(&self.visible);
        self.view_key = Some(key);

        if self.visible.is_empty() {
            self.state.select(None);
        } else {
            let selected = self.state.selected().unwrap_or(0).min(self.visible.len() - 1);
            self.state.select(Some(selected));
        }
    }

    pub fn set_period(&mut self, period: Period) {
        self.period = period;
        self.state.select(Some(0));
        self.refresh();
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn selected_expense(&self) -> Option<&Expense> {
        self.state.selected().and_then(|i| self.visible.get(i))
    }

    pub fn next(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = self.state.selected().map(|i| (i + 20).min(len - 1)).unwrap_or(0);
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let i = self.state.selected().map(|i| i.saturating_sub(20)).unwrap_or(0);
        self.state.select(Some(i));
    }

    pub fn begin_input(&mut self, mode: InputMode) {
        self.input_mode = mode;
        self.input.clear();
        self.status = Status::None;
    }

    pub fn cancel_input(&mut self) {
        self.input_mode = InputMode::Normal;
        self.input.clear();
    }

    /// Submit whatever the prompt holds, for the current input mode
    pub fn submit_input(&mut self) {
        let input = std::mem::take(&mut self.input);
        let mode = std::mem::replace(&mut self.input_mode, InputMode::Normal);

        match mode {
            InputMode::Adding => self.submit_add(&input),
            InputMode::Importing => self.submit_import(&input),
            InputMode::Normal => {}
        }
        self.refresh();
    }

    fn submit_add(&mut self, input: &str) {
        let candidate = match parse_add_input(input) {
            Ok(candidate) => candidate,
            Err(msg) => {
                self.status = Status::Error(msg);
                return;
            }
        };

        self.status = match self.store.add(candidate) {
            Ok(expense) => Status::Info(format!(
                "Added {} - {}",
                expense.description,
                format_amount(expense.amount)
            )),
            Err(e) => Status::Error(e.to_string()),
        };
    }

    fn submit_import(&mut self, input: &str) {
        let result = self.store.import_file(Path::new(input.trim()));
        let status = ImportStatus::from_result(&result);

        self.status = match (&status, result) {
            (ImportStatus::Success(_), Ok(added)) => {
                Status::Info(format!("{} ({} added)", status.message(), added))
            }
            _ => Status::Error(status.message()),
        };
    }
}

/// Parse the add prompt: `description,amount,category[,date][,notes]`
pub fn parse_add_input(input: &str) -> std::result::Result<NewExpense, String> {
    let fields: Vec<&str> = input.split(',').map(|f| f.trim()).collect();
    if fields.len() < 3 {
        return Err("Expected: description,amount,category[,date][,notes]".to_string());
    }

    let amount = parse_amount(fields[1])
        .ok_or_else(|| format!("Amount '{}' is not a number", fields[1]))?;
    let date = match fields.get(3).filter(|d| !d.is_empty()) {
        Some(raw) => parse_date(raw, &Local)
            .ok_or_else(|| format!("Date '{}' is not recognised (try YYYY-MM-DD)", raw))?,
        None => Utc::now(),
    };

    let mut candidate = NewExpense::new(fields[0], amount, fields[2], date);
    if fields.len() > 4 {
        // Notes may contain commas
        candidate = candidate.with_notes(&fields[4..].join(", "));
    }
    Ok(candidate)
}

/// Fixed palette for known categories; everything else looks like "Other"
fn category_color(category: &str) -> Color {
    match category {
        "Food" => Color::Green,
        "Transport" => Color::Blue,
        "Shopping" => Color::Magenta,
        "Entertainment" => Color::Yellow,
        "Bills" => Color::Red,
        _ => Color::Gray,
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
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

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if app.input_mode == InputMode::Normal {
                if !handle_normal_key(app, key) {
                    return Ok(());
                }
            } else {
                handle_input_key(app, key);
            }
        }
    }
}

/// Returns false when the user asked to quit
fn handle_normal_key(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return false,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return false,
        KeyCode::Enter => app.toggle_detail(),
        KeyCode::Tab | KeyCode::BackTab => app.current_page = app.current_page.next(),
        KeyCode::Char('a') => app.begin_input(InputMode::Adding),
        KeyCode::Char('i') => app.begin_input(InputMode::Importing),
        KeyCode::Char(c @ '1'..='5') => {
            let index = c as usize - '1' as usize;
            app.set_period(Period::ALL[index]);
        }
        KeyCode::Down | KeyCode::Char('j') => app.next(),
        KeyCode::Up | KeyCode::Char('k') => app.previous(),
        KeyCode::PageDown => app.page_down(),
        KeyCode::PageUp => app.page_up(),
        KeyCode::Home => {
            if !app.visible.is_empty() {
                app.state.select(Some(0));
            }
        }
        KeyCode::End => {
            if !app.visible.is_empty() {
                app.state.select(Some(app.visible.len() - 1));
            }
        }
        _ => {}
    }
    true
}

fn handle_input_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.cancel_input(),
        KeyCode::Enter => app.submit_input(),
        KeyCode::Backspace => {
            app.input.pop();
        }
        KeyCode::Char(c) => app.input.push(c),
        _ => {}
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with pages + periods
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Prompt / status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.show_detail && app.current_page == Page::Expenses {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);

        render_table(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        match app.current_page {
            Page::Expenses => render_table(f, chunks[1], app),
            Page::Summary => render_summary(f, chunks[1], app),
        }
    }

    if app.input_mode == InputMode::Normal {
        render_status_bar(f, chunks[2], app);
    } else {
        render_prompt(f, chunks[2], app);
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![];

    for (i, page) in [Page::Expenses, Page::Summary].iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" │ "));
        }
        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(page.title().to_string(), style));
    }

    spans.push(Span::raw("  |  "));
    for (i, period) in Period::ALL.iter().enumerate() {
        let style = if *period == app.period {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::styled(format!(" {} {} ", i + 1, period.label()), style));
    }

    spans.push(Span::raw("  |  "));
    spans.push(Span::styled(
        expense_count_label(app.visible.len()),
        Style::default().fg(Color::White),
    ));

    let header = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Expense Tracker "),
    );

    f.render_widget(header, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let title = format!(" Expenses - {} ", app.period.label());

    if app.visible.is_empty() {
        let empty = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(
                "  No expenses yet",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "  Press 'a' to add your first expense or 'i' to import a CSV file.",
                Style::default().fg(Color::DarkGray),
            )),
        ])
        .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(empty, area);
        return;
    }

    let header_cells = ["Date", "Description", "Category", "Amount", "Notes"]
        .iter()
        .map(|h| {
            Cell::from(*h).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.visible.iter().map(|expense| {
        let cells = vec![
            Cell::from(format_date(&expense.date)),
            Cell::from(truncate(&expense.description, 30)),
            Cell::from(truncate(&expense.category, 16))
                .style(Style::default().fg(category_color(&expense.category))),
            Cell::from(format_amount(expense.amount)),
            Cell::from(truncate(expense.notes.as_deref().unwrap_or(""), 30))
                .style(Style::default().add_modifier(Modifier::ITALIC)),
        ];
        Row::new(cells).height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(14),
            Constraint::Length(32),
            Constraint::Length(18),
            Constraint::Length(14),
            Constraint::Min(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_summary(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(0)])
        .split(area);

    let summary = &app.summary;
    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);

    let mut totals = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("  Total Spent:          ", label),
            Span::styled(format_amount(summary.total), Style::default().fg(Color::Blue)),
        ]),
        Line::from(vec![
            Span::styled("  Total Expenses:       ", label),
            Span::styled(summary.count.to_string(), Style::default().fg(Color::Green)),
        ]),
        Line::from(vec![
            Span::styled("  Average per Expense:  ", label),
            Span::styled(
                format_amount(summary.average),
                Style::default().fg(Color::Magenta),
            ),
        ]),
    ];
    match &summary.top_category {
        Some(top) => totals.push(Line::from(vec![
            Span::styled("  Top Category:         ", label),
            Span::raw(format!("{} - {}", top.category, format_amount(top.total))),
        ])),
        None => totals.push(Line::from(Span::styled(
            "  No expenses to summarize",
            Style::default().fg(Color::DarkGray),
        ))),
    }

    let totals = Paragraph::new(totals).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(" Spending Summary - {} ", app.period.label())),
    );
    f.render_widget(totals, chunks[0]);

    let header = Row::new(["Category", "Expenses", "Total", "Share"].iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    }))
    .style(Style::default().bg(Color::DarkGray));

    let rows = summary.by_category.iter().map(|c| {
        let share = if summary.total > 0.0 {
            c.total / summary.total * 100.0
        } else {
            0.0
        };
        Row::new(vec![
            Cell::from(c.category.clone()).style(Style::default().fg(category_color(&c.category))),
            Cell::from(c.count.to_string()),
            Cell::from(format_amount(c.total)),
            Cell::from(format!("{:.1}%", share)),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(25),
            Constraint::Length(12),
            Constraint::Length(16),
            Constraint::Length(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" By Category "),
    );
    f.render_widget(table, chunks[1]);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
    let mut status_spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected, app.visible.len()),
        Style::default().fg(Color::Cyan),
    )];

    match &app.status {
        Status::Info(msg) => {
            status_spans.push(Span::raw(" | "));
            status_spans.push(Span::styled(msg.clone(), Style::default().fg(Color::Green)));
        }
        Status::Error(msg) => {
            status_spans.push(Span::raw(" | "));
            status_spans.push(Span::styled(msg.clone(), Style::default().fg(Color::Red)));
        }
        Status::None => {}
    }

    for (key, action) in [
        ("1-5", " Period | "),
        ("a", " Add | "),
        ("i", " Import | "),
        ("Tab", " Page | "),
        ("Enter", " Details | "),
    ] {
        if key == "1-5" {
            status_spans.push(Span::raw(" | "));
        }
        status_spans.push(Span::styled(key, Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(action));
    }
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn render_prompt(f: &mut Frame, area: Rect, app: &App) {
    let title = match app.input_mode {
        InputMode::Adding => " Add: description,amount,category[,date][,notes] (Enter save, Esc cancel) ",
        InputMode::Importing => " Import CSV file path (Enter import, Esc cancel) ",
        InputMode::Normal => "",
    };

    let prompt = Paragraph::new(Line::from(vec![
        Span::styled("> ", Style::default().fg(Color::Yellow)),
        Span::raw(app.input.as_str()),
        Span::styled("█", Style::default().fg(Color::DarkGray)),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(title),
    );

    f.render_widget(prompt, area);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Expense Details ");

    let expense = match app.selected_expense() {
        Some(e) => e,
        None => {
            f.render_widget(Paragraph::new("No expense selected").block(block), area);
            return;
        }
    };

    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let mut content = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("  Description: ", label),
            Span::raw(expense.description.as_str()),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Amount: ", label),
            Span::raw(format_amount(expense.amount)),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Category: ", label),
            Span::styled(
                expense.category.as_str(),
                Style::default().fg(category_color(&expense.category)),
            ),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Date: ", label),
            Span::raw(format_date(&expense.date)),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Id: ", label),
            Span::styled(expense.id.as_str(), Style::default().fg(Color::DarkGray)),
        ]),
    ];

    if let Some(notes) = &expense.notes {
        content.push(Line::from(""));
        content.push(Line::from(vec![
            Span::styled("  Notes: ", label),
            Span::styled(
                format!("\"{}\"", notes),
                Style::default().add_modifier(Modifier::ITALIC),
            ),
        ]));
    }

    content.push(Line::from(""));
    content.push(Line::from(Span::styled(
        "  Press Enter to close",
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
    )));

    f.render_widget(Paragraph::new(content).block(block), area);
}
