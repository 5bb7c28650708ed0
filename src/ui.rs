use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use people_filter::{
    fetch_all, DataLoader, FilterError, FilterId, Fetched, Person, RecordSource, Session,
    PERSON_FIELDS,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{info, warn};

pub type SharedLoader = Arc<DataLoader<Box<dyn RecordSource>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Table,
    Filters,
}

impl Focus {
    pub fn next(&self) -> Self {
        match self {
            Focus::Table => Focus::Filters,
            Focus::Filters => Focus::Table,
        }
    }
}

/// Background fetch: spawned on the runtime, result picked up by the event loop
struct Reloader {
    loader: SharedLoader,
    handle: Handle,
    retry: bool,
    pending: Option<oneshot::Receiver<Fetched>>,
}

pub struct App {
    pub session: Session,
    pub visible: Vec<Person>,
    pub state: TableState,
    pub focus: Focus,
    pub filter_cursor: usize,
    pub error: Option<String>,
    reloader: Option<Reloader>,
}

impl App {
    pub fn new(session: Session) -> Self {
        let mut app = Self {
            session,
            visible: Vec::new(),
            state: TableState::default(),
            focus: Focus::Table,
            filter_cursor: 0,
            error: None,
            reloader: None,
        };
        let view = app.session.visible();
        app.set_view(view);
        app
    }

    /// Attach a loader; `start_load` then fetches in the background
    pub fn with_loader(mut self, loader: SharedLoader, handle: Handle, retry: bool) -> Self {
        self.reloader = Some(Reloader {
            loader,
            handle,
            retry,
            pending: None,
        });
        self
    }

    pub fn is_loading(&self) -> bool {
        self.reloader.as_ref().is_some_and(|r| r.pending.is_some())
    }

    /// Kick off a fetch of both collections (no-op while one is in flight)
    pub fn start_load(&mut self) {
        let Some(reloader) = self.reloader.as_mut() else {
            return;
        };
        if reloader.pending.is_some() {
            return;
        }

        let (tx, rx) = oneshot::channel();
        let loader = Arc::clone(&reloader.loader);
        let retry = reloader.retry;
        reloader.handle.spawn(async move {
            let _ = tx.send(fetch_all(&loader, retry).await);
        });
        reloader.pending = Some(rx);
    }

    /// Apply a finished fetch, if any
    pub fn poll_load(&mut self) {
        let Some(reloader) = self.reloader.as_mut() else {
            return;
        };
        let Some(rx) = reloader.pending.as_mut() else {
            return;
        };

        match rx.try_recv() {
            Ok(fetched) => {
                reloader.pending = None;
                self.apply_fetched(fetched);
            }
            Err(oneshot::error::TryRecvError::Empty) => {}
            Err(oneshot::error::TryRecvError::Closed) => {
                warn!("Load task ended without a result");
                reloader.pending = None;
            }
        }
    }

    pub fn apply_fetched(&mut self, fetched: Fetched) {
        let report = self.session.apply(fetched);
        info!("Load finished: persons {:?}, filters {:?}", report.persons, report.filters);

        if self.filter_cursor >= self.session.filters().len() {
            self.filter_cursor = 0;
        }
        let view = self.session.visible();
        self.set_view(view);
    }

    fn set_view(&mut self, view: Result<Vec<Person>, FilterError>) {
        match view {
            Ok(persons) => {
                self.visible = persons;
                self.error = None;
            }
            Err(e) => {
                warn!("{}", e);
                self.visible.clear();
                self.error = Some(e.to_string());
            }
        }

        // Reset selection to first item
        if !self.visible.is_empty() {
            self.state.select(Some(0));
        } else {
            self.state.select(None);
        }
    }

    /// Filter control activation: the id comes straight from the control
    pub fn toggle_filter(&mut self, id: FilterId) {
        let view = self.session.toggle(id);
        self.set_view(view);
    }

    pub fn toggle_filter_at_cursor(&mut self) {
        let id = self
            .session
            .filters()
            .all_filters()
            .get(self.filter_cursor)
            .map(|f| f.id);
        if let Some(id) = id {
            self.toggle_filter(id);
        }
    }

    pub fn clear_filters(&mut self) {
        let view = self.session.clear_filters();
        self.set_view(view);
    }

    pub fn next_filter(&mut self) {
        let len = self.session.filters().len();
        if len > 0 {
            self.filter_cursor = (self.filter_cursor + 1) % len;
        }
    }

    pub fn previous_filter(&mut self) {
        let len = self.session.filters().len();
        if len > 0 {
            self.filter_cursor = (self.filter_cursor + len - 1) % len;
        }
    }

    pub fn next(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i >= len - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i == 0 {
                    len - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => (i + 20).min(len - 1),
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        if self.visible.is_empty() {
            return;
        }
        let i = self.state.selected().map(|i| i.saturating_sub(20)).unwrap_or(0);
        self.state.select(Some(i));
    }

    /// Handle one key press. Returns true when the app should quit.
    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => return true,
            KeyCode::Tab | KeyCode::BackTab => self.focus = self.focus.next(),
            KeyCode::Char('c') => self.clear_filters(),
            KeyCode::Char('r') => self.start_load(),
            KeyCode::Char(d @ '1'..='9') => {
                let index = d as usize - '1' as usize;
                let id = self.session.filters().all_filters().get(index).map(|f| f.id);
                if let Some(id) = id {
                    self.filter_cursor = index;
                    self.toggle_filter(id);
                }
            }
            _ => match self.focus {
                Focus::Filters => match code {
                    KeyCode::Right | KeyCode::Char('l') => self.next_filter(),
                    KeyCode::Left | KeyCode::Char('h') => self.previous_filter(),
                    KeyCode::Enter | KeyCode::Char(' ') => self.toggle_filter_at_cursor(),
                    _ => {}
                },
                Focus::Table => match code {
                    KeyCode::Down | KeyCode::Char('j') => self.next(),
                    KeyCode::Up | KeyCode::Char('k') => self.previous(),
                    KeyCode::PageDown => self.page_down(),
                    KeyCode::PageUp => self.page_up(),
                    KeyCode::Home => {
                        if !self.visible.is_empty() {
                            self.state.select(Some(0));
                        }
                    }
                    KeyCode::End => {
                        if !self.visible.is_empty() {
                            self.state.select(Some(self.visible.len() - 1));
                        }
                    }
                    _ => {}
                },
            },
        }
        false
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

    res.map_err(Into::into)
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        app.poll_load();
        terminal.draw(|f| ui(f, app))?;

        // Short poll so a finished background load shows up without a key press
        if !event::poll(Duration::from_millis(100))? {
            continue;
        }

        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press && app.handle_key(key.code, key.modifiers) {
                return Ok(());
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(3), // Filter buttons
            Constraint::Min(0),    // People table
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);
    render_filters(f, chunks[1], app);

    match &app.error {
        Some(message) => render_error(f, chunks[2], message),
        None => render_table(f, chunks[2], app),
    }

    render_status_bar(f, chunks[3], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![
        Span::styled(
            "People",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Showing {} of {}", app.visible.len(), app.session.persons().len()),
            Style::default().fg(Color::White),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Active filters: {}", app.session.filters().active_ids().len()),
            Style::default().fg(Color::Green),
        ),
    ];

    if app.is_loading() {
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled("Loading...", Style::default().fg(Color::Magenta)));
    }

    let header = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn render_filters(f: &mut Frame, area: Rect, app: &App) {
    let filters = app.session.filters();

    let mut spans = vec![];
    if filters.is_empty() {
        spans.push(Span::styled("No filters loaded", Style::default().fg(Color::DarkGray)));
    }

    for (i, filter) in filters.all_filters().iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" "));
        }

        let mut style = if filters.is_active(filter.id) {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Green)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };
        if app.focus == Focus::Filters && i == app.filter_cursor {
            style = style.add_modifier(Modifier::UNDERLINED | Modifier::REVERSED);
        }

        let label = if i < 9 {
            format!("[{}] {}", i + 1, filter.description)
        } else {
            format!("[ ] {}", filter.description)
        };
        spans.push(Span::styled(label, style));
    }

    let border = if app.focus == Focus::Filters {
        Color::Yellow
    } else {
        Color::White
    };
    let bar = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(" Filters "),
    );

    f.render_widget(bar, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = PERSON_FIELDS.iter().map(|field| {
        Cell::from(field.label()).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.visible.iter().map(|person| {
        let cells = person.columns().map(|value| Cell::from(truncate(value, 28)));
        Row::new(cells).height(1)
    });

    let border = if app.focus == Focus::Table {
        Color::Yellow
    } else {
        Color::White
    };
    let table = Table::new(
        rows,
        [
            Constraint::Length(14),
            Constraint::Length(16),
            Constraint::Length(30),
            Constraint::Length(18),
            Constraint::Length(7),
            Constraint::Length(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(" People "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_error(f: &mut Frame, area: Rect, message: &str) {
    let content = vec![
        Line::from(""),
        Line::from(Span::styled(
            "  Cannot apply the active filters",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::raw(format!("  {}", message))),
        Line::from(""),
        Line::from(Span::styled(
            "  Toggle the offending filter off or press c to clear",
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )),
    ];

    let panel = Paragraph::new(content).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red))
            .title(" People "),
    );

    f.render_widget(panel, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
    let total = app.visible.len();

    let mut status_spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected, total),
        Style::default().fg(Color::Cyan),
    )];

    if !app.session.filters().active_ids().is_empty() {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled("c", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" Clear"));
    }

    status_spans.push(Span::raw(" | "));
    status_spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Focus | "));
    status_spans.push(Span::styled("1-9", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Toggle | "));
    status_spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Nav | "));
    status_spans.push(Span::styled("r", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Reload | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use people_filter::{FilterStore, PersonStore, RawFilter};
    use std::collections::BTreeMap;

    fn person(first: &str, last: &str, state: &str) -> Person {
        Person {
            state: Some(state.to_string()),
            ..Person::new(first, last)
        }
    }

    fn raw(description: &str, field: &str, value: &str) -> RawFilter {
        RawFilter {
            description: description.to_string(),
            criteria: BTreeMap::from([(field.to_string(), value.to_string())]),
        }
    }

    fn test_app() -> App {
        let persons = PersonStore::with_persons(vec![
            person("Bob", "Zephyr", "IL"),
            person("Amy", "Adams", "MA"),
            person("Cy", "Moss", "CA"),
        ]);
        let filters = FilterStore::with_filters(vec![
            raw("Illinois", "state", "IL"),
            raw("California", "state", "CA"),
            raw("Broken", "email", "x"),
        ]);
        App::new(Session::with_stores(persons, filters))
    }

    fn press(app: &mut App, code: KeyCode) -> bool {
        app.handle_key(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_starts_with_everyone_selected_first() {
        let app = test_app();

        assert_eq!(app.visible.len(), 3);
        assert_eq!(app.visible[0].last_name.as_deref(), Some("Adams"));
        assert_eq!(app.state.selected(), Some(0));
    }

    #[test]
    fn test_digit_toggles_filter() {
        let mut app = test_app();

        press(&mut app, KeyCode::Char('1'));
        assert_eq!(app.visible.len(), 1);
        assert_eq!(app.visible[0].last_name.as_deref(), Some("Zephyr"));

        press(&mut app, KeyCode::Char('2'));
        assert_eq!(app.visible.len(), 2);

        press(&mut app, KeyCode::Char('1'));
        press(&mut app, KeyCode::Char('2'));
        assert_eq!(app.visible.len(), 3);
    }

    #[test]
    fn test_digit_toggles_id_of_listed_filter() {
        let mut app = test_app();
        let second = app.session.filters().all_filters()[1].id;

        press(&mut app, KeyCode::Char('2'));

        let active: Vec<FilterId> = app.session.filters().active_ids().iter().copied().collect();
        assert_eq!(active, vec![second]);
        assert_eq!(app.filter_cursor, 1);
    }

    #[test]
    fn test_digit_beyond_filters_is_ignored() {
        let mut app = test_app();

        press(&mut app, KeyCode::Char('9'));

        assert_eq!(app.visible.len(), 3);
        assert!(app.session.filters().active_ids().is_empty());
    }

    #[test]
    fn test_filter_bar_cursor_and_enter() {
        let mut app = test_app();

        press(&mut app, KeyCode::Tab);
        assert_eq!(app.focus, Focus::Filters);

        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Enter);
        assert!(app.session.filters().is_active(FilterId(1)));
        assert_eq!(app.visible[0].last_name.as_deref(), Some("Moss"));

        press(&mut app, KeyCode::Left);
        press(&mut app, KeyCode::Left);
        assert_eq!(app.filter_cursor, 2);
    }

    #[test]
    fn test_missing_field_shows_error_then_clears() {
        let mut app = test_app();

        press(&mut app, KeyCode::Char('3'));
        assert!(app.error.as_deref().unwrap().contains("email"));
        assert!(app.visible.is_empty());
        assert_eq!(app.state.selected(), None);

        press(&mut app, KeyCode::Char('c'));
        assert!(app.error.is_none());
        assert_eq!(app.visible.len(), 3);
    }

    #[test]
    fn test_table_navigation_wraps() {
        let mut app = test_app();

        press(&mut app, KeyCode::Up);
        assert_eq!(app.state.selected(), Some(2));

        press(&mut app, KeyCode::Down);
        assert_eq!(app.state.selected(), Some(0));

        press(&mut app, KeyCode::End);
        assert_eq!(app.state.selected(), Some(2));
    }

    #[test]
    fn test_quit_keys() {
        let mut app = test_app();

        assert!(press(&mut app, KeyCode::Char('q')));
        assert!(press(&mut app, KeyCode::Esc));
        assert!(app.handle_key(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(!press(&mut app, KeyCode::Char('x')));
    }

    #[test]
    fn test_reload_without_loader_is_noop() {
        let mut app = test_app();

        press(&mut app, KeyCode::Char('r'));

        assert!(!app.is_loading());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Springfield", 20), "Springfield");
        assert_eq!(truncate("Springfield", 8), "Sprin...");
    }
}
