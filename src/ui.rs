use anyhow::{anyhow, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{debug, info};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use rusqlite::Connection;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::rc::Rc;
use std::time::{Duration, Instant};

use game_catalog::db;
use game_catalog::model::Game;
use game_catalog::scroll::{ScrollCallback, ScrollHost, ScrollMetrics, ScrollRegistry};

/// Container id the grid registers with the scroll watcher.
pub const GRID_CONTAINER_ID: &str = "games-grid";

/// Callback method the watcher invokes to pull the next page.
pub const LOAD_MORE_METHOD: &str = "LoadMoreGames";

/// Rows fetched per pagination callback.
const PAGE_SIZE: i64 = 100;

/// Height of one grid row in scroll units, so grid geometry resembles the
/// pixel metrics the watcher thresholds were written against.
const ROW_UNIT: f64 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Platforms,
    Collection,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Platforms => Page::Collection,
            Page::Collection => Page::Platforms,
        }
    }

    pub fn previous(&self) -> Self {
        self.next()
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Platforms => "Platforms",
            Page::Collection => "Collection",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterType {
    None,
    ByPlatform(String),
}

#[derive(Debug, Clone)]
pub struct FilterState {
    pub active_filter: FilterType,
}

/// Rows loaded so far, shared between the app and the pagination callback.
struct GridData {
    games: Vec<Game>,
    total_count: i64,
    exhausted: bool,
    revision: u64,
}

/// Pagination callback handed to the scroll registry: pulls the next page
/// of the collection into the shared grid data.
struct PageLoader {
    conn: Rc<Connection>,
    data: Rc<RefCell<GridData>>,
}

impl PageLoader {
    fn load_more(&mut self) -> Result<()> {
        let mut data = self.data.borrow_mut();
        if data.exhausted {
            debug!("collection exhausted, nothing more to load");
            return Ok(());
        }

        let offset = data.games.len() as i64;
        let page = db::get_games_page(&self.conn, offset, PAGE_SIZE)?;
        if (page.len() as i64) < PAGE_SIZE {
            data.exhausted = true;
        }

        info!(
            "loaded {} more games ({}/{} in grid)",
            page.len(),
            offset + page.len() as i64,
            data.total_count
        );
        data.games.extend(page);
        data.revision += 1;

        Ok(())
    }
}

impl ScrollCallback for PageLoader {
    fn invoke(&mut self, method: &str) -> Result<()> {
        match method {
            LOAD_MORE_METHOD => self.load_more(),
            other => Err(anyhow!("unknown callback method: {other}")),
        }
    }
}

pub struct App {
    conn: Rc<Connection>,
    data: Rc<RefCell<GridData>>,
    seen_revision: u64,
    pub filtered_games: Vec<Game>,
    pub state: TableState,
    pub platforms_state: TableState,
    pub current_page: Page,
    pub show_detail: bool,
    pub filter_state: FilterState,
    grid_rendered: bool,
    viewport_rows: u16,
}

impl App {
    pub fn new(conn: Connection) -> Result<Self> {
        let total_count = db::count_games(&conn)?;
        let first_page = db::get_games_page(&conn, 0, PAGE_SIZE)?;
        let exhausted = (first_page.len() as i64) < PAGE_SIZE;

        let mut state = TableState::default();
        if !first_page.is_empty() {
            state.select(Some(0));
        }

        let mut platforms_state = TableState::default();
        platforms_state.select(Some(0));

        let filtered_games = first_page.clone();

        Ok(Self {
            conn: Rc::new(conn),
            data: Rc::new(RefCell::new(GridData {
                games: first_page,
                total_count,
                exhausted,
                revision: 0,
            })),
            seen_revision: 0,
            filtered_games,
            state,
            platforms_state,
            current_page: Page::Collection,
            show_detail: false,
            filter_state: FilterState {
                active_filter: FilterType::None,
            },
            grid_rendered: false,
            viewport_rows: 0,
        })
    }

    /// Callback handle for the scroll registry, sharing this app's grid data.
    pub fn make_loader(&self) -> Box<dyn ScrollCallback> {
        Box::new(PageLoader {
            conn: Rc::clone(&self.conn),
            data: Rc::clone(&self.data),
        })
    }

    pub fn total_count(&self) -> i64 {
        self.data.borrow().total_count
    }

    pub fn loaded_count(&self) -> usize {
        self.data.borrow().games.len()
    }

    /// Pick up rows appended by the pagination callback since last frame.
    pub fn sync_loaded(&mut self) {
        let revision = self.data.borrow().revision;
        if revision != self.seen_revision {
            self.seen_revision = revision;
            self.refresh_filter();
        }
    }

    fn refresh_filter(&mut self) {
        let data = self.data.borrow();
        self.filtered_games = match &self.filter_state.active_filter {
            FilterType::None => data.games.clone(),
            FilterType::ByPlatform(platform) => data
                .games
                .iter()
                .filter(|g| &g.platform == platform)
                .cloned()
                .collect(),
        };
        drop(data);

        match self.state.selected() {
            Some(i) if i >= self.filtered_games.len() => {
                self.state.select(if self.filtered_games.is_empty() {
                    None
                } else {
                    Some(self.filtered_games.len() - 1)
                });
            }
            None if !self.filtered_games.is_empty() => self.state.select(Some(0)),
            _ => {}
        }
    }

    pub fn apply_filter(&mut self, filter: FilterType) {
        self.filter_state.active_filter = filter;
        self.refresh_filter();

        if !self.filtered_games.is_empty() {
            self.state.select(Some(0));
        } else {
            self.state.select(None);
        }
        *self.state.offset_mut() = 0;
    }

    pub fn clear_filter(&mut self) {
        self.apply_filter(FilterType::None);
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn selected_game(&self) -> Option<&Game> {
        self.state.selected().and_then(|i| self.filtered_games.get(i))
    }

    /// Platforms seen in the loaded rows, with counts, most common first.
    pub fn platform_summary(&self) -> Vec<(String, usize)> {
        let mut summary: HashMap<String, usize> = HashMap::new();

        for game in self.data.borrow().games.iter() {
            *summary.entry(game.platform.clone()).or_insert(0) += 1;
        }

        let mut result: Vec<_> = summary.into_iter().collect();
        result.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        result
    }

    pub fn next(&mut self) {
        let len = self.filtered_games.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i >= len - 1 {
                    i
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.filtered_games.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i == 0 {
                    0
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.filtered_games.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                let next = i + 20;
                if next >= len {
                    len - 1
                } else {
                    next
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let i = match self.state.selected() {
            Some(i) => {
                if i < 20 {
                    0
                } else {
                    i - 20
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn select_platform(&mut self) {
        let summary = self.platform_summary();
        if let Some(selected) = self.platforms_state.selected() {
            if let Some((platform, _)) = summary.get(selected) {
                self.apply_filter(FilterType::ByPlatform(platform.clone()));
                self.current_page = Page::Collection;
            }
        }
    }

    pub fn next_platform(&mut self) {
        let len = self.platform_summary().len();
        if len == 0 {
            return;
        }
        let i = match self.platforms_state.selected() {
            Some(i) => (i + 1).min(len - 1),
            None => 0,
        };
        self.platforms_state.select(Some(i));
    }

    pub fn previous_platform(&mut self) {
        let i = match self.platforms_state.selected() {
            Some(i) => i.saturating_sub(1),
            None => 0,
        };
        self.platforms_state.select(Some(i));
    }
}

// The grid is the scroll surface the watcher attaches to. It "mounts" on
// first render, so a watcher set up before that retries, exactly like
// attaching to a late-mounting container.
impl ScrollHost for App {
    fn has_container(&self, container_id: &str) -> bool {
        container_id == GRID_CONTAINER_ID && self.grid_rendered
    }

    fn scroll_metrics(&self, container_id: &str) -> Option<ScrollMetrics> {
        if !self.has_container(container_id) || self.viewport_rows == 0 {
            return None;
        }

        Some(ScrollMetrics {
            scroll_top: self.state.offset() as f64 * ROW_UNIT,
            scroll_height: self.filtered_games.len() as f64 * ROW_UNIT,
            client_height: self.viewport_rows as f64 * ROW_UNIT,
        })
    }

    fn scroll_to(&mut self, container_id: &str, scroll_top: f64) {
        if !self.has_container(container_id) || self.filtered_games.is_empty() {
            return;
        }

        let row = ((scroll_top / ROW_UNIT) as usize).min(self.filtered_games.len() - 1);
        *self.state.offset_mut() = row;
        self.state.select(Some(row));
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Attach infinite scroll to the grid before its first render; the
    // watcher polls until the grid mounts.
    let mut registry = ScrollRegistry::new();
    registry.setup(
        GRID_CONTAINER_ID,
        app.make_loader(),
        LOAD_MORE_METHOD,
        Instant::now(),
    );

    // Run the app
    let res = run_app(&mut terminal, app, &mut registry);

    registry.dispose_all();

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
    registry: &mut ScrollRegistry,
) -> io::Result<()> {
    loop {
        app.sync_loaded();
        terminal.draw(|f| ui(f, app))?;

        // Attachment retries and debounced scroll handling advance here.
        registry.tick_all(Instant::now(), app);

        if !event::poll(Duration::from_millis(50))? {
            continue;
        }

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }

            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter => match app.current_page {
                    Page::Collection => app.toggle_detail(),
                    Page::Platforms => app.select_platform(),
                },
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.current_page = app.current_page.previous();
                    } else {
                        app.current_page = app.current_page.next();
                    }
                }
                KeyCode::Char('c') => {
                    app.clear_filter();
                    app.current_page = Page::Collection;
                }
                KeyCode::Down | KeyCode::Char('j') => match app.current_page {
                    Page::Collection => {
                        app.next();
                        registry.on_scroll(GRID_CONTAINER_ID, Instant::now());
                    }
                    Page::Platforms => app.next_platform(),
                },
                KeyCode::Up | KeyCode::Char('k') => match app.current_page {
                    Page::Collection => {
                        app.previous();
                        registry.on_scroll(GRID_CONTAINER_ID, Instant::now());
                    }
                    Page::Platforms => app.previous_platform(),
                },
                KeyCode::PageDown => {
                    app.page_down();
                    registry.on_scroll(GRID_CONTAINER_ID, Instant::now());
                }
                KeyCode::PageUp => {
                    app.page_up();
                    registry.on_scroll(GRID_CONTAINER_ID, Instant::now());
                }
                KeyCode::Home => app.state.select(Some(0)),
                KeyCode::End => {
                    if !app.filtered_games.is_empty() {
                        app.state.select(Some(app.filtered_games.len() - 1));
                        registry.on_scroll(GRID_CONTAINER_ID, Instant::now());
                    }
                }
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    // Header with page navigation
    render_header(f, chunks[0], app);

    // Content area with optional split for detail panel
    if app.show_detail && app.current_page == Page::Collection {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(60), // Game grid
                Constraint::Percentage(40), // Detail panel
            ])
            .split(chunks[1]);

        render_grid(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        match app.current_page {
            Page::Platforms => render_platforms(f, chunks[1], app),
            Page::Collection => render_grid(f, chunks[1], app),
        }
    }

    // Status bar
    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let pages = vec![
        (Page::Platforms, "Platforms"),
        (Page::Collection, "Collection"),
    ];

    let mut tab_spans = vec![];
    for (i, (page, name)) in pages.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(*name, style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Cataloged: {}", app.total_count()),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Loaded: {}", app.loaded_count()),
        Style::default().fg(Color::Green),
    ));

    let header_text = vec![Line::from(tab_spans)];

    let header = Paragraph::new(header_text).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn render_grid(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["Title", "Platform", "Released", "Publisher", "Genre", "Added"]
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

    let rows = app.filtered_games.iter().map(|game| {
        let cells = vec![
            Cell::from(truncate(&game.title, 38)),
            Cell::from(game.platform.clone()).style(Style::default().fg(Color::Cyan)),
            Cell::from(game.release_date.clone()),
            Cell::from(truncate(&game.publisher, 20)),
            Cell::from(truncate(&game.genre, 16)),
            Cell::from(game.added_date.clone()),
        ];

        Row::new(cells).height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(40),
            Constraint::Length(14),
            Constraint::Length(12),
            Constraint::Length(22),
            Constraint::Length(18),
            Constraint::Length(12),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Collection "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    // The grid is now mounted; record its viewport so the scroll watcher
    // sees real geometry (borders + header row excluded).
    app.grid_rendered = true;
    app.viewport_rows = area.height.saturating_sub(3);

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_platforms(f: &mut Frame, area: Rect, app: &mut App) {
    let summary = app.platform_summary();

    let header_cells = ["Platform", "Games"].iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = summary.iter().map(|(platform, count)| {
        let cells = vec![
            Cell::from(platform.clone()),
            Cell::from(format!("{}", count)).style(Style::default().fg(Color::Green)),
        ];

        Row::new(cells).height(1)
    });

    let table = Table::new(rows, [Constraint::Length(25), Constraint::Length(10)])
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(" Platforms - loaded games by platform (Enter to filter) "),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.platforms_state);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let lines = match app.selected_game() {
        Some(game) => vec![
            Line::from(""),
            detail_line("Title", &game.title),
            detail_line("Platform", &game.platform),
            detail_line("Released", &game.release_date),
            detail_line("Publisher", &game.publisher),
            detail_line("Developer", &game.developer),
            detail_line("Genre", &game.genre),
            detail_line("Added", &game.added_date),
            Line::from(""),
            detail_line("Id", &game.id),
        ],
        None => vec![Line::from(""), Line::from("  No game selected")],
    };

    let panel = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Details "),
    );

    f.render_widget(panel, area);
}

fn detail_line<'a>(label: &'a str, value: &'a str) -> Line<'a> {
    Line::from(vec![
        Span::styled(
            format!("  {:<11}", label),
            Style::default().fg(Color::Yellow),
        ),
        Span::raw(value),
    ])
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
    let total = app.filtered_games.len();

    let mut status_spans = vec![Span::styled(
        format!(" Row: {}/{} (of {}) ", selected, total, app.total_count()),
        Style::default().fg(Color::Cyan),
    )];

    // Show filter status if active
    if let FilterType::ByPlatform(platform) = &app.filter_state.active_filter {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(
            format!("Filter: {}", platform),
            Style::default().fg(Color::Green),
        ));
        status_spans.push(Span::raw(" ("));
        status_spans.push(Span::styled("c", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" clear)"));
    }

    status_spans.push(Span::raw(" | "));
    status_spans.push(Span::styled("Enter", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Details | "));
    status_spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Page | "));
    status_spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Nav | "));
    status_spans.push(Span::styled("PgUp/PgDn", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Fast | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_text = vec![Line::from(status_spans)];

    let status_bar = Paragraph::new(status_text).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }

    // Cut on a char boundary; byte indexing would panic on multibyte titles.
    let cut = s
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= max_len - 3)
        .last()
        .unwrap_or(0);

    format!("{}...", &s[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;
    use game_catalog::scroll::BOTTOM_THRESHOLD;

    fn seeded_app(count: usize) -> App {
        let conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();

        let games: Vec<Game> = (0..count)
            .map(|i| {
                let mut game = Game {
                    platform: if i % 2 == 0 { "PS2" } else { "GameCube" }.to_string(),
                    title: format!("Game {:04}", i),
                    release_date: "2003-05-01".to_string(),
                    publisher: "Capcom".to_string(),
                    developer: "Clover Studio".to_string(),
                    genre: "Action".to_string(),
                    added_date: "2024-02-10".to_string(),
                    id: String::new(),
                };
                game.init_identity();
                game
            })
            .collect();
        db::insert_games(&conn, &games).unwrap();

        App::new(conn).unwrap()
    }

    #[test]
    fn test_app_loads_first_page_only() {
        let app = seeded_app(250);

        assert_eq!(app.loaded_count(), PAGE_SIZE as usize);
        assert_eq!(app.total_count(), 250);
    }

    #[test]
    fn test_loader_appends_next_page() {
        let mut app = seeded_app(250);
        let mut loader = app.make_loader();

        loader.invoke(LOAD_MORE_METHOD).unwrap();
        app.sync_loaded();
        assert_eq!(app.loaded_count(), 200);
        assert_eq!(app.filtered_games.len(), 200);

        loader.invoke(LOAD_MORE_METHOD).unwrap();
        app.sync_loaded();
        assert_eq!(app.loaded_count(), 250);

        // Exhausted: further invocations are no-ops.
        loader.invoke(LOAD_MORE_METHOD).unwrap();
        app.sync_loaded();
        assert_eq!(app.loaded_count(), 250);
    }

    #[test]
    fn test_loader_rejects_unknown_method() {
        let app = seeded_app(10);
        let mut loader = app.make_loader();

        assert!(loader.invoke("NoSuchMethod").is_err());
    }

    #[test]
    fn test_grid_mounts_on_first_render() {
        let mut app = seeded_app(50);

        // Not rendered yet: the scroll host reports no container.
        assert!(!app.has_container(GRID_CONTAINER_ID));
        assert!(app.scroll_metrics(GRID_CONTAINER_ID).is_none());

        app.grid_rendered = true;
        app.viewport_rows = 20;

        assert!(app.has_container(GRID_CONTAINER_ID));
        let metrics = app.scroll_metrics(GRID_CONTAINER_ID).unwrap();
        assert_eq!(metrics.scroll_height, 50.0 * ROW_UNIT);
        assert_eq!(metrics.client_height, 20.0 * ROW_UNIT);
    }

    #[test]
    fn test_metrics_near_bottom_within_threshold() {
        let mut app = seeded_app(100);
        app.grid_rendered = true;
        app.viewport_rows = 20;

        // Scrolled so the viewport shows the final rows.
        *app.state.offset_mut() = 75;
        let metrics = app.scroll_metrics(GRID_CONTAINER_ID).unwrap();
        assert!(metrics.distance_from_bottom() <= BOTTOM_THRESHOLD);

        // At the top, far from the bottom.
        *app.state.offset_mut() = 0;
        let metrics = app.scroll_metrics(GRID_CONTAINER_ID).unwrap();
        assert!(metrics.distance_from_bottom() > BOTTOM_THRESHOLD);
    }

    #[test]
    fn test_scroll_to_clamps_to_loaded_rows() {
        let mut app = seeded_app(30);
        app.grid_rendered = true;
        app.viewport_rows = 10;

        app.scroll_to(GRID_CONTAINER_ID, 10_000.0);
        assert_eq!(app.state.selected(), Some(29));
    }

    #[test]
    fn test_platform_filter() {
        let mut app = seeded_app(40);

        app.apply_filter(FilterType::ByPlatform("PS2".to_string()));
        assert!(app.filtered_games.iter().all(|g| g.platform == "PS2"));
        assert_eq!(app.filtered_games.len(), 20);

        app.clear_filter();
        assert_eq!(app.filtered_games.len(), 40);
    }

    #[test]
    fn test_platform_summary_sorted_by_count() {
        let app = seeded_app(41);
        let summary = app.platform_summary();

        // 21 even-indexed PS2 games, 20 GameCube.
        assert_eq!(summary[0], ("PS2".to_string(), 21));
        assert_eq!(summary[1], ("GameCube".to_string(), 20));
    }

    #[test]
    fn test_navigation_stops_at_last_loaded_row() {
        let mut app = seeded_app(3);

        app.next();
        app.next();
        assert_eq!(app.state.selected(), Some(2));
        app.next();
        assert_eq!(app.state.selected(), Some(2));

        app.previous();
        app.previous();
        app.previous();
        assert_eq!(app.state.selected(), Some(0));
    }

    #[test]
    fn test_truncate_ascii_titles() {
        assert_eq!(truncate("Okami", 38), "Okami");
        assert_eq!(truncate("abcdefghij", 8), "abcde...");
    }

    #[test]
    fn test_truncate_multibyte_titles() {
        // 18 kana, 3 bytes each: the cut at byte 35 lands mid-character.
        let title = "ファイナルファンタジーアンリミテッド";
        let cut = truncate(title, 38);

        assert!(cut.ends_with("..."));
        assert!(cut.len() <= 38);
        assert_eq!(cut, "ファイナルファンタジー...");

        // Column widths used by the grid must never panic on kana fields.
        truncate(title, 20);
        truncate(title, 16);
    }
}
