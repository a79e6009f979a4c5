//! Terminal catalog browser
//!
//! Type to filter the catalog, move through matches with the arrow keys and
//! press Enter to Try Now on the selected card.

use crate::catalog::{SharedCatalog, StatusCodeEntry, StatusCodeGroup};
use crate::config::SharedConfig;
use crate::search::{filter, Segment};
use crate::simulator::{MockSimulator, SimulationState};
use crate::view::{render_json_lines, CardView};
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use tokio::time::Duration;

/// One row of the result list
enum Row<'a> {
    Header(&'a StatusCodeGroup),
    Entry(&'a StatusCodeEntry),
}

/// Browser application state
pub struct BrowserApp {
    catalog: SharedCatalog,
    config: SharedConfig,
    query: String,
    /// Index into the visible entries
    selected: usize,
    /// One simulator per code that has been tried
    simulators: HashMap<u16, MockSimulator>,
    should_quit: bool,
    status_message: String,
}

impl BrowserApp {
    pub fn new(catalog: SharedCatalog, config: SharedConfig) -> Self {
        Self {
            catalog,
            config,
            query: String::new(),
            selected: 0,
            simulators: HashMap::new(),
            should_quit: false,
            status_message: "Type to search, Up/Down to select, Enter to Try Now, Esc to clear or quit"
                .to_string(),
        }
    }

    /// Run the browser until the user quits
    pub async fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.run_app(&mut terminal).await;

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    async fn run_app<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        loop {
            terminal.draw(|f| self.ui(f))?;

            // Poll with a timeout so loading cards repaint when they resolve
            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key);
                    }
                }
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Esc => {
                if self.query.is_empty() {
                    self.should_quit = true;
                } else {
                    self.set_query(String::new());
                }
            }
            KeyCode::Char(c) => {
                let mut query = self.query.clone();
                query.push(c);
                self.set_query(query);
            }
            KeyCode::Backspace => {
                let mut query = self.query.clone();
                query.pop();
                self.set_query(query);
            }
            KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Down => {
                let count = self.visible_entries().len();
                if self.selected + 1 < count {
                    self.selected += 1;
                }
            }
            KeyCode::Enter => self.try_selected(),
            _ => {}
        }
    }

    fn set_query(&mut self, query: String) {
        self.query = query;
        self.selected = 0;
        let hits = self.visible_entries().len();
        self.status_message = if self.query.is_empty() {
            format!("{} status codes", self.catalog.len())
        } else if hits == 0 {
            format!("No status codes match \"{}\"", self.query)
        } else {
            format!("{} matches for \"{}\"", hits, self.query)
        };
    }

    /// Entries shown for the current query, in catalog order
    pub fn visible_entries(&self) -> Vec<&StatusCodeEntry> {
        filter(self.catalog.groups(), &self.query)
    }

    pub fn selected_entry(&self) -> Option<&StatusCodeEntry> {
        self.visible_entries().get(self.selected).copied()
    }

    /// Group headers are only shown while browsing without a query
    fn rows(&self) -> Vec<Row<'_>> {
        if self.query.is_empty() {
            self.catalog
                .groups()
                .iter()
                .flat_map(|group| {
                    std::iter::once(Row::Header(group)).chain(group.codes.iter().map(Row::Entry))
                })
                .collect()
        } else {
            self.visible_entries().into_iter().map(Row::Entry).collect()
        }
    }

    /// Try Now on the selected card
    fn try_selected(&mut self) {
        let catalog = Arc::clone(&self.catalog);
        let visible = filter(catalog.groups(), &self.query);
        let Some(entry) = visible.get(self.selected).copied() else {
            self.status_message = "Nothing selected".to_string();
            return;
        };
        let code = entry.code;
        let delay = self.config.simulator().delay_range();
        let simulator = self
            .simulators
            .entry(code)
            .or_insert_with(|| MockSimulator::new(entry, delay));
        let delay = simulator.trigger();
        self.status_message = format!(
            "Trying {} {} ({} ms)",
            entry.mock.method,
            entry.mock.url,
            delay.as_millis()
        );
    }

    pub fn simulation_state(&self, code: u16) -> SimulationState {
        self.simulators
            .get(&code)
            .map(|simulator| simulator.snapshot())
            .unwrap_or(SimulationState::Idle)
    }

    /// Draw the UI
    pub fn ui(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Length(3), // Search input
                Constraint::Min(10),   // Results and detail
                Constraint::Length(3), // Status bar
            ])
            .split(f.size());

        self.draw_header(f, chunks[0]);
        self.draw_search(f, chunks[1]);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(chunks[2]);
        self.draw_results(f, body[0]);
        self.draw_detail(f, body[1]);

        self.draw_status_bar(f, chunks[3]);
    }

    fn draw_header(&self, f: &mut Frame, area: Rect) {
        let header = Paragraph::new(format!(" StatusQuest - {} status codes ", self.catalog.len()))
            .style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(header, area);
    }

    fn draw_search(&self, f: &mut Frame, area: Rect) {
        let input = Paragraph::new(Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::Gray)),
            Span::raw(self.query.as_str()),
        ]))
        .block(Block::default().borders(Borders::ALL).title("Search"));
        f.render_widget(input, area);
    }

    fn draw_results(&self, f: &mut Frame, area: Rect) {
        let rows = self.rows();
        let selected_code = self.selected_entry().map(|entry| entry.code);
        let mut selected_row = None;

        let items: Vec<ListItem> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| match row {
                Row::Header(group) => ListItem::new(Line::from(Span::styled(
                    format!("{} {}", group.series, group.title),
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ))),
                Row::Entry(entry) => {
                    if Some(entry.code) == selected_code {
                        selected_row = Some(i);
                    }
                    let color = parse_hex_color(&entry.color).unwrap_or(Color::White);
                    ListItem::new(Line::from(vec![
                        Span::styled(format!("  {} ", entry.code), Style::default().fg(color)),
                        Span::raw(format!("{} {}", entry.emoji, entry.title)),
                    ]))
                }
            })
            .collect();

        let title = if self.query.is_empty() {
            "Catalog".to_string()
        } else {
            format!("Matches ({})", self.visible_entries().len())
        };

        if items.is_empty() {
            let empty = Paragraph::new("No matching status codes")
                .style(Style::default().fg(Color::Gray))
                .block(Block::default().borders(Borders::ALL).title(title));
            f.render_widget(empty, area);
            return;
        }

        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        let mut state = ListState::default();
        state.select(selected_row);
        f.render_stateful_widget(list, area, &mut state);
    }

    fn draw_detail(&self, f: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Detail");
        let Some(entry) = self.selected_entry() else {
            f.render_widget(Paragraph::new("").block(block), area);
            return;
        };

        let card = CardView::render(entry, &self.query);
        let accent = parse_hex_color(&card.color).unwrap_or(Color::White);
        let mut lines = Vec::new();

        let mut heading = vec![Span::raw(format!("{} ", card.emoji))];
        heading.extend(styled_spans(
            &card.heading,
            Style::default().fg(accent).add_modifier(Modifier::BOLD),
        ));
        lines.push(Line::from(heading));
        lines.push(Line::from(styled_spans(
            &card.category_label,
            Style::default().fg(Color::Gray),
        )));
        lines.push(Line::from(""));
        lines.push(Line::from(styled_spans(&card.description, Style::default())));
        lines.push(Line::from(""));
        lines.push(labeled("Tip: ", &card.tip));
        lines.push(labeled("Example: ", &card.example));
        lines.push(Line::from(""));

        lines.push(Line::from(Span::styled(
            card.request_line.clone(),
            Style::default().fg(Color::Cyan),
        )));
        for (name, value) in &card.headers {
            lines.push(Line::from(Span::styled(
                format!("{}: {}", name, value),
                Style::default().fg(Color::Gray),
            )));
        }
        if let Some(body) = &card.body_lines {
            for line in body {
                lines.push(Line::from(styled_spans(line, Style::default())));
            }
        }
        lines.push(Line::from(""));

        match self.simulation_state(entry.code) {
            SimulationState::Idle => lines.push(Line::from(Span::styled(
                "[Enter] Try Now",
                Style::default().fg(Color::Green),
            ))),
            SimulationState::Loading { .. } => lines.push(Line::from(Span::styled(
                "Loading response...",
                Style::default().fg(Color::Yellow),
            ))),
            SimulationState::Loaded {
                delay_ms, response, ..
            } => {
                lines.push(Line::from(Span::styled(
                    format!("Response {} after {} ms", card.mock_status, delay_ms),
                    Style::default().fg(accent).add_modifier(Modifier::BOLD),
                )));
                for line in render_json_lines(&response, &self.query) {
                    lines.push(Line::from(styled_spans(&line, Style::default())));
                }
            }
        }

        let detail = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false });
        f.render_widget(detail, area);
    }

    fn draw_status_bar(&self, f: &mut Frame, area: Rect) {
        let status = Paragraph::new(self.status_message.as_str())
            .style(Style::default().fg(Color::White))
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Status"));
        f.render_widget(status, area);
    }
}

/// Spans for highlighted text; emphasized runs get a yellow background
fn styled_spans(segments: &[Segment], base: Style) -> Vec<Span<'static>> {
    segments
        .iter()
        .map(|segment| {
            let style = if segment.emphasized {
                base.bg(Color::Yellow).fg(Color::Black)
            } else {
                base
            };
            Span::styled(segment.text.clone(), style)
        })
        .collect()
}

fn labeled(label: &'static str, segments: &[Segment]) -> Line<'static> {
    let mut spans = vec![Span::styled(
        label,
        Style::default().add_modifier(Modifier::BOLD),
    )];
    spans.extend(styled_spans(segments, Style::default()));
    Line::from(spans)
}

/// `#rrggbb` to a terminal color
pub fn parse_hex_color(hex: &str) -> Option<Color> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Color::Rgb(channel(0)?, channel(2)?, channel(4)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::config::{AppConfig, SimulatorConfig};
    use ratatui::backend::TestBackend;

    fn create_test_app() -> BrowserApp {
        let catalog = Arc::new(Catalog::builtin().unwrap());
        let config = SharedConfig::new(AppConfig::default());
        config.update_simulator(SimulatorConfig {
            min_delay_ms: 5,
            max_delay_ms: 10,
        });
        BrowserApp::new(catalog, config)
    }

    fn press(app: &mut BrowserApp, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_str(app: &mut BrowserApp, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn visible_codes(app: &BrowserApp) -> Vec<u16> {
        app.visible_entries().iter().map(|e| e.code).collect()
    }

    #[test]
    fn test_filters_on_every_keystroke() {
        let mut app = create_test_app();
        let total = app.visible_entries().len();

        type_str(&mut app, "40");
        assert!(app.visible_entries().len() < total);
        type_str(&mut app, "4");
        assert_eq!(visible_codes(&app), vec![404]);

        press(&mut app, KeyCode::Backspace);
        assert!(visible_codes(&app).contains(&404));
        assert!(visible_codes(&app).len() > 1);
    }

    #[test]
    fn test_escape_clears_then_quits() {
        let mut app = create_test_app();
        type_str(&mut app, "webdav");
        assert_eq!(visible_codes(&app).len(), 7);

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.query(), "");
        assert!(!app.should_quit());

        press(&mut app, KeyCode::Esc);
        assert!(app.should_quit());
    }

    #[test]
    fn test_ctrl_c_quits() {
        let mut app = create_test_app();
        type_str(&mut app, "teapot");
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit());
        assert_eq!(app.query(), "teapot");
    }

    #[test]
    fn test_selection_moves_within_matches() {
        let mut app = create_test_app();
        type_str(&mut app, "webdav");
        assert_eq!(app.selected_entry().unwrap().code, 207);

        press(&mut app, KeyCode::Down);
        assert_eq!(app.selected_entry().unwrap().code, 208);

        for _ in 0..20 {
            press(&mut app, KeyCode::Down);
        }
        assert_eq!(app.selected_entry().unwrap().code, 508);

        for _ in 0..20 {
            press(&mut app, KeyCode::Up);
        }
        assert_eq!(app.selected_entry().unwrap().code, 207);
    }

    #[test]
    fn test_rows_include_headers_only_when_browsing() {
        let mut app = create_test_app();
        let headers = app
            .rows()
            .iter()
            .filter(|row| matches!(row, Row::Header(_)))
            .count();
        assert_eq!(headers, 5);

        type_str(&mut app, "zzz");
        assert!(app.rows().is_empty());
        assert!(app.selected_entry().is_none());
    }

    #[tokio::test]
    async fn test_enter_tries_selected_card() {
        let mut app = create_test_app();
        type_str(&mut app, "404");
        press(&mut app, KeyCode::Enter);
        assert!(app.simulation_state(404).is_loading());

        let response = app.simulators[&404].wait_for_response().await.unwrap();
        assert_eq!(response["error"], "User not found");
        assert!(app.simulation_state(404).response().is_some());
        assert_eq!(app.simulation_state(200), SimulationState::Idle);
    }

    #[test]
    fn test_draws_without_panicking() {
        let mut app = create_test_app();
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| app.ui(f)).unwrap();

        type_str(&mut app, "zzz");
        terminal.draw(|f| app.ui(f)).unwrap();
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#4caf50"), Some(Color::Rgb(0x4c, 0xaf, 0x50)));
        assert_eq!(parse_hex_color("4caf50"), None);
        assert_eq!(parse_hex_color("#fff"), None);
        assert_eq!(parse_hex_color("#zzzzzz"), None);
    }
}
