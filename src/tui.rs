use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Local;
use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::app::{App, ProgressEvent, ProgressSink};
use crate::domain::City;
use crate::fetch::RoundState;
use crate::geocode::Geocoder;
use crate::weather::WeatherClient;

const LOGS_MAX: usize = 200;
const TICK: Duration = Duration::from_millis(120);
const HINTS: &[&str] = &[
    "Tip: SPACE toggles a city, f fetches weather for the checked ones",
    "Tip: a / r add or remove checked cities from favorites",
    "Tip: v switches between all cities and favorites",
    "Tip: n adds a city by name, m checks a city by name",
    "Tip: F4 logs, ? help",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Cities,
    Logs,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputMode {
    Normal,
    AddCity,
    MarkCity,
}

impl InputMode {
    fn prompt(self) -> &'static str {
        match self {
            InputMode::Normal => "> ",
            InputMode::AddCity => "add city: ",
            InputMode::MarkCity => "mark city: ",
        }
    }
}

#[derive(Debug)]
struct AppState {
    status: String,
    warning: bool,
    logs: VecDeque<String>,
    hint_index: usize,
    last_hint_update: Instant,
}

impl AppState {
    fn set_status(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.warning = false;
        push_log(&mut self.logs, format!("[{}] {message}", timestamp()));
        self.status = message;
    }

    fn set_warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        push_log(&mut self.logs, format!("[{}] WARN {message}", timestamp()));
        self.status = message;
        self.warning = true;
    }
}

struct TuiProgress {
    state: Arc<Mutex<AppState>>,
}

impl ProgressSink for TuiProgress {
    fn event(&self, event: ProgressEvent) {
        if let Ok(mut state) = self.state.lock() {
            let message = event.message.trim();
            let message = match message.split_once(';') {
                Some((phase, rest)) if phase.starts_with("phase=") => rest.trim(),
                _ => message,
            };
            let message = match event.elapsed {
                Some(elapsed) => format!("{message} ({} ms)", elapsed.as_millis()),
                None => message.to_string(),
            };
            if message.starts_with("fetch failed") {
                state.set_warning(message);
            } else {
                state.set_status(message);
            }
        }
    }
}

// Restores the terminal even when drawing fails halfway.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> miette::Result<Self> {
        enable_raw_mode().into_diagnostic()?;
        io::stdout()
            .execute(EnterAlternateScreen)
            .into_diagnostic()?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = io::stdout().execute(LeaveAlternateScreen);
    }
}

pub struct Tui {
    state: Arc<Mutex<AppState>>,
    view: View,
    input_mode: InputMode,
    input: String,
    cursor: usize,
    log_scroll: u16,
}

impl Default for Tui {
    fn default() -> Self {
        Self::new()
    }
}

impl Tui {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(AppState {
                status: "ready".to_string(),
                warning: false,
                logs: VecDeque::new(),
                hint_index: 0,
                last_hint_update: Instant::now(),
            })),
            view: View::Cities,
            input_mode: InputMode::Normal,
            input: String::new(),
            cursor: 0,
            log_scroll: 0,
        }
    }

    pub fn run<G, W>(&mut self, app: &mut App<G, W>) -> miette::Result<()>
    where
        G: Geocoder,
        W: WeatherClient + 'static,
    {
        let _guard = TerminalGuard::enter()?;
        let backend = CrosstermBackend::new(io::stdout());
        let mut terminal = Terminal::new(backend).into_diagnostic()?;
        terminal.clear().into_diagnostic()?;

        let sink = TuiProgress {
            state: self.state.clone(),
        };
        if let Ok(mut state) = self.state.lock() {
            state.set_status(format!("{} favorites loaded", app.favorites().len()));
        }

        let mut tick = 0usize;
        loop {
            app.poll_round(&sink);
            self.rotate_hint();

            let cities = app.visible_cities();
            self.cursor = self.cursor.min(cities.len().saturating_sub(1));
            if let Ok(state) = self.state.lock() {
                terminal
                    .draw(|frame| draw_ui(frame, self, app, &cities, &state, tick))
                    .into_diagnostic()?;
            }

            if event::poll(TICK).into_diagnostic()? {
                if let Event::Key(key) = event::read().into_diagnostic()? {
                    if self.handle_key(key, app, &cities, &sink) {
                        break;
                    }
                }
            }

            tick = tick.wrapping_add(1);
        }
        Ok(())
    }

    fn handle_key<G, W>(
        &mut self,
        key: KeyEvent,
        app: &mut App<G, W>,
        cities: &[City],
        sink: &TuiProgress,
    ) -> bool
    where
        G: Geocoder,
        W: WeatherClient + 'static,
    {
        if key.kind != KeyEventKind::Press {
            return false;
        }
        if self.input_mode != InputMode::Normal {
            self.handle_input_key(key, app);
            return false;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                if self.view != View::Cities {
                    self.view = View::Cities;
                    return false;
                }
                return true;
            }
            KeyCode::F(1) | KeyCode::Char('?') => self.view = View::Help,
            KeyCode::F(4) => self.view = View::Logs,
            KeyCode::Up | KeyCode::Char('k') => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                if self.cursor + 1 < cities.len() {
                    self.cursor += 1;
                }
            }
            KeyCode::PageUp => self.scroll_logs(-5),
            KeyCode::PageDown => self.scroll_logs(5),
            KeyCode::Char(' ') => {
                if let Some(city) = cities.get(self.cursor) {
                    app.toggle_selected(&city.name);
                }
            }
            KeyCode::Char('f') => match app.fetch(sink) {
                Ok(0) => self.status("no cities checked"),
                Ok(_) => {}
                Err(err) => self.warn(err.to_string()),
            },
            KeyCode::Char('a') => match app.add_favorites() {
                Ok(added) => self.status(format!("{added} added to favorites")),
                Err(err) => self.warn(format!("favorites not saved: {err}")),
            },
            KeyCode::Char('r') => match app.remove_favorites() {
                Ok(removed) => self.status(format!("{removed} removed from favorites")),
                Err(err) => self.warn(format!("favorites not saved: {err}")),
            },
            KeyCode::Char('v') => {
                let favorites_only = app.toggle_favorites_only();
                self.cursor = 0;
                self.status(if favorites_only {
                    "showing favorites"
                } else {
                    "showing all cities"
                });
            }
            KeyCode::Char('n') => self.begin_input(InputMode::AddCity),
            KeyCode::Char('m') => self.begin_input(InputMode::MarkCity),
            _ => {}
        }
        false
    }

    fn handle_input_key<G, W>(&mut self, key: KeyEvent, app: &mut App<G, W>)
    where
        G: Geocoder,
        W: WeatherClient + 'static,
    {
        match key.code {
            KeyCode::Esc => {
                self.input.clear();
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Enter => {
                let value = self.input.trim().to_string();
                let mode = self.input_mode;
                self.input.clear();
                self.input_mode = InputMode::Normal;
                if value.is_empty() {
                    return;
                }
                match mode {
                    InputMode::AddCity => {
                        match app.add_city(&value) {
                            Ok(true) => self.status(format!("{value} added")),
                            Ok(false) => self.status(format!("{value} is already listed")),
                            Err(err) => self.warn(err.to_string()),
                        }
                    }
                    InputMode::MarkCity => {
                        if app.mark(&value) {
                            self.status(format!("{value} checked"));
                        } else {
                            self.warn(format!("no city named {value}"));
                        }
                    }
                    InputMode::Normal => {}
                }
            }
            KeyCode::Char(ch) => self.input.push(ch),
            _ => {}
        }
    }

    fn begin_input(&mut self, mode: InputMode) {
        self.input.clear();
        self.input_mode = mode;
    }

    fn status(&self, message: impl Into<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.set_status(message);
        }
    }

    fn warn(&self, message: impl Into<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.set_warning(message);
        }
    }

    fn rotate_hint(&self) {
        if let Ok(mut state) = self.state.lock() {
            if state.last_hint_update.elapsed() >= Duration::from_secs(5) {
                state.hint_index = (state.hint_index + 1) % HINTS.len().max(1);
                state.last_hint_update = Instant::now();
            }
        }
    }

    fn scroll_logs(&mut self, delta: i16) {
        let max = self.state.lock().map(|state| state.logs.len()).unwrap_or(0);
        let max_scroll = max.saturating_sub(1) as i16;
        let next = (self.log_scroll as i16 + delta).clamp(0, max_scroll);
        self.log_scroll = next as u16;
    }
}

fn draw_ui<G, W>(
    frame: &mut ratatui::Frame,
    tui: &Tui,
    app: &App<G, W>,
    cities: &[City],
    state: &AppState,
    tick: usize,
) where
    G: Geocoder,
    W: WeatherClient + 'static,
{
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(4),
        ])
        .split(frame.area());

    frame.render_widget(draw_header(app, tick), chunks[0]);

    match tui.view {
        View::Cities => {
            let main = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
                .split(chunks[1]);
            frame.render_widget(draw_city_list(tui, app, cities, main[0]), main[0]);
            frame.render_widget(draw_weather_panel(app), main[1]);
        }
        View::Logs => frame.render_widget(draw_logs(state, tui.log_scroll), chunks[1]),
        View::Help => frame.render_widget(draw_help(), chunks[1]),
    }

    draw_command_line(frame, tui, state, chunks[2]);
}

fn draw_header<G, W>(app: &App<G, W>, tick: usize) -> Paragraph<'static>
where
    G: Geocoder,
    W: WeatherClient + 'static,
{
    let mode = if app.favorites_only() {
        "FAVORITES"
    } else {
        "ALL CITIES"
    };
    let round = match app.round_state() {
        RoundState::Idle => Span::styled("idle", Style::default().fg(Color::Gray)),
        RoundState::InFlight { finished, launched } => {
            let spinner = ['|', '/', '-', '\\'][tick % 4];
            Span::styled(
                format!("{spinner} fetching {finished}/{launched}"),
                Style::default().fg(Color::Yellow),
            )
        }
    };
    Paragraph::new(Line::from(vec![
        Span::styled(
            format!("CITY-WEATHER :: {mode}   "),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        round,
    ]))
    .block(Block::default().borders(Borders::BOTTOM))
    .alignment(Alignment::Left)
}

fn draw_city_list<G, W>(
    tui: &Tui,
    app: &App<G, W>,
    cities: &[City],
    area: Rect,
) -> Paragraph<'static>
where
    G: Geocoder,
    W: WeatherClient + 'static,
{
    let lines: Vec<Line> = if cities.is_empty() {
        vec![Line::from(Span::styled(
            "no cities to show",
            Style::default().fg(Color::Gray),
        ))]
    } else {
        cities
            .iter()
            .enumerate()
            .map(|(index, city)| {
                let check = if city.selected { "[x]" } else { "[ ]" };
                let star = if app.is_favorite(&city.name) { "*" } else { " " };
                let style = if index == tui.cursor {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                Line::from(Span::styled(format!("{check} {star} {}", city.name), style))
            })
            .collect()
    };

    let visible = area.height.saturating_sub(2) as usize;
    let offset = (tui.cursor + 1).saturating_sub(visible.max(1)) as u16;
    Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Select cities"),
        )
        .scroll((offset, 0))
}

fn draw_weather_panel<G, W>(app: &App<G, W>) -> Paragraph<'static>
where
    G: Geocoder,
    W: WeatherClient + 'static,
{
    let label = Style::default().fg(Color::Gray);
    let mut lines = Vec::new();
    for entry in app.fetched() {
        let weather = entry.weather;
        lines.push(Line::from(Span::styled(
            format!("{}:", entry.city),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(vec![
            Span::styled("Weather: ", label),
            Span::raw(weather.description.clone()),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Temperature: ", label),
            Span::raw(format!("{:.2}°C", weather.temperature_celsius())),
            Span::styled("   Humidity: ", label),
            Span::raw(format!("{}%", weather.humidity)),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Wind Speed: ", label),
            Span::raw(format!("{:.2} m/s", weather.wind_speed)),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Sunrise: ", label),
            Span::raw(weather.sunrise_local()),
            Span::styled("   Sunset: ", label),
            Span::raw(weather.sunset_local()),
        ]));
        lines.push(Line::from(""));
    }
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "check cities and press f to fetch",
            label,
        )));
    }
    Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Weather"))
        .wrap(Wrap { trim: true })
}

fn draw_logs(state: &AppState, scroll: u16) -> Paragraph<'static> {
    let lines: Vec<Line> = state
        .logs
        .iter()
        .map(|line| Line::from(line.clone()))
        .collect();
    Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Logs"))
        .scroll((scroll, 0))
}

fn draw_help() -> Paragraph<'static> {
    let key = Style::default().fg(Color::Cyan);
    let rows = [
        ("Up/Down, j/k", "move"),
        ("SPACE", "check or uncheck city"),
        ("f", "fetch weather for checked cities"),
        ("a", "add checked cities to favorites"),
        ("r", "remove checked cities from favorites"),
        ("v", "toggle favorites-only view"),
        ("n", "add a new city by name"),
        ("m", "check a city by name"),
        ("F4", "logs (PageUp/PageDown to scroll)"),
        ("q / Esc", "back / quit"),
    ];
    let lines: Vec<Line> = rows
        .iter()
        .map(|(keys, action)| {
            Line::from(vec![
                Span::styled(format!("{keys:<14}"), key),
                Span::raw(*action),
            ])
        })
        .collect();
    Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Help"))
}

fn draw_command_line(frame: &mut ratatui::Frame, tui: &Tui, state: &AppState, area: Rect) {
    let status_style = if state.warning {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::Green)
    };
    let prompt = tui.input_mode.prompt();
    let input_line = if tui.input_mode == InputMode::Normal {
        Line::from(Span::styled(
            HINTS[state.hint_index % HINTS.len()],
            Style::default().fg(Color::Gray),
        ))
    } else {
        Line::from(vec![
            Span::styled(prompt, Style::default().fg(Color::Cyan)),
            Span::raw(tui.input.clone()),
        ])
    };
    let paragraph = Paragraph::new(vec![
        Line::from(Span::styled(state.status.clone(), status_style)),
        input_line,
    ])
    .block(Block::default().borders(Borders::TOP));
    frame.render_widget(paragraph, area);

    if tui.input_mode != InputMode::Normal {
        let x = area.x + (prompt.len() + tui.input.chars().count()) as u16;
        frame.set_cursor_position((x, area.y + 2));
    }
}

fn push_log(buffer: &mut VecDeque<String>, item: String) {
    buffer.push_back(item);
    while buffer.len() > LOGS_MAX {
        buffer.pop_front();
    }
}

fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}
