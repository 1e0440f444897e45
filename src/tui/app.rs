//! Main application logic for the terminal user interface.
//!
//! `App` owns the task store and the timer engine, dispatches key input by
//! mode, and renders whichever of the four views is active. All task
//! mutation flows through the store's API; the render functions only read.

use std::collections::BTreeMap;
use std::io;
use std::time::{Duration, Instant};

use chrono::{Datelike, Local, NaiveDate};
use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, Cell, Clear, List, ListItem, Paragraph, Row, Table, TableState, Wrap,
    },
    Frame, Terminal,
};

use crate::config::{AppConfig, View};
use crate::storage::FlushHandle;
use crate::store::{
    format_due_relative, format_timer, normalise_tag, parse_due_input, split_and_normalise_tags,
    Store,
};
use crate::task::Task;
use crate::timer::TimerEngine;
use crate::tui::colors::Palette;
use crate::tui::input::InputField;
use crate::tui::task_form::{TaskForm, FIELD_COUNT};

/// Input mode; `Normal` drives the views, the rest are modal overlays.
#[derive(Clone, Copy, PartialEq)]
enum Mode {
    Normal,
    AddTask,
    TagFilter,
    EditTags,
    EditDue,
    Preset,
    ConfirmDelete,
    Help,
}

/// Main application state for the terminal user interface.
pub struct App {
    store: Store,
    engine: TimerEngine,
    cfg: AppConfig,
    palette: Palette,
    flush: FlushHandle,
    view: View,
    mode: Mode,
    visible: Vec<String>,
    selected: usize,
    checklist_cursor: usize,
    tag_filter: Option<String>,
    filter_input: InputField,
    edit_input: InputField,
    preset_input: InputField,
    form: TaskForm,
    table_state: TableState,
    status_message: String,
}

impl App {
    pub fn new(store: Store, cfg: AppConfig, flush: FlushHandle, view: View) -> Self {
        let palette = Palette::from_theme(&cfg.theme);
        let mut app = App {
            store,
            engine: TimerEngine::new(Instant::now()),
            cfg,
            palette,
            flush,
            view,
            mode: Mode::Normal,
            visible: Vec::new(),
            selected: 0,
            checklist_cursor: 0,
            tag_filter: None,
            filter_input: InputField::new(),
            edit_input: InputField::new(),
            preset_input: InputField::new(),
            form: TaskForm::new(),
            table_state: TableState::default(),
            status_message: String::new(),
        };
        app.refresh_visible();
        app
    }

    /// Main event loop: tick timers, draw, then handle one input poll.
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            // Every frame redraws, so the changed-id set is not consulted.
            self.engine.tick(&mut self.store, Instant::now());
            terminal.draw(|f| self.render(f))?;
            if self.handle_input()? {
                break;
            }
        }
        Ok(())
    }

    fn refresh_visible(&mut self) {
        self.visible = self
            .store
            .filter_by_tag(self.tag_filter.as_deref())
            .map(|t| t.id.clone())
            .collect();
        if self.visible.is_empty() {
            self.selected = 0;
            self.table_state.select(None);
        } else {
            if self.selected >= self.visible.len() {
                self.selected = self.visible.len() - 1;
            }
            self.table_state.select(Some(self.selected));
        }
        let checklist_len = self.selected_task().map_or(0, |t| t.checklist.len());
        if self.checklist_cursor >= checklist_len {
            self.checklist_cursor = checklist_len.saturating_sub(1);
        }
    }

    fn selected_id(&self) -> Option<String> {
        self.visible.get(self.selected).cloned()
    }

    fn selected_task(&self) -> Option<&Task> {
        self.visible
            .get(self.selected)
            .and_then(|id| self.store.get(id))
    }

    // ---- input -----------------------------------------------------------

    /// Poll for and dispatch one key event. Returns true to quit.
    fn handle_input(&mut self) -> io::Result<bool> {
        if event::poll(Duration::from_millis(250))? {
            if let Event::Key(key) = event::read()? {
                self.status_message.clear();
                let should_quit = match self.mode {
                    Mode::Normal => self.handle_normal_input(key.code, key.modifiers)?,
                    Mode::AddTask => self.handle_form_input(key.code, key.modifiers)?,
                    Mode::TagFilter => self.handle_filter_input(key.code)?,
                    Mode::EditTags => self.handle_edit_tags_input(key.code)?,
                    Mode::EditDue => self.handle_edit_due_input(key.code)?,
                    Mode::Preset => self.handle_preset_input(key.code)?,
                    Mode::ConfirmDelete => self.handle_confirm_input(key.code)?,
                    Mode::Help => {
                        self.mode = Mode::Normal;
                        false
                    }
                };
                if should_quit {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn handle_normal_input(&mut self, key: KeyCode, modifiers: KeyModifiers) -> io::Result<bool> {
        match key {
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => return Ok(true),
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Tab => self.view = self.view.next(),
            KeyCode::BackTab => self.view = self.view.prev(),
            KeyCode::Char('d') => self.view = View::Details,
            KeyCode::Down | KeyCode::Char('j') => self.select_down(),
            KeyCode::Up | KeyCode::Char('k') => self.select_up(),
            KeyCode::Enter => {
                if self.selected_id().is_some() {
                    self.view = View::Details;
                }
            }
            KeyCode::Char(' ') => self.toggle_selected_checklist_item(),
            KeyCode::Char('a') => {
                self.form = TaskForm::new();
                self.mode = Mode::AddTask;
            }
            KeyCode::Char('s') => self.move_selected_next(),
            KeyCode::Char('c') => self.mark_selected_done(),
            KeyCode::Char('t') => self.toggle_selected_timer(),
            KeyCode::Char('r') => self.reset_selected_timer(),
            KeyCode::Char('p') => {
                if self.selected_id().is_some() {
                    self.preset_input.clear();
                    self.mode = Mode::Preset;
                }
            }
            KeyCode::Char('f') => {
                self.filter_input =
                    InputField::with_value(self.tag_filter.as_deref().unwrap_or(""));
                self.mode = Mode::TagFilter;
            }
            KeyCode::Char('e') => {
                if let Some(task) = self.selected_task() {
                    self.edit_input = InputField::with_value(&task.tags.join(", "));
                    self.mode = Mode::EditTags;
                }
            }
            KeyCode::Char('u') => {
                if let Some(task) = self.selected_task() {
                    let current = task.due.map(|d| d.to_string()).unwrap_or_default();
                    self.edit_input = InputField::with_value(&current);
                    self.mode = Mode::EditDue;
                }
            }
            KeyCode::Char('x') => {
                if self.selected_id().is_some() {
                    self.mode = Mode::ConfirmDelete;
                }
            }
            KeyCode::Char('?') => self.mode = Mode::Help,
            _ => {}
        }
        Ok(false)
    }

    fn handle_form_input(&mut self, key: KeyCode, modifiers: KeyModifiers) -> io::Result<bool> {
        match key {
            KeyCode::Esc => self.mode = Mode::Normal,
            KeyCode::Enter => self.submit_form(),
            KeyCode::Tab | KeyCode::Down => self.form.next_field(),
            KeyCode::BackTab | KeyCode::Up => self.form.prev_field(),
            KeyCode::Left => self.form.active_mut().move_cursor_left(),
            KeyCode::Right => self.form.active_mut().move_cursor_right(),
            KeyCode::Backspace if modifiers.contains(KeyModifiers::CONTROL) => {
                self.form.active_mut().clear()
            }
            KeyCode::Backspace => self.form.active_mut().handle_backspace(),
            KeyCode::Char(c) => self.form.active_mut().handle_char(c),
            _ => {}
        }
        Ok(false)
    }

    fn handle_filter_input(&mut self, key: KeyCode) -> io::Result<bool> {
        match key {
            KeyCode::Esc => self.mode = Mode::Normal,
            KeyCode::Enter => {
                let raw = self.filter_input.trimmed();
                self.tag_filter = if raw.is_empty() {
                    None
                } else {
                    Some(normalise_tag(raw))
                };
                self.refresh_visible();
                self.status_message = match &self.tag_filter {
                    Some(tag) => format!("filtering by #{tag}"),
                    None => "filter cleared".into(),
                };
                self.mode = Mode::Normal;
            }
            KeyCode::Backspace => self.filter_input.handle_backspace(),
            KeyCode::Left => self.filter_input.move_cursor_left(),
            KeyCode::Right => self.filter_input.move_cursor_right(),
            KeyCode::Char(c) => self.filter_input.handle_char(c),
            _ => {}
        }
        Ok(false)
    }

    fn handle_edit_tags_input(&mut self, key: KeyCode) -> io::Result<bool> {
        match key {
            KeyCode::Esc => self.mode = Mode::Normal,
            KeyCode::Enter => {
                if let Some(id) = self.selected_id() {
                    let tags = split_and_normalise_tags(&self.edit_input.value);
                    match self.store.set_tags(&id, tags) {
                        Ok(()) => {
                            self.status_message = "tags updated".into();
                            self.refresh_visible();
                        }
                        Err(e) => self.status_message = e.to_string(),
                    }
                }
                self.mode = Mode::Normal;
            }
            KeyCode::Backspace => self.edit_input.handle_backspace(),
            KeyCode::Left => self.edit_input.move_cursor_left(),
            KeyCode::Right => self.edit_input.move_cursor_right(),
            KeyCode::Char(c) => self.edit_input.handle_char(c),
            _ => {}
        }
        Ok(false)
    }

    fn handle_edit_due_input(&mut self, key: KeyCode) -> io::Result<bool> {
        match key {
            KeyCode::Esc => self.mode = Mode::Normal,
            KeyCode::Enter => {
                let Some(id) = self.selected_id() else {
                    self.mode = Mode::Normal;
                    return Ok(false);
                };
                let raw = self.edit_input.trimmed().to_string();
                if raw.is_empty() {
                    match self.store.set_due_date(&id, None) {
                        Ok(()) => self.status_message = "due date cleared".into(),
                        Err(e) => self.status_message = e.to_string(),
                    }
                    self.mode = Mode::Normal;
                } else if let Some(due) = parse_due_input(&raw) {
                    match self.store.set_due_date(&id, Some(due)) {
                        Ok(()) => self.status_message = format!("due {due}"),
                        Err(e) => self.status_message = e.to_string(),
                    }
                    self.mode = Mode::Normal;
                } else {
                    self.status_message =
                        "due date must be today, tomorrow, or YYYY-MM-DD".into();
                }
            }
            KeyCode::Backspace => self.edit_input.handle_backspace(),
            KeyCode::Left => self.edit_input.move_cursor_left(),
            KeyCode::Right => self.edit_input.move_cursor_right(),
            KeyCode::Char(c) => self.edit_input.handle_char(c),
            _ => {}
        }
        Ok(false)
    }

    fn handle_preset_input(&mut self, key: KeyCode) -> io::Result<bool> {
        match key {
            KeyCode::Esc => self.mode = Mode::Normal,
            KeyCode::Enter => self.apply_preset(),
            KeyCode::Backspace => self.preset_input.handle_backspace(),
            KeyCode::Char(c) if c.is_ascii_digit() => self.preset_input.handle_char(c),
            _ => {}
        }
        Ok(false)
    }

    fn handle_confirm_input(&mut self, key: KeyCode) -> io::Result<bool> {
        match key {
            KeyCode::Char('y') | KeyCode::Enter => {
                if let Some(id) = self.selected_id() {
                    match self.store.remove_task(&id) {
                        Ok(task) => {
                            self.status_message = format!("deleted \"{}\"", task.title);
                            self.refresh_visible();
                        }
                        Err(e) => self.status_message = e.to_string(),
                    }
                }
                self.mode = Mode::Normal;
            }
            KeyCode::Char('n') | KeyCode::Esc => self.mode = Mode::Normal,
            _ => {}
        }
        Ok(false)
    }

    // ---- actions ---------------------------------------------------------

    fn select_down(&mut self) {
        if self.view == View::Details {
            let len = self.selected_task().map_or(0, |t| t.checklist.len());
            if len > 0 && self.checklist_cursor + 1 < len {
                self.checklist_cursor += 1;
            }
            return;
        }
        if !self.visible.is_empty() && self.selected + 1 < self.visible.len() {
            self.selected += 1;
            self.table_state.select(Some(self.selected));
            self.checklist_cursor = 0;
        }
    }

    fn select_up(&mut self) {
        if self.view == View::Details {
            self.checklist_cursor = self.checklist_cursor.saturating_sub(1);
            return;
        }
        if self.selected > 0 {
            self.selected -= 1;
            self.table_state.select(Some(self.selected));
            self.checklist_cursor = 0;
        }
    }

    fn submit_form(&mut self) {
        let new = match self.form.to_new_task() {
            Ok(new) => new,
            Err(e) => {
                self.status_message = e.to_string();
                return;
            }
        };
        match self.store.add_task(new) {
            Ok(task) => {
                let id = task.id.clone();
                self.status_message = format!("added \"{}\"", task.title);
                self.refresh_visible();
                if let Some(pos) = self.visible.iter().position(|v| *v == id) {
                    self.selected = pos;
                    self.table_state.select(Some(pos));
                }
                self.mode = Mode::Normal;
            }
            Err(e) => self.status_message = e.to_string(),
        }
    }

    fn move_selected_next(&mut self) {
        let Some(id) = self.selected_id() else { return };
        match self.store.move_next(&id) {
            Ok(task) => {
                self.status_message = format!("status: {}", self.cfg.label_for(&task.status))
            }
            Err(e) => self.status_message = e.to_string(),
        }
    }

    fn mark_selected_done(&mut self) {
        let Some(id) = self.selected_id() else { return };
        match self.store.mark_done(&id) {
            Ok(task) => {
                self.status_message = format!("status: {}", self.cfg.label_for(&task.status))
            }
            Err(e) => self.status_message = e.to_string(),
        }
    }

    fn toggle_selected_timer(&mut self) {
        let Some(id) = self.selected_id() else { return };
        match self.store.start_pause_timer(&id) {
            Ok(true) => self.status_message = "timer running".into(),
            Ok(false) => {
                let spent = self
                    .store
                    .get(&id)
                    .map_or(false, |t| t.remaining_seconds == 0);
                self.status_message = if spent {
                    "timer at zero — press r to reset".into()
                } else {
                    "timer paused".into()
                };
            }
            Err(e) => self.status_message = e.to_string(),
        }
    }

    fn reset_selected_timer(&mut self) {
        let Some(id) = self.selected_id() else { return };
        match self.store.reset_timer(&id) {
            Ok(()) => self.status_message = "timer reset".into(),
            Err(e) => self.status_message = e.to_string(),
        }
    }

    fn toggle_selected_checklist_item(&mut self) {
        if self.view != View::Details {
            return;
        }
        let Some(id) = self.selected_id() else { return };
        if self
            .store
            .get(&id)
            .map_or(true, |t| t.checklist.is_empty())
        {
            return;
        }
        let index = self.checklist_cursor;
        match self.store.toggle_checklist_item(&id, index) {
            Ok(done) => {
                self.status_message = if done { "item checked" } else { "item unchecked" }.into()
            }
            Err(e) => self.status_message = e.to_string(),
        }
    }

    fn apply_preset(&mut self) {
        let Some(id) = self.selected_id() else {
            self.mode = Mode::Normal;
            return;
        };
        match self.preset_input.trimmed().parse::<u64>() {
            Ok(minutes) if minutes > 0 => match self.store.apply_timer_preset(&id, minutes) {
                Ok(()) => {
                    self.status_message = format!("countdown set to {minutes}m");
                    self.mode = Mode::Normal;
                }
                Err(e) => self.status_message = e.to_string(),
            },
            _ => self.status_message = "enter a positive number of minutes".into(),
        }
    }

    // ---- rendering -------------------------------------------------------

    fn render(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(2),
            ])
            .split(f.area());

        self.render_header(f, chunks[0]);
        match self.view {
            View::List => self.render_list(f, chunks[1]),
            View::Board => self.render_board(f, chunks[1]),
            View::Calendar => self.render_calendar(f, chunks[1]),
            View::Details => self.render_details(f, chunks[1]),
        }
        self.render_status_bar(f, chunks[2]);

        match self.mode {
            Mode::AddTask => self.render_form(f),
            Mode::TagFilter => self.render_filter(f),
            Mode::EditTags => self.render_edit(f, "Edit tags (comma separated)"),
            Mode::EditDue => {
                self.render_edit(f, "Edit due date (today, tomorrow, YYYY-MM-DD; blank clears)")
            }
            Mode::Preset => self.render_preset(f),
            Mode::ConfirmDelete => self.render_confirm(f),
            Mode::Help => self.render_help(f),
            Mode::Normal => {}
        }
    }

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let mut spans = vec![Span::styled(
            " taskdeck ",
            Style::default()
                .fg(self.palette.accent)
                .add_modifier(Modifier::BOLD),
        )];
        for view in [View::List, View::Board, View::Calendar, View::Details] {
            let style = if view == self.view {
                Style::default()
                    .fg(self.palette.primary)
                    .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
            } else {
                Style::default().fg(self.palette.muted)
            };
            spans.push(Span::styled(format!(" {} ", view.title()), style));
        }
        if let Some(tag) = &self.tag_filter {
            spans.push(Span::styled(
                format!("  filter: #{tag}"),
                Style::default()
                    .fg(self.palette.accent)
                    .add_modifier(Modifier::ITALIC),
            ));
        }
        f.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn render_list(&mut self, f: &mut Frame, area: Rect) {
        let today = Local::now().date_naive();
        let header = Row::new(
            ["Title", "Status", "Tags", "Due", "Timer"]
                .iter()
                .map(|h| Cell::from(*h).style(Style::default().add_modifier(Modifier::BOLD))),
        )
        .style(Style::default().bg(self.palette.muted).fg(self.palette.text))
        .height(1);

        let rows: Vec<Row> = self
            .visible
            .iter()
            .filter_map(|id| self.store.get(id))
            .map(|task| {
                let tags = if task.tags.is_empty() {
                    "-".to_string()
                } else {
                    task.tags.join(", ")
                };
                let timer = format!(
                    "{}{}",
                    format_timer(task.remaining_seconds),
                    if task.timer_running { " ▶" } else { "" }
                );
                Row::new(vec![
                    Cell::from(task.title.clone()),
                    Cell::from(self.cfg.label_for(&task.status)),
                    Cell::from(tags),
                    Cell::from(format_due_relative(task.due, today)),
                    Cell::from(timer),
                ])
            })
            .collect();

        let widths = [
            Constraint::Min(24),    // Title
            Constraint::Length(14), // Status
            Constraint::Length(20), // Tags
            Constraint::Length(10), // Due
            Constraint::Length(9),  // Timer
        ];

        let table = Table::new(rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title(format!(
                "Tasks ({}/{})",
                self.visible.len(),
                self.store.tasks().len()
            )))
            .row_highlight_style(
                Style::default()
                    .bg(self.palette.primary)
                    .fg(self.palette.background),
            )
            .highlight_symbol(">> ");

        f.render_stateful_widget(table, area, &mut self.table_state);
    }

    fn render_board(&self, f: &mut Frame, area: Rect) {
        let columns = self.store.columns();
        if columns.is_empty() {
            return;
        }
        let constraints: Vec<Constraint> = columns
            .iter()
            .map(|_| Constraint::Ratio(1, columns.len() as u32))
            .collect();
        let lanes = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(constraints)
            .split(area);

        let selected = self.selected_id();
        for (column, lane) in columns.iter().zip(lanes.iter()) {
            let tasks: Vec<&Task> = self
                .visible
                .iter()
                .filter_map(|id| self.store.get(id))
                .filter(|t| t.status == *column)
                .collect();

            let items: Vec<ListItem> = tasks
                .iter()
                .map(|task| {
                    let mut subtitle = Vec::new();
                    if !task.tags.is_empty() {
                        subtitle.push(task.tags.join(", "));
                    }
                    if let Some(due) = task.due {
                        subtitle.push(format!("due {due}"));
                    }
                    if task.timer_running {
                        subtitle.push(format!("{} ▶", format_timer(task.remaining_seconds)));
                    }
                    let is_selected = selected.as_deref() == Some(task.id.as_str());
                    let title_style = if is_selected {
                        Style::default()
                            .fg(self.palette.primary)
                            .add_modifier(Modifier::BOLD | Modifier::REVERSED)
                    } else {
                        Style::default()
                            .fg(self.palette.text)
                            .add_modifier(Modifier::BOLD)
                    };
                    let lines = vec![
                        Line::from(Span::styled(task.title.clone(), title_style)),
                        Line::from(Span::styled(
                            if subtitle.is_empty() {
                                "·".to_string()
                            } else {
                                subtitle.join(" · ")
                            },
                            Style::default().fg(self.palette.muted),
                        )),
                    ];
                    ListItem::new(lines)
                })
                .collect();

            let list = List::new(items).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(self.palette.muted))
                    .title(Span::styled(
                        format!("{} ({})", self.cfg.label_for(column), tasks.len()),
                        Style::default()
                            .fg(self.palette.primary)
                            .add_modifier(Modifier::BOLD),
                    )),
            );
            f.render_widget(list, *lane);
        }
    }

    fn render_calendar(&self, f: &mut Frame, area: Rect) {
        let today = Local::now().date_naive();
        let tasks: Vec<&Task> = self
            .visible
            .iter()
            .filter_map(|id| self.store.get(id))
            .collect();
        let lines: Vec<Line> = calendar_lines(&tasks, today)
            .into_iter()
            .map(Line::from)
            .collect();
        let calendar = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Calendar"))
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: false });
        f.render_widget(calendar, area);
    }

    fn render_details(&self, f: &mut Frame, area: Rect) {
        let Some(task) = self.selected_task() else {
            let empty = Paragraph::new("Select a task in the list or board view.")
                .block(Block::default().borders(Borders::ALL).title("Details"));
            f.render_widget(empty, area);
            return;
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(8), Constraint::Min(0)])
            .split(area);

        let tags = if task.tags.is_empty() {
            "no tags".to_string()
        } else {
            task.tags.join(", ")
        };
        let due = task
            .due
            .map(|d| d.to_string())
            .unwrap_or_else(|| "no due date".into());
        let timer_state = if task.timer_running { "running" } else { "paused" };
        let mut meta = vec![Line::from(Span::styled(
            task.title.clone(),
            Style::default()
                .fg(self.palette.primary)
                .add_modifier(Modifier::BOLD),
        ))];
        if let Some(description) = &task.description {
            meta.push(Line::from(description.clone()));
        }
        meta.push(Line::from(format!(
            "Status: {}",
            self.cfg.label_for(&task.status)
        )));
        meta.push(Line::from(format!("Tags: {tags}")));
        meta.push(Line::from(format!("Due: {due}")));
        meta.push(Line::from(format!(
            "Countdown: {} of {} ({timer_state})",
            format_timer(task.remaining_seconds),
            format_timer(task.countdown_seconds),
        )));

        let details = Paragraph::new(meta)
            .block(Block::default().borders(Borders::ALL).title("Details"))
            .wrap(Wrap { trim: false });
        f.render_widget(details, chunks[0]);

        let items: Vec<ListItem> = task
            .checklist
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let mark = if item.done { "[x]" } else { "[ ]" };
                let style = if i == self.checklist_cursor {
                    Style::default()
                        .fg(self.palette.background)
                        .bg(self.palette.primary)
                } else if item.done {
                    Style::default().fg(self.palette.muted)
                } else {
                    Style::default().fg(self.palette.text)
                };
                ListItem::new(Span::styled(format!("{mark} {}", item.label), style))
            })
            .collect();
        let checklist = List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .title("Checklist (space toggles)"),
        );
        f.render_widget(checklist, chunks[1]);
    }

    fn render_status_bar(&self, f: &mut Frame, area: Rect) {
        let hints = "a add  s move  c done  t timer  r reset  p preset  e tags  u due  f filter  x delete  Tab views  ? help  q quit";
        let message = match self.flush.last_error() {
            Some(err) => Span::styled(
                format!("write failed: {err} (will retry)"),
                Style::default()
                    .fg(self.palette.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            None => Span::styled(
                self.status_message.clone(),
                Style::default().fg(self.palette.text),
            ),
        };
        let lines = vec![
            Line::from(Span::styled(hints, Style::default().fg(self.palette.muted))),
            Line::from(message),
        ];
        f.render_widget(Paragraph::new(lines), area);
    }

    fn render_form(&self, f: &mut Frame) {
        let area = centered_rect(64, 80, f.area());
        f.render_widget(Clear, area);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.palette.accent))
            .title("New Task  (Enter save, Esc cancel, Tab next field)");
        let inner = block.inner(area);
        f.render_widget(block, area);

        let mut constraints = vec![Constraint::Length(3); FIELD_COUNT];
        constraints.push(Constraint::Min(0));
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(inner);

        for index in 0..FIELD_COUNT {
            let field = self.form.field(index);
            let active = index == self.form.current_field;
            let border_style = if active {
                Style::default().fg(self.palette.primary)
            } else {
                Style::default().fg(self.palette.muted)
            };
            let mut label = TaskForm::field_label(index).to_string();
            if index == FIELD_COUNT - 1 {
                label = format!(
                    "{label} (default {}, presets: {})",
                    self.cfg.default_timer_minutes,
                    self.cfg
                        .timer_presets
                        .iter()
                        .map(|m| m.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
            let widget = Paragraph::new(field.value.clone()).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(border_style)
                    .title(label),
            );
            f.render_widget(widget, rows[index]);
            if active {
                let col = field.value[..field.cursor].chars().count() as u16;
                f.set_cursor_position((rows[index].x + 1 + col, rows[index].y + 1));
            }
        }
    }

    fn render_filter(&self, f: &mut Frame) {
        let area = centered_rect(40, 20, f.area());
        f.render_widget(Clear, area);
        let widget = Paragraph::new(self.filter_input.value.clone()).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.palette.accent))
                .title("Filter by tag (blank clears, Esc cancels)"),
        );
        f.render_widget(widget, area);
    }

    fn render_edit(&self, f: &mut Frame, title: &str) {
        let area = centered_rect(50, 20, f.area());
        f.render_widget(Clear, area);
        let widget = Paragraph::new(self.edit_input.value.clone()).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.palette.accent))
                .title(title.to_string()),
        );
        f.render_widget(widget, area);
    }

    fn render_preset(&self, f: &mut Frame) {
        let area = centered_rect(44, 24, f.area());
        f.render_widget(Clear, area);
        let presets = self
            .cfg
            .timer_presets
            .iter()
            .map(|m| format!("{m}m"))
            .collect::<Vec<_>>()
            .join("  ");
        let lines = vec![
            Line::from(self.preset_input.value.clone()),
            Line::from(Span::styled(
                format!("presets: {presets}"),
                Style::default().fg(self.palette.muted),
            )),
        ];
        let widget = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.palette.accent))
                .title("Countdown minutes (Enter applies)"),
        );
        f.render_widget(widget, area);
    }

    fn render_confirm(&self, f: &mut Frame) {
        let title = self
            .selected_task()
            .map(|t| t.title.clone())
            .unwrap_or_default();
        let area = centered_rect(50, 20, f.area());
        f.render_widget(Clear, area);
        let widget = Paragraph::new(format!("Delete \"{title}\"?  y / n"))
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(self.palette.accent))
                    .title("Confirm"),
            );
        f.render_widget(widget, area);
    }

    fn render_help(&self, f: &mut Frame) {
        let area = centered_rect(60, 70, f.area());
        f.render_widget(Clear, area);
        let rows = [
            ("Tab / Shift-Tab", "cycle views (List, Board, Calendar, Details)"),
            ("j / k, arrows", "select task, or checklist item in Details"),
            ("Enter / d", "open details for the selected task"),
            ("a", "add a task"),
            ("s", "move task to the next column"),
            ("c", "mark task done"),
            ("Space", "toggle checklist item (Details view)"),
            ("t", "start or pause the countdown"),
            ("r", "reset the countdown"),
            ("p", "apply a countdown preset"),
            ("e", "edit tags"),
            ("u", "edit due date"),
            ("f", "filter by tag"),
            ("x", "delete the selected task"),
            ("q", "quit"),
        ];
        let mut lines: Vec<Line> = rows
            .iter()
            .map(|(key, what)| {
                Line::from(vec![
                    Span::styled(
                        format!("{key:<16}"),
                        Style::default()
                            .fg(self.palette.primary)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(*what),
                ])
            })
            .collect();
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "press any key to close",
            Style::default().fg(self.palette.muted),
        )));
        let widget = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.palette.accent))
                .title("Help"),
        );
        f.render_widget(widget, area);
    }
}

/// Render the month containing `reference` as plain text lines, marking
/// days with due tasks and listing them underneath.
fn calendar_lines(tasks: &[&Task], reference: NaiveDate) -> Vec<String> {
    let year = reference.year();
    let month = reference.month();
    let lead = NaiveDate::from_ymd_opt(year, month, 1)
        .map(|first| first.weekday().num_days_from_monday() as usize)
        .unwrap_or(0);

    let mut due_days: BTreeMap<u32, Vec<&Task>> = BTreeMap::new();
    for task in tasks {
        if let Some(due) = task.due {
            if due.year() == year && due.month() == month {
                due_days.entry(due.day()).or_default().push(task);
            }
        }
    }

    let mut lines = vec![
        format!("{:^27}", reference.format("%B %Y").to_string()),
        "Mo Tu We Th Fr Sa Su".to_string(),
    ];
    let mut cells: Vec<String> = vec!["   ".to_string(); lead];
    for day in 1..=days_in_month(year, month) {
        let marker = if due_days.contains_key(&day) { '●' } else { ' ' };
        cells.push(format!("{day:2}{marker}"));
    }
    for week in cells.chunks(7) {
        lines.push(week.join(" ").trim_end().to_string());
    }

    lines.push(String::new());
    lines.push("Due this month:".to_string());
    for (day, due) in &due_days {
        for task in due {
            let tags = if task.tags.is_empty() {
                "no tags".to_string()
            } else {
                task.tags.join(", ")
            };
            lines.push(format!("{day:02} {} [{tags}]", task.title));
        }
    }
    lines
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(30)
}

/// Center a percentage-sized rect inside `r`.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NewTask, Snapshot};
    use tempfile::tempdir;

    fn store_with(titles_and_tags: &[(&str, &[&str])]) -> Store {
        let mut store = Store::new(
            Snapshot::new(Vec::new()),
            vec!["backlog".into(), "in_progress".into(), "done".into()],
            25,
            FlushHandle::detached(),
        );
        for (title, tags) in titles_and_tags {
            store
                .add_task(NewTask {
                    title: title.to_string(),
                    tags: tags.iter().map(|t| t.to_string()).collect(),
                    ..NewTask::default()
                })
                .unwrap();
        }
        store
    }

    #[test]
    fn calendar_marks_due_tasks_in_reference_month_only() {
        let reference = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let mut due_soon = Task::new("due soon".into(), "backlog".into(), 60);
        due_soon.due = NaiveDate::from_ymd_opt(2024, 5, 15);
        let mut other_month = Task::new("other month".into(), "backlog".into(), 60);
        other_month.due = NaiveDate::from_ymd_opt(2024, 6, 2);

        let tasks = vec![&due_soon, &other_month];
        let rendered = calendar_lines(&tasks, reference).join("\n");
        assert!(rendered.contains("15●"));
        assert!(rendered.contains("15 due soon"));
        assert!(!rendered.contains("other month"));
    }

    #[test]
    fn calendar_grid_starts_on_the_right_weekday() {
        // 2024-05-01 is a Wednesday: two leading blanks on the first row.
        let reference = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let lines = calendar_lines(&[], reference);
        assert_eq!(lines[1], "Mo Tu We Th Fr Sa Su");
        assert!(lines[2].starts_with("         1"));
    }

    #[test]
    fn app_respects_tag_filter_for_visible_tasks() {
        let dir = tempdir().unwrap();
        let store = store_with(&[("work item", &["work"]), ("home item", &["home"])]);
        let cfg = AppConfig::defaults(dir.path());
        let mut app = App::new(store, cfg, FlushHandle::detached(), View::List);
        assert_eq!(app.visible.len(), 2);

        app.tag_filter = Some("work".into());
        app.refresh_visible();
        assert_eq!(app.visible.len(), 1);
        assert_eq!(app.selected_task().unwrap().title, "work item");
    }

    #[test]
    fn selection_clamps_when_tasks_disappear() {
        let dir = tempdir().unwrap();
        let store = store_with(&[("first", &[]), ("second", &[])]);
        let cfg = AppConfig::defaults(dir.path());
        let mut app = App::new(store, cfg, FlushHandle::detached(), View::List);
        app.select_down();
        assert_eq!(app.selected, 1);

        let id = app.selected_id().unwrap();
        app.store.remove_task(&id).unwrap();
        app.refresh_visible();
        assert_eq!(app.selected, 0);
        assert_eq!(app.selected_task().unwrap().title, "first");
    }

    #[test]
    fn days_in_month_handles_leap_years() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2025, 2), 28);
        assert_eq!(days_in_month(2026, 12), 31);
    }
}
