use std::io::{self, Write};

use crate::config::HostRecord;
use crate::input::SearchInput;
use crate::terminal::Terminal;

use ratatui::prelude::*;
use ratatui::widgets::*;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use unicode_width::UnicodeWidthStr;

use fuzzy_matcher::{skim::SkimMatcherV2, FuzzyMatcher};

const INFO_TEXT_NORMAL_MODE: &str =
    "(Esc/q) quit | (↑) move up | (↓) move down | (Enter) connect | (/) search";
const INFO_TEXT_SEARCH_MODE: &str =
    "(Esc) leave search | (↑) move up | (↓) move down | (Enter) connect";
const SEARCH_PROMPT: &str = "/ ";
const QUIT_LABEL: &str = "Quit";
const QUIT_HINT: &str = "Press to exit";

/// What the operator picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// Index into the host list passed to the selector.
    Chosen(usize),
    Quit,
}

enum Mode {
    Normal,
    Search,
}

/// A host row currently on screen, with the characters matched by the search.
struct Entry {
    index: usize,
    host_hits: Vec<usize>,
    description_hits: Vec<usize>,
}

impl Entry {
    fn plain(index: usize) -> Self {
        Self {
            index,
            host_hits: Vec::new(),
            description_hits: Vec::new(),
        }
    }
}

/// Host table followed by a synthetic "Quit" row.
pub struct SelectBox<'a> {
    hosts: &'a [HostRecord],
    entries: Vec<Entry>,
    state: TableState,
    host_width: u16,
    port_width: u16,
    search: SearchInput,
    mode: Mode,
}

impl<'a> SelectBox<'a> {
    pub fn new(hosts: &'a [HostRecord]) -> Self {
        let host_width = hosts
            .iter()
            .map(|h| UnicodeWidthStr::width(h.host.as_str()))
            .chain([QUIT_LABEL.len(), "Host".len()])
            .max()
            .unwrap_or(0) as u16;
        let port_width = hosts
            .iter()
            .map(|h| h.port.to_string().len())
            .chain(["Port".len()])
            .max()
            .unwrap_or(0) as u16;

        Self {
            hosts,
            entries: (0..hosts.len()).map(Entry::plain).collect(),
            state: TableState::default().with_selected(Some(0)),
            host_width,
            port_width,
            search: SearchInput::new(SEARCH_PROMPT),
            mode: Mode::Normal,
        }
    }

    /// Block until a row is activated.
    pub fn select(&mut self, terminal: &mut Terminal<impl Write>) -> io::Result<SelectionOutcome> {
        loop {
            terminal.draw(|frame| self.ui(frame))?;
            if let Event::Key(key) = event::read()? {
                if let Some(outcome) = self.handle_key(key) {
                    terminal.clear()?;
                    return Ok(outcome);
                }
            }
        }
    }

    /// Apply one key press; returns the outcome once a row is activated.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<SelectionOutcome> {
        if key.kind == KeyEventKind::Release {
            return None;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(SelectionOutcome::Quit);
        }

        match key.code {
            KeyCode::Up => self.up(),
            KeyCode::Down => self.down(),
            KeyCode::Enter => return Some(self.activate()),
            _ => match self.mode {
                Mode::Normal => match key.code {
                    KeyCode::Esc | KeyCode::Char('q') => return Some(SelectionOutcome::Quit),
                    KeyCode::Char('/') => {
                        self.mode = Mode::Search;
                        self.search.clear();
                    }
                    KeyCode::Home => self.state.select(Some(0)),
                    KeyCode::End => self.state.select(Some(self.row_count() - 1)),
                    _ => {}
                },
                Mode::Search => match key.code {
                    KeyCode::Esc => {
                        self.mode = Mode::Normal;
                        self.search.clear();
                        self.refilter();
                    }
                    _ => {
                        if self.search.handle_key(key) {
                            self.refilter();
                        }
                    }
                },
            },
        }
        None
    }

    // host rows plus the quit row
    fn row_count(&self) -> usize {
        self.entries.len() + 1
    }

    fn activate(&self) -> SelectionOutcome {
        match self.state.selected().and_then(|i| self.entries.get(i)) {
            Some(entry) => SelectionOutcome::Chosen(entry.index),
            None => SelectionOutcome::Quit,
        }
    }

    fn up(&mut self) {
        let i = match self.state.selected() {
            Some(0) | None => self.row_count() - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    fn down(&mut self) {
        let i = match self.state.selected() {
            Some(i) if i + 1 < self.row_count() => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    fn refilter(&mut self) {
        let pattern = self.search.pattern();
        self.entries = if pattern.is_empty() {
            (0..self.hosts.len()).map(Entry::plain).collect()
        } else {
            let matcher = SkimMatcherV2::default();
            self.hosts
                .iter()
                .enumerate()
                .filter_map(|(index, host)| {
                    let host_hits = matcher.fuzzy_indices(&host.host, pattern);
                    let description_hits = matcher.fuzzy_indices(&host.description, pattern);
                    if host_hits.is_none() && description_hits.is_none() {
                        return None;
                    }
                    Some(Entry {
                        index,
                        host_hits: host_hits.map(|(_, hits)| hits).unwrap_or_default(),
                        description_hits: description_hits
                            .map(|(_, hits)| hits)
                            .unwrap_or_default(),
                    })
                })
                .collect()
        };
        self.state.select(Some(0));
    }

    pub(crate) fn ui(&mut self, f: &mut Frame) {
        let header = Row::new(vec![
            Cell::from("Host").style(Style::default().add_modifier(Modifier::UNDERLINED)),
            Cell::from("Port").style(Style::default().add_modifier(Modifier::UNDERLINED)),
            Cell::from("Description").style(Style::default().add_modifier(Modifier::UNDERLINED)),
        ])
        .style(Style::default().add_modifier(Modifier::BOLD));

        let mut rows: Vec<_> = self
            .entries
            .iter()
            .map(|entry| {
                let host = &self.hosts[entry.index];
                Row::new(vec![
                    Cell::from(Line::from(highlight_spans(&host.host, &entry.host_hits))),
                    Cell::from(host.port.to_string()),
                    Cell::from(Line::from(highlight_spans(
                        &host.description,
                        &entry.description_hits,
                    ))),
                ])
            })
            .collect();
        rows.push(
            Row::new(vec![
                Cell::from(QUIT_LABEL),
                Cell::from(""),
                Cell::from(QUIT_HINT),
            ])
            .style(Style::default().add_modifier(Modifier::DIM)),
        );

        let table = Table::new(
            rows,
            [
                Constraint::Length(self.host_width + 1),
                Constraint::Length(self.port_width + 1),
                Constraint::Min(0),
            ],
        )
        .header(header)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ")
        .highlight_spacing(HighlightSpacing::Always);

        match self.mode {
            Mode::Normal => {
                let recs = Layout::vertical([Constraint::Min(0), Constraint::Length(1)])
                    .split(f.size());

                f.render_stateful_widget(table, recs[0], &mut self.state);
                f.render_widget(
                    Paragraph::new(Line::from(INFO_TEXT_NORMAL_MODE)).centered(),
                    recs[1],
                );
            }
            Mode::Search => {
                let recs = Layout::vertical([
                    Constraint::Min(0),
                    Constraint::Length(3),
                    Constraint::Length(1),
                ])
                .split(f.size());

                let input = Paragraph::new(
                    Text::from(self.search.line()).style(Style::default().fg(Color::Cyan)),
                )
                .block(Block::default().borders(Borders::ALL));

                f.render_stateful_widget(table, recs[0], &mut self.state);
                f.render_widget(input, recs[1]);
                f.render_widget(
                    Paragraph::new(Line::from(INFO_TEXT_SEARCH_MODE)).centered(),
                    recs[2],
                );
                f.set_cursor(
                    recs[1].x + 1 + self.search.visual_cursor() as u16,
                    recs[1].y + 1,
                );
            }
        }
    }
}

fn highlight_spans<'b>(text: &str, hits: &[usize]) -> Vec<Span<'b>> {
    if hits.is_empty() {
        return vec![Span::raw(text.to_string())];
    }

    let highlight = Style::default()
        .fg(Color::Rgb(250, 0, 0))
        .bg(Color::Rgb(0xFF, 0xFC, 0x67))
        .add_modifier(Modifier::BOLD);

    let mut spans = Vec::new();
    let mut plain = String::new();
    for (i, c) in text.chars().enumerate() {
        if hits.contains(&i) {
            if !plain.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut plain)));
            }
            spans.push(Span::styled(c.to_string(), highlight));
        } else {
            plain.push(c);
        }
    }
    if !plain.is_empty() {
        spans.push(Span::raw(plain));
    }
    spans
}
