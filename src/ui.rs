use std::sync::mpsc::Receiver;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode};
use ratatui::{
    backend::CrosstermBackend, Terminal,
    layout::{Layout, Constraint, Direction},
    widgets::{Block, Borders, Paragraph, Wrap, Clear},
    style::{Style, Color, Modifier},
    text::{Span, Line},
};
use unicode_width::UnicodeWidthStr;

use crate::analyzer::Analysis;

pub enum UiEvent {
    Analysis(Analysis),
    Failure(String),
    Status(String),
}

#[derive(Clone, Copy)]
pub enum MessageOrigin {
    UserInput,
    Explanation,
    Solution,
    Code,
    Pro,
    Con,
    Failure,
    Status,
}

pub struct Message {
    pub text: String,
    pub origin: MessageOrigin,
}

struct UiState {
    input: String,
    messages: Vec<Message>,
    pending: u32,
    scroll: u16,
}

impl UiState {
    fn new() -> Self {
        Self {
            input: String::new(),
            messages: vec![Message {
                text: "paste an error and press Enter — :history lists past analyses, :clear wipes them".into(),
                origin: MessageOrigin::Status,
            }],
            pending: 0,
            scroll: 0,
        }
    }
}

fn origin_style(origin: MessageOrigin) -> Style {
    match origin {
        MessageOrigin::UserInput => Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        MessageOrigin::Explanation => Style::default().fg(Color::White),
        MessageOrigin::Solution => Style::default().fg(Color::Cyan),
        MessageOrigin::Code => Style::default().fg(Color::Green),
        MessageOrigin::Pro => Style::default().fg(Color::Green),
        MessageOrigin::Con => Style::default().fg(Color::Red),
        MessageOrigin::Failure => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        MessageOrigin::Status => Style::default().fg(Color::DarkGray),
    }
}

/// Flatten an analysis into styled dialog lines.
fn analysis_messages(analysis: &Analysis) -> Vec<Message> {
    let mut out = vec![Message {
        text: analysis.explanation.clone(),
        origin: MessageOrigin::Explanation,
    }];
    if !analysis.solutions.is_empty() {
        out.push(Message { text: "how to fix it:".into(), origin: MessageOrigin::Status });
        for (i, step) in analysis.solutions.iter().enumerate() {
            out.push(Message {
                text: format!("{}. {}", i + 1, step),
                origin: MessageOrigin::Solution,
            });
        }
    }
    if let Some(fix) = &analysis.fix {
        out.push(Message { text: "suggested fix:".into(), origin: MessageOrigin::Status });
        for line in fix.code.lines() {
            out.push(Message { text: format!("    {line}"), origin: MessageOrigin::Code });
        }
        for pro in &fix.pros {
            out.push(Message { text: format!("  + {pro}"), origin: MessageOrigin::Pro });
        }
        for con in &fix.cons {
            out.push(Message { text: format!("  - {con}"), origin: MessageOrigin::Con });
        }
    }
    out
}

fn line_display_rows(line: &Line<'_>, available_width: u16) -> u16 {
    let mut width = 0usize;
    for span in &line.spans {
        width += span.content.width();
    }
    let aw = available_width.max(1) as usize;
    let rows = if width == 0 { 1 } else { (width + aw - 1) / aw };
    rows as u16
}

pub fn run_loop<F>(rx: Receiver<UiEvent>, mut on_submit: F) -> anyhow::Result<()>
where
    // Returns true when the submission started an analyze request, so the
    // spinner only runs while one is actually in flight.
    F: FnMut(String) -> bool + Send + 'static,
{
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut state = UiState::new();
    let mut frame = 0u64;

    loop {
        // 1) Pull any backend replies (non-blocking) and update state
        while let Ok(ev) = rx.try_recv() {
            match ev {
                UiEvent::Analysis(analysis) => {
                    state.pending = state.pending.saturating_sub(1);
                    state.messages.extend(analysis_messages(&analysis));
                }
                UiEvent::Failure(text) => {
                    state.pending = state.pending.saturating_sub(1);
                    state.messages.push(Message { text, origin: MessageOrigin::Failure });
                }
                UiEvent::Status(text) => {
                    state.messages.push(Message { text, origin: MessageOrigin::Status });
                }
            }
        }

        // 2) Draw UI
        terminal.draw(|f| {
            let size = f.size();
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(3), Constraint::Min(3), Constraint::Length(3)])
                .split(size);

            let header = Paragraph::new(Line::from(vec![
                Span::styled(" errsight ", Style::default().fg(Color::Cyan)),
                Span::raw("— paste an error, get an explanation "),
            ]))
            .block(Block::default().borders(Borders::ALL));
            f.render_widget(header, chunks[0]);

            let mut lines: Vec<Line> = state
                .messages
                .iter()
                .map(|m| Line::from(Span::styled(m.text.clone(), origin_style(m.origin))))
                .collect();
            if state.pending > 0 {
                let dots = ["·  ", "·· ", "···"][(frame as usize / 10) % 3];
                lines.push(Line::from(Span::styled(
                    format!("analyzing {}", dots),
                    Style::default().fg(Color::DarkGray),
                )));
            }

            // Bottom-anchored scrolling across the buffer based on wrapped rows
            let available_width = chunks[1].width.saturating_sub(2);
            let mut total_rows: u16 = 0;
            for line in &lines {
                total_rows = total_rows.saturating_add(line_display_rows(line, available_width));
            }
            let content_height = chunks[1].height.saturating_sub(2);
            let base_from_top = total_rows.saturating_sub(content_height);
            let clamped_scroll = state.scroll.min(base_from_top);
            let effective_from_top = base_from_top.saturating_sub(clamped_scroll);

            let dialog = Paragraph::new(lines)
                .wrap(Wrap { trim: true })
                .scroll((effective_from_top, 0))
                .block(Block::default().borders(Borders::ALL).title("analysis"));
            f.render_widget(dialog, chunks[1]);

            let prompt = "> ";
            let input = Paragraph::new(format!("{prompt}{}", state.input))
                .block(Block::default().borders(Borders::ALL).title("error text"));
            f.render_widget(Clear, chunks[2]);
            f.render_widget(input, chunks[2]);

            let x = chunks[2].x + (prompt.len() as u16) + (state.input.chars().count() as u16);
            let y = chunks[2].y + 1;
            f.set_cursor(x, y);
        })?;

        frame += 1;

        // 3) Handle keys
        if crossterm::event::poll(Duration::from_millis(33))? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char(c) => state.input.push(c),
                    KeyCode::Backspace => {
                        state.input.pop();
                    }
                    KeyCode::Enter => {
                        let line = std::mem::take(&mut state.input);
                        if line.trim().is_empty() {
                            continue;
                        }
                        state.messages.push(Message {
                            text: format!("> {}", line),
                            origin: MessageOrigin::UserInput,
                        });
                        state.scroll = 0;
                        if on_submit(line) {
                            state.pending = state.pending.saturating_add(1);
                        }
                    }
                    KeyCode::Esc => break,
                    KeyCode::Up => state.scroll = state.scroll.saturating_add(1),
                    KeyCode::Down => state.scroll = state.scroll.saturating_sub(1),
                    KeyCode::PageUp => state.scroll = state.scroll.saturating_add(5),
                    KeyCode::PageDown => state.scroll = state.scroll.saturating_sub(5),
                    _ => {}
                }
            }
        }
    }

    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), crossterm::terminal::LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
