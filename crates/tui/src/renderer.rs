use std::io::stdout;

use anyhow::Result;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
        MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Borders},
};
use steplink_protocol::{Point, RenderCommand, TextAlign, ThemeToken};

use crate::shell::{Metrics, Shell};

fn theme_to_color(token: ThemeToken) -> Color {
    match token {
        ThemeToken::Background => Color::Black,
        ThemeToken::RowStripe => Color::Rgb(20, 20, 20),
        ThemeToken::StepBar => Color::Rgb(91, 141, 239),
        ThemeToken::StepBarReadOnly => Color::Gray,
        ThemeToken::StepBarBorder => Color::LightBlue,
        ThemeToken::SubStepBar => Color::Rgb(157, 188, 247),
        ThemeToken::StepLabel => Color::White,
        ThemeToken::ArrowLine => Color::Gray,
        ThemeToken::ArrowLineReadOnly => Color::DarkGray,
        ThemeToken::ArrowHandle => Color::Yellow,
        ThemeToken::ArrowDragPreview => Color::LightRed,
        ThemeToken::TextPrimary => Color::White,
        ThemeToken::TextMuted => Color::DarkGray,
    }
}

/// Write one character at viewport coordinates, clipped to `area`.
fn put(buf: &mut Buffer, area: Rect, x: f64, y: f64, ch: char, fg: Color) {
    if x < 0.0 || y < 0.0 {
        return;
    }
    let (col, row) = (x as u16, y as u16);
    if col >= area.width || row >= area.height {
        return;
    }
    buf[(area.x + col, area.y + row)].set_char(ch).set_fg(fg);
}

fn draw_rect(buf: &mut Buffer, area: Rect, rect: &steplink_protocol::Rect, fg: Color, label: &str) {
    let width = rect.w.round().max(1.0) as usize;
    let display: Vec<char> = if width >= label.chars().count() + 2 {
        format!(" {label:<w$}", w = width.saturating_sub(1)).chars().collect()
    } else {
        "█".repeat(width).chars().collect()
    };
    for (i, ch) in display.into_iter().take(width).enumerate() {
        put(buf, area, rect.x + i as f64, rect.y, ch, fg);
    }
}

/// Rasterize a polyline onto cells. Orthogonal runs use box-drawing
/// characters; anything diagonal is dotted.
fn draw_polyline(buf: &mut Buffer, area: Rect, points: &[Point], fg: Color, head: bool) {
    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as usize;
        let ch = if dy.abs() < 0.5 {
            '─'
        } else if dx.abs() < 0.5 {
            '│'
        } else {
            '·'
        };
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            put(buf, area, a.x + dx * t, a.y + dy * t, ch, fg);
        }
    }
    if head && let [.., from, to] = points {
        let ch = if (to.x - from.x).abs() >= (to.y - from.y).abs() {
            if to.x >= from.x { '▶' } else { '◀' }
        } else if to.y >= from.y {
            '▼'
        } else {
            '▲'
        };
        put(buf, area, to.x, to.y, ch, fg);
    }
}

fn draw_text(buf: &mut Buffer, area: Rect, position: Point, text: &str, align: TextAlign, fg: Color) {
    let len = text.chars().count() as f64;
    let start = match align {
        TextAlign::Left => position.x,
        TextAlign::Center => position.x - len / 2.0,
        TextAlign::Right => position.x - len,
    };
    for (i, ch) in text.chars().enumerate() {
        put(buf, area, start + i as f64, position.y, ch, fg);
    }
}

fn draw_commands(buf: &mut Buffer, area: Rect, cmds: &[RenderCommand]) {
    for cmd in cmds {
        match cmd {
            RenderCommand::DrawRect {
                rect, color, label, ..
            } => draw_rect(buf, area, rect, theme_to_color(*color), label.as_deref().unwrap_or("")),
            RenderCommand::DrawPolyline {
                points,
                color,
                head,
                ..
            } => draw_polyline(buf, area, points, theme_to_color(*color), *head),
            RenderCommand::DrawHandle { center, color, .. } => {
                put(buf, area, center.x, center.y, '●', theme_to_color(*color));
            }
            RenderCommand::DrawText {
                position,
                text,
                color,
                align,
                ..
            } => draw_text(buf, area, *position, text, *align, theme_to_color(*color)),
            RenderCommand::BeginGroup { .. } | RenderCommand::EndGroup => {}
        }
    }
}

pub fn run_tui(shell: &mut Shell) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut laid_out_for = None;

    loop {
        let term_size = terminal.size()?;
        let width = f64::from(term_size.width);
        let height = f64::from(term_size.height.saturating_sub(2));
        if laid_out_for != Some(term_size.width) {
            shell.lay_out(width, Metrics::CELLS);
            laid_out_for = Some(term_size.width);
        }
        let cmds = shell.commands(width, height);

        terminal.draw(|frame| {
            let area = frame.area();

            // Header
            let header_area = Rect::new(0, 0, area.width, 1);
            let header = Block::default()
                .title(format!(
                    " steplink: {} steps, {} arrows | drag handles to relink | ↑↓ select | r read-only | q quit ",
                    shell.rows().len(),
                    shell.arrow_count(),
                ))
                .style(Style::default().fg(Color::White).bg(Color::DarkGray));
            frame.render_widget(header, header_area);

            let content_area = Rect::new(0, 1, area.width, area.height.saturating_sub(2));
            let block = Block::default()
                .borders(Borders::NONE)
                .style(Style::default().bg(Color::Black));
            frame.render_widget(block, content_area);

            let selected_row = shell.selected() as f64 * Metrics::CELLS.row_pitch;
            put(frame.buffer_mut(), content_area, 0.0, selected_row, '›', Color::Yellow);
            draw_commands(frame.buffer_mut(), content_area, &cmds);

            let status_area = Rect::new(0, area.height.saturating_sub(1), area.width, 1);
            let status = Block::default()
                .title(match shell.controller().dragging() {
                    Some(owner) => format!(" relinking {owner}: drop on a step, Esc cancels "),
                    None => format!(" {} ", shell.status()),
                })
                .style(Style::default().fg(Color::Gray).bg(Color::Black));
            frame.render_widget(status, status_area);
        })?;

        // Handle input
        if event::poll(std::time::Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('q') => break,
                    KeyCode::Esc => shell.cancel_drag(),
                    KeyCode::Up => shell.select_prev(),
                    KeyCode::Down => shell.select_next(),
                    KeyCode::Char('r') => shell.toggle_read_only(),
                    _ => {}
                },
                Event::Mouse(mouse) => {
                    // Cell centers in content coordinates.
                    let x = f64::from(mouse.column) + 0.5;
                    let y = f64::from(mouse.row) - 1.0 + 0.5;
                    match mouse.kind {
                        MouseEventKind::Down(MouseButton::Left) => shell.pointer_down(x, y),
                        MouseEventKind::Drag(MouseButton::Left) => {
                            shell.pointer_move(x, y);
                        }
                        MouseEventKind::Up(MouseButton::Left) => {
                            shell.pointer_up(x, y);
                        }
                        _ => {}
                    }
                }
                Event::Resize(..) => laid_out_for = None,
                _ => {}
            }
        }
    }

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    Ok(())
}
