use crate::app::App;
use crate::ui::utils::truncate;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame,
};

pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(Span::styled(
            " Lyrics ",
            Style::default().fg(theme.magenta).add_modifier(Modifier::BOLD),
        ))
        .title_alignment(Alignment::Left)
        .border_style(Style::default().fg(theme.magenta))
        .style(Style::default().bg(Color::Reset));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(display) = app.lyric_display() else {
        let p = Paragraph::new("Lyrics disabled")
            .alignment(Alignment::Center)
            .style(Style::default().fg(theme.overlay));
        f.render_widget(p, inner);
        return;
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(1), // prev
            Constraint::Length(1),
            Constraint::Length(1), // current
            Constraint::Length(1),
            Constraint::Length(1), // next
            Constraint::Min(0),
        ])
        .split(inner);

    let width = inner.width.saturating_sub(2) as usize;
    // Faded-out slots keep their text but drop to the surface colour
    let (side, active) = if display.visible {
        (
            Style::default().fg(theme.overlay),
            Style::default().fg(theme.green).add_modifier(Modifier::BOLD),
        )
    } else {
        (
            Style::default().fg(theme.surface),
            Style::default().fg(theme.surface).add_modifier(Modifier::DIM),
        )
    };

    let slots = [
        (rows[1], &display.prev, side),
        (rows[3], &display.current, active),
        (rows[5], &display.next, side),
    ];
    for (rect, text, style) in slots {
        let line = Line::from(Span::styled(truncate(text, width), style));
        f.render_widget(Paragraph::new(line).alignment(Alignment::Center), rect);
    }
}
