use crate::app::App;
use crate::player::PlayerState;
use crate::ui::utils::{format_time, truncate};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame,
};

pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;
    let view = &app.view;

    let music_block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(Span::styled(
            " Now Playing ",
            Style::default().fg(theme.blue).add_modifier(Modifier::BOLD),
        ))
        .title_alignment(Alignment::Left)
        .border_style(Style::default().fg(theme.blue))
        .style(Style::default().bg(Color::Reset));

    let inner = music_block.inner(area);
    f.render_widget(music_block, area);

    let Some(track) = &view.track else {
        let t = Paragraph::new("Nothing queued")
            .alignment(Alignment::Center)
            .style(Style::default().fg(theme.overlay));
        f.render_widget(t, inner);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // Padding
            Constraint::Length(3), // Info
            Constraint::Length(1), // State
            Constraint::Length(1), // Gauge
            Constraint::Length(1), // Time
            Constraint::Min(0),    // Padding
        ])
        .split(inner);

    // 1. Info
    let max_width = inner.width.saturating_sub(4) as usize;
    let info = Paragraph::new(vec![
        Line::from(Span::styled(
            truncate(&track.name, max_width),
            Style::default().fg(theme.text).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            truncate(&track.artist_names(), max_width),
            Style::default().fg(theme.magenta),
        )),
        Line::from(Span::styled(
            truncate(&track.album.name, max_width),
            Style::default().fg(theme.cyan).add_modifier(Modifier::DIM),
        )),
    ])
    .alignment(Alignment::Center);
    f.render_widget(info, chunks[1]);

    // 2. State + liked marker
    let (icon, color) = match view.state {
        PlayerState::Playing => ("▶", theme.green),
        PlayerState::Paused => ("⏸", theme.yellow),
        PlayerState::Loading => ("…", theme.blue),
        PlayerState::Stopped => ("■", theme.overlay),
        PlayerState::Error => ("✖", theme.red),
    };
    let mut state_spans = vec![Span::styled(
        format!("{} {}", icon, view.state.label()),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )];
    if view.liked == Some(true) {
        state_spans.push(Span::styled("  ♥", Style::default().fg(theme.red)));
    }
    if view.queue_len > 0 {
        state_spans.push(Span::styled(
            format!("  {}/{}", view.queue_index.min(view.queue_len), view.queue_len),
            Style::default().fg(theme.overlay),
        ));
    }
    f.render_widget(
        Paragraph::new(Line::from(state_spans)).alignment(Alignment::Center),
        chunks[2],
    );

    if view.state == PlayerState::Error {
        let message = view.error.as_deref().unwrap_or("playback failed");
        let err = Paragraph::new(truncate(message, max_width))
            .alignment(Alignment::Center)
            .style(Style::default().fg(theme.red));
        f.render_widget(err, chunks[3]);
        return;
    }

    // 3. Gauge
    let gauge_area = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(10),
            Constraint::Percentage(80),
            Constraint::Percentage(10),
        ])
        .split(chunks[3])[1];

    let total = view
        .duration
        .unwrap_or_else(|| std::time::Duration::from_millis(track.duration_ms));
    let ratio = if total.is_zero() {
        0.0
    } else {
        (view.position.as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0)
    };
    f.render_widget(
        Paragraph::new(gauge_line(gauge_area.width as usize, ratio, app)),
        gauge_area,
    );

    // 4. Time
    let time = Paragraph::new(format!("{} / {}", format_time(view.position), format_time(total)))
        .alignment(Alignment::Center)
        .style(Style::default().fg(theme.overlay));
    f.render_widget(time, chunks[4]);
}

fn gauge_line(width: usize, ratio: f64, app: &App) -> Line<'static> {
    let theme = &app.theme;
    let occupied = (width as f64 * ratio) as usize;
    let fill_style = Style::default().fg(theme.magenta);
    let empty_style = Style::default().fg(theme.surface);

    let spans: Vec<Span> = (0..width)
        .map(|i| {
            if i + 1 == occupied {
                Span::styled("●", fill_style)
            } else if i < occupied {
                Span::styled("━", fill_style)
            } else {
                Span::styled("─", empty_style)
            }
        })
        .collect();
    Line::from(spans)
}
