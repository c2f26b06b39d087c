use crate::app::App;
use crate::audio::visualizer::curve_segments;
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::Span,
    widgets::{
        canvas::{Canvas, Line as CanvasLine},
        Block, BorderType, Borders, Paragraph,
    },
    Frame,
};

/// Sub-steps per quadratic span
const CURVE_STEPS: usize = 4;

pub fn render(f: &mut Frame, area: Rect, app: &mut App) {
    let theme = app.theme.clone();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(Span::styled(
            " Spectrum ",
            Style::default().fg(theme.cyan).add_modifier(Modifier::BOLD),
        ))
        .title_alignment(Alignment::Left)
        .border_style(Style::default().fg(theme.cyan))
        .style(Style::default().bg(Color::Reset));

    let inner = block.inner(area);
    f.render_widget(block, area);

    if inner.height < 3 || inner.width < 10 {
        app.spectrum_size = (0.0, 0.0);
        let msg = Paragraph::new("♪ Resize for spectrum")
            .alignment(Alignment::Center)
            .style(Style::default().fg(theme.overlay));
        f.render_widget(msg, inner);
        return;
    }

    // Next tick computes points for this size
    let width = inner.width as f64;
    let height = inner.height as f64;
    app.spectrum_size = (width, height);

    let segments = curve_segments(&app.points, CURVE_STEPS);
    let mid = height / 2.0;
    let upper = theme.cyan;
    let lower = match theme.blue {
        Color::Rgb(r, g, b) => Color::Rgb(r / 2, g / 2, b / 2),
        other => other,
    };

    let canvas = Canvas::default()
        .marker(Marker::Braille)
        .x_bounds([0.0, width])
        .y_bounds([0.0, height])
        .paint(move |ctx| {
            // Mirrored around the horizontal centre line
            for ((x1, y1), (x2, y2)) in &segments {
                ctx.draw(&CanvasLine::new(*x1, mid + y1, *x2, mid + y2, upper));
                ctx.draw(&CanvasLine::new(*x1, mid - y1, *x2, mid - y2, lower));
            }
        });
    f.render_widget(canvas, inner);
}
