pub mod components;
pub mod layout;
pub mod utils;

use crate::app::App;
use ratatui::layout::Alignment;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

pub fn ui(f: &mut Frame, app: &mut App) {
    let area = f.area();
    let main_layout = layout::get_main_layout(area);
    let content = layout::get_content_layout(main_layout.body_area, area.width >= 90);

    components::player_card::render(f, content.card, app);
    if let Some(rect) = content.lyrics {
        components::lyrics::render(f, rect, app);
    }
    match content.spectrum {
        Some(rect) => components::spectrum::render(f, rect, app),
        None => app.spectrum_size = (0.0, 0.0),
    }

    render_footer(f, main_layout.footer_area, app);
}

fn render_footer(f: &mut Frame, area: ratatui::layout::Rect, app: &App) {
    let theme = &app.theme;

    if let Some(toast) = &app.toast {
        let p = Paragraph::new(Span::styled(
            format!(" {} ", toast.message),
            Style::default().fg(theme.yellow),
        ))
        .alignment(Alignment::Left);
        f.render_widget(p, area);
    }

    let keys = &app.keys;
    let key = |k: &str| Span::styled(keys.display(k), Style::default().fg(theme.overlay).add_modifier(Modifier::BOLD));
    let label = |s: &'static str| Span::styled(s, Style::default().fg(theme.overlay));
    let hint = Line::from(vec![
        key(&keys.play_pause),
        label(" play  "),
        key(&keys.next_track),
        label(" next  "),
        key(&keys.prev_track),
        label(" prev  "),
        key(&keys.seek_backward),
        key(&keys.seek_forward),
        label(" seek  "),
        key(&keys.volume_down),
        key(&keys.volume_up),
        label(" vol  "),
        key(&keys.toggle_like),
        label(" like  "),
        key(&keys.quit),
        label(" quit "),
    ]);
    f.render_widget(Paragraph::new(hint).alignment(Alignment::Right), area);
}
