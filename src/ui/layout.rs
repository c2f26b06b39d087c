use ratatui::layout::{Constraint, Direction, Layout, Rect};

pub struct MainLayout {
    pub body_area: Rect,
    pub footer_area: Rect,
}

pub fn get_main_layout(area: Rect) -> MainLayout {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // Body
            Constraint::Length(1), // Footer
        ])
        .split(area);

    MainLayout {
        body_area: chunks[0],
        footer_area: chunks[1],
    }
}

pub struct ContentLayout {
    pub card: Rect,
    pub lyrics: Option<Rect>,
    pub spectrum: Option<Rect>,
}

/// Wide terminals put the card left of a lyrics-over-spectrum column.
/// Narrow ones stack all three, and very short ones keep only the card.
pub fn get_content_layout(area: Rect, wide_mode: bool) -> ContentLayout {
    if wide_mode {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Min(20)])
            .split(area);
        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(columns[1]);
        return ContentLayout {
            card: columns[0],
            lyrics: Some(right[0]),
            spectrum: Some(right[1]),
        };
    }

    if area.height < 24 {
        return ContentLayout {
            card: area,
            lyrics: None,
            spectrum: None,
        };
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(10),
            Constraint::Min(5),
            Constraint::Percentage(35),
        ])
        .split(area);
    ContentLayout {
        card: rows[0],
        lyrics: Some(rows[1]),
        spectrum: Some(rows[2]),
    }
}
