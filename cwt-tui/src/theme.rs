use ratatui::style::Color;

/// Fixed palette for the worktree list UI.
pub struct Theme {
    pub header: Color,
    pub border: Color,
    pub accent: Color,
    pub muted: Color,
    pub dirty: Color,
    pub clean: Color,
    pub error: Color,
    pub highlight_fg: Color,
    pub highlight_bg: Color,
    pub modal_border: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            border: Color::DarkGray,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            dirty: Color::Yellow,
            clean: Color::Green,
            error: Color::Red,
            highlight_fg: Color::Black,
            highlight_bg: Color::Blue,
            modal_border: Color::Magenta,
        }
    }
}
