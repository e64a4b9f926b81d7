use crate::theme::Theme;
use cwt_core::{Mode, Model};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};
use unicode_width::UnicodeWidthStr;

const NAME_COL_WIDTH: usize = 25;
const BRANCH_COL_WIDTH: usize = 25;
const AGE_COL_WIDTH: usize = 15;

pub fn draw(f: &mut Frame, model: &Model, theme: &Theme) {
    let [main_area, footer_area] =
        Layout::vertical([Constraint::Min(1), Constraint::Length(3)]).areas(f.area());
    let [header_area, list_area] =
        Layout::vertical([Constraint::Length(2), Constraint::Min(1)]).areas(main_area);

    draw_header(f, header_area, theme);
    draw_list(f, list_area, model, theme);
    draw_footer(f, footer_area, model, theme);

    if model.mode == Mode::Creating {
        draw_input_modal(f, model, theme);
    }
}

fn draw_header(f: &mut Frame, area: Rect, theme: &Theme) {
    let title = Paragraph::new(format!(
        " cwt v{} • worktree manager ",
        env!("CARGO_PKG_VERSION")
    ))
    .centered()
    .style(
        Style::default()
            .fg(theme.header)
            .add_modifier(Modifier::BOLD),
    )
    .block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(theme.border)),
    );
    f.render_widget(title, area);
}

fn draw_list(f: &mut Frame, area: Rect, model: &Model, theme: &Theme) {
    let items: Vec<ListItem> = model
        .visible_worktrees()
        .iter()
        .map(|wt| {
            let (icon, icon_style) = match wt.dirty {
                Some(true) => ("●", Style::default().fg(theme.dirty)),
                _ => (" ", Style::default().fg(theme.clean)),
            };
            let age = wt.last_commit.clone().unwrap_or_default();

            ListItem::new(Line::from(vec![
                Span::styled(format!(" {icon} "), icon_style),
                Span::styled(
                    pad_right(&wt.name(), NAME_COL_WIDTH),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    pad_right(wt.branch().unwrap_or("HEAD"), BRANCH_COL_WIDTH),
                    Style::default().fg(theme.muted),
                ),
                Span::styled(
                    format!("{age:>width$}", width = AGE_COL_WIDTH),
                    Style::default().fg(theme.accent),
                ),
            ]))
        })
        .collect();

    let title = if model.mode == Mode::Filtering {
        Line::from(vec![
            Span::styled(" FILTERING: ", Style::default().fg(theme.accent)),
            Span::styled(
                model.filter().to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ])
    } else {
        Line::from(Span::styled(" SESSIONS ", Style::default().fg(theme.muted)))
    };

    let list = List::new(items)
        .highlight_style(
            Style::default()
                .fg(theme.highlight_fg)
                .bg(theme.highlight_bg),
        )
        .highlight_symbol("▎")
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.border)),
        );

    let mut list_state = ListState::default();
    if !model.visible_worktrees().is_empty() {
        list_state.select(Some(model.selected_index()));
    }
    f.render_stateful_widget(list, area, &mut list_state);
}

fn draw_footer(f: &mut Frame, area: Rect, model: &Model, theme: &Theme) {
    let hints: &[(&str, &str)] = match model.mode {
        Mode::Creating => &[("Enter", "Confirm"), ("Esc", "Cancel")],
        Mode::Filtering => &[("Type", "Search"), ("Enter", "Select"), ("Esc", "Reset")],
        Mode::Normal => &[
            ("n", "New"),
            ("/", "Filter"),
            ("Enter", "Resume"),
            ("d", "Delete"),
            ("r", "Refresh"),
            ("q", "Quit"),
        ],
    };

    let mut key_spans = Vec::new();
    for (key, desc) in hints {
        key_spans.push(Span::styled(
            format!(" {key} "),
            Style::default().fg(ratatui::style::Color::White).bg(theme.muted),
        ));
        key_spans.push(Span::styled(
            format!(" {desc} "),
            Style::default().fg(theme.muted),
        ));
    }

    let lower = model.message.to_lowercase();
    let message_style = if lower.contains("error") || lower.contains("warning") {
        Style::default()
            .fg(theme.error)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme.accent)
    };

    let footer = Paragraph::new(vec![
        Line::from(Span::styled(model.message.clone(), message_style)),
        Line::from(key_spans),
    ])
    .block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(Style::default().fg(theme.border)),
    );
    f.render_widget(footer, area);
}

fn draw_input_modal(f: &mut Frame, model: &Model, theme: &Theme) {
    let area = centered_rect(f.area(), 50, 3);
    f.render_widget(Clear, area);

    let input = Paragraph::new(model.input().to_string()).block(
        Block::default()
            .title(Span::styled(
                " NEW SESSION ",
                Style::default()
                    .fg(theme.header)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.modal_border)),
    );
    f.render_widget(input, area);
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn pad_right(text: &str, width: usize) -> String {
    let text_width = text.width();
    if text_width >= width {
        format!("{text} ")
    } else {
        format!("{text}{}", " ".repeat(width - text_width))
    }
}
