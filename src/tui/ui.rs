use chrono::{DateTime, Local, Utc};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap},
    Frame,
};

use crate::app::{App, Confirm, SettingField, TextInput, TopicField, TopicForm};
use crate::tui::Screen;

pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tabs
            Constraint::Min(0),    // Screen body
            Constraint::Length(1), // Status line
        ])
        .split(frame.area());

    render_tabs(frame, app, chunks[0]);

    match app.screen {
        Screen::Feed => render_feed(frame, app, chunks[1]),
        Screen::Topics => render_topics(frame, app, chunks[1]),
        Screen::Settings => render_settings(frame, app, chunks[1]),
    }

    render_status(frame, app, chunks[2]);

    if let Some(input) = &app.input {
        render_input(frame, input);
    }

    if let Some(confirm) = &app.confirm {
        render_confirm(frame, confirm);
    }

    if app.show_help {
        render_help(frame);
    }
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = Screen::ALL
        .iter()
        .enumerate()
        .map(|(i, s)| Line::from(format!(" {} {} ", i + 1, s.title())))
        .collect();

    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .title(" Topic Feed ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .select(app.screen.index())
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    frame.render_widget(tabs, area);
}

fn render_feed(frame: &mut Frame, app: &App, area: Rect) {
    // 1/3 article list, 2/3 detail
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 3), Constraint::Ratio(2, 3)])
        .split(area);

    render_article_list(frame, app, chunks[0]);
    render_article_detail(frame, app, chunks[1]);
}

fn render_article_list(frame: &mut Frame, app: &App, area: Rect) {
    let articles = app.filtered_articles();
    let unread_count = app.articles.iter().filter(|a| !a.is_read).count();
    let title = format!(
        " {} [{}] {} | {} unread ",
        if app.is_refreshing { "⏳" } else { "📰" },
        app.filter.label(),
        articles.len(),
        unread_count
    );
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    if articles.is_empty() {
        let message = if app.topics.is_empty() {
            "No articles yet.\n\nAdd topics in the Topics tab (2), then press r to refresh."
        } else {
            "No articles yet.\n\nPress r to refresh."
        };
        let paragraph = Paragraph::new(message)
            .block(block)
            .style(Style::default().fg(Color::DarkGray))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = articles
        .iter()
        .map(|article| {
            let style = if article.is_read {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default().fg(Color::White)
            };
            let marker = if article.is_read { "  " } else { "● " };

            let line = Line::from(vec![
                Span::styled(marker, Style::default().fg(Color::Cyan)),
                Span::styled(
                    format!("{} ", short_date(article.published_at)),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    format!("[{}] ", app.topic_name(&article.topic_id)),
                    Style::default().fg(Color::Blue),
                ),
                Span::styled(article.title.as_str(), style),
            ]);

            ListItem::new(line)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(Some(app.feed_index));

    frame.render_stateful_widget(list, area, &mut state);
}

fn render_article_detail(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Article ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    let Some(article) = app.selected_article() else {
        let paragraph = Paragraph::new("No article selected")
            .block(block)
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(paragraph, area);
        return;
    };

    let lines = vec![
        Line::from(Span::styled(
            article.title.as_str(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("Topic: ", Style::default().fg(Color::DarkGray)),
            Span::styled(app.topic_name(&article.topic_id), Style::default().fg(Color::Blue)),
        ]),
        Line::from(vec![
            Span::styled("Published: ", Style::default().fg(Color::DarkGray)),
            Span::raw(format_time(article.published_at)),
        ]),
        Line::from(""),
        Line::from(article.description.as_str()),
        Line::from(""),
        Line::from(Span::styled(
            article.url.as_str(),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::UNDERLINED),
        )),
    ];

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: true });

    frame.render_widget(paragraph, area);
}

fn render_topics(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(format!(" Topics ({}) ", app.topics.len()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    if app.topics.is_empty() {
        let paragraph = Paragraph::new("No topics yet. Press a to add one.")
            .block(block)
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = app
        .topics
        .iter()
        .map(|topic| {
            let (state, state_style) = if topic.is_active {
                ("[on] ", Style::default().fg(Color::Green))
            } else {
                ("[off]", Style::default().fg(Color::DarkGray))
            };
            let bell = if topic.notifications_enabled { " 🔔" } else { "" };

            ListItem::new(Line::from(vec![
                Span::styled(state, state_style),
                Span::raw(" "),
                Span::styled(
                    topic.name.as_str(),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!("  \"{}\"", topic.query),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::raw(bell),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(Some(app.topic_index));

    frame.render_stateful_widget(list, area, &mut state);
}

fn render_settings(frame: &mut Frame, app: &App, area: Rect) {
    let settings = &app.settings;
    let on_off = |on: bool| if on { "On" } else { "Off" };
    let key_style = Style::default().fg(Color::Yellow);

    let row = |key: &'static str, label: &'static str, value: String| {
        Line::from(vec![
            Span::styled(format!("  {key}  "), key_style),
            Span::raw(format!("{label:<22}")),
            Span::styled(value, Style::default().add_modifier(Modifier::BOLD)),
        ])
    };

    let last_sync = app
        .last_sync
        .map(format_time)
        .unwrap_or_else(|| "Never".to_string());

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(" Notifications", Style::default().fg(Color::Cyan))),
        row("n", "Enabled", on_off(settings.enabled).to_string()),
        row("f", "Frequency", settings.frequency.label().to_string()),
        row("h", "Quiet hours", on_off(settings.quiet_hours.enabled).to_string()),
        row("b", "Quiet hours start", settings.quiet_hours.start.clone()),
        row("e", "Quiet hours end", settings.quiet_hours.end.clone()),
        Line::from(""),
        Line::from(Span::styled(" Account", Style::default().fg(Color::Cyan))),
        row(
            "K",
            "Exa API key",
            if app.has_api_key() { "Configured" } else { "Not set" }.to_string(),
        ),
        Line::from(""),
        Line::from(Span::styled(" Data", Style::default().fg(Color::Cyan))),
        row(" ", "Last sync", last_sync),
        row("X", "Clear all data", String::new()),
        Line::from(""),
        Line::from(Span::styled(
            "  Press s to save notification settings",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .title(" Settings ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    frame.render_widget(paragraph, area);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
    let (text, color) = match &app.status {
        Some(message) => (message.as_str(), Color::Yellow),
        None => {
            let hint = match app.screen {
                Screen::Feed => "j/k:nav  r:refresh  Enter:open  m:read  f:filter  ?:help  q:quit",
                Screen::Topics => "a:add  e:edit  d:delete  space:active  n:notify  ?:help  q:quit",
                Screen::Settings => "n f h b e K:change  s:save  X:clear data  ?:help  q:quit",
            };
            (hint, Color::DarkGray)
        }
    };

    let paragraph = Paragraph::new(text).style(Style::default().fg(color));
    frame.render_widget(paragraph, area);
}

fn render_input(frame: &mut Frame, input: &TextInput) {
    match input {
        TextInput::Topic(form) => render_topic_form(frame, form),
        TextInput::Setting { field, value } => {
            let area = centered_rect(60, 20, frame.area());
            let block = Block::default()
                .title(format!(" {} ", field.label()))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow));
            let inner = block.inner(area);

            frame.render_widget(Clear, area);
            frame.render_widget(block, area);

            // Never echo the key back
            let shown = if *field == SettingField::ApiKey {
                "*".repeat(value.chars().count())
            } else {
                value.clone()
            };
            let paragraph = Paragraph::new(format!("> {shown}_"))
                .style(Style::default().fg(Color::White));
            frame.render_widget(paragraph, inner);
        }
    }
}

fn render_topic_form(frame: &mut Frame, form: &TopicForm) {
    let area = centered_rect(60, 35, frame.area());
    let title = if form.editing.is_some() {
        " Edit Topic "
    } else {
        " Add New Topic "
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let field_style = |field: TopicField| {
        if form.field == field {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        }
    };
    let cursor = |field: TopicField| if form.field == field { "_" } else { "" };

    let lines = vec![
        Line::from(Span::styled("Topic Name", field_style(TopicField::Name))),
        Line::from(format!("> {}{}", form.draft.name, cursor(TopicField::Name))),
        Line::from(""),
        Line::from(Span::styled("Search Query", field_style(TopicField::Query))),
        Line::from(format!("> {}{}", form.draft.query, cursor(TopicField::Query))),
        Line::from(""),
        Line::from(Span::styled(
            format!(
                "[{}] Notifications (space to toggle)",
                if form.draft.notifications_enabled { "x" } else { " " }
            ),
            field_style(TopicField::Notifications),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Tab: next field  Enter: save  Esc: cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn render_confirm(frame: &mut Frame, confirm: &Confirm) {
    let area = centered_rect(50, 20, frame.area());
    let (title, message) = match confirm {
        Confirm::DeleteTopic { name, .. } => (
            " Delete Topic ",
            format!("Are you sure you want to delete \"{name}\"?"),
        ),
        Confirm::ClearData => (
            " Clear All Data ",
            "This will delete all topics, articles, and settings. This action cannot be undone."
                .to_string(),
        ),
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red));

    let text = format!("{message}\n\n y: confirm   n: cancel");
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(text).block(block).wrap(Wrap { trim: true }),
        area,
    );
}

const HELP_TEXT: &[&str] = &[
    "",
    " Navigation:",
    "   Tab      Next screen",
    "   1 2 3    Feed / Topics / Settings",
    "   j / ↓    Move down",
    "   k / ↑    Move up",
    "",
    " Feed:",
    "   r        Refresh articles",
    "   Enter/o  Open in browser",
    "   m        Toggle read/unread",
    "   f        Cycle filter",
    "",
    " Topics:",
    "   a / e    Add / edit topic",
    "   d        Delete topic",
    "   space    Toggle active",
    "   n        Toggle notifications",
    "",
    " Settings:",
    "   n        Toggle notifications",
    "   f        Cycle frequency",
    "   h        Toggle quiet hours",
    "   b / e    Edit quiet hours start / end",
    "   K        Set Exa API key",
    "   s        Save settings",
    "   X        Clear all data",
    "",
    " General:",
    "   ?        Toggle this help",
    "   q        Quit",
    "",
    " Press any key to close",
];

fn render_help(frame: &mut Frame) {
    let area = centered_rect(50, 90, frame.area());

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(HELP_TEXT.join("\n"))
        .block(block)
        .style(Style::default().fg(Color::White));

    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn short_date(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%m-%d").to_string()
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn help_lists_every_settings_key() {
        let start = HELP_TEXT.iter().position(|l| l.trim() == "Settings:").unwrap();
        let settings: Vec<&str> = HELP_TEXT[start + 1..]
            .iter()
            .take_while(|l| !l.trim().is_empty())
            .map(|l| l.trim())
            .collect();
        for key in ["n ", "f ", "h ", "b / e", "K ", "s ", "X "] {
            assert!(
                settings.iter().any(|l| l.starts_with(key)),
                "missing {key:?} in {settings:?}"
            );
        }
    }

    #[test]
    fn short_date_is_month_and_day() {
        let at = Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap();
        assert_eq!(short_date(at), "06-15");
    }
}
