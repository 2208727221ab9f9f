pub mod screen;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
};
use webbrowser::Browser;

use quizdesk::{
    controller::NoticeLevel,
    question::{Question, Resource},
    util::format_clock,
};

use crate::{App, AppState};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.state {
            AppState::Quiz => render_quiz(self, area, buf),
            AppState::Results => render_results(self, area, buf),
        }
    }
}

fn styles() -> (Style, Style, Style) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim_bold = bold.add_modifier(Modifier::DIM);
    let italic = Style::default().add_modifier(Modifier::ITALIC);
    (bold, dim_bold, italic)
}

fn render_quiz(app: &App, area: Rect, buf: &mut Buffer) {
    let session = app.desk.session();
    let Some(question) = session.question(app.current) else {
        return;
    };
    let (bold_style, dim_bold_style, italic_style) = styles();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1),                                  // title
            Constraint::Length(if app.show_timer { 2 } else { 0 }), // timer
            Constraint::Min(2),                                     // question
            Constraint::Length(question.options.len() as u16 + 1),  // options
            Constraint::Length(1),                                  // hints
            Constraint::Length(1),                                  // status
            Constraint::Length(1),                                  // legend
        ])
        .split(area);

    let title = Paragraph::new(Line::from(vec![
        Span::styled(app.title(), bold_style),
        Span::styled(
            format!("   question {}/{}", app.current + 1, session.question_count()),
            dim_bold_style,
        ),
    ]))
    .alignment(Alignment::Center);
    title.render(chunks[0], buf);

    if app.show_timer {
        let remaining = session.seconds_remaining();
        let timer_style = if remaining <= 10 {
            bold_style.fg(Color::Red)
        } else {
            dim_bold_style
        };
        Paragraph::new(Span::styled(format_clock(remaining as u64), timer_style))
            .alignment(Alignment::Center)
            .render(chunks[1], buf);
    }

    Paragraph::new(Span::styled(question.text.as_str(), bold_style))
        .wrap(Wrap { trim: true })
        .render(chunks[2], buf);

    let picked = session.answers_for(app.current);
    let options: Vec<Line> = question
        .options
        .iter()
        .enumerate()
        .map(|(i, option)| {
            let selected = picked.is_some_and(|p| p.contains(option));
            let marker = match (question.is_multi_answer(), selected) {
                (true, true) => "[x]",
                (true, false) => "[ ]",
                (false, true) => "(•)",
                (false, false) => "( )",
            };
            let style = if selected {
                bold_style.fg(Color::Cyan)
            } else {
                Style::default()
            };
            Line::from(Span::styled(format!("{} {marker} {option}", i + 1), style))
        })
        .collect();
    Paragraph::new(options)
        .wrap(Wrap { trim: false })
        .render(chunks[3], buf);

    let mut hints = Vec::new();
    if question.is_multi_answer() {
        hints.push(Span::styled("select all that apply", italic_style));
    }
    if session.is_doubt_marked(app.current) {
        if !hints.is_empty() {
            hints.push(Span::raw("   "));
        }
        hints.push(Span::styled("marked as doubtful", italic_style.fg(Color::Yellow)));
    }
    Paragraph::new(Line::from(hints))
        .alignment(Alignment::Center)
        .render(chunks[4], buf);

    render_status(app, chunks[5], buf);

    Paragraph::new(Span::styled(
        "(1-4) select / ←→ move / (d)oubt / (enter) submit / (esc) leave",
        italic_style,
    ))
    .render(chunks[6], buf);
}

fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let (bold_style, dim_bold_style, italic_style) = styles();
    let green_bold_style = bold_style.fg(Color::Green);
    let red_bold_style = bold_style.fg(Color::Red);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1), // title
            Constraint::Length(2), // score
            Constraint::Min(3),    // selected result
            Constraint::Length(1), // status
            Constraint::Length(1), // legend
        ])
        .split(area);

    Paragraph::new(Span::styled(app.title(), bold_style))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    if let Some(entry) = app.desk.last_entry() {
        let score = Paragraph::new(Span::styled(
            format!(
                "{:.1}%   {:.2}/{} points   {} correct   {} partial   {}",
                entry.percentage,
                entry.total_score,
                entry.total_questions,
                entry.correct_count,
                entry.partial_count,
                format_clock(entry.time_spent_seconds as u64)
            ),
            bold_style,
        ))
        .alignment(Alignment::Center);
        score.render(chunks[1], buf);
    }

    let results = app.desk.session().results().unwrap_or_default();
    let mut has_link = false;
    if let Some(result) = results.get(app.result_cursor) {
        let q: &Question = &result.question;
        let mut lines = vec![
            Line::from(Span::styled(
                format!("{}/{}  {}", app.result_cursor + 1, results.len(), q.text),
                bold_style,
            )),
            Line::default(),
        ];
        for option in &q.options {
            let correct = q.correct_answer.contains(option);
            let chosen = result.user_answers.contains(option);
            let style = match (correct, chosen) {
                (true, _) => green_bold_style,
                (false, true) => red_bold_style,
                (false, false) => dim_bold_style,
            };
            let marker = match (correct, chosen) {
                (true, true) => "✓ ",
                (true, false) => "· ",
                (false, true) => "✗ ",
                (false, false) => "  ",
            };
            lines.push(Line::from(Span::styled(format!("{marker}{option}"), style)));
        }
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            format!("score {:.2}", result.partial_score),
            if result.is_fully_correct {
                green_bold_style
            } else {
                dim_bold_style
            },
        )));
        match q.resource_kind() {
            Some(Resource::Link(url)) => {
                has_link = true;
                lines.push(Line::from(Span::styled(format!("resource: {url}"), italic_style)));
            }
            Some(Resource::Reference(text)) => {
                lines.push(Line::from(Span::styled(format!("reference: {text}"), italic_style)));
            }
            None => {}
        }
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .render(chunks[2], buf);
    }

    render_status(app, chunks[3], buf);

    let legend = if has_link && Browser::is_available() {
        "←→ browse / (o)pen resource / (r)etry / (esc)ape"
    } else {
        "←→ browse / (r)etry / (esc)ape"
    };
    Paragraph::new(Span::styled(legend, italic_style)).render(chunks[4], buf);
}

fn render_status(app: &App, area: Rect, buf: &mut Buffer) {
    let Some(notice) = &app.notice else {
        return;
    };
    let color = match notice.level {
        NoticeLevel::Info => Color::Cyan,
        NoticeLevel::Error => Color::Red,
    };
    Paragraph::new(Span::styled(
        notice.message.as_str(),
        Style::default().fg(color).add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(area, buf);
}
