use crate::tui::{
    layout::header_main_and_footer_areas,
    Action,
    Component,
    Theme,
};
use eyre::{
    bail,
    Result,
};
use ratatui::{
    layout::{
        Constraint,
        Direction,
        Layout,
        Rect,
    },
    text::{
        Line,
        Span,
    },
    widgets::Paragraph,
    Frame,
};
use std::time::{
    Duration,
    Instant,
};

/// How long a notification stays on screen before it expires on its own.
const NOTICE_TTL: Duration = Duration::from_secs(8);

/// The single line at the bottom of every screen: key hints and fleet totals,
/// with error notifications taking over the left side until dismissed.
#[derive(Debug, Default)]
pub struct StatusBar {
    notice: Option<Notice>,
    servers: usize,
    online: usize,
    players: u32,
}

#[derive(Debug)]
struct Notice {
    message: String,
    shown_at: Instant,
}

impl Component for StatusBar {
    fn update(&mut self, action: Action) -> Result<Option<Action>> {
        match action {
            Action::Error(message) => {
                self.notice = Some(Notice {
                    message,
                    shown_at: Instant::now(),
                });
            }
            Action::DismissNotice => {
                self.notice = None;
            }
            Action::Tick => {
                if self
                    .notice
                    .as_ref()
                    .is_some_and(|notice| notice.shown_at.elapsed() > NOTICE_TTL)
                {
                    self.notice = None;
                }
            }
            Action::FleetSummaryChanged {
                servers,
                online,
                players,
            } => {
                self.servers = servers;
                self.online = online;
                self.players = players;
            }
            _ => {}
        }
        Ok(None)
    }

    fn draw(&mut self, frame: &mut Frame<'_>, area: Rect) -> Result<()> {
        let [_header_area, _main_area, footer_area] = header_main_and_footer_areas(area)?;
        let theme = Theme::default();

        let summary = format!(" {} servers | {} online | {} players ", self.servers, self.online, self.players);
        let [left_area, right_area] = *Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(summary.len() as u16)])
            .split(footer_area)
        else {
            bail!("Failed to split the footer");
        };

        let left = match &self.notice {
            Some(notice) => Line::from(vec![
                Span::styled(format!(" {} ", notice.message), theme.notice),
                Span::styled(" <esc> to dismiss", theme.text_dimmed),
            ]),
            None => Line::styled(" <q> quit | <1> dashboard | <2> servers | <3> logs", theme.text_dimmed),
        };
        frame.render_widget(Paragraph::new(left), left_area);
        frame.render_widget(Paragraph::new(summary).style(theme.text_dimmed), right_area);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn notices_replace_each_other_and_dismiss() {
        let mut bar = StatusBar::default();

        bar.update(Action::Error("first".to_string())).unwrap();
        bar.update(Action::Error("second".to_string())).unwrap();
        assert_eq!(bar.notice.as_ref().map(|notice| notice.message.as_str()), Some("second"));

        bar.update(Action::DismissNotice).unwrap();
        assert!(bar.notice.is_none());
    }

    #[test]
    fn the_summary_tracks_fleet_totals() {
        let mut bar = StatusBar::default();

        bar.update(Action::FleetSummaryChanged {
            servers: 3,
            online: 2,
            players: 57,
        })
        .unwrap();

        assert_eq!((bar.servers, bar.online, bar.players), (3, 2, 57));
    }
}
