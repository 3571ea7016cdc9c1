use fleetmon_stats::ServerStatus;
use ratatui::style::{
    Color,
    Style,
};

#[derive(Clone, Copy, Debug)]
pub(super) struct Theme {
    pub(super) default: Style,
    pub(super) text_default: Style,
    pub(super) text_selected: Style,
    pub(super) text_dimmed: Style,
    pub(super) border_focused: Style,
    pub(super) border_unfocused: Style,
    pub(super) notice: Style,
    ok: Style,
    degraded: Style,
    bad: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            default: Style::default().bg(Color::Black).fg(Color::Gray),
            text_default: Style::default(),
            text_selected: Style::default().fg(Color::Yellow),
            text_dimmed: Style::default().fg(Color::DarkGray),
            border_focused: Style::default().fg(Color::White),
            border_unfocused: Style::default().fg(Color::DarkGray),
            notice: Style::default().fg(Color::Red),
            ok: Style::default().fg(Color::Green),
            degraded: Style::default().fg(Color::Yellow),
            bad: Style::default().fg(Color::Red),
        }
    }
}

impl Theme {
    pub(super) fn border(&self, focused: bool) -> Style {
        if focused {
            self.border_focused
        } else {
            self.border_unfocused
        }
    }

    pub(super) fn status(&self, status: ServerStatus) -> Style {
        match status {
            ServerStatus::Active => self.ok,
            ServerStatus::Idle => self.degraded,
            ServerStatus::Offline => self.bad,
        }
    }

    /// Under 50 ms reads as good, under 100 ms as tolerable, anything
    /// above as bad.
    pub(super) fn ping(&self, ping_ms: u32) -> Style {
        if ping_ms < 50 {
            self.ok
        } else if ping_ms < 100 {
            self.degraded
        } else {
            self.bad
        }
    }

    pub(super) fn capacity(&self, ratio: f64) -> Style {
        if ratio < 0.7 {
            self.ok
        } else if ratio < 0.9 {
            self.degraded
        } else {
            self.bad
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ping_colors_follow_the_latency_bands() {
        let theme = Theme::default();
        assert_eq!(theme.ping(0), theme.ok);
        assert_eq!(theme.ping(49), theme.ok);
        assert_eq!(theme.ping(50), theme.degraded);
        assert_eq!(theme.ping(99), theme.degraded);
        assert_eq!(theme.ping(100), theme.bad);
        assert_eq!(theme.ping(450), theme.bad);
    }

    #[test]
    fn offline_servers_read_as_bad() {
        let theme = Theme::default();
        assert_eq!(theme.status(ServerStatus::Offline), theme.bad);
        assert_eq!(theme.status(ServerStatus::Active), theme.ok);
    }
}
