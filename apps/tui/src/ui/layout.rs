use poi_core::config::UiConfig;
use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Regions of the main screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Panes {
    pub header: Rect,
    pub map: Rect,
    pub list: Rect,
    pub status: Rect,
    pub shortcuts: Rect,
    /// List below the map instead of beside it.
    pub stacked: bool,
}

/// Split the screen. Below `narrow_breakpoint` columns the list stacks
/// under the map; otherwise it sits to the right at `list_width`.
pub fn main_panes(area: Rect, ui: UiConfig) -> Panes {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title and auth state
            Constraint::Min(5),    // Map and list
            Constraint::Length(3), // Status
            Constraint::Length(1), // Shortcuts hint
        ])
        .split(area);

    let stacked = area.width < ui.narrow_breakpoint;
    let body = if stacked {
        Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(rows[1])
    } else {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(20), Constraint::Length(ui.list_width)])
            .split(rows[1])
    };

    Panes {
        header: rows[0],
        map: body[0],
        list: body[1],
        status: rows[2],
        shortcuts: rows[3],
        stacked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UI: UiConfig = UiConfig {
        list_width: 48,
        narrow_breakpoint: 100,
    };

    #[test]
    fn test_wide_terminal_puts_list_beside_map() {
        let panes = main_panes(Rect::new(0, 0, 160, 50), UI);

        assert!(!panes.stacked);
        assert_eq!(panes.list.width, 48);
        assert_eq!(panes.map.width, 112);
        assert_eq!(panes.map.y, panes.list.y);
        assert_eq!(panes.header.height, 3);
        assert_eq!(panes.shortcuts.height, 1);
    }

    #[test]
    fn test_narrow_terminal_stacks_list_under_map() {
        let panes = main_panes(Rect::new(0, 0, 80, 40), UI);

        assert!(panes.stacked);
        assert_eq!(panes.map.width, 80);
        assert_eq!(panes.list.width, 80);
        assert!(panes.list.y > panes.map.y);
    }
}
