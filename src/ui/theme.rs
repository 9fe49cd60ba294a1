use owo_colors::Style;
use std::sync::OnceLock;

static THEME: OnceLock<Theme> = OnceLock::new();

/// Styles for each part of a rendered data point
#[derive(Debug, Clone)]
pub struct Theme {
    pub heading: Style,
    pub ok: Style,
    pub failure: Style,
    /// Field name of a rejected record
    pub field: Style,
    pub asset: Style,
    pub value: Style,
    pub timestamp: Style,
    pub id: Style,
}

impl Theme {
    /// Colors only on a terminal, and never when `NO_COLOR` is set
    pub fn detect() -> Self {
        let no_color = std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty());
        if no_color || !console::Term::stdout().is_term() {
            Self::plain()
        } else {
            Self::colored()
        }
    }

    pub fn colored() -> Self {
        Self {
            heading: Style::new().bold().underline(),
            ok: Style::new().green(),
            failure: Style::new().red().bold(),
            field: Style::new().yellow(),
            asset: Style::new().cyan().bold(),
            value: Style::new().bright_white().bold(),
            timestamp: Style::new().blue(),
            id: Style::new().dimmed(),
        }
    }

    pub fn plain() -> Self {
        Self {
            heading: Style::new(),
            ok: Style::new(),
            failure: Style::new(),
            field: Style::new(),
            asset: Style::new(),
            value: Style::new(),
            timestamp: Style::new(),
            id: Style::new(),
        }
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}
