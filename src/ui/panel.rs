use crossterm::style::{Color, Stylize};
use crossterm::terminal;
use crossterm::tty::IsTty;
use std::io;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const FALLBACK_WIDTH: usize = 100;
const MIN_WIDTH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelStyle {
    Info,
    Success,
    Error,
}

impl PanelStyle {
    fn color(self) -> Color {
        match self {
            PanelStyle::Info => Color::Cyan,
            PanelStyle::Success => Color::Green,
            PanelStyle::Error => Color::Red,
        }
    }
}

/// A boxed block of text with an optional title
///
/// ```text
/// ╭─ Executed Git commands ───╮
/// │ 1. git log -n 5           │
/// ╰───────────────────────────╯
/// ```
#[derive(Debug, Clone)]
pub struct Panel {
    title: Option<String>,
    body: String,
    style: PanelStyle,
}

impl Panel {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            title: None,
            body: body.into(),
            style: PanelStyle::Info,
        }
    }

    pub fn titled(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(body).with_title(title)
    }

    pub fn error(body: impl Into<String>) -> Self {
        Self::titled("Error", body).with_style(PanelStyle::Error)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_style(mut self, style: PanelStyle) -> Self {
        self.style = style;
        self
    }

    /// Render to plain text `width` columns wide, borders included
    pub fn render(&self, width: usize) -> String {
        self.render_with(width, false)
    }

    fn render_with(&self, width: usize, colored: bool) -> String {
        let width = width.max(MIN_WIDTH);
        let inner = width - 4;
        let paint = |text: String| -> String {
            if colored {
                text.with(self.style.color()).to_string()
            } else {
                text
            }
        };

        let mut lines = Vec::new();

        let top = match &self.title {
            Some(title) => {
                let title = take_columns(title, width - 6);
                let used = title.width() + 4;
                let label = if colored {
                    title.bold().to_string()
                } else {
                    title
                };
                format!(
                    "{}{}{}",
                    paint("╭─ ".to_string()),
                    label,
                    paint(format!(" {}╮", "─".repeat(width - used - 1)))
                )
            }
            None => paint(format!("╭{}╮", "─".repeat(width - 2))),
        };
        lines.push(top);

        for line in wrap(&self.body, inner) {
            let pad = inner.saturating_sub(line.width());
            lines.push(format!(
                "{} {}{} {}",
                paint("│".to_string()),
                line,
                " ".repeat(pad),
                paint("│".to_string())
            ));
        }

        lines.push(paint(format!("╰{}╯", "─".repeat(width - 2))));
        lines.join("\n")
    }

    /// Width in terminal columns that fits the title and longest body line,
    /// capped at `max`
    pub fn fitted_width(&self, max: usize) -> usize {
        let body = self
            .body
            .lines()
            .map(|line| line.trim_end().replace('\t', "    ").width())
            .max()
            .unwrap_or(0)
            + 4;
        let title = self.title.as_ref().map_or(0, |t| t.width() + 6);
        body.max(title).clamp(MIN_WIDTH, max.max(MIN_WIDTH))
    }

    /// Print to stdout, colored when stdout is a terminal
    pub fn print(&self) {
        let stdout = io::stdout();
        let width = self.fitted_width(terminal_width());
        println!("{}", self.render_with(width, stdout.is_tty()));
    }

    /// Print to stderr, colored when stderr is a terminal
    pub fn eprint(&self) {
        let stderr = io::stderr();
        let width = self.fitted_width(terminal_width());
        eprintln!("{}", self.render_with(width, stderr.is_tty()));
    }
}

fn terminal_width() -> usize {
    terminal::size()
        .map(|(columns, _)| columns as usize)
        .unwrap_or(FALLBACK_WIDTH)
}

/// Longest prefix of `text` that fits in `columns`
fn take_columns(text: &str, columns: usize) -> String {
    let mut used = 0;
    text.chars()
        .take_while(|c| {
            used += c.width().unwrap_or(0);
            used <= columns
        })
        .collect()
}

/// Hard-wrap each line of `text` to `width` terminal columns
///
/// Double-width characters never straddle the border.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut wrapped = Vec::new();

    for line in text.lines() {
        let line = line.trim_end().replace('\t', "    ");
        let mut current = String::new();
        let mut used = 0;

        for c in line.chars() {
            let w = c.width().unwrap_or(0);
            if used + w > width && !current.is_empty() {
                wrapped.push(std::mem::take(&mut current));
                used = 0;
            }
            current.push(c);
            used += w;
        }
        wrapped.push(current);
    }

    if wrapped.is_empty() {
        wrapped.push(String::new());
    }
    wrapped
}
