use console::{Emoji, measure_text_width, style};

pub static SUCCESS_ICON: Emoji<'_, '_> = Emoji("✅ ", "");
pub static INFO_ICON: Emoji<'_, '_> = Emoji("ℹ️  ", "");
pub static WARN_ICON: Emoji<'_, '_> = Emoji("⚠️  ", "");
pub static ERROR_ICON: Emoji<'_, '_> = Emoji("❌ ", "");
pub static PIN: Emoji<'_, '_> = Emoji("📌 ", "* ");

pub fn print_success(msg: &str) {
    println!("{} {}", SUCCESS_ICON, style(msg).green());
}

pub fn print_info(msg: &str) {
    println!("{} {}", INFO_ICON, style(msg).blue());
}

pub fn print_warn(msg: &str) {
    println!("{} {}", WARN_ICON, style(msg).yellow());
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", ERROR_ICON, style(msg).red().bold());
}

pub fn print_banner() {
    println!(
        "\n{} {}",
        style("milo").bold().magenta(),
        style("dashboard").bold().cyan()
    );
    println!("{}\n", style("Tasks, notes and agents at a glance.").dim());
}

/// Pad `text` to `width` visible columns, ignoring ANSI styling.
pub fn pad(text: &str, width: usize) -> String {
    let visible = measure_text_width(text);
    if visible >= width {
        return text.to_string();
    }
    format!("{}{}", text, " ".repeat(width - visible))
}

/// Shorten to `max` visible characters with a trailing ellipsis.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", kept)
}

enum GuideLine {
    Command(String, String),
    Status(String, String),
    Text(String),
    Bullet(String),
    Info(String),
    Hint(String),
    Blank,
}

/// A titled block of output lines, printed in one go.
pub struct GuideSection {
    title: String,
    lines: Vec<GuideLine>,
}

impl GuideSection {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            lines: Vec::new(),
        }
    }

    pub fn command(mut self, name: &str, description: &str) -> Self {
        self.lines
            .push(GuideLine::Command(name.to_string(), description.to_string()));
        self
    }

    pub fn status(mut self, label: &str, value: &str) -> Self {
        self.lines
            .push(GuideLine::Status(label.to_string(), value.to_string()));
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.lines.push(GuideLine::Text(text.to_string()));
        self
    }

    pub fn bullet(mut self, text: &str) -> Self {
        self.lines.push(GuideLine::Bullet(text.to_string()));
        self
    }

    pub fn info(mut self, text: &str) -> Self {
        self.lines.push(GuideLine::Info(text.to_string()));
        self
    }

    pub fn hint(mut self, text: &str) -> Self {
        self.lines.push(GuideLine::Hint(text.to_string()));
        self
    }

    pub fn blank(mut self) -> Self {
        self.lines.push(GuideLine::Blank);
        self
    }

    pub fn render(&self) -> Vec<String> {
        let label_width = self
            .lines
            .iter()
            .filter_map(|line| match line {
                GuideLine::Command(name, _) | GuideLine::Status(name, _) => {
                    Some(measure_text_width(name))
                }
                _ => None,
            })
            .max()
            .unwrap_or(0);

        let mut out = vec![format!("\n {}", style(&self.title).bold().underlined())];
        for line in &self.lines {
            out.push(match line {
                GuideLine::Command(name, desc) => format!(
                    "   {}  {}",
                    pad(&style(name).green().bold().to_string(), label_width),
                    desc
                ),
                GuideLine::Status(label, value) => format!(
                    "   {}  {}",
                    pad(&style(label).cyan().to_string(), label_width),
                    value
                ),
                GuideLine::Text(text) => format!("   {}", text),
                GuideLine::Bullet(text) => format!("   {} {}", style("•").dim(), text),
                GuideLine::Info(text) => format!("   {}{}", INFO_ICON, text),
                GuideLine::Hint(text) => format!("   {}", style(text).dim().italic()),
                GuideLine::Blank => String::new(),
            });
        }
        out
    }

    pub fn print(&self) {
        for line in self.render() {
            println!("{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_ignores_ansi_codes() {
        let styled = style("ok").green().force_styling(true).to_string();
        assert_eq!(measure_text_width(&pad(&styled, 5)), 5);
        assert_eq!(pad("too long", 3), "too long");
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefgh", 5), "abcd…");
    }

    #[test]
    fn section_aligns_labels() {
        let lines = GuideSection::new("Gateway")
            .status("API", "http://localhost:3001")
            .status("Connection", "connected")
            .blank()
            .bullet("one")
            .render();
        assert_eq!(lines.len(), 5);
        assert!(lines[1].contains("http://localhost:3001"));
        let api_col = console::strip_ansi_codes(&lines[1]).find("http").unwrap();
        let conn_col = console::strip_ansi_codes(&lines[2]).find("connected").unwrap();
        assert_eq!(api_col, conn_col);
        assert!(lines[3].is_empty());
    }
}
