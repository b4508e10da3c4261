//! CLI output formatting utilities.

use console::style;

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a video line for listings.
    pub fn video_line(title: &str, id: &str, status: &str, duration: Option<i64>) {
        let duration_str = duration
            .map(format_duration)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {} {} ({}, {}, {})",
            style("*").cyan(),
            style(title).bold(),
            style(id).dim(),
            status,
            duration_str
        );
    }

    /// Print one search result.
    pub fn search_result(title: &str, timestamp: &str, score: f64, text: &str) {
        println!(
            "\n{} {} {}",
            style(title).bold(),
            style(format!("@ {}", timestamp)).cyan(),
            style(format!("(score {:.4})", score)).dim()
        );
        println!("  {}", text);
    }

    /// Print a citation line.
    pub fn citation(title: &str, timestamp: &str, text: &str) {
        let snippet: String = text.chars().take(120).collect();
        println!(
            "  {} {} {} {}",
            style("[").dim(),
            style(format!("{} @ {}", title, timestamp)).cyan(),
            style("]").dim(),
            style(snippet).dim()
        );
    }
}

/// Render whole seconds as H:MM:SS or M:SS.
pub fn format_duration(total_seconds: i64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(431), "7:11");
        assert_eq!(format_duration(3725), "1:02:05");
    }
}
