//! Markup templates for progress bars.

use crate::status::OperationStatus;

/// Escape text for inclusion in markup.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Progress bar shown inside an operation's status cell.
pub fn operation_bar_html(status: OperationStatus, percentage: u8) -> String {
    format!(
        concat!(
            "<div class=\"operation-status-container\">",
            "<div class=\"operation-status-bar\">",
            "<div class=\"operation-status-fill {token}\" style=\"width: {pct}%\"></div>",
            "</div>",
            "</div>"
        ),
        token = status.token(),
        pct = percentage,
    )
}

/// Main batch status: label, aggregate bar and "P% (completed/total)" text.
pub fn main_status_html(
    label: &str,
    status: OperationStatus,
    percentage: u8,
    counts: Option<(u64, u64)>,
) -> String {
    let progress_text = match counts {
        Some((completed, total)) => format!("{}% ({}/{})", percentage, completed, total),
        None => format!("{}%", percentage),
    };

    format!(
        concat!(
            "<div class=\"upgrade-status-container\">",
            "<span class=\"upgrade-status-{token}\">{label}</span>",
            "<div class=\"upgrade-progress-bar\">",
            "<div class=\"upgrade-progress-fill {token}\" style=\"width: {pct}%\"></div>",
            "</div>",
            "<span class=\"upgrade-progress-text\">{text}</span>",
            "</div>"
        ),
        token = status.token(),
        label = escape_html(label),
        pct = percentage,
        text = progress_text,
    )
}
