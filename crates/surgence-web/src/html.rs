//! 看板页面渲染

use std::fmt::Write;
use std::time::Duration;
use surgence_workflow::StatusDisplay;

use crate::handlers::BoardView;

/// HTML 转义
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// 渲染整页看板，页面按刷新周期自动重新加载
pub fn render_board(view: &BoardView, legend: &[StatusDisplay], cadence: Duration) -> String {
    let mut html = String::new();

    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta http-equiv=\"refresh\" content=\"{}\">\n<title>Surgery Status Board</title>\n\
         </head>\n<body>\n",
        cadence.as_secs().max(1)
    );

    let heading = if view.is_today {
        "Today's Surgeries".to_string()
    } else {
        format!("Surgeries on {}", view.date.format("%A, %B %-d, %Y"))
    };
    let _ = write!(
        html,
        "<header><h1>{}</h1><span class=\"badge\">{}</span>",
        escape(&heading),
        view.badge
    );
    if let Some(fetched_at) = view.fetched_at {
        let _ = write!(
            html,
            "<p class=\"updated\">Last updated {}</p>",
            fetched_at.format("%H:%M:%S UTC")
        );
    }
    html.push_str("</header>\n");

    if let Some(error) = &view.error {
        let _ = write!(html, "<p class=\"error\">{}</p>\n", escape(error));
    }

    if view.loading {
        html.push_str("<p class=\"loading\">Loading…</p>\n");
    } else if view.entries.is_empty() {
        html.push_str("<p class=\"empty\">No surgeries scheduled.</p>\n");
    } else {
        html.push_str("<table>\n<tr><th>Patient</th><th>Time</th><th>Status</th><th>Details</th></tr>\n");
        for entry in &view.entries {
            let who = match &entry.identity {
                Some(identity) => format!("{} {}", entry.ordinal, escape(&identity.name)),
                None => entry.ordinal.to_string(),
            };
            let time = entry
                .scheduled_time
                .map(|t| t.format("%H:%M").to_string())
                .unwrap_or_else(|| "--:--".to_string());
            let _ = write!(
                html,
                "<tr><td>{}</td><td>{}</td><td style=\"color:{}\">{} {}</td><td>{}</td></tr>\n",
                who,
                time,
                entry.status.color.hex(),
                entry.status.icon.glyph(),
                escape(&entry.status.label),
                escape(&entry.status.message)
            );
        }
        html.push_str("</table>\n");
    }

    html.push_str("<footer><ul class=\"legend\">\n");
    for item in legend {
        let _ = write!(
            html,
            "<li style=\"color:{}\">{} {}</li>\n",
            item.color.hex(),
            item.icon.glyph(),
            escape(&item.label)
        );
    }
    html.push_str("</ul></footer>\n</body>\n</html>\n");
    html
}
