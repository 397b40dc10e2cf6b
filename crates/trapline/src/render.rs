//! Plain-text rendering of the inbox

use std::fmt::Write;

use trapline_core::{Message, SyncEvent};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Human readable byte count
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// One inbox row
pub fn summary_line(message: &Message) -> String {
    let s = &message.summary;
    let subject = if s.subject.is_empty() {
        "(no subject)"
    } else {
        s.subject.as_str()
    };
    format!(
        "{:>6}  {}  {:<32}  {}  [{}]",
        s.id,
        s.created_at.format(DATE_FORMAT),
        s.sender,
        subject,
        human_size(s.size)
    )
}

/// Headers, formats and attachments of a loaded message
pub fn detail(message: &Message) -> String {
    let s = &message.summary;
    let mut out = String::new();

    let _ = writeln!(out, "Message {}", s.id);
    let _ = writeln!(out, "From:    {}", s.sender);
    let _ = writeln!(out, "To:      {}", s.recipients.to.join(", "));
    if !s.recipients.cc.is_empty() {
        let _ = writeln!(out, "Cc:      {}", s.recipients.cc.join(", "));
    }
    if !s.recipients.bcc.is_empty() {
        let _ = writeln!(out, "Bcc:     {}", s.recipients.bcc.join(", "));
    }
    let _ = writeln!(out, "Date:    {}", s.created_at.format(DATE_FORMAT));
    let _ = writeln!(out, "Subject: {}", s.subject);
    let _ = writeln!(out, "Size:    {}", human_size(s.size));

    if let Some(href) = &message.href {
        let _ = writeln!(out, "Source:  {}", href);
    }
    if !message.formats.is_empty() {
        let _ = writeln!(out, "Formats:");
        for (name, url) in &message.formats {
            let _ = writeln!(out, "  {:<8} {}", name, url);
        }
    }
    if !message.attachments.is_empty() {
        let _ = writeln!(out, "Attachments:");
        for attachment in &message.attachments {
            let name = attachment.filename.as_deref().unwrap_or("(unnamed)");
            let size = attachment.size.map(human_size).unwrap_or_default();
            let _ = writeln!(out, "  {} {} {}", name, size, attachment.href);
        }
    }

    out
}

/// Status line for a sync event, if it is worth printing
pub fn event_line(event: &SyncEvent) -> Option<String> {
    match event {
        SyncEvent::Connected => Some("* connected".to_string()),
        SyncEvent::Disconnected => Some("* disconnected, waiting to reconnect".to_string()),
        SyncEvent::Resynced { count } => Some(format!("* {} message(s) in inbox", count)),
        SyncEvent::MessageAdded(message) => Some(format!("+ {}", summary_line(message))),
        SyncEvent::MessageDeleted { id, .. } => Some(format!("- {}", id)),
        SyncEvent::Cleared => Some("* inbox cleared".to_string()),
        SyncEvent::Error { message } => Some(format!("! {}", message)),
    }
}
