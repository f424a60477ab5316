// Display helpers for file listings

use regex::Regex;
use std::sync::LazyLock;

/// Format a byte count for display ("512 B", "3 KB", "12 MB", "2 GB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    let scaled = |unit: u64| (bytes as f64 / unit as f64).round() as u64;
    if bytes >= GB {
        format!("{} GB", scaled(GB))
    } else if bytes >= MB {
        format!("{} MB", scaled(MB))
    } else if bytes >= KB {
        format!("{} KB", scaled(KB))
    } else {
        format!("{} B", bytes)
    }
}

static PREVIEWABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^image/(png|webp|svg|jpeg|jpg|gif)|^application/pdf|^text/|^audio/|^video/|application/x-empty")
        .expect("PREVIEWABLE_RE")
});

/// Whether a file with this content type can be shown inline
pub fn is_previewable(mime: Option<&str>) -> bool {
    match mime {
        Some(mime) if !mime.is_empty() => PREVIEWABLE_RE.is_match(mime),
        _ => false,
    }
}
