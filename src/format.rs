use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Clip to a display width, marking the cut with an ellipsis.
pub fn truncate_unicode(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    let mut out = String::new();
    let mut width = 0;
    for ch in s.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if width + ch_width > max_width.saturating_sub(1) {
            out.push('\u{2026}');
            break;
        }
        out.push(ch);
        width += ch_width;
    }
    out
}

/// Left-align in a fixed-width table cell, by display width.
pub fn cell(s: &str, width: usize) -> String {
    let clipped = truncate_unicode(s, width);
    let pad = width.saturating_sub(clipped.width());
    format!("{clipped}{}", " ".repeat(pad))
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    match bytes {
        b if b >= TB => format!("{:.1} TB", b as f64 / TB as f64),
        b if b >= GB => format!("{:.1} GB", b as f64 / GB as f64),
        b if b >= MB => format!("{:.1} MB", b as f64 / MB as f64),
        b if b >= KB => format!("{:.0} KB", b as f64 / KB as f64),
        b => format!("{b} B"),
    }
}

pub fn format_percent(value: f32) -> String {
    format!("{value:.1}%")
}

pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m {}s", secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_pick_largest_unit() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
        assert_eq!(format_bytes(2 * 1024 * 1024 * 1024 * 1024), "2.0 TB");
    }

    #[test]
    fn truncate_respects_display_width() {
        assert_eq!(truncate_unicode("chrome", 10), "chrome");
        assert_eq!(truncate_unicode("chromium-browser", 6), "chrom\u{2026}");
        // wide glyphs count double
        assert_eq!(truncate_unicode("日本語テキスト", 5), "日本\u{2026}");
    }

    #[test]
    fn cell_pads_to_width() {
        assert_eq!(cell("ab", 4), "ab  ");
        assert_eq!(cell("abcdef", 4), "abc\u{2026}");
    }

    #[test]
    fn uptime_is_compact() {
        assert_eq!(format_uptime(59), "0m 59s");
        assert_eq!(format_uptime(3 * 3600 + 120), "3h 2m");
        assert_eq!(format_uptime(2 * 86_400 + 3600), "2d 1h 0m");
    }

    #[test]
    fn percent_has_one_decimal() {
        assert_eq!(format_percent(45.26), "45.3%");
        assert_eq!(format_percent(0.0), "0.0%");
    }
}
