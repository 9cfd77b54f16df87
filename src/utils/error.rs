//! Revert-reason compaction for scenario results.

/// Collapses whitespace, drops backtraces and caps the length of an error message so revert
/// reasons stay one-line in reports.
pub fn compact_error_message(message: &str, max_len: usize) -> String {
    let raw = match message.split_once("Stack backtrace:") {
        Some((prefix, _)) => prefix,
        None => message,
    };

    let mut compact = String::with_capacity(raw.len().min(max_len.saturating_add(16)));
    let mut prev_ws = false;
    for ch in raw.chars() {
        if ch.is_whitespace() {
            if !prev_ws && !compact.is_empty() {
                compact.push(' ');
            }
            prev_ws = true;
            continue;
        }
        compact.push(ch);
        prev_ws = false;
        if compact.len() > max_len {
            break;
        }
    }
    let trimmed_len = compact.trim_end().len();
    compact.truncate(trimmed_len);
    if compact.len() <= max_len {
        return compact;
    }
    let mut cut = max_len;
    while !compact.is_char_boundary(cut) {
        cut -= 1;
    }
    compact.truncate(cut);
    compact.push_str("...(truncated)");
    compact
}

#[cfg(test)]
mod tests {
    use super::compact_error_message;

    #[test]
    fn test_compact_error_message_drops_backtrace_and_newlines() {
        let raw = "reverted: LOK\n   nested call\nStack backtrace:\n 0: frame";
        assert_eq!(compact_error_message(raw, 160), "reverted: LOK nested call");
    }

    #[test]
    fn test_compact_error_message_truncates_long_reasons() {
        let raw = "x".repeat(400);
        let compact = compact_error_message(&raw, 32);
        assert!(compact.starts_with(&"x".repeat(32)));
        assert!(compact.ends_with("...(truncated)"));
    }
}
