use std::fs;
use std::path::Path;

/// Parses one `.env` line into a key/value pair, stripping inline comments and matching
/// quotes. Blank lines and comments yield `None`.
pub fn parse_env_line(line: &str) -> Option<(String, String)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
    let (key, value) = trimmed.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    let value = value.trim();
    let quoted = value.len() >= 2
        && ((value.starts_with('"') && value[1..].contains('"'))
            || (value.starts_with('\'') && value[1..].contains('\'')));
    let parsed = if quoted {
        let quote = &value[..1];
        let rest = &value[1..];
        let end = rest.find(quote).unwrap_or(rest.len());
        rest[..end].to_string()
    } else {
        value.split('#').next().unwrap_or("").trim().to_string()
    };
    Some((key.to_string(), parsed))
}

/// Loads `.env` from the working directory without overriding variables that are already set.
pub fn load_dot_env() {
    let path = Path::new(".env");
    if !path.exists() {
        return;
    }

    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[ENV] Failed to read .env: {}", e);
            return;
        }
    };

    for (key, value) in content.lines().filter_map(parse_env_line) {
        if std::env::var_os(&key).is_some() {
            continue;
        }
        std::env::set_var(key, value);
    }
}

pub fn harden_env_setup() {
    load_dot_env();
    if std::env::var("HARNESS_POOL_BACKEND").is_err() {
        eprintln!("[ENV] HARNESS_POOL_BACKEND is not set; using the in-memory reference pool");
    }
}
