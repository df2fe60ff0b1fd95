//! Path utilities

/// Truncate a `/` separated path for display, keeping the file name
pub fn truncate_path(path: &str, max_len: usize) -> String {
    if path.len() <= max_len {
        return path.to_string();
    }

    let filename = path.rsplit('/').next().unwrap_or(path);
    if filename.len() + 4 >= max_len {
        let start = filename
            .char_indices()
            .map(|(i, _)| i)
            .find(|&i| filename.len() - i + 3 <= max_len)
            .unwrap_or(filename.len());
        return format!("...{}", &filename[start..]);
    }

    let budget = max_len - filename.len() - 4;
    let mut prefix = String::new();
    for part in path.split('/') {
        if prefix.len() + part.len() + 1 > budget {
            break;
        }
        prefix.push_str(part);
        prefix.push('/');
    }
    format!("{prefix}.../{filename}")
}

/// Case-insensitive wildcard match, `*` matching any run of characters
pub fn matches_pattern(text: &str, pattern: &str) -> bool {
    if pattern.is_empty() || pattern == "*" {
        return true;
    }

    let text = text.to_lowercase().replace('\\', "/");
    let pattern = pattern.to_lowercase().replace('\\', "/");
    if !pattern.contains('*') {
        return text == pattern;
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    let last = parts.len() - 1;
    let mut pos = 0;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            if !text.starts_with(part) {
                return false;
            }
            pos = part.len();
        } else if i == last {
            return text.len() >= pos + part.len() && text.ends_with(part);
        } else if let Some(found) = text[pos..].find(part) {
            pos += found + part.len();
        } else {
            return false;
        }
    }
    true
}
