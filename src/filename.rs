use crate::models::{Episode, SUPPORTED_AUDIO_EXTENSIONS};

/// Maximum length for the title portion of a filename
const MAX_TITLE_LENGTH: usize = 100;

fn is_valid_filename_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ')
}

/// Local filename stem for a downloaded episode.
///
/// Format: "YYYY-MM-DD-sanitized-title", "undated-..." when the upload date is
/// unknown. Titles that sanitize to nothing fall back to the episode id.
pub fn generate_filename_stem(episode: &Episode) -> String {
    let date_prefix = episode
        .created_at
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "undated".to_string());

    let mut title = sanitize_title(&episode.title);
    if title.is_empty() {
        title = sanitize_title(&episode.id);
    }
    if title.is_empty() {
        title = "episode".to_string();
    }

    format!("{date_prefix}-{title}")
}

/// Extension of the stored audio file, "mp3" when it is missing or unknown
pub fn audio_extension(episode: &Episode) -> String {
    episode
        .audio_file
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| SUPPORTED_AUDIO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or_else(|| "mp3".to_string())
}

/// Complete local filename for an episode
pub fn generate_filename(episode: &Episode) -> String {
    format!(
        "{}.{}",
        generate_filename_stem(episode),
        audio_extension(episode)
    )
}

fn sanitize_title(title: &str) -> String {
    let sanitized: String = title
        .chars()
        .map(|c| if is_valid_filename_char(c) { c } else { '-' })
        .collect();

    let collapsed = collapse_separators(&sanitized);
    let trimmed = collapsed.trim_matches(|c: char| c == '-' || c == '.' || c.is_whitespace());

    truncate_at_boundary(trimmed, MAX_TITLE_LENGTH)
}

/// Collapse runs of spaces and dashes into a single dash
fn collapse_separators(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut last_was_separator = false;

    for c in s.chars() {
        if c == '-' || c.is_whitespace() {
            if !last_was_separator {
                result.push('-');
                last_was_separator = true;
            }
        } else {
            result.push(c);
            last_was_separator = false;
        }
    }

    result
}

fn truncate_at_boundary(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }

    // Input is ASCII at this point, so byte and char positions agree
    let truncated = &s[..max_len];
    if let Some(pos) = truncated.rfind('-')
        && pos > max_len / 2
    {
        return truncated[..pos].to_string();
    }

    truncated.trim_end_matches('-').to_string()
}
