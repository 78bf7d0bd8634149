//! Output file names for generated letters.

const SLUG_MAX_LEN: usize = 40;

/// Sanitize a string for use in filenames.
pub fn sanitize_filename(name: &str, fallback: &str) -> String {
    let mut result = String::new();
    let mut last_dash = false;

    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            result.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if (ch.is_whitespace() || ch == '-' || ch == '_') && !last_dash && !result.is_empty() {
            result.push('-');
            last_dash = true;
        }
    }

    result.truncate(SLUG_MAX_LEN);
    let result = result.trim_matches('-');
    if result.is_empty() {
        return fallback.to_string();
    }
    result.to_string()
}

/// Deterministic stems of the form `letter-<seq>-<slug>`.
///
/// The sequence number is the 1-based position in the batch, so stems never
/// collide within one batch whatever the recipients contain.
#[derive(Debug, Clone, Copy)]
pub struct LetterNaming {
    width: usize,
}

impl LetterNaming {
    pub fn for_batch(count: usize) -> Self {
        let digits = count.max(1).to_string().len();
        Self {
            width: digits.max(3),
        }
    }

    pub fn stem(&self, index: usize, display_name: Option<&str>) -> String {
        format!(
            "letter-{:0width$}-{}",
            index + 1,
            sanitize_filename(display_name.unwrap_or(""), "recipient"),
            width = self.width
        )
    }
}
