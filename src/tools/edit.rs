//! Exact search/replace editing

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("Error: search text must not be empty")]
    EmptySearch,
    #[error("Error: search text not found")]
    NotFound,
    #[error("Error: search text not found (whitespace or indentation may differ)")]
    NotFoundWhitespace,
    #[error("Error: search text found {0} times; use a more specific search string")]
    NotUnique(usize),
}

/// Replace the single occurrence of `search` in `content`
pub fn apply_edit(content: &str, search: &str, replace: &str) -> Result<String, EditError> {
    if search.is_empty() {
        return Err(EditError::EmptySearch);
    }

    match content.matches(search).count() {
        0 => {
            // Only changes the message; a whitespace-only match is still a miss
            if collapse_whitespace(content).contains(&collapse_whitespace(search)) {
                Err(EditError::NotFoundWhitespace)
            } else {
                Err(EditError::NotFound)
            }
        }
        1 => Ok(content.replacen(search, replace, 1)),
        count => Err(EditError::NotUnique(count)),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
