use thiserror::Error;

/// Errors produced by type construction and validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("{kind} must not be empty")]
    Empty { kind: &'static str },

    #[error("{kind} {value:?} is reserved")]
    Reserved { kind: &'static str, value: String },

    #[error("{kind} {value:?} contains forbidden character {ch:?}")]
    ForbiddenChar {
        kind: &'static str,
        value: String,
        ch: char,
    },

    #[error("{kind} {value:?} must not end with '.'")]
    TrailingDot { kind: &'static str, value: String },

    #[error("invalid field name {0:?}: only ASCII letters, digits and '_' are allowed")]
    InvalidField(String),
}

/// Shared validation for names that end up as a single path component.
pub(crate) fn validate_component(
    kind: &'static str,
    value: &str,
    extra_forbidden: &[char],
) -> Result<(), TypeError> {
    if value.is_empty() {
        return Err(TypeError::Empty { kind });
    }
    if value == "." || value == ".." {
        return Err(TypeError::Reserved {
            kind,
            value: value.to_string(),
        });
    }
    const PATH_FORBIDDEN: [char; 5] = ['/', '\\', '\0', '\r', '\n'];
    if let Some(ch) = value
        .chars()
        .find(|c| PATH_FORBIDDEN.contains(c) || extra_forbidden.contains(c))
    {
        return Err(TypeError::ForbiddenChar {
            kind,
            value: value.to_string(),
            ch,
        });
    }
    Ok(())
}
