//! Canonical content routes.
//!
//! A [`Route`] is the slash-separated identifier of a content item as the
//! public site exposes it (`docs/guides/install`). Routes are only built from
//! text that survives [`Route::parse`], so everything downstream (content
//! lookup, download filenames) can rely on the segments being free of
//! separators, control characters and characters that are unsafe in a quoted
//! header value or a filename.

use std::fmt;

use thiserror::Error;

const SEPARATOR: char = '/';
const FORBIDDEN_CHARS: [char; 7] = ['<', '>', '"', '|', '?', '*', ':'];

/// Errors raised while parsing a route.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("route `{input}` is malformed: {reason}")]
    Malformed { input: String, reason: &'static str },
}

impl RouteError {
    fn malformed(input: &str, reason: &'static str) -> Self {
        Self::Malformed {
            input: input.to_string(),
            reason,
        }
    }
}

/// Immutable, normalised content route. The empty route addresses the root item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Route {
    segments: Vec<String>,
}

impl Route {
    /// Parse a request path into a route.
    ///
    /// Backslashes are treated as separators, empty segments are dropped and
    /// every segment is trimmed of surrounding whitespace.
    pub fn parse(input: &str) -> Result<Self, RouteError> {
        if input.chars().any(char::is_control) {
            return Err(RouteError::malformed(input, "contains control characters"));
        }
        if input.contains(FORBIDDEN_CHARS) {
            return Err(RouteError::malformed(input, "contains reserved characters"));
        }

        let mut segments = Vec::new();
        for raw in input.split([SEPARATOR, '\\']) {
            let segment = raw.trim();
            match segment {
                "" | "." => continue,
                ".." => return Err(RouteError::malformed(input, "contains a parent segment")),
                _ => segments.push(segment.to_string()),
            }
        }

        Ok(Self { segments })
    }

    /// Strip a trailing format token (`rtf`, then a dangling `.`) before parsing.
    ///
    /// `docs/intro.rtf`, `docs/intrortf` and `docs/intro.` all resolve to the
    /// same route as `docs/intro` for the token `rtf`.
    pub fn from_suffixed(path: &str, token: &str) -> Result<Self, RouteError> {
        let stripped = path.strip_suffix(token).unwrap_or(path);
        let stripped = stripped.strip_suffix('.').unwrap_or(stripped);
        Self::parse(stripped)
    }

    /// Parse text that must form exactly one route segment.
    pub fn component(input: &str) -> Result<Self, RouteError> {
        let route = Self::parse(input)?;
        match route.segments.len() {
            1 => Ok(route),
            0 => Err(RouteError::malformed(input, "component is empty")),
            _ => Err(RouteError::malformed(input, "component spans several segments")),
        }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(String::as_str)
    }

    /// Name of the last segment, or an empty string for the root route.
    pub fn last_component_name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    /// Canonical string form (`a/b/c`, empty for the root).
    pub fn value(&self) -> String {
        self.segments.join("/")
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.value())
    }
}
