use std::{fmt, str::FromStr};

use super::error::DomainError;

/// Output formats the conversion pipeline can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Rtf,
    Docx,
    Odt,
    Epub,
}

impl DocumentFormat {
    pub const ALL: [DocumentFormat; 4] = [Self::Rtf, Self::Docx, Self::Odt, Self::Epub];

    /// Suffix token used in request paths and as the download file extension.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Rtf => "rtf",
            Self::Docx => "docx",
            Self::Odt => "odt",
            Self::Epub => "epub",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Rtf => "application/rtf; charset=utf-8",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Odt => "application/vnd.oasis.opendocument.text",
            Self::Epub => "application/epub+zip",
        }
    }

    /// Detect the requested format from a path ending in `.<ext>` or equal to `<ext>`.
    pub fn detect(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|format| {
            let ext = format.extension();
            path == ext
                || path
                    .strip_suffix(ext)
                    .is_some_and(|rest| rest.ends_with('.'))
        })
    }

    pub fn as_str(self) -> &'static str {
        self.extension()
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentFormat {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.extension().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| DomainError::validation(format!("unknown document format `{value}`")))
    }
}

/// Discriminates the kind of content item a model was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Repository,
    Document,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Repository => "repository",
            Self::Document => "document",
        }
    }
}

/// Read-only snapshot of a content item, sufficient to render it for conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionModel {
    pub route: String,
    pub title: String,
    pub description: String,
    /// Hierarchy depth; `0` is the root item.
    pub level: usize,
    pub kind: ItemKind,
    pub content_html: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_formats_by_suffix() {
        assert_eq!(DocumentFormat::detect("docs/intro.rtf"), Some(DocumentFormat::Rtf));
        assert_eq!(DocumentFormat::detect("rtf"), Some(DocumentFormat::Rtf));
        assert_eq!(DocumentFormat::detect(".docx"), Some(DocumentFormat::Docx));
        assert_eq!(DocumentFormat::detect("docs/intro"), None);
        assert_eq!(DocumentFormat::detect("docs/myrtf"), None);
    }

    #[test]
    fn parses_format_names() {
        assert_eq!("ODT".parse::<DocumentFormat>().expect("odt"), DocumentFormat::Odt);
        assert!("pdf".parse::<DocumentFormat>().is_err());
    }
}
