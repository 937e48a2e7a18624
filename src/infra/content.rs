//! Markdown content tree on disk, exposed as conversion models.
//!
//! The item at route `a/b` is `a/b.md`, or, when `a/b` is a directory, that
//! directory's `index.md`, `README.md` or first markdown file by name. The
//! root item is resolved the same way inside the content root. One tree
//! serves every host.

use std::{
    fmt,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use comrak::{
    Arena, format_html,
    nodes::{AstNode, NodeValue},
    options::Options,
    parse_document,
};
use tracing::debug;

use crate::{
    application::repos::{ConversionModelRepo, RepoError},
    domain::{
        conversion::{ConversionModel, ItemKind},
        route::Route,
    },
};

const MARKDOWN_EXTENSION: &str = "md";
const DIRECTORY_INDEX_NAMES: [&str; 2] = ["index.md", "README.md"];
const FRONT_MATTER_DELIMITER: &str = "---";

pub struct FsContentIndex {
    root: PathBuf,
    options: Options<'static>,
}

impl FsContentIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            options: markdown_options(),
        }
    }

    async fn locate(&self, route: &Route) -> Result<Option<(PathBuf, ItemKind)>, RepoError> {
        let mut item_path = self.root.clone();
        item_path.extend(route.segments());

        if !route.is_root() {
            let mut document = item_path.clone().into_os_string();
            document.push(".");
            document.push(MARKDOWN_EXTENSION);
            let document = PathBuf::from(document);
            if is_file(&document).await? {
                return Ok(Some((document, ItemKind::Document)));
            }
        }

        if !is_dir(&item_path).await? {
            return Ok(None);
        }
        Ok(directory_index(&item_path)
            .await?
            .map(|path| (path, ItemKind::Repository)))
    }

    fn build_model(
        &self,
        hostname: &str,
        route: &Route,
        kind: ItemKind,
        path: &Path,
        source: &str,
    ) -> Result<ConversionModel, RepoError> {
        let parsed = parse_item(source, &self.options).map_err(|err| RepoError::InvalidContent {
            path: path.display().to_string(),
            message: format!("failed to render markdown: {err}"),
        })?;
        let title = parsed.title.unwrap_or_else(|| {
            if route.is_root() {
                hostname.to_string()
            } else {
                route.last_component_name().to_string()
            }
        });

        Ok(ConversionModel {
            route: route.value(),
            title,
            description: parsed.description.unwrap_or_default(),
            level: route.depth(),
            kind,
            content_html: parsed.html,
        })
    }
}

#[async_trait]
impl ConversionModelRepo for FsContentIndex {
    async fn find_conversion_model(
        &self,
        hostname: &str,
        route: &Route,
    ) -> Result<Option<ConversionModel>, RepoError> {
        let Some((path, kind)) = self.locate(route).await? else {
            debug!(
                target = "infra::content",
                op = "content::find",
                route = %route,
                "No content item for route"
            );
            return Ok(None);
        };

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|err| RepoError::from_persistence(format!("{}: {err}", path.display())))?;
        let source = String::from_utf8(bytes).map_err(|_| RepoError::InvalidContent {
            path: path.display().to_string(),
            message: "content is not valid UTF-8".to_string(),
        })?;

        debug!(
            target = "infra::content",
            op = "content::find",
            route = %route,
            path = %path.display(),
            kind = kind.as_str(),
            "Content item resolved"
        );

        self.build_model(hostname, route, kind, &path, &source)
            .map(Some)
    }
}

fn markdown_options() -> Options<'static> {
    let mut options = Options::default();
    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.footnotes = true;
    ext.description_lists = true;
    ext.front_matter_delimiter = Some(FRONT_MATTER_DELIMITER.to_string());
    options
}

async fn is_file(path: &Path) -> Result<bool, RepoError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_file()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(RepoError::from_persistence(format!(
            "{}: {err}",
            path.display()
        ))),
    }
}

async fn is_dir(path: &Path) -> Result<bool, RepoError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_dir()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(RepoError::from_persistence(format!(
            "{}: {err}",
            path.display()
        ))),
    }
}

async fn directory_index(dir: &Path) -> Result<Option<PathBuf>, RepoError> {
    for name in DIRECTORY_INDEX_NAMES {
        let candidate = dir.join(name);
        if is_file(&candidate).await? {
            return Ok(Some(candidate));
        }
    }

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|err| RepoError::from_persistence(format!("{}: {err}", dir.display())))?;
    let mut markdown = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|err| RepoError::from_persistence(format!("{}: {err}", dir.display())))?
    {
        let path = entry.path();
        let is_markdown = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(MARKDOWN_EXTENSION));
        if is_markdown && is_file(&path).await? {
            markdown.push(path);
        }
    }

    markdown.sort();
    Ok(markdown.into_iter().next())
}

/// Metadata and HTML taken from one parse of a markdown source.
struct ParsedItem {
    title: Option<String>,
    description: Option<String>,
    html: String,
}

fn parse_item(source: &str, options: &Options<'static>) -> Result<ParsedItem, fmt::Error> {
    let arena = Arena::new();
    let root = parse_document(&arena, source, options);

    let mut title = None;
    let mut description = None;
    let mut child = root.first_child();
    while let Some(node) = child {
        if title.is_none() && heading_level(node) == Some(1) {
            title = Some(collect_inline_text(node));
        } else if description.is_none() && is_paragraph(node) {
            description = Some(collect_inline_text(node));
        }
        child = node.next_sibling();
    }

    let mut html = String::new();
    format_html(root, options, &mut html)?;

    Ok(ParsedItem {
        title: title.filter(|text| !text.is_empty()),
        description: description.filter(|text| !text.is_empty()),
        html,
    })
}

fn heading_level(node: &AstNode<'_>) -> Option<u8> {
    let data = node.data.borrow();
    if let NodeValue::Heading(heading) = &data.value {
        Some(heading.level)
    } else {
        None
    }
}

fn is_paragraph(node: &AstNode<'_>) -> bool {
    matches!(node.data.borrow().value, NodeValue::Paragraph)
}

fn collect_inline_text(node: &AstNode<'_>) -> String {
    fn walk(node: &AstNode<'_>, buffer: &mut String) {
        {
            let data = node.data.borrow();
            match &data.value {
                NodeValue::Text(text) => buffer.push_str(text),
                NodeValue::Code(code) => buffer.push_str(&code.literal),
                NodeValue::LineBreak | NodeValue::SoftBreak => buffer.push(' '),
                _ => {}
            }
        }
        let mut child = node.first_child();
        while let Some(next) = child {
            walk(next, buffer);
            child = next.next_sibling();
        }
    }

    let mut text = String::new();
    walk(node, &mut text);
    text.trim().to_string()
}
