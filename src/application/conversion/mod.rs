//! Request-triggered document conversion.
//!
//! A conversion resolves the requested route to a [`ConversionModel`], renders
//! it to intermediate HTML, hands that to the configured external converter
//! and returns the converter's output as an open file. Both intermediate and
//! output artifacts live in the scratch directory and are deleted once their
//! guards drop; the output guard travels with the returned document so the
//! caller decides when it is released.

use std::{sync::Arc, time::Instant};

use metrics::{counter, histogram};
use thiserror::Error;
use tokio::fs::File;
use tracing::{info, warn};

use crate::{
    application::repos::{ConversionModelRepo, RepoError},
    config::ConversionSettings,
    domain::{
        conversion::{ConversionModel, DocumentFormat},
        route::{Route, RouteError},
    },
    infra::scratch::{ScratchError, ScratchPath, ScratchSpace},
};

mod converter;
mod filename;
mod render;

pub use converter::{ConverterError, ExternalConverter};
pub use filename::derive_filename;
pub use render::{
    CONVERSION_TEMPLATE_NAME, ConversionTemplate, StaticTemplateProvider, TemplateProvider,
    TemplateRenderer,
};

const SOURCE_CATEGORY: &str = "html-source";
const SOURCE_EXTENSION: &str = "html";

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error(transparent)]
    MalformedRoute(#[from] RouteError),
    #[error("failed to look up content for `{route}`")]
    Lookup {
        route: Route,
        #[source]
        source: RepoError,
    },
    #[error("template `{name}` is not configured for host `{hostname}`")]
    TemplateMissing {
        hostname: String,
        name: &'static str,
    },
    #[error("failed to render conversion template")]
    Template(#[source] askama::Error),
    #[error(transparent)]
    Artifact(#[from] ScratchError),
    #[error(transparent)]
    Converter(#[from] ConverterError),
}

impl ConversionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MalformedRoute(_) => "malformed_route",
            Self::Lookup { .. } => "lookup",
            Self::TemplateMissing { .. } => "template_missing",
            Self::Template(_) => "template",
            Self::Artifact(_) => "artifact",
            Self::Converter(ConverterError::TimedOut(_)) => "converter_timeout",
            Self::Converter(_) => "converter",
        }
    }
}

/// Why a format cannot be served right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    Disabled,
    ToolNotConfigured,
}

impl Unavailable {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::ToolNotConfigured => "tool_not_configured",
        }
    }
}

/// Result of a conversion request that did not fail hard.
#[derive(Debug)]
pub enum ConversionOutcome {
    Unavailable(Unavailable),
    NotFound(Route),
    Converted(ConvertedDocument),
}

impl ConversionOutcome {
    fn result_label(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::NotFound(_) => "not_found",
            Self::Converted(_) => "converted",
        }
    }
}

/// Converter output ready to be streamed. The backing file is deleted when
/// the document (or the `artifact` moved out of it) is dropped.
#[derive(Debug)]
pub struct ConvertedDocument {
    pub format: DocumentFormat,
    pub filename: String,
    pub len: u64,
    pub file: File,
    pub artifact: ScratchPath,
}

#[derive(Clone)]
pub struct ConversionService {
    settings: Arc<ConversionSettings>,
    models: Arc<dyn ConversionModelRepo>,
    renderer: TemplateRenderer,
    scratch: ScratchSpace,
}

impl ConversionService {
    pub fn new(
        settings: Arc<ConversionSettings>,
        models: Arc<dyn ConversionModelRepo>,
        templates: Arc<dyn TemplateProvider>,
    ) -> Result<Self, ScratchError> {
        let scratch = ScratchSpace::new(&settings.scratch_dir)?;
        Ok(Self {
            settings,
            models,
            renderer: TemplateRenderer::new(templates),
            scratch,
        })
    }

    /// Convert the item addressed by `raw_path` (still carrying its format suffix).
    pub async fn convert(
        &self,
        hostname: &str,
        format: DocumentFormat,
        raw_path: &str,
    ) -> Result<ConversionOutcome, ConversionError> {
        let started_at = Instant::now();
        let result = self.run(hostname, format, raw_path).await;
        let elapsed_ms = started_at.elapsed().as_millis() as u64;

        let result_label = match &result {
            Ok(outcome) => outcome.result_label(),
            Err(_) => "error",
        };
        counter!(
            "folio_conversion_total",
            "format" => format.as_str(),
            "result" => result_label
        )
        .increment(1);
        histogram!("folio_conversion_ms", "format" => format.as_str()).record(elapsed_ms as f64);

        match &result {
            Ok(ConversionOutcome::Unavailable(reason)) => warn!(
                target = "application::conversion",
                op = "conversion::convert",
                hostname = hostname,
                format = format.as_str(),
                path = raw_path,
                reason = reason.as_str(),
                "Conversion requested for an unavailable format"
            ),
            Ok(ConversionOutcome::NotFound(route)) => info!(
                target = "application::conversion",
                op = "conversion::convert",
                result = "not_found",
                hostname = hostname,
                format = format.as_str(),
                route = %route,
                elapsed_ms,
                "No content for conversion request"
            ),
            Ok(ConversionOutcome::Converted(document)) => info!(
                target = "application::conversion",
                op = "conversion::convert",
                result = "converted",
                hostname = hostname,
                format = format.as_str(),
                filename = %document.filename,
                bytes = document.len,
                elapsed_ms,
                "Document converted"
            ),
            Err(err) => warn!(
                target = "application::conversion",
                op = "conversion::convert",
                result = "error",
                hostname = hostname,
                format = format.as_str(),
                path = raw_path,
                elapsed_ms,
                error_code = err.error_code(),
                error = %err,
                "Conversion failed"
            ),
        }

        result
    }

    async fn run(
        &self,
        hostname: &str,
        format: DocumentFormat,
        raw_path: &str,
    ) -> Result<ConversionOutcome, ConversionError> {
        let route = Route::from_suffixed(raw_path, format.extension())?;

        let converter_settings = self.settings.converter(format);
        if !converter_settings.enabled {
            return Ok(ConversionOutcome::Unavailable(Unavailable::Disabled));
        }
        let Some(tool) = converter_settings.tool.as_deref() else {
            return Ok(ConversionOutcome::Unavailable(
                Unavailable::ToolNotConfigured,
            ));
        };

        let model = self
            .models
            .find_conversion_model(hostname, &route)
            .await
            .map_err(|source| ConversionError::Lookup {
                route: route.clone(),
                source,
            })?;
        let Some(model) = model else {
            return Ok(ConversionOutcome::NotFound(route));
        };

        let html = self.renderer.render(hostname, &model)?;

        let source = self.scratch.allocate(SOURCE_CATEGORY, SOURCE_EXTENSION)?;
        source.write(html.as_bytes()).await?;

        let target_category = format!("{}-target", format.extension());
        let target = self.scratch.allocate(&target_category, format.extension())?;

        let converter = ExternalConverter::new(
            tool,
            &converter_settings.args,
            self.scratch.dir(),
            self.settings.timeout,
        )?;
        converter.convert(source.path(), target.path()).await?;
        drop(source);

        self.open_output(&model, format, target).await
    }

    async fn open_output(
        &self,
        model: &ConversionModel,
        format: DocumentFormat,
        target: ScratchPath,
    ) -> Result<ConversionOutcome, ConversionError> {
        let file = target.open_read().await?;
        let len = file
            .metadata()
            .await
            .map_err(|source| ScratchError::Io {
                op: "inspect",
                path: target.path().to_path_buf(),
                source,
            })?
            .len();

        Ok(ConversionOutcome::Converted(ConvertedDocument {
            format,
            filename: derive_filename(model, format),
            len,
            file,
            artifact: target,
        }))
    }
}
