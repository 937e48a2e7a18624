use std::{collections::HashMap, sync::Arc};

use askama::Template;
use tracing::{debug, warn};

use crate::{
    domain::conversion::ConversionModel,
    presentation::views::{ConversionDocumentTemplate, ConversionPlainTemplate},
};

use super::ConversionError;

/// Name of the sub-template every host uses to render conversion input.
pub const CONVERSION_TEMPLATE_NAME: &str = "conversion";

/// Compiled layouts available for conversion input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionTemplate {
    /// Full document with title and description header.
    Document,
    /// Body content only.
    Plain,
}

impl ConversionTemplate {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Plain => "plain",
        }
    }

    fn render(self, model: &ConversionModel) -> Result<String, askama::Error> {
        match self {
            Self::Document => ConversionDocumentTemplate { model }.render(),
            Self::Plain => ConversionPlainTemplate { model }.render(),
        }
    }
}

/// Resolves named sub-templates per host.
pub trait TemplateProvider: Send + Sync {
    fn sub_template(&self, hostname: &str, name: &str) -> Option<ConversionTemplate>;
}

/// Fixed template table: one default plus optional per-host overrides.
#[derive(Debug, Clone, Default)]
pub struct StaticTemplateProvider {
    default: Option<ConversionTemplate>,
    hosts: HashMap<String, ConversionTemplate>,
}

impl StaticTemplateProvider {
    pub fn new(default: ConversionTemplate) -> Self {
        Self {
            default: Some(default),
            hosts: HashMap::new(),
        }
    }

    /// A provider without any conversion template.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, hostname: impl Into<String>, template: ConversionTemplate) -> Self {
        self.hosts
            .insert(hostname.into().to_ascii_lowercase(), template);
        self
    }
}

impl TemplateProvider for StaticTemplateProvider {
    fn sub_template(&self, hostname: &str, name: &str) -> Option<ConversionTemplate> {
        if name != CONVERSION_TEMPLATE_NAME {
            return None;
        }
        self.hosts
            .get(&hostname.to_ascii_lowercase())
            .copied()
            .or(self.default)
    }
}

/// Renders conversion models into intermediate HTML.
#[derive(Clone)]
pub struct TemplateRenderer {
    provider: Arc<dyn TemplateProvider>,
}

impl TemplateRenderer {
    pub fn new(provider: Arc<dyn TemplateProvider>) -> Self {
        Self { provider }
    }

    pub fn render(&self, hostname: &str, model: &ConversionModel) -> Result<String, ConversionError> {
        let Some(template) = self
            .provider
            .sub_template(hostname, CONVERSION_TEMPLATE_NAME)
        else {
            warn!(
                target = "application::conversion::render",
                op = "render::conversion",
                hostname = hostname,
                template = CONVERSION_TEMPLATE_NAME,
                "Conversion template missing for host"
            );
            return Err(ConversionError::TemplateMissing {
                hostname: hostname.to_string(),
                name: CONVERSION_TEMPLATE_NAME,
            });
        };

        let html = template.render(model).map_err(ConversionError::Template)?;

        debug!(
            target = "application::conversion::render",
            op = "render::conversion",
            hostname = hostname,
            template = template.as_str(),
            route = %model.route,
            html_bytes = html.len(),
            "Conversion input rendered"
        );

        Ok(html)
    }
}
