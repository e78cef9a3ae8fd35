use thiserror::Error;

use crate::core::errors::SubdiffError;

/// Failure while rendering or writing report pages
#[derive(Error, Debug)]
pub enum ReportError {
    /// Template failed to parse
    #[error("Template error: {0}")]
    Template(#[from] handlebars::TemplateError),
    /// Template failed to render
    #[error("Render error: {0}")]
    Render(#[from] handlebars::RenderError),
    /// Page or asset could not be written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Page data could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ReportError> for SubdiffError {
    fn from(err: ReportError) -> Self {
        SubdiffError::report_io("failed to produce report", err)
    }
}
