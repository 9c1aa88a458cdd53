//! Plan exporters.
//!
//! CSV, ICS and HTML are pure functions over a [`Plan`]. PDF goes through a
//! [`PdfRenderer`] capability that callers construct once at startup and
//! pass around explicitly; when it is absent, PDF export reports
//! [`ExportError::PdfUnavailable`].

pub mod csv;
pub mod html;
pub mod ics;
pub mod pdf;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::model::Plan;

pub use self::csv::schedule_csv;
pub use self::html::html_report;
pub use self::ics::calendar_ics;
pub use self::pdf::PdfRenderer;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("PDF export is unavailable: no wkhtmltopdf binary was found")]
    PdfUnavailable,

    #[error("PDF rendering failed: {0}")]
    PdfFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Output formats understood by [`export`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Ics,
    Html,
    Pdf,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Ics => "ics",
            Self::Html => "html",
            Self::Pdf => "pdf",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Csv => "text/csv; charset=utf-8",
            Self::Ics => "text/calendar; charset=utf-8",
            Self::Html => "text/html; charset=utf-8",
            Self::Pdf => "application/pdf",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "ics" | "ical" => Ok(Self::Ics),
            "html" => Ok(Self::Html),
            "pdf" => Ok(Self::Pdf),
            _ => Err(FormatParseError(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("unknown export format {0:?} (expected csv, ics, html, or pdf)")]
pub struct FormatParseError(pub String);

/// Render `plan` in `format`. `title` heads the HTML and PDF reports.
pub async fn export(
    plan: &Plan,
    title: &str,
    format: ExportFormat,
    pdf: Option<&PdfRenderer>,
) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Csv => Ok(schedule_csv(plan).into_bytes()),
        ExportFormat::Ics => Ok(calendar_ics(plan).into_bytes()),
        ExportFormat::Html => Ok(html_report(plan, title).into_bytes()),
        ExportFormat::Pdf => {
            let renderer = pdf.ok_or(ExportError::PdfUnavailable)?;
            renderer.render(&html_report(plan, title)).await
        }
    }
}

/// Format hours without a trailing `.0` for whole numbers.
pub(crate) fn hours(value: f64) -> String {
    format!("{value}")
}
