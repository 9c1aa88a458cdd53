use std::io::Write;
use std::path::Path;

use anyhow::Context;

use plannerium_core::export::{self, ExportFormat, PdfRenderer};
use plannerium_store::ProjectStore;

/// Export a saved project's plan to a file or stdout.
pub async fn run_export(
    store: &ProjectStore,
    pdf: Option<&PdfRenderer>,
    name: &str,
    format: ExportFormat,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let project = store
        .load(name)
        .await?
        .with_context(|| format!("project {name:?} not found"))?;

    let bytes = export::export(&project.plan, &project.project_name, format, pdf)
        .await
        .with_context(|| format!("failed to export {name:?} as {format}"))?;

    let mut writer: Box<dyn Write> = if let Some(path) = output {
        Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("cannot create output file: {}", path.display()))?,
        )
    } else {
        Box::new(std::io::stdout().lock())
    };
    writer.write_all(&bytes)?;
    writer.flush()?;

    if let Some(path) = output {
        println!(
            "Exported {name} as {format} ({} bytes) to {}",
            bytes.len(),
            path.display()
        );
    }

    Ok(())
}
