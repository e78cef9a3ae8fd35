use std::fs;
use std::path::Path;

use super::error::ReportError;

pub(super) const REPORT_CSS: &str = include_str!("./report.css");

/// Write the report stylesheet, preferring a same-named file in `templates_dir`
pub(super) fn write_stylesheet(
    output_dir: &Path,
    stylesheet_name: &str,
    templates_dir: Option<&Path>,
) -> Result<(), ReportError> {
    if !output_dir.exists() {
        fs::create_dir_all(output_dir)?;
    }

    if let Some(custom) = templates_dir.map(|dir| dir.join(stylesheet_name)) {
        if custom.is_file() {
            fs::copy(custom, output_dir.join(stylesheet_name))?;
            return Ok(());
        }
    }

    fs::write(output_dir.join(stylesheet_name), REPORT_CSS)?;
    Ok(())
}
