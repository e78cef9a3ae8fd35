use std::fs;
use std::path::Path;

use handlebars::Handlebars;
use tracing::debug;

use super::error::ReportError;

pub(super) const INDEX_TEMPLATE: &str = "index";
pub(super) const SUBMISSION_TEMPLATE: &str = "submission";
pub(super) const SOURCE_TEMPLATE: &str = "source_page";
pub(super) const DIFF_TEMPLATE: &str = "diff_page";
pub(super) const COMPARISON_TEMPLATE: &str = "comparison";
pub(super) const FIGURE_TEMPLATE: &str = "similarity_svg";

const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    (INDEX_TEMPLATE, include_str!("./index.hbs")),
    (SUBMISSION_TEMPLATE, include_str!("./submission.hbs")),
    (SOURCE_TEMPLATE, include_str!("./source_page.hbs")),
    (DIFF_TEMPLATE, include_str!("./diff_page.hbs")),
    (COMPARISON_TEMPLATE, include_str!("./comparison.hbs")),
    (FIGURE_TEMPLATE, include_str!("./similarity_svg.hbs")),
];

const BUILTIN_PARTIALS: &[(&str, &str)] = &[("page_head", include_str!("./page_head.hbs"))];

pub(super) fn register_builtin_templates(
    handlebars: &mut Handlebars<'static>,
) -> Result<(), ReportError> {
    for (name, source) in BUILTIN_TEMPLATES {
        handlebars.register_template_string(name, *source)?;
    }
    for (name, source) in BUILTIN_PARTIALS {
        handlebars.register_partial(name, *source)?;
    }
    Ok(())
}

/// Register every `*.hbs` file of `templates_dir` (and its `partials/`),
/// replacing built-in templates of the same name.
pub(super) fn load_templates_from_dir(
    handlebars: &mut Handlebars<'static>,
    templates_dir: &Path,
) -> Result<(), ReportError> {
    for entry in fs::read_dir(templates_dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.extension().and_then(|s| s.to_str()) == Some("hbs") {
            let template_name = path.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidData, "Invalid template filename")
            })?;

            let template_content = fs::read_to_string(&path)?;
            handlebars.register_template_string(template_name, template_content)?;
            debug!("Loaded template override {}", template_name);
        }
    }

    let partials_dir = templates_dir.join("partials");
    if partials_dir.is_dir() {
        register_partials(handlebars, &partials_dir)?;
    }

    Ok(())
}

fn register_partials(
    handlebars: &mut Handlebars<'static>,
    partials_dir: &Path,
) -> Result<(), ReportError> {
    for entry in fs::read_dir(partials_dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.extension().and_then(|s| s.to_str()) == Some("hbs") {
            let partial_name = path.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidData, "Invalid partial filename")
            })?;

            let partial_content = fs::read_to_string(&path)?;
            handlebars.register_partial(partial_name, partial_content)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn builtin_templates_register() {
        let mut handlebars = Handlebars::new();
        register_builtin_templates(&mut handlebars).unwrap();
        for (name, _) in BUILTIN_TEMPLATES {
            assert!(handlebars.get_templates().contains_key(*name), "{name}");
        }
    }

    #[test]
    fn load_templates_from_dir_overrides_builtin_and_registers_partials() {
        let temp = tempdir().unwrap();
        let templates_dir = temp.path();

        fs::create_dir_all(templates_dir.join("partials")).unwrap();
        fs::write(
            templates_dir.join("submission.hbs"),
            "{{#each items}}{{> item}}{{/each}}",
        )
        .unwrap();
        fs::write(templates_dir.join("partials").join("item.hbs"), "<li>{{this}}</li>").unwrap();

        let mut handlebars = Handlebars::new();
        register_builtin_templates(&mut handlebars).unwrap();
        load_templates_from_dir(&mut handlebars, templates_dir).unwrap();

        let rendered = handlebars
            .render(SUBMISSION_TEMPLATE, &json!({ "items": ["one", "two"] }))
            .unwrap();
        assert_eq!(rendered, "<li>one</li><li>two</li>");
    }

    #[cfg(unix)]
    #[test]
    fn load_templates_from_dir_errors_on_invalid_template_filename() {
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;

        let temp = tempdir().unwrap();
        let invalid_name = OsString::from_vec(vec![0xFF, b'.', b'h', b'b', b's']);
        fs::write(temp.path().join(&invalid_name), "{{this}}").unwrap();

        let mut handlebars = Handlebars::new();
        let err = load_templates_from_dir(&mut handlebars, temp.path()).unwrap_err();
        assert!(
            err.to_string().contains("Invalid template filename"),
            "unexpected error: {err:?}"
        );
    }
}
