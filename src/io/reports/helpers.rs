use handlebars::Handlebars;
use handlebars::{Helper, HelperResult, RenderContext, RenderError};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Serialize a value to JSON for template consumption. Returns `Value::Null` on error.
pub fn safe_json_value<T: Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        warn!("Failed to serialize value to JSON: {}", e);
        Value::Null
    })
}

/// Grey level for a similarity score: `#000000` at 1.0, `#ffffff` at 0.0
pub fn grey_hex(score: f64) -> String {
    let level = ((1.0 - score.clamp(0.0, 1.0)) * 255.0) as u8;
    format!("#{level:02x}{level:02x}{level:02x}")
}

/// Register all Handlebars helpers used by subdiff reports.
pub fn register_helpers(handlebars: &mut Handlebars<'static>) {
    register_percentage_helper(handlebars);

    // Helper: add two numbers (1-based numbering in lists)
    register_simple_numeric_helper(handlebars, "add", |a, b| a + b);
}

/// Register the percentage helper
fn register_percentage_helper(handlebars: &mut Handlebars<'static>) {
    handlebars.register_helper(
        "percentage",
        Box::new(
            |h: &Helper,
             _: &Handlebars,
             _: &handlebars::Context,
             _: &mut RenderContext,
             out: &mut dyn handlebars::Output|
             -> HelperResult {
                let value = h.param(0).and_then(|v| v.value().as_f64()).ok_or_else(|| {
                    RenderError::new("percentage helper requires a numeric parameter")
                })?;
                let decimals = h.param(1).and_then(|v| v.value().as_str()).unwrap_or("0");
                let percentage = value * 100.0;
                let rendered = match decimals {
                    "1" => format!("{:.1}", percentage),
                    "2" => format!("{:.2}", percentage),
                    _ => format!("{:.0}", percentage),
                };
                out.write(&rendered)?;
                Ok(())
            },
        ),
    );
}

fn register_simple_numeric_helper<F>(handlebars: &mut Handlebars<'static>, name: &str, op: F)
where
    F: Fn(f64, f64) -> f64 + Send + Sync + 'static,
{
    let helper_name = name.to_string();
    handlebars.register_helper(
        name,
        Box::new(
            move |h: &Helper,
                  _: &Handlebars,
                  _: &handlebars::Context,
                  _: &mut RenderContext,
                  out: &mut dyn handlebars::Output|
                  -> HelperResult {
                let a = h.param(0).and_then(|v| v.value().as_f64()).ok_or_else(|| {
                    RenderError::new(format!("{} helper requires numeric parameters", helper_name))
                })?;
                let b = h.param(1).and_then(|v| v.value().as_f64()).ok_or_else(|| {
                    RenderError::new(format!(
                        "{} helper requires two numeric parameters",
                        helper_name
                    ))
                })?;
                out.write(&op(a, b).to_string())?;
                Ok(())
            },
        ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn handlebars() -> Handlebars<'static> {
        let mut hb = Handlebars::new();
        register_helpers(&mut hb);
        hb
    }

    #[test]
    fn test_grey_hex_endpoints() {
        assert_eq!(grey_hex(1.0), "#000000");
        assert_eq!(grey_hex(0.0), "#ffffff");
        assert_eq!(grey_hex(0.5), "#7f7f7f");
        assert_eq!(grey_hex(7.0), "#000000");
    }

    #[test]
    fn test_numbering() {
        let hb = handlebars();
        let out = hb
            .render_template(
                "{{#each items}}{{add @index 1}}:{{this}} {{/each}}",
                &json!({ "items": ["a", "b"] }),
            )
            .unwrap();
        assert_eq!(out, "1:a 2:b ");
    }

    #[test]
    fn test_percentage_decimals() {
        let hb = handlebars();
        let out = hb
            .render_template(
                "{{percentage v}}% {{percentage v \"1\"}}%",
                &json!({ "v": 0.25 }),
            )
            .unwrap();
        assert_eq!(out, "25% 25.0%");
    }

    #[test]
    fn test_only_template_helpers_are_registered() {
        let hb = handlebars();
        for template in ["{{grey v}}", "{{score v}}", "{{basename v}}"] {
            assert!(hb.render_template(template, &json!({ "v": 0.5 })).is_err(), "{template}");
        }
    }

    #[test]
    fn test_safe_json_value_serializes() {
        assert_eq!(safe_json_value(vec![1, 2]), json!([1, 2]));
    }
}
