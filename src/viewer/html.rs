//! Standalone HTML page: the painted surface with the invisible text
//! overlay on top, so the page text can be selected and searched in a
//! browser.

use std::collections::HashMap;
use std::fmt::Write;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use super::surface::Surface;
use super::text_layer::{TextBox, TextLayer};

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{{title}}</title>
<style>
body { margin: 0; background: #525659; }
.page { position: relative; margin: 16px auto; width: {{width}}px; height: {{height}}px; }
.page img { position: absolute; left: 0; top: 0; width: {{width}}px; height: {{height}}px; }
.text-layer { position: absolute; left: 0; top: 0; width: {{width}}px; height: {{height}}px; overflow: hidden; line-height: 1; }
.text-layer span { position: absolute; color: transparent; white-space: pre; cursor: text; transform-origin: 0% 0%; }
.text-layer span::selection { background: rgba(0, 100, 255, 0.3); }
</style>
</head>
<body>
<div class="page">
<img src="data:image/png;base64,{{image}}" alt="{{title}}">
<div class="text-layer">
{{spans}}</div>
</div>
</body>
</html>
"#;

/// Fill `{{name}}` placeholders in a single pass over `template`. Values
/// are inserted verbatim and never rescanned; unknown names are kept.
fn render_template(template: &str, variables: &HashMap<&str, String>) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = &after[..end];
                match variables.get(key) {
                    Some(value) => result.push_str(value),
                    None => {
                        result.push_str("{{");
                        result.push_str(key);
                        result.push_str("}}");
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                result.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    result.push_str(rest);
    result
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Inline CSS for one overlay box
#[must_use]
pub fn css_style(text_box: &TextBox) -> String {
    let mut style = format!(
        "left: {}px; top: {}px; font-size: {}px;",
        text_box.left, text_box.top, text_box.font_size
    );
    if !text_box.font_name.is_empty() {
        let _ = write!(style, " font-family: '{}', sans-serif;", text_box.font_name.replace('\'', ""));
    }
    if let Some(transform) = text_box.css_transform() {
        let _ = write!(style, " transform: {transform};");
    }
    style
}

/// `<span>` elements for the overlay, in selection order
#[must_use]
pub fn text_layer_spans(layer: &TextLayer) -> String {
    let mut html = String::new();
    for text_box in layer.boxes() {
        let dir = text_box
            .direction
            .map(|d| format!(" dir=\"{}\"", d.as_str()))
            .unwrap_or_default();
        let _ = writeln!(
            html,
            "<span style=\"{}\"{dir}>{}</span>",
            escape_html(&css_style(text_box)),
            escape_html(&text_box.text)
        );
    }
    html
}

/// Full HTML document for a painted page
pub fn render_page_html(
    surface: &Surface,
    layer: &TextLayer,
    title: &str,
) -> image::ImageResult<String> {
    let png = surface.encode_png()?;
    let (width, height) = surface.css_size();

    let variables = HashMap::from([
        ("title", escape_html(title)),
        ("width", width.to_string()),
        ("height", height.to_string()),
        ("image", BASE64.encode(png)),
        ("spans", text_layer_spans(layer)),
    ]);
    Ok(render_template(PAGE_TEMPLATE, &variables))
}
