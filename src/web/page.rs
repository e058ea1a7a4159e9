//! Server-rendered HTML for the upload form and the report.

use std::fmt::Write;

use crate::inspect::{ImageOutcome, ImageReport, InspectionReport};

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; max-width: 860px; margin: 2rem auto; padding: 0 1rem; color: #1d1d1f; }
h1 { text-align: center; }
fieldset { border: 1px solid #ccc; border-radius: 8px; margin-bottom: 1rem; }
label { display: block; margin: .5rem 0 .2rem; }
.images { display: flex; gap: 1rem; flex-wrap: wrap; }
.card { flex: 1 1 300px; border: 1px solid #ddd; border-radius: 8px; padding: 1rem; }
.card img { max-width: 100%; border-radius: 4px; }
.ok { color: #1a7f37; }
.fail { color: #b42318; }
.warn { background: #fff8e1; border-left: 4px solid #f5a623; padding: .5rem 1rem; }
.error { background: #fdecea; border-left: 4px solid #b42318; padding: .5rem 1rem; }
.summary td { padding: .2rem 1rem .2rem 0; }
.muted { color: #666; font-size: .9rem; }
"#;

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n<style>{}</style>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape_html(title),
        STYLE,
        body
    )
}

pub fn render_index(encoder_name: &str, model_ready: bool) -> String {
    let status = if model_ready {
        format!("<p class=\"muted ok\">Model {} loaded.</p>", escape_html(encoder_name))
    } else {
        format!(
            "<p class=\"muted\">Model {} loads on first inspection; the first run may take a while.</p>",
            escape_html(encoder_name)
        )
    };

    let body = format!(
        r#"<h1>Pricelens</h1>
<p>Upload a front and a side photo. Each is checked for view type and visible damage, and the damage signal is turned into a price adjustment.</p>
{status}
<form action="/inspect" method="post" enctype="multipart/form-data">
<fieldset>
<legend>Photos</legend>
<label for="front">Front view</label>
<input id="front" name="front" type="file" accept="image/jpeg,image/png,image/webp">
<label for="side">Side view</label>
<input id="side" name="side" type="file" accept="image/jpeg,image/png,image/webp">
</fieldset>
<fieldset>
<legend>Product (optional)</legend>
<label for="product_name">Name</label>
<input id="product_name" name="product_name" type="text" placeholder="e.g. 2018 hatchback">
<label for="base_price">Price when new</label>
<input id="base_price" name="base_price" type="number" min="0" step="any">
<label for="usage_years">Years in use</label>
<input id="usage_years" name="usage_years" type="number" min="0" max="30" step="0.1">
</fieldset>
<button type="submit">Inspect</button>
</form>"#
    );

    layout("Pricelens", &body)
}

fn render_image(image: &ImageReport) -> String {
    let mut card = String::new();
    let _ = write!(card, "<div class=\"card\"><h3>{} view</h3>", image.slot);

    match &image.outcome {
        ImageOutcome::Inspected(findings) => {
            if let Some(preview) = &findings.preview {
                let _ = write!(card, "<img src=\"{}\" alt=\"{} photo\">", preview, image.slot);
            }
            let view_class = if findings.view.matches_slot { "ok" } else { "fail" };
            let _ = write!(
                card,
                "<p>Detected view: <strong class=\"{}\">{}</strong> ({:.0}%)</p>",
                view_class,
                escape_html(&findings.view.label),
                findings.view.score * 100.0
            );
            let _ = write!(
                card,
                "<p>Damage: <strong>{}</strong> (score {:.2})</p>",
                escape_html(&findings.damage.label),
                findings.damage.score
            );
            let _ = write!(
                card,
                "<p class=\"muted\">{}x{}, sharpness {:.1}</p>",
                findings.width,
                findings.height,
                findings.sharpness.score()
            );
        }
        ImageOutcome::Failed { reason, .. } => {
            let _ = write!(
                card,
                "<p class=\"fail\"><strong>Failed:</strong> {}</p><p class=\"muted\">Upload a different photo and try again.</p>",
                escape_html(reason)
            );
        }
    }

    card.push_str("</div>");
    card
}

pub fn render_report(report: &InspectionReport) -> String {
    let mut body = String::from("<h1>Inspection report</h1>");

    if let Some(name) = &report.product.name {
        let _ = write!(body, "<h2>{}</h2>", escape_html(name));
    }

    body.push_str("<div class=\"images\">");
    for image in &report.images {
        body.push_str(&render_image(image));
    }
    body.push_str("</div>");

    body.push_str("<h2>Price adjustment</h2><table class=\"summary\">");
    match report.adjustment.combined_damage {
        Some(damage) => {
            let _ = write!(body, "<tr><td>Combined damage</td><td>{:.2}</td></tr>", damage);
        }
        None => {
            let failed: Vec<String> = report
                .failed_slots()
                .iter()
                .map(|slot| slot.to_string())
                .collect();
            let _ = write!(
                body,
                "<tr><td>Combined damage</td><td class=\"fail\">not available ({} failed), no adjustment applied</td></tr>",
                failed.join(", ")
            );
        }
    }
    let _ = write!(
        body,
        "<tr><td>Price multiplier</td><td><strong>{:.2}</strong></td></tr>",
        report.adjustment.price_multiplier
    );
    if let Some(quote) = &report.quote {
        let _ = write!(
            body,
            "<tr><td>Price when new</td><td>{:.0} {}</td></tr>\
             <tr><td>Age deduction</td><td>{:.0}% ({:.1} years)</td></tr>\
             <tr><td>Suggested price</td><td><strong>{:.0} {}</strong>{}</td></tr>",
            quote.base_price,
            escape_html(&quote.currency),
            quote.age_rate * 100.0,
            quote.usage_years,
            quote.suggested_price,
            escape_html(&quote.currency),
            if quote.at_minimum { " (minimum value)" } else { "" }
        );
    }
    body.push_str("</table>");

    if !report.warnings.is_empty() {
        body.push_str("<div class=\"warn\"><ul>");
        for warning in &report.warnings {
            let _ = write!(body, "<li>{}</li>", escape_html(warning));
        }
        body.push_str("</ul></div>");
    }

    let _ = write!(
        body,
        "<h2>Explanation</h2><p>{}</p><p class=\"muted\">Provider: {} &middot; {}</p>",
        escape_html(&report.explanation),
        report.explanation_provider,
        report.generated_at.format("%Y-%m-%d %H:%M:%S")
    );
    body.push_str("<p><a href=\"/\">Inspect another item</a></p>");

    layout("Pricelens report", &body)
}

pub fn render_error(message: &str) -> String {
    let body = format!(
        "<h1>Pricelens</h1><div class=\"error\"><p>{}</p></div><p><a href=\"/\">Back</a></p>",
        escape_html(message)
    );
    layout("Pricelens error", &body)
}
