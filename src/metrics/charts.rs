//! SVG rendering of the test-set confusion matrix.
//!
//! Written next to the run logs whenever a new best epoch is recorded, so
//! the artifact always reflects the best model on disk.

use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::metrics::ConfusionMatrix;

const CELL: f32 = 110.0;
const MARGIN: f32 = 90.0;

/// Renders `cm` as a shaded grid with counts, row/column labels and a title.
pub fn render_confusion_matrix(
    cm: &ConfusionMatrix,
    class_names: &[&str],
    title: &str,
    path: &Path,
) -> Result<()> {
    let n = cm.num_classes();
    let width = MARGIN * 2.0 + CELL * n as f32;
    let height = MARGIN * 2.0 + CELL * n as f32;

    let max_count = (0..n)
        .flat_map(|a| (0..n).map(move |p| (a, p)))
        .map(|(a, p)| cm.get(a, p))
        .max()
        .unwrap_or(0)
        .max(1);

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    ));
    svg.push_str(&format!(
        r#"<rect width="{width}" height="{height}" fill="white"/>"#
    ));
    svg.push_str(&format!(
        r#"<text x="{x}" y="30" font-size="18" font-family="sans-serif" text-anchor="middle" font-weight="bold">{title}</text>"#,
        x = width / 2.0
    ));

    for actual in 0..n {
        for predicted in 0..n {
            let count = cm.get(actual, predicted);
            let intensity = count as f32 / max_count as f32;
            // Light blue to dark blue ramp.
            let shade = (235.0 - intensity * 160.0) as u8;
            let x = MARGIN + predicted as f32 * CELL;
            let y = MARGIN + actual as f32 * CELL;
            svg.push_str(&format!(
                r#"<rect x="{x}" y="{y}" width="{CELL}" height="{CELL}" fill="rgb({shade},{shade},245)" stroke="black" stroke-width="1"/>"#
            ));
            let text_fill = if intensity > 0.6 { "white" } else { "black" };
            svg.push_str(&format!(
                r#"<text x="{tx}" y="{ty}" font-size="20" font-family="sans-serif" text-anchor="middle" fill="{text_fill}">{count}</text>"#,
                tx = x + CELL / 2.0,
                ty = y + CELL / 2.0 + 7.0
            ));
        }
    }

    for (index, name) in class_names.iter().enumerate().take(n) {
        // Column labels (predicted) under the grid.
        svg.push_str(&format!(
            r#"<text x="{x}" y="{y}" font-size="13" font-family="sans-serif" text-anchor="middle">{name}</text>"#,
            x = MARGIN + index as f32 * CELL + CELL / 2.0,
            y = MARGIN + n as f32 * CELL + 25.0
        ));
        // Row labels (actual) left of the grid.
        svg.push_str(&format!(
            r#"<text x="{x}" y="{y}" font-size="13" font-family="sans-serif" text-anchor="end">{name}</text>"#,
            x = MARGIN - 10.0,
            y = MARGIN + index as f32 * CELL + CELL / 2.0 + 5.0
        ));
    }

    svg.push_str(&format!(
        r#"<text x="{x}" y="{y}" font-size="14" font-family="sans-serif" text-anchor="middle">Predicted</text>"#,
        x = MARGIN + n as f32 * CELL / 2.0,
        y = height - 20.0
    ));
    svg.push_str(&format!(
        r#"<text x="20" y="{y}" font-size="14" font-family="sans-serif" text-anchor="middle" transform="rotate(-90 20 {y})">Actual</text>"#,
        y = MARGIN + n as f32 * CELL / 2.0
    ));
    svg.push_str("</svg>");

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, svg)?;
    Ok(())
}
