use ndarray::ArrayView2;
use textplots::{Chart, Plot, Shape};

const CHART_WIDTH: u32 = 120;
const CHART_HEIGHT: u32 = 40;

fn points(values: &[f64]) -> Vec<(f32, f32)> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| (i as f32, *v as f32))
        .collect()
}

// Draw axes and figures, then grab the canvas
fn draw(chart: &mut Chart) -> String {
    chart.axis();
    chart.figures();
    chart.to_string()
}

/// Two per-epoch series on one braille line chart, with a title and legend
pub fn render_curves(title: &str, first: (&str, &[f64]), second: (&str, &[f64])) -> String {
    let first_points = points(first.1);
    let second_points = points(second.1);
    let epochs = first_points.len().max(second_points.len());
    // a chart needs a non-empty x range
    let xmax = epochs.saturating_sub(1).max(1) as f32;

    let first_shape = Shape::Lines(&first_points);
    let second_shape = Shape::Lines(&second_points);
    let canvas = draw(
        Chart::new(CHART_WIDTH, CHART_HEIGHT, 0.0, xmax)
            .lineplot(&first_shape)
            .lineplot(&second_shape),
    );

    format!(
        "{}\n{}\nx: Epoch\nfirst line: {}\nsecond line: {}\n",
        title, canvas, first.0, second.0
    )
}

/// Shade a greyscale image with block characters inside a box border
pub fn render_digit(image: ArrayView2<u8>) -> String {
    let cols = image.ncols();
    let mut out = format!("┌{}┐\n", "──".repeat(cols));

    for row in image.rows() {
        out.push('│');
        for &px in row.iter() {
            let shade = match px {
                0..=50 => "  ",
                51..=101 => "░░",
                102..=152 => "▒▒",
                153..=203 => "▓▓",
                _ => "██",
            };
            out.push_str(shade);
        }
        out.push_str("│\n");
    }

    out.push_str(&format!("└{}┘\n", "──".repeat(cols)));
    out
}
