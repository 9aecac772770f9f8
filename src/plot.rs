use std::{error::Error, path::Path};

use plotters::prelude::*;
use tracing::info;

use crate::types::Float;

/// Plot one or more equally sampled series against time into a PNG.
pub fn plot(
    path: &Path,
    caption: &str,
    series: &[(&str, &[Float])],
    dt: Float,
) -> Result<(), Box<dyn Error>> {
    let samples = series.iter().map(|(_, data)| data.len()).max().unwrap_or(0);
    let final_time = (samples.max(2) - 1) as Float * dt;

    // y-axis limits from the data, padded so flat lines stay visible
    let values = || series.iter().flat_map(|(_, data)| data.iter().copied());
    let mut min_y = values().fold(Float::INFINITY, Float::min);
    let mut max_y = values().fold(Float::NEG_INFINITY, Float::max);
    if !min_y.is_finite() || !max_y.is_finite() {
        (min_y, max_y) = (-1., 1.);
    }
    let pad = ((max_y - min_y) * 0.05).max(1e-3);

    let root = BitMapBackend::new(path, (800, 480)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(0.0..final_time, (min_y - pad)..(max_y + pad))?;
    chart.configure_mesh().x_desc("time [s]").draw()?;

    for (i, (label, data)) in series.iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        chart
            .draw_series(LineSeries::new(
                data.iter().enumerate().map(|(k, y)| (k as Float * dt, *y)),
                color,
            ))?
            .label(*label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    info!(path = %path.display(), "wrote plot");
    Ok(())
}
