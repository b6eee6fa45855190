use std::{error::Error, path::Path};

use plotters::prelude::*;

use crate::profile::IqProfile;

/// Log-log plot of I(Q) and of the wedges I(Q) into a SVG file
///
/// Points with a non positive Q or intensity are left out
pub fn plot_iq<P: AsRef<Path>>(
    profile: &IqProfile,
    wedges: &[IqProfile],
    filename: P,
) -> Result<(), Box<dyn Error>> {
    let positive = |iq: &IqProfile| -> Vec<(f64, f64)> {
        iq.iter()
            .filter(|p| p.q > 0. && p.intensity > 0.)
            .map(|p| (p.q, p.intensity))
            .collect()
    };
    let mut series = vec![("I(Q)".to_string(), positive(profile))];
    series.extend(
        wedges
            .iter()
            .enumerate()
            .map(|(k, wedge)| (format!("wedge #{}", k), positive(wedge))),
    );
    series.retain(|(_, xy)| !xy.is_empty());
    if series.is_empty() {
        log::warn!("nothing to plot: I(Q) has no positive values");
        return Ok(());
    }

    let max_value = |x: &[f64]| x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min_value = |x: &[f64]| x.iter().cloned().fold(f64::INFINITY, f64::min);
    let (q, intensity): (Vec<f64>, Vec<f64>) =
        series.iter().flat_map(|(_, xy)| xy.iter().cloned()).unzip();

    let plot = SVGBackend::new(filename.as_ref(), (768, 512)).into_drawing_area();
    plot.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&plot)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .margin(10)
        .build_cartesian_2d(
            (min_value(&q) * 0.9..max_value(&q) * 1.1).log_scale(),
            (min_value(&intensity) * 0.5..max_value(&intensity) * 2.).log_scale(),
        )?;
    chart
        .configure_mesh()
        .x_desc("Q [1/A]")
        .y_desc("I(Q)")
        .draw()?;

    let mut colors = colorous::TABLEAU10.iter().cycle();
    for (key, xy) in series {
        let color = colors.next().unwrap_or(&colorous::TABLEAU10[0]);
        let rgb = RGBColor(color.r, color.g, color.b);
        chart
            .draw_series(LineSeries::new(xy, &rgb))?
            .label(key)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &rgb));
    }
    chart
        .configure_series_labels()
        .border_style(&BLACK)
        .background_style(&WHITE.mix(0.8))
        .position(SeriesLabelPosition::UpperRight)
        .draw()?;
    plot.present()?;
    Ok(())
}
