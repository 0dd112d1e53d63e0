//! Finder-Chart Renderer: a field-of-view chart around the query position.
//!
//! Raster output via the plotters bitmap backend. Correctness here is
//! visual: a reticle at the query position, the query-radius circle, one
//! triangle per matched catalog object (legend labels deduplicated by name),
//! and squares for externally cross-matched sources.

use std::collections::HashSet;

use camino::Utf8Path;
use plotters::prelude::*;
use tracing::info;

use crate::catalog::CatalogRow;
use crate::coords::{ARCSEC_PER_DEG, SkyPosition};
use crate::error::DiggerError;

const CHART_SIZE: u32 = 800;

/// Renders the finder chart as a PNG at `path`.
pub fn render(
    path: &Utf8Path,
    query: &SkyPosition,
    matched: &[CatalogRow],
    fov_arcsec: f64,
    overlay_radius_arcsec: f64,
    sources: &[SkyPosition],
    title: &str,
) -> Result<(), DiggerError> {
    let render_err = |message: String| DiggerError::Render(message);

    let fov_deg = fov_arcsec / ARCSEC_PER_DEG;
    // RA axis stretched by 1/cos(dec) so the field is square on the sky;
    // reversed so east points left, as on the sky
    let cos_dec = query.dec_deg.to_radians().cos().max(1e-6);
    let ra_half = fov_deg / cos_dec;
    let ra_range = (query.ra_deg + ra_half)..(query.ra_deg - ra_half);
    let dec_range = (query.dec_deg - fov_deg)..(query.dec_deg + fov_deg);

    let root = BitMapBackend::new(path.as_std_path(), (CHART_SIZE, CHART_SIZE)).into_drawing_area();
    root.fill(&WHITE).map_err(|err| render_err(err.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(ra_range, dec_range)
        .map_err(|err| render_err(err.to_string()))?;
    chart
        .configure_mesh()
        .x_desc("RA [deg]")
        .y_desc("Dec [deg]")
        .draw()
        .map_err(|err| render_err(err.to_string()))?;

    // query position reticle
    chart
        .draw_series(std::iter::once(Cross::new(
            (query.ra_deg, query.dec_deg),
            8,
            MAGENTA.stroke_width(2),
        )))
        .map_err(|err| render_err(err.to_string()))?
        .label("target")
        .legend(|(x, y)| Cross::new((x + 10, y), 5, MAGENTA.stroke_width(2)));

    // query-radius circle
    let radius_deg = overlay_radius_arcsec / ARCSEC_PER_DEG;
    let circle: Vec<(f64, f64)> = (0..=360)
        .map(|step| {
            let theta = f64::from(step).to_radians();
            (
                query.ra_deg + radius_deg * theta.cos() / cos_dec,
                query.dec_deg + radius_deg * theta.sin(),
            )
        })
        .collect();
    chart
        .draw_series(std::iter::once(PathElement::new(circle, GREEN.stroke_width(2))))
        .map_err(|err| render_err(err.to_string()))?
        .label("query radius")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], GREEN.stroke_width(2)));

    // matched catalog objects, legend deduplicated by display name
    let mut labeled: HashSet<String> = HashSet::new();
    for row in matched {
        if query.separation_arcsec(&row.position) > overlay_radius_arcsec {
            continue;
        }
        let series = chart
            .draw_series(std::iter::once(TriangleMarker::new(
                (row.position.ra_deg, row.position.dec_deg),
                10,
                BLUE.stroke_width(2),
            )))
            .map_err(|err| render_err(err.to_string()))?;
        if labeled.insert(row.target.clone()) {
            series
                .label(row.target.clone())
                .legend(|(x, y)| TriangleMarker::new((x + 10, y), 7, BLUE.stroke_width(2)));
        }
    }

    // externally cross-matched sources
    if !sources.is_empty() {
        chart
            .draw_series(sources.iter().map(|source| {
                Rectangle::new(
                    [
                        (
                            source.ra_deg - radius_deg * 0.08,
                            source.dec_deg - radius_deg * 0.08,
                        ),
                        (
                            source.ra_deg + radius_deg * 0.08,
                            source.dec_deg + radius_deg * 0.08,
                        ),
                    ],
                    RED.stroke_width(1),
                )
            }))
            .map_err(|err| render_err(err.to_string()))?
            .label("gaia source")
            .legend(|(x, y)| {
                Rectangle::new([(x, y - 4), (x + 8, y + 4)], RED.stroke_width(1))
            });
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(|err| render_err(err.to_string()))?;
    root.present().map_err(|err| render_err(err.to_string()))?;
    info!(%path, "saved finder chart");
    Ok(())
}

/// Conventional chart filename for a matched object.
pub fn chart_filename(nearest_name: &str, tic: Option<crate::domain::TicId>) -> String {
    match tic {
        Some(tic) => format!("{tic}_{nearest_name}_fov.png"),
        None => format!("{nearest_name}_fov.png"),
    }
}
