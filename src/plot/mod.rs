pub mod view;

use std::{
    fs,
    path::{Path, PathBuf},
};

use plotters::coord::{cartesian::Cartesian2d, types::RangedCoordf64, Shift};
use plotters::prelude::*;

use crate::filter::FilterError;
use crate::geofile::{feature::FeatureCollection, persist::absolute_path};
use view::{category_colors, map_extent, MapExtent};

/// Width and height of a rendered map in pixels.
pub const FIGURE_SIZE: u32 = 1000;
/// Fraction of the figure width kept free for the legend of `plot_by_attribute`.
pub const LEGEND_WIDTH_FRACTION: f64 = 0.15;

pub const RESULT_TITLE: &str = "Result";
pub const DEFAULT_TITLE: &str = "Title";
pub const DEFAULT_ATTRIBUTE: &str = "landuse";

const DEFAULT_FILL: RGBColor = RGBColor(31, 119, 180);
const FILL_ALPHA: f64 = 0.6;
const POINT_RADIUS: i32 = 3;

type MapChart<'a, 'b> =
    ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

#[derive(Clone, Copy)]
struct FeatureStyle {
    fill: ShapeStyle,
    edge: ShapeStyle,
}

/// Render all geometries of `collection` with a uniform semi-transparent fill and black outlines
/// to the image at `output`.
///
/// An empty collection renders nothing. Returns the absolute path of the written image, if any.
pub fn plot(collection: &FeatureCollection, output: &Path) -> anyhow::Result<Option<PathBuf>> {
    let extent = match map_extent(collection) {
        Some(extent) => extent,
        None => {
            log::debug!("Nothing to plot");
            return Ok(None);
        }
    };
    let output = prepare_output(output)?;
    let style = FeatureStyle {
        fill: DEFAULT_FILL.mix(FILL_ALPHA).filled(),
        edge: BLACK.stroke_width(1),
    };

    {
        let root = BitMapBackend::new(&output, (FIGURE_SIZE, FIGURE_SIZE)).into_drawing_area();
        root.fill(&WHITE)?;
        let mut chart = build_map_chart(&root, RESULT_TITLE, &extent)?;
        for feature in collection.iter() {
            draw_geometry(&mut chart, &feature.geometry, style)?;
        }
        root.present()?;
    }
    log::info!("Plot of {} features written to {:?}", collection.len(), output);
    Ok(Some(output))
}

/// Render the geometries of `collection` colored by the categories of `attribute`, with a legend
/// to the right of the map.
///
/// Features without a value for `attribute` are not drawn. An empty collection prints a notice and
/// renders nothing.
pub fn plot_by_attribute(
    collection: &FeatureCollection,
    attribute: &str,
    title: &str,
    output: &Path,
) -> anyhow::Result<Option<PathBuf>> {
    let extent = match map_extent(collection) {
        Some(extent) => extent,
        None => {
            println!("No data to plot.");
            return Ok(None);
        }
    };
    if !collection.has_column(attribute) {
        return Err(FilterError::MissingAttribute(attribute.to_string()).into());
    }
    let categories = category_colors(collection, attribute);
    let output = prepare_output(output)?;

    {
        let root = BitMapBackend::new(&output, (FIGURE_SIZE, FIGURE_SIZE)).into_drawing_area();
        root.fill(&WHITE)?;
        let (plot_area, legend_area) = root.split_horizontally(map_area_width(FIGURE_SIZE));

        let mut chart = build_map_chart(&plot_area, title, &extent)?;
        for feature in collection.iter() {
            let value = match feature.attribute(attribute) {
                Some(value) => value,
                None => continue,
            };
            if let Some((_, color)) = categories.iter().find(|(category, _)| category == value) {
                let style = FeatureStyle {
                    fill: color.filled(),
                    edge: color.stroke_width(1),
                };
                draw_geometry(&mut chart, &feature.geometry, style)?;
            }
        }
        draw_legend(&legend_area, attribute, &categories)?;
        root.present()?;
    }
    log::info!(
        "Plot of {} features in {} categories written to {:?}",
        collection.len(),
        categories.len(),
        output
    );
    Ok(Some(output))
}

/// Width of the map part of a `figure_width` wide figure that has a legend.
fn map_area_width(figure_width: u32) -> i32 {
    (figure_width as f64 * (1.0 - LEGEND_WIDTH_FRACTION)).round() as i32
}

fn prepare_output(output: &Path) -> anyhow::Result<PathBuf> {
    let output = absolute_path(output)?;
    if let Some(directory) = output.parent() {
        fs::create_dir_all(directory)?;
    }
    Ok(output)
}

fn build_map_chart<'a, 'b>(
    area: &'a DrawingArea<BitMapBackend<'b>, Shift>,
    title: &str,
    extent: &MapExtent,
) -> anyhow::Result<MapChart<'a, 'b>> {
    let mut chart = ChartBuilder::on(area)
        .margin(20)
        .caption(title, ("sans-serif", 30).into_font())
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(extent.min_x..extent.max_x, extent.min_y..extent.max_y)?;
    chart.configure_mesh().disable_mesh().draw()?;
    Ok(chart)
}

fn draw_geometry(
    chart: &mut MapChart,
    geometry: &geo::Geometry,
    style: FeatureStyle,
) -> anyhow::Result<()> {
    match geometry {
        geo::Geometry::Point(point) => {
            chart.draw_series(std::iter::once(Circle::new(
                (point.x(), point.y()),
                POINT_RADIUS,
                style.fill,
            )))?;
        }
        geo::Geometry::Line(line) => {
            draw_path(chart, &geo::LineString::from(*line), style.edge)?;
        }
        geo::Geometry::LineString(line_string) => draw_path(chart, line_string, style.edge)?,
        geo::Geometry::Polygon(polygon) => draw_polygon(chart, polygon, style)?,
        geo::Geometry::MultiPoint(points) => {
            for point in points.0.iter() {
                draw_geometry(chart, &geo::Geometry::Point(*point), style)?;
            }
        }
        geo::Geometry::MultiLineString(line_strings) => {
            for line_string in line_strings.0.iter() {
                draw_path(chart, line_string, style.edge)?;
            }
        }
        geo::Geometry::MultiPolygon(polygons) => {
            for polygon in polygons.0.iter() {
                draw_polygon(chart, polygon, style)?;
            }
        }
        geo::Geometry::GeometryCollection(collection) => {
            for geometry in collection.0.iter() {
                draw_geometry(chart, geometry, style)?;
            }
        }
        geo::Geometry::Rect(rect) => draw_polygon(chart, &rect.to_polygon(), style)?,
        geo::Geometry::Triangle(triangle) => {
            draw_polygon(chart, &triangle.to_polygon(), style)?
        }
    }
    Ok(())
}

fn coords_of(line_string: &geo::LineString) -> Vec<(f64, f64)> {
    line_string.coords().map(|coord| (coord.x, coord.y)).collect()
}

fn draw_path(
    chart: &mut MapChart,
    line_string: &geo::LineString,
    style: ShapeStyle,
) -> anyhow::Result<()> {
    chart.draw_series(std::iter::once(PathElement::new(coords_of(line_string), style)))?;
    Ok(())
}

/// Fill the exterior ring and outline all rings. Holes are outlined, not cut out of the fill.
fn draw_polygon(
    chart: &mut MapChart,
    polygon: &geo::Polygon,
    style: FeatureStyle,
) -> anyhow::Result<()> {
    chart.draw_series(std::iter::once(Polygon::new(
        coords_of(polygon.exterior()),
        style.fill,
    )))?;
    draw_path(chart, polygon.exterior(), style.edge)?;
    for interior in polygon.interiors() {
        draw_path(chart, interior, style.edge)?;
    }
    Ok(())
}

fn draw_legend(
    area: &DrawingArea<BitMapBackend, Shift>,
    attribute: &str,
    categories: &[(String, RGBAColor)],
) -> anyhow::Result<()> {
    const LEFT: i32 = 10;
    const TOP: i32 = 60;
    const ROW_HEIGHT: i32 = 22;
    const SWATCH_SIZE: i32 = 14;

    area.draw(&Text::new(
        attribute.to_string(),
        (LEFT, TOP),
        ("sans-serif", 18).into_font(),
    ))?;
    for (index, (category, color)) in categories.iter().enumerate() {
        let y = TOP + ROW_HEIGHT * (index as i32 + 1);
        area.draw(&Rectangle::new(
            [(LEFT, y), (LEFT + SWATCH_SIZE, y + SWATCH_SIZE)],
            color.filled(),
        ))?;
        area.draw(&Text::new(
            category.clone(),
            (LEFT + SWATCH_SIZE + 6, y),
            ("sans-serif", 16).into_font(),
        ))?;
    }
    Ok(())
}
