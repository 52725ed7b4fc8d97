//! PNG export of the board
//!
//! The scene is first written as an SVG string (background image embedded as
//! a base64 data URI, rail segments as rotated rectangles, nodes as circles,
//! labels as text) and then rasterized with `resvg` into a `tiny-skia`
//! pixmap at the requested pixel width.

use crate::{
    aggregate::MapGraph,
    analysis::RailNetwork,
    value_objects::Position2D,
};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tiny_skia::{Pixmap, Transform};
use tracing::info;

/// Rail-car footprint in map units
pub const SEGMENT_LENGTH: f64 = 3.0;
/// Rail-car width in map units
pub const SEGMENT_WIDTH: f64 = 1.0;

/// Errors that can occur during export
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("the map has nothing to draw")]
    EmptyScene,

    #[error("invalid export size: {0}")]
    InvalidSize(String),

    #[error("SVG error: {0}")]
    Svg(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("PNG encoding failed: {0}")]
    PngEncoding(String),
}

/// What to include in the exported image
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    /// Output width in pixels; height follows the scene aspect ratio
    pub pixel_width: u32,
    /// Draw location labels
    pub show_labels: bool,
    /// Overlay task routes as polylines
    pub show_tasks: bool,
    /// Draw the background image
    pub include_background: bool,
    /// Padding around the scene, in map units
    pub padding: f64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            pixel_width: 2000,
            show_labels: true,
            show_tasks: false,
            include_background: true,
            padding: 5.0,
        }
    }
}

/// Render the map as an SVG document
pub fn render_scene(map: &MapGraph, options: &ExportOptions) -> Result<String, ExportError> {
    let (min, max) = scene_bounds(map, options)?;
    let width = max.x - min.x;
    let height = max.y - min.y;
    // Map coordinates are y-up, SVG is y-down.
    let tx = |p: Position2D| (p.x - min.x, max.y - p.y);

    let mut svg = String::new();
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.2}\" height=\"{height:.2}\" viewBox=\"0 0 {width:.2} {height:.2}\">\n"
    );

    if options.include_background {
        if let Some(background) = map.background() {
            let (pixel_w, pixel_h) = image::image_dimensions(&background.image_path)?;
            let data = fs::read(&background.image_path)?;
            let data_uri = format!(
                "data:{};base64,{}",
                mime_type(&background.image_path),
                BASE64_STANDARD.encode(&data)
            );
            let w = f64::from(pixel_w) * background.scale;
            let h = f64::from(pixel_h) * background.scale;
            // The offset names the image's top-left corner in map units.
            let (x, y) = tx(background.offset);
            let _ = write!(
                svg,
                "  <image x=\"{x:.2}\" y=\"{y:.2}\" width=\"{w:.2}\" height=\"{h:.2}\" href=\"{data_uri}\"/>\n"
            );
        }
    }

    for conn in map.connections() {
        let fill = conn.color.to_color().to_hex();
        for segment in &conn.segments {
            let (cx, cy) = tx(segment.position);
            let angle = -segment.rotation.to_degrees();
            let _ = write!(
                svg,
                "  <rect x=\"{:.2}\" y=\"{:.2}\" width=\"{SEGMENT_LENGTH:.2}\" height=\"{SEGMENT_WIDTH:.2}\" fill=\"{fill}\" stroke=\"#000000\" stroke-width=\"0.15\" transform=\"rotate({angle:.2} {cx:.2} {cy:.2})\"/>\n",
                cx - SEGMENT_LENGTH / 2.0,
                cy - SEGMENT_WIDTH / 2.0,
            );
        }
    }

    if options.show_tasks {
        let network = RailNetwork::from_map(map);
        for task in map.tasks() {
            for leg in task.stops.windows(2) {
                let Some(path) = network.shortest_path(leg[0], leg[1]) else {
                    continue;
                };
                let points: Vec<String> = path
                    .iter()
                    .filter_map(|id| map.node(*id).ok())
                    .map(|node| {
                        let (x, y) = tx(node.position);
                        format!("{x:.2},{y:.2}")
                    })
                    .collect();
                let _ = write!(
                    svg,
                    "  <polyline points=\"{}\" fill=\"none\" stroke=\"#cc2222\" stroke-width=\"0.6\" stroke-opacity=\"0.5\"/>\n",
                    points.join(" ")
                );
            }
        }
    }

    for node in map.nodes() {
        let (cx, cy) = tx(node.position);
        let _ = write!(
            svg,
            "  <circle cx=\"{cx:.2}\" cy=\"{cy:.2}\" r=\"{:.2}\" fill=\"{}\" stroke=\"#000000\" stroke-width=\"0.2\"/>\n",
            node.radius,
            node.color.to_hex(),
        );
    }

    if options.show_labels {
        for label in map.labels() {
            let (x, y) = tx(label.position);
            let _ = write!(
                svg,
                "  <text x=\"{x:.2}\" y=\"{y:.2}\" font-size=\"{:.2}\" text-anchor=\"middle\" fill=\"#000000\">{}</text>\n",
                label.font_size,
                escape_xml(&label.text),
            );
        }
    }

    svg.push_str("</svg>\n");
    Ok(svg)
}

/// Render the map and write it as a PNG file
pub fn export_png(map: &MapGraph, options: &ExportOptions, output: &Path) -> Result<(), ExportError> {
    let data = render_png(map, options)?;
    fs::write(output, data)?;
    info!(path = %output.display(), "exported board");
    Ok(())
}

/// Render the map as PNG bytes
pub fn render_png(map: &MapGraph, options: &ExportOptions) -> Result<Vec<u8>, ExportError> {
    if options.pixel_width == 0 {
        return Err(ExportError::InvalidSize(
            "pixel width must be at least 1".to_string(),
        ));
    }
    let svg = render_scene(map, options)?;

    let mut usvg_options = resvg::usvg::Options::default();
    usvg_options.fontdb_mut().load_system_fonts();
    let tree = resvg::usvg::Tree::from_str(&svg, &usvg_options)
        .map_err(|e| ExportError::Svg(e.to_string()))?;

    let size = tree.size();
    let scale = options.pixel_width as f32 / size.width();
    let pixel_height = (size.height() * scale).ceil() as u32;
    if pixel_height == 0 {
        return Err(ExportError::InvalidSize(
            "scene collapses to zero height".to_string(),
        ));
    }

    let mut pixmap = Pixmap::new(options.pixel_width, pixel_height).ok_or_else(|| {
        ExportError::InvalidSize(format!(
            "cannot allocate {}x{pixel_height} surface",
            options.pixel_width
        ))
    })?;
    resvg::render(&tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    pixmap
        .encode_png()
        .map_err(|e| ExportError::PngEncoding(e.to_string()))
}

/// Scene extent in map coordinates, including the background image and padding
fn scene_bounds(
    map: &MapGraph,
    options: &ExportOptions,
) -> Result<(Position2D, Position2D), ExportError> {
    let mut bounds = map.bounds();

    if options.include_background {
        if let Some(background) = map.background() {
            if let Ok((pixel_w, pixel_h)) = image::image_dimensions(&background.image_path) {
                let top_left = background.offset;
                let bottom_right = Position2D::new(
                    top_left.x + f64::from(pixel_w) * background.scale,
                    top_left.y - f64::from(pixel_h) * background.scale,
                );
                bounds = Some(match bounds {
                    Some((min, max)) => (
                        Position2D::new(min.x.min(top_left.x), min.y.min(bottom_right.y)),
                        Position2D::new(max.x.max(bottom_right.x), max.y.max(top_left.y)),
                    ),
                    None => (
                        Position2D::new(top_left.x, bottom_right.y),
                        Position2D::new(bottom_right.x, top_left.y),
                    ),
                });
            }
        }
    }

    let (min, max) = bounds.ok_or(ExportError::EmptyScene)?;
    let pad = options.padding;
    Ok((
        Position2D::new(min.x - pad, min.y - pad),
        Position2D::new(max.x + pad, max.y + pad),
    ))
}

fn mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "image/png",
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
