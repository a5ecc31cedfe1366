//! SVG export serializer.
//!
//! Converts color regions into an SVG string using the [`svg`] crate
//! for document construction, XML escaping, and path data formatting.
//!
//! Each polygon becomes a separate filled `<path>` element using `M`
//! (move to), `L` (line to) and a closing `z` command. The fill is the
//! region's color; paths carry no stroke. A `fill="none"` rectangle
//! spanning the canvas precedes the paths so the document always covers
//! the full source extent.
//!
//! Optional [`SvgMetadata`] embeds `<title>`, `<desc>` and `<metadata>`
//! elements to help file managers identify exported files.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Description, Element, Path, Rectangle, Title};
use svg::node::{Node, Text, Value};

use huetrace_pipeline::{ColorRegion, Dimensions, Polygon};

/// Metadata to embed in the SVG document.
///
/// All fields are optional. When present, the corresponding element is
/// emitted immediately after the opening `<svg>` tag.
///
/// Text values are XML-escaped automatically by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    ///
    /// Typically the source image filename (without extension).
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Structured pipeline configuration JSON, emitted inside a
    /// `<metadata>` element wrapped in a namespaced `<huetrace:pipeline>`
    /// element so exported files carry their settings.
    pub config_json: Option<&'a str>,
}

/// Build an SVG path `d` attribute string from a closed polygon.
///
/// Uses `M` for the first vertex, `L` for each subsequent vertex and
/// closes the path. Returns an empty string for polygons with fewer than
/// 3 vertices.
///
/// # Examples
///
/// ```
/// use huetrace_pipeline::{Point, Polygon};
/// use huetrace_export::build_polygon_data;
///
/// let polygon = Polygon::new(vec![
///     Point::new(0, 0),
///     Point::new(49, 0),
///     Point::new(49, 99),
///     Point::new(0, 99),
/// ]);
/// let d = build_polygon_data(&polygon);
/// assert!(d.starts_with("M0,0 L49,0 L49,99 L0,99"));
/// assert!(d.to_ascii_lowercase().ends_with('z'));
/// ```
#[must_use]
pub fn build_polygon_data(polygon: &Polygon) -> String {
    if !polygon.is_valid() {
        return String::new();
    }
    let points = polygon.points();

    let first = &points[0];
    let mut data = Data::new().move_to((f64::from(first.x), f64::from(first.y)));
    for p in &points[1..] {
        data = data.line_to((f64::from(p.x), f64::from(p.y)));
    }
    String::from(Value::from(data.close()))
}

/// Serialize color regions into an SVG document string.
///
/// The root `<svg>` has `width`, `height` and `viewBox` set from
/// [`Dimensions`], so the coordinate space matches the source pixel grid.
/// Regions are emitted in order; within a region, one `<path>` per
/// polygon with at least 3 vertices.
///
/// # Examples
///
/// ```
/// use huetrace_pipeline::{Color, ColorRegion, Dimensions, Point, Polygon};
/// use huetrace_export::{SvgMetadata, to_svg};
///
/// let regions = vec![ColorRegion {
///     color: Color::new(255, 0, 0),
///     polygons: vec![Polygon::new(vec![
///         Point::new(0, 0),
///         Point::new(9, 0),
///         Point::new(9, 9),
///     ])],
/// }];
/// let dims = Dimensions { width: 10, height: 10 };
/// let metadata = SvgMetadata {
///     title: Some("logo"),
///     ..SvgMetadata::default()
/// };
/// let svg = to_svg(&regions, dims, &metadata);
/// assert!(svg.contains("<title>logo</title>"));
/// assert!(svg.contains(r##"fill="#ff0000""##));
/// ```
#[must_use]
pub fn to_svg(regions: &[ColorRegion], dimensions: Dimensions, metadata: &SvgMetadata<'_>) -> String {
    let w = dimensions.width;
    let h = dimensions.height;
    let mut doc = Document::new()
        .set("width", w)
        .set("height", h)
        .set("viewBox", (0, 0, w, h));

    // Optional <title> element
    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }

    // Optional <desc> element
    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    // Optional <metadata> element with structured pipeline config
    if let Some(config_json) = metadata.config_json {
        let mut pipeline_el = Element::new("huetrace:pipeline");
        pipeline_el.assign("xmlns:huetrace", "https://huetrace.dev/ns/1");
        pipeline_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(pipeline_el);
        doc = doc.add(metadata_el);
    }

    // Full-canvas placeholder; paints nothing.
    doc = doc.add(
        Rectangle::new()
            .set("x", 0)
            .set("y", 0)
            .set("width", w)
            .set("height", h)
            .set("fill", "none"),
    );

    for region in regions {
        let fill = region.color.to_hex();
        for polygon in &region.polygons {
            let d = build_polygon_data(polygon);
            if d.is_empty() {
                continue;
            }
            let path = Path::new()
                .set("d", d)
                .set("fill", fill.as_str())
                .set("stroke", "none");
            doc = doc.add(path);
        }
    }

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}
