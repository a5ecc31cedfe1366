//! huetrace-export: Pure format serializers (sans-IO)
//!
//! Converts traced color regions into output formats. Currently supports
//! SVG with solid-filled paths.

pub mod svg;

pub use svg::{SvgMetadata, build_polygon_data, to_svg};
