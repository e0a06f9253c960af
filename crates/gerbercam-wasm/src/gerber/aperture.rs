//! Aperture shapes and their reduction to a single effective size.
//!
//! Every aperture, whether decoded by `gerber_parser` or scanned from raw
//! `%ADD` text, becomes an [`ApertureShape`]. The effective size of a
//! rectangle or oval is its smaller side.

use std::sync::LazyLock;

use gerber_types::Aperture;
use regex::Regex;
use serde::Serialize;

use crate::units::UnitSystem;

use super::types::ApertureStats;

/// Sides closer than this are folded into a circular aperture.
const OVAL_FOLD_TOLERANCE: f64 = 0.001;
const UNIQUE_SIZE_LIMIT: usize = 20;

static RE_DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%ADD(?P<code>[0-9]+)(?P<template>[._$a-zA-Z][._$a-zA-Z0-9]*)(?:,(?P<params>[^*%]*))?\*%")
        .unwrap_or_else(|_| unreachable!("aperture definition pattern is valid"))
});

static RE_DIAMETER_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)diameter[=:]?\s*([0-9.]+)")
        .unwrap_or_else(|_| unreachable!("diameter hint pattern is valid"))
});

/// Shape of a declared aperture.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ApertureShape {
    /// Circle (or polygon) described by its diameter.
    Circular {
        /// Outer diameter.
        diameter: f64,
    },
    /// Rectangle.
    Rectangular {
        /// Size along X.
        width: f64,
        /// Size along Y.
        height: f64,
    },
    /// Obround with unequal sides.
    Oval {
        /// Size along X.
        width: f64,
        /// Size along Y.
        height: f64,
    },
    /// Anything else, kept as its textual description.
    Unrecognized {
        /// Template name or raw definition.
        raw: String,
    },
}

impl ApertureShape {
    /// Builds an oval, folding near-equal sides into a circle.
    pub fn oval(width: f64, height: f64) -> Self {
        if (width - height).abs() < OVAL_FOLD_TOLERANCE {
            Self::Circular { diameter: width }
        } else {
            Self::Oval { width, height }
        }
    }

    /// Converts a decoded `gerber-types` aperture.
    pub fn from_aperture(aperture: &Aperture) -> Self {
        match aperture {
            Aperture::Circle(circle) => Self::Circular {
                diameter: circle.diameter,
            },
            Aperture::Rectangle(rectangle) => Self::Rectangular {
                width: rectangle.x,
                height: rectangle.y,
            },
            Aperture::Obround(obround) => Self::oval(obround.x, obround.y),
            Aperture::Polygon(polygon) => Self::Circular {
                diameter: polygon.diameter,
            },
            Aperture::Macro(name, _) => Self::Unrecognized { raw: name.clone() },
        }
    }

    /// Builds a shape from a raw `%ADD` template and its `X`-separated parameters.
    pub fn from_definition(template: &str, params: &str) -> Self {
        let values: Vec<Option<f64>> = params
            .split('X')
            .map(|value| value.trim().parse::<f64>().ok())
            .collect();
        let first = values.first().copied().flatten();
        let second = values.get(1).copied().flatten();

        match (template, first, second) {
            ("C" | "P", Some(diameter), _) => Self::Circular { diameter },
            ("R", Some(width), Some(height)) => Self::Rectangular { width, height },
            ("O", Some(width), Some(height)) => Self::oval(width, height),
            _ => Self::Unrecognized {
                raw: if params.is_empty() {
                    template.to_string()
                } else {
                    format!("{template},{params}")
                },
            },
        }
    }

    /// The single scalar this aperture contributes to size statistics.
    ///
    /// Rectangles and ovals reduce to their smaller side. Unrecognized shapes
    /// contribute only when their description carries a diameter.
    pub fn effective_size(&self) -> Option<f64> {
        let size = match self {
            Self::Circular { diameter } => diameter.abs(),
            Self::Rectangular { width, height } | Self::Oval { width, height } => {
                width.abs().min(height.abs())
            }
            Self::Unrecognized { raw } => RE_DIAMETER_HINT
                .captures(raw)
                .and_then(|caps| caps.get(1))
                .and_then(|value| value.as_str().parse::<f64>().ok())?,
        };
        size.is_finite().then_some(size)
    }

    /// Returns the same shape with every dimension expressed in millimeters.
    #[must_use]
    pub fn to_mm(&self, units: UnitSystem) -> Self {
        match self {
            Self::Circular { diameter } => Self::Circular {
                diameter: units.to_mm(*diameter),
            },
            Self::Rectangular { width, height } => Self::Rectangular {
                width: units.to_mm(*width),
                height: units.to_mm(*height),
            },
            Self::Oval { width, height } => Self::Oval {
                width: units.to_mm(*width),
                height: units.to_mm(*height),
            },
            Self::Unrecognized { raw } => Self::Unrecognized { raw: raw.clone() },
        }
    }
}

/// Scan raw Gerber text for `%ADD` aperture definitions.
pub fn scan_definitions(text: &str) -> Vec<(u32, ApertureShape)> {
    RE_DEFINITION
        .captures_iter(text)
        .filter_map(|caps| {
            let code = caps.name("code")?.as_str().parse::<u32>().ok()?;
            let template = caps.name("template")?.as_str();
            let params = caps.name("params").map_or("", |m| m.as_str());
            Some((code, ApertureShape::from_definition(template, params)))
        })
        .collect()
}

/// Compute the size multiset and statistics for a set of millimeter shapes.
pub fn aperture_statistics(shapes: &[ApertureShape]) -> (Vec<f64>, ApertureStats) {
    let sizes: Vec<f64> = shapes.iter().filter_map(ApertureShape::effective_size).collect();

    let mut stats = ApertureStats {
        count: shapes.len(),
        ..ApertureStats::default()
    };

    for shape in shapes {
        match shape {
            ApertureShape::Circular { .. } => stats.circular_count += 1,
            ApertureShape::Rectangular { .. } => stats.rectangular_count += 1,
            ApertureShape::Oval { .. } => stats.oval_count += 1,
            ApertureShape::Unrecognized { .. } => {}
        }
    }

    if !sizes.is_empty() {
        stats.min_size = sizes.iter().copied().reduce(f64::min);
        stats.max_size = sizes.iter().copied().reduce(f64::max);
        #[allow(clippy::cast_precision_loss)]
        let avg = sizes.iter().sum::<f64>() / sizes.len() as f64;
        stats.avg_size = Some(avg);

        let mut unique = sizes.clone();
        unique.sort_by(f64::total_cmp);
        unique.dedup();
        unique.truncate(UNIQUE_SIZE_LIMIT);
        stats.unique_sizes = unique;
    }

    (sizes, stats)
}
