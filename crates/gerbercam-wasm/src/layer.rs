//! Layer role inference from file names and content samples.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::file::{FileFormat, RawFile};
use crate::units::{round_to, UnitSystem};

/// Characters of content examined by [`inspect_file`].
pub const SAMPLE_CHARS: usize = 5000;

static RE_ELEC_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"elec(\d+)").unwrap_or_else(|_| unreachable!("elec pattern is valid"))
});

/// Infers a `file_type` tag from a file name.
///
/// Returns `None` when no rule matches; callers keep whatever tag they were
/// given in that case.
pub fn classify_layer_role(filename: &str) -> Option<String> {
    let name = filename.to_lowercase();
    let has = |needle: &str| name.contains(needle);

    let role = if has("top") && (has("copper") || has("elec")) {
        "copper_top"
    } else if has("bottom") && (has("copper") || has("elec")) {
        "copper_bottom"
    } else if has("top") && has("silk") {
        "silk_top"
    } else if has("bottom") && has("silk") {
        "silk_bottom"
    } else if has("top") && (has("stop") || has("mask")) {
        "solder_mask_top"
    } else if (has("bottom") || has("bot")) && (has("stop") || has("mask")) {
        "solder_mask_bottom"
    } else if has("top") && has("paste") {
        "paste_top"
    } else if has("drill") || name.ends_with(".exc") {
        "drill"
    } else if has("routing") || has("outline") {
        "outline"
    } else if has("plating") {
        "plating"
    } else if has("elec") || has("inner") {
        return Some(
            RE_ELEC_NUMBER
                .captures(&name)
                .and_then(|caps| caps.get(1))
                .map_or_else(
                    || "inner_layer".to_string(),
                    |number| format!("inner_layer_{}", number.as_str()),
                ),
        );
    } else {
        return None;
    };

    Some(role.to_string())
}

/// Container format implied by a file name's extension.
pub fn file_format_for(filename: &str) -> FileFormat {
    let name = filename.to_lowercase();
    if name.ends_with(".exc") || name.ends_with(".drill") {
        FileFormat::Drill
    } else if name.ends_with(".tgz") || name.ends_with(".tar.gz") || name.ends_with(".odb") {
        FileFormat::Odbp
    } else {
        FileFormat::Gerber
    }
}

/// Manufacturing category of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerCategory {
    /// Copper traces and pads.
    Copper,
    /// Solder mask openings.
    SolderMask,
    /// Printed markings.
    Silkscreen,
    /// Solder paste stencil.
    Paste,
    /// Board outline and routing.
    Outline,
    /// Special plating areas.
    Plating,
    /// Drill holes.
    Drill,
    /// Anything else.
    Other,
}

/// What a layer is for and how it is manufactured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerPurpose {
    /// Layer category.
    pub category: LayerCategory,
    /// Short description of the layer.
    pub purpose: String,
    /// What the layer defines on the finished board.
    pub manufacturing_function: String,
    /// Fabrication steps that consume the layer.
    pub processes: Vec<String>,
    /// Notable features, including counts from the content sample.
    pub characteristics: Vec<String>,
}

struct Profile {
    category: LayerCategory,
    purpose: &'static str,
    function: &'static str,
    processes: &'static [&'static str],
    characteristics: &'static [&'static str],
}

const UNKNOWN: Profile = Profile {
    category: LayerCategory::Other,
    purpose: "Unknown",
    function: "Unknown",
    processes: &[],
    characteristics: &[],
};

fn profile_for(filename: &str, file_type: &str) -> Profile {
    let name = filename.to_lowercase();
    let tag = file_type.to_lowercase();
    let by_side = |top: &'static str, bottom: &'static str, other: &'static str| {
        if name.contains("top") {
            top
        } else if name.contains("bot") {
            bottom
        } else {
            other
        }
    };

    if name.contains("elec") || tag.contains("inner_layer") {
        let purpose = if name.contains("elec1") || tag.contains("layer_1") {
            "Inner copper layer 1 (typically top-side copper)"
        } else if name.contains("elec2") || tag.contains("layer_2") {
            "Inner copper layer 2"
        } else if name.contains("elec3") || tag.contains("layer_3") {
            "Inner copper layer 3"
        } else if name.contains("elec4") || tag.contains("layer_4") {
            "Inner copper layer 4 (typically bottom-side copper)"
        } else {
            "Inner copper layer"
        };
        Profile {
            category: LayerCategory::Copper,
            purpose,
            function: "Defines copper traces, pads, and routing for this layer",
            processes: &["Etching", "Copper plating", "Lamination"],
            characteristics: &["Copper traces", "Pads", "Vias", "Routing patterns"],
        }
    } else if name.contains("stop") || tag.contains("mask") {
        Profile {
            category: LayerCategory::SolderMask,
            purpose: by_side(
                "Top solder mask layer (solder stop)",
                "Bottom solder mask layer (solder stop)",
                "Solder mask layer",
            ),
            function: "Defines areas where solder mask should NOT be applied (exposes pads)",
            processes: &["Solder mask application", "UV curing", "Development"],
            characteristics: &["Pad openings", "Via openings", "Solder mask clearance"],
        }
    } else if name.contains("silk") {
        Profile {
            category: LayerCategory::Silkscreen,
            purpose: by_side(
                "Top silkscreen layer",
                "Bottom silkscreen layer",
                "Silkscreen layer",
            ),
            function: "Defines component labels, reference designators, and markings printed on PCB",
            processes: &["Screen printing", "Ink application"],
            characteristics: &[
                "Component labels",
                "Reference designators",
                "Text markings",
                "Logo/Graphics",
            ],
        }
    } else if name.contains("paste") {
        Profile {
            category: LayerCategory::Paste,
            purpose: if name.contains("top") {
                "Top solder paste stencil layer"
            } else {
                "Solder paste stencil layer"
            },
            function: "Defines solder paste application areas for SMT component assembly",
            processes: &["Stencil fabrication", "Solder paste printing", "SMT assembly"],
            characteristics: &["SMT pad openings", "Paste volume control"],
        }
    } else if name.contains("routing") || tag.contains("outline") {
        Profile {
            category: LayerCategory::Outline,
            purpose: "Board outline and routing layer",
            function: "Defines the physical board outline and cutout areas",
            processes: &["PCB routing", "V-scoring", "Panelization"],
            characteristics: &["Board outline", "Cutouts", "V-score lines", "Panel borders"],
        }
    } else if name.contains("plating") {
        Profile {
            category: LayerCategory::Plating,
            purpose: "Plating layer",
            function: "Defines areas requiring special plating treatment",
            processes: &["Electroplating", "Surface finish application"],
            characteristics: &["Plated areas", "Surface finish zones"],
        }
    } else if name.contains("drill") || name.contains("exc") {
        let characteristics: &[&str] = &["Hole coordinates", "Hole diameters", "Tool definitions"];
        if name.contains("plated") || name.contains("pth") {
            Profile {
                category: LayerCategory::Drill,
                purpose: "Plated through-hole drill file",
                function: "Defines locations and sizes of plated through-holes (vias and component holes)",
                processes: &["Drilling", "Plating", "Via formation"],
                characteristics,
            }
        } else if name.contains("np") || name.contains("non") {
            Profile {
                category: LayerCategory::Drill,
                purpose: "Non-plated through-hole drill file",
                function: "Defines locations and sizes of non-plated holes (mounting holes, etc.)",
                processes: &["Drilling"],
                characteristics,
            }
        } else {
            Profile {
                category: LayerCategory::Drill,
                purpose: "Drill file",
                function: "Defines hole locations and sizes",
                processes: &["Drilling"],
                characteristics,
            }
        }
    } else {
        UNKNOWN
    }
}

/// Describes a layer's manufacturing purpose from its name, tag and a
/// content sample.
pub fn describe_purpose(filename: &str, file_type: &str, sample: &str) -> LayerPurpose {
    let profile = profile_for(filename, file_type);
    let mut characteristics: Vec<String> = profile
        .characteristics
        .iter()
        .map(|item| (*item).to_string())
        .collect();

    let apertures = sample.matches("%ADD").count();
    if apertures > 0 {
        characteristics.push(format!("{apertures} aperture definitions"));
    }
    let draws = sample.matches("D01").count() + sample.matches("D02").count();
    if draws > 0 {
        characteristics.push(format!("{draws} draw commands (sample)"));
    }
    let flashes = sample.matches("D03").count();
    if flashes > 0 {
        characteristics.push(format!("{flashes} flash commands (pads)"));
    }

    LayerPurpose {
        category: profile.category,
        purpose: profile.purpose.to_string(),
        manufacturing_function: profile.function.to_string(),
        processes: profile
            .processes
            .iter()
            .map(|item| (*item).to_string())
            .collect(),
        characteristics,
    }
}

/// Per-file command statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileDetails {
    /// File name.
    pub filename: String,
    /// Layer role tag.
    pub file_type: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Size in KiB, two decimals.
    pub size_kb: f64,
    /// Line count over the whole file.
    pub total_lines: usize,
    /// Character count over the whole file.
    pub total_characters: usize,
    /// `RS-274X` when a format statement is present in the sample.
    pub format: Option<String>,
    /// Units declared in the sample.
    pub units: UnitSystem,
    /// `%ADD` statements in the sample.
    pub aperture_definitions: usize,
    /// `D01`, `D02` and `D03` in the sample.
    pub draw_commands_sample: usize,
    /// `D03` in the sample.
    pub flash_commands: usize,
    /// `D02` in the sample.
    pub move_commands: usize,
    /// Layer purpose description.
    pub purpose: LayerPurpose,
}

/// Collects command statistics for one file.
///
/// Counts are taken over the first [`SAMPLE_CHARS`] characters; line and
/// character totals cover the whole file.
pub fn inspect_file(file: &RawFile) -> FileDetails {
    let content = String::from_utf8_lossy(&file.content);
    let sample: String = content.chars().take(SAMPLE_CHARS).collect();

    let flash_commands = sample.matches("D03").count();
    let move_commands = sample.matches("D02").count();
    let draw_commands_sample = sample.matches("D01").count() + move_commands + flash_commands;

    let units = if sample.contains("%MOMM") {
        UnitSystem::Millimeters
    } else if sample.contains("%MOIN") {
        UnitSystem::Inches
    } else {
        UnitSystem::Unknown
    };

    #[allow(clippy::cast_precision_loss)]
    let size_kb = round_to(file.byte_size as f64 / 1024.0, 2);

    FileDetails {
        filename: file.filename.clone(),
        file_type: file.file_type.clone(),
        size_bytes: file.byte_size,
        size_kb,
        total_lines: content.split('\n').count(),
        total_characters: content.chars().count(),
        format: sample.contains("%FS").then(|| "RS-274X".to_string()),
        units,
        aperture_definitions: sample.matches("%ADD").count(),
        draw_commands_sample,
        flash_commands,
        move_commands,
        purpose: describe_purpose(&file.filename, &file.file_type, &sample),
    }
}
