//! Declarative per-section schemas.
//!
//! Every inspection step is one [`SectionKind`]. Its [`SectionSchema`] lists
//! the canonical fields together with the literal key spellings the remote
//! store has used for them over time, in the order they should be tried.

use serde::{Deserialize, Serialize};

use crate::draft::FieldMap;
use crate::field_value::FieldValue;
use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    YesNo,
    Asset,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::YesNo => "yes/no",
            Self::Asset => "asset",
        }
    }
}

#[derive(Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub aliases: &'static [&'static str],
    pub required: bool,
    /// Multipart role for freshly captured files of this field.
    pub upload_role: Option<&'static str>,
}

#[derive(Debug)]
pub struct SectionSchema {
    pub kind: SectionKind,
    pub section_keys: &'static [&'static str],
    pub repeatable: bool,
    pub fields: &'static [FieldSpec],
}

impl SectionSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn require_field(&self, name: &str) -> Result<&FieldSpec, CoreError> {
        self.field(name).ok_or_else(|| CoreError::UnknownField {
            section: self.kind.as_str().to_string(),
            field: name.to_string(),
        })
    }

    /// A field map with every canonical field set to its empty value.
    pub fn blank_entry(&self) -> FieldMap {
        self.fields
            .iter()
            .map(|f| (f.name.to_string(), FieldValue::empty(f.kind)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Engine,
    Frame,
    Defects,
    Calendar,
}

impl SectionKind {
    pub const ALL: [SectionKind; 4] = [Self::Engine, Self::Frame, Self::Defects, Self::Calendar];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Engine => "engine",
            Self::Frame => "frame",
            Self::Defects => "defects",
            Self::Calendar => "calendar",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "engine" => Ok(Self::Engine),
            "frame" => Ok(Self::Frame),
            "defects" => Ok(Self::Defects),
            "calendar" => Ok(Self::Calendar),
            _ => Err(CoreError::UnknownSection(s.to_string())),
        }
    }

    pub fn schema(&self) -> &'static SectionSchema {
        match self {
            Self::Engine => &ENGINE,
            Self::Frame => &FRAME,
            Self::Defects => &DEFECTS,
            Self::Calendar => &CALENDAR,
        }
    }
}

const REMARKS_ALIASES: &[&str] = &["remarks", "remark", "Remarks ", "comments", "Comment"];

static ENGINE: SectionSchema = SectionSchema {
    kind: SectionKind::Engine,
    section_keys: &["engine", "Engine", "engineDetails", "Engine Details "],
    repeatable: false,
    fields: &[
        FieldSpec {
            name: "engine_number",
            label: "Engine number",
            kind: FieldKind::Text,
            aliases: &["engineNumber", "engine_number", "Engine Number", "engineNo", "Engine No "],
            required: true,
            upload_role: None,
        },
        FieldSpec {
            name: "engine_photo",
            label: "Engine photo",
            kind: FieldKind::Asset,
            aliases: &["engineImage", "engine_photo", "Engine Image", "enginePhoto"],
            required: true,
            upload_role: Some("engineImage"),
        },
        FieldSpec {
            name: "running_condition",
            label: "Running condition",
            kind: FieldKind::YesNo,
            aliases: &["isRunning", "running", "runningCondition", "Running Condition "],
            required: true,
            upload_role: None,
        },
        FieldSpec {
            name: "oil_leak",
            label: "Oil leak",
            kind: FieldKind::YesNo,
            aliases: &["oilLeak", "oil_leak", "Oil Leak", "oilLeakage"],
            required: false,
            upload_role: None,
        },
        FieldSpec {
            name: "remarks",
            label: "Remarks",
            kind: FieldKind::Text,
            aliases: REMARKS_ALIASES,
            required: false,
            upload_role: None,
        },
    ],
};

static FRAME: SectionSchema = SectionSchema {
    kind: SectionKind::Frame,
    section_keys: &["frame", "Frame", "frames", "Frames ", "chassis", "frameDetails"],
    repeatable: false,
    fields: &[
        FieldSpec {
            name: "chassis_number",
            label: "Chassis number",
            kind: FieldKind::Text,
            aliases: &["chassisNumber", "chassis_number", "Chassis Number ", "chassisNo", "vin", "VIN"],
            required: true,
            upload_role: None,
        },
        FieldSpec {
            name: "chassis_photo",
            label: "Chassis photo",
            kind: FieldKind::Asset,
            aliases: &["chassisImage", "chassis_photo", "Chassis Image", "framePhoto"],
            required: true,
            upload_role: Some("chassisImage"),
        },
        FieldSpec {
            name: "frame_damaged",
            label: "Frame damaged",
            kind: FieldKind::YesNo,
            aliases: &["isDamaged", "frameDamaged", "Frame Damaged ", "damaged", "damage"],
            required: true,
            upload_role: None,
        },
        FieldSpec {
            name: "rust_present",
            label: "Rust present",
            kind: FieldKind::YesNo,
            aliases: &["rust", "hasRust", "Rust Present", "rustPresent"],
            required: false,
            upload_role: None,
        },
        FieldSpec {
            name: "remarks",
            label: "Remarks",
            kind: FieldKind::Text,
            aliases: REMARKS_ALIASES,
            required: false,
            upload_role: None,
        },
    ],
};

static DEFECTS: SectionSchema = SectionSchema {
    kind: SectionKind::Defects,
    section_keys: &["defects", "Defects", "defectList", "Defect List ", "defect"],
    repeatable: true,
    fields: &[
        FieldSpec {
            name: "image",
            label: "Defect image",
            kind: FieldKind::Asset,
            aliases: &["image", "defectImage", "Image ", "photo", "imageUrl"],
            required: true,
            upload_role: Some("defectImage"),
        },
        FieldSpec {
            name: "remark",
            label: "Defect remark",
            kind: FieldKind::Text,
            aliases: &["remark", "remarks", "Remark ", "description", "defectRemark"],
            required: true,
            upload_role: None,
        },
    ],
};

static CALENDAR: SectionSchema = SectionSchema {
    kind: SectionKind::Calendar,
    section_keys: &["calendar", "Calendar", "schedule", "inspectionSchedule", "Inspection Schedule "],
    repeatable: false,
    fields: &[
        FieldSpec {
            name: "inspection_date",
            label: "Inspection date",
            kind: FieldKind::Text,
            aliases: &["inspectionDate", "inspection_date", "Inspection Date ", "date", "scheduledDate"],
            required: true,
            upload_role: None,
        },
        FieldSpec {
            name: "time_slot",
            label: "Time slot",
            kind: FieldKind::Text,
            aliases: &["timeSlot", "time_slot", "Time Slot", "slot", "time"],
            required: true,
            upload_role: None,
        },
        FieldSpec {
            name: "location",
            label: "Location",
            kind: FieldKind::Text,
            aliases: &["location", "Location ", "inspectionLocation", "address"],
            required: false,
            upload_role: None,
        },
    ],
};
