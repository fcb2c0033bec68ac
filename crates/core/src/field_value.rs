use serde::{Deserialize, Serialize};

use crate::asset::AssetRef;
use crate::schema::FieldKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    YesNo(Option<bool>),
    Asset(Option<AssetRef>),
}

impl FieldValue {
    /// The canonical empty value for a field kind: `""`, an unanswered
    /// yes/no, or no asset.
    pub fn empty(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Text => Self::Text(String::new()),
            FieldKind::YesNo => Self::YesNo(None),
            FieldKind::Asset => Self::Asset(None),
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Text(_) => FieldKind::Text,
            Self::YesNo(_) => FieldKind::YesNo,
            Self::Asset(_) => FieldKind::Asset,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.trim().is_empty(),
            Self::YesNo(choice) => choice.is_none(),
            Self::Asset(asset) => asset.is_none(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_yes_no(&self) -> Option<bool> {
        match self {
            Self::YesNo(choice) => *choice,
            _ => None,
        }
    }

    pub fn as_asset(&self) -> Option<&AssetRef> {
        match self {
            Self::Asset(asset) => asset.as_ref(),
            _ => None,
        }
    }

    /// Wire spelling of a yes/no answer; unanswered is the empty string.
    pub fn yes_no_str(choice: Option<bool>) -> &'static str {
        match choice {
            Some(true) => "yes",
            Some(false) => "no",
            None => "",
        }
    }
}
