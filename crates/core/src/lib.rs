pub mod alias;
pub mod asset;
pub mod clock;
pub mod draft;
pub mod error;
pub mod field_value;
pub mod ids;
pub mod schema;

pub use alias::RemoteRecord;
pub use asset::AssetRef;
pub use clock::{Clock, SystemClock};
pub use draft::{DraftKey, FieldMap, SectionData, SectionDraft, Snapshot};
pub use error::CoreError;
pub use field_value::FieldValue;
pub use ids::*;
pub use schema::{FieldKind, FieldSpec, SectionKind, SectionSchema};
