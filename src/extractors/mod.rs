//! HTML extraction driven by compiled rules
//!
//! - `css_extractor`: scoped CSS selection, text and attribute access
//! - `transform`: value transforms (`trim`, `upper`, `lower`, `url-join`)
//! - `engine`: the traversal that turns rules into records
//! - `record`: the output model and its JSON shape

mod css_extractor;
mod engine;
mod record;
mod transform;

pub use css_extractor::{body, first_attr, link_target, parse_selector, select_scoped, slice, text_of};
pub use engine::{extract, Extractor};
pub use record::{Extracted, FieldValues, Item, Record, Tagged};
pub use transform::{apply_transforms, Transform};
