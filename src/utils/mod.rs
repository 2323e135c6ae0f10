pub mod html;
pub mod mime;
pub mod path;

pub use path::normalize_path;
