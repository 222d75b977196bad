//! Value objects - closed vocabularies shared by the content records

mod color;
mod element_type;
mod lenient;
mod map_style;

pub use color::Color;
pub use element_type::ElementType;
pub use map_style::MapStyle;
