pub mod media_item;
pub mod view_item;

pub use media_item::*;
pub use view_item::*;
