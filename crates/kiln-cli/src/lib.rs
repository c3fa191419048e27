//! Command-line front end and filesystem collaborators for Kiln.

mod assets;
mod cart_item;

pub use assets::*;
pub use cart_item::*;
