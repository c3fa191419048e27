//! Discovery and caching of creatable asset types used by Kiln.

mod catalog;
mod descriptor;
mod instances;
mod provider;
mod stock;

pub use catalog::*;
pub use descriptor::*;
pub use instances::*;
pub use provider::*;
pub use stock::*;
