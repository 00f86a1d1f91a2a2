pub use bag::*;
pub use params::*;
pub use transfer_encoding::*;

mod bag;
mod params;
mod transfer_encoding;
