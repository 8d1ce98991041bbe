// crates/types/src/lib.rs
pub mod baixa;
pub mod manifesto;
pub mod status;
pub mod token;

pub use baixa::*;
pub use manifesto::*;
pub use status::*;
pub use token::*;
