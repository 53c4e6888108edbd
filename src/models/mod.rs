mod repository;
mod run;

pub use repository::*;
pub use run::*;
