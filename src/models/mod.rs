//! Data models

mod alert;
mod metric;
mod rule;
mod run;

pub use alert::*;
pub use metric::*;
pub use rule::*;
pub use run::*;
