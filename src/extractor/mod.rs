//! Section router and the per-section extractors it dispatches to.

pub mod example;
pub mod gloss;
pub mod inflection;
pub mod linkage;
pub mod pronunciation;
pub mod router;
pub mod translation;

pub use router::parse_page;
