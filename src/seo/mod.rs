pub mod actions;
pub mod extractor;

pub use actions::{generate_actions, Action};
pub use extractor::{extract, SeoSignals};
