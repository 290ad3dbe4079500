pub mod base;
pub mod wfo;
