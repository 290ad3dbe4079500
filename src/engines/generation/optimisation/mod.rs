pub mod methods;
pub mod splitters;
