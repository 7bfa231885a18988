pub mod bisect;
pub mod delta;
pub mod import;
pub mod regression;
