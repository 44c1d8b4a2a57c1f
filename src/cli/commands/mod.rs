pub mod sweep;
pub mod token;
