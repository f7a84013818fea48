pub mod args;
pub mod extract;
