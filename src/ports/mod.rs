pub mod catalog;
pub mod spotify;
