pub mod catalog;
pub mod materials;
pub mod seed;
