pub mod dynamics;
pub mod property;
