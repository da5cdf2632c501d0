//! Database models for mediadrop.

pub mod item;

pub use item::{Item, ItemChanges, NewItem, ValidationError};
