//! CLI commands

pub mod images;
pub mod inspect;
pub mod package;
pub mod verify;
