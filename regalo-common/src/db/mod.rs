//! Database models and queries

pub mod frases;
pub mod identidades;
pub mod init;
pub mod models;
pub mod settings;
pub mod usuarios;

pub use init::*;
pub use models::*;
