//! Data models

pub mod service;
pub mod text;
pub mod visitor;

// Re-export commonly used types
pub use service::{CreateService, Service, ServiceView};
pub use text::{Text, TextMap};
pub use visitor::{NewVisitor, PersonalData, Visitor};
