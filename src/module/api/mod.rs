//! Diagnostics surface shared by the scanner, catalog and engine

pub mod events;

pub use events::{DiagnosticEvent, DiagnosticReceiver, EventKind, EventManager};
