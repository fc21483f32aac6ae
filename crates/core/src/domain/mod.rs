pub mod error;
pub mod feedback;
pub mod session;
pub mod settings;
pub mod types;
pub mod voice;
