pub mod events;
pub mod speech_manager;

pub use speech_manager::BilingualSpeechManager;
