pub mod images;
pub mod models;
pub mod sessions;
pub mod style_guides;
pub mod transcriptions;
pub mod usage;
pub mod users;

pub use images::{ImageRepository, NewImageGeneration};
pub use models::{ImageGeneration, Session, StyleGuide, Transcription, UsageRecord, User};
pub use sessions::SessionRepository;
pub use style_guides::StyleGuideRepository;
pub use transcriptions::TranscriptionRepository;
pub use usage::{NewUsageRecord, UsageRepository};
pub use users::UserRepository;

/// Current time as an RFC 3339 string, the format entity rows store.
pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
