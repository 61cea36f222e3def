//! Desktop client for a video download service: validate a URL, show its
//! metadata, start a server-side job, follow its progress and save the file.

// egui front-end
pub mod app;
// Media service trait and HTTP implementation
pub mod backend;
// Layered client settings
pub mod config;
// Session driver tying backend calls to state changes
pub mod controller;
// Error taxonomy
pub mod error;
// Data models for videos, qualities and jobs
pub mod model;
// Job progress polling
pub mod poller;
// Progress parsing utilities
pub mod progress;
// Pure session state machine
pub mod session;
// Thumbnail fetching
pub mod thumbnail;
// URL shape checks
pub mod validate;

pub use backend::{HttpBackend, MediaBackend};
pub use config::ClientConfig;
pub use controller::DownloadSessionController;
pub use error::{Result, SessionError};
pub use session::{Phase, SessionState};
