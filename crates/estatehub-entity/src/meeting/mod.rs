//! Meeting domain entities.

pub mod model;
pub mod status;

pub use model::{CreateMeeting, Meeting};
pub use status::MeetingStatus;
