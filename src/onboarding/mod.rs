//! Onboarding data: transcript messages and the user's progress snapshot.
//!
//! Onboarding runs over seven days. The backend owns the day counter and the
//! completion flag; this crate only carries and displays them.

pub mod model;

pub use model::{DayCompletion, Message, ONBOARDING_DAYS, Role, UserStatus, parse_timestamp};
