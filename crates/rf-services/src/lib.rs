//! # rf-services
//!
//! Access control and consistency rules of the forum, written against the
//! `rf-core` ports only. `Forum` is the entry point; the components are public
//! for callers that want one piece on its own.

pub mod cascade;
pub mod content;
pub mod credentials;
pub mod forum;
pub mod guard;
pub mod notifications;
pub mod reports;
pub mod sessions;
pub mod throttle;
pub mod validation;
pub mod votes;

pub use forum::{Forum, ForumSettings};
pub use throttle::ThrottlePolicy;
