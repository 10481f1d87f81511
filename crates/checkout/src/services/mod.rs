//! External collaborator boundaries.

pub mod notifications;
