//! Common type definitions shared across the crate.
//!
//! # ID Types
//!
//! All entity IDs are UUIDs wrapped in type aliases for better type safety:
//!
//! - [`UserId`]: Staff/customer account identifier
//! - [`CustomerId`]: Customer record identifier
//! - [`AppointmentId`]: Appointment identifier
//! - [`ContactRequestId`]: Contact request identifier
//! - [`NotificationId`]: Notification identifier
//! - [`SessionId`]: Refresh-token chain identifier, shared by every token in
//!   one rotation chain
//!
//! # Utility Functions
//!
//! - [`abbrev_uuid`]: Abbreviate UUIDs to first 8 chars for logging

use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type CustomerId = Uuid;
pub type AppointmentId = Uuid;
pub type ContactRequestId = Uuid;
pub type NotificationId = Uuid;
pub type SessionId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbrev_uuid_takes_first_block() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }
}
