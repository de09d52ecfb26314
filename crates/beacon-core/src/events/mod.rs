//! Gossip announcements exchanged between nodes serving the same namespace

mod announcement;

pub use announcement::{Announcement, AnnouncementEvent, AnnouncementPayload};
