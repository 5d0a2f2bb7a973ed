//! Code for handling IDs
use std::sync::Arc;

macro_rules! define_id_type {
    ($name:ident) => {
        #[derive(
            Clone,
            std::hash::Hash,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            serde::Deserialize,
            Debug,
            serde::Serialize,
        )]
        /// An ID type (e.g. `RecordID`, `EventID`, etc.)
        pub struct $name(pub std::sync::Arc<str>);

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(std::sync::Arc::from(s))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(std::sync::Arc::from(s))
            }
        }

        impl $name {
            /// Create a new ID from a string slice
            pub fn new(id: &str) -> Self {
                $name(std::sync::Arc::from(id))
            }
        }
    };
}

define_id_type!(SourceDatabase);
define_id_type!(RecordID);
define_id_type!(EventID);
define_id_type!(StationID);

/// The identity of a recording in the ground-motion database.
///
/// Record IDs are only unique within a source database, so all four parts are needed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordIdentity {
    /// The database the recording was taken from (e.g. "ESM")
    pub source: SourceDatabase,
    /// The recording's ID within its database
    pub record_id: RecordID,
    /// The earthquake which produced the recording
    pub event_id: EventID,
    /// The station at which it was recorded
    pub station_id: StationID,
}

impl std::fmt::Display for RecordIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.source, self.record_id)
    }
}

impl RecordIdentity {
    /// Create a new [`RecordIdentity`]
    pub fn new(source: &str, record_id: &str, event_id: &str, station_id: &str) -> Self {
        Self {
            source: SourceDatabase(Arc::from(source)),
            record_id: record_id.into(),
            event_id: event_id.into(),
            station_id: station_id.into(),
        }
    }
}
