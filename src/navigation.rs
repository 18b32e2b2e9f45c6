use serde::Serialize;

use crate::timeline::EntryId;

/// Where the navigation host should go next. The core only produces these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "target", rename_all = "kebab-case")]
pub enum NavigationTarget {
    Message { message: String },
    CheckInDetail { hike_id: String },
    Entry { entry_id: EntryId },
}

impl NavigationTarget {
    pub fn describe(&self) -> String {
        match self {
            NavigationTarget::Message { message } => format!("message: {message}"),
            NavigationTarget::CheckInDetail { hike_id } => format!("check-in detail: hike {hike_id}"),
            NavigationTarget::Entry { entry_id } => format!("entry: {entry_id}"),
        }
    }
}
