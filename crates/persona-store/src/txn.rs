use persona_types::{Profile, ProfileKey, ViewerId, ViewerRecord};

/// The read set of one optimistic transaction.
///
/// Captures the profile document at a specific version together with the
/// viewer record (if any) for the viewer the transaction names.
#[derive(Clone, Debug, PartialEq)]
pub struct TxnSnapshot {
    pub profile: Profile,
    /// Version of the profile document when the snapshot was taken.
    pub version: u64,
    pub viewer: ViewerId,
    pub viewer_record: Option<ViewerRecord>,
}

impl TxnSnapshot {
    pub fn key(&self) -> &ProfileKey {
        &self.profile.key
    }

    /// Returns `true` if the named viewer has already been counted.
    pub fn viewer_seen(&self) -> bool {
        self.viewer_record.is_some()
    }
}

/// The write set of one optimistic transaction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TxnWrite {
    /// Replacement profile document.
    pub profile: Option<Profile>,
    /// Viewer record to create for the snapshot's viewer.
    pub new_viewer: Option<ViewerRecord>,
}

impl TxnWrite {
    pub fn new(profile: Profile) -> Self {
        Self {
            profile: Some(profile),
            new_viewer: None,
        }
    }

    pub fn with_viewer(mut self, record: ViewerRecord) -> Self {
        self.new_viewer = Some(record);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.profile.is_none() && self.new_viewer.is_none()
    }
}
