use serde::Serialize;

/// One of the four file slots a registration form can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentRole {
    FrontSideImage,
    LeftSideImage,
    RightSideImage,
    VoiceNotes,
}

impl AttachmentRole {
    pub const ALL: [AttachmentRole; 4] = [
        AttachmentRole::FrontSideImage,
        AttachmentRole::LeftSideImage,
        AttachmentRole::RightSideImage,
        AttachmentRole::VoiceNotes,
    ];

    /// Multipart field name, which is also the `users` column name.
    pub fn field_name(self) -> &'static str {
        match self {
            AttachmentRole::FrontSideImage => "front_side_image",
            AttachmentRole::LeftSideImage => "left_side_image",
            AttachmentRole::RightSideImage => "right_side_image",
            AttachmentRole::VoiceNotes => "voice_notes",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.field_name() == name)
    }
}

/// Stored paths of the attachments saved for one registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttachmentPaths {
    pub front_side_image: Option<String>,
    pub left_side_image: Option<String>,
    pub right_side_image: Option<String>,
    pub voice_notes: Option<String>,
}

impl AttachmentPaths {
    pub fn get(&self, role: AttachmentRole) -> Option<&str> {
        match role {
            AttachmentRole::FrontSideImage => self.front_side_image.as_deref(),
            AttachmentRole::LeftSideImage => self.left_side_image.as_deref(),
            AttachmentRole::RightSideImage => self.right_side_image.as_deref(),
            AttachmentRole::VoiceNotes => self.voice_notes.as_deref(),
        }
    }

    pub fn set(&mut self, role: AttachmentRole, path: String) {
        let slot = match role {
            AttachmentRole::FrontSideImage => &mut self.front_side_image,
            AttachmentRole::LeftSideImage => &mut self.left_side_image,
            AttachmentRole::RightSideImage => &mut self.right_side_image,
            AttachmentRole::VoiceNotes => &mut self.voice_notes,
        };
        *slot = Some(path);
    }

    pub fn is_empty(&self) -> bool {
        AttachmentRole::ALL.iter().all(|role| self.get(*role).is_none())
    }
}

/// A registered user as stored in the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRegistration {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(flatten)]
    pub attachments: AttachmentPaths,
}

/// A registration that has passed validation but has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRegistration {
    pub username: String,
    pub email: String,
    pub attachments: AttachmentPaths,
}
