use axum::extract::Multipart;
use bytes::Bytes;
use signup_types::models::AttachmentRole;

use crate::error::{INVALID_FILE_NAME, MISSING_IDENTITY, RegisterError};
use crate::storage::sanitize_file_name;

/// A file part as it arrived, before its name is checked.
#[derive(Debug)]
pub struct RawUpload {
    pub role: AttachmentRole,
    pub file_name: String,
    pub data: Bytes,
}

/// Everything `POST /register` reads from the multipart body.
///
/// Text parts fill `username` and `email`, parts with a filename fill the
/// attachment slots. For repeated names the first part wins. File parts with
/// an empty filename are what browsers send for an untouched file input, so
/// they count as not supplied.
#[derive(Debug, Default)]
pub struct RegistrationForm {
    pub username: Option<String>,
    pub email: Option<String>,
    pub uploads: Vec<RawUpload>,
}

/// A validated upload, safe to write into the upload directory.
#[derive(Debug)]
pub struct Upload {
    pub role: AttachmentRole,
    pub file_name: String,
    pub data: Bytes,
}

/// A form that passed presence and filename checks.
#[derive(Debug)]
pub struct ValidRegistration {
    pub username: String,
    pub email: String,
    pub uploads: Vec<Upload>,
}

impl RegistrationForm {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, RegisterError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            match field.file_name().map(str::to_owned) {
                None => {
                    let slot = match name.as_str() {
                        "username" => &mut form.username,
                        "email" => &mut form.email,
                        _ => continue,
                    };
                    let value = field.text().await?;
                    if slot.is_none() {
                        *slot = Some(value);
                    }
                }
                Some(file_name) => {
                    let Some(role) = AttachmentRole::from_field_name(&name) else {
                        continue;
                    };
                    let data = field.bytes().await?;
                    if file_name.is_empty() || form.has_upload(role) {
                        continue;
                    }
                    form.uploads.push(RawUpload {
                        role,
                        file_name,
                        data,
                    });
                }
            }
        }

        Ok(form)
    }

    fn has_upload(&self, role: AttachmentRole) -> bool {
        self.uploads.iter().any(|u| u.role == role)
    }

    pub fn validate(self) -> Result<ValidRegistration, RegisterError> {
        let username = self.username.filter(|s| !s.is_empty());
        let email = self.email.filter(|s| !s.is_empty());
        let (Some(username), Some(email)) = (username, email) else {
            return Err(RegisterError::Validation(MISSING_IDENTITY));
        };

        let uploads = self
            .uploads
            .into_iter()
            .map(|raw| -> Result<Upload, RegisterError> {
                let file_name = sanitize_file_name(&raw.file_name)
                    .ok_or(RegisterError::Validation(INVALID_FILE_NAME))?
                    .to_string();
                Ok(Upload {
                    role: raw.role,
                    file_name,
                    data: raw.data,
                })
            })
            .collect::<Result<Vec<_>, RegisterError>>()?;

        Ok(ValidRegistration {
            username,
            email,
            uploads,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(username: Option<&str>, email: Option<&str>) -> RegistrationForm {
        RegistrationForm {
            username: username.map(Into::into),
            email: email.map(Into::into),
            uploads: Vec::new(),
        }
    }

    fn assert_missing_identity(form: RegistrationForm) {
        match form.validate() {
            Err(RegisterError::Validation(msg)) => assert_eq!(msg, MISSING_IDENTITY),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn username_and_email_are_required() {
        assert_missing_identity(form(None, Some("a@example.com")));
        assert_missing_identity(form(Some("ada"), None));
        assert_missing_identity(form(None, None));
        assert_missing_identity(form(Some(""), Some("a@example.com")));
        assert_missing_identity(form(Some("ada"), Some("")));
    }

    #[test]
    fn valid_form_keeps_uploads_in_order() {
        let mut f = form(Some("ada"), Some("a@example.com"));
        f.uploads.push(RawUpload {
            role: AttachmentRole::VoiceNotes,
            file_name: "note.wav".into(),
            data: Bytes::from_static(b"RIFF"),
        });
        f.uploads.push(RawUpload {
            role: AttachmentRole::FrontSideImage,
            file_name: "photos/front.png".into(),
            data: Bytes::from_static(b"PNG"),
        });

        let valid = f.validate().unwrap();
        assert_eq!(valid.username, "ada");
        assert_eq!(valid.uploads.len(), 2);
        assert_eq!(valid.uploads[0].file_name, "note.wav");
        assert_eq!(valid.uploads[1].file_name, "front.png");
        assert_eq!(valid.uploads[1].role, AttachmentRole::FrontSideImage);
    }

    #[test]
    fn traversal_only_file_name_is_rejected() {
        let mut f = form(Some("ada"), Some("a@example.com"));
        f.uploads.push(RawUpload {
            role: AttachmentRole::LeftSideImage,
            file_name: "../..".into(),
            data: Bytes::new(),
        });

        match f.validate() {
            Err(RegisterError::Validation(msg)) => assert_eq!(msg, INVALID_FILE_NAME),
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
