use axum::{
    Json,
    extract::{
        State,
        multipart::{Multipart, MultipartRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use signup_db::InsertOutcome;
use signup_types::api::RegisterResponse;
use signup_types::models::{AttachmentPaths, NewRegistration};
use tracing::{debug, info, warn};

use crate::AppState;
use crate::error::RegisterError;
use crate::form::{RegistrationForm, Upload};
use crate::storage::StagedUpload;

/// POST /register — multipart form with `username`, `email` and up to four
/// attachments. Attachments are staged before the insert and moved to their
/// final names inside the insert transaction; a request that does not commit
/// only removes its own staged files.
pub async fn register(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, RegisterError> {
    let form = match multipart {
        Ok(multipart) => RegistrationForm::from_multipart(multipart).await?,
        // Not a multipart body at all: no fields were submitted.
        Err(rejection) => {
            debug!("Register body is not multipart: {}", rejection);
            RegistrationForm::default()
        }
    };
    let form = form.validate()?;

    // Fast path for the common duplicate. The unique constraint below still
    // catches concurrent requests that both get past this check.
    let db = state.clone();
    let email = form.email.clone();
    if blocking(move || db.db.email_exists(&email)).await? {
        warn!("Registration rejected: {} already registered", form.email);
        return Err(RegisterError::Conflict);
    }

    let (paths, staged) = stage_uploads(&state, &form.uploads).await?;

    let new = NewRegistration {
        username: form.username,
        email: form.email,
        attachments: paths,
    };
    let db = state.clone();
    let to_publish = staged.clone();
    let outcome = blocking(move || {
        db.db.insert_registration_with(&new, |_| {
            for upload in &to_publish {
                upload.publish().map_err(|e| {
                    anyhow::anyhow!("failed to publish {}: {}", upload.path.display(), e)
                })?;
            }
            Ok(())
        })
    })
    .await;

    match outcome {
        Ok(InsertOutcome::Created(user)) => {
            info!(
                "Registered user {} <{}> with {} attachment(s)",
                user.id,
                user.email,
                staged.len()
            );
            Ok((StatusCode::CREATED, Json(RegisterResponse::registered())))
        }
        Ok(InsertOutcome::EmailTaken) => {
            warn!("Registration lost a race on a duplicate email");
            state.uploads.discard(&staged).await;
            Err(RegisterError::Conflict)
        }
        Err(e) => {
            state.uploads.discard(&staged).await;
            Err(e)
        }
    }
}

/// Stage each upload under a temporary name, stopping at the first failure.
async fn stage_uploads(
    state: &AppState,
    uploads: &[Upload],
) -> Result<(AttachmentPaths, Vec<StagedUpload>), RegisterError> {
    let mut paths = AttachmentPaths::default();
    let mut staged = Vec::with_capacity(uploads.len());

    for upload in uploads {
        match state.uploads.stage(&upload.file_name, &upload.data).await {
            Ok(file) => {
                paths.set(upload.role, file.stored_path());
                staged.push(file);
            }
            Err(source) => {
                state.uploads.discard(&staged).await;
                return Err(RegisterError::StorageWrite {
                    path: state.uploads.file_path(&upload.file_name),
                    source,
                });
            }
        }
    }

    Ok((paths, staged))
}

/// Run a store call on the blocking pool.
async fn blocking<F, T>(f: F) -> Result<T, RegisterError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(f)
        .await
        .map_err(anyhow::Error::from)?;
    Ok(result?)
}
