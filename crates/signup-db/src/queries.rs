use crate::Database;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};
use signup_types::models::{AttachmentPaths, NewRegistration, UserRegistration};

const SELECT_USER: &str = "SELECT id, username, email, front_side_image, left_side_image, right_side_image, voice_notes FROM users";

/// Result of an insert attempt that distinguishes a duplicate email from
/// other failures.
#[derive(Debug)]
pub enum InsertOutcome {
    Created(UserRegistration),
    /// The `UNIQUE(email)` constraint rejected the row. Happens when two
    /// requests for the same email both pass the existence check.
    EmailTaken,
}

impl Database {
    // -- Users --

    pub fn email_exists(&self, email: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row("SELECT 1 FROM users WHERE email = ?1 LIMIT 1", [email], |_| Ok(()))
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn insert_registration(&self, new: &NewRegistration) -> Result<InsertOutcome> {
        self.insert_registration_with(new, |_| Ok(()))
    }

    /// Insert `new` in a transaction and run `before_commit` once the row is
    /// in place. An error from `before_commit` rolls the insert back. Not
    /// called when the email turns out to be taken.
    pub fn insert_registration_with<F>(
        &self,
        new: &NewRegistration,
        before_commit: F,
    ) -> Result<InsertOutcome>
    where
        F: FnOnce(&UserRegistration) -> Result<()>,
    {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let outcome = insert_user(&tx, new)?;
            if let InsertOutcome::Created(user) = &outcome {
                before_commit(user)?;
                tx.commit()?;
            }
            Ok(outcome)
        })
    }

    pub fn get_registration_by_email(&self, email: &str) -> Result<Option<UserRegistration>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_USER} WHERE email = ?1"))?;
            let row = stmt.query_row([email], map_user).optional()?;
            Ok(row)
        })
    }

    pub fn count_registrations(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
            Ok(count)
        })
    }
}

fn insert_user(conn: &Connection, new: &NewRegistration) -> Result<InsertOutcome> {
    let paths = &new.attachments;
    let inserted = conn.execute(
        "INSERT INTO users (username, email, front_side_image, left_side_image, right_side_image, voice_notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            &new.username,
            &new.email,
            &paths.front_side_image,
            &paths.left_side_image,
            &paths.right_side_image,
            &paths.voice_notes,
        ],
    );

    match inserted {
        Ok(_) => Ok(InsertOutcome::Created(UserRegistration {
            id: conn.last_insert_rowid(),
            username: new.username.clone(),
            email: new.email.clone(),
            attachments: new.attachments.clone(),
        })),
        Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::EmailTaken),
        Err(e) => Err(e.into()),
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRegistration> {
    Ok(UserRegistration {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        attachments: AttachmentPaths {
            front_side_image: row.get(3)?,
            left_side_image: row.get(4)?,
            right_side_image: row.get(5)?,
            voice_notes: row.get(6)?,
        },
    })
}
