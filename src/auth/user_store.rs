//! Credential Store
//! Mission: Own user identity records and each user's active refresh-token set

use crate::auth::models::User;
use chrono::Utc;
use rusqlite::{params, Connection, TransactionBehavior};
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// User storage with SQLite backend.
///
/// Membership in the `refresh_tokens` table is the sole source of truth
/// for refresh-token validity. Rotation runs as one IMMEDIATE transaction
/// so concurrent refreshes of the same token cannot both succeed.
pub struct UserStore {
    db_path: String,
}

impl UserStore {
    /// Create a new user store and initialize the schema
    pub fn new(db_path: &str) -> Result<Self, StoreError> {
        let store = Self {
            db_path: db_path.to_string(),
        };
        store.init_db()?;
        Ok(store)
    }

    fn conn(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.db_path)?;
        // Queue concurrent writers instead of failing with SQLITE_BUSY.
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }

    fn init_db(&self) -> Result<(), StoreError> {
        let conn = self.conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password_hash TEXT NOT NULL,
                name TEXT NOT NULL,
                image TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS refresh_tokens (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            )",
            [],
        )?;

        Ok(())
    }

    /// Insert a new user. Fails with `Conflict` if the email is already
    /// taken (case-insensitive match).
    pub fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        name: &str,
        image: Option<&str>,
    ) -> Result<User, StoreError> {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            name: name.to_string(),
            image: image.map(|s| s.to_string()),
            created_at: Utc::now().to_rfc3339(),
        };

        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO users (id, email, password_hash, name, image, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.id.to_string(),
                user.email,
                user.password_hash,
                user.name,
                user.image,
                user.created_at,
            ],
        );

        match inserted {
            Ok(_) => {
                info!("Created user: {}", user.id);
                Ok(user)
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Conflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, email, password_hash, name, image, created_at
             FROM users WHERE email = ?1",
        )?;

        match stmt.query_row(params![email], row_to_user) {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn find_by_id(&self, id: &Uuid) -> Result<Option<User>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, email, password_hash, name, image, created_at
             FROM users WHERE id = ?1",
        )?;

        match stmt.query_row(params![id.to_string()], row_to_user) {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Append a refresh token to the user's active set. Safe to call with
    /// a token that is already present.
    pub fn add_refresh_token(&self, user_id: &Uuid, token: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO refresh_tokens (token, user_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![token, user_id.to_string(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Remove a refresh token from the user's active set. Returns whether
    /// a removal actually occurred; absent tokens are a no-op.
    pub fn remove_refresh_token(&self, user_id: &Uuid, token: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "DELETE FROM refresh_tokens WHERE user_id = ?1 AND token = ?2",
            params![user_id.to_string(), token],
        )?;
        Ok(rows > 0)
    }

    pub fn has_refresh_token(&self, user_id: &Uuid, token: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT 1 FROM refresh_tokens WHERE user_id = ?1 AND token = ?2")?;
        Ok(stmt.exists(params![user_id.to_string(), token])?)
    }

    /// Atomic conditional swap: remove `old_token` and insert `new_token`
    /// as one indivisible step. Succeeds only if `old_token` is currently
    /// a member; otherwise nothing is mutated and `false` is returned.
    ///
    /// The IMMEDIATE transaction takes the write lock up front, so of two
    /// concurrent swaps of the same token exactly one observes the member
    /// row and wins.
    pub fn replace_refresh_token(
        &self,
        user_id: &Uuid,
        old_token: &str,
        new_token: &str,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let removed = tx.execute(
            "DELETE FROM refresh_tokens WHERE user_id = ?1 AND token = ?2",
            params![user_id.to_string(), old_token],
        )?;

        if removed == 0 {
            tx.rollback()?;
            return Ok(false);
        }

        tx.execute(
            "INSERT INTO refresh_tokens (token, user_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![new_token, user_id.to_string(), Utc::now().to_rfc3339()],
        )?;

        tx.commit()?;
        Ok(true)
    }

    /// Update name and/or image; unspecified fields keep their value.
    pub fn update_profile(
        &self,
        user_id: &Uuid,
        name: Option<&str>,
        image: Option<&str>,
    ) -> Result<User, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE users SET name = COALESCE(?1, name), image = COALESCE(?2, image)
             WHERE id = ?3",
            params![name, image, user_id.to_string()],
        )?;

        self.find_by_id(user_id)?.ok_or(StoreError::NotFound)
    }

    pub fn update_password_hash(
        &self,
        user_id: &Uuid,
        new_hash: &str,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            params![new_hash, user_id.to_string()],
        )?;

        if rows == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn row_to_user(row: &rusqlite::Row) -> Result<User, rusqlite::Error> {
    let id: String = row.get(0)?;
    Ok(User {
        id: Uuid::parse_str(&id).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        name: row.get(3)?,
        image: row.get(4)?,
        created_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (UserStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let store = UserStore::new(db_path).unwrap();
        (store, temp_file)
    }

    fn create_test_user(store: &UserStore, email: &str) -> User {
        store.create_user(email, "hash", "Test User", None).unwrap()
    }

    #[test]
    fn test_create_and_retrieve_user() {
        let (store, _temp) = create_test_store();

        let user = store
            .create_user("a@x.com", "hash", "Name", Some("/pic.png"))
            .unwrap();

        let by_email = store.find_by_email("a@x.com").unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        assert_eq!(by_email.image.as_deref(), Some("/pic.png"));

        let by_id = store.find_by_id(&user.id).unwrap().unwrap();
        assert_eq!(by_id.email, "a@x.com");

        assert!(store.find_by_email("missing@x.com").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_email_conflicts_case_insensitively() {
        let (store, _temp) = create_test_store();
        create_test_user(&store, "a@x.com");

        let dup = store.create_user("a@x.com", "h", "N", None);
        assert!(matches!(dup, Err(StoreError::Conflict)));

        // NOCASE collation catches a caller that skipped normalization
        let dup_upper = store.create_user("A@X.COM", "h", "N", None);
        assert!(matches!(dup_upper, Err(StoreError::Conflict)));
    }

    #[test]
    fn test_refresh_token_membership() {
        let (store, _temp) = create_test_store();
        let user = create_test_user(&store, "a@x.com");

        assert!(!store.has_refresh_token(&user.id, "t1").unwrap());

        store.add_refresh_token(&user.id, "t1").unwrap();
        assert!(store.has_refresh_token(&user.id, "t1").unwrap());

        // adding again is a no-op
        store.add_refresh_token(&user.id, "t1").unwrap();

        assert!(store.remove_refresh_token(&user.id, "t1").unwrap());
        assert!(!store.has_refresh_token(&user.id, "t1").unwrap());

        // idempotent removal
        assert!(!store.remove_refresh_token(&user.id, "t1").unwrap());
    }

    #[test]
    fn test_replace_refresh_token_swaps_atomically() {
        let (store, _temp) = create_test_store();
        let user = create_test_user(&store, "a@x.com");

        store.add_refresh_token(&user.id, "old").unwrap();

        assert!(store.replace_refresh_token(&user.id, "old", "new").unwrap());
        assert!(!store.has_refresh_token(&user.id, "old").unwrap());
        assert!(store.has_refresh_token(&user.id, "new").unwrap());

        // replaying the consumed token must not mutate anything
        assert!(!store
            .replace_refresh_token(&user.id, "old", "newer")
            .unwrap());
        assert!(store.has_refresh_token(&user.id, "new").unwrap());
        assert!(!store.has_refresh_token(&user.id, "newer").unwrap());
    }

    #[test]
    fn test_replace_requires_owning_user() {
        let (store, _temp) = create_test_store();
        let alice = create_test_user(&store, "alice@x.com");
        let bob = create_test_user(&store, "bob@x.com");

        store.add_refresh_token(&alice.id, "t1").unwrap();

        // bob cannot rotate alice's token
        assert!(!store.replace_refresh_token(&bob.id, "t1", "t2").unwrap());
        assert!(store.has_refresh_token(&alice.id, "t1").unwrap());
    }

    #[test]
    fn test_tokens_are_independent_per_session() {
        let (store, _temp) = create_test_store();
        let user = create_test_user(&store, "a@x.com");

        store.add_refresh_token(&user.id, "device-a").unwrap();
        store.add_refresh_token(&user.id, "device-b").unwrap();

        assert!(store.remove_refresh_token(&user.id, "device-a").unwrap());
        assert!(store.has_refresh_token(&user.id, "device-b").unwrap());
    }

    #[test]
    fn test_update_profile() {
        let (store, _temp) = create_test_store();
        let user = create_test_user(&store, "a@x.com");

        let updated = store
            .update_profile(&user.id, Some("New Name"), None)
            .unwrap();
        assert_eq!(updated.name, "New Name");
        assert_eq!(updated.image, None);

        let updated = store
            .update_profile(&user.id, None, Some("/new.png"))
            .unwrap();
        assert_eq!(updated.name, "New Name");
        assert_eq!(updated.image.as_deref(), Some("/new.png"));

        let missing = store.update_profile(&Uuid::new_v4(), Some("X"), None);
        assert!(matches!(missing, Err(StoreError::NotFound)));
    }

    #[test]
    fn test_update_password_hash() {
        let (store, _temp) = create_test_store();
        let user = create_test_user(&store, "a@x.com");

        store.update_password_hash(&user.id, "new-hash").unwrap();
        let reloaded = store.find_by_id(&user.id).unwrap().unwrap();
        assert_eq!(reloaded.password_hash, "new-hash");

        let missing = store.update_password_hash(&Uuid::new_v4(), "h");
        assert!(matches!(missing, Err(StoreError::NotFound)));
    }

    #[test]
    fn test_concurrent_replace_single_winner() {
        use std::sync::Arc;
        use std::thread;

        let (store, _temp) = create_test_store();
        let user = create_test_user(&store, "a@x.com");
        store.add_refresh_token(&user.id, "contested").unwrap();

        let store = Arc::new(store);
        let mut handles = Vec::new();
        for i in 0..4 {
            let store = store.clone();
            let user_id = user.id;
            handles.push(thread::spawn(move || {
                store
                    .replace_refresh_token(&user_id, "contested", &format!("winner-{i}"))
                    .unwrap()
            }));
        }

        let wins: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();
        assert_eq!(wins, 1);
    }
}
