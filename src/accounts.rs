//! Account and session management.
//!
//! Owns user records, credentials, sessions, and the onboarding flag. The
//! connection store reads user records through [`crate::storage::Storage`]
//! but never writes them.

use std::time::{SystemTime, UNIX_EPOCH};

use bcrypt::{hash, verify, DEFAULT_COST};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::storage::{SessionRow, Storage, StorageError, UserRow};

/// Settings key for the one-time onboarding flag.
const ONBOARDING_COMPLETE_KEY: &str = "onboarding_complete";

/// Password shared by the seeded demo accounts.
pub const DEMO_PASSWORD: &str = "kindred-demo";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum AccountError {
    DuplicateEmail(String),
    DuplicateUsername(String),
    InvalidCredentials,
    UserNotFound(String),
    Hash(bcrypt::BcryptError),
    Storage(StorageError),
}

impl std::fmt::Display for AccountError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountError::DuplicateEmail(email) => {
                write!(f, "an account already exists for email {email}")
            }
            AccountError::DuplicateUsername(username) => {
                write!(f, "username {username} is already taken")
            }
            AccountError::InvalidCredentials => write!(f, "invalid email or password"),
            AccountError::UserNotFound(id) => write!(f, "no user with id {id}"),
            AccountError::Hash(e) => write!(f, "password hashing failed: {e}"),
            AccountError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for AccountError {}

impl From<StorageError> for AccountError {
    fn from(e: StorageError) -> Self {
        AccountError::Storage(e)
    }
}

impl From<bcrypt::BcryptError> for AccountError {
    fn from(e: bcrypt::BcryptError) -> Self {
        AccountError::Hash(e)
    }
}

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// Fields required to register a new account. Callers normalize email and
/// username (trim, lowercase) before building this; the store compares them
/// exactly as given.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub name: String,
    pub username: String,
}

/// Partial profile edit. `None` fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub username: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Generate a fresh user id: `u-` plus 16 hex chars of OS randomness.
fn new_user_id() -> String {
    let mut bytes = [0u8; 8];
    OsRng.fill_bytes(&mut bytes);
    format!("u-{}", hex::encode(bytes))
}

/// Generate a fresh session token: 32 hex-encoded random bytes.
fn new_session_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn open_session(storage: &Storage, user_id: &str) -> Result<SessionRow, StorageError> {
    let session = SessionRow {
        token: new_session_token(),
        user_id: user_id.to_string(),
        login_time: now_secs(),
    };
    storage.insert_session(&session)?;
    Ok(session)
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Create a new account and open a session for it.
///
/// Fails if the email or username is already taken. The password is stored
/// as a bcrypt hash, never in the clear.
pub fn register(
    storage: &Storage,
    account: NewAccount,
) -> Result<(UserRow, SessionRow), AccountError> {
    if storage.find_user_by_email(&account.email)?.is_some() {
        return Err(AccountError::DuplicateEmail(account.email));
    }
    if storage.find_user_by_username(&account.username)?.is_some() {
        return Err(AccountError::DuplicateUsername(account.username));
    }

    let user = UserRow {
        id: new_user_id(),
        email: account.email,
        username: account.username,
        name: account.name,
        bio: None,
        avatar: None,
        password_hash: hash(&account.password, DEFAULT_COST)?,
        join_date: now_secs(),
        friends_count: 0,
        connections_count: 0,
    };
    storage.insert_user(&user)?;
    let session = open_session(storage, &user.id)?;
    Ok((user, session))
}

/// Verify credentials and open a session.
///
/// Unknown email and wrong password both report `InvalidCredentials`; the
/// caller cannot tell which identity component failed.
pub fn login(
    storage: &Storage,
    email: &str,
    password: &str,
) -> Result<(UserRow, SessionRow), AccountError> {
    let Some(user) = storage.find_user_by_email(email)? else {
        return Err(AccountError::InvalidCredentials);
    };
    if !verify(password, &user.password_hash)? {
        return Err(AccountError::InvalidCredentials);
    }
    let session = open_session(storage, &user.id)?;
    Ok((user, session))
}

/// Close a session. Returns whether a session existed for the token.
pub fn logout(storage: &Storage, token: &str) -> Result<bool, StorageError> {
    storage.delete_session(token)
}

/// Resolve a session token to its user. `None` if the token is unknown or
/// the referenced user no longer resolves.
pub fn current_user(storage: &Storage, token: &str) -> Result<Option<UserRow>, StorageError> {
    let Some(session) = storage.get_session(token)? else {
        return Ok(None);
    };
    storage.get_user(&session.user_id)
}

/// Merge a partial edit into an existing user record.
///
/// A changed username is re-validated for uniqueness against all other
/// users before the write.
pub fn update_profile(
    storage: &Storage,
    user_id: &str,
    update: ProfileUpdate,
) -> Result<UserRow, AccountError> {
    let Some(mut user) = storage.get_user(user_id)? else {
        return Err(AccountError::UserNotFound(user_id.to_string()));
    };

    if let Some(username) = update.username {
        if username != user.username {
            if let Some(other) = storage.find_user_by_username(&username)? {
                if other.id != user.id {
                    return Err(AccountError::DuplicateUsername(username));
                }
            }
            user.username = username;
        }
    }
    if let Some(name) = update.name {
        user.name = name;
    }
    if let Some(bio) = update.bio {
        user.bio = Some(bio);
    }
    if let Some(avatar) = update.avatar {
        user.avatar = Some(avatar);
    }

    if !storage.update_user(&user)? {
        return Err(AccountError::UserNotFound(user_id.to_string()));
    }
    Ok(user)
}

/// The full user collection, oldest first.
pub fn list_users(storage: &Storage) -> Result<Vec<UserRow>, StorageError> {
    storage.list_users()
}

// ---------------------------------------------------------------------------
// Onboarding flag
// ---------------------------------------------------------------------------

pub fn is_onboarding_complete(storage: &Storage) -> Result<bool, StorageError> {
    Ok(storage.get_setting(ONBOARDING_COMPLETE_KEY)?.as_deref() == Some("true"))
}

pub fn complete_onboarding(storage: &Storage) -> Result<(), StorageError> {
    storage.set_setting(ONBOARDING_COMPLETE_KEY, "true")
}

// ---------------------------------------------------------------------------
// Demo seeding
// ---------------------------------------------------------------------------

struct DemoUser {
    email: &'static str,
    name: &'static str,
    username: &'static str,
    bio: &'static str,
    join_date: u64,
    friends_count: u32,
    connections_count: u32,
}

const DEMO_USERS: &[DemoUser] = &[
    DemoUser {
        email: "alice@example.com",
        name: "Alice Johnson",
        username: "alice_j",
        bio: "Love technology and design. Always learning something new!",
        join_date: 1_705_276_800, // 2024-01-15
        friends_count: 12,
        connections_count: 25,
    },
    DemoUser {
        email: "bob@example.com",
        name: "Bob Smith",
        username: "bobsmith",
        bio: "Developer by day, gamer by night. Coffee enthusiast.",
        join_date: 1_706_745_600, // 2024-02-01
        friends_count: 8,
        connections_count: 15,
    },
    DemoUser {
        email: "carol@example.com",
        name: "Carol Davis",
        username: "carol_d",
        bio: "Digital artist and creative director. Passionate about UI/UX.",
        join_date: 1_705_708_800, // 2024-01-20
        friends_count: 18,
        connections_count: 32,
    },
];

/// Seed the demo identities when the user table is empty. Idempotent: a
/// non-empty table is left untouched. Returns the number of accounts
/// inserted.
///
/// All demo accounts share [`DEMO_PASSWORD`] so they remain usable now that
/// login verifies credentials.
pub fn ensure_demo_users(storage: &Storage) -> Result<u32, AccountError> {
    if storage.count_users()? > 0 {
        return Ok(0);
    }

    let password_hash = hash(DEMO_PASSWORD, DEFAULT_COST)?;
    let mut inserted = 0;
    for demo in DEMO_USERS {
        storage.insert_user(&UserRow {
            id: new_user_id(),
            email: demo.email.to_string(),
            username: demo.username.to_string(),
            name: demo.name.to_string(),
            bio: Some(demo.bio.to_string()),
            avatar: None,
            password_hash: password_hash.clone(),
            join_date: demo.join_date,
            friends_count: demo.friends_count,
            connections_count: demo.connections_count,
        })?;
        inserted += 1;
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_account(tag: &str) -> NewAccount {
        NewAccount {
            email: format!("{tag}@example.com"),
            password: "hunter2!".to_string(),
            name: format!("Test {tag}"),
            username: tag.to_string(),
        }
    }

    #[test]
    fn register_then_current_user_round_trips() {
        let storage = Storage::open_in_memory().unwrap();
        let (user, session) = register(&storage, test_account("dana")).unwrap();

        let resolved = current_user(&storage, &session.token).unwrap().unwrap();
        assert_eq!(resolved.id, user.id);
        assert_eq!(resolved.email, "dana@example.com");
        assert_eq!(resolved.username, "dana");
        assert_eq!(resolved.friends_count, 0);
        assert_eq!(resolved.connections_count, 0);
    }

    #[test]
    fn register_rejects_duplicate_email_without_mutation() {
        let storage = Storage::open_in_memory().unwrap();
        register(&storage, test_account("dana")).unwrap();

        let mut dup = test_account("other");
        dup.email = "dana@example.com".to_string();
        match register(&storage, dup) {
            Err(AccountError::DuplicateEmail(_)) => {}
            other => panic!("expected DuplicateEmail, got {other:?}"),
        }
        assert_eq!(storage.count_users().unwrap(), 1);
    }

    #[test]
    fn register_rejects_duplicate_username_without_mutation() {
        let storage = Storage::open_in_memory().unwrap();
        register(&storage, test_account("dana")).unwrap();

        let mut dup = test_account("dana");
        dup.email = "unused@example.com".to_string();
        match register(&storage, dup) {
            Err(AccountError::DuplicateUsername(_)) => {}
            other => panic!("expected DuplicateUsername, got {other:?}"),
        }
        assert_eq!(storage.count_users().unwrap(), 1);
    }

    #[test]
    fn login_verifies_credentials() {
        let storage = Storage::open_in_memory().unwrap();
        register(&storage, test_account("dana")).unwrap();

        let (user, _) = login(&storage, "dana@example.com", "hunter2!").unwrap();
        assert_eq!(user.username, "dana");

        match login(&storage, "dana@example.com", "wrong") {
            Err(AccountError::InvalidCredentials) => {}
            other => panic!("expected InvalidCredentials, got {other:?}"),
        }
        match login(&storage, "nobody@example.com", "hunter2!") {
            Err(AccountError::InvalidCredentials) => {}
            other => panic!("expected InvalidCredentials, got {other:?}"),
        }
    }

    #[test]
    fn logout_invalidates_the_session() {
        let storage = Storage::open_in_memory().unwrap();
        let (_, session) = register(&storage, test_account("dana")).unwrap();

        assert!(logout(&storage, &session.token).unwrap());
        assert!(current_user(&storage, &session.token).unwrap().is_none());
        // Second logout is a no-op.
        assert!(!logout(&storage, &session.token).unwrap());
    }

    #[test]
    fn update_profile_merges_fields() {
        let storage = Storage::open_in_memory().unwrap();
        let (user, _) = register(&storage, test_account("dana")).unwrap();

        let updated = update_profile(
            &storage,
            &user.id,
            ProfileUpdate {
                bio: Some("hello".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.bio.as_deref(), Some("hello"));
        // Untouched fields keep their values.
        assert_eq!(updated.username, "dana");
        assert_eq!(updated.email, "dana@example.com");
    }

    #[test]
    fn update_profile_rejects_taken_username() {
        let storage = Storage::open_in_memory().unwrap();
        let (dana, _) = register(&storage, test_account("dana")).unwrap();
        register(&storage, test_account("erin")).unwrap();

        match update_profile(
            &storage,
            &dana.id,
            ProfileUpdate {
                username: Some("erin".to_string()),
                ..Default::default()
            },
        ) {
            Err(AccountError::DuplicateUsername(_)) => {}
            other => panic!("expected DuplicateUsername, got {other:?}"),
        }
        // Re-submitting your own username is not a collision.
        let same = update_profile(
            &storage,
            &dana.id,
            ProfileUpdate {
                username: Some("dana".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(same.username, "dana");
    }

    #[test]
    fn demo_seeding_is_idempotent() {
        let storage = Storage::open_in_memory().unwrap();
        assert_eq!(ensure_demo_users(&storage).unwrap(), 3);
        assert_eq!(ensure_demo_users(&storage).unwrap(), 0);
        assert_eq!(storage.count_users().unwrap(), 3);

        // Seeded accounts can log in with the shared demo password.
        let (alice, _) = login(&storage, "alice@example.com", DEMO_PASSWORD).unwrap();
        assert_eq!(alice.username, "alice_j");
        assert_eq!(alice.friends_count, 12);
    }

    #[test]
    fn seeding_skips_a_populated_table() {
        let storage = Storage::open_in_memory().unwrap();
        register(&storage, test_account("dana")).unwrap();
        assert_eq!(ensure_demo_users(&storage).unwrap(), 0);
        assert_eq!(storage.count_users().unwrap(), 1);
    }

    #[test]
    fn onboarding_flag_round_trips() {
        let storage = Storage::open_in_memory().unwrap();
        assert!(!is_onboarding_complete(&storage).unwrap());
        complete_onboarding(&storage).unwrap();
        assert!(is_onboarding_complete(&storage).unwrap());
        // Completing again stays set.
        complete_onboarding(&storage).unwrap();
        assert!(is_onboarding_complete(&storage).unwrap());
    }
}
