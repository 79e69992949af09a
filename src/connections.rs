//! Connection request lifecycle and accepted-connection lookups.
//!
//! State machine per unordered user pair:
//!
//! ```text
//!  NONE ── send_request(A,B) ──► PENDING(from=A)
//!  PENDING(from=A) ── accept ──► CONNECTED            (terminal)
//!  PENDING(from=A) ── decline ─► DECLINED
//!  DECLINED ── send_request ───► PENDING              (re-opened, either direction)
//! ```
//!
//! Accepting resolves the request and inserts the connection row in one
//! transaction, so an accepted request always has its connection.

use crate::storage::{ConnectionRequestRow, ConnectionRow, Storage, StorageError, UserRow};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConnectionError {
    /// A user cannot send a connection request to themselves.
    SelfRequest,
    /// The pair already has an accepted connection.
    AlreadyConnected,
    /// A pending request already exists between the pair, in either
    /// direction.
    RequestPending,
    /// The request has already been accepted or declined; carries the
    /// current status.
    AlreadyResolved(String),
    RequestNotFound(i64),
    UserNotFound(String),
    Storage(StorageError),
}

impl std::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionError::SelfRequest => {
                write!(f, "cannot send a connection request to yourself")
            }
            ConnectionError::AlreadyConnected => write!(f, "already connected with this user"),
            ConnectionError::RequestPending => {
                write!(f, "a connection request is already pending")
            }
            ConnectionError::AlreadyResolved(status) => {
                write!(f, "connection request is already {status}")
            }
            ConnectionError::RequestNotFound(id) => {
                write!(f, "no connection request with id {id}")
            }
            ConnectionError::UserNotFound(id) => write!(f, "no user with id {id}"),
            ConnectionError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for ConnectionError {}

impl From<StorageError> for ConnectionError {
    fn from(e: StorageError) -> Self {
        ConnectionError::Storage(e)
    }
}

/// Relationship between two users as seen from the first one's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No connection and no pending request.
    None,
    /// The caller sent a request that is still pending.
    Sent,
    /// The other user sent a request awaiting the caller's decision.
    Pending,
    /// An accepted connection exists.
    Connected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::None => "none",
            ConnectionStatus::Sent => "sent",
            ConnectionStatus::Pending => "pending",
            ConnectionStatus::Connected => "connected",
        }
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Send a connection request from one user to another.
///
/// A previously declined pair does not stay blocked: the declined row is
/// re-opened as pending under the new direction. A pending request or an
/// accepted connection between the pair rejects the send.
pub fn send_request(
    storage: &Storage,
    from_user_id: &str,
    to_user_id: &str,
) -> Result<ConnectionRequestRow, ConnectionError> {
    if from_user_id == to_user_id {
        return Err(ConnectionError::SelfRequest);
    }
    if storage.get_user(from_user_id)?.is_none() {
        return Err(ConnectionError::UserNotFound(from_user_id.to_string()));
    }
    if storage.get_user(to_user_id)?.is_none() {
        return Err(ConnectionError::UserNotFound(to_user_id.to_string()));
    }
    if storage.connection_between(from_user_id, to_user_id)?.is_some() {
        return Err(ConnectionError::AlreadyConnected);
    }

    match storage.find_request_between(from_user_id, to_user_id)? {
        Some(existing) if existing.status == "pending" => Err(ConnectionError::RequestPending),
        Some(existing) if existing.status == "accepted" => {
            // The request resolved but its connection row is gone; treat the
            // pair as connected rather than minting a duplicate request.
            Err(ConnectionError::AlreadyConnected)
        }
        Some(declined) => {
            storage.reopen_request(declined.id, from_user_id, to_user_id)?;
            storage
                .get_connection_request(declined.id)?
                .ok_or(ConnectionError::RequestNotFound(declined.id))
        }
        None => {
            let now = now_secs();
            let id = storage.insert_connection_request(&ConnectionRequestRow {
                id: 0,
                from_user_id: from_user_id.to_string(),
                to_user_id: to_user_id.to_string(),
                status: "pending".to_string(),
                created_at: now,
                updated_at: now,
            })?;
            storage
                .get_connection_request(id)?
                .ok_or(ConnectionError::RequestNotFound(id))
        }
    }
}

/// Pending requests addressed to a user, newest first.
pub fn pending_requests(
    storage: &Storage,
    user_id: &str,
) -> Result<Vec<ConnectionRequestRow>, StorageError> {
    storage.list_pending_requests_to(user_id)
}

/// Pending requests a user has sent, newest first.
pub fn sent_requests(
    storage: &Storage,
    user_id: &str,
) -> Result<Vec<ConnectionRequestRow>, StorageError> {
    storage.list_pending_requests_from(user_id)
}

/// Accept a pending request, creating the connection.
pub fn accept_request(
    storage: &Storage,
    request_id: i64,
) -> Result<ConnectionRow, ConnectionError> {
    let Some(request) = storage.get_connection_request(request_id)? else {
        return Err(ConnectionError::RequestNotFound(request_id));
    };
    if request.status != "pending" {
        return Err(ConnectionError::AlreadyResolved(request.status));
    }
    Ok(storage.accept_request_and_connect(request_id)?)
}

/// Decline a pending request. No connection row is created.
pub fn decline_request(storage: &Storage, request_id: i64) -> Result<(), ConnectionError> {
    let Some(request) = storage.get_connection_request(request_id)? else {
        return Err(ConnectionError::RequestNotFound(request_id));
    };
    if request.status != "pending" {
        return Err(ConnectionError::AlreadyResolved(request.status));
    }
    if !storage.update_request_status(request_id, "declined")? {
        return Err(ConnectionError::RequestNotFound(request_id));
    }
    Ok(())
}

/// Relationship between two users from `user_id`'s perspective.
///
/// An accepted connection wins over any lingering request row.
pub fn status_between(
    storage: &Storage,
    user_id: &str,
    other_id: &str,
) -> Result<ConnectionStatus, StorageError> {
    if storage.connection_between(user_id, other_id)?.is_some() {
        return Ok(ConnectionStatus::Connected);
    }
    match storage.find_request_between(user_id, other_id)? {
        Some(request) if request.status == "pending" => {
            if request.from_user_id == user_id {
                Ok(ConnectionStatus::Sent)
            } else {
                Ok(ConnectionStatus::Pending)
            }
        }
        _ => Ok(ConnectionStatus::None),
    }
}

/// Users connected to `user_id`, resolved to full records.
pub fn connected_users(storage: &Storage, user_id: &str) -> Result<Vec<UserRow>, StorageError> {
    storage.list_connected_users(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{self, NewAccount};

    fn register(storage: &Storage, tag: &str) -> UserRow {
        let (user, _) = accounts::register(
            storage,
            NewAccount {
                email: format!("{tag}@example.com"),
                password: "hunter2!".to_string(),
                name: format!("Test {tag}"),
                username: tag.to_string(),
            },
        )
        .unwrap();
        user
    }

    #[test]
    fn send_sets_directional_statuses() {
        let storage = Storage::open_in_memory().unwrap();
        let alice = register(&storage, "alice");
        let bob = register(&storage, "bob");

        let request = send_request(&storage, &alice.id, &bob.id).unwrap();
        assert_eq!(request.status, "pending");
        assert_eq!(request.from_user_id, alice.id);

        assert_eq!(
            status_between(&storage, &alice.id, &bob.id).unwrap(),
            ConnectionStatus::Sent
        );
        assert_eq!(
            status_between(&storage, &bob.id, &alice.id).unwrap(),
            ConnectionStatus::Pending
        );
    }

    #[test]
    fn duplicate_send_is_rejected_and_leaves_one_row() {
        let storage = Storage::open_in_memory().unwrap();
        let alice = register(&storage, "alice");
        let bob = register(&storage, "bob");

        send_request(&storage, &alice.id, &bob.id).unwrap();
        match send_request(&storage, &alice.id, &bob.id) {
            Err(ConnectionError::RequestPending) => {}
            other => panic!("expected RequestPending, got {other:?}"),
        }
        // The reverse direction is also blocked while the pair is pending.
        match send_request(&storage, &bob.id, &alice.id) {
            Err(ConnectionError::RequestPending) => {}
            other => panic!("expected RequestPending, got {other:?}"),
        }
        assert_eq!(pending_requests(&storage, &bob.id).unwrap().len(), 1);
        assert_eq!(sent_requests(&storage, &alice.id).unwrap().len(), 1);
    }

    #[test]
    fn self_request_is_rejected() {
        let storage = Storage::open_in_memory().unwrap();
        let alice = register(&storage, "alice");
        match send_request(&storage, &alice.id, &alice.id) {
            Err(ConnectionError::SelfRequest) => {}
            other => panic!("expected SelfRequest, got {other:?}"),
        }
    }

    #[test]
    fn unknown_recipient_is_rejected() {
        let storage = Storage::open_in_memory().unwrap();
        let alice = register(&storage, "alice");
        match send_request(&storage, &alice.id, "u-doesnotexist") {
            Err(ConnectionError::UserNotFound(_)) => {}
            other => panic!("expected UserNotFound, got {other:?}"),
        }
    }

    #[test]
    fn accept_connects_both_sides() {
        let storage = Storage::open_in_memory().unwrap();
        let alice = register(&storage, "alice");
        let bob = register(&storage, "bob");

        let request = send_request(&storage, &alice.id, &bob.id).unwrap();
        let connection = accept_request(&storage, request.id).unwrap();
        assert_eq!(connection.status, "accepted");

        assert_eq!(
            status_between(&storage, &alice.id, &bob.id).unwrap(),
            ConnectionStatus::Connected
        );
        assert_eq!(
            status_between(&storage, &bob.id, &alice.id).unwrap(),
            ConnectionStatus::Connected
        );

        let alice_connections = connected_users(&storage, &alice.id).unwrap();
        assert!(alice_connections.iter().any(|u| u.id == bob.id));
        let bob_connections = connected_users(&storage, &bob.id).unwrap();
        assert!(bob_connections.iter().any(|u| u.id == alice.id));

        // The resolved request leaves the pending views.
        assert!(pending_requests(&storage, &bob.id).unwrap().is_empty());
        assert!(sent_requests(&storage, &alice.id).unwrap().is_empty());
    }

    #[test]
    fn accept_is_single_shot() {
        let storage = Storage::open_in_memory().unwrap();
        let alice = register(&storage, "alice");
        let bob = register(&storage, "bob");

        let request = send_request(&storage, &alice.id, &bob.id).unwrap();
        accept_request(&storage, request.id).unwrap();
        match accept_request(&storage, request.id) {
            Err(ConnectionError::AlreadyResolved(status)) => assert_eq!(status, "accepted"),
            other => panic!("expected AlreadyResolved, got {other:?}"),
        }
        // Exactly one connection row exists for the pair.
        assert_eq!(storage.count_connections().unwrap(), 1);
    }

    #[test]
    fn accept_unknown_request_fails() {
        let storage = Storage::open_in_memory().unwrap();
        match accept_request(&storage, 999) {
            Err(ConnectionError::RequestNotFound(999)) => {}
            other => panic!("expected RequestNotFound, got {other:?}"),
        }
    }

    #[test]
    fn decline_leaves_the_pair_unconnected() {
        let storage = Storage::open_in_memory().unwrap();
        let alice = register(&storage, "alice");
        let bob = register(&storage, "bob");

        let request = send_request(&storage, &alice.id, &bob.id).unwrap();
        decline_request(&storage, request.id).unwrap();

        assert_eq!(
            status_between(&storage, &alice.id, &bob.id).unwrap(),
            ConnectionStatus::None
        );
        assert!(connected_users(&storage, &alice.id).unwrap().is_empty());
        assert!(connected_users(&storage, &bob.id).unwrap().is_empty());

        match decline_request(&storage, request.id) {
            Err(ConnectionError::AlreadyResolved(status)) => assert_eq!(status, "declined"),
            other => panic!("expected AlreadyResolved, got {other:?}"),
        }
    }

    #[test]
    fn declined_pair_can_be_requested_again() {
        let storage = Storage::open_in_memory().unwrap();
        let alice = register(&storage, "alice");
        let bob = register(&storage, "bob");

        let first = send_request(&storage, &alice.id, &bob.id).unwrap();
        decline_request(&storage, first.id).unwrap();

        // Bob re-opens the pair from his side; the row flips direction.
        let reopened = send_request(&storage, &bob.id, &alice.id).unwrap();
        assert_eq!(reopened.id, first.id);
        assert_eq!(reopened.status, "pending");
        assert_eq!(reopened.from_user_id, bob.id);
        assert_eq!(
            status_between(&storage, &alice.id, &bob.id).unwrap(),
            ConnectionStatus::Pending
        );
    }

    #[test]
    fn connected_pair_rejects_further_requests() {
        let storage = Storage::open_in_memory().unwrap();
        let alice = register(&storage, "alice");
        let bob = register(&storage, "bob");

        let request = send_request(&storage, &alice.id, &bob.id).unwrap();
        accept_request(&storage, request.id).unwrap();

        match send_request(&storage, &bob.id, &alice.id) {
            Err(ConnectionError::AlreadyConnected) => {}
            other => panic!("expected AlreadyConnected, got {other:?}"),
        }
    }

    #[test]
    fn status_is_none_between_strangers() {
        let storage = Storage::open_in_memory().unwrap();
        let alice = register(&storage, "alice");
        let bob = register(&storage, "bob");
        assert_eq!(
            status_between(&storage, &alice.id, &bob.id).unwrap(),
            ConnectionStatus::None
        );
    }
}
