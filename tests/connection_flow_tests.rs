//! End-to-end tests for the connection request lifecycle across both
//! stores: registration, request, accept/decline, and the resolved views.

use kindred::accounts::{self, NewAccount};
use kindred::connections::{self, ConnectionError, ConnectionStatus};
use kindred::storage::{db_path, Storage, UserRow};
use tempfile::TempDir;

fn register(storage: &Storage, tag: &str) -> UserRow {
    let (user, _) = accounts::register(
        storage,
        NewAccount {
            email: format!("{tag}@example.com"),
            password: format!("{tag}-secret"),
            name: format!("Test {tag}"),
            username: tag.to_string(),
        },
    )
    .unwrap();
    user
}

#[test]
fn request_accept_scenario() {
    let tmp = TempDir::new().unwrap();
    let storage = Storage::open(&db_path(tmp.path())).unwrap();

    let alice = register(&storage, "alice");
    let bob = register(&storage, "bob");

    let alice_before = connections::connected_users(&storage, &alice.id)
        .unwrap()
        .len();
    let bob_before = connections::connected_users(&storage, &bob.id).unwrap().len();

    connections::send_request(&storage, &alice.id, &bob.id).unwrap();

    let pending = connections::pending_requests(&storage, &bob.id).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].from_user_id, alice.id);

    connections::accept_request(&storage, pending[0].id).unwrap();

    let alice_after = connections::connected_users(&storage, &alice.id).unwrap();
    let bob_after = connections::connected_users(&storage, &bob.id).unwrap();
    assert_eq!(alice_after.len(), alice_before + 1);
    assert_eq!(bob_after.len(), bob_before + 1);
    assert!(alice_after.iter().any(|u| u.id == bob.id));
    assert!(bob_after.iter().any(|u| u.id == alice.id));
}

#[test]
fn accepted_requests_always_have_their_connection() {
    let tmp = TempDir::new().unwrap();
    let storage = Storage::open(&db_path(tmp.path())).unwrap();

    let alice = register(&storage, "alice");
    let bob = register(&storage, "bob");
    let carol = register(&storage, "carol");

    let to_bob = connections::send_request(&storage, &alice.id, &bob.id).unwrap();
    let to_carol = connections::send_request(&storage, &alice.id, &carol.id).unwrap();

    connections::accept_request(&storage, to_bob.id).unwrap();
    connections::decline_request(&storage, to_carol.id).unwrap();

    // The accepted request has its connection row; the declined one does not.
    let resolved = storage.find_request_between(&alice.id, &bob.id).unwrap().unwrap();
    assert_eq!(resolved.status, "accepted");
    assert!(storage.connection_between(&alice.id, &bob.id).unwrap().is_some());

    let declined = storage
        .find_request_between(&alice.id, &carol.id)
        .unwrap()
        .unwrap();
    assert_eq!(declined.status, "declined");
    assert!(storage
        .connection_between(&alice.id, &carol.id)
        .unwrap()
        .is_none());
}

#[test]
fn declined_pairs_reopen_and_can_still_connect() {
    let tmp = TempDir::new().unwrap();
    let storage = Storage::open(&db_path(tmp.path())).unwrap();

    let alice = register(&storage, "alice");
    let bob = register(&storage, "bob");

    let first = connections::send_request(&storage, &alice.id, &bob.id).unwrap();
    connections::decline_request(&storage, first.id).unwrap();
    assert_eq!(
        connections::status_between(&storage, &alice.id, &bob.id).unwrap(),
        ConnectionStatus::None
    );

    // The same pair can try again after a decline.
    let second = connections::send_request(&storage, &alice.id, &bob.id).unwrap();
    assert_eq!(
        connections::status_between(&storage, &bob.id, &alice.id).unwrap(),
        ConnectionStatus::Pending
    );

    connections::accept_request(&storage, second.id).unwrap();
    assert_eq!(
        connections::status_between(&storage, &alice.id, &bob.id).unwrap(),
        ConnectionStatus::Connected
    );

    // And once connected, no further request can be opened either way.
    for (from, to) in [(&alice.id, &bob.id), (&bob.id, &alice.id)] {
        match connections::send_request(&storage, from, to) {
            Err(ConnectionError::AlreadyConnected) => {}
            other => panic!("expected AlreadyConnected, got {other:?}"),
        }
    }
}

#[test]
fn pending_views_are_disjoint_per_direction() {
    let tmp = TempDir::new().unwrap();
    let storage = Storage::open(&db_path(tmp.path())).unwrap();

    let alice = register(&storage, "alice");
    let bob = register(&storage, "bob");
    let carol = register(&storage, "carol");

    connections::send_request(&storage, &alice.id, &bob.id).unwrap();
    connections::send_request(&storage, &carol.id, &alice.id).unwrap();

    let sent = connections::sent_requests(&storage, &alice.id).unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to_user_id, bob.id);

    let pending = connections::pending_requests(&storage, &alice.id).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].from_user_id, carol.id);

    // Neither list shows up on the other side of the relationship.
    assert!(connections::sent_requests(&storage, &bob.id).unwrap().is_empty());
    assert!(connections::pending_requests(&storage, &carol.id)
        .unwrap()
        .is_empty());
}
