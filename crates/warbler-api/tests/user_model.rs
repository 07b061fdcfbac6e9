//! Signup and authentication against a real schema.

mod common;

use warbler_api::auth::{AuthError, authenticate, signup};
use warbler_db::DbError;
use warbler_db::models::NewUser;

use common::TestApp;

fn setup() -> TestApp {
    let app = TestApp::new();
    app.create_user(1111, "test", "email1@email.com", "password");
    app.create_user(222, "test2", "email2@email.com", "password");
    app
}

#[test]
fn valid_authentication() {
    let app = setup();

    let user = authenticate(app.db(), "test", "password").unwrap().unwrap();
    assert_eq!(user.id, 1111);
}

#[test]
fn invalid_username() {
    let app = setup();
    assert!(authenticate(app.db(), "badusername", "password").unwrap().is_none());
}

#[test]
fn wrong_password() {
    let app = setup();
    assert!(authenticate(app.db(), "test", "badpassword").unwrap().is_none());
}

#[test]
fn unreadable_stored_hash_never_matches() {
    let app = setup();
    app.db()
        .create_user(&NewUser::new("seeded", "seeded@email.com", "HASHED_PASSWORD"))
        .unwrap();

    assert!(authenticate(app.db(), "seeded", "HASHED_PASSWORD").unwrap().is_none());
}

#[test]
fn password_is_stored_hashed() {
    let app = setup();

    let user = app.db().get_user_by_id(1111).unwrap().unwrap();
    assert_ne!(user.password, "password");
    assert!(user.password.starts_with("$argon2"));
}

#[test]
fn signup_without_email_fails_on_insert() {
    let app = setup();

    let mut user = signup("testtest", None, "password", None).unwrap();
    user.id = Some(123456789);
    let err = app.db().create_user(&user).unwrap_err();
    assert!(matches!(err, DbError::Integrity(_)));
}

#[test]
fn signup_with_empty_password_writes_nothing() {
    let app = setup();

    let err = signup("testtest", Some("email@email.com"), "", None).unwrap_err();
    assert!(matches!(err, AuthError::EmptyPassword));
    assert!(app.db().get_user_by_username("testtest").unwrap().is_none());
}

#[test]
fn duplicate_username_is_an_integrity_error() {
    let app = setup();

    let err = app
        .db()
        .create_user(&NewUser::new("test", "other@email.com", "HASHED"))
        .unwrap_err();
    assert!(matches!(err, DbError::Integrity(_)));
}
