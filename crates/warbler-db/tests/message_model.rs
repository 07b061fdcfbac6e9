//! Message model: ownership, NOT NULL, length limit and foreign key.

use warbler_db::models::{NewMessage, NewUser, UserRow};
use warbler_db::{Database, DbError};

struct Fixture {
    db: Database,
    u1: UserRow,
}

fn setup() -> Fixture {
    let db = Database::open_in_memory().unwrap();
    db.reset().unwrap();

    let u1 = db
        .create_user(&NewUser {
            id: Some(1111),
            ..NewUser::new("firstuser", "first111@gmail.com", "HASHED_PASSWORD")
        })
        .unwrap();
    db.create_user(&NewUser {
        id: Some(222),
        ..NewUser::new("seconduser", "second222@gmail.com", "HASHED_PASSWORD")
    })
    .unwrap();

    Fixture { db, u1 }
}

#[test]
fn message_belongs_to_its_author() {
    let Fixture { db, u1 } = setup();

    let m = db.create_message(&NewMessage::new(u1.id, "message1")).unwrap();

    assert_eq!(db.messages_for_user(u1.id, 100).unwrap().len(), 1);
    assert_eq!(db.message_count(u1.id).unwrap(), 1);
    let owner = db.get_user_by_id(m.user_id).unwrap().unwrap();
    assert_eq!(owner, u1);
}

#[test]
fn null_text_is_integrity_error() {
    let Fixture { db, u1 } = setup();

    let err = db
        .create_message(&NewMessage {
            text: None,
            ..NewMessage::new(u1.id, "")
        })
        .unwrap_err();

    assert!(matches!(err, DbError::Integrity(_)), "{err}");
    assert_eq!(db.message_count(u1.id).unwrap(), 0);
}

#[test]
fn overlong_text_is_data_error() {
    let Fixture { db, u1 } = setup();

    let text = "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do eiusmod \
                tempor incididunt ut labore et dolore magna aliqua. Ut enim ad minim veniam, \
                quis nostrud exercitation ullamco laboris nisi ut aliquip ex ea commodo \
                consequat.";
    let err = db.create_message(&NewMessage::new(u1.id, text)).unwrap_err();

    assert!(matches!(err, DbError::Data(_)), "{err}");
}

#[test]
fn text_at_the_limit_is_accepted() {
    let Fixture { db, u1 } = setup();

    let text = "é".repeat(warbler_db::models::MAX_MESSAGE_LEN);
    let m = db.create_message(&NewMessage::new(u1.id, &text)).unwrap();
    assert_eq!(m.text.chars().count(), 140);
}

#[test]
fn unknown_user_is_integrity_error() {
    let Fixture { db, .. } = setup();

    let err = db
        .create_message(&NewMessage::new(12324325, "test message"))
        .unwrap_err();

    assert!(matches!(err, DbError::Integrity(_)), "{err}");
}
