//! HTML pages, rendered with Tera templates compiled into the binary.

use std::collections::HashSet;

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tera::{Context, Tera};

use warbler_db::models::{MessageRow, ProfileCounts, UserRow};
use warbler_types::api::Claims;
use warbler_types::models::{Message, Profile, User};

use crate::error::ApiError;

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("home.html", include_str!("../templates/home.html")),
    ("home_anon.html", include_str!("../templates/home_anon.html")),
    (
        "partials/messages.html",
        include_str!("../templates/partials/messages.html"),
    ),
    (
        "partials/profile.html",
        include_str!("../templates/partials/profile.html"),
    ),
    ("users/index.html", include_str!("../templates/users/index.html")),
    ("users/show.html", include_str!("../templates/users/show.html")),
    ("users/related.html", include_str!("../templates/users/related.html")),
    ("users/likes.html", include_str!("../templates/users/likes.html")),
    ("users/edit.html", include_str!("../templates/users/edit.html")),
    ("users/signup.html", include_str!("../templates/users/signup.html")),
    ("users/login.html", include_str!("../templates/users/login.html")),
    ("messages/new.html", include_str!("../templates/messages/new.html")),
    ("messages/show.html", include_str!("../templates/messages/show.html")),
];

pub struct Views {
    tera: Tera,
}

impl Views {
    pub fn new() -> Result<Self, tera::Error> {
        // Tera::default() autoescapes every `.html` template.
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.iter().copied())?;
        Ok(Self { tera })
    }

    pub fn render(&self, name: &str, ctx: &Context) -> Result<Html<String>, ApiError> {
        Ok(Html(self.tera.render(name, ctx)?))
    }

    pub fn render_status(
        &self,
        status: StatusCode,
        name: &str,
        ctx: &Context,
    ) -> Result<Response, ApiError> {
        Ok((status, self.render(name, ctx)?).into_response())
    }
}

/// A fresh page context. Every page gets `viewer` for the nav bar.
pub fn page(viewer: Option<&Claims>) -> Context {
    let mut ctx = Context::new();
    ctx.insert("viewer", &viewer);
    ctx
}

pub fn user_view(row: &UserRow) -> User {
    User {
        id: row.id,
        username: row.username.clone(),
        email: row.email.clone(),
        image_url: row.image_url.clone(),
        header_image_url: row.header_image_url.clone(),
        bio: row.bio.clone(),
        location: row.location.clone(),
    }
}

pub fn user_views(rows: &[UserRow]) -> Vec<User> {
    rows.iter().map(user_view).collect()
}

pub fn profile_view(row: &UserRow, counts: ProfileCounts) -> Profile {
    Profile {
        user: user_view(row),
        messages: counts.messages,
        following: counts.following,
        followers: counts.followers,
        likes: counts.likes,
    }
}

/// `liked` holds the ids of messages the viewer has liked.
pub fn message_views(rows: Vec<MessageRow>, liked: &HashSet<i64>) -> Vec<Message> {
    rows.into_iter()
        .map(|row| Message {
            liked: liked.contains(&row.id),
            posted: row.timestamp.format("%b %-d %Y").to_string(),
            id: row.id,
            text: row.text,
            timestamp: row.timestamp,
            user_id: row.user_id,
            author_username: row.author_username,
            author_image_url: row.author_image_url,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn views() -> Views {
        Views::new().unwrap()
    }

    #[test]
    fn all_templates_compile() {
        assert!(Views::new().is_ok());
    }

    #[test]
    fn user_input_is_escaped() {
        let views = views();
        let mut ctx = page(None);
        ctx.insert(
            "users",
            &vec![User {
                id: 1,
                username: "<script>alert(1)</script>".into(),
                email: "x@test.com".into(),
                image_url: "/a.png".into(),
                header_image_url: "/b.png".into(),
                bio: None,
                location: None,
            }],
        );
        ctx.insert("q", "");

        let Html(body) = views.render("users/index.html", &ctx).unwrap();
        assert!(!body.contains("<script>alert(1)</script>"));
        assert!(body.contains("&lt;script&gt;"));
    }

    #[test]
    fn message_views_mark_likes() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 9, 30, 0).unwrap();
        let row = |id| MessageRow {
            id,
            text: format!("m{id}"),
            timestamp: ts,
            user_id: 1,
            author_username: "alice".into(),
            author_image_url: "/a.png".into(),
        };

        let liked = HashSet::from([2]);
        let views = message_views(vec![row(1), row(2)], &liked);

        assert!(!views[0].liked);
        assert!(views[1].liked);
        assert_eq!(views[0].posted, "Mar 5 2024");
    }
}
