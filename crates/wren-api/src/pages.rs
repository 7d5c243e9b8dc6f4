//! Minimal server-rendered pages. Rendering is a boundary contract here,
//! not a subsystem: plain string building, no template engine. User content
//! is stored as-given and escaped only at this layer.

use std::collections::HashSet;
use std::fmt::Write;

use axum::response::Html;
use wren_types::forms::{LoginForm, MessageForm, ProfileForm, SignupForm};
use wren_types::{Message, User};

use crate::forms::ValidationErrors;
use crate::session::{Flash, SessionContext};

pub fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Wrap a page body in the layout, draining the session's flash messages.
pub fn render(ctx: &SessionContext, user: Option<&User>, title: &str, body: String) -> Html<String> {
    let flashes = ctx.take_flashes();
    Html(layout(title, user, &flashes, &ctx.csrf_token(), &body))
}

fn layout(title: &str, user: Option<&User>, flashes: &[Flash], csrf: &str, body: &str) -> String {
    let nav = match user {
        Some(u) => format!(
            concat!(
                "<a href=\"/\">Home</a> ",
                "<a href=\"/users\">Users</a> ",
                "<a href=\"/messages/new\">New message</a> ",
                "<a href=\"/users/{id}\">@{name}</a> ",
                "<a href=\"/users/profile\">Profile</a> ",
                "<form method=\"post\" action=\"/logout\" class=\"inline\">{csrf}",
                "<button type=\"submit\">Log out</button></form>"
            ),
            id = u.id,
            name = escape(&u.username),
            csrf = csrf_input(csrf),
        ),
        None => "<a href=\"/\">Home</a> <a href=\"/login\">Log in</a> <a href=\"/signup\">Sign up</a>"
            .to_string(),
    };

    let mut flash_html = String::new();
    for flash in flashes {
        let _ = write!(
            flash_html,
            "<div class=\"flash {}\">{}</div>",
            flash.level.css_class(),
            escape(&flash.message)
        );
    }

    format!(
        concat!(
            "<!doctype html>\n<html>\n<head><meta charset=\"utf-8\">",
            "<title>{title} · Wren</title></head>\n",
            "<body>\n<nav>{nav}</nav>\n{flashes}\n<main>\n{body}\n</main>\n</body>\n</html>"
        ),
        title = escape(title),
        nav = nav,
        flashes = flash_html,
        body = body,
    )
}

fn csrf_input(csrf: &str) -> String {
    format!(
        "<input type=\"hidden\" name=\"csrf_token\" value=\"{}\">",
        escape(csrf)
    )
}

fn field(
    label: &str,
    kind: &str,
    name: &str,
    value: &str,
    errors: &ValidationErrors,
) -> String {
    let mut out = format!(
        concat!(
            "<p><label>{label}<br>",
            "<input type=\"{kind}\" name=\"{name}\" value=\"{value}\"></label>"
        ),
        label = escape(label),
        kind = kind,
        name = name,
        value = escape(value),
    );
    for message in errors.field(name) {
        let _ = write!(out, "<span class=\"error\">{}</span>", escape(message));
    }
    out.push_str("</p>");
    out
}

fn textarea(label: &str, name: &str, value: &str, errors: &ValidationErrors) -> String {
    let mut out = format!(
        "<p><label>{}<br><textarea name=\"{}\">{}</textarea></label>",
        escape(label),
        name,
        escape(value),
    );
    for message in errors.field(name) {
        let _ = write!(out, "<span class=\"error\">{}</span>", escape(message));
    }
    out.push_str("</p>");
    out
}

/// One message in a list or on its own page, with the like toggle for
/// other users' messages and the delete button for one's own.
fn message_item(m: &Message, viewer: &User, liked: bool, csrf: &str, came_from: &str) -> String {
    let action = if m.user_id == viewer.id {
        format!(
            concat!(
                "<form method=\"post\" action=\"/messages/{id}/delete\" class=\"inline\">{csrf}",
                "<button type=\"submit\">Delete</button></form>"
            ),
            id = m.id,
            csrf = csrf_input(csrf),
        )
    } else {
        format!(
            concat!(
                "<form method=\"post\" action=\"/messages/{id}/like\" class=\"inline\">{csrf}",
                "<input type=\"hidden\" name=\"came_from\" value=\"{came_from}\">",
                "<button type=\"submit\">{glyph}</button></form>"
            ),
            id = m.id,
            csrf = csrf_input(csrf),
            came_from = escape(came_from),
            glyph = if liked { "Unlike" } else { "Like" },
        )
    };

    format!(
        concat!(
            "<li class=\"message\">",
            "<a href=\"/users/{uid}\">@{author}</a> ",
            "<a href=\"/messages/{id}\"><time>{time}</time></a>",
            "<p>{text}</p>",
            "{action}",
            "</li>"
        ),
        uid = m.user_id,
        author = escape(&m.username),
        id = m.id,
        time = m.created_at.format("%d %B %Y, %H:%M"),
        text = escape(&m.text),
        action = action,
    )
}

fn message_list(
    messages: &[Message],
    viewer: &User,
    liked: &HashSet<i64>,
    csrf: &str,
    came_from: &str,
) -> String {
    if messages.is_empty() {
        return "<p>No messages yet.</p>".to_string();
    }
    let mut out = String::from("<ul class=\"messages\">");
    for m in messages {
        out.push_str(&message_item(m, viewer, liked.contains(&m.id), csrf, came_from));
    }
    out.push_str("</ul>");
    out
}

fn user_list(users: &[User]) -> String {
    if users.is_empty() {
        return "<p>No users found.</p>".to_string();
    }
    let mut out = String::from("<ul class=\"users\">");
    for u in users {
        let _ = write!(
            out,
            "<li><img src=\"{}\" alt=\"\" width=\"48\"> <a href=\"/users/{}\">@{}</a></li>",
            escape(&u.image_url),
            u.id,
            escape(&u.username),
        );
    }
    out.push_str("</ul>");
    out
}

// -- Home --

pub fn home_feed(messages: &[Message], viewer: &User, liked: &HashSet<i64>, csrf: &str) -> String {
    format!("<h1>Home</h1>{}", message_list(messages, viewer, liked, csrf, "/"))
}

pub fn home_anon() -> String {
    concat!(
        "<h1>What's happening?</h1>",
        "<p>Sign up now to get your own personalized timeline.</p>",
        "<p><a href=\"/signup\">Sign up</a></p>"
    )
    .to_string()
}

// -- Auth --

pub fn signup_form(form: &SignupForm, errors: &ValidationErrors, csrf: &str) -> String {
    format!(
        concat!(
            "<h1>Join Wren today.</h1>",
            "<form method=\"post\" action=\"/signup\">{csrf}{username}{email}{password}{image_url}",
            "<button type=\"submit\">Sign up</button></form>"
        ),
        csrf = csrf_input(csrf),
        username = field("Username", "text", "username", &form.username, errors),
        email = field("E-mail", "text", "email", &form.email, errors),
        password = field("Password", "password", "password", "", errors),
        image_url = field("(Optional) Image URL", "text", "image_url", &form.image_url, errors),
    )
}

pub fn login_form(form: &LoginForm, errors: &ValidationErrors, csrf: &str) -> String {
    format!(
        concat!(
            "<h1>Welcome back.</h1>",
            "<form method=\"post\" action=\"/login\">{csrf}{username}{password}",
            "<button type=\"submit\">Log in</button></form>"
        ),
        csrf = csrf_input(csrf),
        username = field("Username", "text", "username", &form.username, errors),
        password = field("Password", "password", "password", "", errors),
    )
}

// -- Users --

pub fn users_index(users: &[User], q: Option<&str>) -> String {
    format!(
        concat!(
            "<h1>Users</h1>",
            "<form method=\"get\" action=\"/users\">",
            "<input type=\"text\" name=\"q\" value=\"{q}\" placeholder=\"Search users\">",
            "<button type=\"submit\">Search</button></form>",
            "{list}"
        ),
        q = escape(q.unwrap_or("")),
        list = user_list(users),
    )
}

pub fn user_detail(
    profile: &User,
    messages: &[Message],
    viewer: &User,
    is_following: bool,
    liked: &HashSet<i64>,
    csrf: &str,
) -> String {
    let follow_action = if profile.id == viewer.id {
        String::new()
    } else if is_following {
        format!(
            concat!(
                "<form method=\"post\" action=\"/users/stop-following/{id}\" class=\"inline\">{csrf}",
                "<button type=\"submit\">Unfollow</button></form>"
            ),
            id = profile.id,
            csrf = csrf_input(csrf),
        )
    } else {
        format!(
            concat!(
                "<form method=\"post\" action=\"/users/follow/{id}\" class=\"inline\">{csrf}",
                "<button type=\"submit\">Follow</button></form>"
            ),
            id = profile.id,
            csrf = csrf_input(csrf),
        )
    };

    let delete_account = if profile.id == viewer.id {
        format!(
            concat!(
                "<form method=\"post\" action=\"/users/delete\">{csrf}",
                "<button type=\"submit\">Delete account</button></form>"
            ),
            csrf = csrf_input(csrf),
        )
    } else {
        String::new()
    };

    format!(
        concat!(
            "<img src=\"{header}\" alt=\"\" class=\"header\">",
            "<h1><img src=\"{image}\" alt=\"\" width=\"64\"> @{name}</h1>",
            "<p>{bio}</p><p>{location}</p>",
            "<p><a href=\"/users/{id}/following\">Following</a> ",
            "<a href=\"/users/{id}/followers\">Followers</a> ",
            "<a href=\"/users/{id}/likes\">Likes</a></p>",
            "{follow_action}{messages}{delete_account}"
        ),
        header = escape(&profile.header_image_url),
        image = escape(&profile.image_url),
        name = escape(&profile.username),
        bio = escape(&profile.bio),
        location = escape(&profile.location),
        id = profile.id,
        follow_action = follow_action,
        messages = message_list(messages, viewer, liked, csrf, &format!("/users/{}", profile.id)),
        delete_account = delete_account,
    )
}

pub fn follow_list(heading: &str, profile: &User, users: &[User]) -> String {
    format!(
        "<h1>@{} — {}</h1>{}",
        escape(&profile.username),
        escape(heading),
        user_list(users),
    )
}

pub fn likes_page(
    profile: &User,
    messages: &[Message],
    viewer: &User,
    liked: &HashSet<i64>,
    csrf: &str,
) -> String {
    format!(
        "<h1>@{} — Likes</h1>{}",
        escape(&profile.username),
        message_list(messages, viewer, liked, csrf, &format!("/users/{}/likes", profile.id)),
    )
}

pub fn profile_form(form: &ProfileForm, errors: &ValidationErrors, csrf: &str) -> String {
    format!(
        concat!(
            "<h1>Edit your profile.</h1>",
            "<form method=\"post\" action=\"/users/profile\">{csrf}",
            "{username}{email}{image_url}{header_image_url}{bio}{location}{password}",
            "<button type=\"submit\">Save</button></form>"
        ),
        csrf = csrf_input(csrf),
        username = field("Username", "text", "username", &form.username, errors),
        email = field("Email", "text", "email", &form.email, errors),
        image_url = field("(Optional) Image URL", "text", "image_url", &form.image_url, errors),
        header_image_url = field(
            "(Optional) Header Image URL",
            "text",
            "header_image_url",
            &form.header_image_url,
            errors
        ),
        bio = textarea("(Optional) Tell us about yourself", "bio", &form.bio, errors),
        location = field("(Optional) Location", "text", "location", &form.location, errors),
        password = field("Current password, to confirm changes", "password", "password", "", errors),
    )
}

// -- Messages --

pub fn message_form(form: &MessageForm, errors: &ValidationErrors, csrf: &str) -> String {
    format!(
        concat!(
            "<h1>Add my message!</h1>",
            "<form method=\"post\" action=\"/messages/new\">{csrf}{text}",
            "<button type=\"submit\">Post</button></form>"
        ),
        csrf = csrf_input(csrf),
        text = textarea("text", "text", &form.text, errors),
    )
}

pub fn message_detail(message: &Message, viewer: &User, liked: bool, csrf: &str) -> String {
    let mut set = HashSet::new();
    if liked {
        set.insert(message.id);
    }
    message_list(
        std::slice::from_ref(message),
        viewer,
        &set,
        csrf,
        &format!("/messages/{}", message.id),
    )
}

// -- Error pages --

fn plain_page(title: &str, text: &str) -> String {
    layout(title, None, &[], "", &format!("<h1>{}</h1>", escape(text)))
}

pub fn not_found_page() -> String {
    plain_page("Not found", "Sorry, that page doesn't exist.")
}

pub fn forbidden_page() -> String {
    plain_page("Forbidden", "You can't do that.")
}

pub fn server_error_page() -> String {
    plain_page("Error", "Something went wrong on our end.")
}
