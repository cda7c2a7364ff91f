//! Server-side HTML rendering.
//!
//! Pages are assembled from a shared layout and small body builders. Anything
//! that came from a visitor or the database goes through [`escape`].

use axum::response::Html;
use std::fmt::Write;

use super::notices::Notice;
use crate::db::{NewsItem, User};

pub const SITE_NAME: &str = "VAR Community";

/// Escapes text for element content.
#[must_use]
pub fn escape(text: &str) -> std::borrow::Cow<'_, str> {
    html_escape::encode_text(text)
}

/// Escapes text for a double-quoted attribute value.
#[must_use]
pub fn escape_attr(text: &str) -> std::borrow::Cow<'_, str> {
    html_escape::encode_double_quoted_attribute(text)
}

pub struct Layout<'a> {
    pub title: &'a str,
    pub user: Option<&'a User>,
    pub notices: &'a [Notice],
}

impl Layout<'_> {
    #[must_use]
    pub fn render(&self, body: &str) -> Html<String> {
        let mut html = String::with_capacity(body.len() + 2048);

        let _ = write!(
            html,
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n\
             <meta charset=\"utf-8\">\n\
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
             <title>{} | {SITE_NAME}</title>\n\
             <link rel=\"stylesheet\" href=\"/static/style.css\">\n\
             </head>\n<body>\n",
            escape(self.title)
        );

        html.push_str(&self.nav());

        html.push_str("<main>\n");
        for notice in self.notices {
            let _ = writeln!(
                html,
                "<div class=\"{}\" role=\"status\">{}</div>",
                notice.level.css_class(),
                escape(&notice.message)
            );
        }
        html.push_str(body);
        html.push_str("\n</main>\n");

        let _ = write!(
            html,
            "<footer><p>&copy; {SITE_NAME}</p></footer>\n</body>\n</html>\n"
        );

        Html(html)
    }

    fn nav(&self) -> String {
        let mut nav = String::from("<header><nav>\n");
        let _ = writeln!(nav, "<a class=\"brand\" href=\"/\">{SITE_NAME}</a>");

        for (href, label) in [
            ("/charter", "Charter"),
            ("/rules", "Rules"),
            ("/hierarchy", "Hierarchy"),
            ("/creators", "Creators"),
            ("/news", "News"),
        ] {
            let _ = writeln!(nav, "<a href=\"{href}\">{label}</a>");
        }

        match self.user {
            Some(user) => {
                if user.is_admin {
                    nav.push_str("<a href=\"/admin\">Admin</a>\n");
                }
                let _ = writeln!(
                    nav,
                    "<span class=\"whoami\">{}</span> <a href=\"/logout\">Log out</a>",
                    escape(&user.username)
                );
            }
            None => {
                nav.push_str("<a href=\"/login\">Log in</a>\n");
                nav.push_str("<a href=\"/register\">Register</a>\n");
            }
        }

        nav.push_str("</nav></header>\n");
        nav
    }
}

/// A list of news items, or a placeholder when there are none.
#[must_use]
pub fn news_list(items: &[NewsItem]) -> String {
    if items.is_empty() {
        return "<p class=\"empty\">No news yet.</p>\n".to_string();
    }

    let mut html = String::from("<section class=\"news-list\">\n");
    for item in items {
        let _ = write!(
            html,
            "<article class=\"news-item\" id=\"news-{}\">\n\
             <h2>{}</h2>\n\
             <p class=\"meta\"><time datetime=\"{}\">{}</time>",
            item.id,
            escape(&item.title),
            item.created_at.to_rfc3339(),
            item.created_at.format("%Y-%m-%d %H:%M UTC"),
        );
        if let Some(author) = &item.author {
            let _ = write!(html, " &middot; {}", escape(author));
        }
        let _ = write!(
            html,
            "</p>\n<div class=\"news-text\">{}</div>\n</article>\n",
            escape(&item.text)
        );
    }
    html.push_str("</section>\n");
    html
}

/// Username/password form shared by the login and registration pages.
#[must_use]
pub fn credentials_form(action: &str, heading: &str, submit: &str, username: &str) -> String {
    format!(
        "<h1>{heading}</h1>\n\
         <form method=\"post\" action=\"{action}\" class=\"auth-form\">\n\
         <label>Username <input type=\"text\" name=\"username\" value=\"{}\" maxlength=\"64\" required autofocus></label>\n\
         <label>Password <input type=\"password\" name=\"password\" required></label>\n\
         <button type=\"submit\">{submit}</button>\n\
         </form>\n",
        escape_attr(username)
    )
}

#[must_use]
pub fn publish_form() -> String {
    "<h1>Publish news</h1>\n\
     <form method=\"post\" action=\"/admin\" class=\"publish-form\">\n\
     <label>Title <input type=\"text\" name=\"title\" maxlength=\"200\" required></label>\n\
     <label>Text <textarea name=\"text\" rows=\"8\" required></textarea></label>\n\
     <button type=\"submit\">Publish</button>\n\
     </form>\n"
        .to_string()
}

/// Minimal page for errors, rendered without session data.
#[must_use]
pub fn error_page(title: &str, message: &str) -> Html<String> {
    Layout {
        title,
        user: None,
        notices: &[],
    }
    .render(&format!(
        "<h1>{}</h1>\n<p>{}</p>\n<p><a href=\"/\">Back to the home page</a></p>\n",
        escape(title),
        escape(message)
    ))
}
