mod health;
mod url;
mod user;

pub use health::ping_handler;
pub use url::{batch_shorten_handler, redirect_handler, shorten_json_handler, shorten_text_handler};
pub use user::{delete_user_urls_handler, user_urls_handler};
