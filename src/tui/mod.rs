mod handler;
mod ui;

pub use handler::{handle_key_event, AppAction, KeyContext, Screen};
pub use ui::draw;
