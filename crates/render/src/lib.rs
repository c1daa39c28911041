//! Text measurement and layout for content drawn into redacted pages.
//!
//! Everything is measured against the standard Helvetica metrics, the only
//! font the writer embeds by reference.

pub mod encoding;
pub mod layout;
pub mod metrics;

pub use encoding::{decode_win_ansi, encode_win_ansi};
pub use layout::{fit_font_size, wrap_text, TextBlock};
pub use metrics::{char_width, text_width};
