//! # Text Module
//!
//! Everything a player reads goes through here. A text key (see [`CustomTextKey`])
//! maps to either a weighted list of templates or a handler function; channel
//! configuration overrides plugin defaults, which override the built-in table.
//!
//! - [`keys`] - the built-in key-space
//! - [`defaults`] - built-in English templates
//! - [`template`] - the mustache-subset expander
//! - [`resolver`] - weighted pick and fallback chain

pub mod defaults;
pub mod keys;
pub mod resolver;
pub mod template;

pub use keys::CustomTextKey;
pub use resolver::{
    pick_index, pick_weighted, CustomTextConfig, CustomTextEntry, CustomTextItem, TextHandler, TextResolver,
};
pub use template::Template;
