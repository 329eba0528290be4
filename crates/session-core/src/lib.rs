//! Session Core: the Event Log & Session Store plus the Viewer Token
//! Service (spec.md §4.1, §4.2). Every other crate depends on this one for
//! session lifecycle and viewer authentication; it depends on nothing but
//! `call-domain`.

pub mod store;
pub mod token;

pub use store::SessionStore;
pub use token::ViewerTokenService;
