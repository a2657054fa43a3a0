// Entity Models
//
// Categories are the only entity the engine reads: it needs to know which
// category ids a user may be assigned and how a typed name resolves.

pub mod category;

pub use category::{Category, CategoryKind, CategoryRegistry};
