pub mod config;
pub mod label_tree;
pub mod note;
pub mod notebook;
pub mod record;

pub use config::*;
pub use label_tree::*;
pub use note::*;
pub use notebook::*;
pub use record::*;
