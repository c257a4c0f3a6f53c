pub mod filter;
pub mod reconcile;

pub use filter::{Filtered, filter_notes};
pub use reconcile::{
    DeletePolicy, PushReport, RefreshReport, WriteQueue, pull, push, refresh, sync,
};
