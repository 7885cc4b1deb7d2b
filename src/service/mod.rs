//! CrudService: the request-level dispatcher.

mod crud;
pub use crud::{CrudService, ListParams};
