//! Application-supplied collaborators: auth, HTTP transport, logging, task
//! dispatch, and virtual content I/O.

pub mod auth;
pub mod dispatch;
pub mod http;
pub mod logging;
pub mod stream;
