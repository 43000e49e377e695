//! Network layer.
//!
//! Plain TCP listeners are bound in `main`; `tls.rs` loads certificates when
//! `listener.tls` is configured and the server runs on `axum-server` instead.

pub mod tls;
