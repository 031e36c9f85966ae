//! Session lifecycle and tenant isolation

mod authority;

pub use authority::SessionAuthority;
