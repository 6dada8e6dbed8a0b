//! mbot - An IRC bot that grows through hot-swappable native modules
//!
//! The `mbot` binary wires these layers into a running bot. Module crates build
//! as `cdylib`s against this library and export themselves with
//! [`declare_module!`]; everything a module needs is re-exported from
//! [`plugins`].

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod plugins;
#[cfg(test)]
mod test_support;
