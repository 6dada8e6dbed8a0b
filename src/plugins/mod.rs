//! Module contract for mbot
//!
//! Modules are shared libraries exporting `mbot_module_init`, which hands the
//! host a boxed [`Module`]. Use [`declare_module!`](crate::declare_module) to
//! generate the export.

pub mod trait_def;

pub use trait_def::{Capability, Module, ModuleInitFn, MODULE_INIT_SYMBOL};

// Types that appear in the module trait
pub use crate::application::errors::BotError;
pub use crate::domain::entities::{is_channel_name, Message, User};
pub use crate::domain::traits::Client;
