//! Module trait definitions

use crate::domain::entities::Message;
use crate::domain::traits::Client;

/// Exported symbol every module artifact must provide
pub const MODULE_INIT_SYMBOL: &[u8] = b"mbot_module_init";

/// Function signature for module initialization
#[allow(improper_ctypes_definitions)]
pub type ModuleInitFn = unsafe extern "C" fn() -> *mut dyn Module;

/// Optional handlers a module can opt into.
///
/// Declared once by the module and cached by the registry when it is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    Commands,
    ChatLine,
    DirectMention,
    Join,
    Part,
    Quit,
    Kick,
    TopicChange,
    NickChange,
    Invite,
    Notice,
    ModeChange,
    Error,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Commands => "commands",
            Capability::ChatLine => "chat-line",
            Capability::DirectMention => "direct-mention",
            Capability::Join => "join",
            Capability::Part => "part",
            Capability::Quit => "quit",
            Capability::Kick => "kick",
            Capability::TopicChange => "topic-change",
            Capability::NickChange => "nick-change",
            Capability::Invite => "invite",
            Capability::Notice => "notice",
            Capability::ModeChange => "mode-change",
            Capability::Error => "error",
        }
    }
}

/// Core module trait that all loadable modules must implement.
///
/// `name`, `version`, `on_load` and `on_message` form the minimal contract.
/// Every other handler is called only when the matching [`Capability`] is
/// declared, and defaults to doing nothing.
pub trait Module: Send + Sync {
    /// Logical name, unique across loaded modules
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Called once after the module is installed. An error aborts the load.
    fn on_load(&self) -> Result<(), String>;

    /// Called for every inbound event
    fn on_message(&self, client: &dyn Client, msg: &Message);

    /// Called before the module is removed. Errors are logged and ignored.
    fn on_unload(&self) -> Result<(), String> {
        Ok(())
    }

    fn capabilities(&self) -> Vec<Capability> {
        Vec::new()
    }

    /// Command names served when [`Capability::Commands`] is declared
    fn commands(&self) -> Vec<String> {
        Vec::new()
    }

    fn handle_command(&self, _client: &dyn Client, _msg: &Message, _command: &str, _args: &[String]) {}

    fn on_chat_line(&self, _client: &dyn Client, _msg: &Message) {}
    fn on_direct_mention(&self, _client: &dyn Client, _msg: &Message) {}
    fn on_join(&self, _client: &dyn Client, _msg: &Message) {}
    fn on_part(&self, _client: &dyn Client, _msg: &Message) {}
    fn on_quit(&self, _client: &dyn Client, _msg: &Message) {}
    fn on_kick(&self, _client: &dyn Client, _msg: &Message) {}
    fn on_topic_change(&self, _client: &dyn Client, _msg: &Message) {}
    fn on_nick_change(&self, _client: &dyn Client, _msg: &Message) {}
    fn on_invite(&self, _client: &dyn Client, _msg: &Message) {}
    fn on_notice(&self, _client: &dyn Client, _msg: &Message) {}
    fn on_mode_change(&self, _client: &dyn Client, _msg: &Message) {}
    fn on_error(&self, _client: &dyn Client, _msg: &Message) {}
}

/// Export a module type from a `cdylib`.
///
/// ```ignore
/// declare_module!(Greeter, Greeter::default);
/// ```
#[macro_export]
macro_rules! declare_module {
    ($module_type:ty, $constructor:path) => {
        #[no_mangle]
        #[allow(improper_ctypes_definitions)]
        pub extern "C" fn mbot_module_init() -> *mut dyn $crate::plugins::Module {
            let module: $module_type = $constructor();
            let boxed: Box<dyn $crate::plugins::Module> = Box::new(module);
            Box::into_raw(boxed)
        }
    };
}
