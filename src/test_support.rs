//! Shared fakes for unit tests

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::application::errors::{BotError, ModuleError};
use crate::domain::entities::Message;
use crate::domain::traits::Client;
use crate::infrastructure::plugins::{LoadedModule, ModuleLoader};
use crate::plugins::{Capability, Module};

/// Client that records every line instead of sending it
pub struct RecordingClient {
    nick: Mutex<String>,
    sent: Mutex<Vec<String>>,
}

impl RecordingClient {
    pub fn new(nick: &str) -> Self {
        Self {
            nick: Mutex::new(nick.to_string()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Lines sent so far, clearing the buffer
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

impl Client for RecordingClient {
    fn current_nick(&self) -> String {
        self.nick.lock().unwrap().clone()
    }

    fn set_nick(&self, nick: &str) {
        *self.nick.lock().unwrap() = nick.to_string();
    }

    fn send_raw(&self, line: &str) -> Result<(), BotError> {
        self.sent.lock().unwrap().push(line.to_string());
        Ok(())
    }
}

/// Module whose hooks append to a shared event log
#[derive(Clone)]
pub struct ScriptedModule {
    name: String,
    version: String,
    capabilities: Vec<Capability>,
    commands: Vec<String>,
    fail_load: bool,
    fail_unload: bool,
    log: Arc<Mutex<Vec<String>>>,
}

impl ScriptedModule {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            capabilities: Vec::new(),
            commands: Vec::new(),
            fail_load: false,
            fail_unload: false,
            log: Arc::default(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: &[Capability]) -> Self {
        self.capabilities.extend_from_slice(capabilities);
        self
    }

    pub fn with_commands(mut self, commands: &[&str]) -> Self {
        self.capabilities.push(Capability::Commands);
        self.with_commands_undeclared(commands)
    }

    /// Lists commands without declaring the capability
    pub fn with_commands_undeclared(mut self, commands: &[&str]) -> Self {
        self.commands = commands.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn failing_load(mut self) -> Self {
        self.fail_load = true;
        self
    }

    pub fn failing_unload(mut self) -> Self {
        self.fail_unload = true;
        self
    }

    fn record(&self, event: String) {
        self.log.lock().unwrap().push(event);
    }
}

impl Module for ScriptedModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn on_load(&self) -> Result<(), String> {
        if self.fail_load {
            return Err("refusing to start".to_string());
        }
        self.record(format!("load {} {}", self.name, self.version));
        Ok(())
    }

    fn on_unload(&self) -> Result<(), String> {
        self.record(format!("unload {} {}", self.name, self.version));
        if self.fail_unload {
            return Err("unclean shutdown".to_string());
        }
        Ok(())
    }

    fn on_message(&self, _client: &dyn Client, msg: &Message) {
        self.record(format!("message {} {}", self.name, msg.command));
    }

    fn capabilities(&self) -> Vec<Capability> {
        self.capabilities.clone()
    }

    fn commands(&self) -> Vec<String> {
        self.commands.clone()
    }

    fn handle_command(&self, _client: &dyn Client, _msg: &Message, command: &str, args: &[String]) {
        if args.is_empty() {
            self.record(format!("command {} {}", self.name, command));
        } else {
            self.record(format!("command {} {} {}", self.name, command, args.join(" ")));
        }
    }

    fn on_chat_line(&self, _client: &dyn Client, _msg: &Message) {
        self.record(format!("chat-line {}", self.name));
    }

    fn on_direct_mention(&self, _client: &dyn Client, _msg: &Message) {
        self.record(format!("direct-mention {}", self.name));
    }

    fn on_join(&self, _client: &dyn Client, _msg: &Message) {
        self.record(format!("join {}", self.name));
    }

    fn on_part(&self, _client: &dyn Client, _msg: &Message) {
        self.record(format!("part {}", self.name));
    }

    fn on_quit(&self, _client: &dyn Client, _msg: &Message) {
        self.record(format!("quit {}", self.name));
    }

    fn on_kick(&self, _client: &dyn Client, _msg: &Message) {
        self.record(format!("kick {}", self.name));
    }

    fn on_topic_change(&self, _client: &dyn Client, _msg: &Message) {
        self.record(format!("topic-change {}", self.name));
    }

    fn on_nick_change(&self, _client: &dyn Client, _msg: &Message) {
        self.record(format!("nick-change {}", self.name));
    }

    fn on_invite(&self, _client: &dyn Client, _msg: &Message) {
        self.record(format!("invite {}", self.name));
    }

    fn on_notice(&self, _client: &dyn Client, _msg: &Message) {
        self.record(format!("notice {}", self.name));
    }

    fn on_mode_change(&self, _client: &dyn Client, _msg: &Message) {
        self.record(format!("mode-change {}", self.name));
    }

    fn on_error(&self, _client: &dyn Client, _msg: &Message) {
        self.record(format!("error {}", self.name));
    }
}

/// Loader that builds modules from templates keyed by file name
#[derive(Default)]
pub struct ScriptedLoader {
    templates: Mutex<HashMap<String, ScriptedModule>>,
    log: Arc<Mutex<Vec<String>>>,
}

impl ScriptedLoader {
    pub fn add(&self, file_name: &str, module: ScriptedModule) {
        let module = ScriptedModule {
            log: self.log.clone(),
            ..module
        };
        self.templates.lock().unwrap().insert(file_name.to_string(), module);
    }

    /// Hook calls made by every module built by this loader, in order
    pub fn events(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn clear_events(&self) {
        self.log.lock().unwrap().clear();
    }
}

impl ModuleLoader for ScriptedLoader {
    fn open(&self, path: &Path) -> Result<LoadedModule, ModuleError> {
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let template = self.templates.lock().unwrap().get(file_name).cloned();
        match template {
            Some(module) => Ok(LoadedModule::new(Box::new(module), path, None)),
            None => Err(ModuleError::Open {
                path: path.display().to_string(),
                reason: "file not found".to_string(),
            }),
        }
    }
}
