//! Command handlers and the per-invocation session.
//!
//! A session resolves the element from config and flags, opens its table
//! store, and restores a manager into a fresh cache before any command
//! runs.

pub mod bootstrap;
pub mod config_cmd;
pub mod flows;
pub mod observe;
pub mod replay;
pub mod triggers;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use flowsync_config::{Config, ConfigError, ElementProfile};
use flowsync_core::{
    ChannelReplySink, Dispatcher, FlowEngineeringManager, ManagerCache, ProvisioningReply,
};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::store::JsonTableStore;

// ── Session ──────────────────────────────────────────────────────────

pub struct Session {
    element: String,
    tables: PathBuf,
    dispatcher: Dispatcher,
    replies: UnboundedReceiver<ProvisioningReply>,
}

impl Session {
    pub fn open(global: &GlobalOpts) -> Result<Self, CliError> {
        let cfg = load_config(global)?;
        let element = active_element(global, &cfg)?;

        // An explicit table file stands in for a missing profile.
        let profile = match cfg.element(&element) {
            Ok(profile) => profile,
            Err(ConfigError::UnknownElement { .. }) if global.tables.is_some() => {
                ElementProfile::default()
            }
            Err(e) => return Err(e.into()),
        };
        let options = flowsync_config::profile_to_manager_options(&profile, &cfg.defaults)?;
        let tables = global
            .tables
            .clone()
            .unwrap_or_else(|| flowsync_config::table_path(&profile, &element));

        let store = Arc::new(JsonTableStore::open(&tables)?);
        let cache = Arc::new(ManagerCache::new());
        cache.reset(&element, store, options);
        cache
            .with(&element, FlowEngineeringManager::load_tables)
            .ok_or_else(|| CliError::Internal(format!("manager for '{element}' missing")))??;
        debug!(element = %element, tables = %tables.display(), "session opened");

        let (sink, replies) = ChannelReplySink::new();
        Ok(Self {
            element,
            tables,
            dispatcher: Dispatcher::new(cache, Arc::new(sink)),
            replies,
        })
    }

    pub fn element(&self) -> &str {
        &self.element
    }

    pub fn tables(&self) -> &Path {
        &self.tables
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Run `f` against the element's manager.
    pub fn with_manager<R>(
        &self,
        f: impl FnOnce(&mut FlowEngineeringManager) -> R,
    ) -> Result<R, CliError> {
        self.dispatcher
            .cache()
            .with(&self.element, f)
            .ok_or_else(|| CliError::UnknownElement {
                element: self.element.clone(),
            })
    }

    /// Take the manager out of the cache for async work.
    pub fn into_manager(self) -> Result<FlowEngineeringManager, CliError> {
        self.dispatcher
            .cache()
            .remove(&self.element)
            .ok_or(CliError::UnknownElement {
                element: self.element,
            })
    }

    /// Replies submitted so far, in submission order.
    pub fn drain_replies(&mut self) -> Vec<ProvisioningReply> {
        let mut out = Vec::new();
        while let Ok(reply) = self.replies.try_recv() {
            out.push(reply);
        }
        out
    }
}

fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let cfg = match &global.config_file {
        Some(path) => flowsync_config::load_config_from(path)?,
        None => flowsync_config::load_config()?,
    };
    Ok(cfg)
}

fn active_element(global: &GlobalOpts, cfg: &Config) -> Result<String, CliError> {
    global
        .element
        .clone()
        .or_else(|| cfg.default_element.clone())
        .ok_or_else(|| CliError::Validation {
            message: "no element selected; pass --element or set default_element".into(),
        })
}

// ── Dispatch ─────────────────────────────────────────────────────────

pub async fn dispatch(cmd: Command, session: Session, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Replay { file } => replay::handle(&file, session, global),
        Command::Flows { direction } => flows::handle_flows(direction.into(), &session, global),
        Command::Provisioned => flows::handle_provisioned(&session, global),
        Command::Interfaces => flows::handle_interfaces(&session, global),
        Command::Bootstrap => bootstrap::handle(session, global).await,
        Command::SetExpected {
            direction,
            key,
            value,
        } => triggers::set_expected(&session, direction.into(), &key, value, global),
        Command::DeleteFlow { direction, key } => {
            triggers::delete_flow(&session, direction.into(), &key, global)
        }
        Command::DeleteProvisioned { id } => triggers::delete_provisioned(&session, &id, global),
        Command::Observe { file } => observe::handle(&file, &session, global),
        Command::Config(args) => config_cmd::handle(&args, global),
    }
}

/// Read a command input file; `-` reads stdin.
pub(crate) fn read_input(path: &Path) -> Result<String, CliError> {
    if path.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).map_err(|e| CliError::io(path, e))
    } else {
        std::fs::read_to_string(path).map_err(|e| CliError::io(path, e))
    }
}
