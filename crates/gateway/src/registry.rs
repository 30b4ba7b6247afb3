use std::collections::HashMap;
use std::sync::RwLock;

use crate::message::{CLASS_PARAMETER_REQ, CLASS_PARAMETER_RSP};

/// Maps a class tag's short (last-segment) name to its canonical
/// fully-qualified form.
///
/// The codec itself never needs this table to decode — an unrecognized
/// `clazz` always inflates to the base [`crate::message::Message`] with the
/// tag preserved verbatim, per the wire contract. The registry exists so
/// application code can look up or register the canonical tag for a short
/// name, as the design notes call for ("a registry (tag → factory), and let
/// application code register its concrete message classes at startup").
pub struct Registry {
    by_short_name: RwLock<HashMap<&'static str, &'static str>>,
}

impl Registry {
    fn new() -> Self {
        let mut map = HashMap::new();
        for tag in [
            CLASS_PARAMETER_REQ,
            CLASS_PARAMETER_RSP,
            "org.arl.fjage.shell.ShellExecReq",
            "org.arl.fjage.shell.PutFileReq",
            "org.arl.fjage.shell.GetFileReq",
            "org.arl.fjage.shell.GetFileRsp",
        ] {
            let short = tag.rsplit('.').next().unwrap_or(tag);
            map.insert(short, tag);
        }
        Self {
            by_short_name: RwLock::new(map),
        }
    }

    /// Registers a further fully-qualified class tag, indexed by its last
    /// dot-segment.
    pub fn register(&self, full_tag: &'static str) {
        let short = full_tag.rsplit('.').next().unwrap_or(full_tag);
        self.by_short_name.write().unwrap().insert(short, full_tag);
    }

    /// Resolves a short or fully-qualified tag to the registered canonical
    /// fully-qualified tag, if known.
    pub fn resolve(&self, tag: &str) -> Option<&'static str> {
        let short = tag.rsplit('.').next().unwrap_or(tag);
        self.by_short_name.read().unwrap().get(short).copied()
    }

    pub fn is_known(&self, tag: &str) -> bool {
        self.resolve(tag).is_some()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
