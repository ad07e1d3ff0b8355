// src/script/mod.rs

//! Script host bridge
//!
//! Loads a Lua build script into an embedded interpreter and exposes the
//! two host capabilities scripts may use: `exec(command)` runs a command
//! through the script's declared `shell` interpreter, and
//! `download(url, path)` fetches a URL to a file. Both return
//! `(ok, error_message)` tuples instead of raising, so scripts can branch
//! on failure.
//!
//! The interpreter state is owned by [`ScriptHost`] for the lifetime of
//! one pipeline run. The manifest extractor reads globals only through
//! the typed accessors here; Lua values never leak past this module.

use crate::error::{Error, Result};
use mlua::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// The loaded build script and its interpreter state
pub struct ScriptHost {
    lua: Lua,
}

impl ScriptHost {
    /// Parse and execute the top level of the script at `path`
    ///
    /// Host functions are registered before execution so the script can
    /// call them from its top level as well as from `build()`.
    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path).map_err(|e| {
            Error::Script(format!("cannot read script '{}': {}", path.display(), e))
        })?;
        Self::from_source(&source, &format!("@{}", path.display()))
    }

    fn from_source(source: &str, chunk_name: &str) -> Result<Self> {
        let lua = Lua::new();
        register_host_functions(&lua)?;

        lua.load(source)
            .set_name(chunk_name)
            .exec()
            .map_err(|e| Error::Script(e.to_string()))?;

        debug!("Loaded build script {}", chunk_name);
        Ok(Self { lua })
    }

    /// Call a named global function defined by the script
    ///
    /// This is how the build routine itself runs, inside the sandbox.
    pub fn invoke(&self, name: &str) -> Result<()> {
        let func = match self.lua.globals().get::<LuaValue>(name) {
            Ok(LuaValue::Function(f)) => f,
            _ => {
                return Err(Error::Script(format!(
                    "global function '{}' is not defined",
                    name
                )));
            }
        };

        func.call::<()>(())
            .map_err(|e| Error::Script(format!("{}() failed: {}", name, e)))
    }

    /// Read a required string global
    pub fn global_string(&self, name: &str) -> Result<String> {
        match self.lua.globals().get::<LuaValue>(name) {
            Ok(LuaValue::String(s)) => Ok(s.to_string_lossy().to_string()),
            _ => Err(Error::MissingField(name.to_string())),
        }
    }

    /// Read a required list-shaped table of strings, preserving order
    pub fn global_string_list(&self, name: &str) -> Result<Vec<String>> {
        let table = self.global_table(name)?;
        let mut out = Vec::new();
        for value in table.sequence_values::<LuaValue>() {
            match value {
                Ok(LuaValue::String(s)) => out.push(s.to_string_lossy().to_string()),
                _ => return Err(Error::MissingField(name.to_string())),
            }
        }
        Ok(out)
    }

    /// Read a required string-to-string mapping
    pub fn global_string_map(&self, name: &str) -> Result<BTreeMap<String, String>> {
        let table = self.global_table(name)?;
        string_map_from(&table, name)
    }

    /// Read a required string-to-string mapping nested one level inside a
    /// required table global
    ///
    /// Used for `dependencies.required` and `dependencies.optional`:
    /// missing either the outer table or the sub-table is fatal.
    pub fn nested_string_map(
        &self,
        global: &str,
        key: &str,
    ) -> Result<BTreeMap<String, String>> {
        let outer = self.global_table(global)?;
        let field = format!("{}.{}", global, key);
        match outer.get::<LuaValue>(key) {
            Ok(LuaValue::Table(inner)) => string_map_from(&inner, &field),
            _ => Err(Error::MissingField(field)),
        }
    }

    /// Read an optional string nested inside an optional table global
    ///
    /// Returns `None` when the table or the field is absent or not a
    /// string; never an error. Used for the four hook fields.
    pub fn optional_nested_string(&self, global: &str, key: &str) -> Option<String> {
        let outer = match self.lua.globals().get::<LuaValue>(global) {
            Ok(LuaValue::Table(t)) => t,
            _ => return None,
        };
        match outer.get::<LuaValue>(key) {
            Ok(LuaValue::String(s)) => Some(s.to_string_lossy().to_string()),
            _ => None,
        }
    }

    fn global_table(&self, name: &str) -> Result<LuaTable> {
        match self.lua.globals().get::<LuaValue>(name) {
            Ok(LuaValue::Table(t)) => Ok(t),
            _ => Err(Error::MissingField(name.to_string())),
        }
    }
}

fn string_map_from(table: &LuaTable, field: &str) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for pair in table.pairs::<LuaValue, LuaValue>() {
        let (key, value) = pair.map_err(|_| Error::MissingField(field.to_string()))?;
        match (key, value) {
            (LuaValue::String(k), LuaValue::String(v)) => {
                out.insert(
                    k.to_string_lossy().to_string(),
                    v.to_string_lossy().to_string(),
                );
            }
            _ => return Err(Error::MissingField(field.to_string())),
        }
    }
    Ok(out)
}

/// Register `exec` and `download` as script globals
fn register_host_functions(lua: &Lua) -> LuaResult<()> {
    let exec = lua.create_function(|lua, command: String| {
        let shell = match lua.globals().get::<LuaValue>("shell") {
            Ok(LuaValue::String(s)) => s.to_string_lossy().to_string(),
            _ => {
                return Err(LuaError::external(
                    "the 'shell' global must be set to an interpreter path before exec() is used",
                ));
            }
        };
        if shell.is_empty() {
            return Err(LuaError::external("the 'shell' global must not be empty"));
        }

        // Standard streams are inherited so build output is visible
        match Command::new(&shell).arg("-c").arg(&command).status() {
            Ok(status) if status.success() => Ok((true, None::<String>)),
            Ok(status) => Ok((
                false,
                Some(format!("command exited with {}", status)),
            )),
            Err(e) => Ok((false, Some(format!("failed to run {}: {}", shell, e)))),
        }
    })?;
    lua.globals().set("exec", exec)?;

    let download = lua.create_function(|_, (url, dest): (String, String)| {
        match fetch_to_file(&url, Path::new(&dest)) {
            Ok(()) => Ok((true, None::<String>)),
            Err(e) => Ok((false, Some(e.to_string()))),
        }
    })?;
    lua.globals().set("download", download)?;

    Ok(())
}

/// Fetch a URL to a file, overwriting the destination
///
/// The body is written to a temporary file next to the destination and
/// renamed into place, so a failed transfer never leaves a half-written
/// file behind as if it were complete.
fn fetch_to_file(url: &str, dest: &Path) -> Result<()> {
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| Error::Download(e.to_string()))?;

    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut staged = tempfile::NamedTempFile::new_in(parent)?;
    response
        .copy_to(staged.as_file_mut())
        .map_err(|e| Error::Download(e.to_string()))?;
    staged.persist(dest).map_err(|e| Error::Io(e.error))?;

    Ok(())
}
