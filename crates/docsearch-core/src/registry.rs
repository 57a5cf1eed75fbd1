//! Library registry: canonical ids, documentation roots, and alias spellings.
//!
//! Declaration order is part of the contract: `ids()` and the fuzzy fallback in
//! [`crate::resolve`] both observe it.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<LibraryEntry>,
    aliases: BTreeMap<String, String>,
}

const BUILTIN_LIBRARIES: &[(&str, &str)] = &[
    ("langchain", "https://js.langchain.com/docs"),
    ("langgraph", "https://langchain-ai.github.io/langgraphjs"),
    ("nextjs", "https://nextjs.org/docs"),
    ("tailwind", "https://tailwindcss.com/docs"),
    ("mcp", "https://docs.fastmcp.com"),
    ("framer", "https://motion.dev/docs/"),
];

const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("framermotion", "framer"),
    ("framer-motion", "framer"),
    ("motion", "framer"),
    ("tailwindcss", "tailwind"),
    ("next.js", "nextjs"),
    ("next", "nextjs"),
    ("langchainjs", "langchain"),
    ("langgraphjs", "langgraph"),
];

/// On-disk registry shape.
///
/// `libraries` accepts either an object (`{"id": "url"}`, in file order) or a list of
/// `{"id", "url"}` entries.
#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    libraries: LibrariesField,
    #[serde(default)]
    aliases: BTreeMap<String, String>,
    /// Drop the builtin tables instead of extending them.
    #[serde(default)]
    replace: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LibrariesField {
    List(Vec<LibraryEntry>),
    Map(serde_json::Map<String, serde_json::Value>),
}

impl Default for LibrariesField {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl Registry {
    pub fn new<I, A>(entries: I, aliases: A) -> Self
    where
        I: IntoIterator<Item = LibraryEntry>,
        A: IntoIterator<Item = (String, String)>,
    {
        let mut r = Self::default();
        for e in entries {
            r.insert(e.id, e.url);
        }
        for (alias, target) in aliases {
            r.insert_alias(alias, target);
        }
        r
    }

    pub fn builtin() -> Self {
        Self::new(
            BUILTIN_LIBRARIES.iter().map(|(id, url)| LibraryEntry {
                id: id.to_string(),
                url: url.to_string(),
            }),
            BUILTIN_ALIASES
                .iter()
                .map(|(a, t)| (a.to_string(), t.to_string())),
        )
    }

    /// Load a registry file and merge it over the builtin tables (or replace them).
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let file: RegistryFile =
            serde_json::from_str(raw).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        let mut r = if file.replace {
            Self::default()
        } else {
            Self::builtin()
        };
        match file.libraries {
            LibrariesField::List(list) => {
                for e in list {
                    r.insert(e.id, e.url);
                }
            }
            LibrariesField::Map(map) => {
                for (id, v) in map {
                    let Some(url) = v.as_str() else {
                        return Err(Error::InvalidConfig(format!(
                            "library {id}: url must be a string"
                        )));
                    };
                    r.insert(id, url.to_string());
                }
            }
        }
        for (alias, target) in file.aliases {
            r.insert_alias(alias, target);
        }
        r.validate()?;
        Ok(r)
    }

    /// Insert or override an entry. Ids are stored lower-cased and trimmed; an
    /// existing id keeps its declaration position.
    pub fn insert(&mut self, id: String, url: String) {
        let id = id.trim().to_lowercase();
        let url = url.trim().to_string();
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(e) => e.url = url,
            None => self.entries.push(LibraryEntry { id, url }),
        }
    }

    pub fn insert_alias(&mut self, alias: String, target: String) {
        self.aliases
            .insert(alias.trim().to_lowercase(), target.trim().to_lowercase());
    }

    pub fn lookup(&self, id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.url.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lookup(id).is_some()
    }

    pub fn alias_target(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(|s| s.as_str())
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.id.as_str())
    }

    pub fn entries(&self) -> &[LibraryEntry] {
        &self.entries
    }

    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check the alias invariant and reject empty ids/urls.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        for e in &self.entries {
            if e.id.is_empty() {
                problems.push("empty library id".to_string());
            }
            if e.url.is_empty() {
                problems.push(format!("library {}: empty url", e.id));
            }
        }
        for (alias, target) in &self.aliases {
            if !self.contains(target) {
                problems.push(format!("alias {alias} -> unknown library {target}"));
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidConfig(problems.join("; ")))
        }
    }
}
