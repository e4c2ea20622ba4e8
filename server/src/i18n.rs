//! Message catalog.
//!
//! One JSON file per language in the locales directory, named by language
//! (`en.json`, `pt.json`). Entries are either plain strings or objects with
//! an `other` form:
//!
//! ```json
//! { "welcome_message": "Welcome to Coup Game!",
//!   "player_joined": { "other": "{{.Name}} joined the table" } }
//! ```
//!
//! `{{.Key}}` placeholders are filled from template data. Lookups in an
//! unknown language, or for an id missing from it, fall back to the default
//! language.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocalizeError {
    #[error("locales path cannot be empty")]
    EmptyPath,
    #[error("invalid locales path {0}: directory traversal not allowed")]
    Traversal(PathBuf),
    #[error("failed to read locales directory {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to load translation file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no translation files found in directory: {0}")]
    NoTranslations(PathBuf),
    #[error("default language {0} has no translation file")]
    MissingDefault(String),
    #[error("language cannot be empty")]
    EmptyLanguage,
    #[error("messageID cannot be empty")]
    EmptyMessageId,
    #[error("message {id} not found for language {lang}")]
    UnknownMessage { lang: String, id: String },
}

/// Renders user-facing text. Constructed once and shared.
pub trait Localizer: Send + Sync {
    fn message(&self, lang: &str, id: &str) -> Result<String, LocalizeError>;

    fn message_with(
        &self,
        lang: &str,
        id: &str,
        data: &HashMap<String, String>,
    ) -> Result<String, LocalizeError>;

    fn default_language(&self) -> &str;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Entry {
    Plain(String),
    Forms { other: String },
}

impl Entry {
    fn into_text(self) -> String {
        match self {
            Entry::Plain(text) | Entry::Forms { other: text } => text,
        }
    }
}

pub struct Catalog {
    languages: HashMap<String, HashMap<String, String>>,
    default_language: String,
}

impl Catalog {
    pub fn load(dir: impl AsRef<Path>, default_language: &str) -> Result<Self, LocalizeError> {
        let dir = dir.as_ref();
        if dir.as_os_str().is_empty() {
            return Err(LocalizeError::EmptyPath);
        }
        if dir.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(LocalizeError::Traversal(dir.to_path_buf()));
        }

        let entries = std::fs::read_dir(dir).map_err(|source| LocalizeError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut languages = HashMap::new();
        for entry in entries {
            let entry = entry.map_err(|source| LocalizeError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_dir() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(lang) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let raw = std::fs::read_to_string(&path).map_err(|source| LocalizeError::Io {
                path: path.clone(),
                source,
            })?;
            let parsed: HashMap<String, Entry> =
                serde_json::from_str(&raw).map_err(|source| LocalizeError::Parse {
                    path: path.clone(),
                    source,
                })?;
            let messages = parsed
                .into_iter()
                .map(|(id, entry)| (id, entry.into_text()))
                .collect::<HashMap<_, _>>();
            tracing::info!(path = %path.display(), messages = messages.len(), "loaded translation file");
            languages.insert(lang.to_ascii_lowercase(), messages);
        }

        if languages.is_empty() {
            return Err(LocalizeError::NoTranslations(dir.to_path_buf()));
        }
        let default_language = default_language.to_ascii_lowercase();
        if !languages.contains_key(&default_language) {
            return Err(LocalizeError::MissingDefault(default_language));
        }
        Ok(Self {
            languages,
            default_language,
        })
    }

    pub fn languages(&self) -> Vec<&str> {
        let mut langs: Vec<&str> = self.languages.keys().map(String::as_str).collect();
        langs.sort_unstable();
        langs
    }

    fn lookup(&self, lang: &str, id: &str) -> Result<&str, LocalizeError> {
        if lang.is_empty() {
            return Err(LocalizeError::EmptyLanguage);
        }
        if id.is_empty() {
            return Err(LocalizeError::EmptyMessageId);
        }
        let lang = lang.to_ascii_lowercase();
        // "pt-BR" falls back to "pt" before the default language.
        let base = lang.split(['-', '_']).next().unwrap_or_default();
        let found = [lang.as_str(), base, self.default_language.as_str()]
            .into_iter()
            .filter_map(|candidate| self.languages.get(candidate))
            .find_map(|messages| messages.get(id))
            .map(String::as_str);
        found.ok_or_else(|| LocalizeError::UnknownMessage {
            lang: lang.clone(),
            id: id.to_string(),
        })
    }
}

impl Localizer for Catalog {
    fn message(&self, lang: &str, id: &str) -> Result<String, LocalizeError> {
        self.lookup(lang, id).map(str::to_string)
    }

    fn message_with(
        &self,
        lang: &str,
        id: &str,
        data: &HashMap<String, String>,
    ) -> Result<String, LocalizeError> {
        let template = self.lookup(lang, id)?;
        Ok(render(template, data))
    }

    fn default_language(&self) -> &str {
        &self.default_language
    }
}

/// Replaces `{{.Key}}` (whitespace inside the braces allowed). Unknown keys
/// are left untouched.
fn render(template: &str, data: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start..].find("}}") else {
            break;
        };
        let inner = rest[start + 2..start + len].trim();
        out.push_str(&rest[..start]);
        match inner.strip_prefix('.').and_then(|key| data.get(key)) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[start..start + len + 2]),
        }
        rest = &rest[start + len + 2..];
    }
    out.push_str(rest);
    out
}
