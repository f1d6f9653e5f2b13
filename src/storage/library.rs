//! Saved macros and app guides, one JSON file per entry.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

use super::store::BestEffortStore;

/// Directory holding macros.
pub const MACRO_DIR: &str = "macros";

/// Directory holding app guides.
pub const APP_CARD_DIR: &str = "app_cards";

/// A reusable command template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Macro {
    pub name: String,
    pub template: String,
}

/// Free-form instructions for driving a specific app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppGuide {
    pub app_name: String,
    pub title: String,
    pub content: String,
}

/// An entry that knows which text its file name is derived from.
pub trait LibraryEntry: Serialize + DeserializeOwned {
    /// Directory under the data root.
    const DIR: &'static str;

    /// Text the slug is built from.
    fn slug_source(&self) -> &str;
}

impl LibraryEntry for Macro {
    const DIR: &'static str = MACRO_DIR;

    fn slug_source(&self) -> &str {
        &self.name
    }
}

impl LibraryEntry for AppGuide {
    const DIR: &'static str = APP_CARD_DIR;

    fn slug_source(&self) -> &str {
        &self.title
    }
}

/// Turn a display name into a file-name stem.
///
/// Keeps alphanumerics and spaces, trims, joins words with `_` and
/// lowercases. `"My Macro! #1"` becomes `"my_macro_1"`. May return an empty
/// string when nothing usable remains.
pub fn slugify(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ')
        .collect();
    kept.trim().replace(' ', "_").to_lowercase()
}

/// Directory-backed collection of entries.
#[derive(Debug, Clone)]
pub struct Library<T> {
    store: BestEffortStore,
    _entry: PhantomData<fn() -> T>,
}

pub type MacroLibrary = Library<Macro>;
pub type GuideLibrary = Library<AppGuide>;

impl<T: LibraryEntry> Library<T> {
    pub fn new(store: BestEffortStore) -> Self {
        Self {
            store,
            _entry: PhantomData,
        }
    }

    /// All readable entries, ordered by file name.
    pub fn list(&self) -> Vec<T> {
        self.store.read_dir(T::DIR)
    }

    /// File name an entry would be stored under.
    pub fn file_name(entry: &T) -> String {
        format!("{}.json", slugify(entry.slug_source()))
    }

    /// Write an entry, replacing any entry with the same slug.
    /// Returns the file name, or `None` if the write failed.
    pub fn save(&self, entry: &T) -> Option<String> {
        let file_name = Self::file_name(entry);
        let relative = format!("{}/{}", T::DIR, file_name);
        self.store.write(&relative, entry).then_some(file_name)
    }
}
