//! Small JSON artifacts kept next to the server: notes, history, macros and
//! app guides.

mod history;
mod library;
mod notes;
mod store;

pub use history::{CommandHistory, HISTORY_FILE, HISTORY_LIMIT};
pub use library::{
    slugify, AppGuide, GuideLibrary, Library, LibraryEntry, Macro, MacroLibrary, APP_CARD_DIR,
    MACRO_DIR,
};
pub use notes::{NoteStore, MEMORY_FILE};
pub use store::BestEffortStore;
