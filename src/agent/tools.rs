//! Memory tools exposed to the agent.
//!
//! The descriptions are read by the agent's own reasoning process and are
//! passed through untouched.

use serde::Serialize;
use serde_json::Value;

use crate::storage::NoteStore;

const SAVE_NOTE_DESCRIPTION: &str = r#"Save information to persistent memory for later retrieval.

WHEN TO USE:
- Comparing multiple products/prices (save each one as you find it)
- Tracking search results across different screens
- Storing data that will be needed for final decision/comparison
- Recording details before moving to next step

USAGE EXAMPLES:
- save_note(key="jeans_product1", value="Roadster Baggy Jeans ₹1299 40% off")
- save_note(key="jeans_product2", value="Levi's Baggy ₹2499 20% off")
- save_note(key="best_price_found", value="₹899")

IMPORTANT: Use descriptive keys like "product1_price", "item_name", "best_deal" "#;

const READ_NOTES_DESCRIPTION: &str = r#"Retrieve ALL saved information from memory to view or compare.

WHEN TO USE:
- Before making final comparison between saved items
- When you need to recall previously saved prices/details
- At end of search to review all collected data
- To check what information was already saved

RETURNS: JSON object containing all key-value pairs from memory

EXAMPLE: After saving 3 products, call read_notes() to see all prices together for comparison"#;

/// Tool declaration sent to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub arguments: Vec<&'static str>,
    pub description: &'static str,
}

/// `save_note` / `read_notes`, backed by the session's [`NoteStore`].
#[derive(Debug, Clone)]
pub struct MemoryTools {
    notes: NoteStore,
}

impl MemoryTools {
    pub fn new(notes: NoteStore) -> Self {
        Self { notes }
    }

    /// Declarations for every tool.
    pub fn specs() -> Vec<ToolSpec> {
        vec![
            ToolSpec {
                name: "save_note",
                arguments: vec!["key", "value"],
                description: SAVE_NOTE_DESCRIPTION,
            },
            ToolSpec {
                name: "read_notes",
                arguments: vec![],
                description: READ_NOTES_DESCRIPTION,
            },
        ]
    }

    /// Invoke a tool by name. Always produces text for the agent, including
    /// for unknown tools and bad arguments.
    pub fn call(&self, name: &str, args: &Value) -> String {
        match name {
            "save_note" => {
                let (Some(key), Some(value)) = (arg_text(args, "key"), arg_text(args, "value"))
                else {
                    return "✗ Error saving: save_note requires 'key' and 'value'".to_string();
                };
                self.notes.save_note(&key, &value)
            }
            "read_notes" => self.notes.read_notes(),
            other => format!("✗ Unknown tool: {}", other),
        }
    }
}

/// String argument; numbers and booleans are accepted in their text form.
fn arg_text(args: &Value, key: &str) -> Option<String> {
    match args.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
