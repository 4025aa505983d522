//! Tool registry (spec §4.3, component C4): the small set of functions the
//! LLM can invoke mid-turn to mutate inventory, each guarded by a JSON
//! schema so a malformed tool call is rejected before it touches game state.
//!
//! Grounded on the teacher's `use_cases::tools` handler-per-name dispatch
//! table, generalized from the teacher's fixed rule-lookup tools to this
//! spec's inventory verbs.

use serde_json::json;
use thiserror::Error;

use storyforge_domain::Inventory;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("unknown tool {0:?}")]
    UnknownTool(String),
    #[error("missing or invalid argument {arg:?} for tool {tool:?}")]
    InvalidArgument { tool: String, arg: String },
    #[error("item {0:?} not found in inventory")]
    ItemNotFound(String),
}

pub const ADD_INVENTORY_ITEM: &str = "add_inventory_item";
pub const REMOVE_INVENTORY_ITEM: &str = "remove_inventory_item";
pub const LIST_INVENTORY: &str = "list_inventory";

/// The fixed set of tools offered to the LLM every turn (spec §4.3).
pub struct ToolRegistry;

impl ToolRegistry {
    pub fn definitions() -> Vec<crate::ports::ToolDefinition> {
        vec![
            crate::ports::ToolDefinition {
                name: ADD_INVENTORY_ITEM.to_string(),
                description: "Add an item to the player's inventory.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "item": { "type": "string", "description": "Name of the item to add." }
                    },
                    "required": ["item"]
                }),
            },
            crate::ports::ToolDefinition {
                name: REMOVE_INVENTORY_ITEM.to_string(),
                description: "Remove one instance of an item from the player's inventory.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "item": { "type": "string", "description": "Name of the item to remove." }
                    },
                    "required": ["item"]
                }),
            },
            crate::ports::ToolDefinition {
                name: LIST_INVENTORY.to_string(),
                description: "List every item currently in the player's inventory.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {}
                }),
            },
        ]
    }

    /// Execute a tool call against `inventory`, returning the JSON result
    /// that gets fed back to the LLM as a `Tool` message.
    pub fn dispatch(
        name: &str,
        arguments: &serde_json::Value,
        inventory: &mut Inventory,
    ) -> Result<serde_json::Value, ToolError> {
        match name {
            ADD_INVENTORY_ITEM => {
                let item = require_str_arg(arguments, name, "item")?;
                inventory.push(item.clone());
                Ok(json!({ "added": item, "inventory": inventory }))
            }
            REMOVE_INVENTORY_ITEM => {
                let item = require_str_arg(arguments, name, "item")?;
                let pos = inventory
                    .iter()
                    .position(|existing| existing == &item)
                    .ok_or_else(|| ToolError::ItemNotFound(item.clone()))?;
                inventory.remove(pos);
                Ok(json!({ "removed": item, "inventory": inventory }))
            }
            LIST_INVENTORY => Ok(json!({ "inventory": inventory })),
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}

fn require_str_arg(
    arguments: &serde_json::Value,
    tool: &str,
    arg: &str,
) -> Result<String, ToolError> {
    arguments
        .get(arg)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ToolError::InvalidArgument {
            tool: tool.to_string(),
            arg: arg.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_remove_round_trips() {
        let mut inventory: Inventory = vec![];
        ToolRegistry::dispatch(ADD_INVENTORY_ITEM, &json!({"item": "torch"}), &mut inventory).unwrap();
        assert_eq!(inventory, vec!["torch".to_string()]);
        ToolRegistry::dispatch(REMOVE_INVENTORY_ITEM, &json!({"item": "torch"}), &mut inventory).unwrap();
        assert!(inventory.is_empty());
    }

    #[test]
    fn remove_missing_item_is_an_error() {
        let mut inventory: Inventory = vec![];
        let err = ToolRegistry::dispatch(REMOVE_INVENTORY_ITEM, &json!({"item": "key"}), &mut inventory)
            .unwrap_err();
        assert_eq!(err, ToolError::ItemNotFound("key".to_string()));
    }

    #[test]
    fn missing_argument_is_rejected() {
        let mut inventory: Inventory = vec![];
        let err = ToolRegistry::dispatch(ADD_INVENTORY_ITEM, &json!({}), &mut inventory).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgument { .. }));
    }

    #[test]
    fn unknown_tool_is_rejected() {
        let mut inventory: Inventory = vec![];
        let err = ToolRegistry::dispatch("explode", &json!({}), &mut inventory).unwrap_err();
        assert_eq!(err, ToolError::UnknownTool("explode".to_string()));
    }

    #[test]
    fn list_inventory_does_not_mutate() {
        let mut inventory: Inventory = vec!["torch".to_string()];
        let result = ToolRegistry::dispatch(LIST_INVENTORY, &json!({}), &mut inventory).unwrap();
        assert_eq!(result["inventory"], json!(["torch"]));
        assert_eq!(inventory, vec!["torch".to_string()]);
    }
}
