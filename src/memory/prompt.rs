//! System prompts assembled from memory documents
//!
//! Rebuilt from disk on every call so edits made during a run show up on the
//! very next turn.

use super::{MemoryCategory, MemoryError, MemoryStore};
use chrono::Local;

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Prompt for the autonomous loop: timestamp, identity, user, knowledge, projects
pub fn build_system_prompt(store: &MemoryStore) -> Result<String, MemoryError> {
    let identity = store.read(MemoryCategory::Identity)?;
    let user = store.read(MemoryCategory::User)?;
    let knowledge = store.read(MemoryCategory::Knowledge)?;
    let projects = store.read(MemoryCategory::Projects)?;

    Ok(format!(
        "Current time: {now}

{identity}

---

## About the user
{user}

---

## Your knowledge
{knowledge}

---

## Your projects
{projects}

---

## Memory system

You can remember what you learn and anything important with the memory tools:
- `read_memory`: read memory (identity/user/knowledge/journal/projects)
- `update_memory`: update memory (user/knowledge/journal/projects)
  - identity is read-only (your core persona)
  - journal is best used append-only
  - use projects to manage your own goals

Think for yourself, decide for yourself, act for yourself.
",
        now = timestamp(),
    ))
}

/// Prompt for conversation mode: timestamp, identity, knowledge, addressee
pub fn build_conversation_prompt(
    store: &MemoryStore,
    other_name: &str,
) -> Result<String, MemoryError> {
    let identity = store.read(MemoryCategory::Identity)?;
    let knowledge = store.read(MemoryCategory::Knowledge)?;

    Ok(format!(
        "Current time: {now}

{identity}

---

## Your knowledge
{knowledge}

---

## Conversation mode

You are now talking with \"{other_name}\".
- Reply naturally and in character to what they say
- Do not talk too long in one go; keep the conversation going back and forth
- You can record what you notice or learn in memory
- You can use the workspace if you want to leave something in a file
- When you feel the conversation is finished, call `end_conversation`; it ends once both of you have called it in a row

## Memory system

- `read_memory`: read memory (identity/user/knowledge/journal/projects)
- `update_memory`: update memory (user/knowledge/journal/projects)
  - identity is read-only
  - record what you learned in the conversation in knowledge or journal
",
        now = timestamp(),
    ))
}
