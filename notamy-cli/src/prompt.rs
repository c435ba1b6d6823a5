//! Interactive prompts: tag disambiguation and password entry.

use dialoguer::{Confirm, Input, Password};
use notamy_core::Candidate;

/// One line per candidate: hash, tag and a link marker.
pub fn format_candidates(candidates: &[Candidate]) -> String {
    candidates
        .iter()
        .map(|c| {
            let link = if c.has_link { "  #link" } else { "" };
            format!("  {}  {}{link}\n", c.hash, c.tag)
        })
        .collect()
}

/// Lists the notes sharing `key` and asks which hash to use.
///
/// Returns `None` when the user declines to pick one.
pub fn choose_hash(
    key: &str,
    candidates: &[Candidate],
) -> Result<Option<String>, dialoguer::Error> {
    eprintln!("Several notes match '{key}':");
    eprint!("{}", format_candidates(candidates));

    let proceed = Confirm::new()
        .with_prompt("Select one by hash?")
        .default(true)
        .interact()?;
    if !proceed {
        return Ok(None);
    }

    let hash: String = Input::new()
        .with_prompt("Hash")
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("a hash prefix is required")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    Ok(Some(hash.trim().to_string()))
}

/// Reads the protection password; `first_use` asks for it twice.
pub fn read_password(first_use: bool) -> Result<String, dialoguer::Error> {
    let mut prompt = Password::new();
    if first_use {
        prompt = prompt
            .with_prompt("New protection password")
            .with_confirmation("Repeat password", "Passwords do not match");
    } else {
        prompt = prompt.with_prompt("Password");
    }
    prompt.interact()
}
