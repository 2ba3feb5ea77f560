//! Study item command implementations.

use crate::cli::ItemCommands;
use crate::error::{Error, Result};
use crate::host::HostStore;
use crate::model::{LearningState, StudyItem};
use crate::storage::NewItem;
use crate::sync::reconcile::fresh_id;
use colored::Colorize;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;

use super::open_storage;

/// Prefix for generated item ids.
const GENERATED_ID_PREFIX: &str = "card";

/// Output for item list.
#[derive(Serialize)]
struct ItemListOutput {
    items: Vec<StudyItem>,
    count: usize,
}

/// Execute item commands.
pub fn execute(command: &ItemCommands, db_path: Option<&PathBuf>, actor: Option<&str>, json: bool) -> Result<()> {
    match command {
        ItemCommands::Add {
            question,
            answer,
            id,
            category,
        } => add(question, answer, id.as_deref(), category, db_path, actor, json),
        ItemCommands::List { category, limit } => list(category.as_deref(), *limit, db_path, json),
        ItemCommands::Show { id } => show(id, db_path, json),
    }
}

fn add(
    question: &str,
    answer: &str,
    id: Option<&str>,
    category: &str,
    db_path: Option<&PathBuf>,
    actor: Option<&str>,
    json: bool,
) -> Result<()> {
    let mut storage = open_storage(db_path, actor)?;

    let id = match id {
        Some(id) if id.trim().is_empty() => {
            return Err(Error::InvalidArgument("item id must not be empty".to_string()));
        }
        Some(id) if storage.id_exists(id)? => return Err(Error::DuplicateId { id: id.to_string() }),
        Some(id) => id.to_string(),
        None => {
            let taken: HashSet<String> = storage.items()?.into_iter().map(|i| i.id).collect();
            fresh_id(GENERATED_ID_PREFIX, &taken)
        }
    };

    let item = storage.create_item(&NewItem {
        id: &id,
        category,
        question,
        answer,
        state: LearningState::default(),
    })?;

    if json {
        println!("{}", serde_json::to_string(&item)?);
    } else {
        println!("Added item: {} [{}]", item.id.bold(), item.category);
    }

    Ok(())
}

fn list(category: Option<&str>, limit: Option<u32>, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let storage = open_storage(db_path, None)?;
    let items = storage.list_items(category, limit)?;

    if json {
        let output = ItemListOutput {
            count: items.len(),
            items,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("No study items.");
        return Ok(());
    }

    println!("Study items ({}):", items.len());
    for item in &items {
        let grade = if item.state.unseen {
            "new".dimmed().to_string()
        } else {
            format!("g{}", item.state.grade)
        };
        println!("  {} [{}] {}  {}", item.id.bold(), item.category, grade, truncate(&item.question, 50));
    }

    Ok(())
}

fn show(id: &str, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let storage = open_storage(db_path, None)?;
    let item = storage
        .get_item(id)?
        .ok_or_else(|| Error::ItemNotFound { id: id.to_string() })?;

    if json {
        println!("{}", serde_json::to_string(&item)?);
        return Ok(());
    }

    let s = &item.state;
    println!("{} [{}]", item.id.bold(), item.category);
    println!("  Q: {}", item.question);
    println!("  A: {}", item.answer);
    println!();
    if s.unseen {
        println!("  {}", "Not yet studied".dimmed());
    } else {
        println!("  Grade:    {}", s.grade);
        println!("  Easiness: {:.3}", s.easiness);
        println!("  Reps:     {} acquisition, {} retention, {} lapses", s.acq_reps, s.ret_reps, s.lapses);
        println!("  Last rep: {}", format_time(s.last_rep));
        println!("  Next rep: {}", format_time(s.next_rep));
    }

    Ok(())
}

fn format_time(epoch: i64) -> String {
    chrono::DateTime::from_timestamp(epoch, 0)
        .map_or_else(|| epoch.to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ααααααααααα", 6), "ααα...");
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0), "1970-01-01 00:00");
    }
}
