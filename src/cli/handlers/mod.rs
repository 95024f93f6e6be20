use std::path::PathBuf;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::knowledge_base::KnowledgeBase;
use crate::model::entry::{EntityKind, Entry};
use crate::parse::serialize_entry;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let json = cli.json;
    let kb = open_kb(cli.project_dir.as_deref())?;

    match cli.command {
        // Read commands
        Commands::List(args) => cmd_list(&kb, args, json),
        Commands::Show(args) => cmd_show(&kb, args, json),
        Commands::Topics => print_names(kb.topics(), json),
        Commands::People => print_names(kb.people(), json),

        // Write commands
        Commands::Delete(args) => cmd_delete(&kb, args, json),
        Commands::Status(args) => cmd_status(&kb, args, json),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn open_kb(project_dir: Option<&str>) -> Result<KnowledgeBase, Box<dyn std::error::Error>> {
    let folder = match project_dir {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir()?,
    };
    Ok(KnowledgeBase::open(&folder)?)
}

fn find_entry(kb: &KnowledgeBase, timestamp: &str) -> Result<Entry, Box<dyn std::error::Error>> {
    kb.entry(timestamp)?
        .ok_or_else(|| format!("entry not found: {}", timestamp).into())
}

fn print_names(names: Vec<String>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(&names)?);
    } else {
        for name in &names {
            println!("{}", name);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_list(kb: &KnowledgeBase, args: ListArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let entity_filter = args
        .entity
        .as_deref()
        .map(|s| EntityKind::parse(s).ok_or_else(|| format!("unknown entity: {}", s)))
        .transpose()?;

    let entries = kb.entries()?;
    let matching: Vec<&Entry> = entries
        .iter()
        .filter(|e| {
            args.entry_type
                .as_deref()
                .is_none_or(|t| e.entry_type.eq_ignore_ascii_case(t))
        })
        .filter(|e| entity_filter.is_none_or(|k| e.entity() == Some(k)))
        .take(args.limit.unwrap_or(usize::MAX))
        .collect();

    if json {
        let items: Vec<EntryLineJson> = matching.iter().map(|e| entry_to_json(e)).collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for entry in &matching {
            println!("{}", format_entry_line(entry));
        }
    }
    Ok(())
}

fn cmd_show(kb: &KnowledgeBase, args: ShowArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let entry = find_entry(kb, &args.timestamp)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else if args.raw {
        print!("{}", serialize_entry(&entry));
    } else {
        for line in format_entry_detail(&entry) {
            println!("{}", line);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_delete(kb: &KnowledgeBase, args: DeleteArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = kb.delete(&args.timestamp)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&delete_to_json(&args.timestamp, &outcome))?);
    } else {
        for line in format_delete(&args.timestamp, &outcome) {
            println!("{}", line);
        }
    }
    if !outcome.deleted {
        return Err(format!("entry not found: {}", args.timestamp).into());
    }
    Ok(())
}

fn cmd_status(kb: &KnowledgeBase, args: StatusArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let updated = kb.set_status(&args.timestamp, &args.status)?;
    if !updated {
        return Err(format!("entry not found: {}", args.timestamp).into());
    }
    if json {
        let out = StatusJson {
            timestamp: args.timestamp,
            status: args.status.trim().to_string(),
            updated,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{} -> {}", args.timestamp, args.status.trim());
    }
    Ok(())
}
