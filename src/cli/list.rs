//! `octool list`: stored configurations as a table.

use anyhow::Result;
use colored::Colorize;

use crate::config::{ConfigStore, Paths};

/// Prints every configuration with its aliases and model. The default one is
/// marked with `*`.
pub(crate) fn config_list(paths: &Paths) -> Result<()> {
    let store = ConfigStore::open(paths.config_file())?;
    if store.is_empty() {
        println!("{}", "No configurations found.".dimmed());
        println!("Create one with: {}", "octool".cyan());
        return Ok(());
    }

    let configs = store.list();
    let id_width = configs.iter().map(|c| c.id.chars().count()).max().unwrap_or(2).max(2) + 2;
    let name_width = configs
        .iter()
        .map(|c| c.display_name(&c.language).unwrap_or("-").chars().count())
        .max()
        .unwrap_or(4)
        .clamp(4, 30)
        + 2;

    println!(
        "  {} {} {:<20} {}",
        format!("{:<id_width$}", "ID").bold(),
        format!("{:<name_width$}", "NAME").bold(),
        "ALIASES".bold(),
        "MODEL".bold(),
    );
    println!("{}", "-".repeat(2 + id_width + name_width + 20 + 20));

    for cfg in &configs {
        let marker = if store.default_id() == Some(cfg.id.as_str()) {
            "*".yellow().bold().to_string()
        } else {
            " ".to_string()
        };
        let name = cfg.display_name(&cfg.language).unwrap_or("-");
        let name = if name.chars().count() > name_width - 2 {
            let truncated: String = name.chars().take(name_width - 5).collect();
            format!("{truncated}...")
        } else {
            name.to_string()
        };

        // Pad first, then colorize to avoid ANSI escape code width issues
        let id_col = format!("{:<id_width$}", cfg.id);
        let name_col = format!("{:<name_width$}", name);
        let alias_col = format!("{:<20}", cfg.aliases.join(", "));
        println!(
            "{} {} {} {} {}",
            marker,
            id_col.cyan(),
            name_col,
            alias_col.yellow(),
            cfg.model.dimmed(),
        );
    }
    println!();
    println!(
        "{} configurations in {}",
        configs.len(),
        store.path().display().to_string().dimmed()
    );
    Ok(())
}
