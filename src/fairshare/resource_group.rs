use super::tree::FairshareTree;
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Parses a resource-group file (`name parent shares`, one entry per line,
/// `#`-comments and blank lines ignored) and loads it into a fresh
/// `FairshareTree`.
pub fn parse_group(path: impl AsRef<Path>) -> Result<FairshareTree> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| Error::io(path.display().to_string(), e))?;
    let mut tree = FairshareTree::new();

    // Entries may name a parent that hasn't been added yet, so make two
    // passes: first every name with shares under root, then reparent.
    let mut pending: Vec<(String, Option<String>, u32)> = Vec::new();
    for (lineno, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 2 {
            return Err(Error::ResourceGroupFile { line: lineno + 1, reason: format!("expected at least 2 fields, got {}", fields.len()) });
        }
        let name = fields[0].to_string();
        let (parent, shares_field) = if fields.len() >= 3 { (Some(fields[1].to_string()), fields[2]) } else { (None, fields[1]) };
        let shares: u32 = shares_field
            .parse()
            .map_err(|_| Error::ResourceGroupFile { line: lineno + 1, reason: format!("invalid shares value: {shares_field}") })?;
        pending.push((name, parent, shares));
    }

    for (name, parent, shares) in &pending {
        tree.add_child(name, parent.as_deref(), *shares);
    }

    tree.calc_fair_share_perc();
    Ok(tree)
}
