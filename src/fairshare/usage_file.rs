use super::tree::FairshareTree;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;

const MAGIC: &[u8; 8] = b"PBS_MAG!";
const VERSION_1: u8 = 1;
const VERSION_2: u8 = 2;
const CURRENT_VERSION: u8 = VERSION_2;

/// Writes `tree`'s persisted usage to `path`. Each line is `name usage`,
/// one fairshare node per line, written to a sibling `.bak` file and
/// atomically renamed over the target so writes are atomic.
pub fn write_usage(path: impl AsRef<Path>, tree: &FairshareTree) -> Result<()> {
    let path = path.as_ref();
    let tmp_path = path.with_extension("bak");

    let mut buf = Vec::new();
    buf.extend_from_slice(MAGIC);
    buf.push(CURRENT_VERSION);
    buf.push(b'\n');
    for node in tree.nodes.values() {
        buf.extend_from_slice(format!("{} {}\n", node.name, node.usage).as_bytes());
    }

    let mut file = fs::File::create(&tmp_path).map_err(|e| Error::io(tmp_path.display().to_string(), e))?;
    file.write_all(&buf).map_err(|e| Error::io(tmp_path.display().to_string(), e))?;
    file.sync_all().map_err(|e| Error::io(tmp_path.display().to_string(), e))?;
    fs::rename(&tmp_path, path).map_err(|e| Error::io(path.display().to_string(), e))?;
    Ok(())
}

/// Reads a previously written usage file and applies each record's usage
/// onto the matching node of `tree` (entities absent from the file keep
/// their freshly-initialized usage of 1), per `read_usage`.
pub fn read_usage(path: impl AsRef<Path>, tree: &mut FairshareTree) -> Result<()> {
    let path = path.as_ref();
    let contents = fs::read(path).map_err(|e| Error::io(path.display().to_string(), e))?;

    if contents.len() < 9 || &contents[0..8] != MAGIC {
        return Err(Error::UsageFileMagic { path: path.display().to_string() });
    }
    let version = contents[8];
    let body = String::from_utf8_lossy(&contents[10.min(contents.len())..]);

    let records = match version {
        VERSION_1 => read_usage_v1(&body)?,
        VERSION_2 => read_usage_v2(&body)?,
        other => return Err(Error::UsageFileVersion { path: path.display().to_string(), version: other }),
    };

    for (name, usage) in records {
        if let Some(id) = tree.find(&name) {
            tree.nodes[id].usage = usage;
            tree.nodes[id].temp_usage = usage;
        }
    }
    Ok(())
}

/// Version 1 records: `name usage`, identical to the current on-disk line
/// format. Kept as its own entry point so a version bump in the wire
/// format doesn't require rewriting the parser for old files.
fn read_usage_v1(body: &str) -> Result<HashMap<String, u64>> {
    parse_name_usage_lines(body)
}

/// Version 2 adds no field currently used by this scheduler core beyond
/// v1's `name usage` pairs; the dispatch exists so a future field can be
/// added without breaking files written by older versions.
fn read_usage_v2(body: &str) -> Result<HashMap<String, u64>> {
    parse_name_usage_lines(body)
}

fn parse_name_usage_lines(body: &str) -> Result<HashMap<String, u64>> {
    let mut records = HashMap::new();
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let name = parts.next().unwrap_or_default().to_string();
        let usage: u64 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(1);
        records.insert(name, usage);
    }
    Ok(records)
}
