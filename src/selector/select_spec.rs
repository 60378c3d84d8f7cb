use crate::entity::Chunk;
use crate::error::{Error, Result};
use crate::resource::{ResourceDefRegistry, ResourceEntry, ResourceList};

/// Parses a `select=<spec>` string into its ordered chunks.
/// Format: `+`-separated terms, each `N:name=value[:name=value...]`, e.g.
/// `2:ncpus=4:mem=8gb+1:ncpus=1`.
pub fn parse_select(spec: &str, registry: &mut ResourceDefRegistry) -> Result<Vec<Chunk>> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(Error::BadSelectSpec("empty select spec".into()));
    }

    spec.split('+').map(|term| parse_chunk(term, registry)).collect()
}

fn parse_chunk(term: &str, registry: &mut ResourceDefRegistry) -> Result<Chunk> {
    let mut fields = term.split(':');
    let count_field = fields.next().ok_or_else(|| Error::BadSelectSpec(term.to_string()))?;
    let num_chunks: u32 = count_field.parse().map_err(|_| Error::BadSelectSpec(format!("bad chunk count: {count_field}")))?;

    let mut resources = ResourceList::new();
    for field in fields {
        let (name, value) = field.split_once('=').ok_or_else(|| Error::BadSelectSpec(format!("expected name=value, got '{field}'")))?;
        let def = registry.get_or_register_generic(name);
        let parsed = crate::resource::ResourceValue::parse(name, def.kind, value)?;
        resources.insert(ResourceEntry::new(def, parsed));
    }

    Ok(Chunk { num_chunks, resources })
}
