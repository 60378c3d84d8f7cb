use crate::resource::ResourceList;

/// One `+`-separated term of a `select` spec, e.g. `2:ncpus=4:mem=8gb`
/// becomes `Chunk { num_chunks: 2, resources: {ncpus: 4, mem: 8gb} }`.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub num_chunks: u32,
    pub resources: ResourceList,
}

/// The `place=` spec's node-arrangement mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Arrangement {
    #[default]
    Free,
    Pack,
    Scatter,
    VScatter,
}

/// The `place=` spec's node-sharing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sharing {
    #[default]
    Share,
    Excl,
    ExclHost,
}

/// Parsed `place=<comma-list>` spec.
#[derive(Debug, Clone, Default)]
pub struct PlaceSpec {
    pub arrangement: Arrangement,
    pub sharing: Sharing,
    /// `group=R`: the grouping resource name used to select a placement set.
    pub group: Option<String>,
}

impl PlaceSpec {
    pub fn is_excl(&self) -> bool {
        matches!(self.sharing, Sharing::Excl | Sharing::ExclHost)
    }
}
