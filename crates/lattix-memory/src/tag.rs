//! Device tags, block identities and lock modes.

use std::fmt;

/// A memory domain that can hold a copy of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MemoryTag {
    /// Host main memory. Always registered.
    Cpu,
    /// Accelerator with its own addressable local store.
    LocalStore,
    /// GPU buffers managed through wgpu.
    Wgpu,
}

impl MemoryTag {
    /// Every tag, in index order.
    pub const ALL: [MemoryTag; 3] = [MemoryTag::Cpu, MemoryTag::LocalStore, MemoryTag::Wgpu];

    /// Number of distinct tags.
    pub const COUNT: usize = Self::ALL.len();

    /// Dense index used for per-device tables.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Short lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            MemoryTag::Cpu => "cpu",
            MemoryTag::LocalStore => "local-store",
            MemoryTag::Wgpu => "wgpu",
        }
    }

    /// Parse a tag from its name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "cpu" | "host" => Some(MemoryTag::Cpu),
            "local-store" | "localstore" => Some(MemoryTag::LocalStore),
            "wgpu" | "gpu" => Some(MemoryTag::Wgpu),
            _ => None,
        }
    }
}

impl fmt::Display for MemoryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity of a registered memory block.
///
/// Issued by [`MemoryArbiter::add_memblock`](crate::MemoryArbiter::add_memblock)
/// from a per-arbiter counter and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemId(pub(crate) u64);

impl MemId {
    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a lock intends to use the memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Shared access; stale copies are refreshed first.
    ReadOnly,
    /// Exclusive access without refreshing stale contents.
    WriteOnly,
    /// Exclusive access with valid contents.
    ReadWrite,
}

impl LockMode {
    /// Whether this mode takes the exclusive write lock.
    #[inline]
    pub fn is_write(self) -> bool {
        !matches!(self, LockMode::ReadOnly)
    }
}
