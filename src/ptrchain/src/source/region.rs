//! Memory Region Types
//!
//! Region descriptors as reported by /proc/pid/maps or a dump's range list.

/// A mapped memory region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    pub start: u64,
    pub end: u64,
    pub perms: String,
    /// File offset (maps) or data offset inside a dump
    pub offset: u64,
    pub path: Option<String>,
}

impl MemoryRegion {
    /// Anonymous read-write region, the common case for tests and dumps
    pub fn anonymous(start: u64, end: u64) -> Self {
        Self {
            start,
            end,
            perms: "rw-p".to_string(),
            offset: 0,
            path: None,
        }
    }

    pub fn size(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn contains(&self, address: u64) -> bool {
        address >= self.start && address < self.end
    }

    pub fn is_readable(&self) -> bool {
        self.perms.starts_with('r')
    }

    pub fn is_writable(&self) -> bool {
        self.perms.chars().nth(1) == Some('w')
    }

    pub fn is_executable(&self) -> bool {
        self.perms.chars().nth(2) == Some('x')
    }
}
