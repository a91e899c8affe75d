//! Region list parsing
//!
//! Two line formats are accepted, one region per line:
//! - Linux `/proc/<pid>/maps`: `START-END PERMS OFFSET DEV INODE [PATH]`
//! - Dump index: `0xSTART 0xEND SIZE FILE_OFFSET`
//!
//! Blank lines and `#` comments are skipped, as are lines that do not parse.

use ptrchain::MemoryRegion;

/// Special kernel mappings that report as readable but cannot be copied
const UNCOPYABLE: &[&str] = &["[vvar]", "[vvar_vclock]", "[vsyscall]"];

pub fn parse_maps(text: &str) -> Vec<MemoryRegion> {
    text.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<MemoryRegion> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts[0].starts_with("0x") {
        parse_dump_index_line(&parts)
    } else {
        parse_proc_line(&parts)
    }
}

fn parse_dump_index_line(parts: &[&str]) -> Option<MemoryRegion> {
    if parts.len() < 4 {
        return None;
    }

    Some(MemoryRegion {
        start: parse_hex(parts[0])?,
        end: parse_hex(parts[1])?,
        perms: "rw-p".to_string(),
        offset: parse_hex(parts[3])?,
        path: None,
    })
}

fn parse_proc_line(parts: &[&str]) -> Option<MemoryRegion> {
    let (start, end) = parts[0].split_once('-')?;

    Some(MemoryRegion {
        start: parse_hex(start)?,
        end: parse_hex(end)?,
        perms: parts.get(1).unwrap_or(&"").to_string(),
        offset: parts.get(2).and_then(|s| parse_hex(s)).unwrap_or(0),
        path: parts.get(5).map(|s| s.to_string()),
    })
}

fn parse_hex(s: &str) -> Option<u64> {
    u64::from_str_radix(s.trim_start_matches("0x"), 16).ok()
}

/// True for mappings a live capture can actually read
pub fn is_copyable(region: &MemoryRegion) -> bool {
    region.is_readable()
        && !region
            .path
            .as_deref()
            .is_some_and(|p| UNCOPYABLE.contains(&p))
}
