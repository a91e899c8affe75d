//! Dump File Memory Source
//!
//! Offline searches over a saved address space. Two layouts are supported:
//! - Windows minidumps (MDMP), using the Memory64List stream
//! - Raw dumps with a companion maps file. Dump-index lines carry explicit
//!   file offsets; /proc-style lines are assumed to be the readable regions
//!   concatenated in listed order.

use super::maps::parse_maps;
use ptrchain::{MemoryRegion, MemorySource};

use anyhow::{bail, Context, Result};
use byteorder::{ByteOrder, LE};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};

pub struct DumpFile {
    mmap: Mmap,
    regions: Vec<MemoryRegion>,
    pub path: PathBuf,
}

impl DumpFile {
    /// MDMP signature "MDMP" in little-endian
    const MDMP_SIGNATURE: u32 = 0x504D444D;

    const MDMP_HEADER_SIZE: usize = 32;

    const MEMORY_64_LIST_STREAM: u32 = 9;

    /// Open a dump, detecting minidumps by signature.
    ///
    /// Raw dumps need a `<dump>.maps` file next to them.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mmap = map_file(&path)?;

        if mmap.len() >= 4 && LE::read_u32(&mmap[0..4]) == Self::MDMP_SIGNATURE {
            tracing::debug!("Detected Windows Minidump (MDMP) format");
            let regions = Self::parse_mdmp(&mmap)?;
            return Ok(DumpFile {
                mmap,
                regions,
                path,
            });
        }

        let maps_path = path.with_extension("maps");
        if !maps_path.exists() {
            bail!(
                "{} is not a minidump and has no region list at {}",
                path.display(),
                maps_path.display()
            );
        }

        Self::with_maps(mmap, path, &maps_path)
    }

    /// Open a raw dump with an explicit maps file
    pub fn open_with_maps<P: AsRef<Path>>(dump_path: P, maps_path: P) -> Result<Self> {
        let dump_path = dump_path.as_ref().to_path_buf();
        let mmap = map_file(&dump_path)?;
        Self::with_maps(mmap, dump_path, maps_path.as_ref())
    }

    fn with_maps(mmap: Mmap, path: PathBuf, maps_path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(maps_path)
            .with_context(|| format!("Failed to read maps file: {}", maps_path.display()))?;

        let regions = assign_concatenated_offsets(&text, parse_maps(&text));
        tracing::info!(
            "Opened dump {} ({} MB) with {} regions",
            path.display(),
            mmap.len() / 1_000_000,
            regions.len()
        );

        Ok(DumpFile {
            mmap,
            regions,
            path,
        })
    }

    /// Read the Memory64List stream of a minidump
    fn parse_mdmp(mmap: &[u8]) -> Result<Vec<MemoryRegion>> {
        if mmap.len() < Self::MDMP_HEADER_SIZE {
            bail!("MDMP file too small for header");
        }

        let num_streams = LE::read_u32(&mmap[0x08..0x0C]) as usize;
        let stream_dir_rva = LE::read_u32(&mmap[0x0C..0x10]) as usize;

        for i in 0..num_streams {
            let entry = stream_dir_rva + i * 12;
            if entry + 12 > mmap.len() {
                break;
            }

            let stream_type = LE::read_u32(&mmap[entry..entry + 4]);
            if stream_type != Self::MEMORY_64_LIST_STREAM {
                continue;
            }

            let rva = LE::read_u32(&mmap[entry + 8..entry + 12]) as usize;
            if rva + 16 > mmap.len() {
                bail!("Memory64ListStream header out of bounds");
            }

            let num_ranges = LE::read_u64(&mmap[rva..rva + 8]);
            let mut file_offset = LE::read_u64(&mmap[rva + 8..rva + 16]);

            let descriptors_end = num_ranges
                .checked_mul(16)
                .and_then(|len| len.checked_add(rva as u64 + 16))
                .filter(|&end| end <= mmap.len() as u64);
            if descriptors_end.is_none() {
                bail!(
                    "Memory64List claims {} ranges, more than the file holds",
                    num_ranges
                );
            }

            let mut regions = Vec::with_capacity(num_ranges as usize);
            for j in 0..num_ranges as usize {
                let desc = rva + 16 + j * 16;
                let start = LE::read_u64(&mmap[desc..desc + 8]);
                let size = LE::read_u64(&mmap[desc + 8..desc + 16]);

                let Some(end) = start.checked_add(size) else {
                    bail!("Memory64List range {} at {:#x} overflows", j, start);
                };
                regions.push(MemoryRegion {
                    start,
                    end,
                    perms: "rw-p".to_string(),
                    offset: file_offset,
                    path: None,
                });

                file_offset = file_offset.checked_add(size).with_context(|| {
                    format!("Memory64List data offset overflows at range {}", j)
                })?;
            }

            tracing::info!("Parsed {} memory ranges from MDMP", regions.len());
            return Ok(regions);
        }

        bail!("No Memory64ListStream found in MDMP - dump may be incomplete")
    }
}

impl MemorySource for DumpFile {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let region = self
            .find_region(address)
            .ok_or_else(|| anyhow::anyhow!("Address {:#x} out of dump range", address))?;

        let range = region
            .offset
            .checked_add(address - region.start)
            .and_then(|offset| usize::try_from(offset).ok())
            .and_then(|offset| Some(offset..offset.checked_add(size)?))
            .filter(|range| range.end <= self.mmap.len());

        match range {
            Some(range) => Ok(self.mmap[range].to_vec()),
            None => bail!("Read of {} bytes at {:#x} exceeds dump size", size, address),
        }
    }

    fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }
}

fn map_file(path: &Path) -> Result<Mmap> {
    let file =
        File::open(path).with_context(|| format!("Failed to open dump file: {}", path.display()))?;

    // SAFETY: the dump is opened read-only and is not expected to change while mapped.
    unsafe { Mmap::map(&file) }
        .with_context(|| format!("Failed to mmap dump file: {}", path.display()))
}

/// Give /proc-style regions file offsets by concatenating readable ones.
///
/// Dump-index files already carry offsets and are returned unchanged.
fn assign_concatenated_offsets(text: &str, mut regions: Vec<MemoryRegion>) -> Vec<MemoryRegion> {
    let is_dump_index = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .is_some_and(|l| l.starts_with("0x"));
    if is_dump_index {
        return regions;
    }

    let mut file_offset = 0;
    for region in &mut regions {
        if region.is_readable() {
            region.offset = file_offset;
            file_offset += region.size();
        }
    }
    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        path
    }

    /// Minimal minidump holding two 8-byte ranges at 0x1000 and 0x2000
    fn minidump() -> Vec<u8> {
        let mut buf = vec![0u8; 32];
        LE::write_u32(&mut buf[0..4], DumpFile::MDMP_SIGNATURE);
        LE::write_u32(&mut buf[0x08..0x0C], 1);
        LE::write_u32(&mut buf[0x0C..0x10], 32);

        // stream directory entry: type, size, rva
        let list_rva = 44u32;
        for v in [DumpFile::MEMORY_64_LIST_STREAM, 48, list_rva] {
            buf.extend_from_slice(&v.to_le_bytes());
        }

        // Memory64List: count, base rva, descriptors
        let data_rva = (list_rva + 16 + 32) as u64;
        for v in [2u64, data_rva, 0x1000, 8, 0x2000, 8] {
            buf.extend_from_slice(&v.to_le_bytes());
        }

        buf.extend_from_slice(&0x2000u64.to_le_bytes());
        buf.extend_from_slice(&0xdeadu64.to_le_bytes());
        buf
    }

    #[test]
    fn test_open_minidump() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(dir.path(), "target.dmp", &minidump());

        let dump = DumpFile::open(&path).unwrap();
        assert_eq!(dump.regions().len(), 2);
        assert_eq!(dump.regions()[1].start, 0x2000);
        assert_eq!(dump.read_bytes(0x1000, 8).unwrap(), 0x2000u64.to_le_bytes());
        assert_eq!(dump.read_bytes(0x2000, 8).unwrap(), 0xdeadu64.to_le_bytes());
        assert!(dump.read_bytes(0x3000, 8).is_err());
    }

    #[test]
    fn test_minidump_without_memory_list_fails() {
        let mut buf = minidump();
        LE::write_u32(&mut buf[32..36], 4);

        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(dir.path(), "broken.dmp", &buf);
        assert!(DumpFile::open(&path).is_err());
    }

    #[test]
    fn test_minidump_with_corrupt_range_count_fails() {
        let mut buf = minidump();
        LE::write_u64(&mut buf[44..52], u64::MAX / 2);

        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(dir.path(), "huge.dmp", &buf);
        assert!(DumpFile::open(&path).is_err());
    }

    #[test]
    fn test_minidump_with_overflowing_range_fails() {
        let mut buf = minidump();
        // second descriptor: start 0x2000, size near u64::MAX
        LE::write_u64(&mut buf[84..92], u64::MAX - 0x100);

        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(dir.path(), "overflow.dmp", &buf);
        assert!(DumpFile::open(&path).is_err());
    }

    #[test]
    fn test_raw_dump_requires_maps() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(dir.path(), "raw.bin", &[0u8; 16]);
        assert!(DumpFile::open(&path).is_err());
    }

    #[test]
    fn test_raw_dump_with_dump_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = vec![0u8; 16];
        data[8..16].copy_from_slice(&0x1000u64.to_le_bytes());
        let path = write_temp(dir.path(), "raw.bin", &data);
        write_temp(dir.path(), "raw.maps", b"0x5000 0x5008 8 0x8\n");

        let dump = DumpFile::open(&path).unwrap();
        assert_eq!(dump.read_bytes(0x5000, 8).unwrap(), 0x1000u64.to_le_bytes());
    }

    #[test]
    fn test_raw_dump_with_proc_maps_is_concatenated() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = Vec::new();
        data.extend_from_slice(&1u64.to_le_bytes());
        data.extend_from_slice(&2u64.to_le_bytes());
        let dump_path = write_temp(dir.path(), "proc.bin", &data);
        let maps_path = write_temp(
            dir.path(),
            "proc.txt",
            b"1000-1008 r--p 00000000 00:00 0\n\
              2000-3000 ---p 00000000 00:00 0\n\
              4000-4008 rw-p 00000000 00:00 0\n",
        );

        let dump = DumpFile::open_with_maps(&dump_path, &maps_path).unwrap();
        assert_eq!(dump.read_bytes(0x1000, 8).unwrap(), 1u64.to_le_bytes());
        assert_eq!(dump.read_bytes(0x4000, 8).unwrap(), 2u64.to_le_bytes());
        assert_eq!(dump.readable_regions().len(), 2);
    }
}
