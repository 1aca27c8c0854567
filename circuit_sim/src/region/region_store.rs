//! `RegionStore`: the on-disk region file format (spec §4.4).
//!
//! A save directory holds one `board.txt` (board-wide metadata and the list
//! of populated regions) plus one `region/<rx>.<ry>.dat` file per occupied
//! region. Each region file opens with a `FreeSectorPool`-managed header of
//! `REGION_WIDTH^2` four-byte entries (24-bit sector offset, 8-bit sector
//! count), followed by sector-aligned, big-endian-length-prefixed chunk
//! payloads encoded by `chunk_codec`.
//!
//! Demand loading keeps a bounded LRU of chunks that were read opportunistically
//! but not yet claimed by the board — mirroring the teacher's `LoadedChunks`
//! pattern of pulling in more than was strictly asked for, on the bet that
//! nearby chunks are requested next.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::num::NonZeroUsize;
use std::path::PathBuf;

use lru::LruCache;
use vek::Vec2;

use tile_grid::chunk::Chunk;
use tile_grid::{ChunkCoord, RegionCoord, REGION_WIDTH};

use crate::board::Board;
use crate::error::{CircuitError, Result};

use super::chunk_codec;
use super::sector_pool::{FreeSectorPool, HEADER_ENTRIES, HEADER_SIZE, HEADER_SECTORS, MAX_SECTORS_PER_CHUNK, SECTOR_SIZE};

/// Default cap on chunks held in the opportunistic cache beyond what the
/// board currently has loaded (spec §4.4).
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// Side length, in chunks, of the block opportunistically loaded around a
/// demand-faulted chunk.
const PREFETCH_BLOCK: i32 = 4;

type RegionKey = (i32, i32);

fn rc_key(rc: RegionCoord) -> RegionKey {
    (rc.x, rc.y)
}

fn key_rc(k: RegionKey) -> RegionCoord {
    Vec2::new(k.0, k.1)
}

/// Board-wide metadata parsed out of `board.txt`.
struct BoardTxtMeta {
    max_size: Option<i32>,
    extra_logic_states: bool,
    notes_text: String,
    regions: Vec<RegionKey>,
}

/// A region header's 1024 entries, each `(sector offset, sector count)`.
type Header = Vec<(u32, u8)>;

pub struct RegionStore {
    root: PathBuf,
    /// Regions known (from `board.txt`) to have at least one chunk on disk,
    /// whether or not any of their chunks are currently loaded into a board.
    known_regions: HashSet<RegionKey>,
    /// Chunks read opportunistically during a demand load but not yet
    /// claimed by the board that asked for them.
    cache: LruCache<ChunkCoord, Chunk>,
}

impl RegionStore {
    /// Open a save directory. Does not fail if nothing exists there yet —
    /// that's simply an empty board waiting to be saved for the first time.
    pub fn open(root: impl Into<PathBuf>) -> RegionStore {
        let mut store = RegionStore {
            root: root.into(),
            known_regions: HashSet::new(),
            cache: LruCache::new(NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap()),
        };
        if let Ok(meta) = store.read_board_txt() {
            store.known_regions = meta.regions.into_iter().collect();
        }
        store
    }

    fn board_txt_path(&self) -> PathBuf {
        self.root.join("board.txt")
    }

    fn region_dir(&self) -> PathBuf {
        self.root.join("region")
    }

    fn region_path(&self, rc: RegionCoord) -> PathBuf {
        self.region_dir().join(format!("{}.{}.dat", rc.x, rc.y))
    }

    /// Parse `board.txt` and construct a fresh, empty-of-chunks `Board` from
    /// its metadata. Chunks are not loaded here; call `force_load_all_chunks`
    /// or `ensure_loaded` afterward.
    pub fn load(&mut self) -> Result<Board> {
        let meta = self.read_board_txt()?;
        self.known_regions = meta.regions.iter().copied().collect();
        let mut board = Board::new(meta.max_size);
        board.extra_logic_states = meta.extra_logic_states;
        board.notes_text = meta.notes_text;
        info!(regions = self.known_regions.len(), "loaded board metadata");
        Ok(board)
    }

    /// Load every chunk of every known region into `board`. Used for
    /// exhaustive operations (a full re-save, a legacy export) where demand
    /// loading's laziness would be counterproductive.
    pub fn force_load_all_chunks(&mut self, board: &mut Board) -> Result<()> {
        for key in self.known_regions.clone() {
            self.load_whole_region(key_rc(key), board)?;
        }
        Ok(())
    }

    fn load_whole_region(&mut self, rc: RegionCoord, board: &mut Board) -> Result<()> {
        let path = self.region_path(rc);
        let Some((header, mut file)) = open_region_for_read(&path)? else { return Ok(()) };
        for (idx, &(offset, count)) in header.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let cc = region_index_to_cc(rc, idx as i32);
            if board.contains_chunk(cc) {
                continue;
            }
            self.cache.pop(&cc);
            let chunk = read_chunk_payload(&mut file, &path, offset, count, cc)?;
            board.insert_chunk(cc, chunk);
        }
        Ok(())
    }

    /// Fault the chunk at `cc` into `board` if a copy exists on disk or in
    /// the opportunistic cache, opportunistically pulling in the surrounding
    /// `PREFETCH_BLOCK`-by-`PREFETCH_BLOCK` block from the same region file.
    /// A no-op if `cc` is already loaded or has never been saved.
    pub fn ensure_loaded(&mut self, board: &mut Board, cc: ChunkCoord) -> Result<()> {
        if board.contains_chunk(cc) {
            return Ok(());
        }
        if let Some(chunk) = self.cache.pop(&cc) {
            board.insert_chunk(cc, chunk);
            return Ok(());
        }

        let rc = tile_grid::coord::cc_get_rc(cc);
        if !self.known_regions.contains(&rc_key(rc)) {
            return Ok(());
        }

        let path = self.region_path(rc);
        let Some((header, mut file)) = open_region_for_read(&path)? else { return Ok(()) };

        let local = tile_grid::coord::cc_get_local(cc);
        let block_x0 = (local.x / PREFETCH_BLOCK) * PREFETCH_BLOCK;
        let block_y0 = (local.y / PREFETCH_BLOCK) * PREFETCH_BLOCK;

        for dy in 0..PREFETCH_BLOCK {
            for dx in 0..PREFETCH_BLOCK {
                let lx = block_x0 + dx;
                let ly = block_y0 + dy;
                if lx >= REGION_WIDTH || ly >= REGION_WIDTH {
                    continue;
                }
                let idx = (lx + ly * REGION_WIDTH) as usize;
                let (offset, count) = header[idx];
                if count == 0 {
                    continue;
                }
                let block_cc = Vec2::new(rc.x * REGION_WIDTH + lx, rc.y * REGION_WIDTH + ly);
                if board.contains_chunk(block_cc) || self.cache.contains(&block_cc) {
                    continue;
                }
                let chunk = read_chunk_payload(&mut file, &path, offset, count, block_cc)?;
                if block_cc == cc {
                    board.insert_chunk(block_cc, chunk);
                } else {
                    self.cache.put(block_cc, chunk);
                }
            }
        }
        debug!(?cc, ?rc, "demand-loaded chunk block");
        Ok(())
    }

    /// Persist every loaded, dirty chunk of `board`, and drop any loaded
    /// chunk that has gone blank since it was last saved. A region with no
    /// dirty chunks is a no-op on disk for that region, since this only
    /// touches regions that have at least one chunk currently loaded.
    pub fn save(&mut self, board: &mut Board) -> Result<()> {
        fs::create_dir_all(self.region_dir())
            .map_err(|e| io_error(&self.region_dir(), "create region directory", &e))?;

        let mut by_region: HashMap<RegionKey, Vec<ChunkCoord>> = HashMap::new();
        for cc in board.chunk_coords() {
            by_region.entry(rc_key(tile_grid::coord::cc_get_rc(cc))).or_default().push(cc);
        }

        let mut regions = self.known_regions.clone();
        for (key, coords) in by_region {
            let rc = key_rc(key);
            let populated = self.save_region(board, rc, &coords)?;
            if populated {
                regions.insert(key);
            } else {
                regions.remove(&key);
                let _ = fs::remove_file(self.region_path(rc));
            }
        }
        self.known_regions = regions;
        self.write_board_txt(board)?;
        info!(regions = self.known_regions.len(), "saved board");
        Ok(())
    }

    /// Write every dirty or newly-empty chunk of one region to its `.dat`
    /// file and return whether the region still holds any chunk afterward.
    fn save_region(&self, board: &mut Board, rc: RegionCoord, coords: &[ChunkCoord]) -> Result<bool> {
        let path = self.region_path(rc);
        let mut header = match File::open(&path) {
            Ok(mut f) => read_header(&mut f, &path)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => vec![(0u32, 0u8); HEADER_ENTRIES as usize],
            Err(e) => return Err(io_error(&path, "open region file", &e)),
        };
        let mut pool = FreeSectorPool::from_header(header.iter().copied())
            .map_err(|e| CircuitError::FileStorageError { filename: display(&path), locator: e.to_string() })?;

        let mut writes: Vec<(u32, Vec<u8>)> = Vec::new();
        let mut changed = false;

        for &cc in coords {
            let idx = tile_grid::coord::cc_get_region_index(cc);
            let (old_offset, old_count) = header[idx];
            let chunk = board.chunk_mut(cc).expect("coord came from board.chunk_coords()");

            if chunk.is_empty() {
                if old_count > 0 {
                    pool.free(old_offset, old_count as u32)
                        .map_err(|e| CircuitError::FileStorageError { filename: display(&path), locator: e.to_string() })?;
                    header[idx] = (0, 0);
                    changed = true;
                }
                chunk.unsaved = false;
                continue;
            }

            if !chunk.unsaved && old_count > 0 {
                continue;
            }

            let payload = chunk_codec::encode_chunk(chunk);
            let total_len = payload.len() as u64 + 4;
            let sectors = ((total_len + SECTOR_SIZE as u64 - 1) / SECTOR_SIZE as u64) as u32;
            if sectors > MAX_SECTORS_PER_CHUNK {
                return Err(CircuitError::ChunkTooLarge { cx: cc.x, cy: cc.y, sectors });
            }
            let sectors = sectors as u8;

            let offset = if old_count > 0 && old_count as u32 == sectors as u32 {
                old_offset
            } else {
                if old_count > 0 {
                    pool.free(old_offset, old_count as u32).map_err(|e| CircuitError::FileStorageError {
                        filename: display(&path),
                        locator: e.to_string(),
                    })?;
                }
                pool.allocate(sectors as u32).map_err(|e| CircuitError::FileStorageError {
                    filename: display(&path),
                    locator: e.to_string(),
                })?
            };
            header[idx] = (offset, sectors);
            changed = true;

            let mut buf = Vec::with_capacity(sectors as usize * SECTOR_SIZE as usize);
            buf.extend_from_slice(&(total_len as u32).to_be_bytes());
            buf.extend_from_slice(&payload);
            buf.resize(sectors as usize * SECTOR_SIZE as usize, 0);
            writes.push((offset, buf));

            chunk.unsaved = false;
        }

        let populated = header.iter().any(|&(_, count)| count > 0);
        if !populated {
            return Ok(false);
        }
        if !changed {
            // Every loaded chunk in this region already matches what's on
            // disk; nothing to write.
            return Ok(true);
        }

        let max_used_end =
            header.iter().filter(|&&(_, c)| c > 0).map(|&(o, c)| o + c as u32).max().unwrap_or(HEADER_SECTORS);

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| io_error(&path, "open region file", &e))?;

        let mut header_bytes = Vec::with_capacity(HEADER_SIZE as usize);
        for &(offset, count) in &header {
            header_bytes.push((offset >> 16) as u8);
            header_bytes.push((offset >> 8) as u8);
            header_bytes.push(offset as u8);
            header_bytes.push(count);
        }
        file.seek(SeekFrom::Start(0)).map_err(|e| io_error(&path, "seek region file", &e))?;
        file.write_all(&header_bytes).map_err(|e| io_error(&path, "write region header", &e))?;

        // Ascending sector order minimizes seeks (spec §4.4): chunk iteration
        // order follows the board's HashMap, which has no relation to offset.
        writes.sort_by_key(|(offset, _)| *offset);
        for (offset, buf) in &writes {
            file.seek(SeekFrom::Start(*offset as u64 * SECTOR_SIZE as u64))
                .map_err(|e| io_error(&path, "seek region file", &e))?;
            file.write_all(buf).map_err(|e| io_error(&path, "write chunk payload", &e))?;
        }

        file.set_len(max_used_end as u64 * SECTOR_SIZE as u64)
            .map_err(|e| io_error(&path, "truncate region file", &e))?;

        Ok(true)
    }

    fn read_board_txt(&self) -> Result<BoardTxtMeta> {
        let path = self.board_txt_path();
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BoardTxtMeta {
                    max_size: None,
                    extra_logic_states: false,
                    notes_text: String::new(),
                    regions: Vec::new(),
                });
            }
            Err(e) => return Err(io_error(&path, "read board.txt", &e)),
        };

        let mut width = 0i32;
        let mut height = 0i32;
        let mut extra_logic_states = false;
        let mut notes_text = String::new();
        let mut regions = Vec::new();

        let mut lines = text.lines().peekable();
        while let Some(line) = lines.next() {
            let trimmed = line.trim();
            if let Some(v) = trimmed.strip_prefix("width:") {
                width = v.trim().parse().unwrap_or(0);
            } else if let Some(v) = trimmed.strip_prefix("height:") {
                height = v.trim().parse().unwrap_or(0);
            } else if let Some(v) = trimmed.strip_prefix("extraLogicStates:") {
                extra_logic_states = v.trim() == "1";
            } else if trimmed == "notes: {" {
                let mut buf = String::new();
                for l in lines.by_ref() {
                    if l.trim_end() == "}" {
                        break;
                    }
                    buf.push_str(l);
                    buf.push('\n');
                }
                notes_text = buf;
            } else if trimmed == "regions: {" {
                for l in lines.by_ref() {
                    let l = l.trim();
                    if l == "}" {
                        break;
                    }
                    if let Some((x, y)) = l.split_once(',') {
                        if let (Ok(x), Ok(y)) = (x.trim().parse(), y.trim().parse()) {
                            regions.push((x, y));
                        }
                    }
                }
            }
        }

        let max_size = if width > 0 && height > 0 { Some(width.max(height)) } else { None };
        Ok(BoardTxtMeta { max_size, extra_logic_states, notes_text, regions })
    }

    fn write_board_txt(&self, board: &Board) -> Result<()> {
        let size = board.max_size().unwrap_or(0);
        let mut out = String::new();
        out.push_str("version: 2\n");
        out.push_str(&format!("width: {}\n", size));
        out.push_str(&format!("height: {}\n", size));
        out.push_str(&format!("extraLogicStates: {}\n", if board.extra_logic_states { 1 } else { 0 }));
        out.push_str("notes: {\n");
        out.push_str(&board.notes_text);
        if !board.notes_text.is_empty() && !board.notes_text.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("}\n");
        out.push_str("regions: {\n");
        let mut keys: Vec<RegionKey> = self.known_regions.iter().copied().collect();
        keys.sort();
        for (x, y) in keys {
            out.push_str(&format!("{},{}\n", x, y));
        }
        out.push_str("}\n");

        let path = self.board_txt_path();
        fs::write(&path, out).map_err(|e| io_error(&path, "write board.txt", &e))
    }
}

fn open_region_for_read(path: &std::path::Path) -> Result<Option<(Header, File)>> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(path, "open region file", &e)),
    };
    let header = read_header(&mut file, path)?;
    Ok(Some((header, file)))
}

fn read_header(file: &mut File, path: &std::path::Path) -> Result<Header> {
    let mut buf = vec![0u8; HEADER_SIZE as usize];
    file.seek(SeekFrom::Start(0)).map_err(|e| io_error(path, "seek region header", &e))?;
    file.read_exact(&mut buf).map_err(|e| io_error(path, "read region header", &e))?;
    Ok(buf.chunks_exact(4).map(|b| (u32::from_be_bytes([0, b[0], b[1], b[2]]), b[3])).collect())
}

fn read_chunk_payload(file: &mut File, path: &std::path::Path, offset: u32, count: u8, cc: ChunkCoord) -> Result<Chunk> {
    let filename = display(path);
    file.seek(SeekFrom::Start(offset as u64 * SECTOR_SIZE as u64)).map_err(|e| io_error(path, "seek chunk payload", &e))?;
    let mut len_buf = [0u8; 4];
    file.read_exact(&mut len_buf).map_err(|e| io_error(path, "read chunk length prefix", &e))?;
    let total_len = u32::from_be_bytes(len_buf) as usize;
    if total_len < 4 {
        return Err(CircuitError::FileStorageError {
            filename,
            locator: "chunk length prefix is smaller than itself".to_string(),
        });
    }
    let capacity = count as usize * SECTOR_SIZE as usize;
    if total_len > capacity {
        return Err(CircuitError::FileStorageError {
            filename,
            locator: "chunk length exceeds its allotted sectors".to_string(),
        });
    }
    let mut payload = vec![0u8; total_len - 4];
    file.read_exact(&mut payload).map_err(|e| io_error(path, "read chunk payload", &e))?;
    chunk_codec::decode_chunk(cc, &payload, &display(path))
}

fn region_index_to_cc(rc: RegionCoord, idx: i32) -> ChunkCoord {
    let lx = idx % REGION_WIDTH;
    let ly = idx / REGION_WIDTH;
    Vec2::new(rc.x * REGION_WIDTH + lx, rc.y * REGION_WIDTH + ly)
}

fn display(path: &std::path::Path) -> String {
    path.display().to_string()
}

fn io_error(path: &std::path::Path, what: &str, e: &std::io::Error) -> CircuitError {
    CircuitError::FileStorageError { filename: display(path), locator: format!("{}: {}", what, e) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tile_grid::tile::{TileData, TileKind};
    use tile_grid::{Direction, SignalState};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("circuit_sim_region_store_test_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn wire_tile() -> TileData {
        TileData { kind: TileKind::WireStraight, direction: Direction::North, state1: SignalState::High, ..TileData::blank() }
    }

    #[test]
    fn save_then_load_round_trips_chunks_across_two_regions() {
        let dir = scratch_dir("round_trip");
        let mut board = Board::new(None);
        // (0,0) and (5,3) land in region (0,0); (31,31) also in region (0,0);
        // (32,0) lands in region (1,0) -- spec's region save round-trip scenario.
        for &(cx, cy) in &[(0, 0), (5, 3), (31, 31), (32, 0)] {
            board.set_tile(Vec2::new(cx * 32, cy * 32), wire_tile()).unwrap();
        }
        board.extra_logic_states = true;
        board.notes_text = "test notes".to_string();

        let mut store = RegionStore::open(&dir);
        store.save(&mut board).unwrap();

        let mut reloaded_store = RegionStore::open(&dir);
        let mut reloaded = reloaded_store.load().unwrap();
        assert!(reloaded.extra_logic_states);
        assert_eq!(reloaded.notes_text, "test notes");
        reloaded_store.force_load_all_chunks(&mut reloaded).unwrap();

        for &(cx, cy) in &[(0, 0), (5, 3), (31, 31), (32, 0)] {
            let cc = Vec2::new(cx, cy);
            let chunk = reloaded.chunk(cc).expect("chunk should have been loaded");
            assert_eq!(*chunk.tile(0), wire_tile());
        }

        assert!(dir.join("region").join("0.0.dat").exists());
        assert!(dir.join("region").join("1.0.dat").exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn save_with_no_dirty_chunks_is_a_no_op_on_disk() {
        let dir = scratch_dir("no_op_save");
        let mut board = Board::new(None);
        board.set_tile(Vec2::new(0, 0), wire_tile()).unwrap();

        let mut store = RegionStore::open(&dir);
        store.save(&mut board).unwrap();
        let region_path = dir.join("region").join("0.0.dat");
        let first_write_metadata = fs::metadata(&region_path).unwrap().modified().unwrap();

        store.save(&mut board).unwrap();
        let second_write_metadata = fs::metadata(&region_path).unwrap().modified().unwrap();
        assert_eq!(first_write_metadata, second_write_metadata);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn chunk_going_blank_is_removed_from_disk_on_next_save() {
        let dir = scratch_dir("delete_on_blank");
        let mut board = Board::new(None);
        board.set_tile(Vec2::new(0, 0), wire_tile()).unwrap();

        let mut store = RegionStore::open(&dir);
        store.save(&mut board).unwrap();
        assert!(dir.join("region").join("0.0.dat").exists());

        board.set_tile(Vec2::new(0, 0), TileData::blank()).unwrap();
        store.save(&mut board).unwrap();
        assert!(!dir.join("region").join("0.0.dat").exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn ensure_loaded_prefetches_a_block_into_the_cache() {
        let dir = scratch_dir("prefetch");
        let mut board = Board::new(None);
        board.set_tile(Vec2::new(0, 0), wire_tile()).unwrap();
        board.set_tile(Vec2::new(32 * 2, 0), wire_tile()).unwrap();

        let mut store = RegionStore::open(&dir);
        store.save(&mut board).unwrap();

        let mut fresh = Board::new(None);
        store.ensure_loaded(&mut fresh, Vec2::new(0, 0)).unwrap();
        assert!(fresh.contains_chunk(Vec2::new(0, 0)));
        assert!(store.cache.contains(&Vec2::new(2, 0)));

        let _ = fs::remove_dir_all(&dir);
    }
}
