//! Per-driver shared state plus the one process-wide legacy block store.

use std::sync::{Mutex, OnceLock};

use rustc_hash::FxHashMap;

pub const REGISTER_COUNT: usize = 100;

/// Number of lazily allocated block-array blocks and entries per block. The
/// shapes match the legacy script runtime.
pub const MEGABUF_BLOCKS: usize = 64;
pub const MEGABUF_ITEMS_PER_BLOCK: usize = 1024;

/// Line-blend routing shared between the "Set render mode" effect and the
/// primitive drawers. The low byte of `line_blend_mode` selects the blend
/// table entry, the next byte is the adjustable-alpha weight, and the third
/// byte optionally overrides line width.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyRender {
    pub line_blend_mode_active: bool,
    pub line_blend_mode: u32,
}

/// A named 2-D float heightmap auxiliary buffer.
#[derive(Debug, Clone, Default)]
pub struct Heightmap {
    pub width: usize,
    pub height: usize,
    pub values: Vec<f32>,
}

impl Heightmap {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            values: vec![0.0; width * height],
        }
    }
}

/// Mutable state shared by all effects of one driver within a frame.
/// Effects write in pipeline order; later effects see earlier writes.
pub struct GlobalState {
    pub registers: [f64; REGISTER_COUNT],
    pub heightmaps: FxHashMap<String, Heightmap>,
    pub legacy_render: LegacyRender,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            registers: [0.0; REGISTER_COUNT],
            heightmaps: FxHashMap::default(),
            legacy_render: LegacyRender::default(),
        }
    }
}

impl GlobalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.registers = [0.0; REGISTER_COUNT];
        self.heightmaps.clear();
        self.legacy_render = LegacyRender::default();
    }
}

/// Process-wide `gmegabuf` store, guarded by a coarse mutex per access.
struct GlobalMegaBuf {
    blocks: Vec<Option<Vec<f64>>>,
}

fn global_megabuf() -> &'static Mutex<GlobalMegaBuf> {
    static STORE: OnceLock<Mutex<GlobalMegaBuf>> = OnceLock::new();
    STORE.get_or_init(|| {
        Mutex::new(GlobalMegaBuf {
            blocks: (0..MEGABUF_BLOCKS).map(|_| None).collect(),
        })
    })
}

/// Read one `gmegabuf` entry. Out-of-range indices read as 0.
pub fn gmegabuf_get(index: i64) -> f64 {
    if index < 0 {
        return 0.0;
    }
    let block = index as usize / MEGABUF_ITEMS_PER_BLOCK;
    let entry = index as usize % MEGABUF_ITEMS_PER_BLOCK;
    if block >= MEGABUF_BLOCKS {
        return 0.0;
    }
    let store = global_megabuf().lock().expect("gmegabuf mutex poisoned");
    store.blocks[block].as_ref().map_or(0.0, |b| b[entry])
}

/// Write one `gmegabuf` entry, allocating its block on demand.
/// Out-of-range indices are dropped.
pub fn gmegabuf_set(index: i64, value: f64) {
    if index < 0 {
        return;
    }
    let block = index as usize / MEGABUF_ITEMS_PER_BLOCK;
    let entry = index as usize % MEGABUF_ITEMS_PER_BLOCK;
    if block >= MEGABUF_BLOCKS {
        return;
    }
    let mut store = global_megabuf().lock().expect("gmegabuf mutex poisoned");
    store.blocks[block]
        .get_or_insert_with(|| vec![0.0; MEGABUF_ITEMS_PER_BLOCK])[entry] = value;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_start_zeroed_and_reset() {
        let mut g = GlobalState::new();
        g.registers[10] = 3.5;
        g.legacy_render.line_blend_mode_active = true;
        g.reset();
        assert_eq!(g.registers[10], 0.0);
        assert!(!g.legacy_render.line_blend_mode_active);
    }

    #[test]
    fn gmegabuf_round_trip_and_bounds() {
        gmegabuf_set(1500, 2.25);
        assert_eq!(gmegabuf_get(1500), 2.25);
        assert_eq!(gmegabuf_get(-1), 0.0);
        let out_of_range = (MEGABUF_BLOCKS * MEGABUF_ITEMS_PER_BLOCK) as i64 + 5;
        gmegabuf_set(out_of_range, 9.0);
        assert_eq!(gmegabuf_get(out_of_range), 0.0);
    }
}
