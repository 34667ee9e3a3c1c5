use crate::cell::{Cell, GridIndex};
use crate::config::{ScatterParams, StreamingParams, TerrainParams, MAX_STREAM_REACH};
use crate::heightfield::HeightField;
use crate::mesher::WorldMesher;
use crate::scene::SceneSink;
use std::collections::HashMap;
use std::sync::OnceLock;
use web_time::Instant;

/// Counters of one `update` call plus the resident totals after it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub resident: usize,
    pub vegetation: usize,
    pub structures: usize,
    pub added: usize,
    pub removed: usize,
    /// The time slice ran out before the whole add square was checked.
    pub cut_short: bool,
}

/// Lookups between two clock reads while scanning resident cells.
const SCAN_STRIDE: usize = 64;

/// Position within one raster sweep of the add square. A sweep that runs out
/// of time continues from `next` on the following call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct RasterScan {
    focal: GridIndex,
    reach: i32,
    next: usize,
}

impl RasterScan {
    fn side(&self) -> usize {
        2 * self.reach as usize + 1
    }

    fn len(&self) -> usize {
        self.side() * self.side()
    }

    /// x outer, y inner.
    fn index_at(&self, position: usize) -> GridIndex {
        let side = self.side();
        let dx = (position / side) as i32 - self.reach;
        let dy = (position % side) as i32 - self.reach;
        self.focal.offset(dx, dy)
    }
}

/// Cells resident around a moving focal point. Cells are built a few at a
/// time so one call never stalls a frame for long.
pub struct RegionCache {
    cells: HashMap<GridIndex, Cell>,
    mesher: WorldMesher,
    params: StreamingParams,
    generator_version: u64,
    focal: Option<GridIndex>,
    scan: Option<RasterScan>,
    last_stats: StreamStats,
}

impl RegionCache {
    pub fn new(streaming: StreamingParams, terrain: TerrainParams, scatter: ScatterParams) -> Self {
        Self {
            cells: HashMap::new(),
            mesher: WorldMesher::new(terrain, scatter),
            params: streaming,
            generator_version: 0,
            focal: None,
            scan: None,
            last_stats: StreamStats::default(),
        }
    }

    pub fn params(&self) -> &StreamingParams {
        &self.params
    }

    pub fn heightfield(&self) -> &HeightField {
        self.mesher.heightfield()
    }

    pub fn generator_version(&self) -> u64 {
        self.generator_version
    }

    pub fn focal(&self) -> Option<GridIndex> {
        self.focal
    }

    pub fn last_stats(&self) -> StreamStats {
        self.last_stats
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains(&self, index: GridIndex) -> bool {
        self.cells.contains_key(&index)
    }

    pub fn get(&self, index: GridIndex) -> Option<&Cell> {
        self.cells.get(&index).filter(|cell| cell.is_populated())
    }

    /// Populated resident cells, in no particular order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values().filter(|cell| cell.is_populated())
    }

    /// Takes effect on the next `update`: range and budget immediately,
    /// a new cell size through the size check of the removal pass.
    pub fn set_streaming(&mut self, params: StreamingParams) {
        self.params = params;
    }

    /// Swaps the generator parameters and marks every resident cell stale.
    pub fn set_generator(&mut self, terrain: &TerrainParams, scatter: &ScatterParams) {
        self.mesher.reconfigure(terrain, scatter);
        self.invalidate();
    }

    /// Stale cells are replaced over the following updates.
    pub fn invalidate(&mut self) {
        self.generator_version = self.generator_version.wrapping_add(1);
        log::debug!("region cache invalidated, generator version {}", self.generator_version);
    }

    /// Brings the resident set in line with the focal point, within the
    /// configured time slice. Cells that did not fit are picked up by the
    /// next call.
    pub fn update(&mut self, focal_x: f32, focal_y: f32, sink: &mut dyn SceneSink) -> StreamStats {
        let start = Instant::now();
        let budget = self.params.budget();
        let size = self.params.cell_size;
        let focal = GridIndex::containing(focal_x, focal_y, size);
        if self.focal != Some(focal) {
            log::debug!("focal cell now ({}, {})", focal.x, focal.y);
        }
        self.focal = Some(focal);

        let remove_threshold = self.params.remove_threshold();
        let version = self.generator_version;
        let stale: Vec<GridIndex> = self
            .cells
            .values()
            .filter(|cell| {
                focal.chebyshev(cell.index) as f32 > remove_threshold
                    || cell.size != size
                    || cell.generator_version != version
            })
            .map(|cell| cell.index)
            .collect();
        for index in &stale {
            if let Some(mut cell) = self.cells.remove(index) {
                cell.dispose(sink);
                log::debug!("disposed cell ({}, {})", index.x, index.y);
            }
        }

        let reach = self.params.add_threshold().floor().clamp(0.0, MAX_STREAM_REACH) as i32;
        let mut scan = match self.scan {
            Some(scan) if scan.focal == focal && scan.reach == reach && stale.is_empty() => scan,
            _ => RasterScan {
                focal,
                reach,
                next: 0,
            },
        };

        let mut added = 0;
        let mut probed = 0;
        while scan.next < scan.len() {
            let index = scan.index_at(scan.next);
            scan.next += 1;
            probed += 1;
            let built = !self.cells.contains_key(&index);
            if built {
                let mut cell = self.mesher.build_cell(index, size);
                cell.generator_version = version;
                cell.attach(sink);
                log::debug!(
                    "built cell ({}, {}): {} vegetation, {} structures",
                    index.x,
                    index.y,
                    cell.vegetation.len(),
                    cell.structures.len()
                );
                self.cells.insert(index, cell);
                added += 1;
            }
            if (built || probed % SCAN_STRIDE == 0) && start.elapsed() >= budget {
                break;
            }
        }
        let cut_short = scan.next < scan.len();
        if !cut_short {
            scan.next = 0;
        }
        self.scan = Some(scan);

        let (vegetation, structures) = self.cells().fold((0, 0), |(v, s), cell| {
            (v + cell.vegetation.len(), s + cell.structures.len())
        });
        let stats = StreamStats {
            resident: self.cells.len(),
            vegetation,
            structures,
            added,
            removed: stale.len(),
            cut_short,
        };

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        if stream_diag_enabled() {
            log::info!(
                "[region-cache] elapsed_ms={:.3} focal=({}, {}) added={} removed={} resident={} cut_short={}",
                elapsed_ms,
                focal.x,
                focal.y,
                stats.added,
                stats.removed,
                stats.resident,
                stats.cut_short
            );
        }
        self.last_stats = stats;
        stats
    }

    /// Disposes every resident cell.
    pub fn clear(&mut self, sink: &mut dyn SceneSink) {
        for (_, mut cell) in self.cells.drain() {
            cell.dispose(sink);
        }
        self.focal = None;
        self.scan = None;
    }
}

fn stream_diag_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| {
        std::env::var("SOARING_STREAM_DIAG")
            .ok()
            .map(|value| {
                let normalized = value.trim().to_ascii_lowercase();
                matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
            })
            .unwrap_or(false)
    })
}
