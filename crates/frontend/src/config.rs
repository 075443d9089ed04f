//! Configuration system for the decoupled front end.
//!
//! This module defines all configuration structures used to parameterize the
//! predictor and the fetch engine. It provides:
//! 1. **Defaults:** Baseline queue sizes, widths, and predictor table geometry.
//! 2. **Structures:** Hierarchical config for the BPU, its components, and fetch.
//! 3. **Enums:** SMT fetch thread-selection policy.
//!
//! Configuration is usually supplied as JSON (`FrontendConfig::from_json`);
//! any omitted field falls back to the values in `defaults`.

use serde::Deserialize;

use crate::common::FrontendError;

/// Default configuration constants for the front end.
mod defaults {
    /// Fetch stream queue capacity (streams).
    pub const FSQ_SIZE: usize = 64;

    /// Fetch target queue capacity (targets).
    pub const FTQ_SIZE: usize = 128;

    /// Bytes covered by one prediction block.
    pub const PREDICT_WIDTH: u64 = 64;

    /// Number of prediction pipeline stages.
    ///
    /// Stage 0 is the single-cycle micro BTB; the last stage carries the
    /// slowest, most accurate tables.
    pub const NUM_STAGES: usize = 3;

    /// Global taken-history length in bits.
    pub const GLOBAL_HISTORY_BITS: usize = 128;

    /// Path history length in bits.
    pub const PATH_HISTORY_BITS: usize = 64;

    /// Backward-branch history length in bits.
    pub const BACKWARD_HISTORY_BITS: usize = 64;

    /// Inner-most loop iteration history length in bits.
    pub const IMLI_BITS: usize = 16;

    /// Per-PC local history length in bits.
    pub const LOCAL_HISTORY_BITS: usize = 32;

    /// Number of local history registers.
    pub const LOCAL_HISTORY_ENTRIES: usize = 256;

    /// Largest sane shift amount for one history ledger entry.
    pub const MAX_SHAMT: usize = 8;

    /// Micro BTB entries (fully associative).
    pub const UBTB_ENTRIES: usize = 32;

    /// Micro BTB tag width.
    pub const UBTB_TAG_BITS: u32 = 38;

    /// Main BTB entries.
    pub const BTB_ENTRIES: usize = 2048;

    /// Main BTB associativity.
    pub const BTB_WAYS: usize = 8;

    /// Main BTB tag width.
    pub const BTB_TAG_BITS: u32 = 20;

    /// Ahead-pipelined BTB entries.
    pub const ABTB_ENTRIES: usize = 1024;

    /// Ahead-pipelined BTB associativity.
    pub const ABTB_WAYS: usize = 4;

    /// Streams between the block whose address indexes the ahead BTB and
    /// the block it predicts.
    pub const ABTB_AHEAD_STAGES: usize = 1;

    /// Entries per tagged TAGE table.
    pub const TAGE_TABLE_SIZE: usize = 1024;

    /// Base bimodal table entries.
    pub const TAGE_BASE_SIZE: usize = 2048;

    /// Loop predictor entries.
    pub const TAGE_LOOP_SIZE: usize = 64;

    /// Useful-bit aging interval, in updates.
    pub const TAGE_RESET_INTERVAL: u32 = 256 * 1024;

    /// Indirect target table entries per tagged table.
    pub const ITTAGE_TABLE_SIZE: usize = 256;

    /// Speculative return address stack depth.
    pub const RAS_SIZE: usize = 32;

    /// Statistical corrector table index width.
    pub const SC_TABLE_BITS: u32 = 9;

    /// Global history bits consumed by the statistical corrector.
    pub const SC_GLOBAL_BITS: usize = 16;

    /// Local history bits consumed by the statistical corrector.
    pub const SC_LOCAL_BITS: usize = 12;

    /// Instructions fetched per cycle.
    pub const FETCH_WIDTH: usize = 8;

    /// Instructions handed to decode per cycle.
    pub const DECODE_WIDTH: usize = 8;

    /// Fetch-to-decode queue capacity.
    pub const FETCH_QUEUE_SIZE: usize = 32;

    /// Hardware threads sharing the fetch stage.
    pub const NUM_THREADS: usize = 1;

    /// Fetch buffer size in bytes.
    ///
    /// Two bytes past a 64-byte line so that a window starting at the last
    /// halfword of a line still covers one full 4-byte instruction.
    pub const FETCH_BUFFER_SIZE: usize = 66;

    /// Instruction cache line size in bytes.
    pub const CACHE_LINE_SIZE: usize = 64;
}

/// SMT fetch thread-selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SmtFetchPolicy {
    /// Only thread 0 ever fetches.
    #[default]
    SingleThread,
    /// Rotate priority among active threads every cycle.
    RoundRobin,
}

/// Root configuration structure for the front end.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FrontendConfig {
    /// Branch prediction unit configuration.
    #[serde(default)]
    pub bpu: BpuConfig,
    /// Fetch engine configuration.
    #[serde(default)]
    pub fetch: FetchConfig,
}

impl FrontendConfig {
    /// Parses a JSON configuration, filling omitted fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns `FrontendError::ConfigParse` when the text is not valid JSON for
    /// this schema, or `FrontendError::InvalidConfig` when the parsed values
    /// fail `validate`.
    pub fn from_json(text: &str) -> Result<Self, FrontendError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| FrontendError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `FrontendError::InvalidConfig` describing the first violated rule.
    pub fn validate(&self) -> Result<(), FrontendError> {
        self.bpu.validate()?;
        self.fetch.validate()
    }
}

/// Decoupled branch prediction unit configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BpuConfig {
    /// Fetch stream queue capacity.
    #[serde(default = "BpuConfig::default_fsq_size")]
    pub fsq_size: usize,

    /// Fetch target queue capacity.
    #[serde(default = "BpuConfig::default_ftq_size")]
    pub ftq_size: usize,

    /// Bytes covered by one prediction block (power of two).
    #[serde(default = "BpuConfig::default_predict_width")]
    pub predict_width: u64,

    /// Number of prediction pipeline stages.
    #[serde(default = "BpuConfig::default_num_stages")]
    pub num_stages: usize,

    /// Global taken-history length.
    #[serde(default = "BpuConfig::default_global_history_bits")]
    pub global_history_bits: usize,

    /// Path history length.
    #[serde(default = "BpuConfig::default_path_history_bits")]
    pub path_history_bits: usize,

    /// Backward-branch history length.
    #[serde(default = "BpuConfig::default_backward_history_bits")]
    pub backward_history_bits: usize,

    /// Inner-most loop iteration history length.
    #[serde(default = "BpuConfig::default_imli_bits")]
    pub imli_bits: usize,

    /// Local history register length.
    #[serde(default = "BpuConfig::default_local_history_bits")]
    pub local_history_bits: usize,

    /// Number of local history registers (power of two).
    #[serde(default = "BpuConfig::default_local_history_entries")]
    pub local_history_entries: usize,

    /// Shift amount above which a ledger entry is reported as suspicious.
    #[serde(default = "BpuConfig::default_max_shamt")]
    pub max_shamt: usize,

    /// Replay the history ledger after each squash and compare.
    #[serde(default = "BpuConfig::default_check_history")]
    pub check_history: bool,

    /// Micro BTB configuration.
    #[serde(default)]
    pub ubtb: UbtbConfig,

    /// Main BTB configuration.
    #[serde(default)]
    pub btb: BtbConfig,

    /// Ahead-pipelined BTB configuration.
    #[serde(default)]
    pub abtb: AbtbConfig,

    /// TAGE direction predictor configuration.
    #[serde(default)]
    pub tage: TageConfig,

    /// Indirect target predictor configuration.
    #[serde(default)]
    pub ittage: IttageConfig,

    /// Return address stack configuration.
    #[serde(default)]
    pub ras: RasConfig,

    /// Statistical corrector configuration.
    #[serde(default)]
    pub sc: ScConfig,
}

impl BpuConfig {
    /// Returns the default FSQ capacity.
    fn default_fsq_size() -> usize {
        defaults::FSQ_SIZE
    }

    /// Returns the default FTQ capacity.
    fn default_ftq_size() -> usize {
        defaults::FTQ_SIZE
    }

    /// Returns the default prediction block width.
    fn default_predict_width() -> u64 {
        defaults::PREDICT_WIDTH
    }

    /// Returns the default number of prediction stages.
    fn default_num_stages() -> usize {
        defaults::NUM_STAGES
    }

    /// Returns the default global history length.
    fn default_global_history_bits() -> usize {
        defaults::GLOBAL_HISTORY_BITS
    }

    /// Returns the default path history length.
    fn default_path_history_bits() -> usize {
        defaults::PATH_HISTORY_BITS
    }

    /// Returns the default backward history length.
    fn default_backward_history_bits() -> usize {
        defaults::BACKWARD_HISTORY_BITS
    }

    /// Returns the default IMLI history length.
    fn default_imli_bits() -> usize {
        defaults::IMLI_BITS
    }

    /// Returns the default local history length.
    fn default_local_history_bits() -> usize {
        defaults::LOCAL_HISTORY_BITS
    }

    /// Returns the default number of local history registers.
    fn default_local_history_entries() -> usize {
        defaults::LOCAL_HISTORY_ENTRIES
    }

    /// Returns the default ledger shift sanity limit.
    fn default_max_shamt() -> usize {
        defaults::MAX_SHAMT
    }

    /// History checking is on unless explicitly disabled.
    fn default_check_history() -> bool {
        true
    }

    /// Checks BPU geometry.
    ///
    /// # Errors
    ///
    /// Returns `FrontendError::InvalidConfig` on zero-sized queues, a
    /// non-power-of-two width or table, or history lengths that tables
    /// cannot be indexed with.
    pub fn validate(&self) -> Result<(), FrontendError> {
        let invalid = |msg: String| Err(FrontendError::InvalidConfig(msg));
        if self.fsq_size == 0 || self.ftq_size == 0 {
            return invalid("FSQ and FTQ sizes must be non-zero".into());
        }
        if !self.predict_width.is_power_of_two() {
            return invalid(format!("predict_width {} is not a power of two", self.predict_width));
        }
        if self.num_stages < 3 {
            return invalid(format!("num_stages {} is below the 3 needed by the components", self.num_stages));
        }
        if !self.local_history_entries.is_power_of_two() {
            return invalid("local_history_entries must be a power of two".into());
        }
        if self.global_history_bits == 0 || self.path_history_bits < 2 {
            return invalid("global and path histories must be non-empty".into());
        }
        if self.ubtb.num_entries == 0 {
            return invalid("ubtb.num_entries must be non-zero".into());
        }
        if self.btb.ways == 0
            || self.btb.num_entries % self.btb.ways != 0
            || !(self.btb.num_entries / self.btb.ways).is_power_of_two()
        {
            return invalid("btb.num_entries / btb.ways must be a power of two".into());
        }
        if self.abtb.ways == 0
            || self.abtb.num_entries % self.abtb.ways != 0
            || !(self.abtb.num_entries / self.abtb.ways).is_power_of_two()
        {
            return invalid("abtb.num_entries / abtb.ways must be a power of two".into());
        }
        if self.abtb.ahead_stages >= self.fsq_size {
            return invalid(format!(
                "abtb.ahead_stages {} must be below fsq_size {}",
                self.abtb.ahead_stages, self.fsq_size
            ));
        }
        let tage = &self.tage;
        if !tage.table_size.is_power_of_two()
            || !tage.base_table_size.is_power_of_two()
            || !tage.loop_table_size.is_power_of_two()
        {
            return invalid("TAGE table sizes must be powers of two".into());
        }
        if tage.history_lengths.len() != tage.tag_widths.len() || tage.history_lengths.is_empty() {
            return invalid("TAGE history_lengths and tag_widths must be non-empty and equal length".into());
        }
        if tage.history_lengths.iter().any(|&l| l > self.global_history_bits) {
            return invalid("TAGE history length exceeds global_history_bits".into());
        }
        let ittage = &self.ittage;
        if !ittage.table_size.is_power_of_two()
            || ittage.history_lengths.len() != ittage.tag_widths.len()
            || ittage.history_lengths.is_empty()
        {
            return invalid("ITTAGE tables must be power-of-two sized with matching lengths".into());
        }
        if ittage.history_lengths.iter().any(|&l| l > self.path_history_bits) {
            return invalid("ITTAGE history length exceeds path_history_bits".into());
        }
        if self.ras.size == 0 {
            return invalid("ras.size must be non-zero".into());
        }
        if self.sc.global_bits > self.global_history_bits || self.sc.local_bits > self.local_history_bits {
            return invalid("statistical corrector reads more history than is kept".into());
        }
        if self.sc.table_bits == 0 || self.sc.table_bits > 24 {
            return invalid(format!("sc.table_bits {} outside 1..=24", self.sc.table_bits));
        }
        Ok(())
    }
}

impl Default for BpuConfig {
    /// Creates the default three-stage BPU with all components enabled.
    fn default() -> Self {
        Self {
            fsq_size: defaults::FSQ_SIZE,
            ftq_size: defaults::FTQ_SIZE,
            predict_width: defaults::PREDICT_WIDTH,
            num_stages: defaults::NUM_STAGES,
            global_history_bits: defaults::GLOBAL_HISTORY_BITS,
            path_history_bits: defaults::PATH_HISTORY_BITS,
            backward_history_bits: defaults::BACKWARD_HISTORY_BITS,
            imli_bits: defaults::IMLI_BITS,
            local_history_bits: defaults::LOCAL_HISTORY_BITS,
            local_history_entries: defaults::LOCAL_HISTORY_ENTRIES,
            max_shamt: defaults::MAX_SHAMT,
            check_history: true,
            ubtb: UbtbConfig::default(),
            btb: BtbConfig::default(),
            abtb: AbtbConfig::default(),
            tage: TageConfig::default(),
            ittage: IttageConfig::default(),
            ras: RasConfig::default(),
            sc: ScConfig::default(),
        }
    }
}

/// Micro BTB configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UbtbConfig {
    /// Number of fully associative entries.
    #[serde(default = "UbtbConfig::default_entries")]
    pub num_entries: usize,

    /// Tag width taken from the block start address.
    #[serde(default = "UbtbConfig::default_tag_bits")]
    pub tag_bits: u32,
}

impl UbtbConfig {
    /// Returns the default micro BTB size.
    fn default_entries() -> usize {
        defaults::UBTB_ENTRIES
    }

    /// Returns the default micro BTB tag width.
    fn default_tag_bits() -> u32 {
        defaults::UBTB_TAG_BITS
    }
}

impl Default for UbtbConfig {
    fn default() -> Self {
        Self {
            num_entries: defaults::UBTB_ENTRIES,
            tag_bits: defaults::UBTB_TAG_BITS,
        }
    }
}

/// Main BTB configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BtbConfig {
    /// Total entries across all ways.
    #[serde(default = "BtbConfig::default_entries")]
    pub num_entries: usize,

    /// Associativity.
    #[serde(default = "BtbConfig::default_ways")]
    pub ways: usize,

    /// Tag width.
    #[serde(default = "BtbConfig::default_tag_bits")]
    pub tag_bits: u32,
}

impl BtbConfig {
    /// Returns the default BTB size.
    fn default_entries() -> usize {
        defaults::BTB_ENTRIES
    }

    /// Returns the default BTB associativity.
    fn default_ways() -> usize {
        defaults::BTB_WAYS
    }

    /// Returns the default BTB tag width.
    fn default_tag_bits() -> u32 {
        defaults::BTB_TAG_BITS
    }
}

impl Default for BtbConfig {
    fn default() -> Self {
        Self {
            num_entries: defaults::BTB_ENTRIES,
            ways: defaults::BTB_WAYS,
            tag_bits: defaults::BTB_TAG_BITS,
        }
    }
}

/// Ahead-pipelined BTB configuration.
///
/// The ahead BTB is indexed with the start address of the block predicted
/// `ahead_stages` streams earlier, so its set read can begin before the
/// current block's address is known.
#[derive(Debug, Clone, Deserialize)]
pub struct AbtbConfig {
    /// Total entries across all ways.
    #[serde(default = "AbtbConfig::default_entries")]
    pub num_entries: usize,

    /// Associativity.
    #[serde(default = "AbtbConfig::default_ways")]
    pub ways: usize,

    /// How many streams back the indexing address comes from. Zero indexes
    /// with the block's own start address.
    #[serde(default = "AbtbConfig::default_ahead_stages")]
    pub ahead_stages: usize,
}

impl AbtbConfig {
    /// Returns the default ahead BTB size.
    fn default_entries() -> usize {
        defaults::ABTB_ENTRIES
    }

    /// Returns the default ahead BTB associativity.
    fn default_ways() -> usize {
        defaults::ABTB_WAYS
    }

    /// Returns the default ahead distance.
    fn default_ahead_stages() -> usize {
        defaults::ABTB_AHEAD_STAGES
    }
}

impl Default for AbtbConfig {
    fn default() -> Self {
        Self {
            num_entries: defaults::ABTB_ENTRIES,
            ways: defaults::ABTB_WAYS,
            ahead_stages: defaults::ABTB_AHEAD_STAGES,
        }
    }
}

/// TAGE (Tagged Geometric) predictor configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TageConfig {
    /// Entries per tagged table.
    #[serde(default = "TageConfig::default_table_size")]
    pub table_size: usize,

    /// Base bimodal table entries.
    #[serde(default = "TageConfig::default_base_size")]
    pub base_table_size: usize,

    /// Loop predictor table size.
    #[serde(default = "TageConfig::default_loop_size")]
    pub loop_table_size: usize,

    /// Useful counter reset interval.
    #[serde(default = "TageConfig::default_reset_interval")]
    pub reset_interval: u32,

    /// History lengths for each tagged table, shortest first.
    #[serde(default = "TageConfig::default_history_lengths")]
    pub history_lengths: Vec<usize>,

    /// Tag widths for each tagged table.
    #[serde(default = "TageConfig::default_tag_widths")]
    pub tag_widths: Vec<u32>,
}

impl TageConfig {
    /// Returns the default tagged table size.
    fn default_table_size() -> usize {
        defaults::TAGE_TABLE_SIZE
    }

    /// Returns the default base table size.
    fn default_base_size() -> usize {
        defaults::TAGE_BASE_SIZE
    }

    /// Returns the default loop predictor size.
    fn default_loop_size() -> usize {
        defaults::TAGE_LOOP_SIZE
    }

    /// Returns the default useful-bit reset interval.
    fn default_reset_interval() -> u32 {
        defaults::TAGE_RESET_INTERVAL
    }

    /// Returns the default geometric history series.
    fn default_history_lengths() -> Vec<usize> {
        vec![8, 13, 32, 119]
    }

    /// Returns the default per-table tag widths.
    fn default_tag_widths() -> Vec<u32> {
        vec![8, 8, 9, 9]
    }
}

impl Default for TageConfig {
    fn default() -> Self {
        Self {
            table_size: defaults::TAGE_TABLE_SIZE,
            base_table_size: defaults::TAGE_BASE_SIZE,
            loop_table_size: defaults::TAGE_LOOP_SIZE,
            reset_interval: defaults::TAGE_RESET_INTERVAL,
            history_lengths: Self::default_history_lengths(),
            tag_widths: Self::default_tag_widths(),
        }
    }
}

/// Indirect target predictor configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IttageConfig {
    /// Entries per tagged table.
    #[serde(default = "IttageConfig::default_table_size")]
    pub table_size: usize,

    /// Path history lengths for each table, shortest first.
    #[serde(default = "IttageConfig::default_history_lengths")]
    pub history_lengths: Vec<usize>,

    /// Tag widths for each table.
    #[serde(default = "IttageConfig::default_tag_widths")]
    pub tag_widths: Vec<u32>,
}

impl IttageConfig {
    /// Returns the default ITTAGE table size.
    fn default_table_size() -> usize {
        defaults::ITTAGE_TABLE_SIZE
    }

    /// Returns the default path history series.
    fn default_history_lengths() -> Vec<usize> {
        vec![4, 8, 16, 32]
    }

    /// Returns the default per-table tag widths.
    fn default_tag_widths() -> Vec<u32> {
        vec![9, 9, 9, 9]
    }
}

impl Default for IttageConfig {
    fn default() -> Self {
        Self {
            table_size: defaults::ITTAGE_TABLE_SIZE,
            history_lengths: Self::default_history_lengths(),
            tag_widths: Self::default_tag_widths(),
        }
    }
}

/// Return address stack configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RasConfig {
    /// Stack depth.
    #[serde(default = "RasConfig::default_size")]
    pub size: usize,
}

impl RasConfig {
    /// Returns the default stack depth.
    fn default_size() -> usize {
        defaults::RAS_SIZE
    }
}

impl Default for RasConfig {
    fn default() -> Self {
        Self {
            size: defaults::RAS_SIZE,
        }
    }
}

/// Statistical corrector configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ScConfig {
    /// Weight table index width.
    #[serde(default = "ScConfig::default_table_bits")]
    pub table_bits: u32,

    /// Global history bits feeding the sum.
    #[serde(default = "ScConfig::default_global_bits")]
    pub global_bits: usize,

    /// Local history bits feeding the sum.
    #[serde(default = "ScConfig::default_local_bits")]
    pub local_bits: usize,
}

impl ScConfig {
    /// Returns the default table index width.
    fn default_table_bits() -> u32 {
        defaults::SC_TABLE_BITS
    }

    /// Returns the default global history input width.
    fn default_global_bits() -> usize {
        defaults::SC_GLOBAL_BITS
    }

    /// Returns the default local history input width.
    fn default_local_bits() -> usize {
        defaults::SC_LOCAL_BITS
    }
}

impl Default for ScConfig {
    fn default() -> Self {
        Self {
            table_bits: defaults::SC_TABLE_BITS,
            global_bits: defaults::SC_GLOBAL_BITS,
            local_bits: defaults::SC_LOCAL_BITS,
        }
    }
}

/// Fetch engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Instructions fetched per cycle.
    #[serde(default = "FetchConfig::default_fetch_width")]
    pub fetch_width: usize,

    /// Instructions sent to decode per cycle.
    #[serde(default = "FetchConfig::default_decode_width")]
    pub decode_width: usize,

    /// Per-thread fetch queue capacity.
    #[serde(default = "FetchConfig::default_fetch_queue_size")]
    pub fetch_queue_size: usize,

    /// Hardware threads.
    #[serde(default = "FetchConfig::default_num_threads")]
    pub num_threads: usize,

    /// Fetch buffer size in bytes.
    #[serde(default = "FetchConfig::default_fetch_buffer_size")]
    pub fetch_buffer_size: usize,

    /// Instruction cache line size in bytes.
    #[serde(default = "FetchConfig::default_cache_line_size")]
    pub cache_line_size: usize,

    /// Thread selection policy.
    #[serde(default)]
    pub smt_fetch_policy: SmtFetchPolicy,
}

impl FetchConfig {
    /// Returns the default fetch width.
    fn default_fetch_width() -> usize {
        defaults::FETCH_WIDTH
    }

    /// Returns the default decode width.
    fn default_decode_width() -> usize {
        defaults::DECODE_WIDTH
    }

    /// Returns the default fetch queue size.
    fn default_fetch_queue_size() -> usize {
        defaults::FETCH_QUEUE_SIZE
    }

    /// Returns the default thread count.
    fn default_num_threads() -> usize {
        defaults::NUM_THREADS
    }

    /// Returns the default fetch buffer size.
    fn default_fetch_buffer_size() -> usize {
        defaults::FETCH_BUFFER_SIZE
    }

    /// Returns the default cache line size.
    fn default_cache_line_size() -> usize {
        defaults::CACHE_LINE_SIZE
    }

    /// Checks fetch geometry.
    ///
    /// The fetch buffer must be wider than one line (every window is split
    /// in two) but no wider than two lines.
    ///
    /// # Errors
    ///
    /// Returns `FrontendError::InvalidConfig` describing the violated rule.
    pub fn validate(&self) -> Result<(), FrontendError> {
        let invalid = |msg: &str| Err(FrontendError::InvalidConfig(msg.to_owned()));
        if self.fetch_width == 0 || self.decode_width == 0 || self.fetch_queue_size == 0 {
            return invalid("fetch/decode widths and fetch queue size must be non-zero");
        }
        if self.num_threads == 0 {
            return invalid("num_threads must be non-zero");
        }
        if !self.cache_line_size.is_power_of_two() {
            return invalid("cache_line_size must be a power of two");
        }
        if self.fetch_buffer_size <= self.cache_line_size
            || self.fetch_buffer_size > 2 * self.cache_line_size
        {
            return invalid("fetch_buffer_size must span more than one and at most two cache lines");
        }
        Ok(())
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            fetch_width: defaults::FETCH_WIDTH,
            decode_width: defaults::DECODE_WIDTH,
            fetch_queue_size: defaults::FETCH_QUEUE_SIZE,
            num_threads: defaults::NUM_THREADS,
            fetch_buffer_size: defaults::FETCH_BUFFER_SIZE,
            cache_line_size: defaults::CACHE_LINE_SIZE,
            smt_fetch_policy: SmtFetchPolicy::default(),
        }
    }
}
