use frontsim_core::FrontendError;
use frontsim_core::common::PhysAddr;
use frontsim_core::config::FrontendConfig;
use frontsim_core::fetch::{
    CommitSignals, DecodeSignals, Decoder, DynInst, Fetch, FetchOutput, FetchThread, Packet, ThreadStatus,
};
use tracing_subscriber::EnvFilter;

use crate::common::fakes::{FakeDecoder, FakeICache, FakeTranslator, mem_bytes};

/// Installs a test-friendly subscriber once; `RUST_LOG` selects the output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Fetch stage wired to a fake translator and cache.
///
/// `step` runs one cycle and then completes every translation and cache
/// access issued during it, which models a zero-latency memory system.
pub struct FrontendHarness<D = FakeDecoder> {
    pub fetch: Fetch<D, FakeTranslator, FakeICache>,
    /// Every instruction handed to decode so far.
    pub delivered: Vec<DynInst>,
}

impl FrontendHarness<FakeDecoder> {
    /// Default configuration, plain 4-byte instructions, starting at `pc`.
    pub fn at(pc: u64) -> Self {
        Self::new(&FrontendConfig::default(), FakeDecoder::new(), pc)
    }
}

impl<D: Decoder> FrontendHarness<D> {
    pub fn new(config: &FrontendConfig, decoder: D, pc: u64) -> Self {
        init_tracing();
        let mut fetch = Fetch::new(config, decoder, FakeTranslator::default(), FakeICache::default())
            .expect("test configuration must be valid");
        fetch.reset_pc(pc);
        Self {
            fetch,
            delivered: Vec::new(),
        }
    }

    pub fn tick(&mut self) -> FetchOutput {
        self.tick_with(&[], &[])
    }

    pub fn tick_with(&mut self, decode: &[DecodeSignals], commit: &[CommitSignals]) -> FetchOutput {
        let out = self.fetch.tick(decode, commit).expect("fetch tick failed");
        self.delivered.extend(out.insts.iter().cloned());
        out
    }

    /// Completes every pending translation in issue order.
    pub fn complete_translations(&mut self) -> usize {
        let mut n = 0;
        while let Some(req) = self.fetch.translator_mut().pending.pop_front() {
            let outcome = self.fetch.translator().outcome(&req);
            self.fetch.finish_translation(outcome, req);
            n += 1;
        }
        n
    }

    /// Packets the cache accepted and has not answered yet.
    pub fn take_sent(&mut self) -> Vec<Packet> {
        self.fetch.icache_mut().sent.drain(..).collect()
    }

    /// Answers `pkt` with the memory content at its address.
    pub fn respond(&mut self, pkt: Packet) -> Result<(), FrontendError> {
        let addr = pkt.req.paddr.map_or(pkt.req.vaddr.val(), PhysAddr::val);
        let data = mem_bytes(addr, pkt.req.size);
        self.fetch.process_cache_completion(pkt.into_response(data))
    }

    pub fn respond_all(&mut self) {
        for pkt in self.take_sent() {
            self.respond(pkt).expect("cache completion failed");
        }
    }

    pub fn step(&mut self) -> FetchOutput {
        self.step_with(&[], &[])
    }

    pub fn step_with(&mut self, decode: &[DecodeSignals], commit: &[CommitSignals]) -> FetchOutput {
        let out = self.tick_with(decode, commit);
        self.complete_translations();
        self.respond_all();
        out
    }

    pub fn run(&mut self, cycles: usize) {
        for _ in 0..cycles {
            self.step();
        }
    }

    /// Thread 0.
    pub fn thread(&self) -> &FetchThread {
        self.fetch.thread(0).expect("thread 0 exists")
    }

    pub fn status(&self) -> ThreadStatus {
        self.thread().status()
    }
}
