//! # Fetch Collaborator Contract Tests
//!
//! Checks the exact calls fetch makes on its translator, cache port and
//! decoder, using mockall doubles.

use frontsim_core::Fetch;
use frontsim_core::common::VirtAddr;
use frontsim_core::config::FrontendConfig;
use frontsim_core::fetch::{DecodeResult, MemRequest, SplitHalf, StallReason, StaticInst, ThreadStatus};
use mockall::Sequence;

use crate::common::fakes::{FakeDecoder, FakeICache, FakeTranslator};
use crate::common::harness::FrontendHarness;
use crate::common::mocks::{MockICache, MockInstDecoder, MockTlb};

#[test]
fn test_window_translates_first_half_then_second() {
    let mut tlb = MockTlb::new();
    let mut seq = Sequence::new();
    tlb.expect_translate()
        .withf(|req: &MemRequest| req.seq == SplitHalf::First && req.vaddr.val() == 0x1000 && req.size == 64)
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    tlb.expect_translate()
        .withf(|req: &MemRequest| req.seq == SplitHalf::Second && req.vaddr.val() == 0x1040 && req.size == 2)
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());

    let mut fetch = Fetch::new(&FrontendConfig::default(), FakeDecoder::new(), tlb, FakeICache::default()).unwrap();
    fetch.reset_pc(0x1000);
    assert!(fetch.fetch_cache_line(0, VirtAddr::new(0x1000)));
    assert_eq!(fetch.thread(0).map(|t| t.status()), Some(ThreadStatus::ItlbWait));
    fetch.translator_mut().checkpoint();
}

#[test]
fn test_blocked_port_queues_until_retry() {
    let mut icache = MockICache::new();
    icache.expect_is_mem_addr().return_const(true);
    icache.expect_send_timing_req().times(1).return_const(false);

    let mut fetch = Fetch::new(&FrontendConfig::default(), FakeDecoder::new(), FakeTranslator::default(), icache).unwrap();
    fetch.reset_pc(0x1000);
    assert!(fetch.fetch_cache_line(0, VirtAddr::new(0x1000)));
    while let Some(req) = fetch.translator_mut().pending.pop_front() {
        let outcome = fetch.translator().outcome(&req);
        fetch.finish_translation(outcome, req);
    }
    assert!(fetch.cache_blocked());
    assert_eq!(fetch.retry_queue_len(), 2);
    fetch.icache_mut().checkpoint();

    let mut seq = Sequence::new();
    for half in [SplitHalf::First, SplitHalf::Second] {
        fetch
            .icache_mut()
            .expect_send_timing_req()
            .withf(move |pkt| pkt.req.seq == half && pkt.req.paddr.is_some())
            .times(1)
            .in_sequence(&mut seq)
            .return_const(true);
    }
    fetch.recv_req_retry();
    assert!(!fetch.cache_blocked());
    assert_eq!(fetch.thread(0).map(|t| t.status()), Some(ThreadStatus::IcacheWaitResponse));
    fetch.icache_mut().checkpoint();
}

#[test]
fn test_decoder_short_of_bytes_refetches_window() {
    let mut decoder = MockInstDecoder::new();
    let mut calls = 0;
    decoder.expect_decode().returning(move |_, _| {
        calls += 1;
        if calls == 1 {
            DecodeResult::NeedMoreBytes
        } else {
            DecodeResult::Inst(StaticInst::simple(4))
        }
    });
    decoder.expect_fetch_microop().never();
    decoder.expect_reset().never();

    let mut h = FrontendHarness::new(&FrontendConfig::default(), decoder, 0x1000);
    h.run(4);
    assert!(h.delivered.is_empty());
    assert!(!h.thread().buffer().is_valid());
    assert_eq!(h.thread().stall_reason(), StallReason::IcacheStall);

    h.step();
    assert_eq!(h.fetch.stats.cache_lines, 2);
    let out = h.step();
    assert_eq!(out.insts.len(), 8);
    assert_eq!(out.insts[0].pc, 0x1000);
}
