//! Scripted fault scenarios, one per ARQ mode.

use arqlink::sim::{ChannelConfig, Fate, Fault, FrameRecord, Simulation, StationId};
use arqlink::{Config, FrameKind, NakState, Seq};

const A: StationId = StationId::A;
const B: StationId = StationId::B;

fn packet(i: u8) -> Vec<u8> {
    vec![b'p', i, i.wrapping_mul(7)]
}

fn submit_all(sim: &mut Simulation, from: StationId, count: u8) {
    for i in 0..count {
        sim.submit(from, &packet(i)).unwrap();
    }
}

fn expected(count: u8) -> Vec<Vec<u8>> {
    (0..count).map(packet).collect()
}

fn frames(sim: &Simulation, from: StationId, kind: FrameKind) -> Vec<FrameRecord> {
    sim.trace()
        .iter()
        .filter(|r| r.from == from && r.kind == kind)
        .copied()
        .collect()
}

fn data_seqs(sim: &Simulation, from: StationId) -> Vec<Seq> {
    frames(sim, from, FrameKind::Data).iter().map(|r| r.seq).collect()
}

#[test]
fn test_selective_repeat_buffers_around_lost_frame() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut sim = Simulation::new(Config::selective_repeat(), ChannelConfig::default()).unwrap();
    sim.add_fault(Fault::drop_frame(A, FrameKind::Data, 1));
    submit_all(&mut sim, A, 4);

    // Well before the retransmission timer of frame 1 expires.
    assert!(!sim.run_until_idle(1_500));
    assert_eq!(sim.delivered(B), expected(1));
    assert_eq!(sim.engine(B).receive_window().expected(), 1);

    let acks: Vec<Seq> = frames(&sim, B, FrameKind::Ack).iter().map(|r| r.ack).collect();
    assert_eq!(acks, [0, 2, 3]);
    assert_eq!(sim.engine(A).send_window().base(), 1);

    assert!(sim.run_until_idle(60_000));
    assert_eq!(sim.delivered(B), expected(4));
    assert_eq!(data_seqs(&sim, A), [0, 1, 2, 3, 1]);
    assert_eq!(sim.engine(A).stats().retransmissions, 1);
    assert_eq!(sim.engine(A).outstanding_count(), 0);
    assert_eq!(sim.engine(A).send_window().base(), 4);
    assert_eq!(sim.engine(B).stats().naks_sent, 0);
}

#[test]
fn test_go_back_n_nak_resends_window() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut sim = Simulation::new(Config::go_back_n(), ChannelConfig::default()).unwrap();
    sim.add_fault(Fault::corrupt_frame(A, FrameKind::Data, 2));
    submit_all(&mut sim, A, 5);

    assert!(sim.run_until_idle(60_000));

    // One NAK, naming the last in-order frame, so the sender resumes at 2.
    let naks = frames(&sim, B, FrameKind::Nak);
    assert_eq!(naks.len(), 1);
    assert_eq!(naks[0].ack, 1);

    let data = frames(&sim, A, FrameKind::Data);
    assert_eq!(data_seqs(&sim, A), [0, 1, 2, 3, 4, 2, 3, 4]);
    assert_eq!(data[2].fate, Fate::Corrupted);
    assert!(data[5..].iter().all(|r| r.at > naks[0].at));

    assert_eq!(sim.delivered(B), expected(5));
    assert_eq!(sim.engine(B).stats().checksum_errors, 1);
    assert_eq!(sim.engine(B).stats().rejected, 2);
    assert_eq!(sim.engine(A).stats().retransmissions, 3);
    assert_eq!(sim.engine(A).outstanding_count(), 0);
}

#[test]
fn test_cumulative_nak_sent_once_for_consecutive_errors() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut sim = Simulation::new(Config::cumulative_nak(), ChannelConfig::default()).unwrap();
    sim.add_fault(Fault::corrupt_frame(A, FrameKind::Data, 1));
    sim.add_fault(Fault::corrupt_frame(A, FrameKind::Data, 2));
    submit_all(&mut sim, A, 3);

    // Both damaged frames have arrived; the NAK is still in flight.
    assert!(!sim.run_until_idle(145));
    assert_eq!(sim.engine(B).stats().checksum_errors, 2);
    assert_eq!(sim.engine(B).stats().naks_sent, 1);
    assert_eq!(sim.engine(B).nak_state(), NakState::NakSent);

    // The NAK asks for frame 1 only; its arrival clears suppression.
    assert!(!sim.run_until_idle(1_000));
    assert_eq!(sim.delivered(B), expected(2));
    assert_eq!(sim.engine(B).nak_state(), NakState::Clear);

    // Frame 2 waits for its own timer.
    assert!(sim.run_until_idle(60_000));
    assert_eq!(frames(&sim, B, FrameKind::Nak).len(), 1);
    assert_eq!(sim.delivered(B), expected(3));
    assert_eq!(data_seqs(&sim, A), [0, 1, 2, 1, 2]);
}

#[test]
fn test_lost_ack_recovered_without_duplicate_delivery() {
    let _ = env_logger::builder().is_test(true).try_init();

    for config in [Config::cumulative_nak(), Config::go_back_n(), Config::selective_repeat()] {
        let mut sim = Simulation::new(config, ChannelConfig::default()).unwrap();
        sim.add_fault(Fault::drop_frame(B, FrameKind::Ack, 0));
        submit_all(&mut sim, A, 1);

        assert!(sim.run_until_idle(60_000), "{:?}", config.mode);
        assert_eq!(sim.delivered(B), expected(1), "{:?}", config.mode);
        assert_eq!(data_seqs(&sim, A), [0, 0], "{:?}", config.mode);
        assert_eq!(sim.engine(A).outstanding_count(), 0, "{:?}", config.mode);
        assert_eq!(sim.engine(B).receive_window().expected(), 1, "{:?}", config.mode);
    }
}

#[test]
fn test_acks_piggyback_on_reverse_traffic() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut sim = Simulation::new(Config::cumulative_nak(), ChannelConfig::default()).unwrap();
    submit_all(&mut sim, A, 20);
    submit_all(&mut sim, B, 20);

    assert!(sim.run_until_idle(60_000));
    assert_eq!(sim.delivered(A), expected(20));
    assert_eq!(sim.delivered(B), expected(20));

    // Later data frames carry acknowledgments of earlier reverse traffic.
    let last = *frames(&sim, B, FrameKind::Data).last().unwrap();
    assert_ne!(last.ack, Config::cumulative_nak().max_seq);
    assert!(sim.engine(A).stats().acks_sent + sim.engine(B).stats().acks_sent < 10);
}
