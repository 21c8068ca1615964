use arqlink::sim::{ChannelConfig, Simulation, StationId};
use arqlink::{ArqMode, Config, LinkStats};
use log::{error, info};

const PACKET_COUNT: usize = 500;
const PACKET_SIZE: usize = 200;
const LOSS_RATE: f64 = 0.05;
const CORRUPT_RATE: f64 = 0.02;
const SEED: u64 = 2024;
const DEADLINE_MS: u64 = 24 * 60 * 60 * 1000;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let channel = ChannelConfig::default()
        .with_loss_rate(LOSS_RATE)
        .with_corrupt_rate(CORRUPT_RATE)
        .with_seed(SEED);

    info!(
        "channel: propagation {} ms, transmit {} ms, loss {:.0}%, corruption {:.0}%",
        channel.propagation_ms,
        channel.transmit_ms,
        LOSS_RATE * 100.0,
        CORRUPT_RATE * 100.0
    );

    for mode in [ArqMode::CumulativeNak, ArqMode::GoBackN, ArqMode::SelectiveRepeat] {
        if let Err(e) = run(Config::for_mode(mode), channel) {
            error!("{:?}: {}", mode, e);
        }
    }
}

fn run(config: Config, channel: ChannelConfig) -> arqlink::Result<()> {
    info!(
        "=== {:?}: max_seq {}, window {}, data timeout {} ms ===",
        config.mode, config.max_seq, config.window_size, config.data_timeout_ms
    );

    let mut sim = Simulation::new(config, channel)?;
    let outbound: Vec<Vec<u8>> = (0..PACKET_COUNT)
        .map(|i| {
            let mut packet = vec![(i % 251) as u8; PACKET_SIZE];
            packet[..4].copy_from_slice(&(i as u32).to_be_bytes());
            packet
        })
        .collect();

    for packet in &outbound {
        sim.submit(StationId::A, packet)?;
        sim.submit(StationId::B, packet)?;
    }

    if !sim.run_until_idle(DEADLINE_MS) {
        error!("link did not drain within {} s", DEADLINE_MS / 1000);
    }

    let elapsed = sim.now().max(1) as f64 / 1000.0;
    for id in [StationId::A, StationId::B] {
        let delivered = sim.delivered(id.peer());
        let intact = delivered == outbound.as_slice();
        let bytes = delivered.iter().map(Vec::len).sum::<usize>();

        info!(
            "{:?} -> {:?}: {} of {} packets, in order and intact: {}",
            id,
            id.peer(),
            delivered.len(),
            outbound.len(),
            intact
        );
        info!("  goodput: {:.2} KB/s over {:.1} s", bytes as f64 / 1024.0 / elapsed, elapsed);
        report(sim.engine(id).stats());
    }

    Ok(())
}

fn report(stats: &LinkStats) {
    info!(
        "  sent: {} frames, {} data, {} retransmitted, {} ACK, {} NAK",
        stats.frames_sent, stats.data_sent, stats.retransmissions, stats.acks_sent, stats.naks_sent
    );
    info!(
        "  received: {} frames, {} bad checksum, {} duplicate, {} out of window, {} rejected",
        stats.frames_received,
        stats.checksum_errors,
        stats.duplicates,
        stats.out_of_window,
        stats.rejected
    );
    info!("  stale timer firings: {}", stats.stale_timeouts);
}
