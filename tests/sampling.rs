use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Duration;
use volley::prelude::*;
use volley::{ErrorKind, SeededSampler, SpyDialer, StatsdClient};

mod utils;
use utils::{count_stats, parse_stat, split_packet};

const TRIALS: usize = 20_000;

fn new_sampled_client(rate: f64, seed: u64) -> (crossbeam_channel::Receiver<Vec<u8>>, StatsdClient) {
    let (rx, dialer) = SpyDialer::new();
    let client = StatsdClient::builder_with_dialer(dialer)
        .with_sample_rate(rate)
        .with_sampler(SeededSampler::from_rng(ChaCha8Rng::seed_from_u64(seed)))
        .with_flush_interval(Duration::ZERO)
        .build()
        .unwrap();
    (rx, client)
}

fn run_trials(client: &StatsdClient) {
    for _ in 0..TRIALS {
        client.incr("sampled.counter").unwrap();
    }
    client.flush().unwrap();
}

#[test]
fn test_rate_one_never_drops() {
    let (rx, client) = new_sampled_client(1.0, 1);
    run_trials(&client);
    assert_eq!(TRIALS, count_stats(&rx));
}

#[test]
fn test_rate_zero_always_drops() {
    let (rx, client) = new_sampled_client(0.0, 2);
    run_trials(&client);
    assert_eq!(0, count_stats(&rx));
}

#[test]
fn test_observed_fraction_close_to_rate() {
    for &(rate, seed) in &[(0.1, 3), (0.5, 4), (0.9, 5)] {
        let (rx, client) = new_sampled_client(rate, seed);
        run_trials(&client);

        let observed = count_stats(&rx) as f64 / TRIALS as f64;
        assert!(
            (observed - rate).abs() < 0.02,
            "rate {} observed {}",
            rate,
            observed
        );
    }
}

#[test]
fn test_kept_stats_carry_rate() {
    let (rx, client) = new_sampled_client(0.25, 6);
    run_trials(&client);

    for packet in rx.try_iter() {
        for stat in split_packet(&packet) {
            let parsed = parse_stat(&stat).unwrap();
            assert_eq!(Some(0.25), parsed.rate);
        }
    }
}

#[test]
fn test_same_seed_same_decisions() {
    let (rx_a, client_a) = new_sampled_client(0.5, 7);
    let (rx_b, client_b) = new_sampled_client(0.5, 7);

    for i in 0..1000 {
        client_a.count("c", i).unwrap();
        client_b.count("c", i).unwrap();
    }
    client_a.flush().unwrap();
    client_b.flush().unwrap();

    let a: Vec<Vec<u8>> = rx_a.try_iter().collect();
    let b: Vec<Vec<u8>> = rx_b.try_iter().collect();
    assert_eq!(a, b);
}

#[test]
fn test_rate_out_of_range_is_invalid_input() {
    let (rx, client) = new_sampled_client(1.0, 8);

    for rate in [-0.1, 1.5, f64::NAN] {
        let res = client.incr_with_tags("bad.rate").with_sample_rate(rate).try_send();
        assert_eq!(ErrorKind::InvalidInput, res.unwrap_err().kind());
    }

    client.flush().unwrap();
    assert_eq!(0, count_stats(&rx));
}
