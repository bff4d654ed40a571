//! End-to-end exchanges of the solver protocol.

mod test_utils;

use rand::{CryptoRng, RngCore};
use test_utils::{keypair, parameters, seeded_rng};
use tumbler_crypto::{PuzzleSolution, PuzzleValue, XorKey};
use tumbler_protocol::solver::{SolverClientSession, SolverServerSession};
use tumbler_protocol::Error;

fn fresh_puzzle(rng: &mut (impl CryptoRng + RngCore)) -> (PuzzleSolution, PuzzleValue) {
    let pk = keypair().public_key().clone();
    let solution = pk.random_solution(rng);
    let puzzle = pk.encrypt(&solution).unwrap();
    (solution, puzzle)
}

#[test]
fn complete_exchange_recovers_the_solution() {
    let mut rng = seeded_rng();
    let (secret, puzzle) = fresh_puzzle(&mut rng);

    let mut client = SolverClientSession::new(parameters(3, 2));
    let mut server = SolverServerSession::new(parameters(3, 2), keypair()).unwrap();

    client.accept_puzzle(puzzle).unwrap();
    let batch = client.generate_puzzles(&mut rng).unwrap();
    let commitments = server.solve_puzzles(&mut rng, &batch).unwrap();
    let revelation = client.reveal(&commitments).unwrap();
    let fake_keys = server.check_revelation(&revelation).unwrap();
    let blind_factors = client.check_fake_solutions(&fake_keys).unwrap();
    let real_keys = server.check_blind_factors(&blind_factors).unwrap();
    let solution = client.check_solutions(&real_keys).unwrap();

    assert_eq!(solution, secret);
    assert_eq!(client.solution().unwrap(), &secret);
}

#[test]
fn degenerate_exchange_without_decoys_still_completes() {
    let mut rng = seeded_rng();
    let (secret, puzzle) = fresh_puzzle(&mut rng);

    let mut client = SolverClientSession::new(parameters(1, 0));
    let mut server = SolverServerSession::new(parameters(1, 0), keypair()).unwrap();

    client.accept_puzzle(puzzle).unwrap();
    let batch = client.generate_puzzles(&mut rng).unwrap();
    let commitments = server.solve_puzzles(&mut rng, &batch).unwrap();
    let revelation = client.reveal(&commitments).unwrap();
    assert!(revelation.fake_indexes.is_empty());
    let fake_keys = server.check_revelation(&revelation).unwrap();
    let blind_factors = client.check_fake_solutions(&fake_keys).unwrap();
    let real_keys = server.check_blind_factors(&blind_factors).unwrap();

    assert_eq!(client.check_solutions(&real_keys).unwrap(), secret);
}

#[test]
fn substituted_decoy_keys_are_detected() {
    let mut rng = seeded_rng();
    let (_, puzzle) = fresh_puzzle(&mut rng);

    let mut client = SolverClientSession::new(parameters(2, 2));
    let mut server = SolverServerSession::new(parameters(2, 2), keypair()).unwrap();

    client.accept_puzzle(puzzle).unwrap();
    let batch = client.generate_puzzles(&mut rng).unwrap();
    let commitments = server.solve_puzzles(&mut rng, &batch).unwrap();
    let revelation = client.reveal(&commitments).unwrap();
    let mut fake_keys = server.check_revelation(&revelation).unwrap();

    // A key the server did not commit to fails the hash check.
    fake_keys[0] = XorKey::random(&mut rng);
    assert_eq!(
        client.check_fake_solutions(&fake_keys),
        Err(Error::InvalidProof("key does not match its committed hash"))
    );
}

#[test]
fn substituted_real_keys_are_detected() {
    let mut rng = seeded_rng();
    let (_, puzzle) = fresh_puzzle(&mut rng);

    let mut client = SolverClientSession::new(parameters(2, 1));
    let mut server = SolverServerSession::new(parameters(2, 1), keypair()).unwrap();

    client.accept_puzzle(puzzle).unwrap();
    let batch = client.generate_puzzles(&mut rng).unwrap();
    let commitments = server.solve_puzzles(&mut rng, &batch).unwrap();
    let revelation = client.reveal(&commitments).unwrap();
    let fake_keys = server.check_revelation(&revelation).unwrap();
    let blind_factors = client.check_fake_solutions(&fake_keys).unwrap();
    let mut real_keys = server.check_blind_factors(&blind_factors).unwrap();

    real_keys[0] = XorKey::random(&mut rng);
    assert_eq!(
        client.check_solutions(&real_keys),
        Err(Error::InvalidProof("key does not match its committed hash"))
    );
}

#[test]
fn sessions_survive_serialization_between_round_trips() {
    let mut rng = seeded_rng();
    let (secret, puzzle) = fresh_puzzle(&mut rng);

    let mut client = SolverClientSession::new(parameters(2, 2));
    let mut server = SolverServerSession::new(parameters(2, 2), keypair()).unwrap();

    client.accept_puzzle(puzzle).unwrap();
    let batch = client.generate_puzzles(&mut rng).unwrap();

    // Persist and restore both sessions mid-protocol.
    let mut server: SolverServerSession =
        bincode::deserialize(&bincode::serialize(&server).unwrap()).unwrap();
    let commitments = server.solve_puzzles(&mut rng, &batch).unwrap();

    let mut client: SolverClientSession =
        bincode::deserialize(&bincode::serialize(&client).unwrap()).unwrap();
    let revelation = client.reveal(&commitments).unwrap();
    let fake_keys = server.check_revelation(&revelation).unwrap();
    let blind_factors = client.check_fake_solutions(&fake_keys).unwrap();
    let real_keys = server.check_blind_factors(&blind_factors).unwrap();

    assert_eq!(client.check_solutions(&real_keys).unwrap(), secret);
}

#[test]
fn completed_sessions_reject_further_messages() {
    let mut rng = seeded_rng();
    let (_, puzzle) = fresh_puzzle(&mut rng);

    let mut client = SolverClientSession::new(parameters(1, 1));
    let mut server = SolverServerSession::new(parameters(1, 1), keypair()).unwrap();

    client.accept_puzzle(puzzle).unwrap();
    let batch = client.generate_puzzles(&mut rng).unwrap();
    let commitments = server.solve_puzzles(&mut rng, &batch).unwrap();
    let revelation = client.reveal(&commitments).unwrap();
    let fake_keys = server.check_revelation(&revelation).unwrap();
    let blind_factors = client.check_fake_solutions(&fake_keys).unwrap();
    let real_keys = server.check_blind_factors(&blind_factors).unwrap();
    let _ = client.check_solutions(&real_keys).unwrap();

    assert!(matches!(
        server.solve_puzzles(&mut rng, &batch),
        Err(Error::InvalidState {
            expected: "WaitingPuzzles",
            actual: "Completed",
        })
    ));
    assert!(matches!(
        client.check_solutions(&real_keys),
        Err(Error::InvalidState { .. })
    ));
}
