//! Poseidon2 Hash
//!
//! Poseidon2 over the BN254 scalar field, instantiated exactly like the
//! proving circuit's standard library so that hashes computed here and
//! in-circuit agree bit for bit.
//!
//! ```text
//! state width t = 4, S-box x^5
//! 4 full rounds | 56 partial rounds | 4 full rounds
//! external layer: M4     internal layer: 1 + diag(mu - 1)
//!
//! hash_n(x1..xn) = Permute([x1, .., xn, 0.., n * 2^64])[0]   (rate 3, capacity 1)
//! ```
//!
//! Round constants come from the Grain LFSR seeded with (n = 254, t = 4,
//! R_F = 8, R_P = 56). Poseidon2 draws `R_F * t + R_P` values from that
//! stream: a full row per full round and a single value per partial round.

use std::sync::LazyLock;

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::poseidon::find_poseidon_ark_and_mds;
use ark_ff::{AdditiveGroup, BigInt, Field};

/// Permutation state width
pub const STATE_WIDTH: usize = 4;

/// Sponge rate (one lane is capacity)
pub const RATE: usize = 3;

/// Full rounds, split evenly before and after the partial rounds
pub const FULL_ROUNDS: usize = 8;

/// Partial rounds (S-box on lane 0 only)
pub const PARTIAL_ROUNDS: usize = 56;

const HALF_FULL_ROUNDS: usize = FULL_ROUNDS / 2;

/// Bit length of the BN254 scalar field modulus
const PRIME_BITS: u64 = 254;

/// Internal matrix diagonal minus one (mu_i - 1)
const INTERNAL_DIAGONAL_M1: [Fr; STATE_WIDTH] = [
    hex_constant("0x10dc6e9c006ea38b04b1e03b4bd9490c0d03f98929ca1d7fb56821fd19d3b6e7"),
    hex_constant("0x0c28145b6a44df3e0149b3d0a30b3bb599df9756d4dd9b84a86b38cfb45a740b"),
    hex_constant("0x00544b8338791518b2c7645a50392798b21f75bb60e3596170067d00141cac15"),
    hex_constant("0x222c01175718386f2e2e82eb122789e352e105a3b8fa852613bc534433ee428b"),
];

/// Decode a `0x`-prefixed hex literal into a field element at compile time
const fn hex_constant(literal: &str) -> Fr {
    let bytes = literal.as_bytes();
    let mut limbs = [0u64; 4];
    let digits = bytes.len() - 2;
    let mut k = 0;
    while k < digits {
        let c = bytes[bytes.len() - 1 - k];
        let nibble = match c {
            b'0'..=b'9' => c - b'0',
            b'a'..=b'f' => c - b'a' + 10,
            b'A'..=b'F' => c - b'A' + 10,
            _ => panic!("invalid hex digit in constant"),
        };
        limbs[k / 16] |= (nibble as u64) << ((k % 16) * 4);
        k += 1;
    }
    Fr::new(BigInt::new(limbs))
}

/// Round constants for the permutation
struct Poseidon2Params {
    initial: [[Fr; STATE_WIDTH]; HALF_FULL_ROUNDS],
    partial: [Fr; PARTIAL_ROUNDS],
    terminal: [[Fr; STATE_WIDTH]; HALF_FULL_ROUNDS],
}

static PARAMS: LazyLock<Poseidon2Params> = LazyLock::new(Poseidon2Params::generate);

impl Poseidon2Params {
    fn generate() -> Self {
        // The Grain stream is identical to Poseidon's for the same header, so
        // arkworks' generator yields it row by row; we only re-slice it.
        let (ark, _mds) = find_poseidon_ark_and_mds::<Fr>(
            PRIME_BITS,
            RATE,
            FULL_ROUNDS as u64,
            PARTIAL_ROUNDS as u64,
            0,
        );
        let stream: Vec<Fr> = ark.into_iter().flatten().collect();

        let partial_start = HALF_FULL_ROUNDS * STATE_WIDTH;
        let terminal_start = partial_start + PARTIAL_ROUNDS;

        Self {
            initial: std::array::from_fn(|r| {
                std::array::from_fn(|i| stream[r * STATE_WIDTH + i])
            }),
            partial: std::array::from_fn(|r| stream[partial_start + r]),
            terminal: std::array::from_fn(|r| {
                std::array::from_fn(|i| stream[terminal_start + r * STATE_WIDTH + i])
            }),
        }
    }
}

/// x -> x^5
fn sbox(x: Fr) -> Fr {
    let x2 = x.square();
    x2.square() * x
}

/// External linear layer: the 4x4 matrix
///
/// ```text
/// [5 7 1 3]
/// [4 6 1 1]
/// [1 3 5 7]
/// [1 1 4 6]
/// ```
fn matmul_external(state: &mut [Fr; STATE_WIDTH]) {
    let [a, b, c, d] = *state;
    let t0 = a + b;
    let t1 = c + d;
    let t2 = b.double() + t1;
    let t3 = d.double() + t0;
    let t4 = t1.double().double() + t3;
    let t5 = t0.double().double() + t2;
    let t6 = t3 + t5;
    let t7 = t2 + t4;
    *state = [t6, t5, t7, t4];
}

/// Internal linear layer: x_i <- x_i * (mu_i - 1) + sum(x)
fn matmul_internal(state: &mut [Fr; STATE_WIDTH]) {
    let sum: Fr = state.iter().sum();
    for (lane, diag) in state.iter_mut().zip(INTERNAL_DIAGONAL_M1.iter()) {
        *lane = *lane * diag + sum;
    }
}

fn full_round(state: &mut [Fr; STATE_WIDTH], constants: &[Fr; STATE_WIDTH]) {
    for (lane, rc) in state.iter_mut().zip(constants.iter()) {
        *lane = sbox(*lane + rc);
    }
    matmul_external(state);
}

/// The Poseidon2 permutation on a width-4 state
pub fn permutation(input: [Fr; STATE_WIDTH]) -> [Fr; STATE_WIDTH] {
    let params = &*PARAMS;
    let mut state = input;

    matmul_external(&mut state);

    for constants in &params.initial {
        full_round(&mut state, constants);
    }

    for rc in &params.partial {
        state[0] = sbox(state[0] + rc);
        matmul_internal(&mut state);
    }

    for constants in &params.terminal {
        full_round(&mut state, constants);
    }

    state
}

/// Fixed-length sponge (rate 3, capacity 1), IV = len * 2^64
struct Sponge {
    state: [Fr; STATE_WIDTH],
    cache: [Fr; RATE],
    cache_size: usize,
}

impl Sponge {
    fn new(message_len: usize) -> Self {
        let two_pow_64 = Fr::from(1u128 << 64);
        let mut state = [Fr::ZERO; STATE_WIDTH];
        state[RATE] = Fr::from(message_len as u64) * two_pow_64;

        Self {
            state,
            cache: [Fr::ZERO; RATE],
            cache_size: 0,
        }
    }

    fn duplex(&mut self) {
        for (lane, cached) in self
            .state
            .iter_mut()
            .zip(self.cache.iter())
            .take(self.cache_size)
        {
            *lane += cached;
        }
        self.state = permutation(self.state);
    }

    fn absorb(&mut self, input: Fr) {
        if self.cache_size == RATE {
            self.duplex();
            self.cache = [Fr::ZERO; RATE];
            self.cache[0] = input;
            self.cache_size = 1;
        } else {
            self.cache[self.cache_size] = input;
            self.cache_size += 1;
        }
    }

    fn squeeze(mut self) -> Fr {
        self.duplex();
        self.state[0]
    }
}

fn hash_fixed(inputs: &[Fr]) -> Fr {
    let mut sponge = Sponge::new(inputs.len());
    for input in inputs {
        sponge.absorb(*input);
    }
    sponge.squeeze()
}

/// Two-input hash (tree nodes, curve points)
pub fn hash2(a: Fr, b: Fr) -> Fr {
    hash_fixed(&[a, b])
}

/// Three-input hash (spending key, nonce commitment)
pub fn hash3(a: Fr, b: Fr, c: Fr) -> Fr {
    hash_fixed(&[a, b, c])
}
