//! Reference vector generator for Aether.
//!
//! Emits `tests/fixtures/test_vectors.json` covering ticket seed commitments,
//! loot rolls, weighted tier selection, blueprint selection, loot asset ids,
//! account addresses, and contract addresses. Other implementations of the loot resolver check
//! themselves against these vectors.
//!
//! Usage:
//!   aether-testvec              # Generate test_vectors.json
//!   aether-testvec --verify     # Verify the committed vectors still hold

use std::collections::BTreeMap;
use std::path::Path;

use aether_crypto::ed25519;
use aether_lootbox::resolution::{self, BLUEPRINT_LABEL, TIER_LABEL};
use aether_lootbox::tickets::derive_seed_commitment;
use aether_registry::derive_contract_address;
use aether_types::Address;
use serde::{Deserialize, Serialize};

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/test_vectors.json");

#[derive(Serialize, Deserialize)]
struct TestVectors {
    version: String,
    generated_by: String,
    vectors: BTreeMap<String, TestVector>,
}

#[derive(Serialize, Deserialize)]
struct TestVector {
    description: String,
    inputs: BTreeMap<String, String>,
    outputs: BTreeMap<String, String>,
}

fn entry(pairs: &[(&str, String)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

fn join<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn generate_selection_vectors() -> BTreeMap<String, TestVector> {
    let mut vectors = BTreeMap::new();

    let weights = [100u64, 50, 20, 5, 2];
    let rolls = [0u64, 99, 100, 149, 150, 169, 170, 174, 175, 176, 177, u64::MAX];
    let indices: Vec<String> = rolls
        .iter()
        .map(|r| {
            resolution::select_tier(&weights, *r)
                .map_or_else(|| "none".to_string(), |i| i.to_string())
        })
        .collect();
    vectors.insert(
        "select_tier_weighted".to_string(),
        TestVector {
            description: "first tier i with roll % sum(w) < w_0 + ... + w_i, registration order"
                .to_string(),
            inputs: entry(&[("weights", join(&weights)), ("rolls", join(&rolls))]),
            outputs: entry(&[("indices", indices.join(","))]),
        },
    );

    let count = 3usize;
    let rolls = [0u64, 1, 2, 3, u64::MAX];
    let indices: Vec<String> = rolls
        .iter()
        .map(|r| {
            resolution::select_blueprint(count, *r)
                .map_or_else(|| "none".to_string(), |i| i.to_string())
        })
        .collect();
    vectors.insert(
        "select_blueprint_uniform".to_string(),
        TestVector {
            description: "blueprint index = roll % count, count = 3".to_string(),
            inputs: entry(&[("count", count.to_string()), ("rolls", join(&rolls))]),
            outputs: entry(&[("indices", indices.join(","))]),
        },
    );

    vectors
}

fn generate_derivation_vectors() -> BTreeMap<String, TestVector> {
    let mut vectors = BTreeMap::new();

    // Ticket seed commitment over a fixed nonce
    let buyer = Address([0x42; 20]);
    let nonce = [0x07u8; 32];
    let commitment = derive_seed_commitment(b"box", &buyer, 0, &nonce);
    vectors.insert(
        "ticket_seed_commitment".to_string(),
        TestVector {
            description: "BLAKE3::derive_key(\"Aether v1 ticket-seed\", LE32-framed(label, buyer, LE64(seq), nonce))"
                .to_string(),
            inputs: entry(&[
                ("label", "box".to_string()),
                ("buyer", hex::encode(buyer.as_bytes())),
                ("sequence", "0".to_string()),
                ("nonce", hex::encode(nonce)),
            ]),
            outputs: entry(&[("seed_commitment", hex::encode(commitment))]),
        },
    );

    // Loot rolls keyed by the same nonce
    let tier_roll = resolution::roll(&nonce, TIER_LABEL, b"seed");
    let blueprint_roll = resolution::roll(&nonce, BLUEPRINT_LABEL, b"seed");
    vectors.insert(
        "loot_rolls".to_string(),
        TestVector {
            description: "LE64(BLAKE3::keyed_hash(nonce, label || seed)[0..8])".to_string(),
            inputs: entry(&[
                ("nonce", hex::encode(nonce)),
                ("seed", "seed".to_string()),
            ]),
            outputs: entry(&[
                ("tier_roll", tier_roll.to_string()),
                ("blueprint_roll", blueprint_roll.to_string()),
            ]),
        },
    );

    // Loot asset identifier
    let asset_id = resolution::derive_loot_asset_id(0b100, 2, 7);
    vectors.insert(
        "loot_asset_id".to_string(),
        TestVector {
            description:
                "BLAKE3::derive_key(\"Aether v1 loot-asset-id\", LE32-framed(mask, index, instance))"
                    .to_string(),
            inputs: entry(&[
                ("tier_mask", "4".to_string()),
                ("blueprint_index", "2".to_string()),
                ("instance", "7".to_string()),
            ]),
            outputs: entry(&[("asset_id", hex::encode(asset_id.as_bytes()))]),
        },
    );

    // Account address from the all-zero secret key
    let kp = ed25519::KeyPair::from_bytes(&[0u8; 32]);
    let address = ed25519::derive_address_bytes(&kp.verifying_key);
    vectors.insert(
        "address_derivation".to_string(),
        TestVector {
            description: "address = BLAKE3::hash(public_key)[12..32]".to_string(),
            inputs: entry(&[("public_key", hex::encode(kp.verifying_key.to_bytes()))]),
            outputs: entry(&[("address", hex::encode(address))]),
        },
    );

    // Contract address of the default loot collection
    let contract = derive_contract_address("Aether Loot", "ALOOT");
    vectors.insert(
        "contract_address".to_string(),
        TestVector {
            description:
                "BLAKE3::derive_key(\"Aether v1 contract-address\", LE32-framed(name, symbol))[12..32]"
                    .to_string(),
            inputs: entry(&[
                ("name", "Aether Loot".to_string()),
                ("symbol", "ALOOT".to_string()),
            ]),
            outputs: entry(&[("address", hex::encode(contract.as_bytes()))]),
        },
    );

    vectors
}

fn generate_all_vectors() -> TestVectors {
    let mut all_vectors = BTreeMap::new();
    all_vectors.extend(generate_selection_vectors());
    all_vectors.extend(generate_derivation_vectors());

    TestVectors {
        version: "1.0".to_string(),
        generated_by: "aether-testvec".to_string(),
        vectors: all_vectors,
    }
}

/// Check every vector in `expected` against a fresh generation.
///
/// Vectors absent from `expected` are not checked.
fn verify_vectors(expected: &TestVectors) -> bool {
    let regenerated = generate_all_vectors();
    let mut all_pass = true;

    for (name, vector) in &expected.vectors {
        match regenerated.vectors.get(name) {
            Some(actual) if actual.outputs == vector.outputs => eprintln!("PASS: {name}"),
            Some(actual) => {
                eprintln!("FAIL: {name}");
                eprintln!("  expected: {:?}", vector.outputs);
                eprintln!("  actual:   {:?}", actual.outputs);
                all_pass = false;
            }
            None => {
                eprintln!("MISSING: {name}");
                all_pass = false;
            }
        }
    }
    all_pass
}

fn main() -> anyhow::Result<()> {
    let verify = std::env::args().any(|a| a == "--verify");

    if verify {
        let content = std::fs::read_to_string(FIXTURE)?;
        let vectors: TestVectors = serde_json::from_str(&content)?;
        if !verify_vectors(&vectors) {
            anyhow::bail!("test vector verification failed");
        }
        eprintln!("All {} test vectors verified.", vectors.vectors.len());
        return Ok(());
    }

    let vectors = generate_all_vectors();
    if let Some(parent) = Path::new(FIXTURE).parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(FIXTURE, serde_json::to_string_pretty(&vectors)?)?;
    eprintln!("Generated {} test vectors to {FIXTURE}", vectors.vectors.len());

    if !verify_vectors(&vectors) {
        anyhow::bail!("self-verification failed");
    }
    Ok(())
}
