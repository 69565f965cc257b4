//! Integration test: the daemon's JSON-RPC surface.
//!
//! Drives the collection and loot box through `dispatch_request` exactly
//! as a socket client would, decrypts results with signed grants over RPC,
//! and checks error codes. The last test runs a real Unix socket server
//! and receives pushed event notifications.

use std::sync::Arc;
use std::time::Duration;

use aether_daemon::commands::access::grant_to_json;
use aether_daemon::config::{BlueprintBootstrap, DaemonConfig, TierBootstrap};
use aether_daemon::rpc::{dispatch_request, RpcRequest, RpcServer, Session};
use aether_daemon::DaemonState;
use aether_fhe::Plaintext;
use aether_integration_tests::{Account, TEST_TIMESTAMP};
use aether_registry::ErrorBit;
use aether_types::Address;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

const PRICE: u64 = 100;

fn config(admin: &Account) -> DaemonConfig {
    let mut config = DaemonConfig::default();
    config.lootbox.admin = admin.address.to_string();
    config.lootbox.ticket_price = PRICE;
    config.lootbox.tiers = vec![TierBootstrap {
        name: "common".to_string(),
        weight: 10,
        mask: None,
        blueprints: vec![BlueprintBootstrap {
            name: "shield".to_string(),
            max_supply: 2,
        }],
    }];
    config
}

struct Client {
    state: Arc<DaemonState>,
    session: Session,
    next_id: u64,
}

impl Client {
    fn new(config: DaemonConfig) -> Self {
        Self {
            state: Arc::new(DaemonState::new(config).expect("daemon state")),
            session: Session::default(),
            next_id: 0,
        }
    }

    async fn raw(&mut self, method: &str, params: Value) -> (Option<Value>, Option<i32>) {
        self.next_id += 1;
        let request = RpcRequest {
            jsonrpc: "2.0".to_string(),
            id: json!(self.next_id),
            method: method.to_string(),
            params,
        };
        let response = dispatch_request(&self.state, request, &mut self.session).await;
        assert_eq!(response.id, json!(self.next_id));
        (response.result, response.error.map(|e| e.code))
    }

    async fn call(&mut self, method: &str, params: Value) -> Value {
        match self.raw(method, params).await {
            (Some(result), None) => result,
            (_, code) => panic!("{method} failed with {code:?}"),
        }
    }

    async fn error_code(&mut self, method: &str, params: Value) -> i32 {
        match self.raw(method, params).await {
            (None, Some(code)) => code,
            (result, _) => panic!("{method} unexpectedly returned {result:?}"),
        }
    }

    async fn decrypt(&mut self, who: &Account, contract: Address, handle: &Value) -> Plaintext {
        let result = self
            .call(
                "user_decrypt",
                json!({
                    "handle": handle,
                    "contract": contract.to_string(),
                    "grant": grant_to_json(&who.grant(contract)),
                    "now": TEST_TIMESTAMP,
                }),
            )
            .await;
        serde_json::from_value(result).expect("plaintext")
    }

    async fn mask_bits(&mut self, who: &Account, contract: Address, receipt: &Value) -> Vec<ErrorBit> {
        match self.decrypt(who, contract, &receipt["error"]["mask"]).await {
            Plaintext::Uint8(mask) => ErrorBit::decode(mask),
            other => panic!("mask decrypted to {other:?}"),
        }
    }
}

/// One newline-delimited request.
fn frame(request: Value) -> String {
    let mut line = request.to_string();
    line.push('\n');
    line
}

fn contract(value: &Value, key: &str) -> Address {
    serde_json::from_value(value[key].clone()).expect("contract address")
}

#[tokio::test]
async fn collection_over_rpc() {
    let admin = Account::new("admin", 0xAD);
    let alice = Account::new("alice", 0xA1);
    let bob = Account::new("bob", 0xB0);
    let mut client = Client::new(config(&admin));

    assert_eq!(client.call("name", json!({})).await, json!("Aether"));
    assert_eq!(client.call("symbol", json!({})).await, json!("AETH"));
    let contracts = client.call("get_contracts", json!({})).await;
    let collection = contract(&contracts, "collection");
    assert_ne!(collection, contract(&contracts, "lootbox"));

    // =========================================================
    // Mint and transfer
    // =========================================================
    let receipt = client
        .call(
            "mint",
            json!({ "caller": alice.address.to_string(), "to": alice.address.to_string(), "asset_id": 42 }),
        )
        .await;
    assert!(client.mask_bits(&alice, collection, &receipt).await.is_empty());

    let receipt = client
        .call(
            "transfer_from",
            json!({
                "caller": alice.address.to_string(),
                "from": alice.address.to_string(),
                "to": bob.address.to_string(),
                "asset_id": 42,
            }),
        )
        .await;
    assert!(client.mask_bits(&alice, collection, &receipt).await.is_empty());

    let receipt = client
        .call(
            "balance_of",
            json!({ "caller": bob.address.to_string(), "account": bob.address.to_string() }),
        )
        .await;
    let balance = client
        .decrypt(&bob, collection, &receipt["result"]["balance"])
        .await;
    assert_eq!(balance, Plaintext::Uint64(1));

    let receipt = client
        .call(
            "owner_of",
            json!({ "caller": bob.address.to_string(), "asset_id": 42 }),
        )
        .await;
    let owner = client.decrypt(&bob, collection, &receipt["result"]["owner"]).await;
    assert_eq!(owner, Plaintext::Address(bob.address));

    // =========================================================
    // A stranger's transfer succeeds at the RPC level only
    // =========================================================
    let receipt = client
        .call(
            "transfer_from",
            json!({
                "caller": alice.address.to_string(),
                "from": bob.address.to_string(),
                "to": alice.address.to_string(),
                "asset_id": 42,
            }),
        )
        .await;
    assert_eq!(
        client.mask_bits(&alice, collection, &receipt).await,
        vec![ErrorBit::Unauthorized]
    );

    // =========================================================
    // Decryption refusals map to their codes
    // =========================================================
    let receipt = client
        .call(
            "balance_of",
            json!({ "caller": bob.address.to_string(), "account": bob.address.to_string() }),
        )
        .await;
    let code = client
        .error_code(
            "user_decrypt",
            json!({
                "handle": receipt["result"]["balance"],
                "contract": collection.to_string(),
                "grant": grant_to_json(&alice.grant(collection)),
                "now": TEST_TIMESTAMP,
            }),
        )
        .await;
    assert_eq!(code, -32061);

    // A grant presented long after it expired.
    let code = client
        .error_code(
            "user_decrypt",
            json!({
                "handle": receipt["result"]["balance"],
                "contract": collection.to_string(),
                "grant": grant_to_json(&bob.grant(collection)),
                "now": TEST_TIMESTAMP + 30 * 86_400,
            }),
        )
        .await;
    assert_eq!(code, -32062);
}

#[tokio::test]
async fn lootbox_over_rpc() {
    let admin = Account::new("admin", 0xAD);
    let buyer = Account::new("buyer", 0xB7);
    let mut client = Client::new(config(&admin));
    let contracts = client.call("get_contracts", json!({})).await;
    let lootbox = contract(&contracts, "lootbox");

    // Bootstrap tiers are registered.
    let tiers = client.call("get_tiers", json!({})).await;
    assert_eq!(tiers.as_array().map(Vec::len), Some(1));
    assert_eq!(tiers[0]["name"], json!("common"));
    assert_eq!(
        client
            .call("get_tier_blueprint_count", json!({ "tier_weight": 10 }))
            .await,
        json!(1)
    );

    // =========================================================
    // Administration is restricted
    // =========================================================
    let code = client
        .error_code(
            "add_tier",
            json!({ "caller": buyer.address.to_string(), "name": "rare", "weight": 1 }),
        )
        .await;
    assert_eq!(code, -32010);
    let added = client
        .call(
            "add_tier",
            json!({ "caller": admin.address.to_string(), "name": "rare", "weight": 1, "mask": 4 }),
        )
        .await;
    assert_eq!(added, json!({ "mask": 4 }));
    let code = client
        .error_code(
            "add_tier",
            json!({ "caller": admin.address.to_string(), "name": "rare", "weight": 2 }),
        )
        .await;
    assert_eq!(code, -32020);

    // =========================================================
    // Tickets
    // =========================================================
    let code = client
        .error_code(
            "buy_ticket",
            json!({ "caller": buyer.address.to_string(), "label": "box", "amount": 3, "payment": 299 }),
        )
        .await;
    assert_eq!(code, -32040);
    let purchase = client
        .call(
            "buy_ticket",
            json!({ "caller": buyer.address.to_string(), "label": "box", "amount": 3, "payment": "350" }),
        )
        .await;
    assert_eq!(purchase["tickets"].as_array().map(Vec::len), Some(3));
    assert_eq!(
        client
            .call("pending_tickets", json!({ "caller": buyer.address.to_string() }))
            .await,
        json!(3)
    );

    let refund = client
        .call("refund_ticket", json!({ "caller": buyer.address.to_string() }))
        .await;
    assert_eq!(refund, json!({ "refund": "100" }));

    let zero = Address::ZERO.to_string();
    let code = client
        .error_code(
            "buy_ticket",
            json!({ "caller": zero, "label": "box", "amount": 1, "payment": "100" }),
        )
        .await;
    assert_eq!(code, -32043);

    // =========================================================
    // Loot: the "rare" tier has no blueprints, so keep rolling
    // until the common tier is hit or the empty tier is reported
    // =========================================================
    let (result, code) = client
        .raw("loot", json!({ "caller": buyer.address.to_string(), "seed": "s1" }))
        .await;
    match (result, code) {
        (Some(outcome), None) => {
            assert_eq!(outcome["tier_name"], json!("common"));
            // The spent ticket's nonce is disclosed with the outcome.
            assert_eq!(outcome["nonce"].as_str().map(str::len), Some(64));
            assert!(client
                .mask_bits(&buyer, lootbox, &outcome["mint"])
                .await
                .is_empty());
            assert_eq!(
                client
                    .call(
                        "get_blueprint_issued",
                        json!({ "tier_weight": 10, "index": 0 })
                    )
                    .await,
                json!(1)
            );
        }
        (None, Some(code)) => assert_eq!(code, -32051),
        other => panic!("unexpected loot response {other:?}"),
    }

    // Popping drains what is left; then there is nothing to loot.
    while client
        .raw("pop_ticket", json!({ "caller": buyer.address.to_string() }))
        .await
        .0
        .is_some()
    {}
    let code = client
        .error_code("loot", json!({ "caller": buyer.address.to_string(), "seed": "s2" }))
        .await;
    assert_eq!(code, -32042);

    // =========================================================
    // Malformed requests
    // =========================================================
    assert_eq!(client.error_code("no_such_method", json!({})).await, -32601);
    assert_eq!(
        client
            .error_code("buy_ticket", json!({ "caller": "nope", "label": "x", "amount": 1, "payment": 1 }))
            .await,
        -32602
    );
}

#[tokio::test]
async fn socket_subscribers_receive_events() {
    let admin = Account::new("admin", 0xAD);
    let alice = Account::new("alice", 0xA1);
    let state = Arc::new(DaemonState::new(config(&admin)).expect("daemon state"));

    let mut suffix = [0u8; 8];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut suffix);
    let socket_path = std::env::temp_dir().join(format!("aether-test-{}.sock", hex::encode(suffix)));
    let listener = UnixListener::bind(&socket_path).expect("bind");
    let server = RpcServer::new(state.clone(), socket_path.clone());
    let server_task = tokio::spawn(async move { server.serve(listener).await });

    let stream = UnixStream::connect(&socket_path).await.expect("connect");
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    // =========================================================
    // Subscribe to collection events only
    // =========================================================
    let collection = state.ledger.lock().await.collection.address();
    let line = frame(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "subscribe_events",
        "params": { "filter": { "contracts": [collection.to_string()] } },
    }));
    writer.write_all(line.as_bytes()).await.expect("write");
    let response: Value = serde_json::from_str(
        &lines.next_line().await.expect("read").expect("line"),
    )
    .expect("json");
    assert_eq!(response["id"], json!(1));
    let subscribed_at = response["result"]["sequence"].as_u64().expect("sequence");
    // Bootstrap events are already published.
    assert!(subscribed_at >= 2);

    // =========================================================
    // A mint produces a response and two notifications
    // =========================================================
    let line = frame(json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "mint",
        "params": { "caller": alice.address.to_string(), "to": alice.address.to_string(), "asset_id": 1 },
    }));
    writer.write_all(line.as_bytes()).await.expect("write");

    let mut responded = false;
    let mut notifications = Vec::new();
    while !responded || notifications.len() < 2 {
        let line = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
            .await
            .expect("timely message")
            .expect("read")
            .expect("line");
        let message: Value = serde_json::from_str(&line).expect("json");
        if message["method"] == json!("event") {
            notifications.push(message["params"].clone());
        } else {
            assert_eq!(message["id"], json!(2));
            assert!(message["result"]["error"]["mask"].is_string());
            responded = true;
        }
    }

    assert_eq!(notifications[0]["event_type"], json!("oblivious_transfer"));
    assert_eq!(notifications[1]["event_type"], json!("oblivious_error"));
    let first = notifications[0]["sequence"].as_u64().expect("sequence");
    assert_eq!(first, subscribed_at + 1);
    assert_eq!(notifications[1]["sequence"].as_u64(), Some(first + 1));

    server_task.abort();
    let _ = std::fs::remove_file(&socket_path);
}
