//! End-to-end tests against the running HTTP server.

use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::atomic::Ordering;

mod common;

use common::{spawn_server, spawn_server_with, test_config, FAKE_TX_HASH};

/// Anvil's first development key.
const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

async fn body(res: reqwest::Response) -> Value {
    res.json().await.unwrap()
}

#[tokio::test]
async fn test_health_reports_components() {
    let server = spawn_server().await;
    let res = server.client.get(server.url("/api/system/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));

    let health = body(res).await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["storage"], true);
    assert_eq!(health["market"]["status"], "active");
    let chains = health["chains"].as_array().unwrap();
    let bsc = chains.iter().find(|c| c["network"] == "binance").unwrap();
    assert_eq!(bsc["healthy"], true);
    let eth = chains.iter().find(|c| c["network"] == "ethereum").unwrap();
    assert_eq!(eth["healthy"], false);
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let server = spawn_server().await;
    let res = server.client.get(server.url("/api/nope")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(body(res).await["message"], "Route not found");
}

#[tokio::test]
async fn test_receive_transaction_moves_balance() {
    let server = spawn_server().await;
    let user_id = server.demo_user_id().await;
    let eth = server.asset_id("ETH").await;
    let before = server.storage().transactions_for_user(user_id, None).await.unwrap().len();

    let res = server
        .client
        .post(server.url("/api/transactions"))
        .json(&json!({
            "userId": user_id,
            "assetId": eth,
            "type": "receive",
            "amount": 1.5,
            "fromAddress": "0x742d35Cc6634C0532925a3b844Bc454e4438f44e"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let tx = body(res).await;
    assert_eq!(tx["type"], "receive");
    assert_eq!(tx["status"], "completed");

    let after = server.storage().transactions_for_user(user_id, None).await.unwrap();
    assert_eq!(after.len(), before + 1);
    let wallet = server.storage().wallet_for(user_id, eth).await.unwrap().unwrap();
    assert!((wallet.balance - 5.0029).abs() < 1e-9);
}

#[tokio::test]
async fn test_invalid_transactions_rejected() {
    let server = spawn_server().await;
    let user_id = server.demo_user_id().await;
    let eth = server.asset_id("ETH").await;
    let before = server.storage().transactions_for_user(user_id, None).await.unwrap().len();

    for amount in [json!(-1.0), json!(0), json!("lots"), json!(1e15)] {
        let res = server
            .client
            .post(server.url("/api/transactions"))
            .json(&json!({ "userId": user_id, "assetId": eth, "type": "send", "amount": amount }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "amount {}", amount);
        assert!(body(res).await["message"].is_string());
    }

    // more than the wallet holds
    let res = server
        .client
        .post(server.url("/api/transactions"))
        .json(&json!({ "userId": user_id, "assetId": eth, "type": "send", "amount": 100.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let after = server.storage().transactions_for_user(user_id, None).await.unwrap().len();
    assert_eq!(after, before);
    let wallet = server.storage().wallet_for(user_id, eth).await.unwrap().unwrap();
    assert!((wallet.balance - 3.5029).abs() < 1e-9);
}

#[tokio::test]
async fn test_swap_moves_both_wallets() {
    let server = spawn_server().await;
    let user_id = server.demo_user_id().await;
    let btc = server.asset_id("BTC").await;
    let usdc = server.asset_id("USDC").await;
    let bnb = server.asset_id("BNB").await;
    let price = |id: i32| {
        let storage = server.storage().clone();
        async move { storage.get_asset(id).await.unwrap().unwrap().current_price.unwrap() }
    };
    let (btc_price, usdc_price, bnb_price) = (price(btc).await, price(usdc).await, price(bnb).await);

    let swap = |amount: f64, to: &str| {
        json!({
            "userId": user_id,
            "assetId": btc,
            "type": "swap",
            "amount": amount,
            "toAddress": format!("swap:{}", to),
            "status": "completed"
        })
    };

    let res = server
        .client
        .post(server.url("/api/transactions"))
        .json(&swap(0.05, "USDC"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(body(res).await["type"], "swap");

    let source = server.storage().wallet_for(user_id, btc).await.unwrap().unwrap();
    assert!((source.balance - 0.3738).abs() < 1e-9);
    let target = server.storage().wallet_for(user_id, usdc).await.unwrap().unwrap();
    assert!((target.balance - (4210.0 + 0.05 * btc_price / usdc_price)).abs() < 1e-6);

    // the demo user holds no BNB yet
    assert!(server.storage().wallet_for(user_id, bnb).await.unwrap().is_none());
    let res = server
        .client
        .post(server.url("/api/transactions"))
        .json(&swap(0.05, "BNB"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created = server.storage().wallet_for(user_id, bnb).await.unwrap().unwrap();
    assert!((created.balance - 0.05 * btc_price / bnb_price).abs() < 1e-9);

    // more BTC than the wallet holds
    let usdc_before = server.storage().wallet_for(user_id, usdc).await.unwrap().unwrap().balance;
    let res = server
        .client
        .post(server.url("/api/transactions"))
        .json(&swap(10.0, "USDC"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(body(res).await["message"].is_string());

    let usdc_after = server.storage().wallet_for(user_id, usdc).await.unwrap().unwrap().balance;
    assert_eq!(usdc_after, usdc_before);
    let source = server.storage().wallet_for(user_id, btc).await.unwrap().unwrap();
    assert!((source.balance - 0.3238).abs() < 1e-9);
}

#[tokio::test]
async fn test_transactions_listing_enriched() {
    let server = spawn_server().await;
    let user_id = server.demo_user_id().await;

    let res = server
        .client
        .get(server.url(&format!("/api/transactions/{}?limit=2", user_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let list = body(res).await;
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 2);
    // newest first: the seeded BTC receive from today
    assert_eq!(list[0]["asset"]["symbol"], "BTC");
    assert_eq!(list[0]["asset"]["name"], "Bitcoin");
    assert!(list[0]["createdAt"].as_str().unwrap() >= list[1]["createdAt"].as_str().unwrap());
}

#[tokio::test]
async fn test_wallets_and_portfolio() {
    let server = spawn_server().await;
    let user_id = server.demo_user_id().await;

    let wallets = body(
        server
            .client
            .get(server.url(&format!("/api/wallets/{}", user_id)))
            .send()
            .await
            .unwrap(),
    )
    .await;
    let wallets = wallets.as_array().unwrap();
    assert_eq!(wallets.len(), 5);
    let expected: f64 = wallets.iter().map(|w| w["value"].as_f64().unwrap()).sum();

    let summary = body(
        server
            .client
            .get(server.url(&format!("/api/portfolio/{}", user_id)))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert!((summary["totalValue"].as_f64().unwrap() - expected).abs() < 1e-6);
    assert_eq!(summary["assetCount"], 5);
    assert_eq!(summary["transactionCount"], 4);

    let month = body(
        server
            .client
            .get(server.url(&format!("/api/portfolio/{}/history", user_id)))
            .send()
            .await
            .unwrap(),
    )
    .await;
    let week = body(
        server
            .client
            .get(server.url(&format!("/api/portfolio/{}/history?days=7", user_id)))
            .send()
            .await
            .unwrap(),
    )
    .await;
    let (month, week) = (month.as_array().unwrap(), week.as_array().unwrap());
    assert!(!week.is_empty());
    assert!(week.len() < month.len());
    assert!(month.len() <= 31);

    let res = server
        .client
        .get(server.url(&format!("/api/portfolio/{}/history?days=0", user_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_market_refresh_reports_unknown_symbols() {
    let server = spawn_server().await;

    let res = server.client.post(server.url("/api/market/refresh")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let report = body(res).await;
    assert_eq!(report["message"], "Market data refreshed successfully");
    assert_eq!(report["updated"], json!(["BTC", "ETH"]));
    assert_eq!(report["unknown"], json!(["USDC", "SOL", "DOGE", "BNB"]));
    assert_eq!(report["fallback"], false);

    let market = body(server.client.get(server.url("/api/market")).send().await.unwrap()).await;
    let btc = market
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["symbol"] == "BTC")
        .unwrap()
        .clone();
    assert_eq!(btc["price"], 70000.0);
    assert_eq!(btc["sparklineData"], json!([70000.0]));
}

#[tokio::test]
async fn test_market_refresh_failure() {
    let server = spawn_server().await;
    server.market.failing.store(true, Ordering::SeqCst);

    let res = server.client.get(server.url("/api/market/refresh")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let err = body(res).await;
    assert_eq!(err["message"], "Failed to refresh market data");
    assert_eq!(err["error"], "Rate limit exceeded");
}

#[tokio::test]
async fn test_crypto_pass_through() {
    let server = spawn_server().await;

    let prices = body(
        server
            .client
            .get(server.url("/api/crypto/prices?symbols=eth,doge"))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(prices["success"], true);
    assert_eq!(prices["source"], "fake");
    assert_eq!(prices["data"].as_array().unwrap().len(), 1);
    assert_eq!(prices["data"][0]["symbol"], "ETH");

    let res = server.client.get(server.url("/api/crypto/info/doge")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = server.client.get(server.url("/api/crypto/top?limit=0")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    server.market.failing.store(true, Ordering::SeqCst);
    let res = server.client.get(server.url("/api/crypto/prices")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let status = body(server.client.get(server.url("/api/crypto/status")).send().await.unwrap()).await;
    assert_eq!(status["data"]["status"], "error");
}

#[tokio::test]
async fn test_chain_networks_and_validation() {
    let server = spawn_server().await;

    let networks = body(server.client.get(server.url("/api/chains")).send().await.unwrap()).await;
    let values: Vec<&str> = networks
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["value"].as_str().unwrap())
        .collect();
    assert_eq!(values, vec!["ethereum", "binance", "solana"]);

    let cases = [
        ("ethereum", DEV_ADDRESS, true),
        ("ethereum", "0xF39Fd6e51aad88F6F4ce6aB8827279cffFb92266", false),
        ("ethereum", "f39Fd6e51aad88F6F4ce6aB8827279cffFb92266", false),
        ("bsc", "0x742d35cc6634c0532925a3b844bc454e4438f44e", true),
        ("solana", "11111111111111111111111111111111", true),
        ("solana", "0OIl", false),
    ];
    for (network, address, valid) in cases {
        let res = server
            .client
            .get(server.url(&format!("/api/chains/{}/validate/{}", network, address)))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body(res).await["valid"], valid, "{} {}", network, address);
    }

    let res = server
        .client
        .get(server.url(&format!("/api/chains/tron/validate/{}", DEV_ADDRESS)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let res = server
        .client
        .get(server.url(&format!("/api/chains/polygon/validate/{}", DEV_ADDRESS)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_wallet_import() {
    let server = spawn_server().await;

    let res = server
        .client
        .post(server.url("/api/chains/ethereum/wallets/import"))
        .json(&json!({ "privateKey": "not-a-key" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(res).await["message"], "Invalid private key");

    let res = server
        .client
        .post(server.url("/api/chains/ethereum/wallets/import"))
        .json(&json!({ "privateKey": DEV_KEY }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body(res).await["address"], DEV_ADDRESS);

    // a generated solana key imports back to the same address
    let created = body(
        server
            .client
            .post(server.url("/api/chains/solana/wallets"))
            .send()
            .await
            .unwrap(),
    )
    .await;
    let imported = body(
        server
            .client
            .post(server.url("/api/chains/solana/wallets/import"))
            .json(&json!({ "privateKey": created["privateKey"] }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(imported["address"], created["address"]);

    let res = server
        .client
        .post(server.url("/api/chains/solana/wallets/import"))
        .json(&json!({ "privateKey": "abcd" }))
        .send()
        .await
        .unwrap();
    assert_eq!(body(res).await["message"], "Invalid private key");
}

#[tokio::test]
async fn test_balance_and_send() {
    let server = spawn_server().await;

    let balance = body(
        server
            .client
            .get(server.url(&format!("/api/chains/bsc/balance/{}", DEV_ADDRESS)))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(balance["balance"], 1.25);
    assert_eq!(balance["symbol"], "BNB");
    assert_eq!(balance["address"], DEV_ADDRESS);

    // unreachable node reports zero
    let balance = body(
        server
            .client
            .get(server.url(&format!("/api/chains/ethereum/balance/{}", DEV_ADDRESS)))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(balance["balance"], 0.0);
    assert_eq!(balance["symbol"], "ETH");

    let res = server
        .client
        .post(server.url("/api/chains/bsc/send"))
        .json(&json!({ "privateKey": DEV_KEY, "toAddress": DEV_ADDRESS, "amount": 0.1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body(res).await["hash"], FAKE_TX_HASH);

    let res = server
        .client
        .post(server.url("/api/chains/bsc/send"))
        .json(&json!({ "privateKey": DEV_KEY, "toAddress": "0x123", "amount": 0.1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server
        .client
        .post(server.url("/api/chains/ethereum/send"))
        .json(&json!({ "privateKey": DEV_KEY, "toAddress": DEV_ADDRESS, "amount": 0.1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body(res).await["message"], "Transaction failed");
}

#[tokio::test]
async fn test_auth_flow() {
    let server = spawn_server().await;

    let res = server
        .client
        .post(server.url("/api/register"))
        .json(&json!({ "username": "alice", "password": "s3cret-pw", "email": "alice@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let registered = body(res).await;
    assert_eq!(registered["user"]["username"], "alice");
    assert!(registered["user"].get("password").is_none());

    let res = server
        .client
        .post(server.url("/api/login"))
        .json(&json!({ "username": "alice", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let login = body(
        server
            .client
            .post(server.url("/api/login"))
            .json(&json!({ "username": "alice", "password": "s3cret-pw" }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    let token = login["token"].as_str().unwrap().to_string();

    let res = server.client.get(server.url("/api/user")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body(res).await["username"], "alice");

    let res = server.client.post(server.url("/api/logout")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = server.client.get(server.url("/api/user")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let res = server.client.get(server.url("/api/user")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_users_and_addresses() {
    let server = spawn_server().await;

    let res = server
        .client
        .post(server.url("/api/users"))
        .json(&json!({ "username": "bob", "password": "hunter22", "email": "bob@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let user = body(res).await;
    assert!(user.get("password").is_none());
    let id = user["id"].as_i64().unwrap();

    let res = server
        .client
        .post(server.url("/api/users"))
        .json(&json!({ "username": "bob", "password": "hunter22" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(res).await["message"], "Username already exists");

    let res = server.client.get(server.url("/api/users/9999")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(body(res).await["message"], "User not found");

    let res = server
        .client
        .post(server.url(&format!("/api/users/{}/addresses", id)))
        .json(&json!({ "address": DEV_ADDRESS, "network": "bsc" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(body(res).await["network"], "bsc");

    let res = server
        .client
        .post(server.url(&format!("/api/users/{}/addresses", id)))
        .json(&json!({ "address": DEV_ADDRESS, "network": "solana" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let list = body(
        server
            .client
            .get(server.url(&format!("/api/users/{}/addresses", id)))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_defi_positions() {
    let server = spawn_server().await;
    let user_id = server.demo_user_id().await;
    let eth = server.asset_id("ETH").await;

    let res = server
        .client
        .post(server.url(&format!("/api/users/{}/defi-positions", user_id)))
        .json(&json!({ "protocol": "Lido", "type": "staking", "amount": 1.0, "assetId": eth, "apy": 3.8 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let position = body(res).await;
    assert_eq!(position["status"], "active");
    let id = position["id"].as_i64().unwrap();

    let withdrawn = body(
        server
            .client
            .post(server.url(&format!("/api/defi-positions/{}/withdraw", id)))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(withdrawn["status"], "withdrawn");
    assert!(withdrawn["endDate"].is_string());

    let res = server.client.post(server.url("/api/defi-positions/9999/withdraw")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_achievements() {
    let server = spawn_server().await;
    let user_id = server.demo_user_id().await;

    let catalog = body(server.client.get(server.url("/api/achievements")).send().await.unwrap()).await;
    assert_eq!(catalog.as_array().unwrap().len(), 9);

    let res = server
        .client
        .post(server.url(&format!("/api/achievements/{}/security-master/progress", user_id)))
        .json(&json!({ "progress": 100 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body(res).await["unlockedAt"].is_string());

    let progress = body(
        server
            .client
            .get(server.url(&format!("/api/achievements/{}", user_id)))
            .send()
            .await
            .unwrap(),
    )
    .await;
    let find = |id: &str| {
        progress["achievements"]
            .as_array()
            .unwrap()
            .iter()
            .find(|a| a["id"] == id)
            .unwrap()
            .clone()
    };
    assert_eq!(find("first-transaction")["isCompleted"], true);
    assert_eq!(find("security-master")["progress"], 100);
    let points = progress["totalPoints"].as_u64().unwrap();
    assert!(points >= 50);
    assert_eq!(progress["level"].as_u64().unwrap(), points / 100 + 1);

    let res = server
        .client
        .post(server.url(&format!("/api/achievements/{}/whale/progress", user_id)))
        .json(&json!({ "progress": 100 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = server
        .client
        .post(server.url(&format!("/api/achievements/{}/educator/progress", user_id)))
        .json(&json!({ "progress": 150 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_input_is_json_400() {
    let server = spawn_server().await;

    let res = server
        .client
        .post(server.url("/api/transactions"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(body(res).await["message"].is_string());

    let res = server.client.get(server.url("/api/wallets/abc")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(body(res).await["message"].is_string());
}

#[tokio::test]
async fn test_rate_limit() {
    let mut config = test_config();
    config.rate_limit.max_requests = 2;
    config.rate_limit.window_ms = 60_000;
    let server = spawn_server_with(config).await;

    for _ in 0..2 {
        let res = server.client.get(server.url("/api/assets")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
    let res = server.client.get(server.url("/api/assets")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body(res).await["message"], "Too many requests, please try again later.");
}
