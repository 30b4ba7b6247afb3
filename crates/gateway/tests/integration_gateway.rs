//! End-to-end scenarios against a fake in-process peer standing in for the
//! platform side of the wire protocol. Each test opens its own listener and
//! `Gateway::connect`s to it, so scenarios never share a port or state.
//!
//! S6 (disconnect/reconnect) lives in `transport.rs`'s own test module since
//! it exercises the raw connection directly, below the façade.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use fjage_gateway::{Filter, Gateway, GatewayOptions, Identifier, Message, Timeout};

async fn fake_peer() -> (TcpListener, u16) {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// Accepts one connection and consumes the initial liveness + subscription
/// reconciliation frames, handing back the raw socket for scenario-specific
/// traffic.
async fn accept_and_settle(listener: TcpListener) -> TcpStream {
    let (sock, _) = listener.accept().await.unwrap();
    let mut lines = BufReader::new(sock).lines();
    let _heartbeat = lines.next_line().await.unwrap().unwrap();
    let _initial_wants_messages_for = lines.next_line().await.unwrap().unwrap();
    lines.into_inner().into_inner()
}

/// S1: a request/reply exchange correlated by message id.
#[tokio::test]
async fn s1_echo_request_reply() {
    let (listener, port) = fake_peer().await;
    let server = tokio::spawn(async move {
        let mut sock = accept_and_settle(listener).await;
        let mut lines = BufReader::new(&mut sock).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        let sent: Value = serde_json::from_str(&line).unwrap();
        let req_id = sent["message"]["data"]["msgID"].as_str().unwrap();
        let sender = sent["message"]["data"]["sender"].clone();
        let reply = json!({
            "message": {
                "clazz": "org.arl.fjage.Message",
                "data": {
                    "msgID": "reply-1",
                    "perf": "AGREE",
                    "inReplyTo": req_id,
                    "recipient": sender,
                }
            }
        });
        sock.write_all(format!("{reply}\n").as_bytes())
            .await
            .unwrap();
    });

    let gw = Gateway::connect("127.0.0.1", port, GatewayOptions::default())
        .await
        .unwrap();
    let req = Message::new("org.arl.fjage.shell.ShellExecReq")
        .with_recipient(Identifier::agent("shell"))
        .with_field("command", "ps")
        .with_field("ans", true);
    let req_id = req.id.clone();

    let reply = gw
        .request(req, Timeout::After(Duration::from_millis(5000)))
        .await
        .unwrap()
        .expect("reply should arrive within the deadline");

    assert_eq!(
        reply.performative,
        fjage_gateway::Performative::Agree
    );
    assert_eq!(reply.in_reply_to.as_deref(), Some(req_id.as_str()));

    tokio::time::timeout(Duration::from_secs(1), server)
        .await
        .unwrap()
        .unwrap();
}

/// S2: with nobody draining it, the inbox caps at its configured capacity and
/// keeps the most recent arrivals.
#[tokio::test]
async fn s2_inbox_drops_oldest_past_capacity() {
    let (listener, port) = fake_peer().await;
    let opts = GatewayOptions {
        inbox_capacity: 512,
        ..GatewayOptions::default()
    };

    let server = tokio::spawn(async move {
        let mut sock = accept_and_settle(listener).await;
        let mut lines = BufReader::new(&mut sock).lines();
        // reconciliation frame for the subscribe() below.
        let _subscribe_reconcile = lines.next_line().await.unwrap().unwrap();

        for i in 0..756u32 {
            let frame = json!({
                "message": {
                    "clazz": "org.arl.fjage.GenericMessage",
                    "data": {
                        "msgID": format!("m{i}"),
                        "perf": "INFORM",
                        "recipient": "#s2-topic",
                        "seq": i,
                    }
                }
            });
            sock.write_all(format!("{frame}\n").as_bytes())
                .await
                .unwrap();
        }
        // a tiny pause so the dispatch loop has drained the socket before
        // the test starts asserting on the inbox's contents.
        tokio::time::sleep(Duration::from_millis(200)).await;
    });

    let gw = Gateway::connect("127.0.0.1", port, opts).await.unwrap();
    assert!(gw.subscribe(Identifier::topic("s2-topic")).await.unwrap());

    tokio::time::timeout(Duration::from_secs(3), server)
        .await
        .unwrap()
        .unwrap();

    let mut seen = Vec::new();
    while let Some(msg) = gw
        .receive(Filter::Any, Timeout::After(Duration::ZERO))
        .await
    {
        seen.push(msg.field("seq").and_then(Value::as_u64).unwrap());
    }

    assert_eq!(seen.len(), 512);
    // the oldest 244 (0..244) were dropped; the newest 512 (244..756) survive,
    // in arrival order.
    assert_eq!(seen.first().copied(), Some(244));
    assert_eq!(seen.last().copied(), Some(755));
}

/// S3: many concurrent request/reply round trips stay correctly correlated.
#[tokio::test]
async fn s3_many_concurrent_requests_correlate_independently() {
    let (listener, port) = fake_peer().await;
    const N: u32 = 64;

    let server = tokio::spawn(async move {
        let mut sock = accept_and_settle(listener).await;
        let mut lines = BufReader::new(&mut sock).lines();
        for _ in 0..N {
            let line = lines.next_line().await.unwrap().unwrap();
            let sent: Value = serde_json::from_str(&line).unwrap();
            let req_id = sent["message"]["data"]["msgID"].as_str().unwrap().to_string();
            let sender = sent["message"]["data"]["sender"].clone();
            let ty = sent["message"]["data"]["type"].clone();
            let reply = json!({
                "message": {
                    "clazz": "org.arl.fjage.Message",
                    "data": {
                        "msgID": format!("rsp-{req_id}"),
                        "perf": "AGREE",
                        "inReplyTo": req_id,
                        "recipient": sender,
                        "type": ty,
                    }
                }
            });
            sock.write_all(format!("{reply}\n").as_bytes())
                .await
                .unwrap();
        }
    });

    let gw = Gateway::connect("127.0.0.1", port, GatewayOptions::default())
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for ty in 1..=N {
        let gw = gw.clone();
        tasks.push(tokio::spawn(async move {
            let req = Message::new("org.arl.fjage.Message")
                .with_recipient(Identifier::agent("echo"))
                .with_field("type", ty);
            gw.request(req, Timeout::After(Duration::from_secs(5)))
                .await
                .unwrap()
                .expect("every request should see its own reply")
        }));
    }

    let mut seen = HashSet::new();
    for task in tasks {
        let reply = task.await.unwrap();
        let ty = reply.field("type").and_then(Value::as_u64).unwrap();
        assert!(seen.insert(ty), "type {ty} delivered more than once");
    }
    assert_eq!(seen.len(), N as usize);
    for ty in 1..=N as u64 {
        assert!(seen.contains(&ty));
    }

    tokio::time::timeout(Duration::from_secs(1), server)
        .await
        .unwrap()
        .unwrap();
}

/// S4: subscribing to a topic makes published messages on it deliverable,
/// unsubscribing then resubscribing keeps it working.
#[tokio::test]
async fn s4_subscribe_then_receive_published_messages() {
    let (listener, port) = fake_peer().await;

    let server = tokio::spawn(async move {
        let mut sock = accept_and_settle(listener).await;
        let mut lines = BufReader::new(&mut sock).lines();

        // first subscribe reconciliation frame (topic added).
        let _first_reconcile = lines.next_line().await.unwrap().unwrap();
        let publish = |n: u32| {
            json!({
                "message": {
                    "clazz": "org.arl.fjage.GenericMessage",
                    "data": {"msgID": format!("pub-{n}"), "perf": "INFORM",
                             "recipient": "#test-topic", "seq": n}
                }
            })
        };
        sock.write_all(format!("{}\n", publish(1)).as_bytes())
            .await
            .unwrap();

        // unsubscribe then resubscribe reconciliation frames.
        let _unsub_reconcile = lines.next_line().await.unwrap().unwrap();
        let _resub_reconcile = lines.next_line().await.unwrap().unwrap();
        sock.write_all(format!("{}\n", publish(2)).as_bytes())
            .await
            .unwrap();
    });

    let gw = Gateway::connect("127.0.0.1", port, GatewayOptions::default())
        .await
        .unwrap();

    assert!(gw
        .subscribe(Identifier::topic("test-topic"))
        .await
        .unwrap());

    let first = gw
        .receive(Filter::Any, Timeout::After(Duration::from_secs(1)))
        .await
        .expect("published message should arrive while subscribed");
    assert_eq!(first.field("seq"), Some(&Value::from(1)));

    assert!(gw
        .unsubscribe(Identifier::topic("test-topic"))
        .await
        .unwrap());
    assert!(gw
        .subscribe(Identifier::topic("test-topic"))
        .await
        .unwrap());

    let second = gw
        .receive(Filter::Any, Timeout::After(Duration::from_secs(1)))
        .await
        .expect("messages should flow again after resubscribing");
    assert_eq!(second.field("seq"), Some(&Value::from(2)));

    tokio::time::timeout(Duration::from_secs(1), server)
        .await
        .unwrap()
        .unwrap();
}

/// S5: `Identifier::get`/`set` round-trip through `ParameterReq`/`ParameterRsp`
/// against a small stateful fake parameter store on agent `"S"`.
#[tokio::test]
async fn s5_parameter_get_set_round_trips() {
    let (listener, port) = fake_peer().await;

    let server = tokio::spawn(async move {
        let mut sock = accept_and_settle(listener).await;
        let mut lines = BufReader::new(&mut sock).lines();
        let mut state: HashMap<String, i64> = HashMap::new();
        state.insert("y".to_string(), 2);
        state.insert("a".to_string(), 0);

        // 5 scalar requests (get y, set a=42, get a, set a=0, get a) then one
        // indexed get (z@1) then one bulk get_all.
        for _ in 0..7u32 {
            let line = lines.next_line().await.unwrap().unwrap();
            let sent: Value = serde_json::from_str(&line).unwrap();
            let req_id = sent["message"]["data"]["msgID"].as_str().unwrap().to_string();
            let sender = sent["message"]["data"]["sender"].clone();
            let index = sent["message"]["data"]["index"].as_i64().unwrap_or(-1);
            let param = sent["message"]["data"]["param"].as_str();
            let value = sent["message"]["data"].get("value");

            let mut data = Map::new();
            data.insert("msgID".into(), json!(format!("rsp-{req_id}")));
            data.insert("perf".into(), json!("INFORM"));
            data.insert("inReplyTo".into(), json!(req_id));
            data.insert("recipient".into(), sender);

            match (param, value) {
                (Some(p), Some(v)) if index == -1 => {
                    state.insert(p.to_string(), v.as_i64().unwrap());
                    data.insert("index".into(), json!(-1));
                    data.insert("param".into(), json!(p));
                    data.insert("value".into(), json!(state[p]));
                }
                (Some("z"), None) if index == 1 => {
                    data.insert("index".into(), json!(1));
                    data.insert("param".into(), json!("z"));
                    data.insert("value".into(), json!(4));
                }
                (Some(p), None) => {
                    data.insert("index".into(), json!(-1));
                    data.insert("param".into(), json!(p));
                    data.insert("value".into(), json!(*state.get(p).unwrap_or(&0)));
                }
                (None, _) => {
                    let values: Map<String, Value> = state
                        .iter()
                        .map(|(k, v)| (k.clone(), json!(*v)))
                        .collect();
                    data.insert("index".into(), json!(-1));
                    data.insert("values".into(), Value::Object(values));
                }
            }

            let reply = json!({"message": {"clazz": "org.arl.fjage.param.ParameterRsp", "data": data}});
            sock.write_all(format!("{reply}\n").as_bytes())
                .await
                .unwrap();
        }
    });

    let gw = Gateway::connect("127.0.0.1", port, GatewayOptions::default())
        .await
        .unwrap();
    let s = gw.agent("S");

    assert_eq!(s.get("y").await, Some(Value::from(2)));
    assert_eq!(s.set("a", Value::from(42)).await, Some(Value::from(42)));
    assert_eq!(s.get("a").await, Some(Value::from(42)));
    assert_eq!(s.set("a", Value::from(0)).await, Some(Value::from(0)));
    assert_eq!(s.get("a").await, Some(Value::from(0)));
    assert_eq!(s.indexed(1).get("z").await, Some(Value::from(4)));

    let all = s.get_all().await;
    assert_eq!(all.get("y"), Some(&Value::from(2)));
    assert_eq!(all.get("a"), Some(&Value::from(0)));

    tokio::time::timeout(Duration::from_secs(1), server)
        .await
        .unwrap()
        .unwrap();
}
