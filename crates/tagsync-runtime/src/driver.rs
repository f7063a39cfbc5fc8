//! Async driver that runs a replica over UDP

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use tagsync_core::{NodeId, TagSyncResult};
use tagsync_transport::{start_receive_loop, UdpTransport};

use crate::Replica;

/// Peer addresses by node id
pub type PeerAddrs = HashMap<NodeId, SocketAddr>;

/// Receive buffer between the socket task and the driver
const RECEIVE_BUFFER: usize = 1024;

/// Drive `replica` until `shutdown` flips to true.
///
/// Inbound envelopes are queued as they arrive. Every tick interval the
/// replica ticks and its output goes out over `transport`; envelopes the
/// socket refuses are handed back through [`Replica::send_failed`]. The
/// replica lock is never held across an await, so the host can keep issuing
/// requests through the same handle.
pub async fn run_udp(
    replica: Arc<Mutex<Replica>>,
    transport: UdpTransport,
    peers: PeerAddrs,
    mut shutdown: watch::Receiver<bool>,
) -> TagSyncResult<()> {
    let (node, tick_interval) = {
        let replica = replica.lock();
        (replica.node_id(), replica.config().tick_interval())
    };
    let mut inbound = start_receive_loop(transport.socket(), RECEIVE_BUFFER);
    let mut ticker = interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(%node, addr = %transport.local_addr(), peers = peers.len(), "replica driver started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let outgoing = {
                    let mut replica = replica.lock();
                    replica.tick();
                    replica.drain_outgoing()
                };
                let mut failed = Vec::new();
                for (to, envelope) in outgoing {
                    let Some(addr) = peers.get(&to) else {
                        tracing::warn!(%node, %to, "no address for peer, envelope dropped");
                        continue;
                    };
                    if let Err(e) = transport.send_to(&envelope, *addr).await {
                        failed.push((to, envelope, e));
                    }
                }
                if !failed.is_empty() {
                    let mut replica = replica.lock();
                    for (to, envelope, e) in failed {
                        replica.send_failed(to, envelope, &e);
                    }
                }
            }
            received = inbound.recv() => {
                match received {
                    Some((envelope, _addr)) => replica.lock().queue_incoming(envelope),
                    None => {
                        tracing::warn!(%node, "receive loop ended");
                        break;
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    tracing::info!(%node, "replica driver stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tagsync_core::{EntityId, MutationOutcome, Tag};

    async fn bind() -> UdpTransport {
        UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn test_two_replicas_converge_over_udp() {
        let server = NodeId::new(1);
        let client = NodeId::new(2);
        let entity = EntityId::new(42);

        let server_transport = bind().await;
        let client_transport = bind().await;
        let server_addr = server_transport.local_addr();
        let client_addr = client_transport.local_addr();

        let mut a = Replica::new(server);
        a.add_peer(client);
        a.spawn_entity(entity, server);
        let mut b = Replica::new(client);
        b.add_peer(server);
        let observed = b.spawn_entity(entity, server);

        let a = Arc::new(Mutex::new(a));
        let b = Arc::new(Mutex::new(b));
        let (stop_tx, stop_rx) = watch::channel(false);

        let server_task = tokio::spawn(run_udp(
            Arc::clone(&a),
            server_transport,
            PeerAddrs::from([(client, client_addr)]),
            stop_rx.clone(),
        ));
        let client_task = tokio::spawn(run_udp(
            Arc::clone(&b),
            client_transport,
            PeerAddrs::from([(server, server_addr)]),
            stop_rx,
        ));

        let stunned = Tag::new("Status.Stunned").unwrap();
        assert_eq!(observed.request_add(stunned.clone()), MutationOutcome::Forwarded);

        let converged = tokio::time::timeout(Duration::from_secs(5), async {
            while !observed.contains(&stunned) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(converged.is_ok());

        let authority = a.lock().component(entity).unwrap();
        assert!(authority.contains(&stunned));

        let _ = stop_tx.send(true);
        server_task.await.unwrap().unwrap();
        client_task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_largest_accepted_set_reaches_observer() {
        let server = NodeId::new(1);
        let client = NodeId::new(2);
        let entity = EntityId::new(7);

        let server_transport = bind().await;
        let client_transport = bind().await;
        let server_addr = server_transport.local_addr();
        let client_addr = client_transport.local_addr();

        let mut a = Replica::new(server);
        a.add_peer(client);
        let authority = a.spawn_entity(entity, server);
        let mut b = Replica::new(client);
        b.add_peer(server);
        let observed = b.spawn_entity(entity, server);

        // Add 17-byte tags one at a time until the frame budget refuses one
        let mut accepted = 0;
        for i in 0..80 {
            let tag = Tag::new(format!("Status.Effect.{:03}", i)).unwrap();
            match authority.request_add(tag) {
                MutationOutcome::Changed => accepted += 1,
                outcome => {
                    assert!(outcome.is_rejected());
                    break;
                }
            }
        }
        assert!(accepted > 0 && accepted < 80);

        let a = Arc::new(Mutex::new(a));
        let b = Arc::new(Mutex::new(b));
        let (stop_tx, stop_rx) = watch::channel(false);
        let server_task = tokio::spawn(run_udp(
            Arc::clone(&a),
            server_transport,
            PeerAddrs::from([(client, client_addr)]),
            stop_rx.clone(),
        ));
        let client_task = tokio::spawn(run_udp(
            Arc::clone(&b),
            client_transport,
            PeerAddrs::from([(server, server_addr)]),
            stop_rx,
        ));

        let converged = tokio::time::timeout(Duration::from_secs(5), async {
            while observed.len() != accepted {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(converged.is_ok());
        assert_eq!(observed.snapshot(), authority.snapshot());
        assert_eq!(a.lock().stats().send_failures, 0);

        let _ = stop_tx.send(true);
        server_task.await.unwrap().unwrap();
        client_task.await.unwrap().unwrap();
    }
}
