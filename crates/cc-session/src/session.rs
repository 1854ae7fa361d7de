//! Session state machine (spec.md §4.7, C8): the transient binding between
//! one bidirectional client stream and one Controller, grounded on
//! `local_backend::subs::run_sync_socket`'s three-concurrent-process shape
//! (receive loop / send loop / worker) and on `database::subscription`'s
//! client/worker channel split for the forwarding half.

use cc_errors::ErrorMetadata;
use cc_proto::ClientFrame;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::{
    manager::Manager,
    transport::{ClientSink, ClientSource, ClientTransport},
};

/// Outbound channel capacity (spec.md §4.7 step 2, §5).
const OUTBOUND_CAPACITY: usize = 100;

/// `HandleSession(recv, send)` (spec.md §4.7): binds the first frame's
/// `app_id` to a registered Controller, installs an outbound channel, pumps
/// inbound frames until the stream ends, then tears the binding down.
/// Runs until the stream ends or a protocol/controller error occurs.
pub async fn handle_session<T: ClientTransport>(manager: &Manager, transport: T) -> anyhow::Result<()> {
    let (mut sink, mut source) = transport.split();

    // Step 1: Bind.
    let Some(first) = source.recv().await else {
        return Ok(());
    };
    let first = first?;
    anyhow::ensure!(
        !first.app_id.is_empty(),
        ErrorMetadata::protocol_violation("first frame must carry a non-empty app_id")
    );
    let app_id = first.app_id.clone();
    let controller = manager
        .get(&app_id)
        .ok_or_else(|| anyhow::anyhow!(ErrorMetadata::controller_not_found(&app_id)))?;

    // Step 2: install outbound.
    let (outbound_tx, mut outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
    controller.install_outbound(outbound_tx).await?;
    info!(app_id = %app_id, "session bound");

    let forward = async {
        while let Some(frame) = outbound_rx.recv().await {
            sink.send(frame).await?;
        }
        Ok::<(), anyhow::Error>(())
    };

    let pump = async {
        // Step 3: dispatch first.
        controller.handle_client(first.command).await?;

        // Step 4: pump.
        loop {
            let Some(frame) = source.recv().await else {
                return Ok(());
            };
            let frame = reject_mismatched_app_id(&app_id, frame)?;
            controller.handle_client(frame.command).await?;
        }
    };

    let result = tokio::select! {
        r = forward => r,
        r = pump => r,
    };

    // Step 5: teardown.
    controller.clear_outbound();
    if let Err(err) = &result {
        warn!(app_id = %app_id, error = %err, "session ended with an error");
    }
    result
}

fn reject_mismatched_app_id(app_id: &str, frame: anyhow::Result<ClientFrame>) -> anyhow::Result<ClientFrame> {
    let frame = frame?;
    anyhow::ensure!(
        frame.app_id == app_id,
        ErrorMetadata::protocol_violation(format!(
            "frame app_id {:?} does not match session app_id {app_id:?}",
            frame.app_id
        ))
    );
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc};

    use cc_controller::Controller;
    use cc_errors::{ErrorCode, ErrorMetadataExt};
    use cc_proto::{ClientCommand, ClientFrame, ServerCommand};
    use cc_provider::{ChannelWorkerTransport, ComponentService};
    use cc_store::Store;

    use super::*;
    use crate::transport::ChannelClientTransport;

    fn spawn_controller(manager: &Manager, app_id: &str) -> Controller {
        let transport = Arc::new(ChannelWorkerTransport::new());
        let service = Arc::new(ComponentService::new(HashMap::new(), vec![], transport.clone()));
        let controller = Controller::spawn(app_id.to_string(), Store::spawn(), service, transport);
        manager.add(controller.clone()).unwrap();
        controller
    }

    // P2 / protocol violation: the first frame must carry a non-empty
    // app_id.
    #[tokio::test]
    async fn rejects_empty_app_id_on_first_frame() {
        let manager = Manager::new();
        let (transport, client_tx, _client_rx) = ChannelClientTransport::pair();
        client_tx
            .send(ClientFrame {
                app_id: String::new(),
                command: ClientCommand::RequestObject {
                    id: "obj.x".to_string(),
                    source: "store.x".to_string(),
                },
            })
            .await
            .unwrap();
        let err = handle_session(&manager, transport).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ProtocolViolation);
    }

    #[tokio::test]
    async fn rejects_sessions_for_unknown_applications() {
        let manager = Manager::new();
        let (transport, client_tx, _client_rx) = ChannelClientTransport::pair();
        client_tx
            .send(ClientFrame {
                app_id: "ghost".to_string(),
                command: ClientCommand::RequestObject {
                    id: "obj.x".to_string(),
                    source: "store.x".to_string(),
                },
            })
            .await
            .unwrap();
        let err = handle_session(&manager, transport).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ControllerNotFound);
    }

    // P2: a later frame with a mismatched app_id ends the session.
    #[tokio::test]
    async fn rejects_a_later_frame_with_a_mismatched_app_id() {
        let manager = Manager::new();
        spawn_controller(&manager, "A");
        let (transport, client_tx, _client_rx) = ChannelClientTransport::pair();
        client_tx
            .send(ClientFrame {
                app_id: "A".to_string(),
                command: ClientCommand::RequestObject {
                    id: "obj.x".to_string(),
                    source: "store.x".to_string(),
                },
            })
            .await
            .unwrap();
        client_tx
            .send(ClientFrame {
                app_id: "B".to_string(),
                command: ClientCommand::RequestObject {
                    id: "obj.y".to_string(),
                    source: "store.x".to_string(),
                },
            })
            .await
            .unwrap();
        let err = handle_session(&manager, transport).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ProtocolViolation);
    }

    // P1: a second session for the same application fails
    // SessionAlreadyActive while the first is still pumping.
    #[tokio::test]
    async fn rejects_a_second_concurrent_session_for_the_same_app() {
        let manager = Manager::new();
        spawn_controller(&manager, "A");

        let first_manager = manager.clone();
        let (transport_a, client_tx_a, _client_rx_a) = ChannelClientTransport::pair();
        client_tx_a
            .send(ClientFrame {
                app_id: "A".to_string(),
                command: ClientCommand::RequestObject {
                    id: "obj.x".to_string(),
                    source: "store.x".to_string(),
                },
            })
            .await
            .unwrap();
        let first = tokio::spawn(async move { handle_session(&first_manager, transport_a).await });

        // Give the first session time to install its outbound channel.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let second_manager = manager.clone();
        let (transport_b, client_tx_b, _client_rx_b) = ChannelClientTransport::pair();
        client_tx_b
            .send(ClientFrame {
                app_id: "A".to_string(),
                command: ClientCommand::RequestObject {
                    id: "obj.y".to_string(),
                    source: "store.x".to_string(),
                },
            })
            .await
            .unwrap();
        let second_err = handle_session(&second_manager, transport_b).await.unwrap_err();
        assert_eq!(second_err.code(), ErrorCode::SessionAlreadyActive);

        drop(client_tx_a);
        let _ = first.await;
    }

    // P3: outbound frames reach the client in enqueue order.
    #[tokio::test]
    async fn outbound_frames_preserve_fifo_order() {
        let manager = Manager::new();
        spawn_controller(&manager, "A");
        let (transport, client_tx, mut client_rx) = ChannelClientTransport::pair();
        client_tx
            .send(ClientFrame {
                app_id: "A".to_string(),
                command: ClientCommand::AppendData {
                    session_id: "s1".to_string(),
                    object: cc_proto::EncodedObject {
                        id: "obj.first".to_string(),
                        language: cc_proto::Language::Json,
                        data: vec![1],
                    },
                },
            })
            .await
            .unwrap();
        client_tx
            .send(ClientFrame {
                app_id: "A".to_string(),
                command: ClientCommand::AppendData {
                    session_id: "s1".to_string(),
                    object: cc_proto::EncodedObject {
                        id: "obj.second".to_string(),
                        language: cc_proto::Language::Json,
                        data: vec![2],
                    },
                },
            })
            .await
            .unwrap();

        let first_frame = client_rx.recv().await.unwrap();
        let ServerCommand::ReturnResult { name, .. } = first_frame.command else {
            panic!("expected ReturnResult");
        };
        assert_eq!(name, "obj.first");

        let second_frame = client_rx.recv().await.unwrap();
        let ServerCommand::ReturnResult { name, .. } = second_frame.command else {
            panic!("expected ReturnResult");
        };
        assert_eq!(name, "obj.second");

        drop(client_tx);
    }
}
