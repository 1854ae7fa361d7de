//! Controller (spec.md §4.6, C7): per-application aggregate that
//! interprets client commands, deploys functions, and schedules
//! invocations.
//!
//! Spec.md §9 flags controller-state concurrency as the riskiest corner --
//! `nodes`/`runtimes` are written both from the session command pump and
//! from each deployed Actor's inbound-message reader task. We take the
//! recommended strategy verbatim: one owning task consumes a merged
//! command queue (client commands, worker messages, and the completions of
//! off-critical-path store saves), so no controller-scope mutex is ever
//! needed -- the same shape as `cc_store::Store` and `cc_pool::ActorPool`.

use std::{collections::HashMap, sync::Arc};

use cc_errors::ErrorMetadata;
use cc_pool::{Actor, ActorPool, Latency};
use cc_proto::{
    ids, ClientCommand, EncodedObject, InvokeArg, InvokeOutcome, Language, ObjectRef, ServerCommand,
    ServerFrame, WorkerInbound, WorkerOutbound,
};
use cc_provider::{ComponentService, WorkerTransport};
use cc_runtime::FunctionNode;
use cc_store::Store;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{info, warn};

use crate::{
    events::{ControllerEvent, EventHub},
    metrics,
};

enum ControllerCommand {
    Client {
        command: ClientCommand,
        reply: oneshot::Sender<anyhow::Result<()>>,
    },
    Worker {
        msg: WorkerOutbound,
    },
    InstallOutbound {
        outbound: mpsc::Sender<ServerFrame>,
        reply: oneshot::Sender<anyhow::Result<()>>,
    },
    ClearOutbound,
    DataSaved {
        session_id: String,
        result: anyhow::Result<ObjectRef>,
    },
    ArgSaved {
        session_id: String,
        instance_id: String,
        function_name: String,
        param: String,
        result: anyhow::Result<ObjectRef>,
    },
}

/// A cheap, `Clone`-able handle to one application's controller.
#[derive(Clone)]
pub struct Controller {
    app_id: Arc<str>,
    tx: mpsc::UnboundedSender<ControllerCommand>,
    events: EventHub,
}

impl Controller {
    pub fn spawn(
        app_id: impl Into<Arc<str>>,
        store: Store,
        component_service: Arc<ComponentService>,
        transport: Arc<dyn WorkerTransport>,
    ) -> Self {
        let app_id = app_id.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let events = EventHub::new();
        let handle = Controller {
            app_id: app_id.clone(),
            tx,
            events: events.clone(),
        };
        let worker = ControllerWorker {
            app_id,
            self_handle: handle.clone(),
            store,
            component_service,
            transport,
            nodes: HashMap::new(),
            outbound: None,
            events,
        };
        tokio::spawn(worker.run(rx));
        handle
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Subscribes to this Controller's fire-and-forget lifecycle events
    /// (`FunctionDeployed`, `RuntimeCompleted`, `RuntimeFailed`). Purely
    /// observational; dropping the receiver has no effect on the command
    /// path.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    /// Installs the session's outbound channel (spec.md §4.7 step 2).
    /// Fails `SessionAlreadyActive` if one is already installed.
    pub async fn install_outbound(&self, outbound: mpsc::Sender<ServerFrame>) -> anyhow::Result<()> {
        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(ControllerCommand::InstallOutbound { outbound, reply })
            .map_err(|_| anyhow::anyhow!("controller {} is gone", self.app_id))?;
        reply_rx
            .await
            .map_err(|_| anyhow::anyhow!("controller {} is gone", self.app_id))?
    }

    /// Clears the outbound channel (spec.md §4.7 step 5, teardown).
    pub fn clear_outbound(&self) {
        let _ = self.tx.send(ControllerCommand::ClearOutbound);
    }

    /// `HandleClient` (spec.md §4.7): any error terminates the session.
    pub async fn handle_client(&self, command: ClientCommand) -> anyhow::Result<()> {
        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(ControllerCommand::Client { command, reply })
            .map_err(|_| anyhow::anyhow!("controller {} is gone", self.app_id))?;
        reply_rx
            .await
            .map_err(|_| anyhow::anyhow!("controller {} is gone", self.app_id))?
    }

    /// Fed by each deployed Actor's own inbound-message reader task
    /// (spec.md §5).
    pub fn handle_worker(&self, msg: WorkerOutbound) {
        let _ = self.tx.send(ControllerCommand::Worker { msg });
    }
}

struct ControllerWorker {
    app_id: Arc<str>,
    self_handle: Controller,
    store: Store,
    component_service: Arc<ComponentService>,
    transport: Arc<dyn WorkerTransport>,
    nodes: HashMap<String, FunctionNode>,
    outbound: Option<mpsc::Sender<ServerFrame>>,
    events: EventHub,
}

impl ControllerWorker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<ControllerCommand>) {
        while let Some(command) = rx.recv().await {
            match command {
                ControllerCommand::Client { command, reply } => {
                    let result = self.handle_client_command(command).await;
                    let _ = reply.send(result);
                },
                ControllerCommand::Worker { msg } => self.handle_worker_message(msg).await,
                ControllerCommand::InstallOutbound { outbound, reply } => {
                    let result = if self.outbound.is_some() {
                        Err(anyhow::anyhow!(ErrorMetadata::session_already_active()))
                    } else {
                        self.outbound = Some(outbound);
                        Ok(())
                    };
                    let _ = reply.send(result);
                },
                ControllerCommand::ClearOutbound => {
                    self.outbound = None;
                },
                ControllerCommand::DataSaved { session_id, result } => {
                    self.handle_data_saved(session_id, result).await;
                },
                ControllerCommand::ArgSaved {
                    session_id,
                    instance_id,
                    function_name,
                    param,
                    result,
                } => {
                    self.handle_arg_saved(session_id, instance_id, function_name, param, result)
                        .await;
                },
            }
        }
    }

    async fn push(&self, command: ServerCommand) {
        if let Some(outbound) = &self.outbound {
            if outbound.send(ServerFrame::new(command)).await.is_err() {
                warn!(app_id = %self.app_id, "outbound channel closed, dropping frame");
            }
        }
    }

    async fn handle_client_command(&mut self, command: ClientCommand) -> anyhow::Result<()> {
        match command {
            ClientCommand::AppendPyFunc {
                name,
                params,
                requirements,
                pickled_object,
                language,
                replicas,
                resources,
            } => {
                self.append_py_func(
                    name,
                    params,
                    requirements,
                    pickled_object,
                    language,
                    replicas,
                    resources,
                )
                .await
            },
            ClientCommand::AppendData { session_id, object } => {
                self.append_data(session_id, object);
                Ok(())
            },
            ClientCommand::AppendArg {
                session_id,
                instance_id,
                name,
                param,
                value,
            } => self.append_arg(session_id, instance_id, name, param, value).await,
            ClientCommand::Invoke {
                session_id,
                instance_id,
                name,
            } => self.invoke(session_id, instance_id, name).await,
            ClientCommand::RequestObject { id, source } => {
                self.request_object(id, source);
                Ok(())
            },
            // Reserved no-ops (spec.md §9 open question).
            ClientCommand::AppendPyClass { .. }
            | ClientCommand::AppendClassMethodArg { .. }
            | ClientCommand::MarkDAGNodeDone { .. } => {
                self.push(ServerCommand::ack_ok()).await;
                Ok(())
            },
        }
    }

    async fn append_py_func(
        &mut self,
        name: String,
        params: Vec<String>,
        requirements: Vec<String>,
        pickled_object: Vec<u8>,
        language: Language,
        replicas: u32,
        resources: cc_proto::Resources,
    ) -> anyhow::Result<()> {
        let mut actors = Vec::with_capacity(replicas as usize);
        for _ in 0..replicas {
            let component = self
                .component_service
                .deploy(&name, language.runtime_env(), resources)
                .await?;

            self.transport.send(
                &component.id,
                WorkerInbound::Function {
                    name: name.clone(),
                    params: params.clone(),
                    requirements: requirements.clone(),
                    pickled_object: pickled_object.clone(),
                    language,
                },
            )?;

            self.spawn_worker_receive_loop(component.id.clone());

            actors.push(Actor {
                id: component.id.clone(),
                worker_id: component.id,
                latency: Latency::default(),
            });
        }

        info!(app_id = %self.app_id, function = %name, replicas, "function deployed");
        let pool = ActorPool::spawn(name.clone(), actors);
        self.nodes
            .insert(name.clone(), FunctionNode::new(name.clone(), params, requirements, language, pool));
        self.events.publish(ControllerEvent::FunctionDeployed { name, replicas });
        metrics::FUNCTIONS_DEPLOYED.inc();
        Ok(())
    }

    fn spawn_worker_receive_loop(&self, worker_id: String) {
        let controller = self.self_handle.clone();
        let transport = self.transport.clone();
        tokio::spawn(async move {
            while let Some(msg) = transport.recv(&worker_id).await {
                controller.handle_worker(msg);
            }
        });
    }

    fn append_data(&self, session_id: String, object: EncodedObject) {
        let store = self.store.clone();
        let controller = self.self_handle.clone();
        tokio::spawn(async move {
            let result = store.save_object(object.into()).await;
            controller.tx_data_saved(session_id, result);
        });
    }

    async fn handle_data_saved(&self, session_id: String, result: anyhow::Result<ObjectRef>) {
        match result {
            Ok(obj_ref) => {
                self.push(ServerCommand::return_result(
                    session_id,
                    "",
                    obj_ref.id.clone(),
                    InvokeOutcome::Value(obj_ref),
                ))
                .await;
            },
            Err(err) => {
                self.push(ServerCommand::return_result(
                    session_id,
                    "",
                    "",
                    InvokeOutcome::Error(err.to_string()),
                ))
                .await;
            },
        }
    }

    async fn append_arg(
        &mut self,
        session_id: String,
        instance_id: String,
        name: String,
        param: String,
        value: cc_proto::ArgValue,
    ) -> anyhow::Result<()> {
        match value {
            cc_proto::ArgValue::Ref(obj_ref) => {
                self.add_arg_to_runtime(&name, &session_id, &instance_id, param, obj_ref)
                    .await?;
            },
            cc_proto::ArgValue::Encoded(encoded) => {
                let store = self.store.clone();
                let controller = self.self_handle.clone();
                tokio::spawn(async move {
                    let result = store.save_object(encoded.into()).await;
                    controller.tx_arg_saved(session_id, instance_id, name, param, result);
                });
            },
        }
        Ok(())
    }

    async fn handle_arg_saved(
        &mut self,
        session_id: String,
        instance_id: String,
        function_name: String,
        param: String,
        result: anyhow::Result<ObjectRef>,
    ) {
        match result {
            Ok(obj_ref) => {
                self.push(ServerCommand::return_result(
                    session_id.clone(),
                    instance_id.clone(),
                    param.clone(),
                    InvokeOutcome::Value(obj_ref.clone()),
                ))
                .await;
                if let Err(err) = self
                    .add_arg_to_runtime(&function_name, &session_id, &instance_id, param, obj_ref)
                    .await
                {
                    warn!(error = %err, "failed to apply saved argument to its runtime");
                }
            },
            Err(err) => {
                self.push(ServerCommand::return_result(
                    session_id,
                    instance_id,
                    param,
                    InvokeOutcome::Error(err.to_string()),
                ))
                .await;
            },
        }
    }

    /// Resolves or creates the Runtime for `(name, session, instance)`,
    /// applies `AddArg`, and dispatches `Invoke` if it had been requested
    /// ahead of readiness (spec.md §8 S3).
    async fn add_arg_to_runtime(
        &mut self,
        name: &str,
        session_id: &str,
        instance_id: &str,
        param: String,
        value: ObjectRef,
    ) -> anyhow::Result<()> {
        let node = self
            .nodes
            .get_mut(name)
            .ok_or_else(|| anyhow::anyhow!(ErrorMetadata::not_found(format!("no function node named {name:?}"))))?;
        let runtime_id = node.runtime(session_id, instance_id).await?;
        let rt = node
            .get_mut(&runtime_id)
            .expect("just created or found this runtime");
        rt.add_arg(param, value);

        if rt.is_ready() && rt.take_invoke_requested() {
            self.dispatch_invoke(name, &runtime_id)?;
        }
        Ok(())
    }

    async fn invoke(&mut self, session_id: String, instance_id: String, name: String) -> anyhow::Result<()> {
        let node = self.nodes.get_mut(&name).ok_or_else(|| {
            anyhow::anyhow!(ErrorMetadata::not_found(format!("no function node named {name:?}")))
        })?;
        let runtime_id = node.runtime(&session_id, &instance_id).await?;
        let rt = node
            .get_mut(&runtime_id)
            .expect("just created or found this runtime");

        if rt.is_ready() {
            self.dispatch_invoke(&name, &runtime_id)?;
        } else {
            rt.request_invoke();
        }
        Ok(())
    }

    fn dispatch_invoke(&mut self, name: &str, runtime_id: &str) -> anyhow::Result<()> {
        let node = self.nodes.get_mut(name).expect("caller already resolved this node");
        let rt = node.get_mut(runtime_id).expect("caller already resolved this runtime");
        let worker_id = rt
            .bound_worker_id()
            .ok_or_else(|| anyhow::anyhow!(ErrorMetadata::no_actor()))?
            .to_string();
        let args = rt
            .invoke()?
            .into_iter()
            .map(|(param, value)| InvokeArg { param, value })
            .collect();
        self.transport.send(
            &worker_id,
            WorkerInbound::InvokeRequest {
                runtime_id: runtime_id.to_string(),
                args,
            },
        )?;
        metrics::INVOCATIONS_DISPATCHED.inc();
        Ok(())
    }

    fn request_object(&self, id: String, _source: String) {
        let store = self.store.clone();
        let outbound = self.outbound.clone();
        tokio::spawn(async move {
            let frame = match store.get_object(&id, None, None).await {
                Ok(obj) => ServerFrame::new(ServerCommand::ResponseObject {
                    id: obj.id.clone(),
                    value: Some(EncodedObject {
                        id: obj.id,
                        language: obj.language,
                        data: obj.data,
                    }),
                    error: None,
                }),
                Err(err) => ServerFrame::new(ServerCommand::ResponseObject {
                    id,
                    value: None,
                    error: Some(err.to_string()),
                }),
            };
            if let Some(outbound) = outbound {
                let _ = outbound.send(frame).await;
            }
        });
    }

    async fn handle_worker_message(&mut self, msg: WorkerOutbound) {
        let WorkerOutbound::InvokeResponse {
            session_id: runtime_id,
            result,
            actor_info,
            error,
        } = msg
        else {
            // `Ready`: the transport already used this to release
            // anything queued ahead of attachment (spec.md §4.2); nothing
            // left for the Controller to do with it.
            return;
        };

        let Ok((name, session, instance)) = ids::split_runtime_id(&runtime_id) else {
            warn!(runtime_id = %runtime_id, "malformed runtime id in worker response, dropping");
            return;
        };
        let (name, session, instance) = (name.to_string(), session.to_string(), instance.to_string());

        let Some(node) = self.nodes.get_mut(&name) else {
            warn!(runtime_id = %runtime_id, "worker response for unknown function node, dropping");
            return;
        };
        if !node.contains(&runtime_id) {
            warn!(runtime_id = %runtime_id, "runtime not found, dropping orphaned response");
            return;
        }

        if let Some(error) = error {
            self.events.publish(ControllerEvent::RuntimeFailed {
                runtime_id: runtime_id.clone(),
                error: error.clone(),
            });
            metrics::INVOCATIONS_COMPLETED.with_label_values(&["error"]).inc();
            self.push(ServerCommand::return_result(
                session,
                instance,
                name.clone(),
                InvokeOutcome::Error(error),
            ))
            .await;
            self.nodes.get_mut(&name).unwrap().remove(&runtime_id);
            return;
        }

        let node = self.nodes.get_mut(&name).unwrap();
        let rt = node.get_mut(&runtime_id).unwrap();
        let actor = rt.complete(actor_info.calc_latency_ms);
        node.remove(&runtime_id);
        if let Some(actor) = actor {
            node.pool.push(actor);
        }
        self.events.publish(ControllerEvent::RuntimeCompleted {
            runtime_id: runtime_id.clone(),
        });
        metrics::INVOCATIONS_COMPLETED.with_label_values(&["ok"]).inc();

        let outcome = match result {
            Some(object_ref) => InvokeOutcome::Value(object_ref),
            None => InvokeOutcome::Error("worker returned no result and no error".to_string()),
        };
        self.push(ServerCommand::return_result(session, instance, name, outcome))
            .await;
    }
}

impl Controller {
    fn tx_data_saved(&self, session_id: String, result: anyhow::Result<ObjectRef>) {
        let _ = self.tx.send(ControllerCommand::DataSaved { session_id, result });
    }

    fn tx_arg_saved(
        &self,
        session_id: String,
        instance_id: String,
        function_name: String,
        param: String,
        result: anyhow::Result<ObjectRef>,
    ) {
        let _ = self.tx.send(ControllerCommand::ArgSaved {
            session_id,
            instance_id,
            function_name,
            param,
            result,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Mutex,
        time::Duration,
    };

    use async_trait::async_trait;
    use cc_proto::{ActorInfo, ArgValue, EncodedObject, Resources};
    use cc_provider::{ChannelWorkerTransport, ComponentProvider, ComponentService, ProviderStatus};
    use tokio::time::timeout;

    use super::*;

    /// A `ComponentProvider` that records the ids it was asked to deploy,
    /// so tests can find the worker a `Controller` just stood up without
    /// reaching into its private state.
    struct RecordingProvider {
        available: Resources,
        deployed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ComponentProvider for RecordingProvider {
        fn id(&self) -> &str {
            "recording"
        }

        fn status(&self) -> ProviderStatus {
            ProviderStatus::Connected
        }

        fn available(&self) -> Resources {
            self.available
        }

        async fn deploy(&self, id: &str, _image: &str, _request: Resources) -> anyhow::Result<()> {
            self.deployed.lock().unwrap().push(id.to_string());
            Ok(())
        }
    }

    fn ample_resources() -> Resources {
        Resources {
            cpu: 1000,
            memory: 1 << 30,
            gpu: 0,
        }
    }

    fn small_resources() -> Resources {
        Resources {
            cpu: 100,
            memory: 1 << 20,
            gpu: 0,
        }
    }

    async fn deploy_add_function(
        controller: &Controller,
        transport: &Arc<ChannelWorkerTransport>,
        provider: &Arc<RecordingProvider>,
    ) -> (String, mpsc::UnboundedReceiver<WorkerInbound>) {
        controller
            .handle_client(ClientCommand::AppendPyFunc {
                name: "add".to_string(),
                params: vec!["x".to_string(), "y".to_string()],
                requirements: vec![],
                pickled_object: vec![],
                language: Language::Python,
                replicas: 1,
                resources: small_resources(),
            })
            .await
            .unwrap();
        let worker_id = provider.deployed.lock().unwrap()[0].clone();
        let mut inbound = transport.take_inbound(&worker_id).unwrap();
        // The function-code upload was sent before the worker attached, so
        // it sits queued (spec.md §4.2) until the worker signals `Ready`.
        transport.deliver_from_worker(&worker_id, WorkerOutbound::Ready).await.unwrap();
        // The initial function-code upload precedes any invocation.
        assert!(matches!(
            inbound.recv().await.unwrap(),
            WorkerInbound::Function { .. }
        ));
        (worker_id, inbound)
    }

    // S1: simple invocation round-trip.
    #[tokio::test]
    async fn simple_invocation_round_trip() {
        let transport = Arc::new(ChannelWorkerTransport::new());
        let provider = Arc::new(RecordingProvider {
            available: ample_resources(),
            deployed: Mutex::new(vec![]),
        });
        let images = HashMap::from([("python".to_string(), "golem/python:3.11".to_string())]);
        let service = Arc::new(ComponentService::new(
            images,
            vec![provider.clone()],
            transport.clone(),
        ));
        let controller = Controller::spawn("A", Store::spawn(), service, transport.clone());

        let (outbound_tx, mut outbound_rx) = mpsc::channel(100);
        controller.install_outbound(outbound_tx).await.unwrap();

        let (worker_id, mut inbound) = deploy_add_function(&controller, &transport, &provider).await;

        controller
            .handle_client(ClientCommand::AppendArg {
                session_id: "s1".to_string(),
                instance_id: "i1".to_string(),
                name: "add".to_string(),
                param: "x".to_string(),
                value: ArgValue::Encoded(EncodedObject {
                    id: "obj.x".to_string(),
                    language: Language::Json,
                    data: vec![1],
                }),
            })
            .await
            .unwrap();
        let ack_x = outbound_rx.recv().await.unwrap();
        assert!(matches!(ack_x.command, ServerCommand::ReturnResult { .. }));

        controller
            .handle_client(ClientCommand::AppendArg {
                session_id: "s1".to_string(),
                instance_id: "i1".to_string(),
                name: "add".to_string(),
                param: "y".to_string(),
                value: ArgValue::Encoded(EncodedObject {
                    id: "obj.y".to_string(),
                    language: Language::Json,
                    data: vec![2],
                }),
            })
            .await
            .unwrap();
        let ack_y = outbound_rx.recv().await.unwrap();
        assert!(matches!(ack_y.command, ServerCommand::ReturnResult { .. }));

        controller
            .handle_client(ClientCommand::Invoke {
                session_id: "s1".to_string(),
                instance_id: "i1".to_string(),
                name: "add".to_string(),
            })
            .await
            .unwrap();

        let WorkerInbound::InvokeRequest { runtime_id, args } = inbound.recv().await.unwrap() else {
            panic!("expected an InvokeRequest");
        };
        assert_eq!(runtime_id, "add::s1::i1");
        assert_eq!(
            args.iter().map(|a| a.param.as_str()).collect::<Vec<_>>(),
            vec!["x", "y"]
        );

        transport
            .deliver_from_worker(
                &worker_id,
                WorkerOutbound::InvokeResponse {
                    session_id: runtime_id,
                    result: Some(ObjectRef {
                        id: "obj.r".to_string(),
                        source: "S0".to_string(),
                    }),
                    actor_info: ActorInfo { calc_latency_ms: 5 },
                    error: None,
                },
            )
            .await
            .unwrap();

        let result_frame = outbound_rx.recv().await.unwrap();
        let ServerCommand::ReturnResult {
            session_id,
            instance_id,
            name,
            result,
        } = result_frame.command
        else {
            panic!("expected a ReturnResult frame");
        };
        assert_eq!(session_id, "s1");
        assert_eq!(instance_id, "i1");
        assert_eq!(name, "add");
        assert!(matches!(result, InvokeOutcome::Value(r) if r.id == "obj.r"));
    }

    // S3: Invoke sent before args arrive only dispatches once every
    // declared parameter has been added.
    #[tokio::test]
    async fn invoke_waits_for_every_declared_argument() {
        let transport = Arc::new(ChannelWorkerTransport::new());
        let provider = Arc::new(RecordingProvider {
            available: ample_resources(),
            deployed: Mutex::new(vec![]),
        });
        let images = HashMap::from([("python".to_string(), "golem/python:3.11".to_string())]);
        let service = Arc::new(ComponentService::new(
            images,
            vec![provider.clone()],
            transport.clone(),
        ));
        let controller = Controller::spawn("A", Store::spawn(), service, transport.clone());
        let (_worker_id, mut inbound) = deploy_add_function(&controller, &transport, &provider).await;

        controller
            .handle_client(ClientCommand::Invoke {
                session_id: "s1".to_string(),
                instance_id: "i1".to_string(),
                name: "add".to_string(),
            })
            .await
            .unwrap();
        assert!(timeout(Duration::from_millis(50), inbound.recv()).await.is_err());

        controller
            .handle_client(ClientCommand::AppendArg {
                session_id: "s1".to_string(),
                instance_id: "i1".to_string(),
                name: "add".to_string(),
                param: "x".to_string(),
                value: ArgValue::Ref(ObjectRef {
                    id: "obj.x".to_string(),
                    source: "store.x".to_string(),
                }),
            })
            .await
            .unwrap();
        assert!(timeout(Duration::from_millis(50), inbound.recv()).await.is_err());

        controller
            .handle_client(ClientCommand::AppendArg {
                session_id: "s1".to_string(),
                instance_id: "i1".to_string(),
                name: "add".to_string(),
                param: "y".to_string(),
                value: ArgValue::Ref(ObjectRef {
                    id: "obj.y".to_string(),
                    source: "store.x".to_string(),
                }),
            })
            .await
            .unwrap();
        let msg = timeout(Duration::from_millis(100), inbound.recv())
            .await
            .expect("InvokeRequest should arrive promptly once ready")
            .unwrap();
        assert!(matches!(msg, WorkerInbound::InvokeRequest { .. }));
    }

    // S6: no provider has enough capacity, AppendPyFunc fails and no
    // component is left registered.
    #[tokio::test]
    async fn append_py_func_fails_with_no_capacity() {
        let transport = Arc::new(ChannelWorkerTransport::new());
        let provider = Arc::new(RecordingProvider {
            available: Resources {
                cpu: 1,
                memory: 1,
                gpu: 0,
            },
            deployed: Mutex::new(vec![]),
        });
        let images = HashMap::from([("python".to_string(), "golem/python:3.11".to_string())]);
        let service = Arc::new(ComponentService::new(
            images,
            vec![provider.clone()],
            transport.clone(),
        ));
        let controller = Controller::spawn("A", Store::spawn(), service, transport.clone());

        let err = controller
            .handle_client(ClientCommand::AppendPyFunc {
                name: "add".to_string(),
                params: vec!["x".to_string(), "y".to_string()],
                requirements: vec![],
                pickled_object: vec![],
                language: Language::Python,
                replicas: 1,
                resources: small_resources(),
            })
            .await
            .unwrap_err();
        assert!(cc_errors::ErrorMetadataExt::code(&err) == cc_errors::ErrorCode::NoCapacity);
        assert!(provider.deployed.lock().unwrap().is_empty());
    }

    // Supplemented feature: the event hub fires FunctionDeployed and
    // RuntimeCompleted alongside the normal client-facing responses.
    #[tokio::test]
    async fn event_hub_reports_deploy_and_completion() {
        let transport = Arc::new(ChannelWorkerTransport::new());
        let provider = Arc::new(RecordingProvider {
            available: ample_resources(),
            deployed: Mutex::new(vec![]),
        });
        let images = HashMap::from([("python".to_string(), "golem/python:3.11".to_string())]);
        let service = Arc::new(ComponentService::new(
            images,
            vec![provider.clone()],
            transport.clone(),
        ));
        let controller = Controller::spawn("A", Store::spawn(), service, transport.clone());
        let mut events = controller.subscribe_events();

        let (worker_id, mut inbound) = deploy_add_function(&controller, &transport, &provider).await;
        let deployed = events.recv().await.unwrap();
        assert!(matches!(
            deployed,
            ControllerEvent::FunctionDeployed { name, replicas } if name == "add" && replicas == 1
        ));

        controller
            .handle_client(ClientCommand::AppendArg {
                session_id: "s1".to_string(),
                instance_id: "i1".to_string(),
                name: "add".to_string(),
                param: "x".to_string(),
                value: ArgValue::Ref(ObjectRef {
                    id: "obj.x".to_string(),
                    source: "store.x".to_string(),
                }),
            })
            .await
            .unwrap();
        controller
            .handle_client(ClientCommand::AppendArg {
                session_id: "s1".to_string(),
                instance_id: "i1".to_string(),
                name: "add".to_string(),
                param: "y".to_string(),
                value: ArgValue::Ref(ObjectRef {
                    id: "obj.y".to_string(),
                    source: "store.x".to_string(),
                }),
            })
            .await
            .unwrap();
        controller
            .handle_client(ClientCommand::Invoke {
                session_id: "s1".to_string(),
                instance_id: "i1".to_string(),
                name: "add".to_string(),
            })
            .await
            .unwrap();
        let WorkerInbound::InvokeRequest { runtime_id, .. } = inbound.recv().await.unwrap() else {
            panic!("expected an InvokeRequest");
        };
        transport
            .deliver_from_worker(
                &worker_id,
                WorkerOutbound::InvokeResponse {
                    session_id: runtime_id.clone(),
                    result: Some(ObjectRef {
                        id: "obj.r".to_string(),
                        source: "S0".to_string(),
                    }),
                    actor_info: ActorInfo { calc_latency_ms: 5 },
                    error: None,
                },
            )
            .await
            .unwrap();

        let completed = events.recv().await.unwrap();
        assert!(matches!(
            completed,
            ControllerEvent::RuntimeCompleted { runtime_id: rid } if rid == runtime_id
        ));
    }

    // A second session attempt fails SessionAlreadyActive while the first
    // session's outbound channel stays installed (P1).
    #[tokio::test]
    async fn install_outbound_rejects_a_second_concurrent_session() {
        let transport = Arc::new(ChannelWorkerTransport::new());
        let service = Arc::new(ComponentService::new(HashMap::new(), vec![], transport.clone()));
        let controller = Controller::spawn("A", Store::spawn(), service, transport.clone());

        let (tx1, _rx1) = mpsc::channel(100);
        controller.install_outbound(tx1).await.unwrap();

        let (tx2, _rx2) = mpsc::channel(100);
        let err = controller.install_outbound(tx2).await.unwrap_err();
        assert_eq!(
            cc_errors::ErrorMetadataExt::code(&err),
            cc_errors::ErrorCode::SessionAlreadyActive
        );
    }
}
