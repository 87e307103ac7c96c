//! The service orchestrator
//!
//! One entry point per lifecycle operation. Each accepted operation
//! persists its transitional state before any remote call, runs the
//! compose engine through a pooled client, forwards engine output live,
//! and persists the terminal state once the remote outcome is known. The
//! driver is a spawned task, so an abandoned handle never leaves the
//! persisted record stuck in a transitional state.

use std::sync::{Arc, Mutex};

use sv_core::error::OrchestrationError;
use sv_core::naming;
use sv_core::repository::{Repository, ServiceRecord};
use sv_core::time::current_time_secs;
use sv_core::types::{ClientKind, ServiceOp, ServiceState, TransitionPlan};
use sv_pool::{ConnectionFactory, ConnectionPool, DialSpec};
use tokio::sync::{mpsc, oneshot};

use crate::compose::ComposeFile;
use crate::engine::{ComposeEngine, ComposeOp, EngineStream};
use crate::operation::ServiceOperation;

const EVENT_CHANNEL_CAPACITY: usize = 256;

pub struct ServiceOrchestrator<F: ConnectionFactory, E> {
    repository: Arc<dyn Repository>,
    pool: Arc<ConnectionPool<F>>,
    engine: Arc<E>,
}

impl<F, E> ServiceOrchestrator<F, E>
where
    F: ConnectionFactory,
    E: ComposeEngine<F::Client> + 'static,
{
    pub fn new(repository: Arc<dyn Repository>, pool: Arc<ConnectionPool<F>>, engine: Arc<E>) -> Self {
        Self {
            repository,
            pool,
            engine,
        }
    }

    /// Bring the service up. Legal only from `Stopped`.
    pub async fn start(&self, service_id: &str) -> Result<ServiceOperation, OrchestrationError> {
        self.run(service_id, ServiceOp::Start).await
    }

    /// Take the service down. Legal only from `Running`.
    pub async fn stop(&self, service_id: &str) -> Result<ServiceOperation, OrchestrationError> {
        self.run(service_id, ServiceOp::Stop).await
    }

    /// Restart the service's containers. Legal only from `Running`.
    pub async fn restart(&self, service_id: &str) -> Result<ServiceOperation, OrchestrationError> {
        self.run(service_id, ServiceOp::Restart).await
    }

    async fn run(
        &self,
        service_id: &str,
        op: ServiceOp,
    ) -> Result<ServiceOperation, OrchestrationError> {
        let mut service = self.repository.get_service(service_id).await?;
        let plan = service.state.plan(op)?;
        tracing::info!(service = %service.id, op = %op, from = %service.state, "accepted service operation");

        // The transitional state is the concurrency gate: once persisted, a
        // second request for this service fails its plan() check.
        service.state = plan.transitional;
        self.repository
            .update_service_state(&service)
            .await
            .map_err(|e| OrchestrationError::StatePersist(e.to_string()))?;

        let stream = match self.launch(&service, op).await {
            Ok(stream) => stream,
            Err(err) => {
                // Nothing ran remotely; move the record to the failure
                // target so the service is not stuck transitional.
                self.persist_state(&mut service, plan.on_failure).await;
                return Err(err);
            }
        };

        let (logs_tx, logs_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (errors_tx, errors_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (done_tx, done_rx) = oneshot::channel();
        let final_error = Arc::new(Mutex::new(None));

        tokio::spawn(drive(
            Arc::clone(&self.repository),
            service,
            plan,
            stream,
            logs_tx,
            errors_tx,
            done_tx,
            Arc::clone(&final_error),
        ));

        Ok(ServiceOperation::new(logs_rx, errors_rx, done_rx, final_error))
    }

    /// Resolve collaborators, validate the compose definition, and start
    /// the engine. Everything here happens before any container moves.
    async fn launch(
        &self,
        service: &ServiceRecord,
        op: ServiceOp,
    ) -> Result<EngineStream, OrchestrationError> {
        let server = self.repository.get_server(&service.server_id).await?;
        let key = self.repository.get_private_key(&server.key_id).await?;
        let config = self.repository.get_compose_config(&service.compose_id).await?;

        ComposeFile::parse(&config.yaml)?;

        let spec = DialSpec {
            id: naming::connection_id(&service.team_id, &service.server_id, &service.id),
            host: server.host,
            key_pem: key.pem,
            kind: ClientKind::DockerTunnel,
        };
        let client = self.pool.get(&spec).await?;

        let project = naming::project_name(&service.name, &service.id);
        self.engine
            .run(&client, &project, &config.yaml, compose_op(op))
            .await
    }

    async fn persist_state(&self, service: &mut ServiceRecord, state: ServiceState) {
        service.state = state;
        if let Err(err) = self.repository.update_service_state(service).await {
            tracing::error!(service = %service.id, state = %state, error = %err, "failed to persist service state");
        }
    }
}

fn compose_op(op: ServiceOp) -> ComposeOp {
    match op {
        ServiceOp::Start => ComposeOp::Up,
        ServiceOp::Stop => ComposeOp::Down,
        ServiceOp::Restart => ComposeOp::Restart,
    }
}

fn set_final_error(slot: &Mutex<Option<OrchestrationError>>, err: OrchestrationError) {
    match slot.lock() {
        Ok(mut guard) => *guard = Some(err),
        Err(poisoned) => *poisoned.into_inner() = Some(err),
    }
}

/// Forward engine output and settle the terminal state.
///
/// Runs detached from the caller's handle. The success path persists the
/// terminal state durably before the done signal fires; the failure path
/// surfaces the error on the error channel and as the handle's final
/// error.
#[allow(clippy::too_many_arguments)]
async fn drive(
    repository: Arc<dyn Repository>,
    mut service: ServiceRecord,
    plan: TransitionPlan,
    mut stream: EngineStream,
    logs_tx: mpsc::Sender<String>,
    errors_tx: mpsc::Sender<String>,
    done_tx: oneshot::Sender<ServiceState>,
    final_error: Arc<Mutex<Option<OrchestrationError>>>,
) {
    let mut logs_open = true;
    let mut errors_open = true;
    let mut outcome: Option<Result<(), OrchestrationError>> = None;
    let mut done = stream.done;

    while logs_open || errors_open || outcome.is_none() {
        tokio::select! {
            line = stream.logs.recv(), if logs_open => match line {
                Some(line) => {
                    let _ = logs_tx.send(line).await;
                }
                None => logs_open = false,
            },
            line = stream.errors.recv(), if errors_open => match line {
                Some(line) => {
                    let _ = errors_tx.send(line).await;
                }
                None => errors_open = false,
            },
            res = &mut done, if outcome.is_none() => {
                outcome = Some(res.unwrap_or_else(|_| {
                    Err(OrchestrationError::Interrupted(
                        "engine ended without reporting an outcome".to_string(),
                    ))
                }));
            }
        }
    }

    let outcome = match outcome {
        Some(outcome) => outcome,
        None => Err(OrchestrationError::Interrupted(
            "engine ended without reporting an outcome".to_string(),
        )),
    };

    let terminal = match outcome {
        Ok(()) => {
            if plan.stamps_deployment {
                service.deployed_at = Some(current_time_secs());
            }
            service.state = plan.on_success;
            match repository.update_service_state(&service).await {
                Ok(()) => {
                    tracing::info!(service = %service.id, state = %plan.on_success, "service operation succeeded");
                }
                Err(err) => {
                    // The containers moved but the record did not. The
                    // caller has to hear about the disagreement.
                    let persist = OrchestrationError::StatePersist(err.to_string());
                    tracing::error!(service = %service.id, error = %persist, "terminal persist failed after remote success");
                    let _ = errors_tx.send(persist.to_string()).await;
                    set_final_error(&final_error, persist);
                }
            }
            plan.on_success
        }
        Err(err) => {
            tracing::warn!(service = %service.id, error = %err, "service operation failed");
            let _ = errors_tx.send(err.to_string()).await;
            set_final_error(&final_error, err);
            service.state = plan.on_failure;
            if let Err(persist_err) = repository.update_service_state(&service).await {
                tracing::error!(service = %service.id, error = %persist_err, "failed to persist failure state");
            }
            plan.on_failure
        }
    };

    drop(logs_tx);
    drop(errors_tx);
    let _ = done_tx.send(terminal);
}
