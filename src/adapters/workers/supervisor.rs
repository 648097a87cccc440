//! Owns the background reconcilers and their shared shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::reconciler::{run_periodic, Reconciler};

/// How a supervised task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerExit {
    pub name: &'static str,
    /// `Err` carries the panic or cancellation message.
    pub result: Result<(), String>,
}

/// Spawns reconcilers and blocks shutdown until all of them returned.
pub struct WorkerSupervisor {
    shutdown: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl WorkerSupervisor {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shutdown,
            tasks: Vec::new(),
        }
    }

    /// Starts `reconciler` on its own task, ticking every `interval`.
    pub fn spawn(&mut self, reconciler: Arc<dyn Reconciler>, interval: Duration) {
        let name = reconciler.name();
        let handle = tokio::spawn(run_periodic(reconciler, interval, self.shutdown.subscribe()));
        self.tasks.push((name, handle));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Signals cancellation and waits for every task to return.
    pub async fn shutdown(self) -> Vec<WorkerExit> {
        // Only fails with no receivers, i.e. nothing left to stop.
        let _ = self.shutdown.send(true);

        let mut exits = Vec::with_capacity(self.tasks.len());
        for (name, handle) in self.tasks {
            let result = handle.await.map_err(|e| e.to_string());
            match &result {
                Ok(()) => tracing::info!(worker = name, "Worker exited"),
                Err(e) => tracing::error!(worker = name, error = %e, "Worker ended abnormally"),
            }
            exits.push(WorkerExit { name, result });
        }
        exits
    }
}

impl Default for WorkerSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::workers::SweepReport;
    use crate::domain::foundation::DomainError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Named {
        name: &'static str,
        sweeps: AtomicUsize,
        panic: bool,
    }

    #[async_trait]
    impl Reconciler for Named {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn sweep(&self) -> Result<SweepReport, DomainError> {
            self.sweeps.fetch_add(1, Ordering::SeqCst);
            if self.panic {
                panic!("sweep blew up");
            }
            Ok(SweepReport::default())
        }
    }

    fn named(name: &'static str, panic: bool) -> Arc<Named> {
        Arc::new(Named {
            name,
            sweeps: AtomicUsize::new(0),
            panic,
        })
    }

    #[tokio::test]
    async fn shutdown_waits_for_every_worker() {
        let a = named("a", false);
        let b = named("b", false);
        let mut supervisor = WorkerSupervisor::new();
        supervisor.spawn(a.clone(), Duration::from_millis(5));
        supervisor.spawn(b.clone(), Duration::from_millis(5));
        assert_eq!(supervisor.len(), 2);

        tokio::time::sleep(Duration::from_millis(30)).await;
        let exits = supervisor.shutdown().await;

        assert_eq!(
            exits,
            vec![
                WorkerExit { name: "a", result: Ok(()) },
                WorkerExit { name: "b", result: Ok(()) },
            ]
        );
        assert!(a.sweeps.load(Ordering::SeqCst) >= 1);
        assert!(b.sweeps.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn panicking_worker_is_reported() {
        let mut supervisor = WorkerSupervisor::new();
        supervisor.spawn(named("boom", true), Duration::from_millis(5));
        supervisor.spawn(named("fine", false), Duration::from_millis(5));

        tokio::time::sleep(Duration::from_millis(30)).await;
        let exits = supervisor.shutdown().await;

        assert_eq!(exits[0].name, "boom");
        assert!(exits[0].result.is_err());
        assert_eq!(exits[1].result, Ok(()));
    }

    #[tokio::test]
    async fn shutdown_with_no_workers_returns_immediately() {
        let supervisor = WorkerSupervisor::default();
        assert!(supervisor.is_empty());
        assert!(supervisor.shutdown().await.is_empty());
    }
}
