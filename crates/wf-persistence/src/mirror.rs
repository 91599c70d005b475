// Archivo: mirror.rs
// Propósito: worker de un solo hilo que aplica escrituras espejo
// best-effort sobre el store secundario.
//
// Las escrituras se encolan en un canal acotado y se aplican en orden de
// despacho. Un fallo (error o panic) se registra y se cuenta; nunca se
// propaga a quien despachó. Con la cola llena el trabajo se descarta.
use flow::{FlowError, Result};
use log::{debug, warn};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Trabajo de espejo: una escritura sobre el secundario.
pub type MirrorJob = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// Configuración del worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorPolicy {
    /// Trabajos pendientes admitidos antes de empezar a descartar.
    pub queue_capacity: usize,
    pub thread_name: String,
}

impl Default for MirrorPolicy {
    fn default() -> Self {
        Self { queue_capacity: 1024, thread_name: "storage-mirror-0".to_string() }
    }
}

/// Contadores observables del worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorStats {
    pub dispatched: u64,
    pub applied: u64,
    pub failed: u64,
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    dispatched: AtomicU64,
    applied: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    pending: AtomicUsize,
}

pub struct MirrorWorker {
    sender: Mutex<Option<SyncSender<MirrorJob>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl MirrorWorker {
    /// Arranca el hilo del worker.
    pub fn start(policy: &MirrorPolicy) -> Result<Self> {
        let (tx, rx) = mpsc::sync_channel::<MirrorJob>(policy.queue_capacity.max(1));
        let counters = Arc::new(Counters::default());
        let worker_counters = counters.clone();
        let handle = thread::Builder::new().name(policy.thread_name.clone())
                                           .spawn(move || {
                                               for job in rx {
                                                   apply(job, &worker_counters);
                                               }
                                               debug!("mirror worker detenido");
                                           })
                                           .map_err(|e| {
                                               FlowError::Other(format!("no se pudo lanzar {}: {}", policy.thread_name, e))
                                           })?;
        Ok(Self { sender: Mutex::new(Some(tx)), handle: Mutex::new(Some(handle)), counters })
    }

    /// Encola `job` sin bloquear. `what` sólo se usa para los logs.
    pub fn dispatch(&self, what: &str, job: MirrorJob) {
        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        let tx = match sender.as_ref() {
            Some(tx) => tx,
            None => {
                self.counters.dropped.fetch_add(1, Ordering::SeqCst);
                warn!("mirror detenido, se descarta {}", what);
                return;
            }
        };
        self.counters.pending.fetch_add(1, Ordering::SeqCst);
        match tx.try_send(job) {
            Ok(()) => {
                self.counters.dispatched.fetch_add(1, Ordering::SeqCst);
            }
            Err(TrySendError::Full(_)) => {
                self.counters.pending.fetch_sub(1, Ordering::SeqCst);
                self.counters.dropped.fetch_add(1, Ordering::SeqCst);
                warn!("cola del mirror llena, se descarta {}", what);
            }
            Err(TrySendError::Disconnected(_)) => {
                self.counters.pending.fetch_sub(1, Ordering::SeqCst);
                self.counters.dropped.fetch_add(1, Ordering::SeqCst);
                warn!("mirror desconectado, se descarta {}", what);
            }
        }
    }

    pub fn stats(&self) -> MirrorStats {
        MirrorStats { dispatched: self.counters.dispatched.load(Ordering::SeqCst),
                      applied: self.counters.applied.load(Ordering::SeqCst),
                      failed: self.counters.failed.load(Ordering::SeqCst),
                      dropped: self.counters.dropped.load(Ordering::SeqCst) }
    }

    /// Espera hasta que no queden trabajos pendientes o venza `timeout`.
    /// Devuelve `true` si la cola quedó vacía.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.counters.pending.load(Ordering::SeqCst) > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        true
    }

    /// Cierra el canal y espera a que el hilo drene lo encolado.
    pub fn shutdown(&self) {
        self.sender.lock().unwrap_or_else(|e| e.into_inner()).take();
        let handle = self.handle.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("el hilo del mirror terminó con panic");
            }
        }
    }
}

impl Drop for MirrorWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn apply(job: MirrorJob, counters: &Counters) {
    match catch_unwind(AssertUnwindSafe(job)) {
        Ok(Ok(())) => {
            counters.applied.fetch_add(1, Ordering::SeqCst);
        }
        Ok(Err(e)) => {
            counters.failed.fetch_add(1, Ordering::SeqCst);
            warn!("escritura espejo fallida: {}", e);
        }
        Err(_) => {
            counters.failed.fetch_add(1, Ordering::SeqCst);
            warn!("escritura espejo abortada por panic");
        }
    }
    counters.pending.fetch_sub(1, Ordering::SeqCst);
}
