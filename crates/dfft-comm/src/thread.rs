//! In-process transport: every rank is a scoped OS thread.
//!
//! Ranks rendezvous on a per-communicator hub guarded by a mutex and a
//! generation-counting barrier. Each collective deposits its contribution,
//! waits for the whole group, reads, then waits again so that no rank can
//! overwrite a deposit that a peer has not consumed yet.
//!
//! All hubs of one universe share an abort flag. Raising it wakes every rank
//! blocked in any hub, which turns a local failure into an orderly,
//! group-wide `CommError::Aborted` instead of a hang.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};
use std::thread;

use log::{debug, error};
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::{CommError, Communicator, check_exchange_lengths, check_grid};

/// Exit code used when a rank dies from a panic or could not be started.
pub const PANIC_ABORT_CODE: i32 = 101;

#[derive(Debug, Default)]
struct UniverseState {
    abort_code: OnceLock<i32>,
    hubs: Mutex<Vec<Weak<Hub>>>,
}

impl UniverseState {
    fn aborted(&self) -> Option<i32> {
        self.abort_code.get().copied()
    }

    fn abort(&self, code: i32) {
        if self.abort_code.set(code).is_err() {
            // First abort wins; its waiters are already being woken.
            return;
        }
        let hubs = self
            .hubs
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect::<Vec<_>>();
        for hub in hubs {
            let _state = hub.state.lock();
            hub.cond.notify_all();
        }
    }

    fn register(&self, hub: &Arc<Hub>) {
        let mut hubs = self.hubs.lock();
        hubs.retain(|weak| weak.strong_count() > 0);
        hubs.push(Arc::downgrade(hub));
    }
}

#[derive(Debug, Default)]
struct Rendezvous {
    arrived: usize,
    generation: u64,
    words: Vec<Vec<f64>>,
    scalars: Vec<f64>,
    colors: Vec<(usize, usize)>,
    offspring: HashMap<usize, Arc<Hub>>,
}

#[derive(Debug)]
struct Hub {
    size: usize,
    universe: Arc<UniverseState>,
    state: Mutex<Rendezvous>,
    cond: Condvar,
}

impl Hub {
    fn new(size: usize, universe: Arc<UniverseState>) -> Arc<Self> {
        let hub = Arc::new(Self {
            size,
            universe,
            state: Mutex::new(Rendezvous {
                words: vec![Vec::new(); size],
                scalars: vec![0.0; size],
                colors: vec![(0, 0); size],
                ..Rendezvous::default()
            }),
            cond: Condvar::new(),
        });
        hub.universe.register(&hub);
        hub
    }

    fn wait(&self, state: &mut MutexGuard<'_, Rendezvous>) -> Result<(), CommError> {
        if let Some(code) = self.universe.aborted() {
            return Err(CommError::Aborted { code });
        }
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.size {
            state.arrived = 0;
            state.generation = generation.wrapping_add(1);
            self.cond.notify_all();
            return Ok(());
        }
        while state.generation == generation {
            if let Some(code) = self.universe.aborted() {
                return Err(CommError::Aborted { code });
            }
            self.cond.wait(state);
        }
        Ok(())
    }
}

/// One rank's handle on a thread-transport communicator.
#[derive(Debug)]
pub struct ThreadComm {
    hub: Arc<Hub>,
    rank: usize,
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.hub.size
    }

    fn barrier(&self) -> Result<(), CommError> {
        let mut state = self.hub.state.lock();
        self.hub.wait(&mut state)
    }

    fn all_to_all(&self, send: &[f64], recv: &mut [f64], chunk: usize) -> Result<(), CommError> {
        check_exchange_lengths(send, recv, chunk, self.hub.size)?;
        let mut state = self.hub.state.lock();
        state.words[self.rank] = send.to_vec();
        self.hub.wait(&mut state)?;
        if chunk > 0 {
            let offset = self.rank * chunk;
            for (source, block) in recv.chunks_exact_mut(chunk).enumerate() {
                block.copy_from_slice(&state.words[source][offset..offset + chunk]);
            }
        }
        self.hub.wait(&mut state)?;
        state.words[self.rank] = Vec::new();
        Ok(())
    }

    fn all_reduce_sum(&self, local: f64) -> Result<f64, CommError> {
        let mut state = self.hub.state.lock();
        state.scalars[self.rank] = local;
        self.hub.wait(&mut state)?;
        // Rank order, so every member computes a bit-identical total.
        let total = state.scalars.iter().sum();
        self.hub.wait(&mut state)?;
        Ok(total)
    }

    fn abort(&self, code: i32) {
        error!(
            "rank {} aborting communicator group with code {code}",
            self.rank
        );
        self.hub.universe.abort(code);
    }

    fn create_cartesian(&self, dims: [usize; 2]) -> Result<(Self, [usize; 2]), CommError> {
        check_grid(dims, self.size())?;
        let cart = self.split(0, self.rank)?;
        let coords = [cart.rank / dims[1], cart.rank % dims[1]];
        debug!(
            "rank {} placed at {coords:?} of a {}x{} grid",
            self.rank, dims[0], dims[1]
        );
        Ok((cart, coords))
    }

    fn split(&self, color: usize, key: usize) -> Result<Self, CommError> {
        let mut state = self.hub.state.lock();
        state.colors[self.rank] = (color, key);
        self.hub.wait(&mut state)?;

        let mut members = state
            .colors
            .iter()
            .enumerate()
            .filter(|(_, (member_color, _))| *member_color == color)
            .map(|(parent, &(_, member_key))| (member_key, parent))
            .collect::<Vec<_>>();
        members.sort_unstable();
        let rank = members
            .iter()
            .position(|&(_, parent)| parent == self.rank)
            .ok_or_else(|| CommError::Transport {
                detail: format!("rank {} missing from its own split group", self.rank),
            })?;
        let size = members.len();
        let universe = Arc::clone(&self.hub.universe);
        let hub = Arc::clone(
            state
                .offspring
                .entry(color)
                .or_insert_with(|| Hub::new(size, universe)),
        );

        self.hub.wait(&mut state)?;
        if self.rank == 0 {
            state.offspring.clear();
        }
        Ok(Self { hub, rank })
    }
}

/// Raises the abort flag if the owning rank thread unwinds.
struct PanicGuard {
    universe: Arc<UniverseState>,
}

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            self.universe.abort(PANIC_ABORT_CODE);
        }
    }
}

/// A group of ranks executed as threads of the current process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadUniverse {
    size: usize,
}

impl ThreadUniverse {
    pub fn new(size: usize) -> Result<Self, CommError> {
        if size == 0 {
            return Err(CommError::Transport {
                detail: String::from("a universe needs at least one rank"),
            });
        }
        Ok(Self { size })
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Runs `body` once per rank, each on its own thread with its own world
    /// communicator, and returns the per-rank results in rank order.
    ///
    /// A panic on any rank aborts the group, so peers return
    /// `CommError::Aborted` from their pending collectives; the panic is then
    /// re-raised on the calling thread.
    pub fn run<T, F>(&self, body: F) -> Result<Vec<T>, CommError>
    where
        F: Fn(ThreadComm) -> T + Sync,
        T: Send,
    {
        let universe = Arc::new(UniverseState::default());
        let world = Hub::new(self.size, Arc::clone(&universe));
        let body = &body;

        let (outcomes, spawn_failure) = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.size);
            let mut spawn_failure = None;
            for rank in 0..self.size {
                let comm = ThreadComm {
                    hub: Arc::clone(&world),
                    rank,
                };
                let guard = PanicGuard {
                    universe: Arc::clone(&universe),
                };
                let spawned = thread::Builder::new()
                    .name(format!("rank-{rank}"))
                    .spawn_scoped(scope, move || {
                        let _guard = guard;
                        body(comm)
                    });
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(err) => {
                        universe.abort(PANIC_ABORT_CODE);
                        spawn_failure = Some(CommError::Transport {
                            detail: format!("could not start rank {rank}: {err}"),
                        });
                        break;
                    }
                }
            }
            let outcomes = handles
                .into_iter()
                .map(|handle| handle.join())
                .collect::<Vec<_>>();
            (outcomes, spawn_failure)
        });

        let mut results = Vec::with_capacity(outcomes.len());
        let mut first_panic = None;
        for outcome in outcomes {
            match outcome {
                Ok(value) => results.push(value),
                Err(payload) => {
                    first_panic.get_or_insert(payload);
                }
            }
        }
        if let Some(payload) = first_panic {
            std::panic::resume_unwind(payload);
        }
        if let Some(err) = spawn_failure {
            return Err(err);
        }
        Ok(results)
    }
}
