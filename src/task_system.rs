//! Fixed-size worker pool that drains a shared job queue.
//!
//! Jobs are pushed on the submitting thread, then `execute` hands the whole
//! batch to every pipeline at once. Each participant (the background workers
//! plus the submitting thread) claims the next job by bumping one shared
//! atomic read cursor, so jobs start in submission order but run in parallel.
//! A barrier is `participant_count` arrival jobs: a participant that claims
//! one decrements the barrier counter and spins until every other
//! participant has arrived, which means every job queued before the barrier
//! has finished.

use std::io;
use std::marker::PhantomData;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, warn};
use parking_lot::{Condvar, Mutex};

/// Queue capacity used by [`TaskSystem::new`]. Every draw call, tile and
/// shading strip is one job, so this is deliberately generous.
pub const DEFAULT_QUEUE_CAPACITY: usize = 30000;

type JobFn = Box<dyn Fn(usize) + Send + Sync + 'static>;

enum Job {
    Task(JobFn),
    Barrier(usize),
}

#[derive(Default)]
struct Pending {
    jobs: Vec<Job>,
    barrier_count: usize,
}

/// Counting semaphore used to park idle pipelines between batches.
#[derive(Default)]
struct Semaphore {
    count: Mutex<usize>,
    condvar: Condvar,
}

impl Semaphore {
    fn wait(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            self.condvar.wait(&mut count);
        }
        *count -= 1;
    }

    fn notify(&self) {
        let mut count = self.count.lock();
        *count += 1;
        self.condvar.notify_one();
    }
}

struct Batch {
    jobs: Vec<Job>,
    read_offset: AtomicUsize,
    barriers: Vec<AtomicUsize>,
}

impl Batch {
    fn new(jobs: Vec<Job>, barrier_count: usize, participants: usize) -> Batch {
        Batch {
            jobs,
            read_offset: AtomicUsize::new(0),
            barriers: (0..barrier_count).map(|_| AtomicUsize::new(participants)).collect(),
        }
    }

    #[inline]
    fn claim(&self) -> Option<&Job> {
        let read = self.read_offset.fetch_add(1, Ordering::Relaxed);
        self.jobs.get(read)
    }

    fn drain(&self, participant: usize, panicked: &AtomicBool) {
        while let Some(job) = self.claim() {
            match job {
                Job::Task(callback) => {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| callback(participant)));
                    if result.is_err() {
                        panicked.store(true, Ordering::Release);
                    }
                }
                Job::Barrier(id) => {
                    let pending = &self.barriers[*id];
                    pending.fetch_sub(1, Ordering::AcqRel);
                    while pending.load(Ordering::Acquire) != 0 {
                        thread::yield_now();
                    }
                }
            }
        }
    }
}

struct Shared {
    pending: Mutex<Pending>,
    batch: Mutex<Option<Arc<Batch>>>,
    running_pipelines: AtomicUsize,
    running: AtomicBool,
    panicked: AtomicBool,
    overflow_warned: AtomicBool,
    queue_capacity: usize,
}

impl Shared {
    fn warn_overflow(&self) {
        if !self.overflow_warned.swap(true, Ordering::Relaxed) {
            warn!("task queue is full ({} jobs), dropping further submissions", self.queue_capacity);
        }
    }
}

/// One background worker thread.
struct TaskPipeline {
    semaphore: Arc<Semaphore>,
    thread: Option<JoinHandle<()>>,
}

impl TaskPipeline {
    fn spawn(shared: Arc<Shared>, core_no: usize) -> io::Result<TaskPipeline> {
        let semaphore = Arc::new(Semaphore::default());
        let thread_semaphore = Arc::clone(&semaphore);

        let thread = thread::Builder::new()
            .name(format!("task-pipeline-{core_no}"))
            .spawn(move || Self::run(&shared, &thread_semaphore, core_no))?;

        Ok(TaskPipeline {
            semaphore,
            thread: Some(thread),
        })
    }

    fn kick(&self) {
        self.semaphore.notify();
    }

    fn run(shared: &Shared, semaphore: &Semaphore, core_no: usize) {
        debug!("task pipeline {core_no} started");

        loop {
            semaphore.wait();
            if !shared.running.load(Ordering::Acquire) {
                break;
            }

            // the batch must be released before reporting completion
            {
                let batch = shared.batch.lock().clone();
                if let Some(batch) = batch {
                    batch.drain(core_no, &shared.panicked);
                }
            }

            shared.running_pipelines.fetch_sub(1, Ordering::AcqRel);
        }

        debug!("task pipeline {core_no} stopped");
    }
}

/// Job scheduler shared by everything that renders in this process.
///
/// Worker threads start in the constructor and are stopped and joined on drop.
pub struct TaskSystem {
    shared: Arc<Shared>,
    pipelines: Vec<TaskPipeline>,
    execute_lock: Mutex<()>,
}

impl TaskSystem {
    /// Starts `worker_count` background pipelines. The thread that calls
    /// [`execute`](Self::execute) is an extra participant, so `0` is a valid,
    /// single-threaded pool.
    pub fn new(worker_count: usize) -> io::Result<TaskSystem> {
        Self::with_capacity(worker_count, DEFAULT_QUEUE_CAPACITY)
    }

    /// One background worker per hardware thread, minus the submitting thread.
    pub fn with_default_workers() -> io::Result<TaskSystem> {
        Self::new(num_cpus::get().saturating_sub(1))
    }

    pub fn with_capacity(worker_count: usize, queue_capacity: usize) -> io::Result<TaskSystem> {
        let shared = Arc::new(Shared {
            pending: Mutex::new(Pending::default()),
            batch: Mutex::new(None),
            running_pipelines: AtomicUsize::new(0),
            running: AtomicBool::new(true),
            panicked: AtomicBool::new(false),
            overflow_warned: AtomicBool::new(false),
            queue_capacity,
        });

        let mut system = TaskSystem {
            shared: Arc::clone(&shared),
            pipelines: Vec::with_capacity(worker_count),
            execute_lock: Mutex::new(()),
        };

        // on error, dropping `system` stops the pipelines started so far
        for core_no in 1..=worker_count {
            let pipeline = TaskPipeline::spawn(Arc::clone(&shared), core_no)?;
            system.pipelines.push(pipeline);
        }

        debug!("task system started with {} workers, queue capacity {}", worker_count, queue_capacity);
        Ok(system)
    }

    pub fn worker_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Workers plus the submitting thread.
    pub fn participant_count(&self) -> usize {
        self.pipelines.len() + 1
    }

    pub fn queue_capacity(&self) -> usize {
        self.shared.queue_capacity
    }

    /// Number of queued entries (jobs and barrier arrivals) waiting for the next execute.
    pub fn pending_count(&self) -> usize {
        self.shared.pending.lock().jobs.len()
    }

    /// Queues one job. The argument passed to `job` is the index of the
    /// participant running it: `0` for the submitting thread, `1..=worker_count`
    /// for the workers. Returns `false` when the queue is full.
    pub fn push_job<F>(&self, job: F) -> bool
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.enqueue(Box::new(job))
    }

    /// Queues one barrier: nothing pushed after it starts before everything
    /// pushed ahead of it has finished. Returns `false`, and queues nothing,
    /// if the arrivals do not fit in the queue.
    pub fn push_barrier(&self) -> bool {
        let participants = self.participant_count();
        let mut pending = self.shared.pending.lock();

        if pending.jobs.len() + participants > self.shared.queue_capacity {
            drop(pending);
            self.shared.warn_overflow();
            return false;
        }

        let id = pending.barrier_count;
        pending.barrier_count += 1;
        pending.jobs.extend((0..participants).map(|_| Job::Barrier(id)));
        true
    }

    /// Runs every queued job on all participants and returns once the last
    /// one has finished. Must not be called from inside a job.
    ///
    /// # Panics
    /// Re-raises on the calling thread if any job panicked; the rest of the
    /// batch still runs to completion first.
    pub fn execute(&self) {
        let _guard = self.execute_lock.lock();

        let (jobs, barrier_count) = {
            let mut pending = self.shared.pending.lock();
            (mem::take(&mut pending.jobs), mem::replace(&mut pending.barrier_count, 0))
        };
        self.shared.overflow_warned.store(false, Ordering::Relaxed);

        if jobs.is_empty() {
            return;
        }

        let batch = Arc::new(Batch::new(jobs, barrier_count, self.participant_count()));
        *self.shared.batch.lock() = Some(Arc::clone(&batch));

        self.shared.running_pipelines.store(self.pipelines.len(), Ordering::Release);
        for pipeline in &self.pipelines {
            pipeline.kick();
        }

        batch.drain(0, &self.shared.panicked);

        while self.shared.running_pipelines.load(Ordering::Acquire) != 0 {
            thread::yield_now();
        }

        // workers have dropped their handles, so this releases every job
        self.shared.batch.lock().take();
        drop(batch);

        if self.shared.panicked.swap(false, Ordering::AcqRel) {
            panic!("a job panicked while the task system was executing");
        }
    }

    /// Runs every queued job on the calling thread, in submission order.
    /// Barriers are satisfied trivially.
    pub fn execute_single(&self) {
        let _guard = self.execute_lock.lock();

        let jobs = {
            let mut pending = self.shared.pending.lock();
            pending.barrier_count = 0;
            mem::take(&mut pending.jobs)
        };
        self.shared.overflow_warned.store(false, Ordering::Relaxed);

        for job in &jobs {
            if let Job::Task(callback) = job {
                callback(0);
            }
        }
    }

    /// Queues jobs that may borrow from the caller's stack, then executes them.
    ///
    /// Every job pushed through the [`Scope`] has run and been dropped by the
    /// time this returns.
    pub fn scope<'env, F, R>(&self, f: F) -> R
    where
        F: for<'scope> FnOnce(&'scope Scope<'scope, 'env>) -> R,
    {
        let scope = Scope {
            system: self,
            scope: PhantomData,
            env: PhantomData,
        };

        let result = match panic::catch_unwind(AssertUnwindSafe(|| f(&scope))) {
            Ok(result) => result,
            Err(payload) => {
                // borrowed jobs must not survive into a later batch
                let mut pending = self.shared.pending.lock();
                pending.jobs.clear();
                pending.barrier_count = 0;
                drop(pending);
                panic::resume_unwind(payload);
            }
        };

        self.execute();
        result
    }

    fn enqueue(&self, job: JobFn) -> bool {
        let mut pending = self.shared.pending.lock();
        if pending.jobs.len() >= self.shared.queue_capacity {
            drop(pending);
            self.shared.warn_overflow();
            return false;
        }

        pending.jobs.push(Job::Task(job));
        true
    }
}

impl Drop for TaskSystem {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);

        for pipeline in &self.pipelines {
            pipeline.kick();
        }

        for pipeline in &mut self.pipelines {
            if let Some(thread) = pipeline.thread.take() {
                if thread.join().is_err() {
                    warn!("task pipeline thread panicked during shutdown");
                }
            }
        }
    }
}

/// Submission handle passed to [`TaskSystem::scope`].
pub struct Scope<'scope, 'env: 'scope> {
    system: &'scope TaskSystem,
    scope: PhantomData<&'scope mut &'scope ()>,
    env: PhantomData<&'env mut &'env ()>,
}

impl<'scope, 'env> Scope<'scope, 'env> {
    /// Like [`TaskSystem::push_job`], but `job` may borrow anything that
    /// outlives the scope.
    pub fn push_job<F>(&self, job: F) -> bool
    where
        F: Fn(usize) + Send + Sync + 'env,
    {
        let job: Box<dyn Fn(usize) + Send + Sync + 'env> = Box::new(job);

        // SAFETY: `TaskSystem::scope` executes the pending batch before it
        // returns and `execute` drops every job before it returns (a panic in
        // the scope body clears the queue instead), so the erased borrow never
        // outlives 'env.
        let job: JobFn = unsafe { mem::transmute::<Box<dyn Fn(usize) + Send + Sync + 'env>, JobFn>(job) };

        self.system.enqueue(job)
    }

    pub fn push_barrier(&self) -> bool {
        self.system.push_barrier()
    }

    pub fn participant_count(&self) -> usize {
        self.system.participant_count()
    }
}
