//! Running one task over many entities

use crate::error::TaskError;
use crate::store::GlacierDirectory;
use crate::task::{EntityTask, TaskOptions};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use tracing::{debug, info};

type Slot<T, E> = Option<Result<Option<T>, TaskError<E>>>;

/// Run `task` on every entity, results in input order.
///
/// With `mp_processes > 1` the entities are spread over that many worker
/// threads; each entity is handled by exactly one worker. Under fail-fast the
/// first failure stops new work and is returned.
pub fn execute_entity_task<T, E, F>(
    task: &EntityTask,
    gdirs: &[GlacierDirectory],
    options: &TaskOptions,
    f: F,
) -> Result<Vec<Option<T>>, TaskError<E>>
where
    F: Fn(&GlacierDirectory) -> Result<T, E> + Sync,
    T: Send,
    E: fmt::Debug + fmt::Display + Send + 'static,
{
    let Some(first) = gdirs.first() else {
        return Ok(Vec::new());
    };
    let workers = first.workspace().params().mp_processes.clamp(1, gdirs.len());
    info!(task = %task.name(), entities = gdirs.len(), workers, "Executing entity task");

    if workers == 1 {
        return gdirs.iter().map(|gdir| task.run(gdir, options, &f)).collect();
    }

    let next = AtomicUsize::new(0);
    let stop = AtomicBool::new(false);
    let slots: Mutex<Vec<Slot<T, E>>> = Mutex::new((0..gdirs.len()).map(|_| None).collect());

    thread::scope(|scope| {
        for worker in 0..workers {
            let (next, stop, slots, f) = (&next, &stop, &slots, &f);
            scope.spawn(move || loop {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                let i = next.fetch_add(1, Ordering::SeqCst);
                let Some(gdir) = gdirs.get(i) else {
                    break;
                };
                debug!(worker, entity = %gdir.id(), "Worker picked entity");
                let outcome = task.run(gdir, options, f);
                if outcome.is_err() {
                    stop.store(true, Ordering::SeqCst);
                }
                slots.lock()[i] = Some(outcome);
            });
        }
    });

    // Indices are handed out in order, so every slot before a failure is filled.
    let mut results = Vec::with_capacity(gdirs.len());
    for slot in slots.into_inner() {
        match slot {
            Some(Ok(value)) => results.push(value),
            Some(Err(err)) => return Err(err),
            None => break,
        }
    }
    Ok(results)
}
