use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashSet},
    thread::JoinHandle,
    time::Instant,
};

use flume::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, trace};

use crate::{error::PingError, marker::MarkerId};

#[derive(Debug)]
enum ExpiryCommand {
    Schedule { id: MarkerId, deadline: Instant },
    Cancel(MarkerId),
}

/// One background thread that fires a callback once per scheduled marker when its deadline passes.
///
/// The thread sleeps until either the earliest deadline or the next command. Cancelled ids stay in
/// the heap until they come due and are skipped then.
/// Dropping the scheduler stops the thread and forgets every pending deadline.
pub struct ExpiryScheduler {
    sender: Option<Sender<ExpiryCommand>>,
    thread: Option<JoinHandle<()>>,
}

impl ExpiryScheduler {
    pub fn spawn<F>(on_expire: F) -> Result<Self, PingError>
    where
        F: Fn(MarkerId) + Send + 'static,
    {
        let (sender, receiver) = flume::unbounded::<ExpiryCommand>();
        let thread = std::thread::Builder::new()
            .name("ping-expiry".to_string())
            .spawn(move || expiry_loop(receiver, on_expire))
            .map_err(PingError::ExpiryThread)?;
        Ok(Self {
            sender: Some(sender),
            thread: Some(thread),
        })
    }

    pub fn schedule(&self, id: MarkerId, deadline: Instant) {
        self.send(ExpiryCommand::Schedule { id, deadline });
    }

    /// no-op if the id already fired or was never scheduled
    pub fn cancel(&self, id: MarkerId) {
        self.send(ExpiryCommand::Cancel(id));
    }

    fn send(&self, command: ExpiryCommand) {
        if let Some(sender) = self.sender.as_ref() {
            if let Err(e) = sender.send(command) {
                error!(?e, "marker expiry thread is gone");
            }
        }
    }
}

impl Drop for ExpiryScheduler {
    fn drop(&mut self) {
        // disconnecting the channel is the shutdown signal
        drop(self.sender.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("marker expiry thread panicked");
            }
        }
    }
}

fn expiry_loop<F: Fn(MarkerId)>(receiver: Receiver<ExpiryCommand>, on_expire: F) {
    let mut deadlines: BinaryHeap<Reverse<(Instant, MarkerId)>> = BinaryHeap::new();
    let mut pending: HashSet<MarkerId> = HashSet::new();
    loop {
        let command = match deadlines.peek() {
            Some(Reverse((deadline, _))) => match receiver.recv_deadline(*deadline) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match receiver.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            },
        };
        match command {
            Some(ExpiryCommand::Schedule { id, deadline }) => {
                trace!(%id, "scheduled marker expiry");
                pending.insert(id);
                deadlines.push(Reverse((deadline, id)));
            }
            Some(ExpiryCommand::Cancel(id)) => {
                if pending.remove(&id) {
                    trace!(%id, "cancelled marker expiry");
                }
            }
            None => {}
        }

        let now = Instant::now();
        while let Some(Reverse((deadline, id))) = deadlines.peek().copied() {
            if deadline > now {
                break;
            }
            deadlines.pop();
            if pending.remove(&id) {
                on_expire(id);
            }
        }
    }
    debug!(
        pending = pending.len(),
        "marker expiry thread shutting down"
    );
}

#[cfg(test)]
mod test {
    use std::{
        sync::{Arc, Mutex},
        time::{Duration, Instant},
    };

    use rstest::*;
    use similar_asserts::assert_eq;

    use super::ExpiryScheduler;
    use crate::marker::MarkerId;

    type Fired = Arc<Mutex<Vec<MarkerId>>>;

    #[fixture]
    fn scheduler() -> (ExpiryScheduler, Fired) {
        let fired: Fired = Default::default();
        let sink = fired.clone();
        let scheduler =
            ExpiryScheduler::spawn(move |id| sink.lock().unwrap().push(id)).unwrap();
        (scheduler, fired)
    }

    fn wait_for(fired: &Fired, count: usize) {
        let give_up = Instant::now() + Duration::from_secs(5);
        while fired.lock().unwrap().len() < count && Instant::now() < give_up {
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[rstest]
    fn fires_in_deadline_order(scheduler: (ExpiryScheduler, Fired)) {
        let (scheduler, fired) = scheduler;
        let now = Instant::now();
        let late = MarkerId::new();
        let early = MarkerId::new();
        scheduler.schedule(late, now + Duration::from_millis(120));
        scheduler.schedule(early, now + Duration::from_millis(40));
        wait_for(&fired, 2);
        assert_eq!(*fired.lock().unwrap(), vec![early, late]);
    }

    #[rstest]
    fn does_not_fire_before_deadline(scheduler: (ExpiryScheduler, Fired)) {
        let (scheduler, fired) = scheduler;
        let id = MarkerId::new();
        let scheduled_at = Instant::now();
        scheduler.schedule(id, scheduled_at + Duration::from_millis(100));
        wait_for(&fired, 1);
        assert!(scheduled_at.elapsed() >= Duration::from_millis(100));
        assert_eq!(*fired.lock().unwrap(), vec![id]);
    }

    #[rstest]
    fn cancelled_ids_never_fire(scheduler: (ExpiryScheduler, Fired)) {
        let (scheduler, fired) = scheduler;
        let now = Instant::now();
        let cancelled = MarkerId::new();
        let kept = MarkerId::new();
        scheduler.schedule(cancelled, now + Duration::from_millis(30));
        scheduler.schedule(kept, now + Duration::from_millis(80));
        scheduler.cancel(cancelled);
        wait_for(&fired, 1);
        // give the cancelled deadline time to pass as well
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(*fired.lock().unwrap(), vec![kept]);
    }

    #[rstest]
    fn past_deadlines_fire_immediately(scheduler: (ExpiryScheduler, Fired)) {
        let (scheduler, fired) = scheduler;
        let id = MarkerId::new();
        scheduler.schedule(id, Instant::now());
        wait_for(&fired, 1);
        assert_eq!(*fired.lock().unwrap(), vec![id]);
    }

    #[rstest]
    fn drop_joins_with_pending_deadlines(scheduler: (ExpiryScheduler, Fired)) {
        let (scheduler, fired) = scheduler;
        scheduler.schedule(MarkerId::new(), Instant::now() + Duration::from_secs(60));
        let started = Instant::now();
        drop(scheduler);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(fired.lock().unwrap().is_empty());
    }
}
