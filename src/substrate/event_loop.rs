//! Substrate event loop
//!
//! One dedicated thread executes every open, delete and transaction in
//! arrival order, so callbacks always run on this thread and transactions
//! never interleave. The loop exits once every `Factory`, `Database` and
//! `Transaction` handle (each holding a sender) has been dropped.

use std::thread;

use crossbeam::channel::{self, Receiver, Sender};

use crate::error::Result;

use super::factory::{DeleteRequest, OpenRequest, Registry};
use super::Transaction;

/// Work items accepted by the event loop
pub(crate) enum Job {
    Open(OpenRequest),
    Delete(DeleteRequest),
    Run(Transaction),
}

pub(crate) type EventSender = Sender<Job>;

/// Start the loop thread, returning the sender feeding it
pub(crate) fn spawn(registry: Registry) -> Result<EventSender> {
    let (sender, receiver) = channel::unbounded();

    thread::Builder::new()
        .name("webext-storage-substrate".to_string())
        .spawn(move || run(registry, receiver))?;

    Ok(sender)
}

fn run(mut registry: Registry, receiver: Receiver<Job>) {
    tracing::debug!("Substrate event loop started");

    for job in receiver.iter() {
        match job {
            Job::Open(request) => registry.open(request),
            Job::Delete(request) => registry.delete(request),
            Job::Run(transaction) => transaction.run(),
        }
    }

    tracing::debug!("Substrate event loop stopped");
}
