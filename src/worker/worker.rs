use std::{
    any::Any,
    io,
    panic::{self, AssertUnwindSafe},
    thread,
};

use crossbeam_channel::Receiver;
use log::{debug, error};

pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub fn spawn_worker_thread(name: String, receiver: Receiver<Job>) -> io::Result<()> {
    thread::Builder::new().name(name).spawn(move || {
        let name = thread::current().name().unwrap_or("worker").to_string();
        debug!("Worker '{}' started.", name);
        loop {
            match receiver.recv() {
                Ok(job) => {
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                        error!("Job on worker '{}' panicked: {}", name, panic_message(&*payload));
                    }
                }
                Err(_) => {
                    debug!("Worker '{}' exiting: queue closed.", name);
                    break;
                }
            }
        }
    })?;
    Ok(())
}

pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_reads_common_payloads() {
        let payload = panic::catch_unwind(|| panic!("plain")).unwrap_err();
        assert_eq!(panic_message(&*payload), "plain");

        let payload = panic::catch_unwind(|| panic!("formatted {}", 42)).unwrap_err();
        assert_eq!(panic_message(&*payload), "formatted 42");
    }
}
