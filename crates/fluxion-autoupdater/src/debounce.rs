// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Rate limiting of progress callbacks
//!
//! The first value after a quiet period arms a timer of `interval`. Values arriving
//! before it fires replace each other and only the latest one is handed to the sink
//! when the timer fires. Once every sender is gone the pending value is still
//! delivered at its deadline, so the final progress state is never lost.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Cloneable handle feeding values into a [`Debouncer`]
///
/// Usable from blocking threads.
#[derive(Debug)]
pub struct Trigger<T> {
    sender: mpsc::UnboundedSender<T>,
}

impl<T> Clone for Trigger<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T> Trigger<T> {
    pub fn call(&self, value: T) {
        let _ = self.sender.send(value);
    }
}

#[derive(Debug)]
pub struct Debouncer<T> {
    trigger: Trigger<T>,
    task: JoinHandle<()>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Spawn the coalescing task on the current tokio runtime
    pub fn spawn<F>(interval: Duration, mut sink: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        let (sender, mut receiver) = mpsc::unbounded_channel::<T>();

        let task = tokio::spawn(async move {
            while let Some(first) = receiver.recv().await {
                let mut latest = first;
                let deadline = Instant::now() + interval;
                let mut open = true;

                loop {
                    tokio::select! {
                        () = sleep_until(deadline) => break,
                        next = receiver.recv(), if open => match next {
                            Some(value) => latest = value,
                            None => open = false,
                        },
                    }
                }

                sink(latest);
                if !open {
                    break;
                }
            }
        });

        Self {
            trigger: Trigger { sender },
            task,
        }
    }

    pub fn call(&self, value: T) {
        self.trigger.call(value);
    }

    pub fn trigger(&self) -> Trigger<T> {
        self.trigger.clone()
    }

    /// Close the input and wait until the trailing value has been delivered
    ///
    /// Only returns once every [`Trigger`] clone has been dropped too.
    pub async fn finish(self) {
        let Self { trigger, task } = self;
        drop(trigger);
        if let Err(e) = task.await {
            tracing::warn!("Progress debouncer task failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn collecting() -> (Debouncer<u64>, mpsc::UnboundedReceiver<u64>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let debouncer = Debouncer::spawn(Duration::from_millis(100), move |value| {
            let _ = tx.send(value);
        });
        (debouncer, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_coalesced_into_last_value() {
        let (debouncer, mut rx) = collecting();

        for bytes in 1..=50 {
            debouncer.call(bytes * 1024);
        }

        sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());

        sleep(Duration::from_millis(60)).await;
        assert_eq!(rx.try_recv().unwrap(), 50 * 1024);
        assert!(rx.try_recv().is_err());

        debouncer.finish().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_delivers_trailing_value() {
        let (debouncer, mut rx) = collecting();

        debouncer.call(1);
        debouncer.call(2);
        debouncer.call(3);
        debouncer.finish().await;

        assert_eq!(rx.try_recv().unwrap(), 3);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_values_are_all_delivered_in_order() {
        let (debouncer, mut rx) = collecting();

        debouncer.call(10);
        sleep(Duration::from_millis(150)).await;
        debouncer.call(20);
        sleep(Duration::from_millis(150)).await;
        debouncer.finish().await;

        assert_eq!(rx.try_recv().unwrap(), 10);
        assert_eq!(rx.try_recv().unwrap(), 20);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_from_blocking_thread() {
        let (debouncer, mut rx) = collecting();
        let trigger = debouncer.trigger();

        tokio::task::spawn_blocking(move || {
            for value in 0..1000 {
                trigger.call(value);
            }
        })
        .await
        .unwrap();

        debouncer.finish().await;
        let mut received = Vec::new();
        while let Ok(value) = rx.try_recv() {
            received.push(value);
        }
        assert_eq!(received.last(), Some(&999));
        assert!(received.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_without_values() {
        let (debouncer, mut rx) = collecting();
        debouncer.finish().await;
        assert!(rx.try_recv().is_err());
    }
}
