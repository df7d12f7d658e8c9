//! Batching, cancellation and main-context affinity of the work queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use codenav_scheduler::metrics::metrics;
use codenav_scheduler::scheduler::{AffinityWorkQueue, MainContext, WorkError};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

fn setup() -> (MainContext, AffinityWorkQueue) {
    let main = MainContext::new();
    let queue = AffinityWorkQueue::new(main.clone(), Duration::from_millis(10));
    (main, queue)
}

#[tokio::test]
async fn burst_coalesces_into_one_batch_in_fifo_order() {
    let (main, queue) = setup();
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for i in 0..10 {
        let order = order.clone();
        handles.push(queue.enqueue(move || order.lock().push(i), CancellationToken::new()));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(*order.lock(), (0..10).collect::<Vec<_>>());
    // The whole burst crossed to the main context exactly once.
    assert_eq!(main.submissions(), 1);
    main.shutdown();
}

#[tokio::test]
async fn item_cancelled_before_drain_never_executes() {
    let (main, queue) = setup();
    let ran = Arc::new(AtomicU32::new(0));
    let token = CancellationToken::new();

    let ran_probe = ran.clone();
    let handle = queue.enqueue(
        move || {
            ran_probe.fetch_add(1, Ordering::SeqCst);
        },
        token.clone(),
    );
    token.cancel();

    assert_eq!(handle.await, Err(WorkError::Cancelled));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    // An all-cancelled batch never pays for the context switch.
    assert_eq!(main.submissions(), 0);
    main.shutdown();
}

#[tokio::test]
async fn cancellation_after_execution_starts_settles_exactly_once() {
    let (main, queue) = setup();
    let token = CancellationToken::new();

    let mid_run = token.clone();
    let handle = queue.enqueue(
        move || {
            // Cancelling mid-action is best-effort: the side effect stands.
            mid_run.cancel();
            "effect"
        },
        token,
    );

    assert_eq!(handle.await, Ok("effect"));
    main.shutdown();
}

#[tokio::test]
async fn panicking_action_settles_failed_without_aborting_siblings() {
    let (main, queue) = setup();
    let ran = Arc::new(AtomicU32::new(0));

    let bad = queue.enqueue(|| panic!("boom"), CancellationToken::new());
    let ran_probe = ran.clone();
    let good = queue.enqueue(
        move || {
            ran_probe.fetch_add(1, Ordering::SeqCst);
        },
        CancellationToken::new(),
    );

    match bad.await {
        Err(WorkError::Failed(message)) => assert!(message.contains("boom")),
        other => panic!("expected Failed, got {other:?}"),
    }
    good.await.unwrap();
    assert_eq!(ran.load(Ordering::SeqCst), 1);
    main.shutdown();
}

#[tokio::test]
async fn enqueue_on_main_runs_synchronously_with_settled_handle() {
    let (main, queue) = setup();
    let (tx, rx) = std::sync::mpsc::channel();

    let on_main = queue.clone();
    main.submit(Box::new(move || {
        let mut handle = on_main.enqueue(|| 41 + 1, CancellationToken::new());
        // Settled before enqueue even returned.
        let _ = tx.send(handle.try_result());
    }));

    let settled = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(settled, Some(Ok(42)));
    main.shutdown();
}

#[tokio::test]
async fn fast_path_run_counts_as_executed() {
    let (main, queue) = setup();
    let before = metrics().snapshot();

    let (tx, rx) = std::sync::mpsc::channel();
    let on_main = queue.clone();
    main.submit(Box::new(move || {
        let mut handle = on_main.enqueue(|| (), CancellationToken::new());
        let _ = tx.send(handle.try_result());
    }));
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(2)).unwrap(),
        Some(Ok(()))
    );

    // Counters are process-global, so only deltas are meaningful here.
    let after = metrics().snapshot();
    assert!(after.fast_path_runs >= before.fast_path_runs + 1);
    assert!(after.items_executed >= before.items_executed + 1);
    main.shutdown();
}

#[tokio::test]
async fn two_bursts_drain_as_two_batches_in_order() {
    let (main, queue) = setup();
    let order = Arc::new(Mutex::new(Vec::new()));

    let first = order.clone();
    queue
        .enqueue(move || first.lock().push("first"), CancellationToken::new())
        .await
        .unwrap();
    let second = order.clone();
    queue
        .enqueue(move || second.lock().push("second"), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(*order.lock(), vec!["first", "second"]);
    assert_eq!(main.submissions(), 2);
    main.shutdown();
}

#[tokio::test]
async fn dispose_force_cancels_pending_and_rejects_new_work() {
    let (main, queue) = setup();

    let pending = queue.enqueue(|| (), CancellationToken::new());
    queue.dispose();
    assert_eq!(pending.await, Err(WorkError::Cancelled));

    let late = queue.enqueue(|| (), CancellationToken::new());
    assert_eq!(late.await, Err(WorkError::QueueClosed));
    assert!(queue.is_disposed());
    main.shutdown();
}

#[tokio::test]
async fn global_shutdown_token_disposes_the_queue() {
    let main = MainContext::new();
    // Long batch delay so dispose wins the race against the drain.
    let queue = AffinityWorkQueue::new(main.clone(), Duration::from_millis(200));
    let shutdown = CancellationToken::new();
    queue.bind_shutdown(shutdown.clone());

    let pending = queue.enqueue(|| (), CancellationToken::new());
    shutdown.cancel();

    assert_eq!(pending.await, Err(WorkError::Cancelled));
    assert!(queue.is_disposed());
    main.shutdown();
}
