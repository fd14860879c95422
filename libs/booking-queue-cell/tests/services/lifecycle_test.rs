use assert_matches::assert_matches;
use futures::future::join_all;

use appointment_cell::AppointmentStatus;
use booking_queue_cell::*;

use super::{test_date, QueueTestUtils};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_check_ins_leave_one_ongoing() {
    let utils = QueueTestUtils::new();
    utils.register_clinic("acme").await;

    let mut ids = Vec::new();
    for i in 0..10 {
        ids.push(utils.book("acme", &format!("Patient {}", i)).await.id);
    }

    let handles = ids.iter().map(|id| {
        let service = utils.service.clone();
        let id = *id;
        tokio::spawn(async move { service.check_in(id).await })
    });
    let results: Vec<_> = join_all(handles).await.into_iter().map(|r| r.unwrap()).collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    for failure in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_matches!(failure, BookingQueueError::QueueConflict { .. });
    }

    let board = utils.service.queue_for_day("acme", test_date()).await.unwrap();
    let ongoing = board
        .appointments
        .iter()
        .filter(|a| a.status == AppointmentStatus::Ongoing)
        .count();
    assert_eq!(ongoing, 1);
    assert_eq!(board.waiting_count, 9);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_double_tap_check_in_reports_loser() {
    let utils = QueueTestUtils::new();
    utils.register_clinic("acme").await;
    let appointment = utils.book("acme", "Asha").await;

    let first = {
        let service = utils.service.clone();
        tokio::spawn(async move { service.check_in(appointment.id).await })
    };
    let second = {
        let service = utils.service.clone();
        tokio::spawn(async move { service.check_in(appointment.id).await })
    };

    let results = [first.await.unwrap(), second.await.unwrap()];
    let winner = results.iter().find_map(|r| r.as_ref().ok()).expect("one check-in must succeed");
    let checked_in_at = winner.checked_in_at;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_matches!(
        results.iter().find_map(|r| r.as_ref().err()),
        Some(BookingQueueError::InvalidTransition {
            from: AppointmentStatus::Ongoing,
            to: AppointmentStatus::Ongoing
        })
    );

    let stored = utils.service.get_appointment(appointment.id).await.unwrap();
    assert_eq!(stored.checked_in_at, checked_in_at);
}

#[tokio::test]
async fn test_terminal_states_are_final() {
    let utils = QueueTestUtils::new();
    utils.register_clinic("acme").await;

    let done = utils.book("acme", "Done").await;
    utils.service.check_in(done.id).await.unwrap();
    let completed = utils.service.complete(done.id).await.unwrap();

    let dropped = utils.book("acme", "Dropped").await;
    let cancelled = utils.service.cancel(dropped.id).await.unwrap();

    for (id, status) in [(done.id, AppointmentStatus::Completed), (dropped.id, AppointmentStatus::Cancelled)] {
        assert_matches!(
            utils.service.check_in(id).await,
            Err(BookingQueueError::InvalidTransition { from, .. }) if from == status
        );
        assert_matches!(
            utils.service.complete(id).await,
            Err(BookingQueueError::InvalidTransition { .. })
        );
        assert_matches!(
            utils.service.cancel(id).await,
            Err(BookingQueueError::InvalidTransition { .. })
        );
    }

    assert_eq!(utils.service.get_appointment(done.id).await.unwrap(), completed);
    assert_eq!(utils.service.get_appointment(dropped.id).await.unwrap(), cancelled);
}

#[tokio::test]
async fn test_completion_requires_check_in() {
    let utils = QueueTestUtils::new();
    utils.register_clinic("acme").await;
    let appointment = utils.book("acme", "Skipper").await;

    assert_matches!(
        utils.service.complete(appointment.id).await,
        Err(BookingQueueError::InvalidTransition {
            from: AppointmentStatus::Booked,
            to: AppointmentStatus::Completed
        })
    );
}

#[tokio::test]
async fn test_transitions_stamp_timestamps() {
    let utils = QueueTestUtils::new();
    utils.register_clinic("acme").await;
    let first = utils.book("acme", "First").await;
    let second = utils.book("acme", "Second").await;

    let ongoing = utils.service.check_in(first.id).await.unwrap();
    assert!(ongoing.checked_in_at.is_some());
    assert!(ongoing.completed_at.is_none());

    let completed = utils.service.complete(first.id).await.unwrap();
    assert_eq!(completed.checked_in_at, ongoing.checked_in_at);
    assert!(completed.completed_at.is_some());

    let cancelled = utils.service.cancel(second.id).await.unwrap();
    assert!(cancelled.cancelled_at.is_some());
    assert!(cancelled.checked_in_at.is_none());
}

#[tokio::test]
async fn test_cancelling_ongoing_does_not_promote_next() {
    let utils = QueueTestUtils::new();
    utils.register_clinic("acme").await;
    let first = utils.book("acme", "First").await;
    utils.book("acme", "Second").await;

    utils.service.check_in(first.id).await.unwrap();
    utils.service.cancel(first.id).await.unwrap();

    let board = utils.service.queue_for_day("acme", test_date()).await.unwrap();
    assert_eq!(board.now_serving_token, None);
    assert_eq!(board.waiting_count, 1);
}

#[tokio::test]
async fn test_unknown_appointment_is_not_found() {
    let utils = QueueTestUtils::new();

    assert_matches!(
        utils.service.check_in(uuid::Uuid::new_v4()).await,
        Err(BookingQueueError::NotFound(_))
    );
}

#[tokio::test]
async fn test_call_next_advances_the_queue() {
    let utils = QueueTestUtils::new();
    utils.register_clinic("acme").await;
    let first = utils.book("acme", "First").await;
    let second = utils.book("acme", "Second").await;
    let third = utils.book("acme", "Third").await;
    utils.service.cancel(second.id).await.unwrap();

    let opening = utils.service.call_next("acme", test_date()).await.unwrap();
    assert!(opening.completed.is_none());
    assert_eq!(opening.checked_in.as_ref().map(|a| a.id), Some(first.id));
    assert_eq!(opening.now_serving_token, Some(1));

    let next = utils.service.call_next("acme", test_date()).await.unwrap();
    assert_eq!(next.completed.as_ref().map(|a| a.id), Some(first.id));
    assert_eq!(next.checked_in.as_ref().map(|a| a.id), Some(third.id));
    assert_eq!(next.now_serving_token, Some(3));

    let drained = utils.service.call_next("acme", test_date()).await.unwrap();
    assert_eq!(drained.completed.as_ref().map(|a| a.id), Some(third.id));
    assert!(drained.checked_in.is_none());
    assert_eq!(drained.now_serving_token, Some(3));

    let idle = utils.service.call_next("acme", test_date()).await.unwrap();
    assert!(idle.completed.is_none() && idle.checked_in.is_none());
    assert_eq!(idle.now_serving_token, Some(3));
}

#[tokio::test]
async fn test_call_next_requires_known_clinic() {
    let utils = QueueTestUtils::new();

    assert_matches!(
        utils.service.call_next("nowhere", test_date()).await,
        Err(BookingQueueError::NotFound(_))
    );
}
