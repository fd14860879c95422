use assert_matches::assert_matches;
use futures::future::join_all;
use std::collections::HashSet;
use tokio_test::assert_ok;

use appointment_cell::{AppointmentStatus, BookingSource};
use booking_queue_cell::*;
use clinic_cell::{OperatingHours, TimeWindow, UpsertClinicRequest};

use super::{booking_request, test_date, time, QueueTestUtils};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_five_concurrent_bookings_for_acme() {
    let utils = QueueTestUtils::new();
    utils.register_clinic("acme").await;

    let handles = (1..=5).map(|i| {
        let service = utils.service.clone();
        tokio::spawn(async move { service.book("acme", booking_request(&format!("Patient {}", i))).await })
    });
    let booked: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap().expect("booking failed"))
        .collect();

    let tokens: HashSet<u32> = booked.iter().map(|a| a.token_number).collect();
    assert_eq!(tokens, (1..=5).collect::<HashSet<u32>>());

    let ids: HashSet<_> = booked.iter().map(|a| a.id).collect();
    assert_eq!(ids.len(), 5);

    for appointment in &booked {
        assert_eq!(appointment.status, AppointmentStatus::Booked);
        let status = utils.service.queue_status(&appointment.tracking_code).await.unwrap();
        assert_eq!(status.your_token, appointment.token_number);
        assert_eq!(status.status, AppointmentStatus::Booked);
    }
}

#[tokio::test]
async fn test_booking_unknown_clinic() {
    let utils = QueueTestUtils::new();

    assert_matches!(
        utils.service.book("ghost", booking_request("Asha")).await,
        Err(BookingQueueError::NotFound(_))
    );
}

#[tokio::test]
async fn test_requested_time_must_be_an_offered_slot() {
    let utils = QueueTestUtils::new();
    utils.register_clinic("acme").await;

    let mut on_slot = booking_request("On Slot");
    on_slot.requested_time = Some(time(9, 30));
    assert_ok!(utils.service.book("acme", on_slot).await);

    let mut off_slot = booking_request("Off Slot");
    off_slot.requested_time = Some(time(9, 10));
    assert_matches!(
        utils.service.book("acme", off_slot).await,
        Err(BookingQueueError::ValidationError(_))
    );

    let mut closing = booking_request("Closing");
    closing.requested_time = Some(time(12, 0));
    assert_matches!(
        utils.service.book("acme", closing).await,
        Err(BookingQueueError::ValidationError(_))
    );
}

#[tokio::test]
async fn test_tokens_follow_arrival_not_schedule() {
    let utils = QueueTestUtils::new();
    utils.register_clinic("acme").await;

    let mut evening = booking_request("Evening");
    evening.requested_time = Some(time(18, 0));
    let mut morning = booking_request("Morning");
    morning.requested_time = Some(time(9, 0));

    let evening = utils.service.book("acme", evening).await.unwrap();
    let morning = utils.service.book("acme", morning).await.unwrap();

    assert_eq!(evening.token_number, 1);
    assert_eq!(morning.token_number, 2);
}

#[tokio::test]
async fn test_blank_patient_name_rejected() {
    let utils = QueueTestUtils::new();
    utils.register_clinic("acme").await;

    assert_matches!(
        utils.service.book("acme", booking_request("   ")).await,
        Err(BookingQueueError::ValidationError(_))
    );
}

#[tokio::test]
async fn test_manual_entries_are_confirmed() {
    let utils = QueueTestUtils::new();
    utils.register_clinic("acme").await;

    let mut request = booking_request("Front Desk");
    request.source = BookingSource::Manual;
    let appointment = utils.service.book("acme", request).await.unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Confirmed);
    assert_eq!(appointment.patient_name, "Front Desk");
}

#[tokio::test]
async fn test_register_clinic_validates_hours_and_id() {
    let utils = QueueTestUtils::new();

    let inverted = UpsertClinicRequest {
        name: "Backwards".to_string(),
        operating_hours: OperatingHours {
            morning: TimeWindow::new(time(12, 0), time(9, 0)),
            ..OperatingHours::default()
        },
    };
    assert_matches!(
        utils.service.register_clinic("acme", inverted).await,
        Err(BookingQueueError::InvalidConfiguration(_))
    );

    let zero_duration = UpsertClinicRequest {
        name: "Zero".to_string(),
        operating_hours: OperatingHours {
            slot_duration_minutes: 0,
            ..OperatingHours::default()
        },
    };
    assert_matches!(
        utils.service.register_clinic("acme", zero_duration).await,
        Err(BookingQueueError::InvalidConfiguration(_))
    );

    let bad_id = UpsertClinicRequest {
        name: "Colon".to_string(),
        operating_hours: OperatingHours::default(),
    };
    assert_matches!(
        utils.service.register_clinic("acme:2024", bad_id).await,
        Err(BookingQueueError::ValidationError(_))
    );
}

#[tokio::test]
async fn test_updating_clinic_keeps_created_at() {
    let utils = QueueTestUtils::new();
    utils.register_clinic("acme").await;
    let original = utils.service.get_clinic("acme").await.unwrap();

    let updated = utils
        .service
        .register_clinic(
            "acme",
            UpsertClinicRequest {
                name: "Acme Evening Clinic".to_string(),
                operating_hours: OperatingHours {
                    evening: TimeWindow::new(time(18, 0), time(18, 30)),
                    ..OperatingHours::default()
                },
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.created_at, original.created_at);
    assert_eq!(updated.name, "Acme Evening Clinic");

    let slots = utils.service.available_slots("acme").await.unwrap();
    assert_eq!(slots.slots, vec![time(18, 0), time(18, 15)]);
    assert!(!slots.phone_only);
}

#[tokio::test]
async fn test_phone_only_clinic_takes_walk_ins() {
    let utils = QueueTestUtils::new();
    utils
        .service
        .register_clinic(
            "phone",
            UpsertClinicRequest {
                name: "Phone Only".to_string(),
                operating_hours: OperatingHours::default(),
            },
        )
        .await
        .unwrap();

    let slots = utils.service.available_slots("phone").await.unwrap();
    assert!(slots.slots.is_empty());
    assert!(slots.phone_only);

    let walk_in = utils.service.book("phone", booking_request("Walk In")).await.unwrap();
    assert_eq!(walk_in.token_number, 1);
}

#[tokio::test]
async fn test_delete_never_frees_the_token() {
    let utils = QueueTestUtils::new();
    utils.register_clinic("acme").await;
    utils.book("acme", "First").await;
    let second = utils.book("acme", "Second").await;

    let removed = utils.service.delete_appointment(second.id).await.unwrap();
    assert_eq!(removed.id, second.id);

    assert_matches!(
        utils.service.get_appointment(second.id).await,
        Err(BookingQueueError::NotFound(_))
    );
    assert_matches!(
        utils.service.queue_status(&second.tracking_code).await,
        Err(BookingQueueError::NotFound(_))
    );
    assert_matches!(
        utils.service.delete_appointment(second.id).await,
        Err(BookingQueueError::NotFound(_))
    );

    let third = utils.book("acme", "Third").await;
    assert_eq!(third.token_number, 3);
}

#[tokio::test]
async fn test_day_board_lists_by_token() {
    let utils = QueueTestUtils::new();
    utils.register_clinic("acme").await;
    let first = utils.book("acme", "First").await;
    utils.book("acme", "Second").await;
    utils.book("acme", "Third").await;
    utils.service.check_in(first.id).await.unwrap();

    let board = utils.service.queue_for_day("acme", test_date()).await.unwrap();

    let tokens: Vec<u32> = board.appointments.iter().map(|a| a.token_number).collect();
    assert_eq!(tokens, vec![1, 2, 3]);
    assert_eq!(board.now_serving_token, Some(1));
    assert_eq!(board.waiting_count, 2);

    let empty = utils
        .service
        .queue_for_day("acme", test_date().succ_opt().unwrap())
        .await
        .unwrap();
    assert!(empty.appointments.is_empty());
    assert_eq!(empty.now_serving_token, None);
}
