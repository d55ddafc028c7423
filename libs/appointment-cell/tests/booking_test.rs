use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{
    AppointmentError, AppointmentPriority, AppointmentStatus, CancelAppointmentRequest,
    CancelledBy, CreateAppointmentRequest, RescheduleAppointmentRequest, UpdateAppointmentRequest,
};
use appointment_cell::services::booking::AppointmentBookingService;
use appointment_cell::services::queries::AppointmentQueryService;
use availability_cell::models::{AvailabilityKind, AvailabilityStatus, DeclareAvailabilityRequest};
use availability_cell::services::AvailabilityService;
use shared_store::AppContext;
use shared_utils::clock::FixedClock;
use shared_utils::test_utils::{patient_row, provider_row, test_config};
use slot_cell::models::CreateSlotRequest;
use slot_cell::services::SlotService;

fn at(hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, hour, min, 0).unwrap()
}

struct TestSetup {
    // Held so the directory mocks stay mounted for the test's lifetime.
    _server: MockServer,
    ctx: Arc<AppContext>,
    provider_id: Uuid,
    patient_id: Uuid,
    other_patient_id: Uuid,
}

impl TestSetup {
    async fn new() -> Self {
        let server = MockServer::start().await;
        let provider_id = Uuid::new_v4();
        let patient_id = Uuid::new_v4();
        let other_patient_id = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path("/providers"))
            .and(query_param("id", format!("eq.{}", provider_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                provider_row(provider_id, "Dr. Ada Osei", "Cardiology")
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/patients"))
            .and(query_param("id", format!("eq.{}", patient_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                patient_row(patient_id, "June Park", "1987-04-12")
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/patients"))
            .and(query_param("id", format!("eq.{}", other_patient_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                patient_row(other_patient_id, "Omar Haddad", "1990-09-01")
            ])))
            .mount(&server)
            .await;
        // Any other id resolves to nothing.
        Mock::given(method("GET"))
            .and(path("/providers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/patients"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let clock = Arc::new(FixedClock::new(at(8, 0)));
        let ctx = Arc::new(AppContext::with_clock(
            test_config(&server.uri(), "", ""),
            clock,
        ));

        Self {
            _server: server,
            ctx,
            provider_id,
            patient_id,
            other_patient_id,
        }
    }

    fn booking(&self, start: DateTime<Utc>, minutes: i32) -> CreateAppointmentRequest {
        CreateAppointmentRequest {
            patient_id: self.patient_id,
            provider_id: self.provider_id,
            scheduled_start: start,
            duration_minutes: minutes,
            reason: "checkup".to_string(),
            priority: AppointmentPriority::default(),
            parent_appointment_id: None,
            slot_id: None,
            availability_id: None,
            notes: None,
            with_video: false,
        }
    }
}

#[tokio::test]
async fn conflict_symmetry_with_back_to_back_success() {
    let setup = TestSetup::new().await;
    let service = AppointmentBookingService::new(&setup.ctx);

    let first = service
        .create_appointment(setup.booking(at(10, 0), 30))
        .await
        .unwrap();
    assert_eq!(first.status, AppointmentStatus::Scheduled);
    assert_eq!(first.priority, AppointmentPriority::Normal);

    // Overlapping window is refused, naming the conflicting interval.
    let err = service
        .create_appointment(setup.booking(at(10, 15), 30))
        .await
        .unwrap_err();
    assert_matches!(
        err,
        AppointmentError::SchedulingConflict { start, end, conflicting_appointment_id }
            if start == at(10, 0) && end == at(10, 30)
                && conflicting_appointment_id == Some(first.id)
    );

    // Back-to-back is not an overlap.
    service
        .create_appointment(setup.booking(at(10, 30), 30))
        .await
        .unwrap();
}

#[tokio::test]
async fn cancellation_releases_the_time() {
    let setup = TestSetup::new().await;
    let service = AppointmentBookingService::new(&setup.ctx);

    let appointment = service
        .create_appointment(setup.booking(at(10, 0), 30))
        .await
        .unwrap();

    let cancelled = service
        .cancel_appointment(
            appointment.id,
            CancelAppointmentRequest {
                reason: "feeling better".to_string(),
                cancelled_by: CancelledBy::Patient,
            },
        )
        .await
        .unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert!(cancelled
        .cancellation_reason
        .as_deref()
        .unwrap()
        .contains("Cancelled by Patient"));

    // The window is free again.
    service
        .create_appointment(setup.booking(at(10, 15), 30))
        .await
        .unwrap();

    // The cancelled record is retained for audit.
    let audit = service.get_appointment(appointment.id).await.unwrap();
    assert_eq!(audit.status, AppointmentStatus::Cancelled);
}

#[tokio::test]
async fn concurrent_bookings_for_one_window_admit_exactly_one() {
    let setup = TestSetup::new().await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let ctx = setup.ctx.clone();
        let request = setup.booking(at(10, 0), 30);
        handles.push(tokio::spawn(async move {
            let service = AppointmentBookingService::new(&ctx);
            service.create_appointment(request).await
        }));
    }

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(AppointmentError::SchedulingConflict { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error under contention: {:?}", other),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(conflicts, 7);
}

#[tokio::test]
async fn slot_binding_is_atomic_and_exclusive() {
    let setup = TestSetup::new().await;
    let slots = SlotService::new(&setup.ctx);
    let service = AppointmentBookingService::new(&setup.ctx);

    let slot = slots
        .create(CreateSlotRequest {
            provider_id: setup.provider_id,
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            start_time: at(10, 0),
            end_time: at(10, 30),
            is_available: None,
        })
        .await
        .unwrap();

    let mut request = setup.booking(at(10, 0), 30);
    request.slot_id = Some(slot.id);
    let appointment = service.create_appointment(request).await.unwrap();

    let booked = slots.get(slot.id).await.unwrap();
    assert!(booked.is_booked);
    assert!(!booked.is_available);
    assert_eq!(booked.appointment_id, Some(appointment.id));

    // A second booking against the same slot fails even though its time
    // window would pass the overlap check on its own.
    let mut request = setup.booking(at(14, 0), 30);
    request.slot_id = Some(slot.id);
    let err = service.create_appointment(request).await.unwrap_err();
    assert_matches!(err, AppointmentError::SchedulingConflict { .. });

    // And the failed attempt must not have left an appointment behind.
    let queries = AppointmentQueryService::new(&setup.ctx);
    let listed = queries.find_by_provider(setup.provider_id).await.unwrap();
    assert_eq!(listed.len(), 1);

    // Cancellation releases the slot.
    service
        .cancel_appointment(
            appointment.id,
            CancelAppointmentRequest {
                reason: "conflict".to_string(),
                cancelled_by: CancelledBy::Provider,
            },
        )
        .await
        .unwrap();
    let released = slots.get(slot.id).await.unwrap();
    assert!(!released.is_booked);
    assert!(released.is_available);
    assert_eq!(released.appointment_id, None);
}

#[tokio::test]
async fn availability_binding_follows_the_appointment() {
    let setup = TestSetup::new().await;
    let availability = AvailabilityService::new(&setup.ctx);
    let service = AppointmentBookingService::new(&setup.ctx);

    let window = availability
        .declare(DeclareAvailabilityRequest {
            provider_id: setup.provider_id,
            start_time: at(9, 0),
            end_time: at(17, 0),
            kind: AvailabilityKind::Regular,
            notes: None,
        })
        .await
        .unwrap();

    let mut request = setup.booking(at(9, 0), 30);
    request.availability_id = Some(window.id);
    let appointment = service.create_appointment(request).await.unwrap();

    let consumed = availability.get(window.id).await.unwrap();
    assert_eq!(consumed.status, AvailabilityStatus::Booked);

    // Booking against an already consumed window is a conflict.
    let mut request = setup.booking(at(11, 0), 30);
    request.availability_id = Some(window.id);
    let err = service.create_appointment(request).await.unwrap_err();
    assert_matches!(err, AppointmentError::SchedulingConflict { .. });

    service
        .cancel_appointment(
            appointment.id,
            CancelAppointmentRequest {
                reason: "provider unavailable".to_string(),
                cancelled_by: CancelledBy::System,
            },
        )
        .await
        .unwrap();
    let reopened = availability.get(window.id).await.unwrap();
    assert_eq!(reopened.status, AvailabilityStatus::Available);
}

#[tokio::test]
async fn non_positive_durations_are_rejected_before_any_checks() {
    let setup = TestSetup::new().await;
    let service = AppointmentBookingService::new(&setup.ctx);

    for minutes in [0, -15] {
        let err = service
            .create_appointment(setup.booking(at(10, 0), minutes))
            .await
            .unwrap_err();
        assert_matches!(err, AppointmentError::InvalidTime(_));
    }
}

#[tokio::test]
async fn unknown_parties_are_rejected() {
    let setup = TestSetup::new().await;
    let service = AppointmentBookingService::new(&setup.ctx);

    let mut request = setup.booking(at(10, 0), 30);
    request.patient_id = Uuid::new_v4();
    let err = service.create_appointment(request).await.unwrap_err();
    assert_matches!(err, AppointmentError::PatientNotFound);

    let mut request = setup.booking(at(10, 0), 30);
    request.provider_id = Uuid::new_v4();
    let err = service.create_appointment(request).await.unwrap_err();
    assert_matches!(err, AppointmentError::ProviderNotFound);
}

#[tokio::test]
async fn time_updates_recheck_conflicts_excluding_self() {
    let setup = TestSetup::new().await;
    let service = AppointmentBookingService::new(&setup.ctx);

    service
        .create_appointment(setup.booking(at(9, 0), 30))
        .await
        .unwrap();
    let second = service
        .create_appointment(setup.booking(at(10, 0), 30))
        .await
        .unwrap();

    let err = service
        .update_appointment(
            second.id,
            UpdateAppointmentRequest {
                scheduled_start: Some(at(9, 15)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::SchedulingConflict { .. });

    // Back-to-back with the first appointment is allowed, and shrinking or
    // moving over its own old window never conflicts with itself.
    let moved = service
        .update_appointment(
            second.id,
            UpdateAppointmentRequest {
                scheduled_start: Some(at(9, 30)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.scheduled_start, at(9, 30));
    assert_eq!(moved.scheduled_time, "2025-03-10 09:30 UTC");
}

#[tokio::test]
async fn status_machine_guards_every_update() {
    let setup = TestSetup::new().await;
    let service = AppointmentBookingService::new(&setup.ctx);

    let appointment = service
        .create_appointment(setup.booking(at(10, 0), 30))
        .await
        .unwrap();

    // scheduled -> completed skips confirmation.
    let err = service
        .update_appointment(
            appointment.id,
            UpdateAppointmentRequest {
                status: Some(AppointmentStatus::Completed),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(
        err,
        AppointmentError::InvalidStatusTransition(AppointmentStatus::Scheduled)
    );

    let confirmed = service
        .update_appointment(
            appointment.id,
            UpdateAppointmentRequest {
                status: Some(AppointmentStatus::Confirmed),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(confirmed.status, AppointmentStatus::Confirmed);

    let completed = service
        .update_appointment(
            appointment.id,
            UpdateAppointmentRequest {
                status: Some(AppointmentStatus::Completed),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(completed.status, AppointmentStatus::Completed);

    // Terminal: no cancellation of a completed appointment.
    let err = service
        .cancel_appointment(
            appointment.id,
            CancelAppointmentRequest {
                reason: "too late".to_string(),
                cancelled_by: CancelledBy::Patient,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(
        err,
        AppointmentError::InvalidStatusTransition(AppointmentStatus::Completed)
    );
}

#[tokio::test]
async fn reschedule_creates_a_linked_replacement() {
    let setup = TestSetup::new().await;
    let service = AppointmentBookingService::new(&setup.ctx);

    let original = service
        .create_appointment(setup.booking(at(10, 0), 30))
        .await
        .unwrap();

    let replacement = service
        .reschedule_appointment(
            original.id,
            RescheduleAppointmentRequest {
                new_start_time: at(11, 0),
                new_duration_minutes: None,
                reason: Some("provider delayed".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(replacement.parent_appointment_id, Some(original.id));
    assert_eq!(replacement.status, AppointmentStatus::Scheduled);
    assert_eq!(replacement.scheduled_start, at(11, 0));
    assert_eq!(replacement.duration_minutes, 30);

    let retired = service.get_appointment(original.id).await.unwrap();
    assert_eq!(retired.status, AppointmentStatus::Rescheduled);
    assert_eq!(retired.reschedule_reason.as_deref(), Some("provider delayed"));

    // A rescheduled appointment is terminal.
    let err = service
        .reschedule_appointment(
            original.id,
            RescheduleAppointmentRequest {
                new_start_time: at(12, 0),
                new_duration_minutes: None,
                reason: None,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::InvalidStatusTransition(_));

    // Only cancellation frees time: the retired interval still blocks.
    let err = service
        .create_appointment(setup.booking(at(10, 0), 30))
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::SchedulingConflict { .. });
}

#[tokio::test]
async fn remove_is_a_hard_delete_that_releases_bindings() {
    let setup = TestSetup::new().await;
    let slots = SlotService::new(&setup.ctx);
    let service = AppointmentBookingService::new(&setup.ctx);

    let slot = slots
        .create(CreateSlotRequest {
            provider_id: setup.provider_id,
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            start_time: at(10, 0),
            end_time: at(10, 30),
            is_available: None,
        })
        .await
        .unwrap();

    let mut request = setup.booking(at(10, 0), 30);
    request.slot_id = Some(slot.id);
    let appointment = service.create_appointment(request).await.unwrap();

    service.remove_appointment(appointment.id).await.unwrap();

    let err = service.get_appointment(appointment.id).await.unwrap_err();
    assert_matches!(err, AppointmentError::NotFound);

    let released = slots.get(slot.id).await.unwrap();
    assert!(!released.is_booked);

    let err = service.remove_appointment(appointment.id).await.unwrap_err();
    assert_matches!(err, AppointmentError::NotFound);
}

#[tokio::test]
async fn booking_scenario_end_to_end() {
    let setup = TestSetup::new().await;
    let availability = AvailabilityService::new(&setup.ctx);
    let service = AppointmentBookingService::new(&setup.ctx);
    let queries = AppointmentQueryService::new(&setup.ctx);

    let patient_b = setup.other_patient_id;

    availability
        .declare(DeclareAvailabilityRequest {
            provider_id: setup.provider_id,
            start_time: at(9, 0),
            end_time: at(17, 0),
            kind: AvailabilityKind::Regular,
            notes: None,
        })
        .await
        .unwrap();

    // Patient A books 09:00-09:30.
    let a_booking = service
        .create_appointment(setup.booking(at(9, 0), 30))
        .await
        .unwrap();
    assert_eq!(a_booking.status, AppointmentStatus::Scheduled);

    // Patient B tries 09:15-09:45 and is told about A's slot.
    let mut b_request = setup.booking(at(9, 15), 30);
    b_request.patient_id = patient_b;
    let err = service.create_appointment(b_request).await.unwrap_err();
    assert_matches!(
        err,
        AppointmentError::SchedulingConflict { conflicting_appointment_id, .. }
            if conflicting_appointment_id == Some(a_booking.id)
    );

    // Patient B books the adjacent window instead.
    let mut b_request = setup.booking(at(9, 30), 30);
    b_request.patient_id = patient_b;
    service.create_appointment(b_request).await.unwrap();

    // A cancels.
    service
        .cancel_appointment(
            a_booking.id,
            CancelAppointmentRequest {
                reason: "schedule change".to_string(),
                cancelled_by: CancelledBy::Patient,
            },
        )
        .await
        .unwrap();

    // The day's listing still shows both bookings, cancelled included.
    let day = queries
        .find_by_date_range(at(0, 0), at(23, 59))
        .await
        .unwrap();
    assert_eq!(day.len(), 2);
    assert_eq!(day[0].status, AppointmentStatus::Cancelled);

    // And the cancelled listing names A's booking.
    let cancelled = queries
        .find_by_status(AppointmentStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].id, a_booking.id);

    // A's old window is bookable again.
    let mut b_request = setup.booking(at(9, 0), 30);
    b_request.patient_id = patient_b;
    service.create_appointment(b_request).await.unwrap();
}
