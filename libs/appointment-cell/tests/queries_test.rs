use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{
    AppointmentPriority, AppointmentStatus, CancelAppointmentRequest, CancelledBy,
    CreateAppointmentRequest,
};
use appointment_cell::services::booking::AppointmentBookingService;
use appointment_cell::services::queries::AppointmentQueryService;
use shared_store::AppContext;
use shared_utils::clock::FixedClock;
use shared_utils::test_utils::{patient_row, provider_row, test_config};

fn on_day(day: u32, hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, hour, min, 0).unwrap()
}

struct TestSetup {
    _server: MockServer,
    ctx: Arc<AppContext>,
    clock: Arc<FixedClock>,
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

        let clock = Arc::new(FixedClock::new(on_day(10, 8, 0)));
        let ctx = Arc::new(AppContext::with_clock(
            test_config(&server.uri(), "", ""),
            clock.clone(),
        ));

        Self {
            _server: server,
            ctx,
            clock,
            provider_id,
            patient_id,
            other_patient_id,
        }
    }

    fn booking(&self, start: DateTime<Utc>) -> CreateAppointmentRequest {
        CreateAppointmentRequest {
            patient_id: self.patient_id,
            provider_id: self.provider_id,
            scheduled_start: start,
            duration_minutes: 30,
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
async fn provider_listing_is_ordered_and_idempotent() {
    let setup = TestSetup::new().await;
    let booking = AppointmentBookingService::new(&setup.ctx);
    let queries = AppointmentQueryService::new(&setup.ctx);

    for start in [on_day(10, 14, 0), on_day(10, 9, 0), on_day(10, 11, 0)] {
        booking.create_appointment(setup.booking(start)).await.unwrap();
    }

    let first_read = queries.find_by_provider(setup.provider_id).await.unwrap();
    let starts: Vec<_> = first_read.iter().map(|a| a.scheduled_start).collect();
    assert_eq!(
        starts,
        vec![on_day(10, 9, 0), on_day(10, 11, 0), on_day(10, 14, 0)]
    );

    let second_read = queries.find_by_provider(setup.provider_id).await.unwrap();
    let ids_first: Vec<_> = first_read.iter().map(|a| a.id).collect();
    let ids_second: Vec<_> = second_read.iter().map(|a| a.id).collect();
    assert_eq!(ids_first, ids_second);
}

#[tokio::test]
async fn projections_expose_only_participant_summaries() {
    let setup = TestSetup::new().await;
    let booking = AppointmentBookingService::new(&setup.ctx);
    let queries = AppointmentQueryService::new(&setup.ctx);

    booking
        .create_appointment(setup.booking(on_day(10, 9, 0)))
        .await
        .unwrap();

    let listed = queries.find_by_provider(setup.provider_id).await.unwrap();
    assert_eq!(listed.len(), 1);

    let detail = serde_json::to_value(&listed[0]).unwrap();

    let provider_keys: Vec<&str> = detail["provider"]
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    let mut provider_keys = provider_keys;
    provider_keys.sort_unstable();
    assert_eq!(provider_keys, vec!["full_name", "id", "specialty"]);

    let mut patient_keys: Vec<String> = detail["patient"]
        .as_object()
        .unwrap()
        .keys()
        .cloned()
        .collect();
    patient_keys.sort_unstable();
    assert_eq!(patient_keys, vec!["date_of_birth", "full_name", "id"]);

    assert_eq!(detail["provider"]["full_name"], "Dr. Ada Osei");
    assert_eq!(detail["patient"]["full_name"], "June Park");
}

#[tokio::test]
async fn patient_listing_filters_by_patient() {
    let setup = TestSetup::new().await;
    let booking = AppointmentBookingService::new(&setup.ctx);
    let queries = AppointmentQueryService::new(&setup.ctx);

    booking
        .create_appointment(setup.booking(on_day(10, 9, 0)))
        .await
        .unwrap();
    let mut other = setup.booking(on_day(10, 11, 0));
    other.patient_id = setup.other_patient_id;
    booking.create_appointment(other).await.unwrap();

    let for_june = queries.find_by_patient(setup.patient_id).await.unwrap();
    assert_eq!(for_june.len(), 1);
    assert_eq!(for_june[0].patient.full_name, "June Park");

    let for_omar = queries.find_by_patient(setup.other_patient_id).await.unwrap();
    assert_eq!(for_omar.len(), 1);
    assert_eq!(for_omar[0].scheduled_start, on_day(10, 11, 0));
}

#[tokio::test]
async fn find_today_follows_the_injected_clock() {
    let setup = TestSetup::new().await;
    let booking = AppointmentBookingService::new(&setup.ctx);
    let queries = AppointmentQueryService::new(&setup.ctx);

    booking
        .create_appointment(setup.booking(on_day(10, 10, 0)))
        .await
        .unwrap();
    booking
        .create_appointment(setup.booking(on_day(11, 10, 0)))
        .await
        .unwrap();

    let today = queries.find_today().await.unwrap();
    assert_eq!(today.len(), 1);
    assert_eq!(today[0].scheduled_start, on_day(10, 10, 0));

    // Move the clock a day forward and "today" moves with it.
    setup.clock.set(on_day(11, 8, 0));
    let today = queries.find_today().await.unwrap();
    assert_eq!(today.len(), 1);
    assert_eq!(today[0].scheduled_start, on_day(11, 10, 0));
}

#[tokio::test]
async fn find_upcoming_spans_a_week_and_skips_cancelled() {
    let setup = TestSetup::new().await;
    let booking = AppointmentBookingService::new(&setup.ctx);
    let queries = AppointmentQueryService::new(&setup.ctx);

    let soon = booking
        .create_appointment(setup.booking(on_day(10, 10, 0)))
        .await
        .unwrap();
    booking
        .create_appointment(setup.booking(on_day(13, 10, 0)))
        .await
        .unwrap();
    // Beyond the seven-day horizon.
    booking
        .create_appointment(setup.booking(on_day(20, 10, 0)))
        .await
        .unwrap();

    let upcoming = queries.find_upcoming().await.unwrap();
    assert_eq!(upcoming.len(), 2);

    booking
        .cancel_appointment(
            soon.id,
            CancelAppointmentRequest {
                reason: "no longer needed".to_string(),
                cancelled_by: CancelledBy::Patient,
            },
        )
        .await
        .unwrap();

    let upcoming = queries.find_upcoming().await.unwrap();
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0].scheduled_start, on_day(13, 10, 0));

    // The cancelled booking still shows in the status listing.
    let cancelled = queries
        .find_by_status(AppointmentStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].id, soon.id);
}
