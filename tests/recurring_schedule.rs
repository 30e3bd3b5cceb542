use std::sync::Arc;

use time::macros::date;
use time::{Date, Duration};

use fleetdesk::application::recurring::{CreateRecurringExpenseCommand, RecurringExpenseService};
use fleetdesk::application::repos::RecurringExpenseRepo;
use fleetdesk::cache::{CacheAside, CacheConfig, InvalidationRouter, TtlStore};
use fleetdesk::domain::recurrence::{
    Interval, IntervalKind, MAX_OCCURRENCES_PER_RUN, next_due_date,
};
use fleetdesk::infra::memory::InMemoryRepositories;

fn service(repos: Arc<InMemoryRepositories>) -> RecurringExpenseService {
    let config = CacheConfig::default();
    let store = Arc::new(TtlStore::new(&config));
    RecurringExpenseService::new(
        repos,
        Arc::new(CacheAside::new(config, Arc::clone(&store))),
        Arc::new(InvalidationRouter::new(store)),
    )
}

fn monthly(anchor: Date, limit: Option<u32>) -> CreateRecurringExpenseCommand {
    CreateRecurringExpenseCommand {
        vehicle_id: None,
        description: "Depot rent".to_string(),
        amount_cents: 250_000,
        anchor_date: anchor,
        interval: IntervalKind::Monthly,
        custom_interval_days: None,
        total_occurrences_limit: limit,
    }
}

#[test]
fn next_due_date_is_strictly_after_anchor() {
    let intervals = [
        Interval::Weekly,
        Interval::Monthly,
        Interval::Quarterly,
        Interval::Yearly,
        Interval::Custom { days: 1 },
        Interval::Custom { days: 45 },
    ];
    let mut anchor = date!(2023 - 12 - 25);
    while anchor < date!(2025 - 01 - 10) {
        for interval in intervals {
            let next = next_due_date(anchor, interval).expect("in range");
            assert!(next > anchor, "{interval} from {anchor} gave {next}");
        }
        anchor += Duration::days(1);
    }
}

#[test]
fn month_end_anchors_clamp_to_february() {
    assert_eq!(
        next_due_date(date!(2025 - 01 - 31), Interval::Monthly).expect("in range"),
        date!(2025 - 02 - 28)
    );
    assert_eq!(
        next_due_date(date!(2024 - 01 - 31), Interval::Monthly).expect("in range"),
        date!(2024 - 02 - 29)
    );
    assert_eq!(
        next_due_date(date!(2024 - 02 - 29), Interval::Yearly).expect("in range"),
        date!(2025 - 02 - 28)
    );
}

#[tokio::test]
async fn processor_books_each_occurrence_once() {
    let repos = Arc::new(InMemoryRepositories::new());
    let service = service(repos.clone());
    service
        .create(monthly(date!(2025 - 01 - 31), None))
        .await
        .expect("created");

    let summary = service
        .process_due(date!(2025 - 04 - 30))
        .await
        .expect("processed");
    assert_eq!(summary.occurrences, 3);
    assert_eq!(summary.failures, 0);

    let booked: Vec<Date> = repos
        .list_expenses(date!(2025 - 01 - 01), date!(2025 - 12 - 31))
        .await
        .expect("listed")
        .into_iter()
        .map(|expense| expense.incurred_on)
        .collect();
    assert_eq!(
        booked,
        vec![
            date!(2025 - 02 - 28),
            date!(2025 - 03 - 28),
            date!(2025 - 04 - 28)
        ]
    );

    let rerun = service
        .process_due(date!(2025 - 04 - 30))
        .await
        .expect("processed");
    assert_eq!(rerun.occurrences, 0);
}

#[tokio::test]
async fn concurrent_runs_do_not_double_book() {
    let repos = Arc::new(InMemoryRepositories::new());
    let service = Arc::new(service(repos.clone()));
    service
        .create(monthly(date!(2025 - 01 - 15), None))
        .await
        .expect("created");

    let today = date!(2025 - 03 - 20);
    let (first, second) = tokio::join!(service.process_due(today), service.process_due(today));
    let total = first.expect("processed").occurrences + second.expect("processed").occurrences;
    assert_eq!(total, 2);

    let booked = repos
        .list_expenses(date!(2025 - 01 - 01), date!(2025 - 12 - 31))
        .await
        .expect("listed");
    assert_eq!(booked.len(), 2);
}

#[tokio::test]
async fn occurrence_limit_completes_the_schedule() {
    let repos = Arc::new(InMemoryRepositories::new());
    let service = service(repos.clone());
    let record = service
        .create(monthly(date!(2025 - 01 - 01), Some(2)))
        .await
        .expect("created");

    let summary = service
        .process_due(date!(2025 - 12 - 31))
        .await
        .expect("processed");
    assert_eq!(summary.occurrences, 2);
    assert_eq!(summary.completed, 1);

    let stored = repos
        .list_recurring_expenses(&Default::default())
        .await
        .expect("listed")
        .into_iter()
        .find(|r| r.id == record.id)
        .expect("still stored");
    assert_eq!(stored.schedule.occurrences_so_far, 2);
    assert!(!stored.schedule.is_active);
    assert_eq!(stored.schedule.next_due_date().expect("valid"), None);
}

#[tokio::test]
async fn invalid_schedules_are_rejected() {
    let service = service(Arc::new(InMemoryRepositories::new()));

    let mut custom_without_days = monthly(date!(2025 - 01 - 01), None);
    custom_without_days.interval = IntervalKind::Custom;
    assert!(service.create(custom_without_days).await.is_err());

    let zero_limit = monthly(date!(2025 - 01 - 01), Some(0));
    assert!(service.create(zero_limit).await.is_err());
}

#[tokio::test]
async fn long_backlogs_are_booked_across_runs() {
    let repos = Arc::new(InMemoryRepositories::new());
    let service = service(repos.clone());
    service
        .create(CreateRecurringExpenseCommand {
            interval: IntervalKind::Custom,
            custom_interval_days: Some(1),
            ..monthly(date!(2024 - 01 - 01), None)
        })
        .await
        .expect("created");
    let today = date!(2025 - 06 - 01);

    let first = service.process_due(today).await.expect("processed");
    assert_eq!(first.occurrences, MAX_OCCURRENCES_PER_RUN);
    assert_eq!(first.pending, 1);

    let second = service.process_due(today).await.expect("processed");
    assert_eq!(second.pending, 0);

    let booked = repos
        .list_expenses(date!(2024 - 01 - 01), today)
        .await
        .expect("listed");
    assert_eq!(booked.len(), first.occurrences + second.occurrences);
    assert_eq!(booked.last().map(|expense| expense.incurred_on), Some(today));
}
