use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus};
use crate::error::AppResult;
use crate::services::window::BookingWindow;

/// Active bookings on `vehicle_id` whose stored window overlaps `window`
/// (closed interval). `exclude` drops one booking from consideration, which
/// is how a reschedule avoids colliding with its own current slot.
pub async fn find_conflicts<C: ConnectionTrait>(
    db: &C,
    vehicle_id: Uuid,
    window: &BookingWindow,
    exclude: Option<Uuid>,
) -> AppResult<Vec<booking::Model>> {
    let mut query = booking::Entity::find()
        .filter(booking::Column::VehicleId.eq(vehicle_id))
        .filter(booking::Column::Status.is_in(BookingStatus::ACTIVE))
        .filter(booking::Column::StartDate.lte(window.end()))
        .filter(booking::Column::EndDate.gte(window.start()));

    if let Some(own_id) = exclude {
        query = query.filter(booking::Column::Id.ne(own_id));
    }

    Ok(query.all(db).await?)
}

/// `true` only when nothing active holds the vehicle during `window`.
/// Storage errors propagate; callers must not read them as "available".
pub async fn is_available<C: ConnectionTrait>(
    db: &C,
    vehicle_id: Uuid,
    window: &BookingWindow,
) -> AppResult<bool> {
    is_available_excluding(db, vehicle_id, window, None).await
}

pub async fn is_available_excluding<C: ConnectionTrait>(
    db: &C,
    vehicle_id: Uuid,
    window: &BookingWindow,
    exclude: Option<Uuid>,
) -> AppResult<bool> {
    let conflicts = find_conflicts(db, vehicle_id, window, exclude).await?;

    if !conflicts.is_empty() {
        tracing::debug!(
            vehicle_id = %vehicle_id,
            conflicts = conflicts.len(),
            start = %window.start(),
            end = %window.end(),
            "Requested window is taken"
        );
    }

    Ok(conflicts.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::services::test_support::{booking_at, hours_from_now};
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase};

    #[tokio::test]
    async fn test_available_when_no_rows_match() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<booking::Model>::new()])
            .into_connection();

        let window = BookingWindow::new(hours_from_now(24), hours_from_now(26)).unwrap();
        assert!(is_available(&db, Uuid::new_v4(), &window).await.unwrap());
    }

    #[tokio::test]
    async fn test_unavailable_when_an_active_booking_overlaps() {
        let existing = booking_at(hours_from_now(24), hours_from_now(26), BookingStatus::Confirmed);
        let vehicle_id = existing.vehicle_id;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![existing]])
            .into_connection();

        let window = BookingWindow::new(hours_from_now(25), hours_from_now(27)).unwrap();
        assert!(!is_available(&db, vehicle_id, &window).await.unwrap());
    }

    #[tokio::test]
    async fn test_conflict_query_filters_on_status_and_window() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<booking::Model>::new()])
            .into_connection();

        let own_id = Uuid::new_v4();
        let window = BookingWindow::new(hours_from_now(24), hours_from_now(26)).unwrap();
        is_available_excluding(&db, Uuid::new_v4(), &window, Some(own_id))
            .await
            .unwrap();

        let log = db.into_transaction_log();
        assert_eq!(log.len(), 1);
        let sql = format!("{:?}", log[0]).replace("\\\"", "\"");
        assert!(sql.contains(r#""status" IN"#));
        assert!(sql.contains(r#""start_date" <="#));
        assert!(sql.contains(r#""end_date" >="#));
        assert!(sql.contains(r#""id" <>"#));
    }

    #[tokio::test]
    async fn test_storage_error_is_not_available() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_errors([DbErr::Custom("connection reset".to_string())])
            .into_connection();

        let window = BookingWindow::new(hours_from_now(24), hours_from_now(26)).unwrap();
        let result = is_available(&db, Uuid::new_v4(), &window).await;
        assert!(matches!(result, Err(AppError::Database(_))));
    }
}
